//! Errors returned to the host by the object mapper.

use thiserror::Error;

use jsbridge_core::BridgeError;

use crate::mapper::MapperPhase;

/// Host-facing mapper failures.
///
/// Failures of individual script operations never reach the host as
/// `MapperError`; they are thrown into script as `NativeBridgeError`.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Error reported by the script engine
    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// The context is already bound to an object mapper
    #[error("execution context already has an object mapper")]
    AlreadyInitialized,

    /// The operation needs a mapper bound to a context
    #[error("object mapper is {0}, not initialized")]
    NotInitialized(MapperPhase),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for mapper operations.
pub type Result<T> = std::result::Result<T, MapperError>;
