//! Error types shared by the bridge crates.

use std::fmt;

use thiserror::Error;

/// Errors that can occur when converting a single value across the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Kind the target accepts.
        expected: &'static str,
        /// Kind of the value supplied.
        actual: &'static str,
    },

    /// Integer value outside the target width
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        /// The value that did not fit.
        value: String,
        /// The integer kind it was converted to.
        target_type: &'static str,
    },

    /// NaN, infinity or out-of-range float
    #[error("float conversion error: value {value} cannot be represented as {target_type}")]
    FloatConversion {
        /// The rejected value.
        value: f64,
        /// The kind it was converted to.
        target_type: &'static str,
    },

    /// A handle whose native type differs from the requested one
    #[error("native object of type {actual} cannot be used as {expected}")]
    ObjectTypeMismatch {
        /// Script name of the parameter's type.
        expected: &'static str,
        /// Script name of the handle's type.
        actual: String,
    },
}

/// Errors that can occur during native function execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting arguments or return values
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Invalid `this` reference for method call
    #[error("invalid 'this' reference: {message}")]
    InvalidThis { message: String },

    /// Argument index out of bounds
    #[error("argument index {index} out of bounds (function has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// Stale object handle (object was freed)
    #[error("stale object handle: object at index {index} has been freed")]
    StaleHandle { index: u32 },

    /// The lock around a shared instance was poisoned by an earlier panic
    #[error("shared {type_name} instance is poisoned")]
    Poisoned { type_name: String },

    /// Native code panicked
    #[error("native function panicked: {message}")]
    Panic { message: String },

    /// Type used by native code without a registered descriptor
    #[error("type {type_name} is not registered")]
    Unregistered { type_name: &'static str },

    /// Custom error from native code
    #[error("{message}")]
    Other { message: String },
}

impl NativeError {
    /// Create a custom error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

/// Errors raised while publishing a class registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A type or member registered under an empty name
    #[error("empty {what} name in registration of {type_name}")]
    EmptyName {
        /// Rust name of the type being registered.
        type_name: String,
        /// What was left unnamed: type, method, function or property.
        what: &'static str,
    },

    /// Ambiguous or duplicate member declarations
    #[error("conflicting registration of {type_name}.{member}: {detail}")]
    Conflict {
        /// Script name of the type being registered.
        type_name: String,
        /// The offending member.
        member: String,
        /// What the member clashes with.
        detail: String,
    },
}

/// Script-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// See [`BridgeError::UnknownType`]
    UnknownType,
    /// See [`BridgeError::NoMatchingOverload`]
    NoMatchingOverload,
    /// See [`BridgeError::TypeMismatch`]
    TypeMismatch,
    /// See [`BridgeError::InvalidHandle`]
    InvalidHandle,
    /// See [`BridgeError::UseAfterFree`]
    UseAfterFree,
    /// See [`BridgeError::NoSuchMember`]
    NoSuchMember,
    /// See [`BridgeError::ReadOnlyProperty`]
    ReadOnlyProperty,
    /// See [`BridgeError::Native`]
    NativeError,
    /// See [`BridgeError::NotInitialized`]
    NotInitialized,
}

impl ErrorCode {
    /// The name scripts see as `error.code`.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownType => "UnknownType",
            ErrorCode::NoMatchingOverload => "NoMatchingOverload",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::InvalidHandle => "InvalidHandle",
            ErrorCode::UseAfterFree => "UseAfterFree",
            ErrorCode::NoSuchMember => "NoSuchMember",
            ErrorCode::ReadOnlyProperty => "ReadOnlyProperty",
            ErrorCode::NativeError => "NativeError",
            ErrorCode::NotInitialized => "NotInitialized",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while dispatching a script operation to native code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// No type is published under the requested name.
    #[error("unknown native type '{name}'")]
    UnknownType {
        /// The name script asked for.
        name: String,
    },

    /// No overload accepts the call's arguments.
    #[error("no overload of {type_name}.{member} accepts ({signature})")]
    NoMatchingOverload {
        /// Script name of the owning type.
        type_name: String,
        /// The member that was called.
        member: String,
        /// Kinds of the arguments actually passed.
        signature: String,
    },

    /// An argument or assigned value does not convert to its declared kind.
    #[error("{type_name}.{member}: {detail}")]
    TypeMismatch {
        /// Script name of the owning type.
        type_name: String,
        /// The member that was called or assigned.
        member: String,
        /// Which value was rejected and why.
        detail: String,
    },

    /// A token that this mapper never issued.
    #[error("invalid native handle: {detail}")]
    InvalidHandle {
        /// What was wrong with the token.
        detail: String,
    },

    /// A token for a wrapper that has since been freed.
    #[error("native object in slot {index} was already released")]
    UseAfterFree {
        /// Heap slot the token pointed at.
        index: u32,
    },

    /// The type has no member of that name.
    #[error("{type_name} has no member '{member}'")]
    NoSuchMember {
        /// Script name of the owning type.
        type_name: String,
        /// The missing member.
        member: String,
    },

    /// Assignment to a property without a setter.
    #[error("property {type_name}.{member} is read-only")]
    ReadOnlyProperty {
        /// Script name of the owning type.
        type_name: String,
        /// The property that was assigned.
        member: String,
    },

    /// Native code returned an error or panicked.
    #[error("{type_name}.{member} failed: {source}")]
    Native {
        /// Script name of the owning type.
        type_name: String,
        /// The member whose invoker failed.
        member: String,
        /// The invoker's own error.
        source: NativeError,
    },

    /// A hook ran while the mapper was not initialized.
    #[error("object mapper is not initialized")]
    NotInitialized,
}

impl BridgeError {
    /// The code scripts see on the thrown `NativeBridgeError`.
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::UnknownType { .. } => ErrorCode::UnknownType,
            BridgeError::NoMatchingOverload { .. } => ErrorCode::NoMatchingOverload,
            BridgeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            BridgeError::InvalidHandle { .. } => ErrorCode::InvalidHandle,
            BridgeError::UseAfterFree { .. } => ErrorCode::UseAfterFree,
            BridgeError::NoSuchMember { .. } => ErrorCode::NoSuchMember,
            BridgeError::ReadOnlyProperty { .. } => ErrorCode::ReadOnlyProperty,
            BridgeError::Native { .. } => ErrorCode::NativeError,
            BridgeError::NotInitialized => ErrorCode::NotInitialized,
        }
    }

    /// Shorthand for [`BridgeError::InvalidHandle`].
    pub fn invalid_handle(detail: impl Into<String>) -> Self {
        BridgeError::InvalidHandle {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_display() {
        let err = ConversionError::TypeMismatch {
            expected: "int32",
            actual: "string",
        };
        assert_eq!(err.to_string(), "type mismatch: expected int32, got string");
    }

    #[test]
    fn native_error_from_conversion() {
        let err: NativeError = ConversionError::FloatConversion {
            value: f64::NAN,
            target_type: "int32",
        }
        .into();
        assert!(matches!(err, NativeError::Conversion(_)));
    }

    #[test]
    fn bridge_error_codes() {
        let cases = [
            (BridgeError::UnknownType { name: "X".into() }, "UnknownType"),
            (BridgeError::UseAfterFree { index: 3 }, "UseAfterFree"),
            (BridgeError::invalid_handle("forged"), "InvalidHandle"),
            (BridgeError::NotInitialized, "NotInitialized"),
            (
                BridgeError::Native {
                    type_name: "T".into(),
                    member: "m".into(),
                    source: NativeError::other("boom"),
                },
                "NativeError",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code().as_str(), code);
        }
    }

    #[test]
    fn native_error_chains_source() {
        use std::error::Error as _;
        let err = BridgeError::Native {
            type_name: "T".into(),
            member: "m".into(),
            source: NativeError::other("boom"),
        };
        assert_eq!(err.to_string(), "T.m failed: boom");
        assert!(err.source().is_some());
    }
}
