//! Core types for the jsbridge native/script bridge.
//!
//! This crate is engine-independent. It defines:
//!
//! - [`TypeHash`]: deterministic identity of bridged types
//! - [`ValueKind`] and [`Dynamic`]: declared kinds and marshaled values
//! - The conversion traits used by typed invokers ([`FromArg`], [`NativeReturn`])
//! - [`TypeDescriptor`]: published metadata of one native type
//! - [`ObjectHeap`]: the generational arena of native object wrappers
//! - The error taxonomy shared by every crate of the workspace

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod runtime;
pub mod type_hash;
pub mod value_kind;

pub use convert::{
    Cloned, FromArg, FromDynamic, Handle, IntoDynamic, NativeReturn, NativeType, Owned, ValueType,
};
pub use descriptor::{
    DescriptorSource, Destructor, Overload, PropertyAccess, PropertyDescriptor, Resolution,
    TypeDescriptor, resolve_overload, signature,
};
pub use error::{BridgeError, ConversionError, ErrorCode, NativeError, RegistrationError};
pub use runtime::{
    CallContext, Dynamic, NativeCallable, NativeFn, NativeObjectWrapper, ObjectHandle, ObjectHeap,
    Ownership, SlotState, format_number,
};
pub use type_hash::{TypeHash, hash_constants};
pub use value_kind::{KindClass, ValueKind};
