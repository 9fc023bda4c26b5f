//! Runtime value model shared by the registry and the object mapper.

mod call_context;
mod dynamic;
mod native_fn;
mod object_heap;

pub use call_context::CallContext;
pub use dynamic::{Dynamic, format_number};
pub use native_fn::{NativeCallable, NativeFn};
pub use object_heap::{NativeObjectWrapper, ObjectHandle, ObjectHeap, Ownership, SlotState};
