//! Native function storage and callable trait.

use std::fmt;
use std::sync::Arc;

use crate::error::NativeError;

use super::CallContext;

/// Type-erased native invoker.
///
/// Wraps any callable implementing [`NativeCallable`] so constructors,
/// methods and property accessors of different signatures are stored
/// uniformly in a [`TypeDescriptor`](crate::TypeDescriptor). Cloning shares
/// the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a [`CallContext`] that provides access to
/// arguments, the receiver and the object heap, and collects the return
/// value.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self(ctx)
    }
}
