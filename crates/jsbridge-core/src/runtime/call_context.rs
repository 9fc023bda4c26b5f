//! Call context handed to native invokers.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::convert::{FromDynamic, Handle, IntoDynamic};
use crate::descriptor::{DescriptorSource, TypeDescriptor};
use crate::error::NativeError;
use crate::NativeType;

use super::{Dynamic, ObjectHandle, ObjectHeap};

/// Everything a native invoker can see during one call.
///
/// Arguments are already marshaled out of the engine. Invokers read them
/// with [`arg`](Self::arg), reach the receiver through
/// [`with_this`](Self::with_this) and report their result with
/// [`set_return`](Self::set_return).
pub struct CallContext<'a> {
    args: &'a [Dynamic],
    this: Option<ObjectHandle>,
    heap: &'a mut ObjectHeap,
    types: &'a dyn DescriptorSource,
    return_slot: Dynamic,
}

impl<'a> CallContext<'a> {
    pub fn new(
        args: &'a [Dynamic],
        this: Option<ObjectHandle>,
        heap: &'a mut ObjectHeap,
        types: &'a dyn DescriptorSource,
    ) -> Self {
        Self {
            args,
            this,
            heap,
            types,
            return_slot: Dynamic::Void,
        }
    }

    /// Number of arguments passed by the caller.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Raw argument `index`, before conversion.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.args.len(),
            })
    }

    /// Convert argument `index` to `T`.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    pub fn set_return_slot(&mut self, slot: Dynamic) {
        self.return_slot = slot;
    }

    /// Convert `value` and store it as the call's result.
    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        self.return_slot = value.into_dynamic();
    }

    /// Take the return value, leaving `Void` behind.
    pub fn take_return(&mut self) -> Dynamic {
        std::mem::take(&mut self.return_slot)
    }

    /// The receiver of an instance call.
    pub fn this_handle(&self) -> Result<ObjectHandle, NativeError> {
        self.this.ok_or_else(|| NativeError::InvalidThis {
            message: "static call has no receiver".to_owned(),
        })
    }

    pub fn with_this<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        let handle = self.this_handle()?;
        self.heap.with_ref(handle, f)
    }

    pub fn with_this_mut<T: Any, R>(
        &mut self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, NativeError> {
        let handle = self.this_handle()?;
        self.heap.with_mut(handle, f)
    }

    /// Borrow another native object passed as an argument.
    pub fn with_object<T: NativeType, R>(
        &self,
        handle: Handle<T>,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, NativeError> {
        self.heap.with_ref(handle.raw(), f)
    }

    /// Wrap a native value produced by this call so it can be returned to
    /// script. The new wrapper belongs to the calling mapper.
    pub fn adopt<T: NativeType>(&mut self, value: T) -> Result<Handle<T>, NativeError> {
        let descriptor = self.descriptor_of::<T>()?;
        Ok(Handle::from_handle(self.heap.allocate(descriptor, value)))
    }

    /// Like [`adopt`](Self::adopt) for an instance the host keeps shared.
    pub fn adopt_shared<T: NativeType>(
        &mut self,
        value: Arc<Mutex<T>>,
    ) -> Result<Handle<T>, NativeError> {
        let descriptor = self.descriptor_of::<T>()?;
        Ok(Handle::from_handle(self.heap.allocate_shared(descriptor, value)))
    }

    fn descriptor_of<T: NativeType>(&self) -> Result<Arc<TypeDescriptor>, NativeError> {
        self.types
            .descriptor_for(TypeId::of::<T>())
            .ok_or(NativeError::Unregistered { type_name: T::NAME })
    }

    /// The calling mapper's heap.
    pub fn heap(&self) -> &ObjectHeap {
        self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        self.heap
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("args", &self.args)
            .field("this", &self.this)
            .field("return_slot", &self.return_slot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i32,
    }
    crate::native_type!(Point);

    fn point_types() -> Vec<Arc<TypeDescriptor>> {
        vec![Arc::new(TypeDescriptor::new::<Point>())]
    }

    #[test]
    fn arg_out_of_bounds() {
        let mut heap = ObjectHeap::new();
        let ctx = CallContext::new(&[], None, &mut heap, &());
        assert_eq!(
            ctx.arg::<i32>(0),
            Err(NativeError::ArgumentIndexOutOfBounds { index: 0, count: 0 })
        );
    }

    #[test]
    fn static_call_has_no_this() {
        let mut heap = ObjectHeap::new();
        let ctx = CallContext::new(&[], None, &mut heap, &());
        assert!(matches!(
            ctx.with_this::<Point, _>(|p| p.x),
            Err(NativeError::InvalidThis { .. })
        ));
    }

    #[test]
    fn this_mut_reaches_instance() {
        let types = point_types();
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(Arc::clone(&types[0]), Point { x: 1 });
        let args = [Dynamic::Int(9)];
        let mut ctx = CallContext::new(&args, Some(handle), &mut heap, &types);
        let value: i32 = ctx.arg(0).unwrap();
        ctx.with_this_mut::<Point, _>(|p| p.x = value).unwrap();
        assert_eq!(ctx.with_this::<Point, _>(|p| p.x).unwrap(), 9);
    }

    #[test]
    fn adopt_requires_registration() {
        let mut heap = ObjectHeap::new();
        let mut ctx = CallContext::new(&[], None, &mut heap, &());
        assert_eq!(
            ctx.adopt(Point { x: 0 }).map(|_| ()),
            Err(NativeError::Unregistered { type_name: "Point" })
        );
    }

    #[test]
    fn adopt_allocates_unrooted_wrapper() {
        let types = point_types();
        let mut heap = ObjectHeap::new();
        let mut ctx = CallContext::new(&[], None, &mut heap, &types);
        let handle = ctx.adopt(Point { x: 4 }).unwrap();
        assert_eq!(ctx.with_object(handle, |p| p.x).unwrap(), 4);
        assert_eq!(heap.ref_count(handle.raw()), Some(0));
    }
}
