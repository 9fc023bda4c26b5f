//! Engine-independent dispatch of script operations to native code.
//!
//! [`ObjectTable`] owns one context's [`ObjectHeap`] and turns the
//! operations a script can perform on bridged objects (construct, call,
//! property get and set) into native invocations. The QuickJS mapper only
//! marshals values in and out; every rule about overloads, handles and
//! errors lives here.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use jsbridge_core::{
    BridgeError, CallContext, Dynamic, NativeError, NativeFn, NativeType, ObjectHandle, ObjectHeap,
    Overload, Resolution, SlotState, TypeDescriptor, TypeHash, resolve_overload, signature,
};

use crate::config::RegistrySource;

/// Per-context table of native object wrappers.
pub struct ObjectTable {
    /// Where published descriptors are looked up
    registry: RegistrySource,
    /// Wrappers reachable from this table's context
    heap: ObjectHeap,
    /// Turn native panics into `NativeError` results
    catch_panics: bool,
}

impl ObjectTable {
    /// An empty table reading descriptors from `registry`.
    pub fn new(registry: RegistrySource, catch_panics: bool) -> Self {
        Self {
            registry,
            heap: ObjectHeap::new(),
            catch_panics,
        }
    }

    /// Look up a published type by script name.
    pub fn descriptor(&self, name: &str) -> Result<Arc<TypeDescriptor>, BridgeError> {
        self.registry
            .get()
            .lookup_name(name)
            .ok_or_else(|| BridgeError::UnknownType {
                name: name.to_owned(),
            })
    }

    /// Run a constructor. The new wrapper has no script references yet.
    ///
    /// Wrappers the constructor allocated are freed again when it fails or
    /// returns something other than a new instance of `descriptor`.
    pub fn construct(
        &mut self,
        descriptor: &TypeDescriptor,
        args: &[Dynamic],
    ) -> Result<ObjectHandle, BridgeError> {
        let overload = select(descriptor, "constructor", descriptor.constructors(), args)?;
        let (result, allocated) =
            self.invoke_tracked(descriptor, "constructor", &overload.invoker, None, args);
        let failure = match result {
            Ok(value) => match value.as_handle() {
                Some(handle) if handle.type_id == descriptor.type_id() => return Ok(handle),
                _ => native_failure(
                    descriptor,
                    "constructor",
                    NativeError::other("constructor did not return a new instance"),
                ),
            },
            Err(err) => err,
        };
        self.discard(descriptor, "constructor", &allocated);
        Err(failure)
    }

    /// Call a static function.
    pub fn call_static(
        &mut self,
        descriptor: &TypeDescriptor,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, BridgeError> {
        let overloads = descriptor
            .function(name)
            .ok_or_else(|| no_such_member(descriptor, name))?;
        let overload = select(descriptor, name, overloads, args)?;
        self.invoke(descriptor, name, &overload.invoker, None, args)
    }

    /// Call an instance method on a live wrapper.
    pub fn call_method(
        &mut self,
        this: ObjectHandle,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, BridgeError> {
        let descriptor = self.descriptor_of(this)?;
        let overloads = descriptor
            .method(name)
            .ok_or_else(|| no_such_member(&descriptor, name))?;
        let overload = select(&descriptor, name, overloads, args)?;
        self.invoke(&descriptor, name, &overload.invoker, Some(this), args)
    }

    /// Read a property through its getter.
    pub fn get_property(&mut self, this: ObjectHandle, name: &str) -> Result<Dynamic, BridgeError> {
        let descriptor = self.descriptor_of(this)?;
        let property = descriptor
            .property(name)
            .ok_or_else(|| no_such_member(&descriptor, name))?;
        self.invoke(&descriptor, name, &property.getter, Some(this), &[])
    }

    /// Write a property through its setter, checking the value's kind first.
    pub fn set_property(
        &mut self,
        this: ObjectHandle,
        name: &str,
        value: Dynamic,
    ) -> Result<(), BridgeError> {
        let descriptor = self.descriptor_of(this)?;
        let property = descriptor
            .property(name)
            .ok_or_else(|| no_such_member(&descriptor, name))?;
        let Some(setter) = &property.setter else {
            return Err(BridgeError::ReadOnlyProperty {
                type_name: descriptor.name().to_owned(),
                member: name.to_owned(),
            });
        };
        if !property.kind.accepts(&value, true) {
            return Err(BridgeError::TypeMismatch {
                type_name: descriptor.name().to_owned(),
                member: name.to_owned(),
                detail: format!("expected {}, got {}", property.kind, describe(&value)),
            });
        }
        self.invoke(&descriptor, name, setter, Some(this), &[value])
            .map(|_| ())
    }

    /// Wrap a natively constructed instance (owned mode).
    pub fn adopt<T: NativeType>(&mut self, value: T) -> Result<ObjectHandle, BridgeError> {
        let descriptor = self.registered::<T>()?;
        Ok(self.heap.allocate(descriptor, value))
    }

    /// Wrap an instance the host keeps shared.
    pub fn adopt_shared<T: NativeType>(
        &mut self,
        value: Arc<Mutex<T>>,
    ) -> Result<ObjectHandle, BridgeError> {
        let descriptor = self.registered::<T>()?;
        Ok(self.heap.allocate_shared(descriptor, value))
    }

    fn registered<T: NativeType>(&self) -> Result<Arc<TypeDescriptor>, BridgeError> {
        self.registry
            .get()
            .lookup_type::<T>()
            .ok_or_else(|| BridgeError::UnknownType {
                name: T::NAME.to_owned(),
            })
    }

    /// Resolve the slot part of a script token.
    pub fn resolve(&self, index: u32, generation: u32) -> Result<ObjectHandle, BridgeError> {
        match self.heap.resolve(index, generation) {
            SlotState::Live(handle) => Ok(handle),
            SlotState::Released => Err(BridgeError::UseAfterFree { index }),
            SlotState::Unknown => Err(BridgeError::invalid_handle(format!(
                "slot {index} generation {generation} was never allocated"
            ))),
        }
    }

    /// Type name of a live wrapper.
    pub fn type_name(&self, handle: ObjectHandle) -> Option<&str> {
        self.heap.get(handle).map(|wrapper| wrapper.type_name())
    }

    /// Record one more script object for `handle`.
    pub fn retain(&mut self, handle: ObjectHandle) -> bool {
        self.heap.add_ref(handle)
    }

    /// Drop one script reference. Returns true if the wrapper was freed.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        let freed = self.heap.release(handle);
        if freed {
            trace!(index = handle.index, "released native object");
        }
        freed
    }

    /// Free every wrapper regardless of script reachability.
    pub fn sweep(&mut self) -> usize {
        self.heap.sweep()
    }

    /// Number of live wrappers.
    pub fn live_objects(&self) -> usize {
        self.heap.len()
    }

    /// Read access to the underlying heap.
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    fn descriptor_of(&self, handle: ObjectHandle) -> Result<Arc<TypeDescriptor>, BridgeError> {
        self.heap
            .get(handle)
            .map(|wrapper| Arc::clone(wrapper.descriptor()))
            .ok_or(BridgeError::UseAfterFree {
                index: handle.index,
            })
    }

    /// Run one native call, freeing what it allocated if it fails.
    fn invoke(
        &mut self,
        descriptor: &TypeDescriptor,
        member: &str,
        invoker: &NativeFn,
        this: Option<ObjectHandle>,
        args: &[Dynamic],
    ) -> Result<Dynamic, BridgeError> {
        let (result, allocated) = self.invoke_tracked(descriptor, member, invoker, this, args);
        if result.is_err() {
            self.discard(descriptor, member, &allocated);
        }
        result
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke_tracked(
        &mut self,
        descriptor: &TypeDescriptor,
        member: &str,
        invoker: &NativeFn,
        this: Option<ObjectHandle>,
        args: &[Dynamic],
    ) -> (Result<Dynamic, BridgeError>, Vec<ObjectHandle>) {
        trace!(
            type_name = descriptor.name(),
            member,
            member_hash = %TypeHash::from_member(descriptor.hash(), member),
            args = args.len(),
            "dispatch"
        );
        let registry = self.registry.get();
        self.heap.track_allocations();
        let mut ctx = CallContext::new(args, this, &mut self.heap, registry);
        let outcome = if self.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(|| invoker.call(&mut ctx))).unwrap_or_else(
                |payload| {
                    Err(NativeError::Panic {
                        message: panic_message(payload.as_ref()),
                    })
                },
            )
        } else {
            invoker.call(&mut ctx)
        };
        let result = match outcome {
            Ok(()) => Ok(ctx.take_return()),
            Err(NativeError::Conversion(err)) => Err(BridgeError::TypeMismatch {
                type_name: descriptor.name().to_owned(),
                member: member.to_owned(),
                detail: err.to_string(),
            }),
            Err(err) => Err(native_failure(descriptor, member, err)),
        };
        (result, self.heap.take_allocations())
    }

    /// Free wrappers a failed call allocated that no script object holds.
    fn discard(&mut self, descriptor: &TypeDescriptor, member: &str, allocated: &[ObjectHandle]) {
        let freed = self.heap.free_unrooted(allocated);
        if freed > 0 {
            debug!(
                type_name = descriptor.name(),
                member, freed, "freed wrappers allocated by a failed call"
            );
        }
    }
}

fn select<'o>(
    descriptor: &TypeDescriptor,
    member: &str,
    overloads: &'o [Overload],
    args: &[Dynamic],
) -> Result<&'o Overload, BridgeError> {
    match resolve_overload(overloads, args) {
        Resolution::Found(overload) => Ok(overload),
        Resolution::Mismatch(overload) => {
            let detail = match overload.first_mismatch(args) {
                Some((index, kind, arg)) => {
                    format!("argument {}: expected {kind}, got {}", index + 1, describe(arg))
                }
                None => format!("arguments do not match {}", overload.signature()),
            };
            Err(BridgeError::TypeMismatch {
                type_name: descriptor.name().to_owned(),
                member: member.to_owned(),
                detail,
            })
        }
        Resolution::NoMatch => Err(BridgeError::NoMatchingOverload {
            type_name: descriptor.name().to_owned(),
            member: member.to_owned(),
            signature: signature(args.iter().map(Dynamic::type_name)),
        }),
    }
}

fn describe(value: &Dynamic) -> String {
    match value {
        Dynamic::String(s) => format!("string '{s}'"),
        Dynamic::Void | Dynamic::Null | Dynamic::Object(_) => value.type_name().to_owned(),
        other => format!("{} {other}", other.type_name()),
    }
}

fn no_such_member(descriptor: &TypeDescriptor, member: &str) -> BridgeError {
    BridgeError::NoSuchMember {
        type_name: descriptor.name().to_owned(),
        member: member.to_owned(),
    }
}

fn native_failure(descriptor: &TypeDescriptor, member: &str, source: NativeError) -> BridgeError {
    BridgeError::Native {
        type_name: descriptor.name().to_owned(),
        member: member.to_owned(),
        source,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
