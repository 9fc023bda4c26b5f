//! Generational arena of native object wrappers.

use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::descriptor::TypeDescriptor;
use crate::error::NativeError;
use crate::{NativeType, TypeHash};

/// Handle to a wrapper in an [`ObjectHeap`].
///
/// The generational index prevents use-after-free bugs: a handle whose slot
/// was released never resolves again, even after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into the heap's slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
    /// Rust TypeId of the native instance
    pub type_id: TypeId,
    /// Script type identity, matched against object parameter kinds
    pub type_hash: TypeHash,
}

impl ObjectHandle {
    pub fn new(index: u32, generation: u32, type_id: TypeId, type_hash: TypeHash) -> Self {
        Self {
            index,
            generation,
            type_id,
            type_hash,
        }
    }
}

/// How a wrapper holds its native instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The wrapper owns the instance; releasing it runs the destructor.
    Owned,
    /// The host keeps an `Arc<Mutex<T>>`; releasing only drops the bridge's clone.
    Shared,
}

/// One live native instance reachable from script.
pub struct NativeObjectWrapper {
    /// Published metadata of the instance's type
    descriptor: Arc<TypeDescriptor>,
    /// Whether the wrapper or the host owns the instance
    ownership: Ownership,
    /// Rust TypeId of `T`, also for shared instances
    type_id: TypeId,
    /// `T` when owned, `Arc<Mutex<T>>` when shared.
    instance: Box<dyn Any + Send + Sync>,
    /// Live script objects holding this wrapper
    script_refs: u32,
}

impl NativeObjectWrapper {
    /// Descriptor the wrapper was allocated with.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Script name of the wrapped type.
    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Number of live script objects holding this wrapper.
    pub fn script_refs(&self) -> u32 {
        self.script_refs
    }

    fn with_ref<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        match self.ownership {
            Ownership::Owned => self
                .instance
                .downcast_ref::<T>()
                .map(f)
                .ok_or_else(|| self.invalid_this::<T>()),
            Ownership::Shared => {
                let shared = self
                    .instance
                    .downcast_ref::<Arc<Mutex<T>>>()
                    .ok_or_else(|| self.invalid_this::<T>())?;
                let guard = shared.lock().map_err(|_| self.poisoned())?;
                Ok(f(&guard))
            }
        }
    }

    fn with_mut<T: Any, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R, NativeError> {
        match self.ownership {
            Ownership::Owned => match self.instance.downcast_mut::<T>() {
                Some(instance) => Ok(f(instance)),
                None => Err(self.invalid_this::<T>()),
            },
            Ownership::Shared => {
                let shared = self
                    .instance
                    .downcast_ref::<Arc<Mutex<T>>>()
                    .ok_or_else(|| self.invalid_this::<T>())?;
                let mut guard = shared.lock().map_err(|_| self.poisoned())?;
                Ok(f(&mut guard))
            }
        }
    }

    fn invalid_this<T>(&self) -> NativeError {
        NativeError::InvalidThis {
            message: format!(
                "{} instance is not a {}",
                self.descriptor.name(),
                std::any::type_name::<T>()
            ),
        }
    }

    fn poisoned(&self) -> NativeError {
        NativeError::Poisoned {
            type_name: self.descriptor.name().to_owned(),
        }
    }

    /// Run the destructor hook (owned mode only) and drop the instance.
    fn destroy(mut self) {
        if self.ownership == Ownership::Owned
            && let Some(destructor) = self.descriptor.destructor()
        {
            let instance = self.instance.as_mut();
            if panic::catch_unwind(AssertUnwindSafe(|| destructor(instance))).is_err() {
                warn!(
                    type_name = self.descriptor.name(),
                    "native destructor panicked"
                );
            }
        }
    }
}

impl fmt::Debug for NativeObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObjectWrapper")
            .field("type", &self.descriptor.name())
            .field("ownership", &self.ownership)
            .field("script_refs", &self.script_refs)
            .finish()
    }
}

/// Result of looking up a script token in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// The pair names a live wrapper.
    Live(ObjectHandle),
    /// The slot existed with this generation and was released since.
    Released,
    /// The heap never produced this index/generation pair.
    Unknown,
}

/// Heap storage for native object wrappers with generational indices.
///
/// Wrappers start with zero script references; every script object created
/// for a wrapper adds one. Dropping the count back to zero frees the slot.
pub struct ObjectHeap {
    /// Slot storage, indexed by `ObjectHandle::index`
    slots: Vec<HeapSlot>,
    /// Indices of empty slots, reused before growing
    free_list: Vec<u32>,
    /// Number of occupied slots
    live: usize,
    /// Handles allocated since [`ObjectHeap::track_allocations`]
    journal: Option<Vec<ObjectHandle>>,
}

struct HeapSlot {
    /// Bumped whenever the slot is freed
    generation: u32,
    wrapper: Option<NativeObjectWrapper>,
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            journal: None,
        }
    }

    /// Store an owned native instance.
    pub fn allocate<T: NativeType>(
        &mut self,
        descriptor: Arc<TypeDescriptor>,
        value: T,
    ) -> ObjectHandle {
        self.insert(descriptor, TypeId::of::<T>(), Ownership::Owned, Box::new(value))
    }

    /// Store a clone of a host-shared instance.
    pub fn allocate_shared<T: NativeType>(
        &mut self,
        descriptor: Arc<TypeDescriptor>,
        value: Arc<Mutex<T>>,
    ) -> ObjectHandle {
        self.insert(descriptor, TypeId::of::<T>(), Ownership::Shared, Box::new(value))
    }

    fn insert(
        &mut self,
        descriptor: Arc<TypeDescriptor>,
        type_id: TypeId,
        ownership: Ownership,
        instance: Box<dyn Any + Send + Sync>,
    ) -> ObjectHandle {
        let type_hash = descriptor.hash();
        let wrapper = NativeObjectWrapper {
            descriptor,
            ownership,
            type_id,
            instance,
            script_refs: 0,
        };
        self.live += 1;

        let handle = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.wrapper = Some(wrapper);
            ObjectHandle::new(index, slot.generation, type_id, type_hash)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                wrapper: Some(wrapper),
            });
            ObjectHandle::new(index, 0, type_id, type_hash)
        };
        if let Some(journal) = &mut self.journal {
            journal.push(handle);
        }
        handle
    }

    /// Start recording every handle allocated from now on, discarding any
    /// earlier record.
    pub fn track_allocations(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Stop recording and return the handles allocated since
    /// [`track_allocations`](Self::track_allocations).
    pub fn take_allocations(&mut self) -> Vec<ObjectHandle> {
        self.journal.take().unwrap_or_default()
    }

    /// Free each handle that is still live with no script references.
    ///
    /// Returns how many wrappers were freed.
    pub fn free_unrooted(&mut self, handles: &[ObjectHandle]) -> usize {
        handles
            .iter()
            .filter(|&&handle| self.ref_count(handle) == Some(0) && self.free(handle))
            .count()
    }

    /// Get the wrapper behind a live handle.
    pub fn get(&self, handle: ObjectHandle) -> Option<&NativeObjectWrapper> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.wrapper.as_ref()
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut NativeObjectWrapper> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.wrapper.as_mut()
    }

    /// Whether `handle` still names a live wrapper.
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Classify an index/generation pair carried by a script token.
    pub fn resolve(&self, index: u32, generation: u32) -> SlotState {
        let Some(slot) = self.slots.get(index as usize) else {
            return SlotState::Unknown;
        };
        match &slot.wrapper {
            Some(wrapper) if slot.generation == generation => SlotState::Live(ObjectHandle::new(
                index,
                generation,
                wrapper.type_id,
                wrapper.descriptor.hash(),
            )),
            _ if generation < slot.generation => SlotState::Released,
            _ => SlotState::Unknown,
        }
    }

    /// Borrow the native instance behind `handle`.
    pub fn with_ref<T: Any, R>(
        &self,
        handle: ObjectHandle,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, NativeError> {
        self.get(handle)
            .ok_or(NativeError::StaleHandle {
                index: handle.index,
            })?
            .with_ref(f)
    }

    /// Mutably borrow the native instance behind `handle`.
    pub fn with_mut<T: Any, R>(
        &mut self,
        handle: ObjectHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, NativeError> {
        self.get_mut(handle)
            .ok_or(NativeError::StaleHandle {
                index: handle.index,
            })?
            .with_mut(f)
    }

    /// Increment the script reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        match self.get_mut(handle) {
            Some(wrapper) => {
                wrapper.script_refs = wrapper.script_refs.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement the script reference count, free if zero.
    ///
    /// Returns true if the wrapper was freed.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        let Some(wrapper) = self.get_mut(handle) else {
            return false;
        };
        wrapper.script_refs = wrapper.script_refs.saturating_sub(1);
        if wrapper.script_refs == 0 {
            self.free(handle)
        } else {
            false
        }
    }

    /// Free a wrapper immediately, regardless of its reference count.
    pub fn free(&mut self, handle: ObjectHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        match slot.wrapper.take() {
            Some(wrapper) => {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(handle.index);
                self.live -= 1;
                wrapper.destroy();
                true
            }
            None => false,
        }
    }

    /// Get the script reference count.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.get(handle).map(NativeObjectWrapper::script_refs)
    }

    /// Free every live wrapper. Returns how many were freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(wrapper) = slot.wrapper.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
                freed.push(wrapper);
            }
        }
        self.live = 0;
        let count = freed.len();
        for wrapper in freed {
            wrapper.destroy();
        }
        count
    }

    /// Number of live wrappers.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no wrapper is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total slot capacity (including free slots).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("live", &self.live)
            .field("capacity", &self.slots.len())
            .field("free_slots", &self.free_list.len())
            .finish()
    }
}
