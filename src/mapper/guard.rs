//! Finalization guards tying script object lifetime to wrapper refcounts.

use std::rc::Weak;

use jsbridge_core::ObjectHandle;

use super::MapperShared;

/// Owned by the native closure stored on one script object.
///
/// QuickJS drops the closure, and with it the guard, when that object is
/// collected. Dropping releases the object's wrapper reference, or queues
/// the release if the mapper is mid-dispatch.
pub(crate) struct FinalizeGuard {
    mapper: Weak<MapperShared>,
    handle: ObjectHandle,
}

impl FinalizeGuard {
    pub fn new(mapper: Weak<MapperShared>, handle: ObjectHandle) -> Self {
        Self { mapper, handle }
    }

    /// Whether the wrapper this guard pins is still tracked.
    pub fn is_attached(&self) -> bool {
        self.mapper
            .upgrade()
            .is_some_and(|mapper| mapper.is_tracked(self.handle))
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        if let Some(mapper) = self.mapper.upgrade() {
            mapper.release_or_defer(self.handle);
        }
    }
}
