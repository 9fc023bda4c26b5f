//! TypeRegistry - process-wide table of published type descriptors.
//!
//! Descriptors are stored by [`TypeHash`] with a secondary index by Rust
//! [`TypeId`], so the object mapper can resolve script names and native code
//! can find the descriptor of a value it wants to hand to script.
//!
//! # Thread Safety
//!
//! Unlike the per-context mapper state, the registry is shared by every
//! execution context of the process. It is guarded by an [`RwLock`]:
//! registration takes the write lock, lookups share the read lock. A
//! poisoned lock is recovered, since every write leaves the tables
//! consistent.
//!
//! # Example
//!
//! ```
//! use jsbridge_core::{TypeDescriptor, TypeHash};
//! use jsbridge_registry::TypeRegistry;
//!
//! struct Point;
//! jsbridge_core::native_type!(Point);
//!
//! let registry = TypeRegistry::new();
//! registry.register(TypeDescriptor::new::<Point>());
//! assert!(registry.lookup(TypeHash::from_name("Point")).is_some());
//! assert!(registry.lookup_type::<Point>().is_some());
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use jsbridge_core::{DescriptorSource, NativeType, TypeDescriptor, TypeHash};

#[derive(Default)]
struct Tables {
    /// Descriptors by script name hash
    types: FxHashMap<TypeHash, Arc<TypeDescriptor>>,
    /// Rust type to the name it is published under
    by_type_id: FxHashMap<TypeId, TypeHash>,
}

/// Registry of published type descriptors.
#[derive(Default)]
pub struct TypeRegistry {
    tables: RwLock<Tables>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a descriptor, replacing any previous one with the same name.
    pub fn register(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.register_arc(Arc::clone(&descriptor));
        descriptor
    }

    /// Publish an already shared descriptor. Returns the one it replaced.
    pub fn register_arc(&self, descriptor: Arc<TypeDescriptor>) -> Option<Arc<TypeDescriptor>> {
        let hash = descriptor.hash();
        let mut tables = self.write();
        let previous = tables.types.insert(hash, Arc::clone(&descriptor));
        if let Some(previous) = &previous {
            warn!(
                type_name = descriptor.name(),
                previous = previous.rust_name(),
                current = descriptor.rust_name(),
                "replacing registered native type"
            );
            if tables.by_type_id.get(&previous.type_id()) == Some(&hash) {
                tables.by_type_id.remove(&previous.type_id());
            }
        } else {
            debug!(type_name = descriptor.name(), "registered native type");
        }
        tables.by_type_id.insert(descriptor.type_id(), hash);
        previous
    }

    /// Descriptor published under `hash`.
    pub fn lookup(&self, hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
        self.read().types.get(&hash).cloned()
    }

    /// Descriptor published under script name `name`.
    pub fn lookup_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.lookup(TypeHash::from_name(name))
    }

    /// Descriptor published for the Rust type `T`.
    pub fn lookup_type<T: NativeType>(&self) -> Option<Arc<TypeDescriptor>> {
        self.lookup_type_id(TypeId::of::<T>())
    }

    pub fn lookup_type_id(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        let tables = self.read();
        let hash = tables.by_type_id.get(&type_id)?;
        tables.types.get(hash).cloned()
    }

    /// Whether a type is published under `hash`.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.read().types.contains_key(&hash)
    }

    /// Unpublish a type. Wrappers already holding the descriptor keep it.
    pub fn remove(&self, hash: TypeHash) -> Option<Arc<TypeDescriptor>> {
        let mut tables = self.write();
        let removed = tables.types.remove(&hash)?;
        if tables.by_type_id.get(&removed.type_id()) == Some(&hash) {
            tables.by_type_id.remove(&removed.type_id());
        }
        debug!(type_name = removed.name(), "removed native type");
        Some(removed)
    }

    /// Number of published types.
    pub fn len(&self) -> usize {
        self.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted names of the published types.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .types
            .values()
            .map(|d| d.name().to_owned())
            .collect();
        names.sort_unstable();
        names
    }
}

impl DescriptorSource for TypeRegistry {
    fn descriptor_for(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.lookup_type_id(type_id)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    jsbridge_core::native_type!(Alpha);

    struct Beta;
    jsbridge_core::native_type!(Beta);

    struct AlphaV2;
    jsbridge_core::native_type!(AlphaV2, "Alpha");

    struct Gamma;
    jsbridge_core::native_type!(Gamma);

    struct Delta;
    jsbridge_core::native_type!(Delta);

    struct Epsilon;
    jsbridge_core::native_type!(Epsilon);

    struct Zeta;
    jsbridge_core::native_type!(Zeta);

    #[test]
    fn register_and_lookup() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new::<Alpha>());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(TypeHash::from_name("Alpha")));
        assert_eq!(registry.lookup_name("Alpha").unwrap().name(), "Alpha");
        assert!(registry.lookup_name("Beta").is_none());
        assert!(registry.lookup_type::<Alpha>().is_some());
        assert!(registry.lookup_type::<Beta>().is_none());
    }

    #[test]
    fn last_writer_wins() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new::<Alpha>());
        let previous = registry.register_arc(Arc::new(TypeDescriptor::new::<AlphaV2>()));
        assert_eq!(previous.unwrap().type_id(), TypeId::of::<Alpha>());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup_name("Alpha").unwrap().type_id(),
            TypeId::of::<AlphaV2>()
        );
        assert!(registry.lookup_type::<Alpha>().is_none());
        assert!(registry.lookup_type::<AlphaV2>().is_some());
    }

    #[test]
    fn remove_keeps_outstanding_descriptors() {
        let registry = TypeRegistry::new();
        let held = registry.register(TypeDescriptor::new::<Beta>());
        let removed = registry.remove(TypeHash::from_name("Beta")).unwrap();
        assert!(Arc::ptr_eq(&held, &removed));
        assert!(registry.is_empty());
        assert!(registry.lookup_type::<Beta>().is_none());
        assert_eq!(held.name(), "Beta");
    }

    #[test]
    fn type_names_sorted() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new::<Beta>());
        registry.register(TypeDescriptor::new::<Alpha>());
        assert_eq!(registry.type_names(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn global_is_shared() {
        assert!(std::ptr::eq(TypeRegistry::global(), TypeRegistry::global()));
    }

    #[test]
    fn concurrent_readers() {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(TypeDescriptor::new::<Alpha>());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.lookup_name("Alpha").is_some())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn concurrent_writers() {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::new::<Alpha>());
        let makers: [fn() -> TypeDescriptor; 5] = [
            TypeDescriptor::new::<Beta>,
            TypeDescriptor::new::<Gamma>,
            TypeDescriptor::new::<Delta>,
            TypeDescriptor::new::<Epsilon>,
            TypeDescriptor::new::<Zeta>,
        ];
        let barrier = std::sync::Barrier::new(makers.len());
        std::thread::scope(|scope| {
            for make in makers {
                let (registry, barrier) = (&registry, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    let published = registry.register(make());
                    assert!(registry.lookup_name("Alpha").is_some());
                    let found = registry.lookup_type_id(published.type_id()).unwrap();
                    assert!(Arc::ptr_eq(&published, &found));
                });
            }
        });
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.type_names(),
            vec!["Alpha", "Beta", "Delta", "Epsilon", "Gamma", "Zeta"]
        );
    }
}
