//! Per-value metadata pool.
//!
//! An unordered bag of typed side-channel extension objects, at most one
//! per concrete type. Constructs attach domain data here (a database
//! handle, a compiled pattern) without changing the value's shape.

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Typed extension bag.
///
/// Entries are keyed by `TypeId`, so storing a second extension of the
/// same concrete type replaces the first.
#[derive(Clone, Default)]
pub struct MetaPool {
    entries: FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl MetaPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        MetaPool {
            entries: FxHashMap::default(),
        }
    }

    /// Store an extension, replacing any existing one of the same type.
    pub fn store<T: Any + Send + Sync>(&mut self, extension: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(extension));
    }

    /// Get the extension of type `T`, if present.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// Whether an extension of type `T` is present.
    pub fn has<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Remove the extension of type `T`, returning it if present.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// Drop every extension.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no extensions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MetaPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MetaPool({} entries)", self.entries.len())
    }
}
