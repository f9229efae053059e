//! Identity arena for live instances
//!
//! Provides [`InstanceCache`], which hands out at most one live [`Instance`]
//! per `(type, id)` and merges fresher data into it in place.

use crate::error::ModelError;
use crate::instance::{Attributes, Instance, InstanceRef};
use crate::key::InstanceKey;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live instances
    pub entry_count: usize,
    /// How many of them are still stubs
    pub stub_count: usize,
}

/// Identity cache keyed by `(type, id)`
///
/// Injected into loaders and the repository instead of living in global
/// state. Every path that materializes a record goes through [`upsert`], so
/// two holders of the same identity always share one object.
///
/// [`upsert`]: InstanceCache::upsert
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: DashMap<InstanceKey, InstanceRef>,
}

impl InstanceCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Look up a live instance
    #[inline]
    #[must_use]
    pub fn get(&self, key: &InstanceKey) -> Option<InstanceRef> {
        self.instances.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the live instance for `key`, creating a stub if none exists
    #[must_use]
    pub fn get_or_stub(&self, key: &InstanceKey) -> InstanceRef {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        Arc::clone(
            self.instances
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Instance::stub(key.clone())))
                .value(),
        )
    }

    /// Materialize a raw record, merging into the live instance if present
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn upsert(&self, record: &Value) -> Result<InstanceRef, ModelError> {
        self.upsert_with_previous(record).map(|(instance, _)| instance)
    }

    /// Like [`upsert`](Self::upsert), also returning the attributes the live
    /// instance had before the merge (`None` if it was newly created)
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn upsert_with_previous(
        &self,
        record: &Value,
    ) -> Result<(InstanceRef, Option<Attributes>), ModelError> {
        let key = InstanceKey::from_record(record)?;

        if let Some(existing) = self.get(&key) {
            let previous = existing.merge(record)?;
            return Ok((existing, Some(previous)));
        }

        let fresh = Arc::new(Instance::from_record(record)?);
        let live = Arc::clone(
            self.instances
                .entry(key)
                .or_insert_with(|| Arc::clone(&fresh))
                .value(),
        );

        if Arc::ptr_eq(&live, &fresh) {
            Ok((live, None))
        } else {
            // Lost a race against another materialization of the same key
            let previous = live.merge(record)?;
            Ok((live, Some(previous)))
        }
    }

    /// Drop an instance from the cache
    #[inline]
    pub fn remove(&self, key: &InstanceKey) -> Option<InstanceRef> {
        self.instances.remove(key).map(|(_, instance)| instance)
    }

    /// Check if an identity is live
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Number of live instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if cache is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let stub_count = self
            .instances
            .iter()
            .filter(|entry| entry.value().is_stub())
            .count();
        CacheStats {
            entry_count: self.instances.len(),
            stub_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_returns_same_object_per_identity() {
        let cache = InstanceCache::new();
        let a = cache.get_or_stub(&InstanceKey::new("Control", 1));
        let b = cache.get_or_stub(&InstanceKey::new("Control", 1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn upsert_merges_into_stub() {
        let cache = InstanceCache::new();
        let stub = cache.get_or_stub(&InstanceKey::new("Control", 1));

        let (loaded, previous) = cache
            .upsert_with_previous(&json!({"type": "Control", "id": 1, "title": "T"}))
            .unwrap();

        assert!(Arc::ptr_eq(&stub, &loaded));
        assert!(previous.is_some());
        assert_eq!(stub.attr("title"), Some(json!("T")));
    }

    #[test]
    fn upsert_creates_when_absent() {
        let cache = InstanceCache::new();
        let (inst, previous) = cache
            .upsert_with_previous(&json!({"type": "Person", "id": 3}))
            .unwrap();
        assert!(previous.is_none());
        assert!(!inst.is_stub());
        assert!(cache.contains(inst.key()));
    }

    #[test]
    fn upsert_rejects_record_without_id() {
        let cache = InstanceCache::new();
        assert!(cache.upsert(&json!({"type": "Person"})).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn stats_count_stubs() {
        let cache = InstanceCache::new();
        let _ = cache.get_or_stub(&InstanceKey::new("Person", 1));
        cache.upsert(&json!({"type": "Person", "id": 2})).unwrap();

        assert_eq!(
            cache.stats(),
            CacheStats {
                entry_count: 2,
                stub_count: 1
            }
        );
    }

    #[test]
    fn remove_evicts() {
        let cache = InstanceCache::new();
        let key = InstanceKey::new("Person", 1);
        let _ = cache.get_or_stub(&key);
        assert!(cache.remove(&key).is_some());
        assert!(cache.get(&key).is_none());
    }
}
