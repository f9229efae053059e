//! Repository service
//!
//! Joins the identity cache, the lifecycle event bus and a query backend.
//! Everything that materializes records or announces lifecycle changes goes
//! through here, so the cache stays the single source of live instances and
//! every change reaches the loaders listening on the bus.

use crate::backend::ModelQuery;
use crate::error::QueryError;
use crate::filter::Filter;
use grc_model::{
    EventBus, InstanceCache, InstanceKey, InstanceRef, ModelEvent, ModelEventKind, ObjectType,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache + event bus + query backend
#[derive(Debug, Clone)]
pub struct Repository {
    cache: Arc<InstanceCache>,
    events: Arc<EventBus>,
    backend: Arc<dyn ModelQuery>,
}

impl Repository {
    /// Create repository over explicit collaborators
    #[must_use]
    pub fn new(
        cache: Arc<InstanceCache>,
        events: Arc<EventBus>,
        backend: Arc<dyn ModelQuery>,
    ) -> Self {
        Self {
            cache,
            events,
            backend,
        }
    }

    /// Create repository with a fresh cache and event bus
    #[must_use]
    pub fn with_backend(backend: Arc<dyn ModelQuery>) -> Self {
        Self::new(
            Arc::new(InstanceCache::new()),
            Arc::new(EventBus::new()),
            backend,
        )
    }

    /// Identity cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<InstanceCache> {
        &self.cache
    }

    /// Lifecycle event bus
    #[inline]
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Query a type and materialize the results into the cache
    ///
    /// # Errors
    /// Returns error if the query fails or a record has no identity
    pub async fn find_all(
        &self,
        object_type: &ObjectType,
        filter: &Filter,
    ) -> Result<Vec<InstanceRef>, QueryError> {
        let records = self.backend.find_all(object_type, filter).await?;
        tracing::debug!(%object_type, count = records.len(), "find_all completed");
        records
            .iter()
            .map(|record| self.cache.upsert(record).map_err(QueryError::from))
            .collect()
    }

    /// Load full data for every stub among `instances`
    ///
    /// Issues one id query per model type. Returns the number of stubs asked for.
    ///
    /// # Errors
    /// Returns error if any query fails
    pub async fn reify(&self, instances: &[InstanceRef]) -> Result<usize, QueryError> {
        let mut stubs: BTreeMap<ObjectType, Vec<u64>> = BTreeMap::new();
        for instance in instances.iter().filter(|i| i.is_stub() && !i.is_snapshot()) {
            let key = instance.key();
            let ids = stubs.entry(key.object_type.clone()).or_default();
            if !ids.contains(&key.id) {
                ids.push(key.id);
            }
        }

        let mut requested = 0;
        for (object_type, ids) in stubs {
            requested += ids.len();
            self.find_all(&object_type, &Filter::id_in(ids)).await?;
        }
        Ok(requested)
    }

    /// Materialize a newly created record and announce it
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn created(&self, record: &Value) -> Result<InstanceRef, QueryError> {
        let instance = self.cache.upsert(record)?;
        self.publish(ModelEventKind::Created, &instance);
        Ok(instance)
    }

    /// Merge an updated record and announce it with its previous attributes
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn updated(&self, record: &Value) -> Result<InstanceRef, QueryError> {
        let (instance, previous) = self.cache.upsert_with_previous(record)?;
        self.publish(
            ModelEventKind::Updated {
                previous: previous.unwrap_or_default(),
            },
            &instance,
        );
        Ok(instance)
    }

    /// Evict a deleted instance and announce it
    ///
    /// Returns `None` if the identity was not live.
    pub fn destroyed(&self, key: &InstanceKey) -> Option<InstanceRef> {
        let instance = self.cache.remove(key)?;
        self.publish(ModelEventKind::Destroyed, &instance);
        Some(instance)
    }

    /// Evict a join record whose endpoint disappeared and announce it
    ///
    /// Returns `None` if the identity was not live.
    pub fn orphaned(&self, key: &InstanceKey) -> Option<InstanceRef> {
        let instance = self.cache.remove(key)?;
        self.publish(ModelEventKind::Orphaned, &instance);
        Some(instance)
    }

    fn publish(&self, kind: ModelEventKind, instance: &InstanceRef) {
        self.events
            .publish(&ModelEvent::new(kind, Arc::clone(instance)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use parking_lot::Mutex;
    use serde_json::json;

    fn repository() -> (Arc<MemoryBackend>, Repository) {
        let backend = Arc::new(MemoryBackend::new());
        let repo = Repository::with_backend(Arc::clone(&backend) as Arc<dyn ModelQuery>);
        (backend, repo)
    }

    #[tokio::test]
    async fn find_all_materializes_into_cache() {
        let (backend, repo) = repository();
        backend.insert(json!({"type": "Control", "id": 1, "title": "A"})).unwrap();
        backend.insert(json!({"type": "Control", "id": 2, "title": "B"})).unwrap();

        let found = repo
            .find_all(&ObjectType::from("Control"), &Filter::id_in([2]))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(
            &found[0],
            &repo.cache().get(&InstanceKey::new("Control", 2)).unwrap()
        ));
    }

    #[tokio::test]
    async fn reify_loads_stubs_in_place() {
        let (backend, repo) = repository();
        backend.insert(json!({"type": "Person", "id": 9, "name": "Ann"})).unwrap();
        let stub = repo.cache().get_or_stub(&InstanceKey::new("Person", 9));

        let requested = repo.reify(&[Arc::clone(&stub), Arc::clone(&stub)]).await.unwrap();

        assert_eq!(requested, 1);
        assert!(!stub.is_stub());
        assert_eq!(stub.attr("name"), Some(json!("Ann")));
    }

    #[tokio::test]
    async fn find_all_propagates_failure() {
        let (backend, repo) = repository();
        backend.fail_with("offline");

        let err = repo
            .find_all(&ObjectType::from("Control"), &Filter::All)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn lifecycle_events_are_published() {
        let (_backend, repo) = repository();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            repo.events()
                .subscribe(&ObjectType::from("ObjectPerson"), move |event| {
                    seen.lock().push(event.name());
                })
        };

        let record = json!({"type": "ObjectPerson", "id": 1, "control_id": 5});
        repo.created(&record).unwrap();
        repo.updated(&json!({"type": "ObjectPerson", "id": 1, "control_id": 6}))
            .unwrap();
        let key = InstanceKey::new("ObjectPerson", 1);
        assert!(repo.destroyed(&key).is_some());
        assert!(repo.destroyed(&key).is_none());

        assert_eq!(*seen.lock(), vec!["created", "updated", "destroyed"]);
    }
}
