//! In-memory query backend
//!
//! Serves [`ModelQuery`] and [`BatchQuery`] from a record store held in
//! memory. Used by tests and demos in place of the REST layer; failures can be
//! injected with [`MemoryBackend::fail_with`].

use crate::backend::{BatchQuery, ModelQuery};
use crate::descriptor::{BatchEntry, BatchResponse, QueryDescriptor, QueryKind, ResultSet};
use crate::error::QueryError;
use crate::filter::Filter;
use async_trait::async_trait;
use grc_model::{lookup_path, InstanceKey, ModelError, ObjectType};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Record store answering queries from memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<IndexMap<InstanceKey, Value>>,
    relationships: RwLock<HashSet<(InstanceKey, InstanceKey)>>,
    failure: RwLock<Option<String>>,
    requests: AtomicUsize,
}

impl MemoryBackend {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace a record
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn insert(&self, record: Value) -> Result<InstanceKey, ModelError> {
        let key = InstanceKey::from_record(&record)?;
        self.records.write().insert(key.clone(), record);
        Ok(key)
    }

    /// Remove a record and its relationships
    pub fn remove(&self, key: &InstanceKey) -> Option<Value> {
        self.relationships
            .write()
            .retain(|(a, b)| a != key && b != key);
        self.records.write().shift_remove(key)
    }

    /// Record a (symmetric) relationship used by `relevant` filters
    pub fn relate(&self, a: &InstanceKey, b: &InstanceKey) {
        let pair = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        self.relationships.write().insert(pair);
    }

    /// Make every following request fail with a transport error
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    /// Stop injecting failures
    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// Number of requests served (including failed ones)
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin_request(&self) -> Result<(), QueryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.failure.read().as_ref() {
            Some(message) => Err(QueryError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    fn select(&self, object_type: &ObjectType, filter: &Filter) -> Vec<Value> {
        self.records
            .read()
            .iter()
            .filter(|(key, record)| &key.object_type == object_type && self.matches(filter, key, record))
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn matches(&self, filter: &Filter, key: &InstanceKey, record: &Value) -> bool {
        match filter {
            Filter::All => true,
            Filter::Eq { attr, value } => record
                .as_object()
                .and_then(|attrs| lookup_path(attrs, attr))
                .is_some_and(|found| found == value),
            Filter::IdIn { ids } => ids.contains(&key.id),
            Filter::Relevant { object_name, ids } => ids.iter().any(|id| {
                let other = InstanceKey::new(object_name.clone(), *id);
                self.is_related(key, &other)
            }),
            Filter::And { filters } => filters.iter().all(|f| self.matches(f, key, record)),
        }
    }

    fn is_related(&self, a: &InstanceKey, b: &InstanceKey) -> bool {
        let relationships = self.relationships.read();
        relationships.contains(&(a.clone(), b.clone()))
            || relationships.contains(&(b.clone(), a.clone()))
    }

    fn result_set(&self, descriptor: &QueryDescriptor) -> ResultSet {
        let matched = self.select(&descriptor.object_name, &descriptor.filters);
        let total = matched.len();
        let page: Vec<Value> = match descriptor.limit {
            Some([from, to]) => matched
                .into_iter()
                .skip(from)
                .take(to.saturating_sub(from))
                .collect(),
            None => matched,
        };

        match descriptor.kind {
            QueryKind::Values => ResultSet {
                count: page.len(),
                values: page,
                ids: Vec::new(),
                total,
            },
            QueryKind::Ids => ResultSet {
                count: page.len(),
                ids: page
                    .iter()
                    .filter_map(|record| InstanceKey::from_record(record).ok())
                    .map(|key| key.id)
                    .collect(),
                values: Vec::new(),
                total,
            },
            QueryKind::Count => ResultSet {
                count: total,
                total,
                ..ResultSet::default()
            },
        }
    }
}

#[async_trait]
impl ModelQuery for MemoryBackend {
    async fn find_all(
        &self,
        object_type: &ObjectType,
        filter: &Filter,
    ) -> Result<Vec<Value>, QueryError> {
        self.begin_request()?;
        Ok(self.select(object_type, filter))
    }
}

#[async_trait]
impl BatchQuery for MemoryBackend {
    async fn execute(&self, descriptors: &[QueryDescriptor]) -> Result<BatchResponse, QueryError> {
        self.begin_request()?;
        Ok(descriptors
            .iter()
            .map(|descriptor| {
                BatchEntry::from([(
                    descriptor.object_name.to_string(),
                    self.result_set(descriptor),
                )])
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for id in 1..=4 {
            let status = if id % 2 == 0 { "Active" } else { "Draft" };
            backend
                .insert(json!({"type": "Objective", "id": id, "status": status}))
                .unwrap();
        }
        backend
            .insert(json!({"type": "ObjectPerson", "id": 1, "control": {"type": "Control", "id": 5}}))
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn find_all_filters_by_type_and_attr() {
        let backend = backend();
        let active = backend
            .find_all(&ObjectType::from("Objective"), &Filter::eq("status", "Active"))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);

        let nested = backend
            .find_all(&ObjectType::from("ObjectPerson"), &Filter::eq("control.id", 5))
            .await
            .unwrap();
        assert_eq!(nested.len(), 1);
    }

    #[tokio::test]
    async fn relevant_uses_relationships() {
        let backend = backend();
        let program = InstanceKey::new("Program", 1);
        backend.relate(&program, &InstanceKey::new("Objective", 3));

        let found = backend
            .find_all(&ObjectType::from("Objective"), &Filter::relevant_to(&program))
            .await
            .unwrap();
        assert_eq!(found, vec![json!({"type": "Objective", "id": 3, "status": "Draft"})]);
    }

    #[tokio::test]
    async fn batch_pages_and_counts() {
        let backend = backend();
        let response = backend
            .execute(&[
                QueryDescriptor::new("Objective").with_limit(1, 3),
                QueryDescriptor::new("Objective").with_kind(QueryKind::Count),
                QueryDescriptor::new("Objective").with_kind(QueryKind::Ids),
            ])
            .await
            .unwrap();

        let page = &response[0]["Objective"];
        assert_eq!(page.values.len(), 2);
        assert_eq!(page.total, 4);
        assert_eq!(response[1]["Objective"].count, 4);
        assert_eq!(response[2]["Objective"].ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn injected_failure_fails_requests() {
        let backend = backend();
        backend.fail_with("503");
        assert!(backend.execute(&[QueryDescriptor::new("Objective")]).await.is_err());

        backend.recover();
        assert!(backend.execute(&[QueryDescriptor::new("Objective")]).await.is_ok());
        assert_eq!(backend.request_count(), 2);
    }

    #[test]
    fn remove_drops_relationships() {
        let backend = backend();
        let a = InstanceKey::new("Objective", 1);
        let b = InstanceKey::new("Program", 1);
        backend.relate(&a, &b);
        assert!(backend.remove(&a).is_some());
        assert!(!backend.is_related(&a, &b));
    }
}
