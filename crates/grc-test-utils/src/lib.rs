//! Testing utilities for the GRC loader workspace
//!
//! Record fixtures and a [`Harness`] wiring repository, in-memory backend and
//! binding registry together.

#![allow(missing_docs)]

use grc_loaders::{
    BindingRegistry, IndirectListLoader, JoinAttr, LoaderContext, Relationships,
};
use grc_model::{InstanceKey, InstanceRef};
use grc_query::{
    DefaultSnapshotTransform, MemoryBackend, PageContext, Repository, StaticPageContext,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn control(id: u64) -> Value {
    json!({"type": "Control", "id": id, "title": format!("Control {id}")})
}

pub fn person(id: u64) -> Value {
    json!({"type": "Person", "id": id, "email": format!("user{id}@example.com")})
}

pub fn object_person(id: u64, control_id: u64, person_id: u64) -> Value {
    json!({"type": "ObjectPerson", "id": id, "control_id": control_id, "person_id": person_id})
}

pub fn record(object_type: &str, id: u64) -> Value {
    json!({"type": object_type, "id": id, "title": format!("{object_type} {id}")})
}

pub fn snapshot_record(id: u64, child_type: &str, child_id: u64) -> Value {
    json!({
        "type": "Snapshot",
        "id": id,
        "child_type": child_type,
        "child_id": child_id,
        "revision": {"content": {"title": format!("{child_type} {child_id} (frozen)")}},
    })
}

/// `Control.owners`: people joined through `ObjectPerson`
pub fn owners_loader() -> IndirectListLoader {
    IndirectListLoader::new(
        "ObjectPerson",
        JoinAttr::id("control_id", "Control"),
        JoinAttr::id("person_id", "Person"),
    )
}

pub fn key(object_type: &str, id: u64) -> InstanceKey {
    InstanceKey::new(object_type, id)
}

/// Whole loader stack over a [`MemoryBackend`]
#[derive(Debug)]
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub registry: BindingRegistry,
}

impl Harness {
    /// Dashboard page, no snapshot types
    pub fn new(relationships: Relationships) -> Self {
        Self::with_page(relationships, StaticPageContext::dashboard(), Vec::<&str>::new())
    }

    pub fn with_page<P, I, T>(relationships: Relationships, page: P, snapshot_types: I) -> Self
    where
        P: PageContext + 'static,
        I: IntoIterator<Item = T>,
        T: Into<grc_model::ObjectType>,
    {
        let backend = Arc::new(MemoryBackend::new());
        let repository = Repository::with_backend(backend.clone());
        let context = LoaderContext::new(
            repository,
            backend.clone(),
            Arc::new(DefaultSnapshotTransform::new(snapshot_types)),
            Arc::new(page),
        );
        Self {
            backend,
            registry: BindingRegistry::new(context, relationships),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.registry.context().repository
    }

    pub fn context(&self) -> &LoaderContext {
        self.registry.context()
    }

    /// Store records in the backend only
    pub fn seed(&self, records: impl IntoIterator<Item = Value>) {
        for record in records {
            self.backend.insert(record).unwrap();
        }
    }

    /// Store a record and announce its creation
    pub fn create(&self, record: Value) -> InstanceRef {
        self.backend.insert(record.clone()).unwrap();
        self.repository().created(&record).unwrap()
    }

    /// Store a new version of a record and announce the update
    pub fn update(&self, record: Value) -> InstanceRef {
        self.backend.insert(record.clone()).unwrap();
        self.repository().updated(&record).unwrap()
    }

    /// Remove a record and announce its destruction
    pub fn destroy(&self, key: &InstanceKey) {
        self.backend.remove(key);
        self.repository().destroyed(key);
    }

    /// Cached instance for a record, loaded into the cache
    pub fn load(&self, record: &Value) -> InstanceRef {
        self.repository().cache().upsert(record).unwrap()
    }
}
