//! Live domain objects
//!
//! An [`Instance`] is the one in-memory object for an identity. It starts
//! either as a stub (type and id only) or fully loaded, and is mutated in place
//! when fresher data arrives so that every holder observes the update.

use crate::error::ModelError;
use crate::key::InstanceKey;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Attribute map of a record
pub type Attributes = Map<String, Value>;

/// Shared handle to a live instance
pub type InstanceRef = Arc<Instance>;

/// Single live object for one `(type, id)` identity
pub struct Instance {
    key: InstanceKey,
    attrs: RwLock<Attributes>,
    loaded: AtomicBool,
    snapshot_of: Option<InstanceKey>,
}

impl Instance {
    /// Create a stub: identity known, fields not yet fetched
    #[must_use]
    pub fn stub(key: InstanceKey) -> Self {
        let mut attrs = Attributes::new();
        attrs.insert("type".to_string(), Value::from(key.object_type.as_str()));
        attrs.insert("id".to_string(), Value::from(key.id));
        Self {
            key,
            attrs: RwLock::new(attrs),
            loaded: AtomicBool::new(false),
            snapshot_of: None,
        }
    }

    /// Create a fully loaded instance from a raw record
    ///
    /// # Errors
    /// Returns error if the record has no identity
    pub fn from_record(record: &Value) -> Result<Self, ModelError> {
        let key = InstanceKey::from_record(record)?;
        let attrs = record.as_object().cloned().ok_or(ModelError::NotAnObject)?;
        Ok(Self {
            key,
            attrs: RwLock::new(attrs),
            loaded: AtomicBool::new(true),
            snapshot_of: None,
        })
    }

    /// Create a frozen snapshot of another object's content
    ///
    /// `key` is the snapshot's own identity; `of` names the object it captures.
    #[must_use]
    pub fn snapshot(key: InstanceKey, of: InstanceKey, content: Attributes) -> Self {
        Self {
            key,
            attrs: RwLock::new(content),
            loaded: AtomicBool::new(true),
            snapshot_of: Some(of),
        }
    }

    /// Identity of this instance
    #[inline]
    #[must_use]
    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    /// Identity of the object this instance represents
    ///
    /// For snapshots that is the captured object, otherwise the instance itself.
    #[inline]
    #[must_use]
    pub fn logical_key(&self) -> &InstanceKey {
        self.snapshot_of.as_ref().unwrap_or(&self.key)
    }

    /// Whether only the identity is known
    #[inline]
    #[must_use]
    pub fn is_stub(&self) -> bool {
        !self.loaded.load(Ordering::Acquire)
    }

    /// Whether this is a snapshot representation
    #[inline]
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.snapshot_of.is_some()
    }

    /// Captured object identity, for snapshots
    #[inline]
    #[must_use]
    pub fn snapshot_of(&self) -> Option<&InstanceKey> {
        self.snapshot_of.as_ref()
    }

    /// Read one attribute
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    /// Read a dotted attribute path (`"context.id"`)
    #[must_use]
    pub fn attr_path(&self, path: &str) -> Option<Value> {
        lookup_path(&self.attrs.read(), path).cloned()
    }

    /// Copy of all attributes
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.attrs.read().clone()
    }

    /// Set one attribute in place
    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        self.attrs.write().insert(name.into(), value);
    }

    /// Merge fresher record data into this instance and mark it loaded
    ///
    /// Returns the attributes as they were before the merge.
    ///
    /// # Errors
    /// Returns error if the record names a different identity
    pub fn merge(&self, record: &Value) -> Result<Attributes, ModelError> {
        let key = InstanceKey::from_record(record)?;
        if key != self.key {
            return Err(ModelError::IdentityMismatch {
                expected: self.key.to_string(),
                found: key.to_string(),
            });
        }
        let fields = record.as_object().ok_or(ModelError::NotAnObject)?;

        let mut attrs = self.attrs.write();
        let previous = attrs.clone();
        for (name, value) in fields {
            attrs.insert(name.clone(), value.clone());
        }
        drop(attrs);

        self.loaded.store(true, Ordering::Release);
        Ok(previous)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("key", &self.key)
            .field("stub", &self.is_stub())
            .field("snapshot_of", &self.snapshot_of)
            .finish_non_exhaustive()
    }
}

/// Resolve a dotted path inside an attribute map
#[must_use]
pub fn lookup_path<'a>(attrs: &'a Attributes, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = attrs.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
