//! Snapshot query rewriting
//!
//! Some model types are shown in audit scope as frozen snapshots rather than
//! live objects. Queries for those types are rewritten to hit the `Snapshot`
//! model instead, and the returned snapshot records are turned into
//! standalone instances that mirror the captured object's content.

use crate::descriptor::QueryDescriptor;
use crate::error::QueryError;
use crate::filter::Filter;
use grc_model::{
    parse_id, Attributes, Instance, InstanceKey, InstanceRef, ModelError, ObjectType,
};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Model type of snapshot records
pub const SNAPSHOT_TYPE: &str = "Snapshot";

/// Rewrites queries for snapshot-backed types and converts their records
pub trait SnapshotTransform: Send + Sync + Debug {
    /// Whether `object_type` is served as snapshots
    fn is_snapshot_model(&self, object_type: &ObjectType) -> bool;

    /// Rewrite a descriptor into its snapshot query form
    fn transform_query(&self, descriptor: QueryDescriptor) -> QueryDescriptor;

    /// Convert a raw snapshot record into a snapshot instance
    ///
    /// # Errors
    /// Returns error if the record is not a well-formed snapshot
    fn to_object(&self, raw: &Value) -> Result<InstanceRef, QueryError>;
}

/// Snapshot transform driven by a configured list of types
#[derive(Debug, Clone, Default)]
pub struct DefaultSnapshotTransform {
    types: HashSet<ObjectType>,
}

impl DefaultSnapshotTransform {
    /// Create transform for the given snapshot-backed types
    #[must_use]
    pub fn new<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ObjectType>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl SnapshotTransform for DefaultSnapshotTransform {
    fn is_snapshot_model(&self, object_type: &ObjectType) -> bool {
        self.types.contains(object_type)
    }

    fn transform_query(&self, descriptor: QueryDescriptor) -> QueryDescriptor {
        let child_type = Filter::eq("child_type", descriptor.object_name.as_str());
        QueryDescriptor {
            object_name: ObjectType::from(SNAPSHOT_TYPE),
            filters: child_type.and(descriptor.filters),
            kind: descriptor.kind,
            limit: descriptor.limit,
        }
    }

    fn to_object(&self, raw: &Value) -> Result<InstanceRef, QueryError> {
        let key = InstanceKey::from_record(raw)?;
        let child_type = raw
            .get("child_type")
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingType)?;
        let child_id = raw
            .get("child_id")
            .and_then(parse_id)
            .ok_or_else(|| ModelError::MissingId {
                object_type: child_type.to_string(),
            })?;
        let of = InstanceKey::new(child_type, child_id);

        let mut content: Attributes = raw
            .pointer("/revision/content")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        content.insert("type".to_string(), Value::from(child_type));
        content.insert("id".to_string(), Value::from(child_id));
        content.insert("snapshot".to_string(), key.to_reference());
        if let Some(parent) = raw.get("parent") {
            content.insert("parent".to_string(), parent.clone());
        }

        Ok(Arc::new(Instance::snapshot(key, of, content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transform() -> DefaultSnapshotTransform {
        DefaultSnapshotTransform::new(["Control", "Objective"])
    }

    #[test]
    fn recognizes_configured_types() {
        let t = transform();
        assert!(t.is_snapshot_model(&ObjectType::from("Control")));
        assert!(!t.is_snapshot_model(&ObjectType::from("Assessment")));
    }

    #[test]
    fn transform_query_targets_snapshots() {
        let original = QueryDescriptor::new("Control")
            .with_filter(Filter::relevant_to(&InstanceKey::new("Audit", 1)))
            .with_limit(0, 5);

        let rewritten = transform().transform_query(original);

        assert_eq!(rewritten.object_name, ObjectType::from(SNAPSHOT_TYPE));
        assert_eq!(rewritten.limit, Some([0, 5]));
        assert_eq!(
            rewritten.filters,
            Filter::eq("child_type", "Control").and(Filter::relevant_to(&InstanceKey::new("Audit", 1)))
        );
    }

    #[test]
    fn to_object_mirrors_revision_content() {
        let raw = json!({
            "type": "Snapshot",
            "id": 40,
            "child_type": "Control",
            "child_id": 5,
            "parent": {"type": "Audit", "id": 1},
            "revision": {"content": {"title": "Access review", "id": 5}}
        });

        let snapshot = transform().to_object(&raw).unwrap();

        assert!(snapshot.is_snapshot());
        assert_eq!(snapshot.key(), &InstanceKey::new("Snapshot", 40));
        assert_eq!(snapshot.logical_key(), &InstanceKey::new("Control", 5));
        assert_eq!(snapshot.attr("title"), Some(json!("Access review")));
        assert_eq!(snapshot.attr("snapshot"), Some(json!({"type": "Snapshot", "id": 40})));
    }

    #[test]
    fn to_object_accepts_string_child_id() {
        let raw = json!({"type": "Snapshot", "id": "41", "child_type": "Control", "child_id": "7"});

        let snapshot = transform().to_object(&raw).unwrap();

        assert_eq!(snapshot.snapshot_of(), Some(&InstanceKey::new("Control", 7)));
        assert_eq!(snapshot.attr("id"), Some(json!(7)));
    }

    #[test]
    fn to_object_requires_child_identity() {
        let raw = json!({"type": "Snapshot", "id": 40});
        assert!(transform().to_object(&raw).is_err());
    }
}
