//! Object identity
//!
//! Every domain object is identified by its model type and numeric id.
//! [`InstanceKey`] is that pair; it is what caches, indexes and bindings key on.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

/// Model type name (`Control`, `Assessment`, `ObjectPerson`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(String);

impl ObjectType {
    /// Create type name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Type name as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ObjectType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ObjectType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ObjectType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// `(type, id)` identity of a domain object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Model type
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    /// Server-assigned id
    pub id: u64,
}

impl InstanceKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(object_type: impl Into<ObjectType>, id: u64) -> Self {
        Self {
            object_type: object_type.into(),
            id,
        }
    }

    /// Read the identity of a raw record (`{"type": .., "id": .., ...}`)
    ///
    /// # Errors
    /// Returns error if the record is not an object or lacks `type`/`id`
    pub fn from_record(record: &Value) -> Result<Self, ModelError> {
        let object = record.as_object().ok_or(ModelError::NotAnObject)?;
        let object_type = object
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(ModelError::MissingType)?;
        let id = object
            .get("id")
            .and_then(parse_id)
            .ok_or_else(|| ModelError::MissingId {
                object_type: object_type.to_string(),
            })?;
        Ok(Self::new(object_type, id))
    }

    /// Read a `{type, id}` reference value, `None` when it is not one
    #[must_use]
    pub fn from_reference(value: &Value) -> Option<Self> {
        Self::from_record(value).ok()
    }

    /// Render as a `{type, id}` reference value
    #[must_use]
    pub fn to_reference(&self) -> Value {
        serde_json::json!({ "type": self.object_type.as_str(), "id": self.id })
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object_type, self.id)
    }
}

/// Read an id value; ids arrive as numbers, occasionally as numeric strings
#[must_use]
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_from_record() {
        let key = InstanceKey::from_record(&json!({"type": "Control", "id": 5, "title": "x"})).unwrap();
        assert_eq!(key, InstanceKey::new("Control", 5));
        assert_eq!(key.to_string(), "Control#5");
    }

    #[test]
    fn key_accepts_string_id() {
        let key = InstanceKey::from_record(&json!({"type": "Person", "id": "9"})).unwrap();
        assert_eq!(key.id, 9);
    }

    #[test]
    fn key_rejects_malformed_records() {
        assert_eq!(InstanceKey::from_record(&json!(3)), Err(ModelError::NotAnObject));
        assert_eq!(InstanceKey::from_record(&json!({"id": 1})), Err(ModelError::MissingType));
        assert!(matches!(
            InstanceKey::from_record(&json!({"type": "Control"})),
            Err(ModelError::MissingId { .. })
        ));
    }

    #[test]
    fn reference_round_trip() {
        let key = InstanceKey::new("Audit", 12);
        assert_eq!(InstanceKey::from_reference(&key.to_reference()), Some(key));
        assert_eq!(InstanceKey::from_reference(&Value::Null), None);
    }

    #[test]
    fn object_type_compares_with_str() {
        let ty = ObjectType::from("Control");
        assert!(ty == "Control");
        assert_eq!(ty.as_str(), "Control");
    }
}
