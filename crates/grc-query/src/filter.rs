//! Query filters
//!
//! A small expression tree sent with `find_all` and batched queries. Backends
//! interpret it; this crate only builds it.

use grc_model::{InstanceKey, ObjectType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter expression over records of one model type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Every record
    #[default]
    All,

    /// Attribute (dotted path) equals value
    Eq {
        /// Attribute path, e.g. `control_id` or `control.id`
        attr: String,
        /// Expected value
        value: Value,
    },

    /// Record id is one of `ids`
    IdIn {
        /// Accepted ids
        ids: Vec<u64>,
    },

    /// Record is related to one of the given objects
    Relevant {
        /// Type of the objects
        object_name: ObjectType,
        /// Ids of the objects
        ids: Vec<u64>,
    },

    /// Every sub-filter holds
    And {
        /// Conjuncts
        filters: Vec<Filter>,
    },
}

impl Filter {
    /// Attribute equality
    #[must_use]
    pub fn eq(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            attr: attr.into(),
            value: value.into(),
        }
    }

    /// Id membership
    #[must_use]
    pub fn id_in(ids: impl IntoIterator<Item = u64>) -> Self {
        Self::IdIn {
            ids: ids.into_iter().collect(),
        }
    }

    /// Relevance to one object
    #[must_use]
    pub fn relevant_to(key: &InstanceKey) -> Self {
        Self::Relevant {
            object_name: key.object_type.clone(),
            ids: vec![key.id],
        }
    }

    /// Conjunction, flattening nested `And` and dropping `All`
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        let mut filters = Vec::new();
        for filter in [self, other] {
            match filter {
                Self::All => {}
                Self::And { filters: inner } => filters.extend(inner),
                other => filters.push(other),
            }
        }
        match filters.len() {
            0 => Self::All,
            1 => filters.remove(0),
            _ => Self::And { filters },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_flattens() {
        let filter = Filter::eq("a", 1)
            .and(Filter::All)
            .and(Filter::eq("b", 2).and(Filter::eq("c", 3)));

        match filter {
            Filter::And { filters } => assert_eq!(filters.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn and_of_all_is_all() {
        assert_eq!(Filter::All.and(Filter::All), Filter::All);
        assert_eq!(Filter::All.and(Filter::id_in([1])), Filter::id_in([1]));
    }

    #[test]
    fn filter_wire_format() {
        let filter = Filter::relevant_to(&InstanceKey::new("Audit", 4));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"op": "relevant", "object_name": "Audit", "ids": [4]})
        );
    }
}
