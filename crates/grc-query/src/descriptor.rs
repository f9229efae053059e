//! Batched query wire types
//!
//! A batched request is a list of [`QueryDescriptor`]s; the response holds,
//! per descriptor index, a map from model type name to [`ResultSet`].

use crate::error::QueryError;
use crate::filter::Filter;
use grc_model::ObjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a descriptor asks the server to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Full records
    #[default]
    Values,
    /// Only ids
    Ids,
    /// Only the total count
    Count,
}

/// One per-type query in a batched request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Model type queried
    pub object_name: ObjectType,
    /// Filter expression
    #[serde(default)]
    pub filters: Filter,
    /// Requested result shape
    #[serde(rename = "type", default)]
    pub kind: QueryKind,
    /// Half-open `[from, to)` page window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<[usize; 2]>,
}

impl QueryDescriptor {
    /// Create values query for all records of a type
    #[inline]
    #[must_use]
    pub fn new(object_name: impl Into<ObjectType>) -> Self {
        Self {
            object_name: object_name.into(),
            filters: Filter::All,
            kind: QueryKind::Values,
            limit: None,
        }
    }

    /// With filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filters: Filter) -> Self {
        self.filters = filters;
        self
    }

    /// With result kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    /// With page window
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, from: usize, to: usize) -> Self {
        self.limit = Some([from, to]);
        self
    }
}

/// Result of one descriptor for one model type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Returned records (for `values` queries)
    #[serde(default)]
    pub values: Vec<Value>,
    /// Returned ids (for `ids` queries)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<u64>,
    /// Number of entries returned
    #[serde(default)]
    pub count: usize,
    /// Number of matching records before paging
    #[serde(default)]
    pub total: usize,
}

/// Response entry for one descriptor index, keyed by model type name
pub type BatchEntry = HashMap<String, ResultSet>;

/// Full batched response
pub type BatchResponse = Vec<BatchEntry>;

/// Pull the result set for each descriptor out of a batched response
///
/// # Errors
/// Returns error if the response does not line up with the descriptors
pub fn take_result_sets(
    descriptors: &[QueryDescriptor],
    mut response: BatchResponse,
) -> Result<Vec<ResultSet>, QueryError> {
    if response.len() != descriptors.len() {
        return Err(QueryError::ResponseLength {
            expected: descriptors.len(),
            actual: response.len(),
        });
    }

    descriptors
        .iter()
        .zip(response.iter_mut())
        .enumerate()
        .map(|(index, (descriptor, entry))| {
            entry
                .remove(descriptor.object_name.as_str())
                .ok_or_else(|| QueryError::MissingResultSet {
                    index,
                    object_name: descriptor.object_name.to_string(),
                })
        })
        .collect()
}
