//! Query backend traits
//!
//! The REST layer is an external collaborator. Loaders reach it only through
//! these two traits, so any transport (HTTP client, fixture store) can sit
//! behind them.

use crate::descriptor::{BatchResponse, QueryDescriptor};
use crate::error::QueryError;
use crate::filter::Filter;
use async_trait::async_trait;
use grc_model::ObjectType;
use serde_json::Value;
use std::fmt::Debug;

/// Per-model collection query (`Model.findAll`)
#[async_trait]
pub trait ModelQuery: Send + Sync + Debug {
    /// Fetch raw records of one type matching a filter
    ///
    /// # Errors
    /// Returns error if the request fails
    async fn find_all(
        &self,
        object_type: &ObjectType,
        filter: &Filter,
    ) -> Result<Vec<Value>, QueryError>;
}

/// Batched multi-type query API
#[async_trait]
pub trait BatchQuery: Send + Sync + Debug {
    /// Run every descriptor in one request
    ///
    /// The response holds one entry per descriptor, in request order.
    ///
    /// # Errors
    /// Returns error if the request fails
    async fn execute(&self, descriptors: &[QueryDescriptor]) -> Result<BatchResponse, QueryError>;
}
