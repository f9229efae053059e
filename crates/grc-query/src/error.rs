//! Error types for the query layer
//!
//! Query failures are surfaced to callers as-is; nothing in this layer
//! retries. [`QueryError::is_retryable`] only classifies.

use grc_model::ModelError;

/// Errors raised by query backends and the repository
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Request never completed (network, timeout, connection reset)
    #[error("transport failure: {0}")]
    Transport(String),

    /// Server answered with an error
    #[error("backend rejected query for {object_name}: {message}")]
    Backend {
        /// Model type being queried
        object_name: String,
        /// Server message
        message: String,
    },

    /// Batched response has a different number of result sets than requested
    #[error("batched response has {actual} result sets, expected {expected}")]
    ResponseLength {
        /// Number of descriptors sent
        expected: usize,
        /// Number of result sets received
        actual: usize,
    },

    /// Result set for a descriptor is missing from the batched response
    #[error("batched response index {index} has no result set for {object_name}")]
    MissingResultSet {
        /// Descriptor index
        index: usize,
        /// Model type expected at that index
        object_name: String,
    },

    /// Returned record could not be materialized
    #[error("malformed record: {0}")]
    Model(#[from] ModelError),
}

impl QueryError {
    /// Create backend error
    pub fn backend(object_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            object_name: object_name.into(),
            message: message.into(),
        }
    }

    /// Check if a caller could reasonably retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
