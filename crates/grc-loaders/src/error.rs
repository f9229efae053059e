//! Error types for relationship loaders
//!
//! Provides error handling for:
//! - Query failures surfaced while refreshing a binding
//! - Relationship lookups and definitions
//! - Configuration loading

use grc_model::{InstanceKey, ObjectType};
use grc_query::QueryError;
use std::path::PathBuf;

/// Main loader error type
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Query layer failed; the binding keeps whatever it held before
    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    /// No relationship with this name is defined for the owner's type
    #[error("no relationship '{name}' defined for {object_type}")]
    UnknownRelationship {
        /// Owner type
        object_type: ObjectType,
        /// Relationship name
        name: String,
    },

    /// Relationship definition is unusable
    #[error("invalid relationship {owner_type}.{name}: {reason}")]
    InvalidRelationship {
        /// Owner type
        owner_type: ObjectType,
        /// Relationship name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Resolving a binding required itself
    #[error("relationship '{name}' on {owner} depends on itself")]
    CyclicRelationship {
        /// Owning instance
        owner: InstanceKey,
        /// Relationship name
        name: String,
    },

    /// Binding was disposed before the operation started
    #[error("binding '{name}' on {owner} is disposed")]
    Disposed {
        /// Owning instance
        owner: InstanceKey,
        /// Relationship name
        name: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LoaderError {
    /// Create invalid relationship error
    pub fn invalid_relationship(
        owner_type: impl Into<ObjectType>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRelationship {
            owner_type: owner_type.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check if a caller could reasonably retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Query(err) if err.is_retryable())
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for the schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_error_display() {
        let err = LoaderError::UnknownRelationship {
            object_type: ObjectType::from("Control"),
            name: "owners".to_string(),
        };
        assert_eq!(err.to_string(), "no relationship 'owners' defined for Control");
    }

    #[test]
    fn loader_error_is_retryable() {
        assert!(LoaderError::from(QueryError::Transport("reset".to_string())).is_retryable());
        assert!(!LoaderError::from(QueryError::backend("Control", "denied")).is_retryable());
        assert!(!LoaderError::invalid_relationship("Control", "x", "y").is_retryable());
    }
}
