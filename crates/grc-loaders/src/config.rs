//! Loader configuration
//!
//! ```toml
//! [snapshot]
//! types = ["Control", "Objective"]
//!
//! [subtree]
//! page_size = 20
//!
//! [log]
//! filter = "grc_loaders=debug,info"
//!
//! [[relationships]]
//! owner_type = "Control"
//! name = "owners"
//! loader = "indirect"
//! model = "ObjectPerson"
//! object_attr = { id = { attr = "control_id", object_type = "Control" } }
//! option_attr = { id = { attr = "person_id", object_type = "Person" } }
//! ```

use crate::error::ConfigError;
use crate::join::JoinAttr;
use grc_model::ObjectType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete loader configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Snapshot-backed types
    pub snapshot: SnapshotConfig,
    /// Subtree defaults
    pub subtree: SubTreeConfig,
    /// Logging
    pub log: LogConfig,
    /// Declared relationships
    pub relationships: Vec<RelationshipSpec>,
}

impl LoaderConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            relationships = config.relationships.len(),
            "loader configuration read"
        );
        Ok(config)
    }

    /// With snapshot-backed types
    #[must_use]
    pub fn with_snapshot_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ObjectType>,
    {
        self.snapshot.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// With default subtree page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.subtree.page_size = page_size;
        self
    }

    /// With log settings
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// With one more relationship
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipSpec) -> Self {
        self.relationships.push(relationship);
        self
    }
}

/// Types whose records are served as snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot-backed model types
    pub types: Vec<ObjectType>,
}

/// Subtree loading defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubTreeConfig {
    /// Records requested per type when a relationship sets no page size
    pub page_size: usize,
}

impl Default for SubTreeConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// One declared relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    /// Type of the owning instances
    pub owner_type: ObjectType,
    /// Relationship name, unique per owner type
    pub name: String,
    /// Loader and its parameters
    #[serde(flatten)]
    pub loader: LoaderSpec,
}

impl RelationshipSpec {
    /// Create relationship spec
    #[must_use]
    pub fn new(owner_type: impl Into<ObjectType>, name: impl Into<String>, loader: LoaderSpec) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
            loader,
        }
    }
}

/// Loader selection, tagged by `loader = "..."`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loader", rename_all = "snake_case")]
pub enum LoaderSpec {
    /// List the join records themselves
    Direct {
        /// Join model
        model: ObjectType,
        /// Join record attribute naming the owner
        object_attr: JoinAttr,
        /// Owner attribute holding join record references
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join_attr: Option<String>,
    },
    /// List what the join records point at
    Indirect {
        /// Join model
        model: ObjectType,
        /// Join record attribute naming the owner
        object_attr: JoinAttr,
        /// Join record attribute naming the listed instance
        option_attr: JoinAttr,
        /// Owner attribute holding join record references
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join_attr: Option<String>,
    },
    /// Intersection of other relationships of the same owner
    Intersecting {
        /// Source relationship names
        sources: Vec<String>,
    },
    /// Batched load of child types
    SubTree {
        /// Child types, in listing order
        models: Vec<ObjectType>,
        /// Per-type page size; `[subtree] page_size` when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<usize>,
    },
}
