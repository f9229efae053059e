//! GRC Query Layer
//!
//! The external collaborators the relationship loaders depend on, expressed
//! as traits, plus the [`Repository`] that joins them with the identity cache
//! and lifecycle event bus.
//!
//! # Core Concepts
//!
//! - [`ModelQuery`]: per-type `find_all` with a [`Filter`]
//! - [`BatchQuery`]: one request carrying several [`QueryDescriptor`]s
//! - [`SnapshotTransform`]: rewrite queries for snapshot-backed types
//! - [`PageContext`]: object-page root and its related index
//! - [`MemoryBackend`]: in-memory implementation of both query traits
//!
//! # Example
//!
//! ```rust,ignore
//! use grc_query::{Filter, MemoryBackend, Repository};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let repo = Repository::with_backend(backend.clone());
//! let controls = repo.find_all(&"Control".into(), &Filter::All).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod memory;
pub mod page;
pub mod repository;
pub mod snapshot;

// Re-exports
pub use backend::{BatchQuery, ModelQuery};
pub use descriptor::{
    take_result_sets, BatchEntry, BatchResponse, QueryDescriptor, QueryKind, ResultSet,
};
pub use error::QueryError;
pub use filter::Filter;
pub use memory::MemoryBackend;
pub use page::{PageContext, StaticPageContext};
pub use repository::Repository;
pub use snapshot::{DefaultSnapshotTransform, SnapshotTransform, SNAPSHOT_TYPE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
