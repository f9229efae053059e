//! GRC Relationship Loaders
//!
//! Live, deduplicated lists of related objects, kept current as the object
//! graph changes.
//!
//! # Core Concepts
//!
//! - **Binding**: one relationship's list on one owning instance, with the
//!   listener subscriptions that maintain it
//! - **Loader**: strategy populating and maintaining a binding
//!   ([`DirectListLoader`], [`IndirectListLoader`],
//!   [`IntersectingListLoader`], [`SubTreeLoader`])
//! - **LoaderResult**: a listed instance plus the join records that justify it
//! - **BindingRegistry**: creates bindings on demand from a [`Relationships`]
//!   table and disposes them with their owner
//!
//! # Example
//!
//! ```rust,ignore
//! use grc_loaders::{BindingRegistry, IndirectListLoader, JoinAttr, Relationships};
//!
//! let relationships = Relationships::new().with(
//!     "Control",
//!     "owners",
//!     IndirectListLoader::new(
//!         "ObjectPerson",
//!         JoinAttr::id("control_id", "Control"),
//!         JoinAttr::id("person_id", "Person"),
//!     ),
//! );
//! let registry = BindingRegistry::new(context, relationships);
//! let owners = registry.refresh(&control, "owners").await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod binding;
pub mod config;
pub mod direct;
pub mod error;
pub mod indirect;
pub mod intersecting;
pub mod join;
pub mod loader;
pub mod registry;
pub mod result;
pub mod subtree;
pub mod telemetry;

// Re-exports
pub use binding::{Binding, ListEvent};
pub use config::{LoaderConfig, LoaderSpec, LogConfig, RelationshipSpec, SnapshotConfig, SubTreeConfig};
pub use direct::DirectListLoader;
pub use error::{ConfigError, LoaderError};
pub use indirect::IndirectListLoader;
pub use intersecting::{IntersectSource, IntersectingListLoader};
pub use join::JoinAttr;
pub use loader::{ListLoader, LoaderContext};
pub use registry::{BindingRegistry, Relationships};
pub use result::LoaderResult;
pub use subtree::{SubTreeLoader, SubTreeResult};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with bindings
    pub use crate::{
        Binding, BindingRegistry, DirectListLoader, IndirectListLoader, IntersectingListLoader,
        JoinAttr, ListEvent, ListLoader, LoaderContext, LoaderError, LoaderResult, Relationships,
        SubTreeLoader,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
