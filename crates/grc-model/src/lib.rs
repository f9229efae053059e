//! GRC Model Layer
//!
//! Identity and change notification for the client-side object graph.
//!
//! # Overview
//!
//! - **InstanceKey**: `(type, id)` identity of a domain object
//! - **Instance**: the single live object for one identity, either a stub
//!   (type and id only) or fully loaded
//! - **InstanceCache**: identity arena guaranteeing at most one live
//!   [`Instance`] per key
//! - **EventBus**: per-type lifecycle events (`created`, `updated`,
//!   `destroyed`, `orphaned`) with drop-to-unsubscribe handles
//!
//! # Example
//!
//! ```rust
//! use grc_model::{InstanceCache, InstanceKey};
//! use serde_json::json;
//!
//! let cache = InstanceCache::new();
//! let stub = cache.get_or_stub(&InstanceKey::new("Control", 5));
//! assert!(stub.is_stub());
//!
//! let loaded = cache.upsert(&json!({"type": "Control", "id": 5, "title": "Access"})).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&stub, &loaded));
//! assert!(!loaded.is_stub());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod error;
pub mod events;
pub mod instance;
pub mod key;

// Re-exports
pub use cache::{CacheStats, InstanceCache};
pub use error::ModelError;
pub use events::{Channel, EventBus, ModelEvent, ModelEventKind, Subscription};
pub use instance::{lookup_path, Attributes, Instance, InstanceRef};
pub use key::{parse_id, InstanceKey, ObjectType};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for model operations
    pub use crate::{
        EventBus, Instance, InstanceCache, InstanceKey, InstanceRef, ModelEvent, ModelEventKind,
        ObjectType, Subscription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
