//! Loader contract
//!
//! A [`ListLoader`] is stateless configuration plus behavior, shared by every
//! binding of the same relationship. It attaches listeners that keep a
//! binding current and knows how to populate the binding on demand.
//!
//! Loaders reach the outside world only through [`LoaderContext`].

use crate::binding::Binding;
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::registry::BindingRegistry;
use crate::result::LoaderResult;
use async_trait::async_trait;
use grc_model::{InstanceKey, InstanceRef};
use grc_query::{BatchQuery, DefaultSnapshotTransform, PageContext, Repository, SnapshotTransform};
use std::fmt::Debug;
use std::sync::Arc;

/// Collaborators shared by every loader
#[derive(Debug, Clone)]
pub struct LoaderContext {
    /// Cache, lifecycle events and per-type queries
    pub repository: Repository,
    /// Batched multi-type query API
    pub batch: Arc<dyn BatchQuery>,
    /// Snapshot query rewriting
    pub snapshots: Arc<dyn SnapshotTransform>,
    /// Current page and its related index
    pub page: Arc<dyn PageContext>,
}

impl LoaderContext {
    /// Create context from explicit collaborators
    #[must_use]
    pub fn new(
        repository: Repository,
        batch: Arc<dyn BatchQuery>,
        snapshots: Arc<dyn SnapshotTransform>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        Self {
            repository,
            batch,
            snapshots,
            page,
        }
    }

    /// Create context whose snapshot transform follows the configuration
    #[must_use]
    pub fn from_config(
        config: &LoaderConfig,
        repository: Repository,
        batch: Arc<dyn BatchQuery>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        let snapshots = DefaultSnapshotTransform::new(config.snapshot.types.iter().cloned());
        Self::new(repository, batch, Arc::new(snapshots), page)
    }
}

/// Strategy that populates and maintains a binding's list
///
/// Implementors provide [`init_listeners`](Self::init_listeners) and
/// [`refresh_stubs`](Self::refresh_stubs); list bookkeeping is shared.
#[async_trait]
pub trait ListLoader: Send + Sync + Debug {
    /// Loader kind, for logs
    fn kind(&self) -> &'static str;

    /// Register the listeners that keep `binding` current
    ///
    /// Listeners must be handed to [`Binding::retain_subscription`] so they
    /// live exactly as long as the binding.
    ///
    /// # Errors
    /// Returns error if a dependency of the binding cannot be resolved
    fn init_listeners(
        &self,
        binding: &Arc<Binding>,
        bindings: &BindingRegistry,
    ) -> Result<(), LoaderError>;

    /// Populate `binding` from in-memory stubs or the query layer
    ///
    /// # Errors
    /// Returns error if a query fails; no retry is attempted
    async fn refresh_stubs(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<(), LoaderError>;

    /// Build a result owned by `binding`
    fn make_result(
        &self,
        binding: &Binding,
        instance: InstanceRef,
        mappings: Vec<LoaderResult>,
    ) -> LoaderResult {
        binding.make_result(instance, mappings)
    }

    /// Insert results into `binding`, deduplicating by identity
    fn insert_results(&self, binding: &Binding, results: Vec<LoaderResult>) -> usize {
        binding.insert_results(results)
    }

    /// Remove `instance` from `binding`, optionally retracting one provenance entry
    fn remove_instance(
        &self,
        binding: &Binding,
        instance: &InstanceKey,
        via: Option<&LoaderResult>,
    ) -> bool {
        binding.remove_instance(instance, via.map(LoaderResult::key))
    }
}
