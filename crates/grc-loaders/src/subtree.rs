//! Tree-view lists from one batched multi-type query
//!
//! Snapshot-backed types are rewritten into snapshot queries before the batch
//! is sent and converted back into snapshot instances afterwards. On an object
//! page, instances related to the page's root are listed first.

use crate::binding::Binding;
use crate::error::LoaderError;
use crate::loader::{ListLoader, LoaderContext};
use crate::registry::BindingRegistry;
use async_trait::async_trait;
use grc_model::{InstanceKey, InstanceRef, ObjectType};
use grc_query::{take_result_sets, Filter, QueryDescriptor, QueryError};
use indexmap::IndexMap;
use std::sync::Arc;

/// Outcome of one subtree load
#[derive(Debug, Clone, Default)]
pub struct SubTreeResult {
    /// Instances related to the page root, in type order
    pub directly_related: Vec<InstanceRef>,
    /// Everything else, in type order; the whole list off object pages
    pub not_related: Vec<InstanceRef>,
    /// Matching records per requested type, before paging
    pub totals: IndexMap<ObjectType, usize>,
    /// Whether any type has more records than were returned
    pub show_more: bool,
}

impl SubTreeResult {
    /// Directly related first, then the rest
    #[must_use]
    pub fn ordered(&self) -> Vec<InstanceRef> {
        self.directly_related
            .iter()
            .chain(&self.not_related)
            .cloned()
            .collect()
    }

    /// Total number of instances loaded
    #[must_use]
    pub fn len(&self) -> usize {
        self.directly_related.len() + self.not_related.len()
    }

    /// Check if nothing was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads the child types of a tree node in one batch
#[derive(Debug, Clone)]
pub struct SubTreeLoader {
    models: Vec<ObjectType>,
    page_size: Option<usize>,
}

impl SubTreeLoader {
    /// Create loader for `models`, listed in this order
    #[must_use]
    pub fn new<I, T>(models: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ObjectType>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            page_size: None,
        }
    }

    /// Limit each type to its first `page_size` records
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Requested types
    #[must_use]
    pub fn models(&self) -> &[ObjectType] {
        &self.models
    }

    /// Per-type descriptors for everything relevant to `owner`
    #[must_use]
    pub fn descriptors_for(&self, owner: &InstanceKey) -> Vec<QueryDescriptor> {
        self.models
            .iter()
            .map(|model| {
                let descriptor =
                    QueryDescriptor::new(model.clone()).with_filter(Filter::relevant_to(owner));
                match self.page_size {
                    Some(size) => descriptor.with_limit(0, size),
                    None => descriptor,
                }
            })
            .collect()
    }

    /// Run `descriptors` as one batch and order the results for the page
    ///
    /// # Errors
    /// Returns error if the batch fails or its response is malformed; nothing
    /// partial is returned
    pub async fn load(
        &self,
        ctx: &LoaderContext,
        descriptors: Vec<QueryDescriptor>,
    ) -> Result<SubTreeResult, LoaderError> {
        let requested: Vec<ObjectType> = descriptors
            .iter()
            .map(|descriptor| descriptor.object_name.clone())
            .collect();
        let snapshot_flags: Vec<bool> = requested
            .iter()
            .map(|model| ctx.snapshots.is_snapshot_model(model))
            .collect();
        let descriptors: Vec<QueryDescriptor> = descriptors
            .into_iter()
            .zip(&snapshot_flags)
            .map(|(descriptor, &snapshot)| {
                if snapshot {
                    ctx.snapshots.transform_query(descriptor)
                } else {
                    descriptor
                }
            })
            .collect();

        let response = ctx.batch.execute(&descriptors).await?;
        let result_sets = take_result_sets(&descriptors, response)?;

        let cache = ctx.repository.cache();
        let mut result = SubTreeResult::default();
        let mut combined = Vec::new();

        for ((model, snapshot), set) in requested.into_iter().zip(snapshot_flags).zip(result_sets) {
            if set.total > set.values.len() {
                result.show_more = true;
            }
            *result.totals.entry(model).or_default() += set.total;

            for raw in &set.values {
                let instance = if snapshot {
                    ctx.snapshots.to_object(raw)?
                } else {
                    cache.upsert(raw).map_err(QueryError::from)?
                };
                combined.push(instance);
            }
        }

        if ctx.page.is_object_context_page() {
            let (related, rest): (Vec<_>, Vec<_>) = combined
                .into_iter()
                .partition(|instance| ctx.page.is_related(instance.logical_key()));
            result.directly_related = related;
            result.not_related = rest;
        } else {
            result.not_related = combined;
        }

        tracing::debug!(
            types = descriptors.len(),
            directly_related = result.directly_related.len(),
            not_related = result.not_related.len(),
            show_more = result.show_more,
            "subtree loaded"
        );
        Ok(result)
    }

    /// Load the subtree of `binding`'s owner into the binding
    ///
    /// # Errors
    /// Returns error if the batch fails; the binding is left unchanged
    pub async fn load_into(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<SubTreeResult, LoaderError> {
        let descriptors = self.descriptors_for(binding.instance().key());
        let loaded = self.load(ctx, descriptors).await?;

        if binding.is_disposed() {
            tracing::debug!(binding = binding.name(), "subtree arrived after disposal; discarded");
            return Ok(loaded);
        }

        let results = loaded
            .ordered()
            .into_iter()
            .map(|instance| binding.make_result(instance, Vec::new()))
            .collect();
        binding.insert_results(results);
        Ok(loaded)
    }
}

#[async_trait]
impl ListLoader for SubTreeLoader {
    fn kind(&self) -> &'static str {
        "sub_tree"
    }

    // Populated only on refresh; there is no live event source for batches
    fn init_listeners(
        &self,
        _binding: &Arc<Binding>,
        _bindings: &BindingRegistry,
    ) -> Result<(), LoaderError> {
        Ok(())
    }

    async fn refresh_stubs(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<(), LoaderError> {
        self.load_into(binding, ctx).await.map(|_| ())
    }
}
