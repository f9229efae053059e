//! Intersection of other bindings' lists
//!
//! Membership is checked against each source binding's `IndexMap` index, so
//! every event is handled in O(sources) rather than by rescanning lists.
//! Order follows whichever source event admitted an instance; callers must
//! not rely on it.

use crate::binding::{Binding, ListEvent};
use crate::error::LoaderError;
use crate::loader::{ListLoader, LoaderContext};
use crate::registry::BindingRegistry;
use crate::result::LoaderResult;
use async_trait::async_trait;
use std::sync::{Arc, Weak};

/// Where an intersection takes one of its lists from
#[derive(Debug, Clone)]
pub enum IntersectSource {
    /// Another relationship of the same owner
    Named(String),
    /// A private binding created for this intersection
    Loader(Arc<dyn ListLoader>),
}

impl From<&str> for IntersectSource {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for IntersectSource {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Lists instances present in every source binding
#[derive(Debug, Clone)]
pub struct IntersectingListLoader {
    sources: Vec<IntersectSource>,
}

impl IntersectingListLoader {
    /// Create loader over `sources`
    #[must_use]
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<IntersectSource>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    /// Configured sources
    #[must_use]
    pub fn sources(&self) -> &[IntersectSource] {
        &self.sources
    }
}

fn resolve_sources(
    sources: &[IntersectSource],
    binding: &Arc<Binding>,
    bindings: &BindingRegistry,
) -> Result<Vec<Arc<Binding>>, LoaderError> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| match source {
            IntersectSource::Named(name) => bindings.get_binding(binding.instance(), name),
            IntersectSource::Loader(loader) => bindings.attach(
                binding.instance(),
                format!("{}[{index}]", binding.name()),
                Arc::clone(loader),
            ),
        })
        .collect()
}

fn admit(target: &Binding, result: &LoaderResult) -> LoaderResult {
    target.make_result(Arc::clone(result.instance()), vec![result.clone()])
}

fn on_source_event(target: &Weak<Binding>, sources: &[Weak<Binding>], event: &ListEvent) {
    let Some(target) = target.upgrade() else {
        return;
    };

    match event {
        ListEvent::Added(results) => {
            let live: Vec<Arc<Binding>> = sources.iter().filter_map(Weak::upgrade).collect();
            if live.len() != sources.len() {
                return;
            }
            let admitted: Vec<LoaderResult> = results
                .iter()
                .filter(|result| live.iter().all(|source| source.contains(result.key())))
                .map(|result| admit(&target, result))
                .collect();
            if !admitted.is_empty() {
                target.insert_results(admitted);
            }
        }
        ListEvent::Removed(results) => {
            for result in results {
                target.remove_instance(result.key(), None);
            }
        }
    }
}

#[async_trait]
impl ListLoader for IntersectingListLoader {
    fn kind(&self) -> &'static str {
        "intersecting"
    }

    fn init_listeners(
        &self,
        binding: &Arc<Binding>,
        bindings: &BindingRegistry,
    ) -> Result<(), LoaderError> {
        let sources = resolve_sources(&self.sources, binding, bindings)?;
        let Some((first, rest)) = sources.split_first() else {
            return Err(LoaderError::invalid_relationship(
                binding.instance().key().object_type.clone(),
                binding.name(),
                "intersection needs at least one source",
            ));
        };

        let initial: Vec<LoaderResult> = first
            .list()
            .iter()
            .filter(|result| rest.iter().all(|source| source.contains(result.key())))
            .map(|result| admit(binding, result))
            .collect();
        binding.insert_results(initial);

        let peers: Arc<[Weak<Binding>]> = sources.iter().map(Arc::downgrade).collect();
        for source in &sources {
            let target = Arc::downgrade(binding);
            let peers = Arc::clone(&peers);
            let subscription =
                source.subscribe(move |event| on_source_event(&target, &peers, event));
            binding.retain_subscription(subscription);
        }

        tracing::debug!(
            binding = binding.name(),
            owner = %binding.instance().key(),
            sources = sources.len(),
            listed = binding.len(),
            "intersection attached"
        );
        binding.set_source_bindings(sources);
        Ok(())
    }

    async fn refresh_stubs(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<(), LoaderError> {
        let sources = binding.source_bindings();
        futures::future::try_join_all(sources.iter().map(|source| source.refresh_stubs(ctx)))
            .await?;
        Ok(())
    }
}
