//! Relationship and binding registries
//!
//! [`Relationships`] maps `(owner type, name)` to the loader serving it.
//! [`BindingRegistry`] creates bindings on first use, one per owning instance
//! and relationship, and releases them when the owner goes away.

use crate::binding::Binding;
use crate::config::{LoaderConfig, LoaderSpec};
use crate::direct::DirectListLoader;
use crate::error::LoaderError;
use crate::indirect::IndirectListLoader;
use crate::intersecting::IntersectingListLoader;
use crate::loader::{ListLoader, LoaderContext};
use crate::subtree::SubTreeLoader;
use dashmap::DashMap;
use grc_model::{InstanceKey, InstanceRef, ObjectType};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Loaders by owner type and relationship name
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    loaders: HashMap<ObjectType, IndexMap<String, Arc<dyn ListLoader>>>,
}

impl Relationships {
    /// Create empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a relationship; returns the loader it replaced
    pub fn define(
        &mut self,
        owner_type: impl Into<ObjectType>,
        name: impl Into<String>,
        loader: Arc<dyn ListLoader>,
    ) -> Option<Arc<dyn ListLoader>> {
        self.loaders
            .entry(owner_type.into())
            .or_default()
            .insert(name.into(), loader)
    }

    /// Builder form of [`define`](Self::define)
    #[must_use]
    pub fn with<L>(mut self, owner_type: impl Into<ObjectType>, name: impl Into<String>, loader: L) -> Self
    where
        L: ListLoader + 'static,
    {
        self.define(owner_type, name, Arc::new(loader));
        self
    }

    /// Loader for a relationship
    #[must_use]
    pub fn get(&self, owner_type: &ObjectType, name: &str) -> Option<&Arc<dyn ListLoader>> {
        self.loaders.get(owner_type)?.get(name)
    }

    /// Relationship names of a type, in definition order
    #[must_use]
    pub fn names(&self, owner_type: &ObjectType) -> Vec<&str> {
        self.loaders
            .get(owner_type)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of defined relationships
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.values().map(IndexMap::len).sum()
    }

    /// Check if nothing is defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the table declared in configuration
    ///
    /// # Errors
    /// Returns error on duplicate names, empty source or model lists, or
    /// intersections naming relationships the owner type does not have
    pub fn from_config(config: &LoaderConfig) -> Result<Self, LoaderError> {
        let mut table = Self::new();

        for spec in &config.relationships {
            let invalid =
                |reason: &str| LoaderError::invalid_relationship(spec.owner_type.clone(), &spec.name, reason);

            let loader: Arc<dyn ListLoader> = match &spec.loader {
                LoaderSpec::Direct {
                    model,
                    object_attr,
                    join_attr,
                } => {
                    let loader = DirectListLoader::new(model.clone(), object_attr.clone());
                    match join_attr {
                        Some(attr) => Arc::new(loader.with_join_attr(attr.clone())),
                        None => Arc::new(loader),
                    }
                }
                LoaderSpec::Indirect {
                    model,
                    object_attr,
                    option_attr,
                    join_attr,
                } => {
                    let loader =
                        IndirectListLoader::new(model.clone(), object_attr.clone(), option_attr.clone());
                    match join_attr {
                        Some(attr) => Arc::new(loader.with_join_attr(attr.clone())),
                        None => Arc::new(loader),
                    }
                }
                LoaderSpec::Intersecting { sources } => {
                    if sources.is_empty() {
                        return Err(invalid("intersection needs at least one source"));
                    }
                    if sources.contains(&spec.name) {
                        return Err(invalid("intersection lists itself as a source"));
                    }
                    Arc::new(IntersectingListLoader::new(sources.iter().cloned()))
                }
                LoaderSpec::SubTree { models, page_size } => {
                    if models.is_empty() {
                        return Err(invalid("subtree needs at least one model"));
                    }
                    let page_size = page_size.unwrap_or(config.subtree.page_size);
                    Arc::new(SubTreeLoader::new(models.iter().cloned()).with_page_size(page_size))
                }
            };

            if table
                .define(spec.owner_type.clone(), spec.name.clone(), loader)
                .is_some()
            {
                return Err(invalid("defined more than once"));
            }
        }

        for spec in &config.relationships {
            if let LoaderSpec::Intersecting { sources } = &spec.loader {
                if let Some(missing) = sources
                    .iter()
                    .find(|source| table.get(&spec.owner_type, source).is_none())
                {
                    return Err(LoaderError::invalid_relationship(
                        spec.owner_type.clone(),
                        &spec.name,
                        format!("unknown source relationship '{missing}'"),
                    ));
                }
            }
        }

        tracing::info!(relationships = table.len(), "relationships configured");
        Ok(table)
    }
}

type Slot = (InstanceKey, String);

/// Live bindings of every owning instance
#[derive(Debug)]
pub struct BindingRegistry {
    context: Arc<LoaderContext>,
    relationships: Arc<Relationships>,
    bindings: DashMap<Slot, Arc<Binding>>,
    resolving: Mutex<HashSet<Slot>>,
}

impl BindingRegistry {
    /// Create registry serving `relationships`
    #[must_use]
    pub fn new(context: LoaderContext, relationships: Relationships) -> Self {
        Self {
            context: Arc::new(context),
            relationships: Arc::new(relationships),
            bindings: DashMap::new(),
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Shared loader collaborators
    #[inline]
    #[must_use]
    pub fn context(&self) -> &LoaderContext {
        &self.context
    }

    /// Relationship table
    #[inline]
    #[must_use]
    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// Binding of `name` on `instance`, created and attached on first use
    ///
    /// A registered binding that was disposed is dropped and a fresh one attached.
    ///
    /// # Errors
    /// Returns error if the relationship is unknown, depends on itself, or
    /// its loader cannot attach
    pub fn get_binding(&self, instance: &InstanceRef, name: &str) -> Result<Arc<Binding>, LoaderError> {
        let slot: Slot = (instance.key().clone(), name.to_string());
        if let Some(existing) = self.bindings.get(&slot) {
            if !existing.is_disposed() {
                return Ok(Arc::clone(existing.value()));
            }
        }
        // A binding disposed directly is replaced on next use
        if self
            .bindings
            .remove_if(&slot, |_, binding| binding.is_disposed())
            .is_some()
        {
            tracing::debug!(owner = %slot.0, name, "replacing disposed binding");
        }

        let loader = self
            .relationships
            .get(&instance.key().object_type, name)
            .cloned()
            .ok_or_else(|| LoaderError::UnknownRelationship {
                object_type: instance.key().object_type.clone(),
                name: name.to_string(),
            })?;

        if !self.resolving.lock().insert(slot.clone()) {
            return Err(LoaderError::CyclicRelationship {
                owner: slot.0,
                name: slot.1,
            });
        }
        let attached = self.attach(instance, name, loader);
        self.resolving.lock().remove(&slot);
        let binding = attached?;

        let binding = Arc::clone(self.bindings.entry(slot).or_insert(binding).value());
        Ok(binding)
    }

    /// Binding of `name` on the instance identified by `key`
    ///
    /// # Errors
    /// Same as [`get_binding`](Self::get_binding)
    pub fn binding_for(&self, key: &InstanceKey, name: &str) -> Result<Arc<Binding>, LoaderError> {
        let instance = self.context.repository.cache().get_or_stub(key);
        self.get_binding(&instance, name)
    }

    /// Create and attach a binding for a loader outside the relationship table
    ///
    /// The binding is not registered; it lives as long as its handles do.
    ///
    /// # Errors
    /// Returns error if the loader cannot attach
    pub fn attach(
        &self,
        instance: &InstanceRef,
        name: impl Into<String>,
        loader: Arc<dyn ListLoader>,
    ) -> Result<Arc<Binding>, LoaderError> {
        let binding = Binding::new(name, Arc::clone(instance), Arc::clone(&loader));
        if let Err(err) = loader.init_listeners(&binding, self) {
            binding.dispose();
            return Err(err);
        }
        tracing::debug!(
            binding = binding.name(),
            owner = %instance.key(),
            loader = loader.kind(),
            "binding attached"
        );
        Ok(binding)
    }

    /// Get a binding and populate it
    ///
    /// # Errors
    /// Returns error if the binding cannot be created or the refresh fails
    pub async fn refresh(&self, instance: &InstanceRef, name: &str) -> Result<Arc<Binding>, LoaderError> {
        let binding = self.get_binding(instance, name)?;
        binding.refresh_stubs(&self.context).await?;
        Ok(binding)
    }

    /// Dispose every binding of `owner`; returns how many were released
    pub fn release(&self, owner: &InstanceKey) -> usize {
        let slots: Vec<Slot> = self
            .bindings
            .iter()
            .filter(|entry| entry.key().0 == *owner)
            .map(|entry| entry.key().clone())
            .collect();

        let mut released = 0;
        for slot in slots {
            if let Some((_, binding)) = self.bindings.remove(&slot) {
                binding.dispose();
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!(%owner, released, "owner bindings released");
        }
        released
    }

    /// Number of registered bindings
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationshipSpec;
    use crate::join::JoinAttr;

    fn owners_spec() -> RelationshipSpec {
        RelationshipSpec::new(
            "Control",
            "owners",
            LoaderSpec::Indirect {
                model: ObjectType::from("ObjectPerson"),
                object_attr: JoinAttr::id("control_id", "Control"),
                option_attr: JoinAttr::id("person_id", "Person"),
                join_attr: None,
            },
        )
    }

    #[test]
    fn from_config_builds_table() {
        let config = LoaderConfig::default()
            .with_relationship(owners_spec())
            .with_relationship(RelationshipSpec::new(
                "Control",
                "shared",
                LoaderSpec::Intersecting {
                    sources: vec!["owners".to_string()],
                },
            ));

        let table = Relationships::from_config(&config).unwrap();

        let control = ObjectType::from("Control");
        assert_eq!(table.names(&control), vec!["owners", "shared"]);
        assert_eq!(table.get(&control, "owners").unwrap().kind(), "indirect");
        assert!(table.get(&control, "missing").is_none());
    }

    #[test]
    fn from_config_rejects_duplicates() {
        let config = LoaderConfig::default()
            .with_relationship(owners_spec())
            .with_relationship(owners_spec());
        let err = Relationships::from_config(&config).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidRelationship { .. }));
    }

    #[test]
    fn from_config_rejects_unknown_sources() {
        let config = LoaderConfig::default().with_relationship(RelationshipSpec::new(
            "Control",
            "shared",
            LoaderSpec::Intersecting {
                sources: vec!["owners".to_string()],
            },
        ));
        let err = Relationships::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown source relationship 'owners'"));
    }
}
