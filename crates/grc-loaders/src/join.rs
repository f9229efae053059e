//! Join relations
//!
//! Direct and indirect loaders both follow one join model whose records point
//! at the owning instance through a join attribute. [`JoinRule`] holds that
//! shared logic: mapping validity, event handling and stub refresh.

use crate::binding::Binding;
use crate::error::LoaderError;
use crate::loader::LoaderContext;
use crate::registry::BindingRegistry;
use crate::result::LoaderResult;
use grc_model::{
    parse_id, Attributes, Instance, InstanceCache, InstanceKey, InstanceRef, ModelEvent,
    ModelEventKind, ObjectType,
};
use grc_query::Filter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// How a join record names another object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAttr {
    /// Attribute holding a `{type, id}` reference
    Reference(String),
    /// Attribute holding a plain id of a fixed type
    Id {
        /// Attribute name, e.g. `control_id`
        attr: String,
        /// Type the id belongs to
        object_type: ObjectType,
    },
    /// Separate type and id attributes (`object_type` + `object_id`)
    Polymorphic {
        /// Attribute holding the type name
        type_attr: String,
        /// Attribute holding the id
        id_attr: String,
    },
}

impl JoinAttr {
    /// Reference attribute
    #[must_use]
    pub fn reference(attr: impl Into<String>) -> Self {
        Self::Reference(attr.into())
    }

    /// Plain id attribute of a fixed type
    #[must_use]
    pub fn id(attr: impl Into<String>, object_type: impl Into<ObjectType>) -> Self {
        Self::Id {
            attr: attr.into(),
            object_type: object_type.into(),
        }
    }

    /// Type + id attribute pair
    #[must_use]
    pub fn polymorphic(type_attr: impl Into<String>, id_attr: impl Into<String>) -> Self {
        Self::Polymorphic {
            type_attr: type_attr.into(),
            id_attr: id_attr.into(),
        }
    }

    /// Identity the attribute points at, if it is set
    #[must_use]
    pub fn resolve(&self, attrs: &Attributes) -> Option<InstanceKey> {
        match self {
            Self::Reference(attr) => attrs.get(attr).and_then(InstanceKey::from_reference),
            Self::Id { attr, object_type } => attrs
                .get(attr)
                .and_then(parse_id)
                .map(|id| InstanceKey::new(object_type.clone(), id)),
            Self::Polymorphic { type_attr, id_attr } => {
                let object_type = attrs.get(type_attr).and_then(Value::as_str)?;
                let id = attrs.get(id_attr).and_then(parse_id)?;
                Some(InstanceKey::new(object_type, id))
            }
        }
    }

    /// Query filter selecting records whose attribute points at `key`
    #[must_use]
    pub fn filter_for(&self, key: &InstanceKey) -> Filter {
        match self {
            Self::Reference(attr) => Filter::eq(format!("{attr}.type"), key.object_type.as_str())
                .and(Filter::eq(format!("{attr}.id"), key.id)),
            Self::Id { attr, .. } => Filter::eq(attr.clone(), key.id),
            Self::Polymorphic { type_attr, id_attr } => {
                Filter::eq(type_attr.clone(), key.object_type.as_str())
                    .and(Filter::eq(id_attr.clone(), key.id))
            }
        }
    }
}

/// One join relation: records of `model` whose `object_attr` names the owner
#[derive(Debug, Clone)]
pub(crate) struct JoinRule {
    pub(crate) model: ObjectType,
    pub(crate) object_attr: JoinAttr,
    /// Set for indirect joins: the listed instance is the one this names
    pub(crate) option_attr: Option<JoinAttr>,
    /// Owner attribute that may already hold the join records as references
    pub(crate) join_attr: Option<String>,
}

impl JoinRule {
    pub(crate) fn is_valid_mapping(&self, owner: &InstanceKey, mapping: &Instance) -> bool {
        mapping.key().object_type == self.model
            && self.object_attr.resolve(&mapping.attributes()).as_ref() == Some(owner)
    }

    fn target_key(&self, mapping: &InstanceKey, attrs: &Attributes) -> Option<InstanceKey> {
        match &self.option_attr {
            None => Some(mapping.clone()),
            Some(option_attr) => option_attr.resolve(attrs),
        }
    }

    fn make_result(
        &self,
        binding: &Binding,
        mapping: &InstanceRef,
        cache: &InstanceCache,
    ) -> Option<LoaderResult> {
        match &self.option_attr {
            None => Some(binding.make_result(Arc::clone(mapping), Vec::new())),
            Some(option_attr) => {
                let Some(target) = option_attr.resolve(&mapping.attributes()) else {
                    tracing::debug!(mapping = %mapping.key(), "join record names no target");
                    return None;
                };
                let provenance = binding.make_result(Arc::clone(mapping), Vec::new());
                Some(binding.make_result(cache.get_or_stub(&target), vec![provenance]))
            }
        }
    }

    fn remove(&self, binding: &Binding, mapping: &InstanceKey, attrs: &Attributes) -> bool {
        match &self.option_attr {
            None => binding.remove_instance(mapping, None),
            Some(option_attr) => option_attr
                .resolve(attrs)
                .is_some_and(|target| binding.remove_instance(&target, Some(mapping))),
        }
    }

    pub(crate) fn handle_event(&self, binding: &Binding, event: &ModelEvent, cache: &InstanceCache) {
        let owner = binding.instance().key();
        let mapping = &event.instance;

        match &event.kind {
            ModelEventKind::Created => {
                if self.is_valid_mapping(owner, mapping) {
                    if let Some(result) = self.make_result(binding, mapping, cache) {
                        binding.insert_results(vec![result]);
                    }
                }
            }
            ModelEventKind::Destroyed | ModelEventKind::Orphaned => {
                self.remove(binding, mapping.key(), &mapping.attributes());
            }
            ModelEventKind::Updated { previous } => {
                let current = mapping.attributes();
                let was_valid = self.object_attr.resolve(previous).as_ref() == Some(owner);
                let is_valid = self.is_valid_mapping(owner, mapping);

                if was_valid {
                    let old_target = self.target_key(mapping.key(), previous);
                    let new_target = if is_valid {
                        self.target_key(mapping.key(), &current)
                    } else {
                        None
                    };
                    if old_target != new_target {
                        self.remove(binding, mapping.key(), previous);
                    }
                }
                if is_valid {
                    if let Some(result) = self.make_result(binding, mapping, cache) {
                        binding.insert_results(vec![result]);
                    }
                }
            }
        }
    }

    /// Subscribe `binding` to lifecycle events of the join model
    pub(crate) fn attach(self: &Arc<Self>, binding: &Arc<Binding>, bindings: &BindingRegistry) {
        let ctx = bindings.context();
        let rule = Arc::clone(self);
        let cache = Arc::clone(ctx.repository.cache());
        let target = Arc::downgrade(binding);

        let subscription = ctx
            .repository
            .events()
            .subscribe(&self.model, move |event| {
                if let Some(binding) = target.upgrade() {
                    rule.handle_event(&binding, event, &cache);
                }
            });
        binding.retain_subscription(subscription);
    }

    /// Join records already held by the owner as `{type, id}` references
    fn in_memory_mappings(&self, owner: &Instance, cache: &InstanceCache) -> Option<Vec<InstanceRef>> {
        let attr = self.join_attr.as_ref()?;
        let references = owner.attr(attr)?;
        let references = references.as_array()?;
        Some(
            references
                .iter()
                .filter_map(InstanceKey::from_reference)
                .filter(|key| key.object_type == self.model)
                .map(|key| cache.get_or_stub(&key))
                .collect(),
        )
    }

    pub(crate) async fn refresh_stubs(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<(), LoaderError> {
        let cache = ctx.repository.cache();
        let owner = binding.instance();

        let results: Vec<LoaderResult> = match self.in_memory_mappings(owner, cache) {
            Some(mappings) => {
                if self.option_attr.is_some() {
                    // Targets are named by the join records, which must be loaded
                    ctx.repository.reify(&mappings).await?;
                }
                mappings
                    .iter()
                    .filter_map(|mapping| self.make_result(binding, mapping, cache))
                    .collect()
            }
            None => {
                let filter = self.object_attr.filter_for(owner.key());
                let mappings = ctx.repository.find_all(&self.model, &filter).await?;
                mappings
                    .iter()
                    .filter(|mapping| self.is_valid_mapping(owner.key(), mapping))
                    .filter_map(|mapping| self.make_result(binding, mapping, cache))
                    .collect()
            }
        };

        if binding.is_disposed() {
            tracing::debug!(
                binding = binding.name(),
                owner = %owner.key(),
                "refresh finished after disposal; results discarded"
            );
            return Ok(());
        }

        let added = binding.insert_results(results);
        tracing::debug!(
            binding = binding.name(),
            owner = %owner.key(),
            model = %self.model,
            added,
            "join stubs refreshed"
        );
        Ok(())
    }
}
