//! Indirect join lists: the objects the join records point at are listed

use crate::binding::Binding;
use crate::error::LoaderError;
use crate::join::{JoinAttr, JoinRule};
use crate::loader::{ListLoader, LoaderContext};
use crate::registry::BindingRegistry;
use async_trait::async_trait;
use grc_model::{Instance, InstanceKey, ObjectType};
use std::sync::Arc;

/// Lists the `option_attr` targets of every `model` record joined to the owner
///
/// Each listed instance carries the join records that justify it as
/// provenance. It stays listed until the last of them goes away, so two
/// `ObjectPerson` records naming the same person list that person once.
#[derive(Debug, Clone)]
pub struct IndirectListLoader {
    rule: Arc<JoinRule>,
}

impl IndirectListLoader {
    /// Create loader over join model `model`
    ///
    /// `object_attr` names the owner, `option_attr` the listed instance.
    #[must_use]
    pub fn new(model: impl Into<ObjectType>, object_attr: JoinAttr, option_attr: JoinAttr) -> Self {
        Self {
            rule: Arc::new(JoinRule {
                model: model.into(),
                object_attr,
                option_attr: Some(option_attr),
                join_attr: None,
            }),
        }
    }

    /// Owner attribute listing join records as references
    #[must_use]
    pub fn with_join_attr(self, join_attr: impl Into<String>) -> Self {
        let mut rule = (*self.rule).clone();
        rule.join_attr = Some(join_attr.into());
        Self {
            rule: Arc::new(rule),
        }
    }

    /// Join model
    #[must_use]
    pub fn model(&self) -> &ObjectType {
        &self.rule.model
    }

    /// Check whether `mapping` joins to `owner`
    #[must_use]
    pub fn is_valid_mapping(&self, owner: &InstanceKey, mapping: &Instance) -> bool {
        self.rule.is_valid_mapping(owner, mapping)
    }
}

#[async_trait]
impl ListLoader for IndirectListLoader {
    fn kind(&self) -> &'static str {
        "indirect"
    }

    fn init_listeners(
        &self,
        binding: &Arc<Binding>,
        bindings: &BindingRegistry,
    ) -> Result<(), LoaderError> {
        self.rule.attach(binding, bindings);
        Ok(())
    }

    async fn refresh_stubs(
        &self,
        binding: &Arc<Binding>,
        ctx: &LoaderContext,
    ) -> Result<(), LoaderError> {
        self.rule.refresh_stubs(binding, ctx).await
    }
}
