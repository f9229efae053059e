//! Direct join lists: the join records themselves are listed

use crate::binding::Binding;
use crate::error::LoaderError;
use crate::join::{JoinAttr, JoinRule};
use crate::loader::{ListLoader, LoaderContext};
use crate::registry::BindingRegistry;
use async_trait::async_trait;
use grc_model::{Instance, InstanceKey, ObjectType};
use std::sync::Arc;

/// Lists every record of `model` whose `object_attr` names the owner
///
/// ```
/// use grc_loaders::{DirectListLoader, JoinAttr};
///
/// let loader = DirectListLoader::new("ObjectPerson", JoinAttr::id("control_id", "Control"))
///     .with_join_attr("object_people");
/// assert_eq!(loader.model().as_str(), "ObjectPerson");
/// ```
#[derive(Debug, Clone)]
pub struct DirectListLoader {
    rule: Arc<JoinRule>,
}

impl DirectListLoader {
    /// Create loader for join model `model` pointing at owners via `object_attr`
    #[must_use]
    pub fn new(model: impl Into<ObjectType>, object_attr: JoinAttr) -> Self {
        Self {
            rule: Arc::new(JoinRule {
                model: model.into(),
                object_attr,
                option_attr: None,
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
impl ListLoader for DirectListLoader {
    fn kind(&self) -> &'static str {
        "direct"
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
