//! Current page context
//!
//! On an object page one root instance defines relevance: results directly
//! related to it are shown first. [`PageContext`] exposes that knowledge.

use grc_model::{InstanceKey, ObjectType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// Read-only view of the page the loaders serve
pub trait PageContext: Send + Sync + Debug {
    /// Whether the page is scoped to a single root instance
    fn is_object_context_page(&self) -> bool;

    /// Root instance of an object page
    fn page_instance(&self) -> Option<&InstanceKey>;

    /// `related[type][id]` lookup against the root instance
    fn is_related(&self, key: &InstanceKey) -> bool;
}

/// Page context with a fixed related index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPageContext {
    /// Root instance; `None` on dashboard-style pages
    #[serde(default)]
    pub page_instance: Option<InstanceKey>,
    /// Related index: type name → id → related flag
    #[serde(default)]
    pub related: HashMap<ObjectType, HashMap<u64, bool>>,
}

impl StaticPageContext {
    /// Page not scoped to any object
    #[inline]
    #[must_use]
    pub fn dashboard() -> Self {
        Self::default()
    }

    /// Page scoped to `root`, with an empty related index
    #[inline]
    #[must_use]
    pub fn object_page(root: InstanceKey) -> Self {
        Self {
            page_instance: Some(root),
            related: HashMap::new(),
        }
    }

    /// Mark an object as directly related to the root
    #[must_use]
    pub fn with_related(mut self, key: &InstanceKey) -> Self {
        self.related
            .entry(key.object_type.clone())
            .or_default()
            .insert(key.id, true);
        self
    }
}

impl PageContext for StaticPageContext {
    fn is_object_context_page(&self) -> bool {
        self.page_instance.is_some()
    }

    fn page_instance(&self) -> Option<&InstanceKey> {
        self.page_instance.as_ref()
    }

    fn is_related(&self, key: &InstanceKey) -> bool {
        self.related
            .get(&key.object_type)
            .and_then(|ids| ids.get(&key.id))
            .copied()
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_is_not_object_context() {
        let page = StaticPageContext::dashboard();
        assert!(!page.is_object_context_page());
        assert!(page.page_instance().is_none());
    }

    #[test]
    fn related_lookup() {
        let page = StaticPageContext::object_page(InstanceKey::new("Program", 1))
            .with_related(&InstanceKey::new("Objective", 3));

        assert!(page.is_object_context_page());
        assert!(page.is_related(&InstanceKey::new("Objective", 3)));
        assert!(!page.is_related(&InstanceKey::new("Objective", 4)));
        assert!(!page.is_related(&InstanceKey::new("Regulation", 3)));
    }

    #[test]
    fn deserializes_related_index() {
        let page: StaticPageContext = serde_json::from_value(json!({
            "page_instance": {"type": "Program", "id": 1},
            "related": {"Objective": {"3": true, "4": false}}
        }))
        .unwrap();

        assert!(page.is_related(&InstanceKey::new("Objective", 3)));
        assert!(!page.is_related(&InstanceKey::new("Objective", 4)));
    }
}
