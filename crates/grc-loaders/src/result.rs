//! Binding list entries
//!
//! A [`LoaderResult`] pairs an instance with the chain of join records that
//! justified including it. Results are owned by a binding's list and rebuilt
//! whenever the list changes structurally.

use crate::binding::Binding;
use grc_model::{InstanceKey, InstanceRef};
use std::sync::{Arc, Weak};

/// One entry of a binding's list: instance plus provenance
#[derive(Debug, Clone)]
pub struct LoaderResult {
    instance: InstanceRef,
    mappings: Vec<LoaderResult>,
    binding: Weak<Binding>,
}

impl LoaderResult {
    pub(crate) fn new(instance: InstanceRef, mappings: Vec<LoaderResult>, binding: Weak<Binding>) -> Self {
        Self {
            instance,
            mappings,
            binding,
        }
    }

    /// Listed instance
    #[inline]
    #[must_use]
    pub fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    /// Identity of the listed instance
    #[inline]
    #[must_use]
    pub fn key(&self) -> &InstanceKey {
        self.instance.key()
    }

    /// Results this one was derived from (join records, source entries)
    #[inline]
    #[must_use]
    pub fn mappings(&self) -> &[LoaderResult] {
        &self.mappings
    }

    /// Binding holding this result, if it is still alive
    #[inline]
    #[must_use]
    pub fn binding(&self) -> Option<Arc<Binding>> {
        self.binding.upgrade()
    }

    /// Whether the instance is listed for its own sake rather than via a join
    #[inline]
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Swap in a newer instance for the same identity
    pub(crate) fn replace_instance(&mut self, instance: InstanceRef) {
        self.instance = instance;
    }

    pub(crate) fn into_mappings(self) -> Vec<LoaderResult> {
        self.mappings
    }

    /// Record provenance not already present; returns how many were new
    pub(crate) fn merge_mappings(&mut self, other: Vec<LoaderResult>) -> usize {
        let mut added = 0;
        for mapping in other {
            if !self.mappings.iter().any(|m| m.key() == mapping.key()) {
                self.mappings.push(mapping);
                added += 1;
            }
        }
        added
    }

    /// Drop the provenance entry for `via`; returns whether it was present
    pub(crate) fn retract_mapping(&mut self, via: &InstanceKey) -> bool {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.key() != via);
        self.mappings.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_model::Instance;

    fn result(ty: &str, id: u64, mappings: Vec<LoaderResult>) -> LoaderResult {
        LoaderResult::new(
            Arc::new(Instance::stub(InstanceKey::new(ty, id))),
            mappings,
            Weak::new(),
        )
    }

    #[test]
    fn merge_skips_known_provenance() {
        let mut person = result("Person", 9, vec![result("ObjectPerson", 1, vec![])]);

        let added = person.merge_mappings(vec![
            result("ObjectPerson", 1, vec![]),
            result("ObjectPerson", 2, vec![]),
        ]);

        assert_eq!(added, 1);
        assert_eq!(person.mappings().len(), 2);
        assert!(!person.is_direct());
    }

    #[test]
    fn retract_removes_only_named_provenance() {
        let mut person = result(
            "Person",
            9,
            vec![result("ObjectPerson", 1, vec![]), result("ObjectPerson", 2, vec![])],
        );

        assert!(person.retract_mapping(&InstanceKey::new("ObjectPerson", 1)));
        assert!(!person.retract_mapping(&InstanceKey::new("ObjectPerson", 1)));
        assert_eq!(person.mappings().len(), 1);
    }

    #[test]
    fn detached_result_has_no_binding() {
        assert!(result("Person", 1, vec![]).binding().is_none());
    }
}
