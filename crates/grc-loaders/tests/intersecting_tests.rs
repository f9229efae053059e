use grc_loaders::{
    IndirectListLoader, IntersectSource, IntersectingListLoader, JoinAttr, LoaderError,
    Relationships,
};
use grc_model::InstanceKey;
use grc_test_utils::{key, record, Harness};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

const PROGRAM: u64 = 1;

fn scoped_loader(model: &str) -> IndirectListLoader {
    IndirectListLoader::new(
        model,
        JoinAttr::id("program_id", "Program"),
        JoinAttr::reference("object"),
    )
}

fn mapping(model: &str, risk: u64) -> Value {
    json!({
        "type": model,
        "id": risk,
        "program_id": PROGRAM,
        "object": {"type": "Risk", "id": risk},
    })
}

fn harness() -> Harness {
    Harness::new(
        Relationships::new()
            .with("Program", "a", scoped_loader("AMapping"))
            .with("Program", "b", scoped_loader("BMapping"))
            .with("Program", "both", IntersectingListLoader::new(["a", "b"])),
    )
}

fn risk_ids(keys: &[InstanceKey]) -> BTreeSet<u64> {
    keys.iter().map(|k| k.id).collect()
}

#[test]
fn test_intersection_tracks_source_events() {
    let h = harness();
    let program = h.load(&record("Program", PROGRAM));
    let both = h.registry.get_binding(&program, "both").unwrap();

    for risk in [1, 2, 3] {
        h.create(mapping("AMapping", risk));
    }
    for risk in [2, 3, 4] {
        h.create(mapping("BMapping", risk));
    }
    assert_eq!(risk_ids(&both.keys()), BTreeSet::from([2, 3]));

    h.destroy(&key("BMapping", 3));
    assert_eq!(both.keys(), vec![key("Risk", 2)]);
}

#[test]
fn test_initial_intersection_uses_current_source_lists() {
    let h = harness();
    let program = h.load(&record("Program", PROGRAM));
    let a = h.registry.get_binding(&program, "a").unwrap();
    let b = h.registry.get_binding(&program, "b").unwrap();
    for risk in [1, 2, 3] {
        h.create(mapping("AMapping", risk));
    }
    for risk in [2, 3, 4] {
        h.create(mapping("BMapping", risk));
    }

    let both = h.registry.get_binding(&program, "both").unwrap();

    assert_eq!(risk_ids(&both.keys()), BTreeSet::from([2, 3]));
    let sources = both.source_bindings();
    assert_eq!(sources.len(), 2);
    assert!(Arc::ptr_eq(&sources[0], &a));
    assert!(Arc::ptr_eq(&sources[1], &b));
}

#[test]
fn test_removal_from_any_source_removes_from_intersection() {
    let h = harness();
    let program = h.load(&record("Program", PROGRAM));
    let both = h.registry.get_binding(&program, "both").unwrap();
    h.create(mapping("AMapping", 7));
    h.create(mapping("BMapping", 7));
    assert_eq!(both.len(), 1);

    h.destroy(&key("AMapping", 7));

    assert!(both.is_empty());
}

#[test]
fn test_private_source_loader() {
    let loader = IntersectingListLoader::new(vec![
        IntersectSource::from("a"),
        IntersectSource::Loader(Arc::new(scoped_loader("BMapping"))),
    ]);
    let h = Harness::new(
        Relationships::new()
            .with("Program", "a", scoped_loader("AMapping"))
            .with("Program", "shared", loader),
    );
    let program = h.load(&record("Program", PROGRAM));
    let shared = h.registry.get_binding(&program, "shared").unwrap();

    h.create(mapping("AMapping", 5));
    h.create(mapping("BMapping", 5));
    h.create(mapping("BMapping", 6));

    assert_eq!(shared.keys(), vec![key("Risk", 5)]);
    assert_eq!(h.registry.binding_count(), 2);
    assert_eq!(shared.source_bindings()[1].name(), "shared[1]");
}

#[test]
fn test_cyclic_intersections_are_rejected() {
    let h = Harness::new(
        Relationships::new()
            .with("Program", "x", IntersectingListLoader::new(["y"]))
            .with("Program", "y", IntersectingListLoader::new(["x"])),
    );
    let program = h.load(&record("Program", PROGRAM));

    let err = h.registry.get_binding(&program, "x").unwrap_err();

    assert!(matches!(err, LoaderError::CyclicRelationship { .. }));
    assert_eq!(h.registry.binding_count(), 0);
}

#[test]
fn test_unknown_source_is_reported() {
    let h = Harness::new(
        Relationships::new().with("Program", "both", IntersectingListLoader::new(["a", "missing"])),
    );
    let program = h.load(&record("Program", PROGRAM));

    let err = h.registry.get_binding(&program, "both").unwrap_err();

    assert!(matches!(err, LoaderError::UnknownRelationship { ref name, .. } if name == "a"));
}

#[tokio::test]
async fn test_refresh_populates_all_sources() {
    let h = harness();
    h.seed([1, 2, 3].map(|risk| mapping("AMapping", risk)));
    h.seed([2, 3, 4].map(|risk| mapping("BMapping", risk)));
    let program = h.load(&record("Program", PROGRAM));

    let both = h.registry.refresh(&program, "both").await.unwrap();

    assert_eq!(risk_ids(&both.keys()), BTreeSet::from([2, 3]));
}

#[tokio::test]
async fn test_refresh_fails_when_any_source_fails() {
    let h = harness();
    h.seed([mapping("AMapping", 1), mapping("BMapping", 1)]);
    let program = h.load(&record("Program", PROGRAM));
    let both = h.registry.get_binding(&program, "both").unwrap();
    h.backend.fail_with("timeout");

    let err = both.refresh_stubs(h.context()).await.unwrap_err();

    assert!(matches!(err, LoaderError::Query(_)));
    assert!(both.is_empty());
}

#[test]
fn test_disposing_intersection_releases_sources() {
    let h = harness();
    let program = h.load(&record("Program", PROGRAM));
    let both = h.registry.get_binding(&program, "both").unwrap();
    let a = h.registry.get_binding(&program, "a").unwrap();

    both.dispose();
    h.create(mapping("AMapping", 1));
    h.create(mapping("BMapping", 1));

    assert!(both.source_bindings().is_empty());
    assert!(both.is_empty());
    assert_eq!(a.len(), 1);
}

proptest! {
    #[test]
    fn prop_intersection_equals_set_intersection(
        a in proptest::collection::btree_set(1..12u64, 0..10),
        b in proptest::collection::btree_set(1..12u64, 0..10),
        removed in 1..12u64,
    ) {
        let h = harness();
        let program = h.load(&record("Program", PROGRAM));
        let both = h.registry.get_binding(&program, "both").unwrap();

        for risk in &a {
            h.create(mapping("AMapping", *risk));
        }
        for risk in &b {
            h.create(mapping("BMapping", *risk));
        }
        let expected: BTreeSet<u64> = a.intersection(&b).copied().collect();
        prop_assert_eq!(risk_ids(&both.keys()), expected.clone());
        prop_assert_eq!(both.len(), expected.len());

        h.destroy(&key("AMapping", removed));
        let mut expected = expected;
        expected.remove(&removed);
        prop_assert_eq!(risk_ids(&both.keys()), expected);
    }
}
