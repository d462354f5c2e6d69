use std::collections::BTreeMap;
use std::sync::Arc;

use statekeeper::{Context, ContextStore, InMemoryStore, ListDeletion, ListOperation, Row};

fn store() -> ContextStore {
    ContextStore::new(Arc::new(InMemoryStore::<Context>::new()))
}

fn props(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn row(v: &str) -> Row {
    Row::from([("k".to_string(), v.to_string())])
}

#[test]
fn never_written_id_is_absent() {
    let contexts = store();
    assert_eq!(contexts.get_context("ghost").unwrap(), None);
    assert!(!contexts.has_context("ghost").unwrap());
}

#[test]
fn records_merge_and_count() {
    let contexts = store();

    let first = contexts.record_context("a", props(&[("x", "1")]), None, None).unwrap();
    assert_eq!(first.update_count(), 0);

    contexts.record_context("a", props(&[("y", "2")]), None, None).unwrap();
    let ctx = contexts.get_context("a").unwrap().unwrap();
    let expected: BTreeMap<String, String> = props(&[("x", "1"), ("y", "2")]).into_iter().collect();
    assert_eq!(ctx.properties(), &expected);
    assert_eq!(ctx.update_count(), 1);
}

#[test]
fn empty_record_still_creates_context() {
    let contexts = store();
    let ctx = contexts.record_context("empty", Vec::new(), None, None).unwrap();
    assert!(ctx.properties().is_empty());
    assert!(ctx.list().is_empty());
    assert!(contexts.has_context("empty").unwrap());
}

#[test]
fn deleting_absent_id_changes_nothing() {
    let contexts = store();
    contexts.record_context("keep", props(&[("x", "1")]), None, None).unwrap();
    let before = contexts.snapshot_all().unwrap();

    contexts.delete_context("missing").unwrap();
    contexts.delete_contexts(["missing", "also-missing"]).unwrap();
    assert_eq!(contexts.delete_contexts_matching("nothing-.*").unwrap(), 0);

    assert_eq!(contexts.snapshot_all().unwrap(), before);
}

#[test]
fn list_deletion_from_two_rows() {
    let contexts = store();
    contexts
        .record_context("a", Vec::new(), Some(ListOperation::AddLast(row("1"))), None)
        .unwrap();
    contexts
        .record_context("a", Vec::new(), Some(ListOperation::AddLast(row("2"))), None)
        .unwrap();
    let before = contexts.get_context("a").unwrap().unwrap();

    assert!(!contexts.delete_list_entry("a", &ListDeletion::Index(5)).unwrap());
    assert_eq!(contexts.get_context("a").unwrap().unwrap(), before);

    assert!(contexts.delete_list_entry("a", &ListDeletion::First).unwrap());
    let after = contexts.get_context("a").unwrap().unwrap();
    assert_eq!(after.list(), [row("2")]);
    assert_eq!(after.update_count(), before.update_count() + 1);
}

#[test]
fn delete_where_removes_first_match_only() {
    let contexts = store();
    for v in ["x", "y", "y"] {
        contexts
            .record_context("a", Vec::new(), Some(ListOperation::AddLast(row(v))), None)
            .unwrap();
    }

    let deletion = ListDeletion::Where {
        property: "k".to_string(),
        value: "y".to_string(),
    };
    assert!(contexts.delete_list_entry("a", &deletion).unwrap());
    assert_eq!(contexts.get_context("a").unwrap().unwrap().list(), [row("x"), row("y")]);

    let unmatched = ListDeletion::Where {
        property: "k".to_string(),
        value: "z".to_string(),
    };
    assert!(!contexts.delete_list_entry("a", &unmatched).unwrap());
}

#[test]
fn snapshots_do_not_see_later_writes() {
    let contexts = store();
    contexts.record_context("a", props(&[("x", "1")]), None, None).unwrap();
    let snapshot = contexts.get_context("a").unwrap().unwrap();

    contexts
        .record_context("a", props(&[("x", "2")]), Some(ListOperation::AddLast(row("1"))), None)
        .unwrap();

    assert_eq!(snapshot.property("x"), Some("1"));
    assert!(snapshot.list().is_empty());
    assert_eq!(snapshot.update_count(), 0);
}

#[test]
fn delete_then_recreate_resets_count() {
    let contexts = store();
    contexts.record_context("a", Vec::new(), None, None).unwrap();
    contexts.record_context("a", Vec::new(), None, None).unwrap();
    contexts.delete_context("a").unwrap();

    let ctx = contexts.record_context("a", Vec::new(), None, None).unwrap();
    assert_eq!(ctx.update_count(), 0);
}

#[test]
fn invalid_index_text_is_rejected() {
    assert!(ListDeletion::index_from_str("-1").is_err());
    assert!(ListDeletion::index_from_str("abc").is_err());
    assert_eq!(ListDeletion::index_from_str("2").unwrap(), ListDeletion::Index(2));
}
