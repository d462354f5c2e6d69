use std::sync::Arc;

use serde_json::json;

use statekeeper::{
    Context, ContextStore, DeleteOutcome, DeleteStateHandler, InMemoryStore, PathTemplateRenderer,
    RecordStateHandler, StateMatcher, TemplateRenderer,
};

struct Handlers {
    contexts: Arc<ContextStore>,
    record: RecordStateHandler,
    delete: DeleteStateHandler,
    matcher: StateMatcher,
}

fn handlers() -> Handlers {
    let contexts = Arc::new(ContextStore::new(Arc::new(InMemoryStore::<Context>::new())));
    let renderer: Arc<dyn TemplateRenderer> = Arc::new(PathTemplateRenderer);
    Handlers {
        record: RecordStateHandler::new(Arc::clone(&contexts), Arc::clone(&renderer)),
        delete: DeleteStateHandler::new(Arc::clone(&contexts), Arc::clone(&renderer)),
        matcher: StateMatcher::new(Arc::clone(&contexts), renderer),
        contexts,
    }
}

#[test]
fn shopping_cart_flow() {
    let h = handlers();
    let add = |item: &str| {
        h.record
            .handle(
                &json!({"request": {"cart": "c1", "item": item}}),
                &json!({
                    "context": "cart-{{request.cart}}",
                    "state": {"lastItem": "{{request.item}}"},
                    "list": {"addLast": {"item": "{{request.item}}"}},
                }),
            )
            .unwrap()
    };

    add("apple");
    add("pear");
    let ctx = add("plum");
    assert_eq!(ctx.update_count(), 2);
    assert_eq!(ctx.property("lastItem"), Some("plum"));

    let three_items = json!({
        "hasContext": "cart-{{request.cart}}",
        "listSizeEqualTo": 3,
        "list": {"first": {"item": {"equalTo": "apple"}}},
        "property": {"lastItem": {"equalTo": "{{context.list.[2].item}}"}},
    });
    assert!(h.matcher.match_request(&json!({"cart": "c1"}), &three_items).unwrap().is_match());

    let outcome = h
        .delete
        .handle(
            &json!({"request": {"item": "pear"}}),
            &json!({
                "context": "cart-c1",
                "list": {"deleteWhere": {"property": "item", "value": "{{request.item}}"}},
            }),
        )
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::ListEntry(true));
    assert!(!h.matcher.match_request(&json!({"cart": "c1"}), &three_items).unwrap().is_match());

    h.delete.handle(&json!({}), &json!({"context": "cart-c1"})).unwrap();
    assert!(h
        .matcher
        .match_request(&json!({}), &json!({"hasNotContext": "cart-c1"}))
        .unwrap()
        .is_match());
}

#[test]
fn delete_by_pattern_after_records() {
    let h = handlers();
    for id in ["session-1", "session-2", "profile-1"] {
        h.record.handle(&json!({}), &json!({"context": id})).unwrap();
    }

    let outcome = h
        .delete
        .handle(&json!({"request": {"kind": "session"}}), &json!({"contextsMatching": "{{request.kind}}-\\d+"}))
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Matching(2));
    assert!(h.contexts.has_context("profile-1").unwrap());
}

#[test]
fn record_then_ttl_is_stored() {
    let h = handlers();
    let ctx = h
        .record
        .handle(&json!({}), &json!({"context": "a", "ttlSeconds": 30}))
        .unwrap();
    assert_eq!(ctx.expiry(), Some(std::time::Duration::from_secs(30)));
}
