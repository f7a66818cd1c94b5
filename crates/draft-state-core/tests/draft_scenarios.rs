use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use draft_state_core::{
    DraftError, Finalized, ForkStore, Record, draft_for, draft_state_for, finalize, record, shared,
};
use serde_json::{Value, json};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const RETURN: &str = "this is not a draft state!";

#[derive(Debug)]
struct Original {
    data: i64,
}

record!(Original { data });

#[derive(Debug)]
struct OwnFinalize {
    data: i64,
    calls: u32,
}

impl OwnFinalize {
    fn finalize(&mut self) -> &'static str {
        self.calls += 1;
        RETURN
    }
}

record!(OwnFinalize { data } finalize = OwnFinalize::finalize);

#[derive(Debug)]
struct Unconvertible {
    data: i64,
}

impl Unconvertible {
    fn finalize(&mut self) -> BTreeMap<(u8, u8), i64> {
        BTreeMap::from([((0, 0), self.data)])
    }
}

record!(Unconvertible { data } finalize = Unconvertible::finalize);

// ---------------------------------------------------------------------------
// Diagnostics capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

impl Captured {
    fn warnings(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == Level::WARN)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, Captured) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, captured)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn construction_rejects_non_objects() {
    let cases = [
        (json!(null), "when it is null"),
        (json!(123), "when it is a number"),
        (json!("hello"), "when it is a string"),
        (json!(true), "when it is a boolean"),
        (json!([]), "when it is an array"),
    ];
    for (value, label) in cases {
        let original = shared(value);
        match draft_state_for(&original) {
            Err(DraftError::Construction { .. }) => {}
            other => panic!("{label}: expected construction error, got {other:?}"),
        }
    }
}

#[test]
fn construction_error_names_argument() {
    let original = shared(json!([1, 2]));
    let err = draft_state_for(&original).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Attempted to construct a DraftState with \"[1,2]\""
    );
}

#[test]
fn construction_succeeds_with_an_object() {
    let original = shared(json!({"a": true}));
    let draft = draft_state_for(&original).unwrap();
    assert_eq!(draft.get("a").unwrap(), Some(json!(true)));
}

// ---------------------------------------------------------------------------
// Forking state
// ---------------------------------------------------------------------------

#[test]
fn mutates_the_draft_but_not_the_original() {
    let original = shared(json!({"data": true}));
    let draft = draft_state_for(&original).unwrap();

    draft.set("data", json!(false)).unwrap();

    assert_eq!(original.borrow()["data"], true, "original.data is unchanged");
    assert_eq!(draft.get("data").unwrap(), Some(json!(false)));
}

#[test]
fn forking_is_lazy() {
    let original = shared(BTreeMap::from([(
        "refType".to_string(),
        Rc::new(vec![1, 2, 3]),
    )]));
    let draft = draft_state_for(&original).unwrap();

    let through_draft = draft.get("refType").unwrap().unwrap();
    assert!(
        Rc::ptr_eq(&through_draft, &original.borrow()["refType"]),
        "reference types are the same until explicitly forked"
    );

    let mut extended = (*through_draft).clone();
    extended.extend([4, 5, 6]);
    draft.set("refType", Rc::new(extended)).unwrap();

    let forked = draft.get("refType").unwrap().unwrap();
    assert!(
        !Rc::ptr_eq(&forked, &original.borrow()["refType"]),
        "but diverge once explicitly set"
    );
    assert_eq!(*original.borrow()["refType"], vec![1, 2, 3]);
}

#[test]
fn unwritten_keys_track_external_mutation() {
    let original = shared(json!({"a": 1, "b": 1}));
    let draft = draft_state_for(&original).unwrap();
    draft.set("a", json!(2)).unwrap();

    original.borrow_mut()["a"] = json!(10);
    original.borrow_mut()["b"] = json!(10);

    assert_eq!(draft.get("a").unwrap(), Some(json!(2)));
    assert_eq!(draft.get("b").unwrap(), Some(json!(10)));
}

#[test]
fn failed_access_leaves_state_untouched() {
    let original = shared(json!({"a": 1}));
    let draft = draft_state_for(&original).unwrap();
    draft.set("a", json!(2)).unwrap();

    assert!(matches!(
        draft.set("b", json!(3)),
        Err(DraftError::Access { .. })
    ));
    assert!(matches!(draft.get("b"), Err(DraftError::Access { .. })));
    assert_eq!(draft.staged_keys(), vec!["a"]);
    assert_eq!(*original.borrow(), json!({"a": 1}));
}

// ---------------------------------------------------------------------------
// Finalizing
// ---------------------------------------------------------------------------

#[test]
fn method_finalize_in_the_default_case() {
    let original = shared(Original { data: 123 });
    let draft = draft_state_for(&original).unwrap();
    draft.set("data", json!(456)).unwrap();
    assert_eq!(original.borrow().data, 123);

    let result = draft.finalize().merged().expect("merged");
    assert_eq!(original.borrow().data, 456, "updates the original data");
    assert!(Rc::ptr_eq(&result, &original), "returns the finalized object");
}

#[test]
fn free_finalize_in_the_default_case() {
    let original = shared(Original { data: 123 });
    let draft = draft_state_for(&original).unwrap();
    draft.set("data", json!(456)).unwrap();

    let result = finalize(&draft);
    assert_eq!(original.borrow().data, 456);
    assert!(Rc::ptr_eq(&result, &original));
}

#[test]
fn method_finalize_calls_the_records_own_member() {
    let original = shared(OwnFinalize { data: 123, calls: 0 });
    let draft = draft_state_for(&original).unwrap();
    draft.set("data", json!(456)).unwrap();

    match draft.finalize() {
        Finalized::Member(value) => assert_eq!(value, json!(RETURN)),
        Finalized::Merged(_) => panic!("the record's own finalize should run"),
    }
    assert_eq!(original.borrow().data, 123, "the original data is not updated");
    assert_eq!(original.borrow().calls, 1);
    assert!(draft.is_dirty());
}

#[test]
fn free_finalize_merges_despite_own_member() {
    let original = shared(OwnFinalize { data: 123, calls: 0 });
    let draft = draft_state_for(&original).unwrap();
    draft.set("data", json!(456)).unwrap();

    let result = finalize(&draft);
    assert_eq!(original.borrow().data, 456);
    assert_eq!(original.borrow().calls, 0, "should never be called");
    assert!(Rc::ptr_eq(&result, &original));
}

#[test]
fn finalize_merges_exactly_the_overlay() {
    let original = shared(json!({"a": 1, "b": 2, "c": 3}));
    let draft = draft_state_for(&original).unwrap();
    draft.set("a", json!(10)).unwrap();
    draft.set("c", json!(30)).unwrap();
    draft.set("c", json!(31)).unwrap();

    finalize(&draft);
    assert_eq!(*original.borrow(), json!({"a": 10, "b": 2, "c": 31}));
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[test]
fn collision_is_reported_at_construction() {
    let original = shared(OwnFinalize { data: 1, calls: 0 });
    let (draft, captured) = capture(|| draft_state_for(&original).unwrap());

    assert!(draft.has_finalize_collision());
    let warnings = captured.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("own `finalize`"), "{warnings:?}");
}

#[test]
fn no_collision_no_warning() {
    let original = shared(Original { data: 1 });
    let (draft, captured) = capture(|| draft_state_for(&original).unwrap());
    assert!(!draft.has_finalize_collision());
    assert!(captured.warnings().is_empty());
}

#[test]
fn unconvertible_member_result_is_logged() {
    let original = shared(Unconvertible { data: 7 });
    let draft = draft_state_for(&original).unwrap();

    let (result, captured) = capture(|| draft.finalize());
    match result {
        Finalized::Member(value) => assert_eq!(value, Value::Null),
        Finalized::Merged(_) => panic!("the record's own finalize should run"),
    }
    let warnings = captured.warnings();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("returning null"), "{warnings:?}");
}

#[test]
fn permissive_bad_set_warns_and_stages() {
    let original = shared(json!({"a": 1}));
    let draft = draft_for(&original).unwrap();

    let ((), captured) = capture(|| draft.set("b", json!(2)).unwrap());
    assert_eq!(captured.warnings().len(), 1);
    assert_eq!(draft.get("b").unwrap(), Some(json!(2)));
}

#[test]
fn rejected_merge_value_is_dropped_with_warning() {
    let original = shared(Original { data: 1 });
    let draft = draft_state_for(&original).unwrap();
    draft.set("data", json!("not a number")).unwrap();

    let (_, captured) = capture(|| finalize(&draft));
    assert_eq!(original.borrow().data, 1);
    assert!(!draft.is_dirty());
    assert_eq!(captured.warnings().len(), 1);
}

// ---------------------------------------------------------------------------
// Overlay scope
// ---------------------------------------------------------------------------

#[test]
fn private_overlays_are_independent() {
    let original = shared(json!({"data": 0}));
    let first = draft_state_for(&original).unwrap();
    let second = draft_state_for(&original).unwrap();

    first.set("data", json!(1)).unwrap();
    assert_eq!(second.get("data").unwrap(), Some(json!(0)));

    second.set("data", json!(2)).unwrap();
    finalize(&first);
    assert_eq!(original.borrow()["data"], 1);
    assert_eq!(second.get("data").unwrap(), Some(json!(2)));
}

#[test]
fn store_allows_one_draft_per_original() {
    let store: Rc<ForkStore<Value>> = Rc::new(ForkStore::new());
    let original = shared(json!({"data": 0}));

    let draft = store.draft_state_for(&original).unwrap();
    assert!(draft.fork_id().is_some());
    assert!(matches!(
        store.draft_state_for(&original),
        Err(DraftError::AlreadyForked { .. })
    ));

    draft.set("data", json!(5)).unwrap();
    assert_eq!(store.overlay(draft.fork_id().unwrap()).len(), 1);
    finalize(&draft);
    assert_eq!(original.borrow()["data"], 5);

    drop(draft);
    assert!(store.is_empty());
    assert!(store.draft_state_for(&original).is_ok());
}

#[test]
fn store_rejects_non_objects_without_allocating() {
    let store: Rc<ForkStore<Value>> = Rc::new(ForkStore::new());
    let original = shared(json!(null));

    assert!(store.draft_state_for(&original).unwrap_err().is_construction());
    assert!(store.is_empty());
}

#[test]
fn store_draft_honours_config() {
    let store: Rc<ForkStore<Value>> = Rc::new(ForkStore::new());
    let original = shared(json!({}));
    let draft = store
        .draft_with_config(&original, &draft_state_core::DraftConfig::permissive())
        .unwrap();

    draft.set("new", json!(1)).unwrap();
    finalize(&draft);
    assert!(original.borrow().has_property("new"));
}
