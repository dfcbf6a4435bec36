//! Computed views: memoization, loadable sources and stream inputs.

#![allow(clippy::unwrap_used)]

use futures::channel::mpsc;
use optica_store::optica_core::{LoadError, LoadSlot, LoadStatus, Value};
use optica_store::{Computers, Loaders};
use optica_testkit::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `length` of `todo.list`, counting its calls.
fn counted_length(calls: &Arc<AtomicUsize>) -> Computers {
    let calls = calls.clone();
    Computers::new().with("length", move |data: &Value| {
        calls.fetch_add(1, Ordering::SeqCst);
        let len = data
            .get_path(&["todo", "list"])
            .and_then(Value::as_list)
            .map_or(0, <[Value]>::len);
        Value::from(len as i64)
    })
}

#[test]
fn test_computes_at_most_once_per_slice() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    store
        .focus_path(["todo"])
        .unwrap()
        .register_handlers(list_handlers())
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let view = store.compute_from_fields(["todo"], counted_length(&calls)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(int_at(&view.current_data(), &["length"]), Some(3));

    store.dispatch(TodoAction::Increment);
    store.dispatch(TodoAction::SetCounter(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(int_at(&view.current_data(), &["counter"]), Some(0));

    store.dispatch(TodoAction::AddTodo("d".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(int_at(&view.current_data(), &["length"]), Some(4));
}

#[test]
fn test_compute_over_whole_state() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let view = store.compute(counted_length(&calls)).unwrap();
    assert!(view.path().starts_with("root.compute("));

    store.dispatch(TodoAction::Increment);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_data!(
        view,
        json!({ "counter": 43, "todo": { "list": ["a", "b", "c"] }, "length": 3 })
    );
}

#[test]
fn test_compute_from_field_receives_field_value() {
    let store = todo_store();
    let view = store
        .compute_from_field(
            "todo",
            Computers::new().with("size", |todo: &Value| {
                Value::from(todo.get("list").and_then(Value::as_list).map_or(0, <[Value]>::len) as i64)
            }),
        )
        .unwrap();

    assert_eq!(int_at(&view.current_data(), &["size"]), Some(3));
    assert_eq!(view.current_raw_state().values.get("size"), Some(&Value::from(3)));
}

#[test]
fn test_zero_keys_compute_once_from_empty_slice() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let seen: Recorder<Value> = Recorder::new();
    let record = seen.clone();
    let view = store
        .compute_from_fields(
            Vec::<&str>::new(),
            Computers::new().with("constant", move |data: &Value| {
                record.push(data.clone());
                Value::from("fixed")
            }),
        )
        .unwrap();

    store.dispatch(TodoAction::Increment);

    assert_eq!(seen.items(), vec![Value::empty_record()]);
    assert_eq!(
        view.current_data().get("constant"),
        Some(&Value::from("fixed"))
    );
}

#[test]
fn test_views_of_one_parent_are_isolated() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let counter_calls = Arc::new(AtomicUsize::new(0));
    let list_calls = Arc::new(AtomicUsize::new(0));
    let counted = counter_calls.clone();
    let _doubled = store
        .compute_from_fields(
            ["counter"],
            Computers::new().with("doubled", move |data: &Value| {
                counted.fetch_add(1, Ordering::SeqCst);
                Value::from(data.get("counter").and_then(Value::as_i64).unwrap_or(0) * 2)
            }),
        )
        .unwrap();
    let _length = store
        .compute_from_fields(["todo"], counted_length(&list_calls))
        .unwrap();

    store.dispatch(TodoAction::Increment);

    assert_eq!(counter_calls.load(Ordering::SeqCst), 2);
    assert_eq!(list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_compute_over_loadable_source() {
    let store = todo_store();
    let user = ManualLoader::new();
    let loaded = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let view = loaded
        .compute_from_fields(
            ["user"],
            Computers::new().with("greeting", move |data: &Value| {
                counted.fetch_add(1, Ordering::SeqCst);
                let name = data.get("user").and_then(Value::as_str).unwrap_or("?");
                Value::from(format!("hello {name}"))
            }),
        )
        .unwrap();
    assert_slot!(view, "greeting", LoadStatus::Loading);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    settle().await;
    assert!(user.emit(Ok(Value::from("ada"))));
    settle().await;

    assert_slot!(view, "greeting", LoadStatus::Loaded);
    assert_eq!(
        view.current_data().get("greeting"),
        Some(&Value::from("hello ada"))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_status!(view, LoadStatus::Loaded);
}

#[tokio::test]
async fn test_failed_source_fails_computed_slot() {
    let store = todo_store();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap()
        .compute_from_fields(
            ["user"],
            Computers::new().with("greeting", |_: &Value| Value::from("unused")),
        )
        .unwrap();

    settle().await;
    user.emit(Err(LoadError::new("offline")));
    settle().await;

    let raw = view.current_raw_state();
    assert_eq!(
        raw.loadable_values.get("greeting"),
        Some(&LoadSlot::failed(LoadError::new("offline")))
    );
    assert_status!(view, LoadStatus::Error);
    assert_eq!(view.current_errors().len(), 2);
}

#[tokio::test]
async fn test_compute_from_stream() {
    let store = todo_store();
    let (tx, rx) = mpsc::unbounded::<Value>();
    let view = store
        .compute_from_stream(
            rx,
            Computers::new().with("echo", |item: &Value| item.clone()),
        )
        .unwrap();
    assert_slot!(view, "echo", LoadStatus::Loading);
    assert_status!(view, LoadStatus::Loading);

    tx.unbounded_send(Value::from(1)).unwrap();
    settle().await;
    assert_eq!(view.current_data().get("echo"), Some(&Value::from(1)));

    tx.unbounded_send(Value::from(2)).unwrap();
    settle().await;
    assert_slot!(view, "echo", LoadStatus::Loaded);
    assert_eq!(view.current_data().get("echo"), Some(&Value::from(2)));
}
