//! Loaded views: slot transitions, switch-latest and error isolation.

#![allow(clippy::unwrap_used)]

use futures::channel::mpsc;
use optica_store::optica_core::{LoadError, LoadSlot, LoadStatus, Value};
use optica_store::{Loaders, StoreError};
use optica_testkit::*;
use serde_json::json;

#[tokio::test]
async fn test_slot_goes_loading_then_loaded() {
    init_tracing();
    let store = todo_store();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    assert_eq!(view.path(), "root.load(user)");
    assert_slot!(view, "user", LoadStatus::Loading);
    assert_status!(view, LoadStatus::Loading);
    assert_eq!(user.inputs(), vec![Value::from(json!({ "counter": 42 }))]);

    settle().await;
    user.emit(Ok(Value::from("ada")));
    settle().await;

    assert_slot!(view, "user", LoadStatus::Loaded);
    assert_status!(view, LoadStatus::Loaded);
    assert_eq!(view.current_data().get("user"), Some(&Value::from("ada")));
}

#[tokio::test]
async fn test_every_item_settles_the_slot() {
    let store = todo_store();
    let feed = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("feed", feed.loader()))
        .unwrap();
    let mut data = view.data_stream();

    settle().await;
    feed.emit(Ok(Value::from(1)));
    feed.emit(Ok(Value::from(2)));
    settle().await;

    let feeds: Vec<Option<Value>> = data
        .drain_now()
        .iter()
        .map(|data| data.get("feed").cloned())
        .collect();
    assert_eq!(feeds, vec![None, Some(Value::from(1)), Some(Value::from(2))]);
}

#[tokio::test]
async fn test_error_terminates_the_loader() {
    let store = todo_store();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();

    settle().await;
    assert!(user.emit(Err(LoadError::new("boom"))));
    settle().await;

    assert_slot!(view, "user", LoadStatus::Error);
    assert_eq!(view.current_errors(), vec![LoadError::new("boom")]);
    assert!(!user.is_live(0));
    assert!(!user.emit(Ok(Value::from("late"))));
}

#[tokio::test]
async fn test_errors_are_isolated_per_key() {
    let store = todo_store();
    let user = ManualLoader::new();
    let posts = ManualLoader::new();
    let view = store
        .load_from_fields(
            ["counter"],
            Loaders::new()
                .with("user", user.loader())
                .with("posts", posts.loader()),
        )
        .unwrap();

    settle().await;
    user.emit(Err(LoadError::new("unauthorized")));
    posts.emit(Ok(Value::from(json!(["hello"]))));
    settle().await;

    assert_slot!(view, "user", LoadStatus::Error);
    assert_slot!(view, "posts", LoadStatus::Loaded);
    assert_status!(view, LoadStatus::Error);
    assert_eq!(
        view.current_data().get("posts"),
        Some(&Value::from(json!(["hello"])))
    );
    assert!(view.current_data().get("user").is_none());
}

#[tokio::test]
async fn test_future_loader_settles_once() {
    let store = todo_store();
    let view = store
        .load_from_fields(
            ["counter"],
            Loaders::new().future("double", |data: Value| async move {
                let counter = data.get("counter").and_then(Value::as_i64).unwrap_or(0);
                Ok::<_, LoadError>(Value::from(counter * 2))
            }),
        )
        .unwrap();

    settle().await;

    assert_eq!(
        view.current_raw_state().loadable_values.get("double"),
        Some(&LoadSlot::loaded(Value::from(84)))
    );
}

#[tokio::test]
async fn test_reload_only_when_slice_changes() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    store
        .focus_path(["todo"])
        .unwrap()
        .register_handlers(list_handlers())
        .unwrap();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    settle().await;
    user.emit(Ok(Value::from("ada")));
    settle().await;

    store.dispatch(TodoAction::AddTodo("d".into()));
    store.dispatch(TodoAction::SetCounter(42));
    assert_eq!(user.call_count(), 1);
    assert_slot!(view, "user", LoadStatus::Loaded);

    store.dispatch(TodoAction::Increment);
    assert_eq!(user.call_count(), 2);
    assert_eq!(user.inputs()[1], Value::from(json!({ "counter": 43 })));
    assert_slot!(view, "user", LoadStatus::Loading);
}

#[tokio::test]
async fn test_superseded_loader_is_aborted() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    settle().await;

    store.dispatch(TodoAction::Increment);
    user.emit_to(0, Ok(Value::from("stale")));
    settle().await;

    assert!(!user.is_live(0));
    assert!(user.is_live(1));
    assert_slot!(view, "user", LoadStatus::Loading);

    user.emit(Ok(Value::from("fresh")));
    settle().await;
    assert_eq!(view.current_data().get("user"), Some(&Value::from("fresh")));
}

#[tokio::test]
async fn test_failed_slot_keeps_error_until_reload_settles() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    settle().await;
    user.emit(Err(LoadError::new("boom")));
    settle().await;

    store.dispatch(TodoAction::Increment);
    assert_eq!(user.call_count(), 2);
    assert_slot!(view, "user", LoadStatus::Error);

    settle().await;
    user.emit(Ok(Value::from("ada")));
    settle().await;
    assert_slot!(view, "user", LoadStatus::Loaded);
}

#[tokio::test]
async fn test_chained_load_waits_for_its_source() {
    let store = todo_store();
    let user = ManualLoader::new();
    let profile = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap()
        .load_from_fields(["user"], Loaders::new().with("profile", profile.loader()))
        .unwrap();
    assert_eq!(profile.call_count(), 0);
    assert_slot!(view, "profile", LoadStatus::Loading);

    settle().await;
    user.emit(Ok(Value::from("ada")));
    settle().await;

    assert_eq!(profile.inputs(), vec![Value::from(json!({ "user": "ada" }))]);
    profile.emit(Ok(Value::from(json!({ "name": "Ada" }))));
    settle().await;
    assert_status!(view, LoadStatus::Loaded);
}

#[tokio::test]
async fn test_failed_source_fails_dependent_slots() {
    let store = todo_store();
    let user = ManualLoader::new();
    let profile = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap()
        .load_from_fields(["user"], Loaders::new().with("profile", profile.loader()))
        .unwrap();

    settle().await;
    user.emit(Err(LoadError::new("offline")));
    settle().await;

    assert_eq!(profile.call_count(), 0);
    assert_eq!(
        view.current_raw_state().loadable_values.get("profile"),
        Some(&LoadSlot::failed(LoadError::new("offline")))
    );
}

#[tokio::test]
async fn test_zero_keys_load_once() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    let config = ManualLoader::new();
    let _view = store
        .load_from_fields(Vec::<&str>::new(), Loaders::new().with("config", config.loader()))
        .unwrap();

    store.dispatch(TodoAction::Increment);

    assert_eq!(config.inputs(), vec![Value::empty_record()]);
}

#[tokio::test]
async fn test_load_from_stream_reloads_on_every_item() {
    let store = todo_store();
    let user = ManualLoader::new();
    let (tx, rx) = mpsc::unbounded::<Value>();
    let view = store
        .load_from_stream(rx, Loaders::new().with("user", user.loader()))
        .unwrap();
    assert_eq!(view.path(), "root.loadFromStream(user)");
    assert_eq!(user.call_count(), 0);

    tx.unbounded_send(Value::from("ada")).unwrap();
    settle().await;
    tx.unbounded_send(Value::from("ada")).unwrap();
    settle().await;

    assert_eq!(user.call_count(), 2);
    assert!(!user.is_live(0));
    user.emit(Ok(Value::from(json!({ "name": "Ada" }))));
    settle().await;
    assert_slot!(view, "user", LoadStatus::Loaded);
}

#[tokio::test]
async fn test_dropping_view_aborts_loaders() {
    let store = todo_store();
    let user = ManualLoader::new();
    let view = store
        .load_from_fields(["counter"], Loaders::new().with("user", user.loader()))
        .unwrap();
    settle().await;
    assert!(user.is_live(0));

    drop(view);
    settle().await;

    assert!(!user.is_live(0));
}

#[tokio::test]
async fn test_loader_key_collision_is_rejected() {
    let store = todo_store();
    let err = store
        .load_from_fields(["counter"], Loaders::new().with("todo", ManualLoader::new().loader()))
        .unwrap_err();
    assert!(matches!(err, StoreError::KeyCollision { .. }));
}

#[test]
fn test_loading_needs_a_runtime() {
    let store = todo_store();
    let err = store
        .load_from_fields(["counter"], Loaders::new().with("user", ManualLoader::new().loader()))
        .unwrap_err();
    assert!(matches!(err, StoreError::NoRuntime { .. }));
}

#[test]
fn test_configured_runtime_is_used_outside_async_context() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let store = optica_store::create_store::<TodoAction>(
        todo_state(),
        optica_store::StoreConfig::silent().with_runtime(runtime.handle().clone()),
    )
    .unwrap();
    let view = store
        .load_from_fields(
            ["counter"],
            Loaders::new().future("answer", |_| async { Ok::<_, LoadError>(Value::from(42)) }),
        )
        .unwrap();

    runtime.block_on(settle());

    assert_eq!(view.current_data().get("answer"), Some(&Value::from(42)));
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_views_attached_across_threads_settle_on_latest_state() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();

    let attach: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .load_from_fields(
                        ["counter"],
                        Loaders::new().future("double", |data: Value| async move {
                            let counter = data.get("counter").and_then(Value::as_i64).unwrap_or(0);
                            Ok::<_, LoadError>(Value::from(counter * 2))
                        }),
                    )
                    .unwrap()
            })
        })
        .collect();
    let dispatch: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.dispatch(TodoAction::Increment) })
        })
        .collect();

    let mut views = Vec::new();
    for handle in attach {
        views.push(handle.await.unwrap());
    }
    for handle in dispatch {
        handle.await.unwrap();
    }
    assert_eq!(int_at(&store.current_data(), &["counter"]), Some(50));

    for view in &views {
        let settled = eventually(|| {
            view.current_status() == LoadStatus::Loaded
                && view.current_data().get("double") == Some(&Value::from(100))
        })
        .await;
        assert!(settled, "{} never settled on the latest counter", view.path());
    }
}
