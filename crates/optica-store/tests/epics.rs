//! Epics: action streams mapped to follow-up actions.

#![allow(clippy::unwrap_used)]

use futures::StreamExt;
use optica_store::optica_core::{Lens, UpdateError, Updater, Value};
use optica_store::{Epics, Handlers, StoreError};
use optica_testkit::*;

fn user_handlers() -> Handlers<TodoAction> {
    let user = Lens::key("user");
    Handlers::new().on("userFetched", move |action| match action {
        TodoAction::UserFetched(name) => user.set_value(Value::from(name.as_str())),
        _ => Updater::identity(),
    })
}

fn fetch_epic() -> Epics<TodoAction> {
    Epics::new().on("fetchUser", |actions, _reader| {
        actions
            .map(|action| match action {
                TodoAction::FetchUser(name) => Ok(TodoAction::UserFetched(name.to_uppercase())),
                other => Err(UpdateError::handler(format!("unexpected {other:?}"))),
            })
            .boxed()
    })
}

#[tokio::test]
async fn test_epic_dispatches_follow_up_action() {
    let store = todo_store();
    store.register_handlers(user_handlers()).unwrap();
    store.epics(fetch_epic()).unwrap();
    let mut actions = store.action_stream();

    store.dispatch(TodoAction::FetchUser("ada".into()));
    settle().await;

    assert_eq!(
        store.current_data().get("user"),
        Some(&Value::from("ADA"))
    );
    assert_eq!(
        actions.drain_now(),
        vec![
            TodoAction::FetchUser("ada".into()),
            TodoAction::UserFetched("ADA".into()),
        ]
    );
}

#[tokio::test]
async fn test_epic_errors_are_skipped() {
    let store = todo_store();
    store.register_handlers(counter_handlers()).unwrap();
    store
        .epics(Epics::new().on("increment", |actions, reader| {
            actions
                .map(move |_| {
                    let counter = int_at(&reader.current_data(), &["counter"]).unwrap_or(0);
                    if counter % 2 == 0 {
                        Ok(TodoAction::SetCounter(counter * 10))
                    } else {
                        Err(UpdateError::handler("odd counter"))
                    }
                })
                .boxed()
        }))
        .unwrap();

    store.dispatch(TodoAction::Increment);
    settle().await;
    assert_eq!(int_at(&store.current_data(), &["counter"]), Some(43));

    store.dispatch(TodoAction::Increment);
    settle().await;
    assert_eq!(int_at(&store.current_data(), &["counter"]), Some(440));
}

#[tokio::test]
async fn test_epic_on_view_reads_that_view() {
    let store = todo_store();
    let todo = store.focus_path(["todo"]).unwrap();
    let seen: Recorder<Value> = Recorder::new();
    let record = seen.clone();
    todo.epics(Epics::new().on("fetchUser", move |actions, reader| {
        let record = record.clone();
        actions
            .filter_map(move |_| {
                record.push(reader.current_data());
                futures::future::ready(None::<Result<TodoAction, UpdateError>>)
            })
            .boxed()
    }))
    .unwrap();

    store.dispatch(TodoAction::FetchUser("ada".into()));
    settle().await;

    assert_eq!(seen.len(), 1);
    assert_eq!(strings(seen.items()[0].get("list")), ["a", "b", "c"]);
}

#[tokio::test]
async fn test_epic_stops_when_view_is_dropped() {
    let store = todo_store();
    store.register_handlers(user_handlers()).unwrap();
    let todo = store.focus_path(["todo"]).unwrap();
    todo.epics(fetch_epic()).unwrap();
    let mut actions = store.action_stream();

    drop(todo);
    settle().await;
    store.dispatch(TodoAction::FetchUser("ada".into()));
    settle().await;

    assert!(store.current_data().get("user").is_none());
    assert_eq!(actions.drain_now(), vec![TodoAction::FetchUser("ada".into())]);
}

#[test]
fn test_epics_need_a_runtime() {
    let store = todo_store();
    let err = store.epics(fetch_epic()).unwrap_err();
    assert!(matches!(err, StoreError::NoRuntime { .. }));
}
