//! The todo-list store used across the test suites.

use optica_core::{Lens, Updater, Value};
use optica_store::{Action, Handlers, Store, StoreConfig};
use serde_json::json;

/// `{ counter: 42, todo: { list: ["a", "b", "c"] } }`
pub fn todo_state() -> Value {
    Value::from(json!({
        "counter": 42,
        "todo": { "list": ["a", "b", "c"] }
    }))
}

/// Actions of the todo-list store.
#[derive(Debug, Clone, PartialEq)]
pub enum TodoAction {
    /// Add one to the counter
    Increment,
    /// Set the counter
    SetCounter(i64),
    /// Append an item to the list
    AddTodo(String),
    /// Empty the list
    ClearTodoList,
    /// Ask for a user to be fetched
    FetchUser(String),
    /// A user was fetched
    UserFetched(String),
    /// Handled by an updater that always fails
    Broken,
}

impl Action for TodoAction {
    type Kind = &'static str;

    fn kind(&self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::SetCounter(_) => "setCounter",
            Self::AddTodo(_) => "addTodo",
            Self::ClearTodoList => "clearTodoList",
            Self::FetchUser(_) => "fetchUser",
            Self::UserFetched(_) => "userFetched",
            Self::Broken => "broken",
        }
    }
}

/// Silent root store over [`todo_state`].
pub fn todo_store() -> Store<TodoAction> {
    optica_store::create_store(todo_state(), StoreConfig::silent()).unwrap()
}

/// Counter handlers, for a view whose local state holds `counter`.
pub fn counter_handlers() -> Handlers<TodoAction> {
    let counter = Lens::key("counter");
    let set = counter.clone();
    Handlers::new()
        .on("increment", move |_| {
            counter.update_value(|n| Value::from(n.as_i64().unwrap_or(0) + 1))
        })
        .on("setCounter", move |action| match action {
            TodoAction::SetCounter(n) => set.set_value(Value::from(*n)),
            _ => Updater::identity(),
        })
}

/// List handlers, for a view whose local state is the `todo` record.
pub fn list_handlers() -> Handlers<TodoAction> {
    let list = Lens::key("list");
    let add = list.clone();
    Handlers::new()
        .on("clearTodoList", move |_| list.set_value(Value::list(Vec::new())))
        .on("addTodo", move |action| match action {
            TodoAction::AddTodo(item) => {
                let item = Value::from(item.as_str());
                add.update_value(move |current| {
                    let mut items = current.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                    items.push(item);
                    Value::list(items)
                })
            }
            _ => Updater::identity(),
        })
}

/// Read a list of strings out of `value`.
pub fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
