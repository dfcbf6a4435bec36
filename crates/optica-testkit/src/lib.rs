//! Optica Testing Infrastructure
//!
//! Shared fixtures for store tests: a todo-list state and action type,
//! recorders for listener output, loaders whose results the test controls,
//! and assertion macros over a view's current data and status.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! optica-testkit = { path = "../optica-testkit" }
//! ```
//!
//! ```rust,no_run
//! use optica_testkit::*;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let store = todo_store();
//!     store.register_handlers(counter_handlers()).unwrap();
//!     store.dispatch(TodoAction::Increment);
//!     assert_data!(store, serde_json::json!({ "counter": 43, "todo": { "list": ["a", "b", "c"] } }));
//! }
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod assertions;
pub mod fixtures;
pub mod recorder;
pub mod sources;

pub use assertions::int_at;
pub use fixtures::*;
pub use recorder::Recorder;
pub use sources::{settle, ManualLoader};

pub use optica_core;
pub use optica_store;

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Filtered by `RUST_LOG`; only errors are shown when it is unset.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
