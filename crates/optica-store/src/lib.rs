//! Optica Store - Reactive views over a single state tree
//!
//! A store holds one authoritative tree. Views are derived from it by
//! focusing, recomposing, computing and loading; every view can be read
//! synchronously, observed as a stream, and written to by dispatching
//! actions whose handlers were registered against that view's local state.
//!
//! # Architecture
//!
//! ## Propagation
//! - [`Store`]: a handle on one view; [`create_store`] builds the root
//! - All mutation runs as jobs on a single-writer scheduler, so a dispatch
//!   issued from a listener runs after the current one completes
//! - A view only emits when its raw state changes under shallow equality
//!
//! ## Composition
//! - [`Store::focus_path`], [`Store::focus_fields`], [`Store::recompose`]
//! - Handlers registered on a composed view are lifted back to the root
//!
//! ## Derivation
//! - [`Store::compute_from_fields`] and friends: memoized [`Computers`]
//! - [`Store::load_from_fields`], [`Store::load_from_stream`]: [`Loaders`]
//!   settling loadable slots on a Tokio runtime
//!
//! ## Actions
//! - [`Handlers`]: one updater per action kind, store-wide
//! - [`Epics`]: action streams in, actions out
//! - [`SideEffects`]: callbacks after an action's update

#![forbid(unsafe_code)]

/// Actions, handlers, epics and side effects
pub mod action;

/// Store configuration
pub mod config;

/// View derivations
pub mod derive;

/// Wiring errors
pub mod error;

/// Listener sets and subscriptions
pub mod listener;

/// Structured event logging
pub mod logger;

mod node;
mod scheduler;
mod shared;

/// Store handles and readers
pub mod store;

/// Push streams over views
pub mod stream;

mod tasks;

pub use action::{Action, EpicFn, Epics, Handlers, SideEffectFn, SideEffects};
pub use config::{LoggerOptions, StoreConfig, StoreSettings};
pub use derive::{ComputeFn, Computers, Fields, LoadFn, LoadStream, Loaders};
pub use error::StoreError;
pub use listener::{ListenerId, Subscription};
pub use logger::{LogEvent, Logger};
pub use store::{create_store, StateReader, Store};
pub use stream::ViewStream;

pub use optica_core;
