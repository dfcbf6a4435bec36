//! Optica Core - Pure data layer of the Optica state container
//!
//! Everything here is synchronous and side-effect free. The propagation
//! engine in `optica-store` is built on top of these types.
//!
//! # Layers
//!
//! ## Values
//! - [`Value`]: dynamic tree with `Arc`-shared lists and records
//! - [`shallow_equal`]: one-level comparison gating every emission
//!
//! ## Lenses
//! - [`Lens`]: `read(tree)` and `update(tree, f)` for a field path
//! - [`Updater`]: pure tree transformation returned by action handlers
//!
//! ## Raw State
//! - [`RawState`]: `redux_state` / `values` / `loadable_values` buckets
//! - [`pick_raw_state`], [`to_data`], [`from_raw_state`], [`is_loaded`]
//! - [`aggregate`]: store-wide status of all loadable slots

#![forbid(unsafe_code)]

/// Shallow equality
pub mod equality;

/// Update and load errors
pub mod error;

/// Lenses and updaters
pub mod lens;

/// Raw-state buckets and projections
pub mod raw_state;

/// Status aggregation
pub mod status;

/// The dynamic value tree
pub mod value;

pub use equality::{records_equal, same, same_option, shallow_equal, ShallowEq};
pub use error::{LoadError, UpdateError};
pub use lens::{Lens, Updater};
pub use raw_state::{
    from_raw_state, is_loaded, pick_raw_state, to_data, Bucket, DerivedState, LoadSlot,
    LoadStatus, LoadableValues, RawState,
};
pub use status::{aggregate, StatusSummary};
pub use value::{key, keys, Key, Record, Value, ValueKind};
