//! # Raw State
//!
//! The three-bucket representation every view derives from:
//!
//! - `redux_state`: the user-authored subtree visible at the view
//! - `values`: synchronously computed fields
//! - `loadable_values`: asynchronously computed fields, one [`LoadSlot`] each
//!
//! Keys are expected to be disjoint across buckets. When they are not, the
//! [`Bucket::PRECEDENCE`] table decides which bucket a key resolves to, both
//! when picking ([`pick_raw_state`]) and when flattening ([`to_data`]).

use crate::equality::{records_equal, same_option, shallow_equal, ShallowEq};
use crate::error::LoadError;
use crate::status::{aggregate, StatusSummary};
use crate::value::{Key, Record, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single asynchronous value, or of a whole view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// Waiting for the source to emit
    Loading,
    /// The source emitted a value
    Loaded,
    /// The source failed
    Error,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        })
    }
}

/// Per-key record tracking an asynchronous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSlot {
    /// Current status
    pub status: LoadStatus,
    /// Latest value, if one was produced
    pub value: Option<Value>,
    /// Failure, if the source failed
    pub error: Option<LoadError>,
}

impl LoadSlot {
    /// A pending slot without value.
    pub fn loading() -> Self {
        Self {
            status: LoadStatus::Loading,
            value: None,
            error: None,
        }
    }

    /// A settled slot.
    pub fn loaded(value: Value) -> Self {
        Self {
            status: LoadStatus::Loaded,
            value: Some(value),
            error: None,
        }
    }

    /// A failed slot.
    pub fn failed(error: LoadError) -> Self {
        Self {
            status: LoadStatus::Error,
            value: None,
            error: Some(error),
        }
    }

    /// True once the slot holds a value.
    pub fn is_loaded(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

impl ShallowEq for LoadSlot {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.status == other.status
            && same_option(self.value.as_ref(), other.value.as_ref())
            && self.error == other.error
    }
}

/// Loadable bucket, in insertion order.
pub type LoadableValues = IndexMap<Key, LoadSlot>;

/// One of the three raw-state buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    /// Asynchronously computed fields
    LoadableValues,
    /// Synchronously computed fields
    Values,
    /// User-authored state
    ReduxState,
}

impl Bucket {
    /// Lookup order for a key present in several buckets: the first bucket
    /// holding the key wins. Flattening applies the reverse order, so the
    /// same bucket also wins there.
    pub const PRECEDENCE: [Bucket; 3] = [Bucket::LoadableValues, Bucket::Values, Bucket::ReduxState];
}

/// The normalized state of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawState {
    /// User-authored state; a record except for list-focused views
    pub redux_state: Value,
    /// Synchronously computed fields
    pub values: Record,
    /// Asynchronously computed fields
    pub loadable_values: LoadableValues,
}

impl Default for RawState {
    fn default() -> Self {
        Self::new(Value::empty_record())
    }
}

impl RawState {
    /// Raw state with empty computed buckets.
    pub fn new(redux_state: Value) -> Self {
        Self {
            redux_state,
            values: Record::new(),
            loadable_values: LoadableValues::new(),
        }
    }

    /// The bucket `key` resolves to, following [`Bucket::PRECEDENCE`].
    pub fn locate(&self, key: &str) -> Option<Bucket> {
        Bucket::PRECEDENCE
            .into_iter()
            .find(|bucket| self.contains_in(*bucket, key))
    }

    /// True if `bucket` holds `key`.
    pub fn contains_in(&self, bucket: Bucket, key: &str) -> bool {
        match bucket {
            Bucket::LoadableValues => self.loadable_values.contains_key(key),
            Bucket::Values => self.values.contains_key(key),
            Bucket::ReduxState => self.redux_state.get(key).is_some(),
        }
    }

    /// Every key of every bucket (duplicates included), redux state first.
    pub fn keys(&self) -> Vec<Key> {
        let redux = self
            .redux_state
            .as_record()
            .into_iter()
            .flat_map(|record| record.keys().cloned());
        redux
            .chain(self.values.keys().cloned())
            .chain(self.loadable_values.keys().cloned())
            .collect()
    }

    /// Keys present in more than one bucket.
    pub fn colliding_keys(&self) -> Vec<Key> {
        let mut seen = IndexMap::<Key, usize>::new();
        for key in self.keys() {
            *seen.entry(key).or_default() += 1;
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key)
            .collect()
    }

    /// Aggregate status of the loadable bucket.
    pub fn status(&self) -> StatusSummary {
        aggregate(self.loadable_values.values())
    }

    /// True iff every slot is loaded.
    pub fn is_loaded(&self) -> bool {
        is_loaded(self)
    }
}

impl ShallowEq for RawState {
    fn shallow_eq(&self, other: &Self) -> bool {
        shallow_equal(&self.redux_state, &other.redux_state)
            && records_equal(&self.values, &other.values)
            && self.loadable_values.len() == other.loadable_values.len()
            && self.loadable_values.iter().all(|(key, slot)| {
                other
                    .loadable_values
                    .get(key)
                    .is_some_and(|o| slot.shallow_eq(o))
            })
    }
}

/// What consumers see: aggregated status and errors plus flattened data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedState {
    /// Aggregate status of all loadable slots
    pub status: LoadStatus,
    /// Flattened data, see [`to_data`]
    pub data: Value,
    /// All slot errors, in slot order
    pub errors: Vec<LoadError>,
    /// The raw state this was derived from
    pub raw: RawState,
}

/// Select `keys` from `state`, each resolved to the first bucket in
/// [`Bucket::PRECEDENCE`] holding it. Keys found nowhere are omitted.
pub fn pick_raw_state<S: AsRef<str>>(state: &RawState, keys: &[S]) -> RawState {
    let mut redux = Record::new();
    let mut picked = RawState::new(Value::Null);

    for name in keys {
        let name = name.as_ref();
        match state.locate(name) {
            Some(Bucket::LoadableValues) => {
                if let Some((key, slot)) = state.loadable_values.get_key_value(name) {
                    picked.loadable_values.insert(key.clone(), slot.clone());
                }
            }
            Some(Bucket::Values) => {
                if let Some((key, value)) = state.values.get_key_value(name) {
                    picked.values.insert(key.clone(), value.clone());
                }
            }
            Some(Bucket::ReduxState) => {
                if let Some((key, value)) = state
                    .redux_state
                    .as_record()
                    .and_then(|record| record.get_key_value(name))
                {
                    redux.insert(key.clone(), value.clone());
                }
            }
            None => {}
        }
    }

    picked.redux_state = Value::record(redux);
    picked
}

/// Flatten a raw state: redux state, overlaid by `values`, overlaid by the
/// unwrapped loadable values. A slot without a value contributes no key.
///
/// A state with empty computed buckets flattens to its redux state as-is, so
/// list-focused views keep the identical list.
pub fn to_data(state: &RawState) -> Value {
    if state.values.is_empty() && state.loadable_values.is_empty() {
        return state.redux_state.clone();
    }

    let mut data = state.redux_state.as_record().cloned().unwrap_or_default();
    for bucket in Bucket::PRECEDENCE.into_iter().rev() {
        match bucket {
            Bucket::ReduxState => {}
            Bucket::Values => {
                for (key, value) in &state.values {
                    data.insert(key.clone(), value.clone());
                }
            }
            Bucket::LoadableValues => {
                for (key, slot) in &state.loadable_values {
                    if let Some(value) = &slot.value {
                        data.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }
    Value::record(data)
}

/// The externally visible envelope of a raw state.
pub fn from_raw_state(state: &RawState) -> DerivedState {
    let StatusSummary { status, errors } = state.status();
    DerivedState {
        status,
        data: to_data(state),
        errors,
        raw: state.clone(),
    }
}

/// True iff every loadable slot is loaded (vacuously true when there are none).
pub fn is_loaded(state: &RawState) -> bool {
    state.loadable_values.values().all(LoadSlot::is_loaded)
}
