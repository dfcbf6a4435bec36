//! # Shallow Equality
//!
//! One-level structural comparison used to gate every emission in the store.
//! Re-deriving a record whose fields are all pointer-identical to the previous
//! derivation must not be observed as a change.
//!
//! "Identity" ([`same`]) is pointer equality for aggregates and value equality
//! for scalars. Floats compare by bit pattern.

use crate::value::{Record, Value};
use std::sync::Arc;

/// Identity comparison: `Arc` pointer equality for lists and records, value
/// equality for scalars. Values of different kinds are never the same.
pub fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Str(x), Value::Str(y)) => Arc::ptr_eq(x, y) || x == y,
        (Value::List(x), Value::List(y)) => Arc::ptr_eq(x, y),
        (Value::Record(x), Value::Record(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// True iff `a` and `b` are the same, or both are records with identical key
/// sets whose values are pairwise the same. Lists never compare by content.
pub fn shallow_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Record(x), Value::Record(y)) => Arc::ptr_eq(x, y) || records_equal(x, y),
        _ => same(a, b),
    }
}

/// Shallow equality of two records: identical key sets, pairwise [`same`].
pub fn records_equal(a: &Record, b: &Record) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| same(v, other)))
}

/// Same, for optional values.
pub fn same_option(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => same(x, y),
        _ => false,
    }
}

/// Types that can be compared one level deep.
pub trait ShallowEq {
    /// One-level structural comparison.
    fn shallow_eq(&self, other: &Self) -> bool;
}

impl ShallowEq for Value {
    fn shallow_eq(&self, other: &Self) -> bool {
        shallow_equal(self, other)
    }
}

impl ShallowEq for Record {
    fn shallow_eq(&self, other: &Self) -> bool {
        records_equal(self, other)
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(x), Some(y)) => x.shallow_eq(y),
            _ => false,
        }
    }
}
