//! # Lenses and Updaters
//!
//! A [`Lens`] is a path of record fields. It provides the two operations the
//! store needs from an immutable-update library:
//!
//! - `read(tree)`: the value at the path, if any
//! - `update(tree, f)`: a new tree with `f` applied at the path, sharing every
//!   untouched subtree with the input
//!
//! An [`Updater`] is a pure `Value -> Value` transformation. Handlers return
//! updaters; the store lifts them through each view's write path and applies
//! them to the root tree.
//!
//! ```rust,ignore
//! let clear = Lens::path(["todo", "list"]).set_value(Value::list(vec![]));
//! let next = clear.apply(tree)?;
//! ```

use crate::equality::same;
use crate::error::UpdateError;
use crate::value::{Key, Record, Value};
use std::fmt;
use std::sync::Arc;

/// Boxed updater function.
type UpdateFn = Box<dyn FnOnce(Value) -> Result<Value, UpdateError> + Send>;

/// A pure, single-use transformation of a tree.
pub struct Updater {
    apply: UpdateFn,
}

impl Updater {
    /// Wrap a fallible transformation.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, UpdateError> + Send + 'static,
    {
        Self { apply: Box::new(f) }
    }

    /// Wrap an infallible transformation.
    pub fn map<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Value + Send + 'static,
    {
        Self::new(move |value| Ok(f(value)))
    }

    /// An updater that returns its input untouched.
    pub fn identity() -> Self {
        Self::new(Ok)
    }

    /// An updater that replaces its input.
    pub fn replace(value: Value) -> Self {
        Self::new(move |_| Ok(value))
    }

    /// An updater that always fails.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Err(UpdateError::handler(message)))
    }

    /// Run `self`, then `next` on its output.
    pub fn then(self, next: Updater) -> Self {
        Self::new(move |value| {
            let value = self.apply(value)?;
            next.apply(value)
        })
    }

    /// Chain several updaters left to right.
    pub fn pipe<I: IntoIterator<Item = Updater>>(updaters: I) -> Self {
        updaters.into_iter().fold(Self::identity(), Self::then)
    }

    /// Apply to a tree.
    pub fn apply(self, value: Value) -> Result<Value, UpdateError> {
        (self.apply)(value)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Updater(..)")
    }
}

/// A path of record fields into a tree. The empty path is the identity lens.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Lens {
    path: Arc<[Key]>,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            path: Arc::from(Vec::new()),
        }
    }
}

impl Lens {
    /// The identity lens.
    pub fn root() -> Self {
        Self::default()
    }

    /// A lens on a single field.
    pub fn key(name: impl AsRef<str>) -> Self {
        Self::path([name])
    }

    /// A lens on a nested field path.
    pub fn path<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            path: names.into_iter().map(crate::value::key).collect(),
        }
    }

    /// Extend the path by one field.
    pub fn focus(&self, name: impl AsRef<str>) -> Self {
        self.compose(&Self::key(name))
    }

    /// Extend the path by another lens.
    pub fn compose(&self, inner: &Lens) -> Self {
        Self {
            path: self.path.iter().chain(inner.path.iter()).cloned().collect(),
        }
    }

    /// The field names of the path.
    pub fn keys(&self) -> &[Key] {
        &self.path
    }

    /// True for the identity lens.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Dotted rendering of the path, for diagnostics.
    pub fn dotted(&self) -> String {
        self.path
            .iter()
            .map(|k| k.as_ref())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Read the value at the path.
    pub fn read(&self, tree: &Value) -> Option<Value> {
        self.path
            .iter()
            .try_fold(tree, |node, name| node.get(name))
            .cloned()
    }

    /// Produce a new tree with `f` applied to the value at the path. Missing
    /// intermediate records are created; descending through a non-record is an
    /// error. When `f` returns a value identical to the current one, the input
    /// tree is returned as-is so that unchanged updates stay unobservable.
    pub fn update<F>(&self, tree: &Value, f: F) -> Result<Value, UpdateError>
    where
        F: FnOnce(Option<Value>) -> Result<Value, UpdateError>,
    {
        update_at(tree, &self.path, 0, f)
    }

    /// Updater that replaces the value at the path.
    pub fn set_value(&self, value: Value) -> Updater {
        let lens = self.clone();
        Updater::new(move |tree| lens.update(&tree, |_| Ok(value)))
    }

    /// Updater that transforms the value at the path (`Null` when absent).
    pub fn update_value<F>(&self, f: F) -> Updater
    where
        F: FnOnce(Value) -> Value + Send + 'static,
    {
        let lens = self.clone();
        Updater::new(move |tree| lens.update(&tree, |current| Ok(f(current.unwrap_or_default()))))
    }

    /// Updater that runs another updater on the value at the path.
    pub fn apply(&self, inner: Updater) -> Updater {
        let lens = self.clone();
        Updater::new(move |tree| {
            lens.update(&tree, |current| inner.apply(current.unwrap_or_default()))
        })
    }
}

fn update_at<F>(node: &Value, path: &[Key], depth: usize, f: F) -> Result<Value, UpdateError>
where
    F: FnOnce(Option<Value>) -> Result<Value, UpdateError>,
{
    let Some((head, rest)) = path[depth..].split_first() else {
        return f(Some(node.clone()));
    };

    let record: &Record = match node {
        Value::Record(record) => record,
        Value::Null => return create_at(head, rest, f),
        other => {
            return Err(UpdateError::not_a_record(
                dotted(&path[..depth]),
                other.kind(),
            ))
        }
    };

    let next = match record.get(head) {
        Some(child) => update_at(child, path, depth + 1, f)?,
        None if rest.is_empty() => f(None)?,
        None => create_at(&rest[0], &rest[1..], f)?,
    };

    if record.get(head).is_some_and(|current| same(current, &next)) {
        return Ok(node.clone());
    }

    let mut updated = record.clone();
    updated.insert(head.clone(), next);
    Ok(Value::record(updated))
}

/// Build the missing records for `head.rest...` and apply `f` at the leaf.
fn create_at<F>(head: &Key, rest: &[Key], f: F) -> Result<Value, UpdateError>
where
    F: FnOnce(Option<Value>) -> Result<Value, UpdateError>,
{
    let leaf = match rest.split_first() {
        None => f(None)?,
        Some((next, tail)) => create_at(next, tail, f)?,
    };
    let mut record = Record::new();
    record.insert(head.clone(), leaf);
    Ok(Value::record(record))
}

fn dotted(path: &[Key]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter().map(|k| k.as_ref()).collect::<Vec<_>>().join(".")
}
