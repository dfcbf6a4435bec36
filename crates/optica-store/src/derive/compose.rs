//! Composition: views that reshape their parent's state.
//!
//! | Operation | Local state | Write path |
//! |-----------|-------------|------------|
//! | `focus_path` | value at a path of the parent's state | lens update at the path |
//! | `focus_fields` | record of picked parent keys | write each picked field back |
//! | `recompose` | record of named lenses into the parent | write each field through its lens |
//!
//! `focus_path` and `recompose` can pass computed keys down from the parent.
//! Passed-down keys land in `values`, or stay in `loadable_values` when they
//! were loadable in the parent.

use crate::action::Action;
use crate::error::StoreError;
use crate::node::{DeriveCx, Derivation, Node, WritePath};
use crate::store::Store;
use indexmap::IndexMap;
use optica_core::{
    pick_raw_state, same_option, Key, Lens, RawState, Record, UpdateError, Updater, Value,
};
use std::fmt;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Fields
// ─────────────────────────────────────────────────────────────────────────────

/// Named lenses describing a record shape.
///
/// ```rust,ignore
/// let fields = Fields::new()
///     .field("items", Lens::path(["todo", "list"]))
///     .key("counter");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: IndexMap<Key, Lens>,
}

impl Fields {
    /// No fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Field `name` read through `lens`. A later field with the same name
    /// replaces the earlier one.
    pub fn field(mut self, name: impl AsRef<str>, lens: Lens) -> Self {
        self.entries.insert(optica_core::key(name), lens);
        self
    }

    /// Field `name` read from the top-level key of the same name.
    pub fn key(self, name: impl AsRef<str>) -> Self {
        let lens = Lens::key(name.as_ref());
        self.field(name, lens)
    }

    /// Field names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_ref())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the record from `tree`. Fields whose lens reads nothing are
    /// omitted.
    pub fn read(&self, tree: &Value) -> Value {
        let record: Record = self
            .entries
            .iter()
            .filter_map(|(name, lens)| lens.read(tree).map(|value| (name.clone(), value)))
            .collect();
        Value::record(record)
    }

    /// Write the fields of `record` into `tree` through their lenses. Fields
    /// that did not change are left alone, so an unchanged record returns
    /// `tree` itself.
    pub fn write(&self, tree: Value, record: &Record) -> Result<Value, UpdateError> {
        let mut tree = tree;
        for (name, lens) in &self.entries {
            let Some(value) = record.get(name) else {
                continue;
            };
            if same_option(lens.read(&tree).as_ref(), Some(value)) {
                continue;
            }
            let value = value.clone();
            tree = lens.update(&tree, |_| Ok(value))?;
        }
        Ok(tree)
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, lens)| (name, lens.dotted())))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Derivations
// ─────────────────────────────────────────────────────────────────────────────

/// Copy the passed-down keys of `parent` into the computed buckets of `raw`.
fn pass_down(parent: &RawState, keys: &[Key], raw: &mut RawState) {
    if keys.is_empty() {
        return;
    }
    let picked = pick_raw_state(parent, keys);
    if let Some(redux) = picked.redux_state.as_record() {
        for (key, value) in redux.iter() {
            raw.values.insert(key.clone(), value.clone());
        }
    }
    raw.values.extend(picked.values);
    raw.loadable_values.extend(picked.loadable_values);
}

struct FocusPath {
    lens: Lens,
    passed_down: Vec<Key>,
}

impl<A: Action> Derivation<A> for FocusPath {
    fn derive(&self, parent: &RawState, _cx: &DeriveCx<'_, A>) -> RawState {
        let mut raw = RawState::new(self.lens.read(&parent.redux_state).unwrap_or_default());
        pass_down(parent, &self.passed_down, &mut raw);
        raw
    }
}

struct FocusFields {
    keys: Vec<Key>,
}

impl<A: Action> Derivation<A> for FocusFields {
    fn derive(&self, parent: &RawState, _cx: &DeriveCx<'_, A>) -> RawState {
        pick_raw_state(parent, &self.keys)
    }
}

struct Recompose {
    fields: Fields,
    passed_down: Vec<Key>,
}

impl<A: Action> Derivation<A> for Recompose {
    fn derive(&self, parent: &RawState, _cx: &DeriveCx<'_, A>) -> RawState {
        let mut raw = RawState::new(self.fields.read(&parent.redux_state));
        pass_down(parent, &self.passed_down, &mut raw);
        raw
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write paths
// ─────────────────────────────────────────────────────────────────────────────

struct LensWrite {
    lens: Lens,
}

impl WritePath for LensWrite {
    fn lift(&self, updater: Updater) -> Updater {
        self.lens.apply(updater)
    }
}

struct FieldsWrite {
    keys: Arc<[Key]>,
}

impl WritePath for FieldsWrite {
    fn lift(&self, updater: Updater) -> Updater {
        let keys = self.keys.clone();
        Updater::new(move |parent| {
            let Some(record) = parent.as_record() else {
                return Err(UpdateError::not_a_record("<fields>", parent.kind()));
            };
            let local: Record = keys
                .iter()
                .filter_map(|key| record.get_key_value(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            let next = updater.apply(Value::record(local))?;
            let Some(next) = next.as_record() else {
                return Err(UpdateError::not_a_record("<fields>", next.kind()));
            };

            let mut written: Option<Record> = None;
            for (key, value) in next.iter() {
                if !keys.contains(key) || same_option(record.get(key), Some(value)) {
                    continue;
                }
                written
                    .get_or_insert_with(|| record.clone())
                    .insert(key.clone(), value.clone());
            }
            Ok(match written {
                Some(record) => Value::record(record),
                None => parent,
            })
        })
    }
}

struct RecomposeWrite {
    fields: Fields,
}

impl WritePath for RecomposeWrite {
    fn lift(&self, updater: Updater) -> Updater {
        let fields = self.fields.clone();
        Updater::new(move |parent| {
            let next = updater.apply(fields.read(&parent))?;
            let Some(next) = next.as_record() else {
                return Err(UpdateError::not_a_record("<recompose>", next.kind()));
            };
            fields.write(parent, next)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store operations
// ─────────────────────────────────────────────────────────────────────────────

fn joined(keys: &[Key]) -> String {
    keys.iter().map(|k| k.as_ref()).collect::<Vec<_>>().join(",")
}

impl<A: Action> Store<A> {
    /// View on the value at `keys`. The target must be a record or a list.
    pub fn focus_path<I, S>(&self, keys: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.focus_path_with(keys, std::iter::empty::<&str>())
    }

    /// View on the value at `keys`, with computed keys of this view passed
    /// down into the new one.
    pub fn focus_path_with<I, S, P, Q>(&self, keys: I, passed_down: P) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        P: IntoIterator<Item = Q>,
        Q: AsRef<str>,
    {
        let raw = self.require_record("focus_path")?;
        let lens = Lens::path(keys);
        let passed_down = optica_core::keys(passed_down);

        let target = match lens.read(&raw.redux_state) {
            Some(target) if target.is_object() => target,
            Some(target) => {
                return Err(StoreError::non_object_focus(format!(
                    "`{}` of `{}` is a {}",
                    lens.dotted(),
                    self.path(),
                    target.kind()
                )))
            }
            None => {
                return Err(StoreError::non_object_focus(format!(
                    "`{}` of `{}` does not exist",
                    lens.dotted(),
                    self.path()
                )))
            }
        };
        if !passed_down.is_empty() && !target.is_record() {
            return Err(StoreError::non_record_state(format!(
                "cannot pass keys down into the {} at `{}`",
                target.kind(),
                lens.dotted()
            )));
        }

        let path = if passed_down.is_empty() {
            format!("{}.focus({})", self.path(), lens.dotted())
        } else {
            format!(
                "{}.focus({}; {})",
                self.path(),
                lens.dotted(),
                joined(&passed_down)
            )
        };
        let chain = self.node().chain().through(Arc::new(LensWrite { lens: lens.clone() }));
        let node = Node::derived(
            self.node(),
            path,
            Box::new(FocusPath { lens, passed_down }),
            chain,
        );
        Ok(Store::from_node(node))
    }

    /// View on a subset of this view's top-level keys, each taken from the
    /// bucket it resolves to.
    pub fn focus_fields<I, S>(&self, keys: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require_record("focus_fields")?;
        let keys = optica_core::keys(keys);
        let path = format!("{}.fields({})", self.path(), joined(&keys));
        let chain = self.node().chain().through(Arc::new(FieldsWrite {
            keys: Arc::from(keys.clone()),
        }));
        let node = Node::derived(self.node(), path, Box::new(FocusFields { keys }), chain);
        Ok(Store::from_node(node))
    }

    /// View whose state is a new record built from named lenses into this
    /// view's state.
    pub fn recompose<P, Q>(&self, fields: Fields, passed_down: P) -> Result<Self, StoreError>
    where
        P: IntoIterator<Item = Q>,
        Q: AsRef<str>,
    {
        self.require_record("recompose")?;
        let passed_down = optica_core::keys(passed_down);
        let names: Vec<&str> = fields.names().collect();
        let path = format!("{}.recompose({})", self.path(), names.join(","));
        let chain = self.node().chain().through(Arc::new(RecomposeWrite {
            fields: fields.clone(),
        }));
        let node = Node::derived(
            self.node(),
            path,
            Box::new(Recompose {
                fields,
                passed_down,
            }),
            chain,
        );
        Ok(Store::from_node(node))
    }
}
