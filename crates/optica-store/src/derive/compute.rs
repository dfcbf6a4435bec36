//! Synchronously computed values.
//!
//! A computed view picks a slice of its parent, runs every computer on the
//! slice's data and merges the results into its own state. Results are
//! memoized on the picked slice: while it stays shallow-equal, parent changes
//! reuse the previous results without running a computer.
//!
//! A slice without loadable keys yields plain `values`. A slice with loadable
//! keys yields loadable slots instead: `Loading` until the slice is loaded,
//! then `Loaded` with the results, or `Error` with the slice's first error.

use crate::action::Action;
use crate::error::StoreError;
use crate::node::{DeriveCx, Derivation, Node};
use crate::store::Store;
use crate::tasks::AbortOnDrop;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use indexmap::IndexMap;
use optica_core::{
    pick_raw_state, to_data, Key, LoadError, LoadSlot, LoadStatus, LoadableValues, RawState, Record,
    ShallowEq, Value,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// A pure function from a view's data to a computed value.
pub type ComputeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Named computers.
#[derive(Clone, Default)]
pub struct Computers {
    entries: IndexMap<Key, ComputeFn>,
}

impl Computers {
    /// No computers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `name` with `f`.
    pub fn with<F>(mut self, name: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.entries.insert(optica_core::key(name), Arc::new(f));
        self
    }

    /// Computed key names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_ref())
    }

    /// Number of computers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no computers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every computer on `data`.
    pub fn run(&self, data: &Value) -> Record {
        self.entries
            .iter()
            .map(|(name, f)| (name.clone(), f(data)))
            .collect()
    }

    fn slots(&self, slot: impl Fn() -> LoadSlot) -> LoadableValues {
        self.entries
            .keys()
            .map(|name| (name.clone(), slot()))
            .collect()
    }
}

impl fmt::Debug for Computers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Output of one evaluation.
#[derive(Debug)]
enum Computed {
    Values(Record),
    Loadable(LoadableValues),
}

impl Computed {
    fn merge_into(&self, raw: &mut RawState) {
        match self {
            Self::Values(values) => {
                for (key, value) in values {
                    raw.values.insert(key.clone(), value.clone());
                }
            }
            Self::Loadable(slots) => {
                for (key, slot) in slots {
                    raw.loadable_values.insert(key.clone(), slot.clone());
                }
            }
        }
    }
}

/// Which part of the parent computers see.
#[derive(Debug, Clone)]
enum Source {
    /// The whole state
    All,
    /// A picked slice
    Fields(Vec<Key>),
    /// The value of one field
    Field(Key),
}

struct ComputeFromFields {
    source: Source,
    computers: Computers,
    memo: Mutex<Option<(RawState, Arc<Computed>)>>,
}

impl ComputeFromFields {
    fn slice(&self, parent: &RawState) -> RawState {
        match &self.source {
            Source::All => parent.clone(),
            Source::Fields(keys) => pick_raw_state(parent, keys),
            Source::Field(key) => pick_raw_state(parent, std::slice::from_ref(key)),
        }
    }

    fn input(&self, slice: &RawState) -> Value {
        let data = to_data(slice);
        match &self.source {
            Source::Field(key) => data.get(key).cloned().unwrap_or_default(),
            Source::All | Source::Fields(_) => data,
        }
    }

    fn evaluate(&self, slice: &RawState) -> Computed {
        if slice.loadable_values.is_empty() {
            return Computed::Values(self.computers.run(&self.input(slice)));
        }
        let summary = slice.status();
        match summary.status {
            LoadStatus::Loaded => Computed::Loadable(
                self.computers
                    .run(&self.input(slice))
                    .into_iter()
                    .map(|(name, value)| (name, LoadSlot::loaded(value)))
                    .collect(),
            ),
            LoadStatus::Loading => Computed::Loadable(self.computers.slots(LoadSlot::loading)),
            LoadStatus::Error => {
                let error = summary
                    .errors
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| LoadError::new("source failed"));
                Computed::Loadable(self.computers.slots(|| LoadSlot::failed(error.clone())))
            }
        }
    }
}

impl<A: Action> Derivation<A> for ComputeFromFields {
    fn derive(&self, parent: &RawState, cx: &DeriveCx<'_, A>) -> RawState {
        let slice = self.slice(parent);
        let computed = {
            let mut memo = self.memo.lock();
            let cached = memo
                .as_ref()
                .filter(|(previous, _)| previous.shallow_eq(&slice))
                .map(|(_, computed)| computed.clone());
            match cached {
                Some(computed) => computed,
                None => {
                    let computed = Arc::new(self.evaluate(&slice));
                    let names: Vec<&str> = self.computers.names().collect();
                    cx.shared.logger.compute(cx.path, &names);
                    *memo = Some((slice, computed.clone()));
                    computed
                }
            }
        };
        let mut raw = parent.clone();
        computed.merge_into(&mut raw);
        raw
    }
}

/// Slots fed by an input stream task.
#[derive(Default)]
pub(crate) struct StreamSlots {
    slots: Mutex<Option<LoadableValues>>,
    task: Mutex<Option<AbortOnDrop>>,
}

impl StreamSlots {
    fn replace(&self, slots: LoadableValues) {
        *self.slots.lock() = Some(slots);
    }

    fn set_task(&self, task: AbortOnDrop) {
        *self.task.lock() = Some(task);
    }
}

struct ComputeFromStream {
    computers: Computers,
    state: Arc<StreamSlots>,
}

impl<A: Action> Derivation<A> for ComputeFromStream {
    fn derive(&self, parent: &RawState, _cx: &DeriveCx<'_, A>) -> RawState {
        let mut raw = parent.clone();
        let slots = self.state.slots.lock();
        match slots.as_ref() {
            Some(slots) => raw.loadable_values.extend(slots.clone()),
            None => raw
                .loadable_values
                .extend(self.computers.slots(LoadSlot::loading)),
        }
        raw
    }
}

async fn drive_compute<A: Action>(
    mut input: BoxStream<'static, Value>,
    computers: Computers,
    state: Weak<StreamSlots>,
    node: Weak<Node<A>>,
) {
    while let Some(item) = input.next().await {
        let (Some(state), Some(node)) = (state.upgrade(), node.upgrade()) else {
            return;
        };
        let computers = computers.clone();
        let job_node = node.clone();
        node.shared().scheduler.submit(Box::new(move || {
            let slots = computers
                .run(&item)
                .into_iter()
                .map(|(name, value)| (name, LoadSlot::loaded(value)))
                .collect();
            state.replace(slots);
            let names: Vec<&str> = computers.names().collect();
            job_node.shared().logger.compute(job_node.path(), &names);
            job_node.refresh();
        }));
    }
}

impl<A: Action> Store<A> {
    fn wire_compute(
        &self,
        label: String,
        source: Source,
        computers: Computers,
    ) -> Result<Self, StoreError> {
        self.require_record(&label)?;
        self.require_fresh_keys(computers.names())?;
        let path = format!("{}.{}", self.path(), label);
        let derivation = ComputeFromFields {
            source,
            computers,
            memo: Mutex::new(None),
        };
        let node = Node::derived(
            self.node(),
            path,
            Box::new(derivation),
            self.node().chain().clone(),
        );
        Ok(Store::from_node(node))
    }

    /// View with values computed from the whole state.
    pub fn compute(&self, computers: Computers) -> Result<Self, StoreError> {
        let label = format!("compute({})", computers.names().collect::<Vec<_>>().join(","));
        self.wire_compute(label, Source::All, computers)
    }

    /// View with values computed from one field; computers receive the
    /// field's value (`Null` when absent).
    pub fn compute_from_field(
        &self,
        key: impl AsRef<str>,
        computers: Computers,
    ) -> Result<Self, StoreError> {
        let key = optica_core::key(key);
        let label = format!("computeFromField({})", key);
        self.wire_compute(label, Source::Field(key), computers)
    }

    /// View with values computed from the data of the picked `keys`.
    /// Computers only run when the picked slice changes.
    pub fn compute_from_fields<I, S>(
        &self,
        keys: I,
        computers: Computers,
    ) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = optica_core::keys(keys);
        let label = format!(
            "computeFromFields({})",
            keys.iter().map(|k| k.as_ref()).collect::<Vec<_>>().join(",")
        );
        self.wire_compute(label, Source::Fields(keys), computers)
    }

    /// View with loadable values computed from each item of `input`. The
    /// slots are `Loading` until the first item.
    pub fn compute_from_stream<St>(
        &self,
        input: St,
        computers: Computers,
    ) -> Result<Self, StoreError>
    where
        St: Stream<Item = Value> + Send + 'static,
    {
        self.require_record("compute_from_stream")?;
        self.require_fresh_keys(computers.names())?;
        let runtime = self.shared().runtime("compute_from_stream")?;

        let state = Arc::new(StreamSlots::default());
        let path = format!(
            "{}.computeFromStream({})",
            self.path(),
            computers.names().collect::<Vec<_>>().join(",")
        );
        let node = Node::derived(
            self.node(),
            path,
            Box::new(ComputeFromStream {
                computers: computers.clone(),
                state: state.clone(),
            }),
            self.node().chain().clone(),
        );

        let task = AbortOnDrop::spawn(
            &runtime,
            drive_compute(
                input.boxed(),
                computers,
                Arc::downgrade(&state),
                Arc::downgrade(&node),
            ),
        );
        state.set_task(task);
        Ok(Store::from_node(node))
    }
}
