//! Asynchronously loaded values.
//!
//! A loading view owns one slot per loader. Every slot starts `Loading`.
//! Loaders are started with the data of a trigger (the picked slice for
//! [`Store::load_from_fields`], an input item for [`Store::load_from_stream`])
//! and each one settles its own slot: `Loaded` for every item, `Error` once,
//! after which its stream is no longer polled.
//!
//! Restarting the loaders aborts the previous tasks. Settlements are tagged
//! with the generation that started them, so a result that was already in
//! the scheduler queue when its loader was superseded is dropped.

use crate::action::Action;
use crate::error::StoreError;
use crate::logger::Logger;
use crate::node::{DeriveCx, Derivation, Node};
use crate::store::Store;
use crate::tasks::AbortOnDrop;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use indexmap::IndexMap;
use optica_core::{
    pick_raw_state, to_data, Key, LoadError, LoadSlot, LoadStatus, LoadableValues, RawState,
    ShallowEq, Value,
};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

/// Results of one loader invocation.
pub type LoadStream = BoxStream<'static, Result<Value, LoadError>>;

/// A loader: trigger data in, stream of results out.
pub type LoadFn = Arc<dyn Fn(Value) -> LoadStream + Send + Sync>;

/// Named loaders.
#[derive(Clone, Default)]
pub struct Loaders {
    entries: IndexMap<Key, LoadFn>,
}

impl Loaders {
    /// No loaders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `name` with a stream-returning loader.
    pub fn with<F, S>(mut self, name: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(Value) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, LoadError>> + Send + 'static,
    {
        self.entries
            .insert(optica_core::key(name), Arc::new(move |data| f(data).boxed()));
        self
    }

    /// Load `name` with a loader that settles once.
    pub fn future<F, Fut>(self, name: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LoadError>> + Send + 'static,
    {
        self.with(name, move |data| f(data).into_stream())
    }

    /// Loaded key names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_ref())
    }

    /// Number of loaders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no loaders.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Loaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ─── Loader state ───────────────────────────────────────────────────────────

struct LoadState {
    /// Slice that started the running generation.
    trigger: Option<RawState>,
    generation: u64,
    slots: LoadableValues,
    tasks: Vec<AbortOnDrop>,
}

pub(crate) struct LoadCore {
    loaders: Loaders,
    runtime: Handle,
    state: Mutex<LoadState>,
    input: Mutex<Option<AbortOnDrop>>,
}

impl LoadCore {
    fn new(loaders: Loaders, runtime: Handle) -> Arc<Self> {
        let slots = loaders
            .entries
            .keys()
            .map(|name| (name.clone(), LoadSlot::loading()))
            .collect();
        Arc::new(Self {
            loaders,
            runtime,
            state: Mutex::new(LoadState {
                trigger: None,
                generation: 0,
                slots,
                tasks: Vec::new(),
            }),
            input: Mutex::new(None),
        })
    }

    fn names(&self) -> Vec<&str> {
        self.loaders.names().collect()
    }

    /// Abort the running loaders and invalidate their pending settlements.
    fn cancel(state: &mut LoadState) {
        state.generation += 1;
        state.tasks.clear();
    }

    /// Start every loader on `data`. Slots that are not in error go back to
    /// `Loading`; failed slots keep their error until their loader settles.
    fn start<A: Action>(
        self: &Arc<Self>,
        state: &mut LoadState,
        data: Value,
        node: &Weak<Node<A>>,
        path: &str,
        logger: Logger,
    ) {
        Self::cancel(state);
        for slot in state.slots.values_mut() {
            if slot.status != LoadStatus::Error {
                *slot = LoadSlot::loading();
            }
        }
        logger.loading(path, &self.names());

        let generation = state.generation;
        for (name, loader) in &self.loaders.entries {
            let stream = loader(data.clone());
            state.tasks.push(AbortOnDrop::spawn(
                &self.runtime,
                drive_loader(
                    stream,
                    Arc::downgrade(self),
                    node.clone(),
                    name.clone(),
                    generation,
                ),
            ));
        }
    }

    /// Record a loader result. False if its generation was superseded.
    fn settle(&self, key: &Key, generation: u64, item: Result<Value, LoadError>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        let slot = match item {
            Ok(value) => LoadSlot::loaded(value),
            Err(error) => LoadSlot::failed(error),
        };
        state.slots.insert(key.clone(), slot);
        true
    }

    fn merge_into(&self, state: &LoadState, parent: &RawState) -> RawState {
        let mut raw = parent.clone();
        raw.loadable_values
            .extend(state.slots.iter().map(|(k, slot)| (k.clone(), slot.clone())));
        raw
    }
}

async fn drive_loader<A: Action>(
    mut stream: LoadStream,
    core: Weak<LoadCore>,
    node: Weak<Node<A>>,
    key: Key,
    generation: u64,
) {
    while let Some(item) = stream.next().await {
        let failed = item.is_err();
        let (Some(core), Some(node)) = (core.upgrade(), node.upgrade()) else {
            return;
        };
        let job_node = node.clone();
        let key = key.clone();
        node.shared().scheduler.submit(Box::new(move || {
            if core.settle(&key, generation, item) {
                job_node
                    .shared()
                    .logger
                    .loaded(job_node.path(), &key, !failed);
                job_node.refresh();
            }
        }));
        if failed {
            return;
        }
    }
}

async fn drive_input<A: Action>(
    mut input: BoxStream<'static, Value>,
    core: Weak<LoadCore>,
    node: Weak<Node<A>>,
) {
    while let Some(item) = input.next().await {
        let (Some(core), Some(node)) = (core.upgrade(), node.upgrade()) else {
            return;
        };
        let job_node = node.clone();
        node.shared().scheduler.submit(Box::new(move || {
            {
                let mut state = core.state.lock();
                core.start(
                    &mut state,
                    item,
                    &Arc::downgrade(&job_node),
                    job_node.path(),
                    job_node.shared().logger,
                );
            }
            job_node.refresh();
        }));
    }
}

// ─── Derivations ────────────────────────────────────────────────────────────

struct LoadFromFields {
    keys: Vec<Key>,
    core: Arc<LoadCore>,
}

impl<A: Action> Derivation<A> for LoadFromFields {
    fn derive(&self, parent: &RawState, cx: &DeriveCx<'_, A>) -> RawState {
        let slice = pick_raw_state(parent, &self.keys);
        let mut state = self.core.state.lock();
        let summary = slice.status();
        match summary.status {
            LoadStatus::Loaded => {
                let unchanged = state
                    .trigger
                    .as_ref()
                    .is_some_and(|trigger| trigger.shallow_eq(&slice));
                if !unchanged {
                    let data = to_data(&slice);
                    state.trigger = Some(slice);
                    self.core
                        .start(&mut state, data, &cx.node, cx.path, cx.shared.logger);
                }
            }
            LoadStatus::Loading => {
                if state.trigger.take().is_some() {
                    LoadCore::cancel(&mut state);
                }
                for slot in state.slots.values_mut() {
                    *slot = LoadSlot::loading();
                }
            }
            LoadStatus::Error => {
                state.trigger = None;
                LoadCore::cancel(&mut state);
                let error = summary
                    .errors
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| LoadError::new("source failed"));
                for slot in state.slots.values_mut() {
                    *slot = LoadSlot::failed(error.clone());
                }
            }
        }
        self.core.merge_into(&state, parent)
    }
}

struct LoadFromStream {
    core: Arc<LoadCore>,
}

impl<A: Action> Derivation<A> for LoadFromStream {
    fn derive(&self, parent: &RawState, _cx: &DeriveCx<'_, A>) -> RawState {
        let state = self.core.state.lock();
        self.core.merge_into(&state, parent)
    }
}

impl<A: Action> Store<A> {
    /// View with one loadable slot per loader, loaded from the data of the
    /// picked `keys`. Loaders start once the slice is loaded and restart
    /// only when it changes; restarting aborts the previous run.
    pub fn load_from_fields<I, S>(&self, keys: I, loaders: Loaders) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require_record("load_from_fields")?;
        self.require_fresh_keys(loaders.names())?;
        let runtime = self.shared().runtime("load_from_fields")?;

        let path = format!(
            "{}.load({})",
            self.path(),
            loaders.names().collect::<Vec<_>>().join(",")
        );
        let derivation = LoadFromFields {
            keys: optica_core::keys(keys),
            core: LoadCore::new(loaders, runtime),
        };
        let node = Node::derived(
            self.node(),
            path,
            Box::new(derivation),
            self.node().chain().clone(),
        );
        Ok(Store::from_node(node))
    }

    /// View with one loadable slot per loader. Every item of `input`
    /// restarts all loaders with the item as their data.
    pub fn load_from_stream<St>(&self, input: St, loaders: Loaders) -> Result<Self, StoreError>
    where
        St: Stream<Item = Value> + Send + 'static,
    {
        self.require_record("load_from_stream")?;
        self.require_fresh_keys(loaders.names())?;
        let runtime = self.shared().runtime("load_from_stream")?;

        let path = format!(
            "{}.loadFromStream({})",
            self.path(),
            loaders.names().collect::<Vec<_>>().join(",")
        );
        let core = LoadCore::new(loaders, runtime.clone());
        let node = Node::derived(
            self.node(),
            path,
            Box::new(LoadFromStream { core: core.clone() }),
            self.node().chain().clone(),
        );

        let task = AbortOnDrop::spawn(
            &runtime,
            drive_input(input.boxed(), Arc::downgrade(&core), Arc::downgrade(&node)),
        );
        *core.input.lock() = Some(task);
        Ok(Store::from_node(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use optica_core::key;

    fn loaders() -> Loaders {
        Loaders::new()
            .future("user", |_| async { Ok::<_, LoadError>(Value::from("ada")) })
            .with("feed", |_| stream::iter(vec![Ok(Value::from(1)), Ok(Value::from(2))]))
    }

    #[test]
    fn test_loaders_keep_declaration_order() {
        let loaders = loaders();
        assert_eq!(loaders.names().collect::<Vec<_>>(), vec!["user", "feed"]);
        assert_eq!(loaders.len(), 2);
        assert!(Loaders::new().is_empty());
    }

    #[tokio::test]
    async fn test_slots_start_loading() {
        let core = LoadCore::new(loaders(), Handle::current());
        let state = core.state.lock();
        assert_eq!(state.slots.len(), 2);
        assert!(state
            .slots
            .values()
            .all(|slot| slot.status == LoadStatus::Loading));
    }

    #[tokio::test]
    async fn test_stale_settlement_is_dropped() {
        let core = LoadCore::new(loaders(), Handle::current());
        LoadCore::cancel(&mut core.state.lock());

        assert!(!core.settle(&key("user"), 0, Ok(Value::from("stale"))));
        assert!(core.settle(&key("user"), 1, Ok(Value::from("fresh"))));
        assert_eq!(
            core.state.lock().slots["user"],
            LoadSlot::loaded(Value::from("fresh"))
        );
    }

    #[tokio::test]
    async fn test_failure_settles_only_its_slot() {
        let core = LoadCore::new(loaders(), Handle::current());
        assert!(core.settle(&key("feed"), 0, Err(LoadError::new("timeout"))));

        let state = core.state.lock();
        assert_eq!(state.slots["feed"].status, LoadStatus::Error);
        assert_eq!(state.slots["user"].status, LoadStatus::Loading);
    }
}
