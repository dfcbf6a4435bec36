//! # Store
//!
//! [`Store`] is a handle on one view. The root view is created by
//! [`create_store`]; every composition and derivation returns a new view
//! sharing the root's scheduler, handler registry and action bus.
//!
//! Reads are synchronous snapshots (`current_*`). Changes are observed through
//! [`Store::subscribe`] or the stream methods. All writes go through
//! [`Store::dispatch`], whatever view it is called on.

use crate::action::{Action, Epics, Handlers, SideEffects};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::listener::Subscription;
use crate::node::Node;
use crate::shared::Shared;
use crate::stream::ViewStream;
use futures::StreamExt;
use optica_core::{
    from_raw_state, shallow_equal, to_data, DerivedState, LoadError, LoadStatus, RawState,
    Value,
};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Create a store from an initial record.
pub fn create_store<A: Action>(
    initial: impl Into<Value>,
    config: StoreConfig,
) -> Result<Store<A>, StoreError> {
    config.validate()?;
    let initial = initial.into();
    if !initial.is_record() {
        return Err(StoreError::invalid(format!(
            "initial state must be a record, found {}",
            initial.kind()
        )));
    }
    let shared = Shared::new(&config);
    let root = Node::root(RawState::new(initial), shared);
    Ok(Store { node: root })
}

/// A view of the store.
pub struct Store<A: Action> {
    node: Arc<Node<A>>,
}

impl<A: Action> Clone for Store<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A: Action> fmt::Debug for Store<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("version", &self.node.snapshot().version)
            .finish()
    }
}

impl<A: Action> Store<A> {
    /// Root store with the default configuration.
    pub fn new(initial: impl Into<Value>) -> Result<Self, StoreError> {
        create_store(initial, StoreConfig::default())
    }

    pub(crate) fn from_node(node: Arc<Node<A>>) -> Self {
        Self { node }
    }

    pub(crate) fn node(&self) -> &Arc<Node<A>> {
        &self.node
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<A>> {
        self.node.shared()
    }

    /// Diagnostic path of this view, e.g. `root.focus(todo.list)`.
    pub fn path(&self) -> &str {
        self.node.path()
    }

    /// Read-only handle on this view.
    pub fn reader(&self) -> StateReader<A> {
        StateReader {
            node: Arc::downgrade(&self.node),
        }
    }

    // ─── Snapshots ──────────────────────────────────────────────────────────

    /// The latest raw state.
    pub fn current_raw_state(&self) -> Arc<RawState> {
        self.node.raw()
    }

    /// The latest state envelope.
    pub fn current_state(&self) -> DerivedState {
        from_raw_state(&self.node.raw())
    }

    /// The latest flattened data.
    pub fn current_data(&self) -> Value {
        to_data(&self.node.raw())
    }

    /// The latest aggregate status.
    pub fn current_status(&self) -> LoadStatus {
        self.node.raw().status().status
    }

    /// The latest slot errors.
    pub fn current_errors(&self) -> Vec<LoadError> {
        self.node.raw().status().errors
    }

    // ─── Observation ────────────────────────────────────────────────────────

    /// Call `callback` with the current state, then after every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DerivedState) + Send + Sync + 'static,
    {
        self.node
            .listen(move |raw: &Arc<RawState>| callback(&from_raw_state(raw)))
    }

    /// Call `callback` with the current raw state, then after every change.
    pub fn subscribe_raw<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RawState) + Send + Sync + 'static,
    {
        self.node
            .listen(move |raw: &Arc<RawState>| callback(raw.as_ref()))
    }

    /// Stream of raw states, one per change.
    pub fn raw_state_stream(&self) -> ViewStream<Arc<RawState>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.node.listen(move |raw: &Arc<RawState>| {
            let _ = tx.send(raw.clone());
        });
        ViewStream::new(rx, subscription)
    }

    /// Stream of state envelopes, one per change.
    pub fn state_stream(&self) -> ViewStream<DerivedState> {
        self.project(from_raw_state, |_, _| false)
    }

    /// Stream of flattened data. Changes that leave the data shallow-equal
    /// (a status flip, for instance) are skipped.
    pub fn data_stream(&self) -> ViewStream<Value> {
        self.project(to_data, shallow_equal)
    }

    // ─── Actions ────────────────────────────────────────────────────────────

    /// Dispatch `action` to the store. Runs immediately unless the store is
    /// busy (for instance when called from a listener), in which case it runs
    /// right after the current job.
    pub fn dispatch(&self, action: A) {
        let shared = self.shared().clone();
        let origin = self.node.path().to_string();
        self.shared().scheduler.submit(Box::new(move || {
            shared.apply_action(&origin, action);
        }));
    }

    /// Stream of every action dispatched from now on, after its update.
    pub fn action_stream(&self) -> ViewStream<A> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = self.shared();
        let id = shared.actions.add(move |action: &A| {
            let _ = tx.send(action.clone());
        });
        ViewStream::new(rx, Subscription::new(shared.clone(), id))
    }

    /// Register handlers against this view's local state.
    ///
    /// Fails if any kind already has an updater in this store; nothing is
    /// registered then.
    pub fn register_handlers(&self, handlers: Handlers<A>) -> Result<Self, StoreError> {
        let shared = self.shared();
        if shared.has_dispatched() && !handlers.is_empty() {
            shared.logger.warn(
                self.path(),
                &format!("handlers {:?} registered after the first dispatch", handlers),
            );
        }
        shared
            .registry
            .write()
            .register(handlers, self.node.chain(), self.path())?;
        Ok(self.clone())
    }

    /// Action kinds with a registered handler.
    pub fn handled_kinds(&self) -> Vec<A::Kind> {
        self.shared().registry.read().kinds()
    }

    /// Run epics. Each epic receives the actions of its kind; the actions it
    /// emits are dispatched from this view.
    ///
    /// The epics stop receiving actions once this view is dropped.
    pub fn epics(&self, epics: Epics<A>) -> Result<Self, StoreError> {
        if epics.is_empty() {
            return Ok(self.clone());
        }
        let shared = self.shared();
        let runtime = shared.runtime("epics")?;

        for (kind, epic) in epics.into_entries() {
            let (tx, rx) = mpsc::unbounded_channel::<A>();
            let id = shared.actions.add(move |action: &A| {
                if action.kind() == kind {
                    let _ = tx.send(action.clone());
                }
            });
            self.node.hold_action_listener(id);

            let mut output = epic(UnboundedReceiverStream::new(rx).boxed(), self.reader());
            let view = Arc::downgrade(&self.node);
            shared.tasks.spawn_cancellable(&runtime, async move {
                while let Some(item) = output.next().await {
                    let Some(node) = view.upgrade() else {
                        break;
                    };
                    let logger = node.shared().logger;
                    match item {
                        Ok(action) => {
                            logger.epic(node.path(), &action);
                            Store::from_node(node).dispatch(action);
                        }
                        Err(err) => logger.error(node.path(), "epic", &err),
                    }
                }
            });
        }
        Ok(self.clone())
    }

    /// Run side effects after actions of their kind, for as long as this
    /// view lives.
    pub fn side_effects(&self, effects: SideEffects<A>) -> Self {
        let shared = self.shared();
        for (kind, effect) in effects.into_entries() {
            let reader = self.reader();
            let id = shared.actions.add(move |action: &A| {
                if action.kind() == kind {
                    effect(action, &reader);
                }
            });
            self.node.hold_action_listener(id);
        }
        self.clone()
    }

    // ─── Activation ─────────────────────────────────────────────────────────

    /// Run `callback` on the first [`activate`](Self::activate), or now if
    /// the store is already active.
    pub fn on_activate<F>(&self, callback: F) -> Self
    where
        F: FnOnce(&Store<A>) + Send + 'static,
    {
        let store = self.clone();
        self.shared()
            .on_activate(Box::new(move || callback(&store)));
        self.clone()
    }

    /// Activate the store, running pending activation callbacks once.
    pub fn activate(&self) {
        self.shared().activate();
    }

    /// True once [`activate`](Self::activate) was called on any view.
    pub fn is_active(&self) -> bool {
        self.shared().is_active()
    }

    // ─── Wiring helpers ─────────────────────────────────────────────────────

    /// Fail unless this view's state is a record.
    pub(crate) fn require_record(&self, operation: &str) -> Result<Arc<RawState>, StoreError> {
        let raw = self.node.raw();
        if raw.redux_state.is_record() {
            Ok(raw)
        } else {
            Err(StoreError::non_record_state(format!(
                "`{}` on `{}` whose state is a {}",
                operation,
                self.path(),
                raw.redux_state.kind()
            )))
        }
    }

    /// Fail if any of `keys` already exists in this view.
    pub(crate) fn require_fresh_keys<'k, I>(&self, keys: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let raw = self.node.raw();
        for key in keys {
            if let Some(bucket) = raw.locate(key) {
                return Err(StoreError::key_collision(format!(
                    "`{}` already exists in {:?} of `{}`",
                    key,
                    bucket,
                    self.path()
                )));
            }
        }
        Ok(())
    }
}

/// Read-only access to a view, handed to epics and side effects. A reader
/// that outlives its view reads an empty state.
pub struct StateReader<A: Action> {
    node: Weak<Node<A>>,
}

impl<A: Action> Clone for StateReader<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A: Action> fmt::Debug for StateReader<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReader")
            .field("live", &(self.node.strong_count() > 0))
            .finish()
    }
}

impl<A: Action> StateReader<A> {
    /// The latest raw state.
    pub fn current_raw_state(&self) -> Arc<RawState> {
        self.node
            .upgrade()
            .map(|node| node.raw())
            .unwrap_or_default()
    }

    /// The latest state envelope.
    pub fn current_state(&self) -> DerivedState {
        from_raw_state(&self.current_raw_state())
    }

    /// The latest flattened data.
    pub fn current_data(&self) -> Value {
        to_data(&self.current_raw_state())
    }

    /// The latest aggregate status.
    pub fn current_status(&self) -> LoadStatus {
        self.current_raw_state().status().status
    }
}
