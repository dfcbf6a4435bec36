//! # View Graph
//!
//! Every view is a [`Node`]: a cached snapshot of its raw state, a
//! [`Derivation`] computing that snapshot from its parent's, and a
//! [`WriteChain`] lifting updaters from the view's local state back to the
//! root tree.
//!
//! Nodes own their parent and hold their children weakly, so the graph is a
//! tree rooted at the store and a view is dropped with its last handle.
//!
//! Propagation runs inside scheduler jobs only:
//!
//! 1. re-derive the subtree depth-first, committing each node whose raw state
//!    changed under shallow equality (unchanged nodes stop the descent)
//! 2. notify the listeners of every committed node, parents first
//!
//! Listeners therefore never observe a view that is older than its parent.

use crate::action::Action;
use crate::listener::{ListenerHost, ListenerId, Listeners, Subscription};
use crate::shared::Shared;
use optica_core::{RawState, ShallowEq, Updater};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// A committed raw state and its per-node version.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) version: u64,
    pub(crate) raw: Arc<RawState>,
}

impl Snapshot {
    fn initial() -> Self {
        Self {
            version: 0,
            raw: Arc::new(RawState::default()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Read and write paths
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to a derivation.
pub(crate) struct DeriveCx<'a, A: Action> {
    /// The node being derived; tasks spawned by the derivation hold it weakly.
    pub(crate) node: Weak<Node<A>>,
    pub(crate) shared: &'a Arc<Shared<A>>,
    pub(crate) path: &'a str,
}

/// Computes a view's raw state from its parent's.
pub(crate) trait Derivation<A: Action>: Send + Sync {
    fn derive(&self, parent: &RawState, cx: &DeriveCx<'_, A>) -> RawState;
}

/// Turns an updater of a view's `redux_state` into an updater of its
/// parent's `redux_state`.
pub(crate) trait WritePath: Send + Sync {
    fn lift(&self, updater: Updater) -> Updater;
}

/// Write paths from a view up to the root, leaf first.
#[derive(Clone)]
pub(crate) struct WriteChain {
    links: Arc<[Arc<dyn WritePath>]>,
}

impl Default for WriteChain {
    fn default() -> Self {
        Self {
            links: Arc::from(Vec::<Arc<dyn WritePath>>::new()),
        }
    }
}

impl WriteChain {
    /// The chain of a child whose local state is reached through `link`.
    pub(crate) fn through(&self, link: Arc<dyn WritePath>) -> Self {
        Self {
            links: std::iter::once(link)
                .chain(self.links.iter().cloned())
                .collect(),
        }
    }

    /// Lift a local updater to a root updater.
    pub(crate) fn lift(&self, updater: Updater) -> Updater {
        self.links
            .iter()
            .fold(updater, |updater, link| link.lift(updater))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

enum Source<A: Action> {
    Root,
    Derived {
        parent: Arc<Node<A>>,
        derivation: Box<dyn Derivation<A>>,
    },
}

/// A view in the graph.
pub(crate) struct Node<A: Action> {
    path: Arc<str>,
    source: Source<A>,
    chain: WriteChain,
    current: RwLock<Snapshot>,
    children: Mutex<Vec<Weak<Node<A>>>>,
    listeners: Listeners<Arc<RawState>>,
    /// Action listeners registered through this view; dropped with it.
    action_listeners: Mutex<Vec<Subscription>>,
    shared: Arc<Shared<A>>,
}

type Changed<A> = Vec<(Arc<Node<A>>, Snapshot)>;

impl<A: Action> Node<A> {
    /// Create the root node holding the authoritative tree.
    pub(crate) fn root(initial: RawState, shared: Arc<Shared<A>>) -> Arc<Self> {
        let node = Arc::new(Self {
            path: Arc::from("root"),
            source: Source::Root,
            chain: WriteChain::default(),
            current: RwLock::new(Snapshot {
                version: 1,
                raw: Arc::new(initial),
            }),
            children: Mutex::new(Vec::new()),
            listeners: Listeners::new(),
            action_listeners: Mutex::new(Vec::new()),
            shared,
        });
        node.shared.set_root(&node);
        node
    }

    /// Create a child of `parent` and attach it.
    ///
    /// The initial derivation happens under the parent's child list lock, so
    /// a concurrent propagation either sees the new child or committed before
    /// the child read the parent.
    pub(crate) fn derived(
        parent: &Arc<Self>,
        path: String,
        derivation: Box<dyn Derivation<A>>,
        chain: WriteChain,
    ) -> Arc<Self> {
        let node = Arc::new(Self {
            path: Arc::from(path),
            source: Source::Derived {
                parent: parent.clone(),
                derivation,
            },
            chain,
            current: RwLock::new(Snapshot::initial()),
            children: Mutex::new(Vec::new()),
            listeners: Listeners::new(),
            action_listeners: Mutex::new(Vec::new()),
            shared: parent.shared.clone(),
        });

        {
            let mut children = parent.children.lock();
            let parent_raw = parent.snapshot().raw;
            // Held across the derivation: tasks it spawns may settle before
            // attachment finishes, and their commit must come after this one.
            let mut current = node.current.write();
            if let Some(raw) = node.derive_from(&parent_raw) {
                *current = Snapshot {
                    version: current.version + 1,
                    raw: Arc::new(raw),
                };
            }
            drop(current);
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&node));
        }

        node
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<A>> {
        &self.shared
    }

    /// Keep an action listener registered for as long as this view lives.
    pub(crate) fn hold_action_listener(&self, id: ListenerId) {
        let host: Arc<dyn ListenerHost> = self.shared.clone();
        self.action_listeners.lock().push(Subscription::new(host, id));
    }

    pub(crate) fn chain(&self) -> &WriteChain {
        &self.chain
    }

    pub(crate) fn parent(&self) -> Option<&Arc<Node<A>>> {
        match &self.source {
            Source::Root => None,
            Source::Derived { parent, .. } => Some(parent),
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    pub(crate) fn raw(&self) -> Arc<RawState> {
        self.current.read().raw.clone()
    }

    fn derive_from(self: &Arc<Self>, parent: &RawState) -> Option<RawState> {
        match &self.source {
            Source::Root => None,
            Source::Derived { derivation, .. } => {
                let cx = DeriveCx {
                    node: Arc::downgrade(self),
                    shared: &self.shared,
                    path: &self.path,
                };
                Some(derivation.derive(parent, &cx))
            }
        }
    }

    fn commit(&self, raw: RawState) -> Option<Snapshot> {
        let mut current = self.current.write();
        if current.raw.shallow_eq(&raw) {
            return None;
        }
        *current = Snapshot {
            version: current.version + 1,
            raw: Arc::new(raw),
        };
        Some(current.clone())
    }

    fn live_children(&self) -> Vec<Arc<Node<A>>> {
        let mut children = self.children.lock();
        children.retain(|child| child.strong_count() > 0);
        children.iter().filter_map(Weak::upgrade).collect()
    }

    fn update_subtree(self: &Arc<Self>, changed: &mut Changed<A>) {
        let Some(parent) = self.parent() else {
            return;
        };
        let parent_raw = parent.raw();
        let Some(raw) = self.derive_from(&parent_raw) else {
            return;
        };
        if let Some(snapshot) = self.commit(raw) {
            changed.push((self.clone(), snapshot));
            self.update_children(changed);
        }
    }

    fn update_children(self: &Arc<Self>, changed: &mut Changed<A>) {
        for child in self.live_children() {
            child.update_subtree(changed);
        }
    }

    fn publish(changed: Changed<A>) {
        for (node, snapshot) in changed {
            node.listeners.notify(snapshot.version, &snapshot.raw);
        }
    }

    /// Replace the root tree. Must run inside a scheduler job.
    pub(crate) fn replace_root(self: &Arc<Self>, raw: RawState) -> bool {
        debug_assert!(self.parent().is_none());
        let Some(snapshot) = self.commit(raw) else {
            return false;
        };
        let mut changed = vec![(self.clone(), snapshot)];
        self.update_children(&mut changed);
        Self::publish(changed);
        true
    }

    /// Re-derive this node after its derivation's own inputs changed (a
    /// loader settled, an input stream emitted). Must run inside a scheduler
    /// job.
    pub(crate) fn refresh(self: &Arc<Self>) {
        let mut changed = Vec::new();
        self.update_subtree(&mut changed);
        Self::publish(changed);
    }

    /// Register a raw-state listener. The current snapshot is delivered
    /// through the scheduler, after any job already queued.
    pub(crate) fn listen<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Arc<RawState>) + Send + Sync + 'static,
    {
        let id = self.listeners.add(callback);
        let node = self.clone();
        self.shared.scheduler.submit(Box::new(move || {
            let snapshot = node.snapshot();
            node.listeners.notify_one(id, snapshot.version, &snapshot.raw);
        }));
        Subscription::new(self.clone(), id)
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.live_children().len()
    }
}

impl<A: Action> ListenerHost for Node<A> {
    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
