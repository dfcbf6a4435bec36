//! # Actions and Handlers
//!
//! Applications declare a closed set of action kinds and implement [`Action`]
//! for their action type:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone)]
//! enum TodoAction { ClearTodoList, SetCounter(i64) }
//!
//! impl Action for TodoAction {
//!     type Kind = &'static str;
//!     fn kind(&self) -> &'static str {
//!         match self {
//!             Self::ClearTodoList => "clearTodoList",
//!             Self::SetCounter(_) => "setCounter",
//!         }
//!     }
//! }
//! ```
//!
//! Handlers map an action to an [`Updater`] of the registering view's local
//! state. The registry keeps each handler together with that view's write
//! chain, so a dispatch from any view runs the handler and applies the lifted
//! updater to the root tree. A kind has at most one handler per store.

use crate::error::StoreError;
use crate::node::WriteChain;
use crate::store::StateReader;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use optica_core::{UpdateError, Updater};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// A dispatchable action.
pub trait Action: Clone + Debug + Send + Sync + 'static {
    /// Tag identifying which handler an action goes to.
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// The tag of this action.
    fn kind(&self) -> Self::Kind;
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) type HandlerFn<A> = Arc<dyn Fn(&A) -> Updater + Send + Sync>;

/// Handlers to register on a view, one per action kind.
pub struct Handlers<A: Action> {
    entries: Vec<(A::Kind, HandlerFn<A>)>,
}

impl<A: Action> Default for Handlers<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: Action> Handlers<A> {
    /// No handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle `kind` with `handler`.
    pub fn on<F>(mut self, kind: A::Kind, handler: F) -> Self
    where
        F: Fn(&A) -> Updater + Send + Sync + 'static,
    {
        self.entries.push((kind, Arc::new(handler)));
        self
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no handlers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The kinds handled, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = A::Kind> + '_ {
        self.entries.iter().map(|(kind, _)| *kind)
    }
}

impl<A: Action> Debug for Handlers<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// A handler together with the write chain of the view it was registered on.
pub(crate) struct Registered<A: Action> {
    handler: HandlerFn<A>,
    chain: WriteChain,
    path: Arc<str>,
}

impl<A: Action> Registered<A> {
    /// The handler's updater, lifted to the root tree.
    pub(crate) fn updater(&self, action: &A) -> Updater {
        self.chain.lift((self.handler)(action))
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}

/// Store-wide map from action kind to handler.
pub(crate) struct HandlerRegistry<A: Action> {
    handlers: IndexMap<A::Kind, Arc<Registered<A>>>,
}

impl<A: Action> HandlerRegistry<A> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }

    /// Register every handler, or none if any kind is already taken.
    pub(crate) fn register(
        &mut self,
        handlers: Handlers<A>,
        chain: &WriteChain,
        path: &str,
    ) -> Result<usize, StoreError> {
        let mut batch: IndexMap<A::Kind, HandlerFn<A>> = IndexMap::new();
        for (kind, handler) in handlers.entries {
            if batch.contains_key(&kind) {
                return Err(StoreError::duplicate_updater(format!(
                    "two updaters for `{:?}` in one registration on `{}`",
                    kind, path
                )));
            }
            if let Some(existing) = self.handlers.get(&kind) {
                return Err(StoreError::duplicate_updater(format!(
                    "an updater for `{:?}` is already registered on `{}`",
                    kind, existing.path
                )));
            }
            batch.insert(kind, handler);
        }

        let count = batch.len();
        let path: Arc<str> = Arc::from(path);
        for (kind, handler) in batch {
            self.handlers.insert(
                kind,
                Arc::new(Registered {
                    handler,
                    chain: chain.clone(),
                    path: path.clone(),
                }),
            );
        }
        Ok(count)
    }

    pub(crate) fn get(&self, kind: A::Kind) -> Option<Arc<Registered<A>>> {
        self.handlers.get(&kind).cloned()
    }

    pub(crate) fn kinds(&self) -> Vec<A::Kind> {
        self.handlers.keys().copied().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Epics and side effects
// ─────────────────────────────────────────────────────────────────────────────

/// Maps the stream of actions of one kind to follow-up actions. `Err` items
/// are logged and do not stop the epic.
pub type EpicFn<A> = Arc<
    dyn Fn(BoxStream<'static, A>, StateReader<A>) -> BoxStream<'static, Result<A, UpdateError>>
        + Send
        + Sync,
>;

/// Epics to run on a view, one per action kind.
pub struct Epics<A: Action> {
    entries: Vec<(A::Kind, EpicFn<A>)>,
}

impl<A: Action> Default for Epics<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: Action> Epics<A> {
    /// No epics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `epic` over the actions of `kind`.
    pub fn on<F>(mut self, kind: A::Kind, epic: F) -> Self
    where
        F: Fn(BoxStream<'static, A>, StateReader<A>) -> BoxStream<'static, Result<A, UpdateError>>
            + Send
            + Sync
            + 'static,
    {
        self.entries.push((kind, Arc::new(epic)));
        self
    }

    /// True if there are no epics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(A::Kind, EpicFn<A>)> {
        self.entries
    }
}

/// Runs after an action of its kind was applied, with read access to state.
pub type SideEffectFn<A> = Arc<dyn Fn(&A, &StateReader<A>) + Send + Sync>;

/// Side effects to run on a view, one or more per action kind.
pub struct SideEffects<A: Action> {
    entries: Vec<(A::Kind, SideEffectFn<A>)>,
}

impl<A: Action> Default for SideEffects<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A: Action> SideEffects<A> {
    /// No side effects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `effect` after every action of `kind`.
    pub fn on<F>(mut self, kind: A::Kind, effect: F) -> Self
    where
        F: Fn(&A, &StateReader<A>) + Send + Sync + 'static,
    {
        self.entries.push((kind, Arc::new(effect)));
        self
    }

    pub(crate) fn into_entries(self) -> Vec<(A::Kind, SideEffectFn<A>)> {
        self.entries
    }
}
