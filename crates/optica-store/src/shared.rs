//! State shared by every view of one store: the scheduler, the handler
//! registry, the action bus, logging, the runtime and activation.

use crate::action::{Action, HandlerRegistry};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::listener::{ListenerHost, ListenerId, Listeners};
use crate::logger::Logger;
use crate::node::Node;
use crate::scheduler::Scheduler;
use crate::tasks::TaskRegistry;
use optica_core::RawState;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::runtime::Handle;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Activation {
    active: bool,
    pending: Vec<Callback>,
}

pub(crate) struct Shared<A: Action> {
    pub(crate) scheduler: Scheduler,
    pub(crate) registry: RwLock<HandlerRegistry<A>>,
    pub(crate) actions: Listeners<A>,
    pub(crate) logger: Logger,
    pub(crate) tasks: TaskRegistry,
    action_seq: AtomicU64,
    dispatched: AtomicBool,
    runtime: Option<Handle>,
    root: OnceLock<Weak<Node<A>>>,
    activation: Mutex<Activation>,
}

impl<A: Action> Shared<A> {
    pub(crate) fn new(config: &StoreConfig) -> Arc<Self> {
        Arc::new(Self {
            scheduler: Scheduler::new(),
            registry: RwLock::new(HandlerRegistry::new()),
            actions: Listeners::new(),
            logger: Logger::new(config.logger),
            tasks: TaskRegistry::new(),
            action_seq: AtomicU64::new(0),
            dispatched: AtomicBool::new(false),
            runtime: config.runtime.clone(),
            root: OnceLock::new(),
            activation: Mutex::new(Activation::default()),
        })
    }

    pub(crate) fn set_root(&self, root: &Arc<Node<A>>) {
        let _ = self.root.set(Arc::downgrade(root));
    }

    fn root(&self) -> Option<Arc<Node<A>>> {
        self.root.get().and_then(Weak::upgrade)
    }

    /// The runtime for asynchronous work wired by `operation`.
    pub(crate) fn runtime(&self, operation: &str) -> Result<Handle, StoreError> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| {
                StoreError::no_runtime(format!(
                    "`{}` needs a Tokio runtime: configure one or call it inside a runtime",
                    operation
                ))
            })
    }

    pub(crate) fn has_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Apply one action: run its handler against the root tree, then notify
    /// action listeners. Runs inside a scheduler job.
    pub(crate) fn apply_action(&self, origin: &str, action: A) {
        self.dispatched.store(true, Ordering::Release);
        self.logger.message(origin, &action);

        let registered = self.registry.read().get(action.kind());
        if let (Some(registered), Some(root)) = (registered, self.root()) {
            let tree = root.raw().redux_state.clone();
            match registered.updater(&action).apply(tree) {
                Ok(next) => {
                    if root.replace_root(RawState::new(next)) {
                        self.logger.update(registered.path(), &action);
                    }
                }
                Err(err) => self.logger.error(registered.path(), "updater", &err),
            }
        }

        let seq = self.action_seq.fetch_add(1, Ordering::AcqRel) + 1;
        self.actions.notify(seq, &action);
    }

    /// Run `callback` now if the store is active, else on activation.
    pub(crate) fn on_activate(&self, callback: Callback) {
        let run_now = {
            let mut activation = self.activation.lock();
            if activation.active {
                Some(callback)
            } else {
                activation.pending.push(callback);
                None
            }
        };
        if let Some(callback) = run_now {
            callback();
        }
    }

    /// Activate once; later calls do nothing.
    pub(crate) fn activate(&self) {
        let pending = {
            let mut activation = self.activation.lock();
            if activation.active {
                return;
            }
            activation.active = true;
            std::mem::take(&mut activation.pending)
        };
        for callback in pending {
            callback();
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.activation.lock().active
    }
}

impl<A: Action> ListenerHost for Shared<A> {
    fn remove_listener(&self, id: ListenerId) {
        self.actions.remove(id);
    }
}
