//! Loaders whose results the test decides.

use futures::channel::mpsc;
use optica_core::{LoadError, Value};
use parking_lot::Mutex;
use std::sync::Arc;

type Sender = mpsc::UnboundedSender<Result<Value, LoadError>>;

#[derive(Default)]
struct Calls {
    inputs: Vec<Value>,
    senders: Vec<Sender>,
}

/// A loader that records every invocation and only yields what the test
/// emits. Each invocation gets its own channel; aborting the loader task
/// closes it.
#[derive(Clone, Default)]
pub struct ManualLoader {
    calls: Arc<Mutex<Calls>>,
}

impl std::fmt::Debug for ManualLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualLoader")
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ManualLoader {
    /// A loader with no invocations yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The loader function, for `Loaders::with`.
    pub fn loader(
        &self,
    ) -> impl Fn(Value) -> mpsc::UnboundedReceiver<Result<Value, LoadError>> + Send + Sync + 'static
    {
        let calls = self.calls.clone();
        move |input| {
            let (tx, rx) = mpsc::unbounded();
            let mut calls = calls.lock();
            calls.inputs.push(input);
            calls.senders.push(tx);
            rx
        }
    }

    /// Data passed to each invocation, oldest first.
    pub fn inputs(&self) -> Vec<Value> {
        self.calls.lock().inputs.clone()
    }

    /// Number of invocations.
    pub fn call_count(&self) -> usize {
        self.calls.lock().inputs.len()
    }

    /// Send `item` to the latest invocation. False if there is none or its
    /// task is gone.
    pub fn emit(&self, item: Result<Value, LoadError>) -> bool {
        let calls = self.calls.lock();
        calls
            .senders
            .last()
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }

    /// Send `item` to invocation `call`.
    pub fn emit_to(&self, call: usize, item: Result<Value, LoadError>) -> bool {
        let calls = self.calls.lock();
        calls
            .senders
            .get(call)
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }

    /// True while invocation `call` is still being polled.
    pub fn is_live(&self, call: usize) -> bool {
        self.calls
            .lock()
            .senders
            .get(call)
            .is_some_and(|tx| !tx.is_closed())
    }
}

/// Let spawned loader, input and epic tasks run until they are idle.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
