//! Push streams over a view.
//!
//! A [`ViewStream`] is fed by a listener on the view and owns the
//! subscription, so it keeps the view alive and unsubscribes when dropped.
//! The first item is the view's state at subscription time.

use crate::action::Action;
use crate::derive::Fields;
use crate::listener::Subscription;
use crate::store::Store;
use futures::Stream;
use optica_core::{shallow_equal, to_data, Lens, RawState, Record, Value};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Stream of items derived from a view.
pub struct ViewStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    subscription: Subscription,
}

impl<T> ViewStream<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>, subscription: Subscription) -> Self {
        Self { rx, subscription }
    }

    /// Next item if one is already buffered.
    pub fn try_next_now(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Every buffered item.
    pub fn drain_now(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_next_now()).collect()
    }

    /// Stop listening. Buffered items can still be read.
    pub fn close(self) -> mpsc::UnboundedReceiver<T> {
        self.subscription.unsubscribe();
        self.rx
    }
}

impl<T> Stream for ViewStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for ViewStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStream")
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl<A: Action> Store<A> {
    /// Stream of `map(raw)` for every commit of this view, skipping items
    /// `same` as the previous one.
    pub(crate) fn project<T, F, E>(&self, map: F, same: E) -> ViewStream<T>
    where
        T: Clone + Send + 'static,
        F: Fn(&RawState) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let last: Mutex<Option<T>> = Mutex::new(None);
        let subscription = self.node().listen(move |raw: &Arc<RawState>| {
            let next = map(raw);
            let mut last = last.lock();
            if last.as_ref().is_some_and(|prev| same(prev, &next)) {
                return;
            }
            *last = Some(next.clone());
            let _ = tx.send(next);
        });
        ViewStream::new(rx, subscription)
    }

    /// Stream of a record holding the data fields `keys` (absent fields
    /// omitted). Emits only when one of them changes.
    pub fn pick<I, S>(&self, keys: I) -> ViewStream<Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = optica_core::keys(keys);
        self.project(
            move |raw| {
                let data = to_data(raw);
                let record: Record = keys
                    .iter()
                    .filter_map(|key| data.get(key).map(|value| (key.clone(), value.clone())))
                    .collect();
                Value::record(record)
            },
            shallow_equal,
        )
    }

    /// Stream of the data value at `path` (`Null` when absent).
    pub fn pluck<I, S>(&self, path: I) -> ViewStream<Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lens = Lens::path(path);
        self.project(
            move |raw| lens.read(&to_data(raw)).unwrap_or_default(),
            shallow_equal,
        )
    }

    /// Stream of a record built from named lenses into the data.
    pub fn cherry_pick(&self, fields: Fields) -> ViewStream<Value> {
        self.project(move |raw| fields.read(&to_data(raw)), shallow_equal)
    }
}
