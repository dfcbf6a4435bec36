//! Listener lists and subscription handles.
//!
//! Each delivery carries a version. A listener only sees versions newer than
//! the last one it saw, so a late initial delivery can never overtake a
//! newer commit.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a listener within its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: ListenerId,
    seen: AtomicU64,
    callback: Callback<T>,
}

/// Ordered set of callbacks.
pub(crate) struct Listeners<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry<T>>>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a callback that has seen nothing yet.
    pub(crate) fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(Arc::new(Entry {
            id,
            seen: AtomicU64::new(0),
            callback: Arc::new(callback),
        }));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Deliver `value` at `version` to every listener that has not seen it.
    /// Callbacks run without the list lock held.
    pub(crate) fn notify(&self, version: u64, value: &T) {
        let entries = self.entries.lock().clone();
        for entry in entries {
            deliver(&entry, version, value);
        }
    }

    /// Deliver `value` at `version` to one listener.
    pub(crate) fn notify_one(&self, id: ListenerId, version: u64, value: &T) {
        let entry = self
            .entries
            .lock()
            .iter()
            .find(|entry| entry.id == id)
            .cloned();
        if let Some(entry) = entry {
            deliver(&entry, version, value);
        }
    }
}

fn deliver<T>(entry: &Entry<T>, version: u64, value: &T) {
    if entry.seen.fetch_max(version, Ordering::AcqRel) < version {
        (entry.callback)(value);
    }
}

/// Something listeners can be removed from.
pub(crate) trait ListenerHost: Send + Sync {
    fn remove_listener(&self, id: ListenerId);
}

/// Handle on a registered listener. Dropping it unsubscribes; while it lives
/// it keeps the observed view alive.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    host: Option<Arc<dyn ListenerHost>>,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(host: Arc<dyn ListenerHost>, id: ListenerId) -> Self {
        Self {
            host: Some(host),
            id,
        }
    }

    /// The listener this handle controls.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Unsubscribe now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(host) = self.host.take() {
            host.remove_listener(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.host.is_some())
            .finish()
    }
}
