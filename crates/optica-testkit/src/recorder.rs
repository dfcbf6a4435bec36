//! Collects what listeners receive.

use parking_lot::Mutex;
use std::sync::Arc;

/// Shared, cloneable log of delivered items.
#[derive(Debug)]
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener callback appending to this recorder.
    pub fn callback(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let items = self.items.clone();
        move |item: &T| items.lock().push(item.clone())
    }

    /// A callback recording `map(item)`.
    pub fn mapped<U, F>(&self, map: F) -> impl Fn(&U) + Send + Sync + 'static
    where
        U: ?Sized,
        F: Fn(&U) -> T + Send + Sync + 'static,
    {
        let items = self.items.clone();
        move |item: &U| items.lock().push(map(item))
    }

    /// Record one item.
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Everything recorded so far.
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    /// Number of recorded items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// The latest item.
    pub fn last(&self) -> Option<T> {
        self.items.lock().last().cloned()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}
