//! Background tasks owned by the store and its views.
//!
//! Loaders, input streams and epics run on Tokio. Their handles are owned by
//! whatever wired them, and dropping the owner aborts the tasks.

use parking_lot::Mutex;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A task handle that aborts the task when dropped.
#[derive(Debug)]
pub(crate) struct AbortOnDrop(JoinHandle<()>);

impl AbortOnDrop {
    pub(crate) fn spawn<F>(runtime: &Handle, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(runtime.spawn(fut))
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Long-lived tasks (epics, input streams) with a shared shutdown signal.
#[derive(Debug)]
pub(crate) struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `fut` on `runtime`; it stops at the latest on [`shutdown`](Self::shutdown).
    pub(crate) fn spawn_cancellable<F>(&self, runtime: &Handle, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_stops_tasks() {
        let registry = TaskRegistry::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        registry.spawn_cancellable(&Handle::current(), async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        assert_eq!(registry.len(), 1);

        registry.shutdown();
        // The sender is dropped once the task is gone.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(closed, Ok(None));
    }

    #[tokio::test]
    async fn test_abort_on_drop() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let handle = AbortOnDrop::spawn(&Handle::current(), async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        assert!(!handle.is_finished());
        drop(handle);
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(closed, Ok(None));
    }
}
