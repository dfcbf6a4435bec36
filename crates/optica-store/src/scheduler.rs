//! Single-writer job queue.
//!
//! Every mutation of the view graph (dispatches, loader settlements, stream
//! inputs, initial deliveries to new listeners) runs as a job. The caller that
//! finds the queue idle drains it in FIFO order; callers that find it busy
//! enqueue and return. Jobs run without the queue lock held, so a listener
//! may dispatch from inside a job: its dispatch runs after the current job.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A unit of work on the view graph.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    draining: bool,
}

/// FIFO job queue drained by at most one thread at a time.
#[derive(Default)]
pub(crate) struct Scheduler {
    queue: Mutex<Queue>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueue `job`, and drain the queue if nobody else is.
    pub(crate) fn submit(&self, job: Job) {
        {
            let mut queue = self.queue.lock();
            queue.jobs.push_back(job);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        let _guard = DrainGuard(self);
        while let Some(job) = self.next_job() {
            job();
        }
    }

    /// True while some thread is draining.
    #[cfg(test)]
    pub(crate) fn is_draining(&self) -> bool {
        self.queue.lock().draining
    }

    fn next_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock();
        let job = queue.jobs.pop_front();
        if job.is_none() {
            queue.draining = false;
        }
        job
    }
}

/// Releases the drain flag if a job panics, so the queue stays usable.
struct DrainGuard<'a>(&'a Scheduler);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut queue = self.0.queue.lock();
            queue.draining = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_idle_submit_runs_inline() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        scheduler.submit(Box::new(move || l.lock().push(1)));
        assert_eq!(*log.lock(), vec![1]);
        assert!(!scheduler.is_draining());
    }

    #[test]
    fn test_reentrant_submit_runs_after_current_job() {
        let scheduler = Arc::new(Scheduler::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let (s, l) = (scheduler.clone(), log.clone());
        scheduler.submit(Box::new(move || {
            l.lock().push("outer:start");
            let inner_log = l.clone();
            s.submit(Box::new(move || inner_log.lock().push("inner")));
            l.lock().push("outer:end");
        }));

        assert_eq!(*log.lock(), vec!["outer:start", "outer:end", "inner"]);
    }

    #[test]
    fn test_panicking_job_releases_queue() {
        let scheduler = Arc::new(Scheduler::new());
        let s = scheduler.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            s.submit(Box::new(|| panic!("job failed")));
        }));
        assert!(result.is_err());
        assert!(!scheduler.is_draining());

        let ran = Arc::new(Mutex::new(false));
        let r = ran.clone();
        scheduler.submit(Box::new(move || *r.lock() = true));
        assert!(*ran.lock());
    }
}
