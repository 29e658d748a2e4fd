//! Serial execution contexts.
//!
//! Each queue is one named OS thread draining a channel of jobs in
//! submission order.

use std::sync::Arc;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Clone-safe handle to a serial job thread. The thread exits once every
/// handle has been dropped and the remaining jobs have run.
#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    pub fn new(label: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let thread_label = label.to_string();

        std::thread::Builder::new().name(label.into()).spawn(move || {
            tracing::debug!(queue = %thread_label, "queue started");
            while let Some(job) = rx.blocking_recv() {
                job();
            }
            tracing::debug!(queue = %thread_label, "queue exiting");
        })?;

        Ok(Self {
            label: label.into(),
            tx,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `job` after everything already queued.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::warn!(queue = %self.label, "queue closed; job dropped");
        }
    }

    /// Run `job` on the queue and wait for its result.
    ///
    /// Must not be called from a job on the same queue: it would wait on
    /// itself forever.
    pub fn sync<F, R>(&self, job: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = std::sync::mpsc::sync_channel(1);
        self.dispatch(move || {
            let _ = reply_tx.send(job());
        });
        reply_rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_jobs_run_in_order() {
        let queue = SerialQueue::new("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue.dispatch(move || seen.lock().unwrap().push(i));
        }
        queue.sync(|| ()).unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_run_on_queue_thread() {
        let queue = SerialQueue::new("test-thread").unwrap();
        let name = queue
            .sync(|| std::thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-thread"));
        assert_eq!(queue.label(), "test-thread");
    }
}
