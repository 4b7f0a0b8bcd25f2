//! Serial dispatch queue used by the in-memory native SDKs.
//!
//! Native SDKs deliver observer callbacks on their own queue, never on the
//! caller's stack. `DispatchQueue` reproduces that: jobs run in FIFO order on
//! one dedicated OS thread, which exits once every queue handle is dropped.

use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a serial callback queue
#[derive(Clone, Debug)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl DispatchQueue {
    /// Start a queue whose worker thread is named `label`
    pub fn new(label: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
            });
        if let Err(err) = worker {
            // Receiver is gone with the closure; every dispatch becomes a no-op.
            tracing::error!(label, error = %err, "failed to start dispatch thread");
        }
        Self { tx }
    }

    /// Run `job` on the queue after everything already queued
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::warn!("dispatch queue stopped, dropping callback");
        }
    }

    /// Wait until every job queued before this call has run
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_jobs_run_in_order_off_thread() {
        let queue = DispatchQueue::new("test-queue");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let caller = std::thread::current().id();

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue.dispatch(move || {
                assert_ne!(std::thread::current().id(), caller);
                seen.lock().push(i);
            });
        }
        queue.flush().await;

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_flush_from_blocking_context() {
        let queue = DispatchQueue::new("blocking-queue");
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        queue.dispatch(move || *flag.lock() = true);

        tokio_test::block_on(queue.flush());
        assert!(*ran.lock());
    }
}
