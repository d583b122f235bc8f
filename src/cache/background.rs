//! Tracking for work that outlives the caller's answer
//!
//! Populating writes and race branches keep running after the decorated
//! fetch has returned. They are spawned here so shutdown code and tests can
//! wait for them with [`BackgroundTasks::drain`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BackgroundTasks {
    inner: Arc<Inner>,
}

/// Decrements the active count even if the task panics
struct Finished(Arc<Inner>);

impl Drop for Finished {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    /// Spawn a task on the current runtime without awaiting it
    pub(crate) fn spawn<Fut>(&self, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let finished = Finished(Arc::clone(&self.inner));
        tokio::spawn(async move {
            let _finished = finished;
            task.await;
        });
    }

    pub(crate) fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no spawned task is running
    pub(crate) async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not lost
            notified.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}
