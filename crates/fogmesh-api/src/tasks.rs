//! Background work started by API requests.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Tasks spawned on behalf of accepted requests, awaited at shutdown.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(done) = set.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "background task failed");
            }
        }
        set.spawn(task);
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every task, including any spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.set.lock().unwrap_or_else(PoisonError::into_inner));
            if set.is_empty() {
                break;
            }
            debug!(tasks = set.len(), "waiting for background tasks");
            while let Some(done) = set.join_next().await {
                if let Err(e) = done {
                    warn!(error = %e, "background task failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn drain_waits_for_every_task() {
        let tasks = BackgroundTasks::new();
        let finished = Arc::new(AtomicUsize::new(0));

        for delay in [30, 10, 20] {
            let finished = finished.clone();
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_drain() {
        let tasks = BackgroundTasks::new();
        let finished = Arc::new(AtomicUsize::new(0));

        tasks.spawn(async { panic!("boom") });
        let counter = finished.clone();
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tasks.drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
