//! Fire-and-forget work that runs after the response.
//!
//! Nothing on the response path waits for these tasks. Each one is bounded
//! by a timeout, and failures are only logged.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DeferredTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
    timeout: Duration,
}

impl DeferredTasks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a task. Must be called from within a tokio runtime.
    pub fn spawn<F, E>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let timeout = self.timeout;
        let mut tasks = self.lock();
        // Reap whatever already finished so the set does not grow.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => debug!("Deferred task {} done", label),
                Ok(Err(e)) => warn!("Deferred task {} failed: {}", label, e),
                Err(_) => warn!("Deferred task {} timed out after {:?}", label, timeout),
            }
        });
    }

    /// Tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every queued task, up to `limit`. Returns how many were
    /// still running when the limit hit (they are aborted).
    pub async fn drain(&self, limit: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());
        let waited = tokio::time::timeout(limit, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if waited.is_err() {
            let left = tasks.len();
            warn!("Aborting {} deferred tasks still running", left);
            tasks.shutdown().await;
            return left;
        }
        0
    }
}
