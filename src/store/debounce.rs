//! Keyed debouncer
//!
//! Each key has at most one pending task. Scheduling again under the same
//! key aborts the pending one, so a burst of triggers collapses into a
//! single run after the last one.

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

struct Pending {
    generation: u64,
    abort: AbortHandle,
}

/// Cancellable delayed tasks on a tokio runtime
#[derive(Clone)]
pub struct Debouncer {
    runtime: Handle,
    pending: Arc<DashMap<String, Pending>>,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `task` after `delay`, replacing whatever is pending under `key`
    pub fn schedule<F, Fut>(&self, key: &str, delay: Duration, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = Arc::clone(&self.pending);
        let owned_key = key.to_string();

        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task().await;
            // A newer schedule owns the entry now
            pending.remove_if(&owned_key, |_, p| p.generation == generation);
        });

        let previous = self.pending.insert(
            key.to_string(),
            Pending {
                generation,
                abort: handle.abort_handle(),
            },
        );

        if let Some(previous) = previous {
            previous.abort.abort();
        }
    }

    /// Abort the task pending under `key`; returns whether one was pending
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some((_, p)) => {
                let was_running = !p.abort.is_finished();
                p.abort.abort();
                was_running
            }
            None => false,
        }
    }

    /// Whether a task is queued under `key`
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending
            .get(key)
            .map(|p| !p.abort.is_finished())
            .unwrap_or(false)
    }
}
