//! Bounded-parallelism gate.
//!
//! The materializer schedules one task per indexed file; this gate caps how
//! many run at once. Tasks past the bound queue in submission order and start
//! strictly in that order as slots free up (tokio's semaphore is FIFO-fair).
//! The gate itself never fails independently of the tasks it runs.

use std::{future::Future, sync::Arc};
use tokio::sync::Semaphore;

/// Reusable concurrency limiter.
#[derive(Debug, Clone)]
pub struct Limiter {
    permits: Arc<Semaphore>,
}

impl Limiter {
    /// Create a limiter allowing at most `bound` tasks in flight.
    ///
    /// A bound of zero is clamped to one.
    pub fn new(bound: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(bound.max(1))),
        }
    }

    /// Default bound: twice the available CPU count, at least 2.
    pub fn default_bound() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cpus * 2).max(2)
    }

    /// Wrap `task` so it waits for a slot before running.
    pub fn run<F>(&self, task: F) -> impl Future<Output = F::Output> + use<F>
    where
        F: Future,
    {
        let permits = self.permits.clone();
        async move {
            // The semaphore is never closed, so acquisition only fails in
            // unreachable shutdown paths; the task must still run then.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        }
    }
}
