//! Cancelable one-shot timers.
//!
//! Every coalescing component in the crate keeps at most one pending
//! scheduled action. [`ScheduledTask`] is that action: a tokio task that
//! sleeps for a delay and then runs a future. Timers follow the tokio clock,
//! so tests can drive them with `tokio::time::pause()` / `advance()`.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A future scheduled to run once after a delay.
///
/// Dropping the handle does not cancel the task; call [`cancel()`](Self::cancel).
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `task` to run after `delay`.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Cancel the task. Has no effect once the task has completed.
    pub fn cancel(self) {
        self.handle.abort();
    }
}
