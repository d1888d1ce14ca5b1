//! Trailing-edge debouncing for async operations.
//!
//! [`Debouncer`] wraps an async operation so that a burst of calls collapses
//! into a single execution. Every call resets one shared timer to `delay`;
//! when the timer finally fires, the operation runs once with the arguments
//! of the most recent call.
//!
//! # Superseded callers
//!
//! Each call returns a future that resolves when its own invocation settles.
//! A call replaced by a newer one before its timer fired never runs; its
//! future resolves to [`MuninnError::Superseded`]. Only the caller that
//! scheduled the execution that actually ran receives the operation's result.
//!
//! Once the operation has started it is never cancelled: a new call arriving
//! mid-flight schedules a fresh execution instead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::debug;

use crate::timer::ScheduledTask;
use crate::{MuninnError, Result};

/// Type-erased async operation.
type Operation<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// The single scheduled-but-not-yet-fired invocation.
struct Pending<T> {
    id: u64,
    task: ScheduledTask,
    reply: oneshot::Sender<Result<T>>,
}

struct Slot<T> {
    next_id: u64,
    pending: Option<Pending<T>>,
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalesces bursts of calls to an async operation into one execution.
///
/// ```rust
/// # use muninn::Debouncer;
/// # use std::time::Duration;
/// # async fn demo() -> muninn::Result<()> {
/// let save = Debouncer::new(Duration::from_millis(100), |text: String| async move {
///     Ok(text.len())
/// });
/// let len = save.call("hello".to_string()).await?;
/// assert_eq!(len, 5);
/// # Ok(())
/// # }
/// ```
pub struct Debouncer<A, T> {
    op: Operation<A, T>,
    delay: Duration,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<A, T> Debouncer<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Wrap `op` so that calls within `delay` of each other coalesce.
    pub fn new<F, Fut>(delay: Duration, op: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            op: Arc::new(move |args: A| -> BoxFuture<'static, Result<T>> { Box::pin(op(args)) }),
            delay,
            slot: Arc::new(Mutex::new(Slot {
                next_id: 0,
                pending: None,
            })),
        }
    }

    /// The quiet period required before the operation runs.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule the operation with `args`, replacing any pending call.
    ///
    /// Resolves with the operation's result once it has run, or with
    /// [`MuninnError::Superseded`] if a newer call replaced this one first.
    pub async fn call(&self, args: A) -> Result<T> {
        let (reply, outcome) = oneshot::channel();
        {
            let mut slot = lock(&self.slot);
            if let Some(previous) = slot.pending.take() {
                previous.task.cancel();
                let _ = previous.reply.send(Err(MuninnError::Superseded));
                debug!(id = previous.id, "debounced call superseded");
            }
            slot.next_id += 1;
            let id = slot.next_id;
            let op = Arc::clone(&self.op);
            let shared = Arc::clone(&self.slot);
            let task = ScheduledTask::after(self.delay, async move {
                // Claim the slot; a newer call may have replaced us while the
                // timer was firing.
                let claimed = lock(&shared).pending.take_if(|p| p.id == id);
                let Some(pending) = claimed else {
                    return;
                };
                let result = op(args).await;
                let _ = pending.reply.send(result);
            });
            slot.pending = Some(Pending { id, task, reply });
        }
        outcome.await.unwrap_or(Err(MuninnError::Superseded))
    }

    /// Whether a call is scheduled but has not fired yet.
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn single_call_runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(100), |x: u32| async move { Ok(x * 2) });
        let started = tokio::time::Instant::now();
        let result = debouncer.call(21).await.unwrap();
        assert_eq!(result, 42);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_delivered_to_caller() {
        let debouncer = Debouncer::new(Duration::from_millis(10), |_: ()| async move {
            Err::<(), _>(MuninnError::Http("unreachable".into()))
        });
        let err = debouncer.call(()).await.unwrap_err();
        assert!(matches!(err, MuninnError::Http(_)));
    }
}
