//! One-shot deferred tasks used to move an armed attempt to live.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::AbortHandle;

/// Handle to a scheduled one-shot task.
///
/// Cancelling is effective-or-no-op: a task that has not started its body never
/// runs it, and cancelling a task that already finished does nothing. Callers
/// that cannot tolerate a task slipping through (it may already be waiting on
/// the same lock) pair the handle with a generation check.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Prevent the task from running if it has not fired yet.
    pub fn cancel(self) {
        self.abort.abort();
    }

    /// Whether the task completed or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Capability to run a task once after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// Scheduler backed by the Tokio timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TimerHandle {
            abort: handle.abort_handle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting_task(counter: &Arc<AtomicUsize>) -> BoxFuture<'static, ()> {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn task_runs_once_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.schedule_once(Duration::from_millis(1_500), counting_task(&counter));

        tokio::time::advance(Duration::from_millis(1_499)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.schedule_once(Duration::from_millis(2_000), counting_task(&counter));

        tokio::time::advance(Duration::from_millis(500)).await;
        handle.cancel();

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
