//! Explicit debounce policy for one-shot lookups.
//!
//! The cache and URL cores carry no timers of their own; callers that want
//! debounced fetches (artwork or grouping resolution while the user types)
//! hold a [`Debouncer`] and route calls through it. A call superseded by a
//! newer one resolves to `Ok(None)`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::ApiError;

/// Serializes a stream of calls so only the latest one runs to completion.
pub struct Debouncer {
    delay: Duration,
    ticket: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ticket: AtomicU64::new(0),
        }
    }

    /// Waits out the debounce window, then runs `work` if no newer call has
    /// arrived in the meantime. Returns `Ok(None)` when superseded, either
    /// during the window or while `work` was running.
    ///
    /// The ticket is taken when `run` is called, not when the returned future
    /// is first polled, so a `cancel` or a newer `run` in between already
    /// supersedes this call.
    pub fn run<F, T>(&self, work: F) -> impl Future<Output = Result<Option<T>, ApiError>>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(self.delay).await;
            if self.ticket.load(Ordering::SeqCst) != ticket {
                return Ok(None);
            }
            let value = work.await?;
            if self.ticket.load(Ordering::SeqCst) != ticket {
                return Ok(None);
            }
            Ok(Some(value))
        }
    }

    /// Invalidates any call currently waiting or running.
    pub fn cancel(&self) {
        self.ticket.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn latest_call_wins() {
        let debouncer = Debouncer::new(Duration::from_millis(100));

        let first = debouncer.run(async { Ok::<_, ApiError>("first") });
        let second = debouncer.run(async { Ok::<_, ApiError>("second") });
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn lone_call_completes() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let result = debouncer
            .run(async { Ok::<_, ApiError>(42) })
            .await
            .unwrap();
        assert_eq!(result, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_supersedes_pending_call() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        // The future has not been polled when cancel runs; the ticket must
        // already be taken for the cancellation to stick.
        let pending = debouncer.run(async { Ok::<_, ApiError>(1) });
        debouncer.cancel();
        assert_eq!(pending.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_run_supersedes_an_unpolled_one() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let stale = debouncer.run(async { Ok::<_, ApiError>("stale") });
        let fresh = debouncer.run(async { Ok::<_, ApiError>("fresh") });

        assert_eq!(fresh.await.unwrap(), Some("fresh"));
        assert_eq!(stale.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_propagate_for_the_live_call() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let result = debouncer
            .run(async { Err::<(), _>(ApiError::Transport("down".into())) })
            .await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
