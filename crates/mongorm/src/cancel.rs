//! Cooperative cancellation for in-flight finds.
//!
//! The original exposes cancellation tokens on its async find surface.
//! `tokio_util::sync::CancellationToken` would be the natural pick, but
//! nothing else in this workspace depends on `tokio-util`, so this
//! reimplements the same `Arc<Notify>` + `Arc<AtomicBool>` pattern already
//! used for [`mongorm_tracking::ShutdownSignal`] rather than pull in a
//! crate for one call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A cooperative cancellation signal shared between a caller and the find
/// operation it issued.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    notify: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// True once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancelled; resolves immediately if already cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Races `future` against `token`, yielding `None` if cancellation wins.
pub async fn race<F, T>(token: &CancelToken, future: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        () = token.cancelled() => None,
        value = future => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncancelled_token_lets_the_future_resolve() {
        let token = CancelToken::new();
        let result = race(&token, async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let token = CancelToken::new();
        token.cancel();
        let result = race(&token, std::future::pending::<i32>()).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn cancel_called_concurrently_still_wins_the_race() {
        let token = CancelToken::new();
        let token2 = token.clone();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token2.cancel();
        });
        let result = race(&token, std::future::pending::<i32>()).await;
        handle.await.unwrap();
        assert_eq!(result, None);
    }
}
