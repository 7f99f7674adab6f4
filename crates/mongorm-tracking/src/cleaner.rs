//! The background cache cleaner.
//!
//! A tracing garbage collector's full-collection notification is the
//! natural trigger for a clean-up pass. Rust has no such collector to
//! subscribe to, so [`ReclaimSignal`] stands in for it: the host process
//! drives it
//! from whatever memory-pressure source it has (an allocator hook, a
//! periodic timer, a test double), and [`NotifyReclaimSignal`] is the
//! default implementation when no external signal is wired up — it simply
//! fires on its own timeout, which is enough to satisfy "a best-effort
//! clean-up eventually runs" even with nothing external driving it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongorm_core::Document;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::manager::StateManager;

/// Bounds governing how often the cache cleaner runs.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheCleanerConfig {
    /// Minimum milliseconds between successful clean-ups.
    #[serde(default = "default_lower_bound_ms")]
    pub lower_bound_ms: u64,
    /// Maximum milliseconds the cleaner sleeps between polls, even with no
    /// reclamation signal.
    #[serde(default = "default_upper_bound_ms")]
    pub upper_bound_ms: u64,
}

impl Default for CacheCleanerConfig {
    fn default() -> Self {
        Self {
            lower_bound_ms: default_lower_bound_ms(),
            upper_bound_ms: default_upper_bound_ms(),
        }
    }
}

impl CacheCleanerConfig {
    /// Validates `lower_bound_ms <= upper_bound_ms`.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.lower_bound_ms > self.upper_bound_ms {
            return Err(crate::error::TrackingError::ArgumentError(format!(
                "cache_cleanup_lower_bound_ms ({}) must not exceed cache_cleanup_upper_bound_ms ({})",
                self.lower_bound_ms, self.upper_bound_ms
            )));
        }
        Ok(())
    }

    fn lower_bound(&self) -> Duration {
        Duration::from_millis(self.lower_bound_ms)
    }

    fn upper_bound(&self) -> Duration {
        Duration::from_millis(self.upper_bound_ms)
    }
}

const fn default_lower_bound_ms() -> u64 {
    10_000
}

const fn default_upper_bound_ms() -> u64 {
    60_000
}

/// The outcome of one `StateManager::clean_up` call.
#[derive(Debug, Clone, Copy)]
pub struct CleanupReport {
    /// How many dead entries were removed.
    pub removed: usize,
    /// Whether this was a full (vs. partial) clean-up.
    pub full: bool,
}

/// A pluggable stand-in for "the runtime's memory reclaimer has just
/// finished a full collection."
#[async_trait]
pub trait ReclaimSignal: Send + Sync {
    /// Waits for the next reclamation-relevant event, or for
    /// `upper_bound` to elapse, whichever comes first. Returns `true` if an
    /// actual reclamation completion was observed, `false` if the wait
    /// simply timed out.
    async fn wait(&self, upper_bound: Duration) -> bool;
}

/// The default [`ReclaimSignal`]: never fires early, always resolves once
/// `upper_bound` elapses. A process with a real memory-pressure source
/// should wire in its own implementation and call [`NotifyReclaimSignal::notify`]
/// from it instead.
#[derive(Debug, Default)]
pub struct NotifyReclaimSignal {
    notify: Notify,
}

impl NotifyReclaimSignal {
    /// A signal with no pending notification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes any waiter immediately, as a full-collection completion.
    pub fn notify(&self) {
        self.notify.notify_one();
    }
}

#[async_trait]
impl ReclaimSignal for NotifyReclaimSignal {
    async fn wait(&self, upper_bound: Duration) -> bool {
        tokio::select! {
            () = self.notify.notified() => true,
            () = tokio::time::sleep(upper_bound) => false,
        }
    }
}

/// Cooperative shutdown handle for a running [`CacheCleaner`] task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    notify: Arc<Notify>,
    stopped: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// A fresh, unsignaled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown; wakes the cleaner's poll loop at its next wait
    /// point.
    pub fn signal(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }
}

/// The background task that watches [`ReclaimSignal`] and triggers
/// [`StateManager::clean_up`] no more often than `lower_bound_ms` apart.
pub struct CacheCleaner<T: Document> {
    manager: Arc<StateManager<T>>,
    signal: Arc<dyn ReclaimSignal>,
    config: CacheCleanerConfig,
    shutdown: ShutdownSignal,
}

impl<T: Document> CacheCleaner<T> {
    /// Builds a cleaner for `manager`, driven by `signal`, observing
    /// `config`'s bounds. Call [`CacheCleaner::spawn`] to start it.
    #[must_use]
    pub fn new(manager: Arc<StateManager<T>>, signal: Arc<dyn ReclaimSignal>, config: CacheCleanerConfig) -> Self {
        Self {
            manager,
            signal,
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// A handle the caller can use to request cooperative shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Spawns the poll loop on the current Tokio runtime.
    pub fn spawn(self) -> JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = self.shutdown.wait() => {
                        tracing::debug!("cache cleaner shutting down");
                        return;
                    }
                    completed = self.signal.wait(self.config.upper_bound()) => {
                        let elapsed_enough = self
                            .manager
                            .time_since_last_cleanup()
                            .is_none_or(|elapsed| elapsed >= self.config.lower_bound());
                        if elapsed_enough {
                            let report = self.manager.clean_up(completed);
                            tracing::debug!(
                                removed = report.removed,
                                full = report.full,
                                "cache cleaner reclaimed entries"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongorm_core::{ChangeNotifier, NavigationMap};
    use parking_lot::RwLock;
    use std::time::Duration;

    struct Widget {
        id: RwLock<bson::oid::ObjectId>,
        nav: RwLock<NavigationMap>,
        notifier: ChangeNotifier,
    }

    impl Document for Widget {
        fn collection_name() -> &'static str {
            "widgets"
        }
        fn id(&self) -> bson::oid::ObjectId {
            *self.id.read()
        }
        fn set_id(&self, id: bson::oid::ObjectId) {
            *self.id.write() = id;
        }
        fn navigation(&self) -> NavigationMap {
            self.nav.read().clone()
        }
        fn set_single_reference(&self, field: &'static str, id: bson::oid::ObjectId) {
            self.nav.write().set_single(field, id);
        }
        fn set_collection_reference(&self, field: &'static str, ids: Vec<bson::oid::ObjectId>) {
            self.nav.write().set_collection(field, ids);
        }
        fn change_notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    #[test]
    fn config_defaults_match_spec() {
        let config = CacheCleanerConfig::default();
        assert_eq!(config.lower_bound_ms, 10_000);
        assert_eq!(config.upper_bound_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_inverted_bounds() {
        let config = CacheCleanerConfig {
            lower_bound_ms: 5_000,
            upper_bound_ms: 1_000,
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cleaner_runs_at_least_once_before_upper_bound_elapses() {
        let manager = StateManager::<Widget>::new();
        let signal: Arc<dyn ReclaimSignal> = Arc::new(NotifyReclaimSignal::new());
        let config = CacheCleanerConfig {
            lower_bound_ms: 0,
            upper_bound_ms: 50,
        };
        let cleaner = CacheCleaner::new(Arc::clone(&manager), signal, config);
        let shutdown = cleaner.shutdown_handle();
        let handle = cleaner.spawn();

        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::time::advance(Duration::from_millis(1)).await;
        shutdown.signal();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert!(manager.time_since_last_cleanup().is_some());
    }

    #[tokio::test]
    async fn explicit_notify_triggers_a_full_cleanup() {
        let manager = StateManager::<Widget>::new();
        let signal = Arc::new(NotifyReclaimSignal::new());
        let config = CacheCleanerConfig {
            lower_bound_ms: 0,
            upper_bound_ms: 10_000,
        };
        let cleaner = CacheCleaner::new(Arc::clone(&manager), signal.clone(), config);
        let shutdown = cleaner.shutdown_handle();
        let handle = cleaner.spawn();

        signal.notify();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        shutdown.signal();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(manager.full_cleanup_count(), 1);
    }
}
