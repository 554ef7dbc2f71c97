//! Periodic Snapshot Refresh
//!
//! Background task that reloads the full snapshot on a fixed period so the
//! cache recovers from notifications the feed never delivered. A failed
//! refresh is logged and counted; the cache keeps serving what it has.

use crate::cache::PortalCache;
use portal_core::SourceReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters kept by the refresh task.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Reloads that completed and swapped in a new snapshot
    pub reloads_succeeded: AtomicU64,

    /// Reloads that failed and left the previous state in place
    pub reloads_failed: AtomicU64,
}

impl RefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            reloads_succeeded: self.reloads_succeeded.load(Ordering::Relaxed),
            reloads_failed: self.reloads_failed.load(Ordering::Relaxed),
        }
    }
}

/// Refresh counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSnapshot {
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Reload `cache` every `period` until the shutdown signal is set.
///
/// The first reload happens one period after start; the startup reload is
/// the caller's. `period` must be non-zero. Returns the metrics collected
/// over the task's lifetime.
pub async fn refresh_task<R>(
    cache: PortalCache<R>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshMetrics>
where
    R: SourceReader + 'static,
{
    let metrics = Arc::new(RefreshMetrics::new());

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(period_secs = period.as_secs(), "Cache refresh task started");

    if *shutdown_rx.borrow_and_update() {
        tracing::info!("Cache refresh task shutting down");
        return metrics;
    }

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache refresh task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                match cache.reload().await {
                    Ok(()) => {
                        metrics.reloads_succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        // Already logged by reload with the failing step.
                        tracing::warn!(error = %e, "Periodic cache refresh failed");
                        metrics.reloads_failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        reloads_succeeded = snapshot.reloads_succeeded,
        reloads_failed = snapshot.reloads_failed,
        "Cache refresh task completed"
    );

    metrics
}

impl<R: SourceReader + 'static> PortalCache<R> {
    /// Spawn [`refresh_task`] bound to this cache's shutdown signal.
    pub fn spawn_refresh_task(&self, period: Duration) -> JoinHandle<Arc<RefreshMetrics>> {
        tokio::spawn(refresh_task(self.clone(), period, self.shutdown_receiver()))
    }
}
