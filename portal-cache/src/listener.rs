//! Change feed listener.
//!
//! A single background task receives notifications and hands each one to its
//! own task. Handlers run concurrently and in no particular order; the pending
//! buffer makes the final state independent of arrival order.

use crate::cache::PortalCache;
use portal_core::{ChangeFeed, SourceReader};
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Lifecycle of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    /// No successful reload yet, or the cache has no feed.
    #[default]
    NotStarted,
    /// Receiving notifications.
    Listening,
    /// Shut down or the feed closed. Terminal.
    Stopped,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::NotStarted => "not_started",
            ListenerState::Listening => "listening",
            ListenerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receive loop.
///
/// Runs until the shutdown signal is set or the feed closes. In-flight
/// handlers are awaited before the state moves to `Stopped`.
pub(crate) async fn run_listener<R>(
    cache: PortalCache<R>,
    mut feed: Box<dyn ChangeFeed>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    R: SourceReader + 'static,
{
    let mut in_flight = JoinSet::new();

    if *shutdown_rx.borrow_and_update() {
        tracing::info!("Shutdown requested before the change feed listener started");
        cache.set_listener_state(ListenerState::Stopped);
        return;
    }

    tracing::info!("Change feed listener started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Change feed listener shutting down");
                    break;
                }
            }

            next = feed.recv() => {
                match next {
                    Some(notification) => {
                        tracing::trace!(
                            table = %notification.table,
                            action = ?notification.action,
                            "Dispatching notification"
                        );
                        let cache = cache.clone();
                        in_flight.spawn(async move {
                            cache.apply(notification).await;
                        });
                    }
                    None => {
                        tracing::warn!("Change feed closed, listener stopping");
                        break;
                    }
                }
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Notification handler failed");
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Notification handler failed");
        }
    }

    cache.set_listener_state(ListenerState::Stopped);
    tracing::info!("Change feed listener stopped");
}
