//! Portal cache facade.
//!
//! [`PortalCache`] owns the locked cache state, the source reader, and the
//! change feed. It is cheap to clone and meant to be shared between request
//! handlers, the listener, and the refresh task.

use crate::applier::{ApplyOutcome, CacheState};
use crate::listener::{run_listener, ListenerState};
use crate::loader::Snapshot;
use crate::store::StoreCounts;
use portal_core::{
    AppLimitRow, Application, Blockchain, ChangeFeed, GatewayAatRow, GatewaySettingsRow, LbApp,
    LoadBalancer, Notification, NotificationSettingsRow, PayPlan, PayPlanType, PortalResult,
    Redirect, SourceReader, StickyOptionsRow, SyncCheckOptionsRow,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};

// ============================================================================
// STATISTICS
// ============================================================================

/// Point-in-time view of the cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub pay_plans: usize,
    pub applications: usize,
    pub blockchains: usize,
    pub load_balancers: usize,
    /// Parent IDs with children waiting in the pending buffer.
    pub pending: usize,
}

impl CacheStats {
    fn new(counts: StoreCounts, pending: usize) -> Self {
        Self {
            pay_plans: counts.pay_plans,
            applications: counts.applications,
            blockchains: counts.blockchains,
            load_balancers: counts.load_balancers,
            pending,
        }
    }
}

// ============================================================================
// PORTAL CACHE
// ============================================================================

struct Inner<R> {
    reader: R,
    state: RwLock<CacheState>,
    /// Taken by the first successful reload.
    feed: Mutex<Option<Box<dyn ChangeFeed>>>,
    listener_state: watch::Sender<ListenerState>,
    shutdown: watch::Sender<bool>,
}

/// In-memory cache of portal entities.
pub struct PortalCache<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for PortalCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SourceReader + 'static> PortalCache<R> {
    /// Create an empty cache. Nothing is read until [`reload`](Self::reload).
    pub fn new<F: ChangeFeed>(reader: R, feed: F) -> Self {
        Self::build(reader, Some(Box::new(feed)))
    }

    /// Create a cache that is only fed through reloads and direct writes.
    pub fn without_feed(reader: R) -> Self {
        Self::build(reader, None)
    }

    fn build(reader: R, feed: Option<Box<dyn ChangeFeed>>) -> Self {
        let (listener_state, _) = watch::channel(ListenerState::NotStarted);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                reader,
                state: RwLock::new(CacheState::new()),
                feed: Mutex::new(feed),
                listener_state,
                shutdown,
            }),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Reload every collection from the source and swap the result in.
    ///
    /// The write lock is held for the whole reload, so change notifications
    /// wait behind it. On failure the previous contents stay in place. The
    /// first successful reload starts the listener.
    pub async fn reload(&self) -> PortalResult<()> {
        let started = Instant::now();
        tracing::info!("Reloading portal cache");

        let (stats, discarded) = {
            let mut state = self.inner.state.write().await;
            let snapshot = match Snapshot::read(&self.inner.reader).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        step = %e.step,
                        "Cache reload failed, keeping previous state"
                    );
                    return Err(e.into());
                }
            };
            let discarded = state.replace_store(snapshot.build());
            (
                CacheStats::new(state.store.counts(), state.pending.parent_count()),
                discarded,
            )
        };

        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            pay_plans = stats.pay_plans,
            applications = stats.applications,
            blockchains = stats.blockchains,
            load_balancers = stats.load_balancers,
            pending = stats.pending,
            pending_discarded = discarded,
            "Portal cache reloaded"
        );

        self.start_listener().await;
        Ok(())
    }

    async fn start_listener(&self) {
        let Some(feed) = self.inner.feed.lock().await.take() else {
            return;
        };
        self.set_listener_state(ListenerState::Listening);
        let shutdown_rx = self.inner.shutdown.subscribe();
        tokio::spawn(run_listener(self.clone(), feed, shutdown_rx));
    }

    /// Signal the listener and the refresh task to stop.
    pub fn shutdown(&self) {
        tracing::info!("Portal cache shutdown requested");
        self.inner.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    pub fn listener_state(&self) -> ListenerState {
        *self.inner.listener_state.borrow()
    }

    /// Watch listener state transitions.
    pub fn subscribe_listener_state(&self) -> watch::Receiver<ListenerState> {
        self.inner.listener_state.subscribe()
    }

    pub(crate) fn set_listener_state(&self, state: ListenerState) {
        self.inner.listener_state.send_replace(state);
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.read().await;
        CacheStats::new(state.store.counts(), state.pending.parent_count())
    }

    /// Whether children are waiting in the pending buffer for `parent_id`.
    pub async fn has_pending(&self, parent_id: &str) -> bool {
        self.inner.state.read().await.pending.contains_parent(parent_id)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn application(&self, id: &str) -> Option<Application> {
        self.inner.state.read().await.store.application(id).cloned()
    }

    pub async fn applications(&self) -> Vec<Application> {
        let state = self.inner.state.read().await;
        state.store.applications().cloned().collect()
    }

    pub async fn applications_by_owner(&self, user_id: &str) -> Vec<Application> {
        let state = self.inner.state.read().await;
        state.store.applications_by_owner(user_id).cloned().collect()
    }

    pub async fn blockchain(&self, id: &str) -> Option<Blockchain> {
        self.inner.state.read().await.store.blockchain(id).cloned()
    }

    pub async fn blockchains(&self) -> Vec<Blockchain> {
        let state = self.inner.state.read().await;
        state.store.blockchains().cloned().collect()
    }

    pub async fn load_balancer(&self, id: &str) -> Option<LoadBalancer> {
        self.inner.state.read().await.store.load_balancer(id)
    }

    pub async fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.inner.state.read().await.store.load_balancers()
    }

    pub async fn load_balancers_by_owner(&self, user_id: &str) -> Vec<LoadBalancer> {
        self.inner
            .state
            .read()
            .await
            .store
            .load_balancers_by_owner(user_id)
    }

    pub async fn pay_plan(&self, plan_type: &PayPlanType) -> Option<PayPlan> {
        self.inner.state.read().await.store.pay_plan(plan_type).cloned()
    }

    pub async fn pay_plans(&self) -> Vec<PayPlan> {
        let state = self.inner.state.read().await;
        state.store.pay_plans().cloned().collect()
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Decode and apply one change notification.
    ///
    /// Undecodable payloads are logged and dropped; untracked tables are
    /// ignored. Neither touches the cache.
    pub async fn apply(&self, notification: Notification) -> ApplyOutcome {
        let change = match notification.decode() {
            Ok(Some(change)) => change,
            Ok(None) => {
                tracing::trace!(table = %notification.table, "Notification for untracked table ignored");
                return ApplyOutcome::Ignored;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    table = %notification.table,
                    action = ?notification.action,
                    "Dropping undecodable notification"
                );
                return ApplyOutcome::Dropped;
            }
        };

        let outcome = self.mutate(|state| state.apply_change(notification.action, change)).await;
        tracing::debug!(
            table = %notification.table,
            action = ?notification.action,
            outcome = ?outcome,
            "Notification applied"
        );
        outcome
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut CacheState) -> T) -> T {
        let mut state = self.inner.state.write().await;
        f(&mut state)
    }

    pub async fn insert_application(&self, app: Application) -> ApplyOutcome {
        self.mutate(|state| state.insert_application(app)).await
    }

    pub async fn update_application(&self, app: Application) -> ApplyOutcome {
        self.mutate(|state| state.update_application(app)).await
    }

    pub async fn set_app_limit(&self, row: AppLimitRow) -> ApplyOutcome {
        self.mutate(|state| state.set_app_limit(row)).await
    }

    pub async fn set_gateway_aat(&self, row: GatewayAatRow) -> ApplyOutcome {
        self.mutate(|state| state.set_gateway_aat(row)).await
    }

    pub async fn set_gateway_settings(&self, row: GatewaySettingsRow) -> ApplyOutcome {
        self.mutate(|state| state.set_gateway_settings(row)).await
    }

    pub async fn set_notification_settings(&self, row: NotificationSettingsRow) -> ApplyOutcome {
        self.mutate(|state| state.set_notification_settings(row)).await
    }

    pub async fn insert_blockchain(&self, blockchain: Blockchain) -> ApplyOutcome {
        self.mutate(|state| state.insert_blockchain(blockchain)).await
    }

    pub async fn update_blockchain(&self, blockchain: Blockchain) -> ApplyOutcome {
        self.mutate(|state| state.update_blockchain(blockchain)).await
    }

    pub async fn set_sync_check_options(&self, row: SyncCheckOptionsRow) -> ApplyOutcome {
        self.mutate(|state| state.set_sync_check_options(row)).await
    }

    pub async fn insert_redirect(&self, redirect: Redirect) -> ApplyOutcome {
        self.mutate(|state| state.insert_redirect(redirect)).await
    }

    pub async fn insert_load_balancer(&self, lb: LoadBalancer) -> ApplyOutcome {
        self.mutate(|state| state.insert_load_balancer(lb)).await
    }

    pub async fn update_load_balancer(&self, lb: LoadBalancer) -> ApplyOutcome {
        self.mutate(|state| state.update_load_balancer(lb)).await
    }

    pub async fn set_sticky_options(&self, row: StickyOptionsRow) -> ApplyOutcome {
        self.mutate(|state| state.set_sticky_options(row)).await
    }

    pub async fn insert_lb_app(&self, lb_app: LbApp) -> ApplyOutcome {
        self.mutate(|state| state.insert_lb_app(lb_app)).await
    }
}
