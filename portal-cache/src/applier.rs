//! Mutation applier.
//!
//! One handler per entity and child type, all operating on [`CacheState`]
//! while the caller holds the write lock. Child values whose parent is not in
//! the store yet go to the pending buffer and are merged when the parent is
//! inserted, so handlers give the same final state in any arrival order.

use crate::pending::PendingBuffer;
use crate::store::EntityStore;
use portal_core::{
    Action, AppLimit, AppLimitRow, Application, Blockchain, Change, GatewayAatRow,
    GatewaySettingsRow, LbApp, LoadBalancer, NotificationSettingsRow, Redirect, StickyOptionsRow,
    SyncCheckOptionsRow,
};
use tracing::{debug, trace, warn};

/// Result of applying one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The store was mutated.
    Applied,
    /// The parent is unknown; the value waits in the pending buffer.
    Buffered,
    /// The payload was rejected and nothing changed.
    Dropped,
    /// The change has no effect (missing entity, unsupported action).
    Ignored,
}

/// Everything guarded by the cache lock.
#[derive(Debug, Default)]
pub struct CacheState {
    pub(crate) store: EntityStore,
    pub(crate) pending: PendingBuffer,
}

/// Set the plan quota on `limit` from the pay plan table.
///
/// Custom (enterprise) limits are left untouched. Returns false when the
/// plan type is not in the table.
pub(crate) fn derive_quota(store: &EntityStore, limit: &mut AppLimit) -> bool {
    if limit.pay_plan.plan_type.is_custom() {
        return true;
    }
    match store.pay_plan(&limit.pay_plan.plan_type) {
        Some(plan) => {
            limit.pay_plan.daily_limit = plan.daily_limit;
            true
        }
        None => false,
    }
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly loaded store.
    ///
    /// Buffered children whose parent is part of the new store are dropped.
    pub(crate) fn replace_store(&mut self, store: EntityStore) -> usize {
        self.store = store;
        self.pending.discard_resolved(&self.store)
    }

    /// Route a decoded change to its handler.
    ///
    /// A change whose entity or parent key is empty is dropped.
    pub fn apply_change(&mut self, action: Action, change: Change) -> ApplyOutcome {
        if let Some(field) = empty_key(&change) {
            warn!(?action, field, "Change has an empty key, dropping");
            return ApplyOutcome::Dropped;
        }

        match (action, change) {
            (Action::Insert, Change::Application(app)) => self.insert_application(app),
            (Action::Update, Change::Application(app)) => self.update_application(app),
            (_, Change::AppLimit(row)) => self.set_app_limit(row),
            (_, Change::GatewayAat(row)) => self.set_gateway_aat(row),
            (_, Change::GatewaySettings(row)) => self.set_gateway_settings(row),
            (_, Change::NotificationSettings(row)) => self.set_notification_settings(row),
            (Action::Insert, Change::Blockchain(blockchain)) => self.insert_blockchain(blockchain),
            (Action::Update, Change::Blockchain(blockchain)) => self.update_blockchain(blockchain),
            (_, Change::SyncCheckOptions(row)) => self.set_sync_check_options(row),
            (Action::Insert, Change::Redirect(redirect)) => self.insert_redirect(redirect),
            (Action::Insert, Change::LoadBalancer(lb)) => self.insert_load_balancer(lb),
            (Action::Update, Change::LoadBalancer(lb)) => self.update_load_balancer(lb),
            (_, Change::StickyOptions(row)) => self.set_sticky_options(row),
            (Action::Insert, Change::LbApp(lb_app)) => self.insert_lb_app(lb_app),
            (Action::Update, Change::Redirect(_)) | (Action::Update, Change::LbApp(_)) => {
                trace!("Update on append-only table ignored");
                ApplyOutcome::Ignored
            }
        }
    }

    // ========================================================================
    // APPLICATIONS
    // ========================================================================

    pub fn insert_application(&mut self, mut app: Application) -> ApplyOutcome {
        let children = self.pending.take_application_children(&app.id);
        if let Some(limit) = children.limit {
            app.limit = limit;
        }
        if let Some(aat) = children.gateway_aat {
            app.gateway_aat = aat;
        }
        if let Some(settings) = children.gateway_settings {
            app.gateway_settings = settings;
        }
        if let Some(settings) = children.notification_settings {
            app.notification_settings = settings;
        }

        if !derive_quota(&self.store, &mut app.limit) {
            debug!(
                application_id = %app.id,
                plan_type = %app.limit.pay_plan.plan_type,
                "Application plan not in pay plan table, quota left as delivered"
            );
        }

        debug!(application_id = %app.id, user_id = %app.user_id, "Application inserted");
        self.store.put_application(app);
        ApplyOutcome::Applied
    }

    pub fn update_application(&mut self, incoming: Application) -> ApplyOutcome {
        let Self { store, .. } = self;

        let Some(mut limit) = store.application(&incoming.id).map(|a| a.limit.clone()) else {
            debug!(application_id = %incoming.id, "Update for unknown application ignored");
            return ApplyOutcome::Ignored;
        };
        derive_quota(store, &mut limit);

        store.update_application(&incoming.id, |app| {
            app.user_id = incoming.user_id;
            app.name = incoming.name;
            app.status = incoming.status;
            app.limit = limit;
            app.first_date_surpassed = incoming.first_date_surpassed;
            app.updated_at = incoming.updated_at;
        });
        ApplyOutcome::Applied
    }

    pub fn set_app_limit(&mut self, row: AppLimitRow) -> ApplyOutcome {
        let (application_id, mut limit) = row.into_parts();

        if !derive_quota(&self.store, &mut limit) {
            warn!(
                application_id = %application_id,
                plan_type = %limit.pay_plan.plan_type,
                "Limit names a pay plan that is not loaded, dropping"
            );
            return ApplyOutcome::Dropped;
        }

        if self
            .store
            .update_application(&application_id, |app| app.limit = limit.clone())
        {
            ApplyOutcome::Applied
        } else {
            self.pending.buffer_app_limit(application_id, limit);
            ApplyOutcome::Buffered
        }
    }

    pub fn set_gateway_aat(&mut self, row: GatewayAatRow) -> ApplyOutcome {
        let (application_id, aat) = row.into_parts();
        if self
            .store
            .update_application(&application_id, |app| app.gateway_aat = aat.clone())
        {
            ApplyOutcome::Applied
        } else {
            self.pending.buffer_gateway_aat(application_id, aat);
            ApplyOutcome::Buffered
        }
    }

    pub fn set_gateway_settings(&mut self, row: GatewaySettingsRow) -> ApplyOutcome {
        let (application_id, settings) = row.into_parts();
        if self
            .store
            .update_application(&application_id, |app| app.gateway_settings = settings.clone())
        {
            ApplyOutcome::Applied
        } else {
            self.pending.buffer_gateway_settings(application_id, settings);
            ApplyOutcome::Buffered
        }
    }

    pub fn set_notification_settings(&mut self, row: NotificationSettingsRow) -> ApplyOutcome {
        let (application_id, settings) = row.into_parts();
        if self
            .store
            .update_application(&application_id, |app| app.notification_settings = settings)
        {
            ApplyOutcome::Applied
        } else {
            self.pending
                .buffer_notification_settings(application_id, settings);
            ApplyOutcome::Buffered
        }
    }

    // ========================================================================
    // BLOCKCHAINS
    // ========================================================================

    pub fn insert_blockchain(&mut self, mut blockchain: Blockchain) -> ApplyOutcome {
        let children = self.pending.take_blockchain_children(&blockchain.id);
        if let Some(options) = children.sync_check_options {
            blockchain.sync_check_options = options;
        }
        blockchain.redirects.extend(children.redirects);

        debug!(blockchain_id = %blockchain.id, "Blockchain inserted");
        self.store.put_blockchain(blockchain);
        ApplyOutcome::Applied
    }

    pub fn update_blockchain(&mut self, incoming: Blockchain) -> ApplyOutcome {
        match self.store.blockchain_mut(&incoming.id) {
            Some(blockchain) => {
                blockchain.active = incoming.active;
                blockchain.updated_at = incoming.updated_at;
                ApplyOutcome::Applied
            }
            None => {
                debug!(blockchain_id = %incoming.id, "Update for unknown blockchain ignored");
                ApplyOutcome::Ignored
            }
        }
    }

    pub fn set_sync_check_options(&mut self, row: SyncCheckOptionsRow) -> ApplyOutcome {
        let (blockchain_id, options) = row.into_parts();
        match self.store.blockchain_mut(&blockchain_id) {
            Some(blockchain) => {
                blockchain.sync_check_options = options;
                ApplyOutcome::Applied
            }
            None => {
                self.pending.buffer_sync_check_options(blockchain_id, options);
                ApplyOutcome::Buffered
            }
        }
    }

    pub fn insert_redirect(&mut self, redirect: Redirect) -> ApplyOutcome {
        match self.store.blockchain_mut(&redirect.blockchain_id) {
            Some(blockchain) => {
                blockchain.redirects.push(redirect);
                ApplyOutcome::Applied
            }
            None => {
                self.pending.buffer_redirect(redirect);
                ApplyOutcome::Buffered
            }
        }
    }

    // ========================================================================
    // LOAD BALANCERS
    // ========================================================================

    pub fn insert_load_balancer(&mut self, mut lb: LoadBalancer) -> ApplyOutcome {
        let children = self.pending.take_load_balancer_children(&lb.id);
        if let Some(options) = children.sticky_options {
            lb.sticky_options = options;
        }

        let lb_id = lb.id.clone();
        let dangling = self.store.put_load_balancer(lb, children.application_ids);
        if dangling > 0 {
            debug!(
                load_balancer_id = %lb_id,
                dangling,
                "Load balancer references applications not loaded yet"
            );
        }
        debug!(load_balancer_id = %lb_id, "Load balancer inserted");
        ApplyOutcome::Applied
    }

    pub fn update_load_balancer(&mut self, incoming: LoadBalancer) -> ApplyOutcome {
        let id = incoming.id.clone();
        let updated = self.store.update_load_balancer(&id, |lb| {
            lb.user_id = incoming.user_id;
            lb.name = incoming.name;
            lb.sticky_options = incoming.sticky_options;
            lb.updated_at = incoming.updated_at;
        });

        if updated {
            ApplyOutcome::Applied
        } else {
            debug!(load_balancer_id = %id, "Update for unknown load balancer ignored");
            ApplyOutcome::Ignored
        }
    }

    pub fn set_sticky_options(&mut self, row: StickyOptionsRow) -> ApplyOutcome {
        let (load_balancer_id, options) = row.into_parts();
        if self
            .store
            .update_load_balancer(&load_balancer_id, |lb| lb.sticky_options = options.clone())
        {
            ApplyOutcome::Applied
        } else {
            self.pending.buffer_sticky_options(load_balancer_id, options);
            ApplyOutcome::Buffered
        }
    }

    pub fn insert_lb_app(&mut self, lb_app: LbApp) -> ApplyOutcome {
        if self.store.attach_application(&lb_app.lb_id, &lb_app.app_id) {
            ApplyOutcome::Applied
        } else {
            self.pending.buffer_lb_app(lb_app.lb_id, lb_app.app_id);
            ApplyOutcome::Buffered
        }
    }
}

/// Name of the routing key field of `change` when that key is empty.
fn empty_key(change: &Change) -> Option<&'static str> {
    let (field, value) = match change {
        Change::Application(app) => ("id", app.id.as_str()),
        Change::AppLimit(row) => ("application_id", row.application_id.as_str()),
        Change::GatewayAat(row) => ("application_id", row.application_id.as_str()),
        Change::GatewaySettings(row) => ("application_id", row.application_id.as_str()),
        Change::NotificationSettings(row) => ("application_id", row.application_id.as_str()),
        Change::Blockchain(blockchain) => ("id", blockchain.id.as_str()),
        Change::Redirect(redirect) => ("blockchain_id", redirect.blockchain_id.as_str()),
        Change::SyncCheckOptions(row) => ("blockchain_id", row.blockchain_id.as_str()),
        Change::LoadBalancer(lb) => ("id", lb.id.as_str()),
        Change::StickyOptions(row) => ("load_balancer_id", row.load_balancer_id.as_str()),
        Change::LbApp(lb_app) if lb_app.lb_id.is_empty() => ("lb_id", ""),
        Change::LbApp(lb_app) => ("app_id", lb_app.app_id.as_str()),
    };
    value.is_empty().then_some(field)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use portal_core::{PayPlan, PayPlanType};
    use proptest::prelude::*;

    fn plan_type() -> impl Strategy<Value = PayPlanType> {
        prop_oneof![
            Just(PayPlanType::FreetierV0),
            Just(PayPlanType::PayAsYouGoV0),
            Just(PayPlanType::Enterprise),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: a derived quota equals the plan table value for standard
        /// plans and the custom limit for enterprise ones.
        #[test]
        fn prop_derived_quota_matches_plan_table(
            plan in plan_type(),
            table_quota in 0i64..1_000_000,
            custom in 0i64..5_000_000,
        ) {
            let mut store = EntityStore::new();
            store.put_pay_plan(PayPlan { plan_type: PayPlanType::FreetierV0, daily_limit: table_quota });
            store.put_pay_plan(PayPlan { plan_type: PayPlanType::PayAsYouGoV0, daily_limit: table_quota });

            let mut app = Application::default();
            app.limit = AppLimit {
                pay_plan: PayPlan { plan_type: plan.clone(), daily_limit: -1 },
                custom_limit: custom,
            };

            prop_assert!(derive_quota(&store, &mut app.limit));
            if plan.is_custom() {
                prop_assert_eq!(app.daily_limit(), custom);
            } else {
                prop_assert_eq!(app.daily_limit(), table_quota);
            }
        }
    }
}
