//! Pending reference buffer.
//!
//! Child values whose parent entity is not in the store yet wait here, keyed
//! by the parent's ID. Single-valued children keep the latest value;
//! redirects and load balancer associations accumulate.

use crate::store::EntityStore;
use portal_core::{
    AppLimit, GatewayAat, GatewaySettings, NotificationSettings, Redirect, StickyOptions,
    SyncCheckOptions,
};
use std::collections::{HashMap, HashSet};

/// Buffered children of one application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingApplicationChildren {
    pub limit: Option<AppLimit>,
    pub gateway_aat: Option<GatewayAat>,
    pub gateway_settings: Option<GatewaySettings>,
    pub notification_settings: Option<NotificationSettings>,
}

/// Buffered children of one blockchain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBlockchainChildren {
    pub sync_check_options: Option<SyncCheckOptions>,
    pub redirects: Vec<Redirect>,
}

/// Buffered children of one load balancer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingLoadBalancerChildren {
    pub sticky_options: Option<StickyOptions>,
    pub application_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    app_limits: HashMap<String, AppLimit>,
    gateway_aats: HashMap<String, GatewayAat>,
    gateway_settings: HashMap<String, GatewaySettings>,
    notification_settings: HashMap<String, NotificationSettings>,
    sync_check_options: HashMap<String, SyncCheckOptions>,
    redirects: HashMap<String, Vec<Redirect>>,
    sticky_options: HashMap<String, StickyOptions>,
    lb_apps: HashMap<String, Vec<String>>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // === Buffering ===

    pub fn buffer_app_limit(&mut self, application_id: String, limit: AppLimit) {
        self.app_limits.insert(application_id, limit);
    }

    pub fn buffer_gateway_aat(&mut self, application_id: String, aat: GatewayAat) {
        self.gateway_aats.insert(application_id, aat);
    }

    pub fn buffer_gateway_settings(&mut self, application_id: String, settings: GatewaySettings) {
        self.gateway_settings.insert(application_id, settings);
    }

    pub fn buffer_notification_settings(
        &mut self,
        application_id: String,
        settings: NotificationSettings,
    ) {
        self.notification_settings.insert(application_id, settings);
    }

    pub fn buffer_sync_check_options(&mut self, blockchain_id: String, options: SyncCheckOptions) {
        self.sync_check_options.insert(blockchain_id, options);
    }

    pub fn buffer_redirect(&mut self, redirect: Redirect) {
        self.redirects
            .entry(redirect.blockchain_id.clone())
            .or_default()
            .push(redirect);
    }

    pub fn buffer_sticky_options(&mut self, load_balancer_id: String, options: StickyOptions) {
        self.sticky_options.insert(load_balancer_id, options);
    }

    pub fn buffer_lb_app(&mut self, load_balancer_id: String, application_id: String) {
        let ids = self.lb_apps.entry(load_balancer_id).or_default();
        if !ids.contains(&application_id) {
            ids.push(application_id);
        }
    }

    // === Resolution ===

    /// Remove and return everything buffered for an application.
    pub fn take_application_children(&mut self, application_id: &str) -> PendingApplicationChildren {
        PendingApplicationChildren {
            limit: self.app_limits.remove(application_id),
            gateway_aat: self.gateway_aats.remove(application_id),
            gateway_settings: self.gateway_settings.remove(application_id),
            notification_settings: self.notification_settings.remove(application_id),
        }
    }

    /// Remove and return everything buffered for a blockchain.
    pub fn take_blockchain_children(&mut self, blockchain_id: &str) -> PendingBlockchainChildren {
        PendingBlockchainChildren {
            sync_check_options: self.sync_check_options.remove(blockchain_id),
            redirects: self.redirects.remove(blockchain_id).unwrap_or_default(),
        }
    }

    /// Remove and return everything buffered for a load balancer.
    pub fn take_load_balancer_children(
        &mut self,
        load_balancer_id: &str,
    ) -> PendingLoadBalancerChildren {
        PendingLoadBalancerChildren {
            sticky_options: self.sticky_options.remove(load_balancer_id),
            application_ids: self.lb_apps.remove(load_balancer_id).unwrap_or_default(),
        }
    }

    /// Drop entries whose parent is present in `store`.
    ///
    /// Used after a snapshot swap: the snapshot already carries the source's
    /// view of those children. Returns how many entries were dropped.
    pub fn discard_resolved(&mut self, store: &EntityStore) -> usize {
        let before = self.len();

        self.app_limits.retain(|id, _| !store.contains_application(id));
        self.gateway_aats.retain(|id, _| !store.contains_application(id));
        self.gateway_settings.retain(|id, _| !store.contains_application(id));
        self.notification_settings
            .retain(|id, _| !store.contains_application(id));
        self.sync_check_options
            .retain(|id, _| store.blockchain(id).is_none());
        self.redirects.retain(|id, _| store.blockchain(id).is_none());
        self.sticky_options
            .retain(|id, _| !store.contains_load_balancer(id));
        self.lb_apps.retain(|id, _| !store.contains_load_balancer(id));

        before - self.len()
    }

    /// Whether anything is buffered under `parent_id`, for any child type.
    pub fn contains_parent(&self, parent_id: &str) -> bool {
        self.app_limits.contains_key(parent_id)
            || self.gateway_aats.contains_key(parent_id)
            || self.gateway_settings.contains_key(parent_id)
            || self.notification_settings.contains_key(parent_id)
            || self.sync_check_options.contains_key(parent_id)
            || self.redirects.contains_key(parent_id)
            || self.sticky_options.contains_key(parent_id)
            || self.lb_apps.contains_key(parent_id)
    }

    /// Distinct parent IDs with at least one buffered child.
    pub fn parent_count(&self) -> usize {
        let mut parents: HashSet<&str> = HashSet::new();
        parents.extend(self.app_limits.keys().map(String::as_str));
        parents.extend(self.gateway_aats.keys().map(String::as_str));
        parents.extend(self.gateway_settings.keys().map(String::as_str));
        parents.extend(self.notification_settings.keys().map(String::as_str));
        parents.extend(self.sync_check_options.keys().map(String::as_str));
        parents.extend(self.redirects.keys().map(String::as_str));
        parents.extend(self.sticky_options.keys().map(String::as_str));
        parents.extend(self.lb_apps.keys().map(String::as_str));
        parents.len()
    }

    /// Number of buffered entries, one per parent and child type.
    pub fn len(&self) -> usize {
        self.app_limits.len()
            + self.gateway_aats.len()
            + self.gateway_settings.len()
            + self.notification_settings.len()
            + self.sync_check_options.len()
            + self.redirects.len()
            + self.sticky_options.len()
            + self.lb_apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
