//! Core entity structures
//!
//! Field names serialize the way the source of truth spells them (camelCase,
//! with `...ID` suffixes kept), so change-feed payloads decode directly.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PAY PLANS
// ============================================================================

/// Pay plan discriminator.
///
/// Unknown plan names decode to [`PayPlanType::Other`] so a plan introduced at
/// the source does not break decoding of every application that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PayPlanType {
    #[default]
    FreetierV0,
    PayAsYouGoV0,
    /// Custom plan whose quota is supplied per application.
    Enterprise,
    TestPlanV0,
    TestPlan10K,
    TestPlan90K,
    Other(String),
}

impl PayPlanType {
    pub fn as_str(&self) -> &str {
        match self {
            PayPlanType::FreetierV0 => "FREETIER_V0",
            PayPlanType::PayAsYouGoV0 => "PAY_AS_YOU_GO_V0",
            PayPlanType::Enterprise => "ENTERPRISE",
            PayPlanType::TestPlanV0 => "TEST_PLAN_V0",
            PayPlanType::TestPlan10K => "TEST_PLAN_10K",
            PayPlanType::TestPlan90K => "TEST_PLAN_90K",
            PayPlanType::Other(name) => name,
        }
    }

    /// Whether the quota comes from the application rather than the plan table.
    pub fn is_custom(&self) -> bool {
        matches!(self, PayPlanType::Enterprise)
    }
}

impl From<String> for PayPlanType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "FREETIER_V0" => PayPlanType::FreetierV0,
            "PAY_AS_YOU_GO_V0" => PayPlanType::PayAsYouGoV0,
            "ENTERPRISE" => PayPlanType::Enterprise,
            "TEST_PLAN_V0" => PayPlanType::TestPlanV0,
            "TEST_PLAN_10K" => PayPlanType::TestPlan10K,
            "TEST_PLAN_90K" => PayPlanType::TestPlan90K,
            _ => PayPlanType::Other(value),
        }
    }
}

impl From<PayPlanType> for String {
    fn from(value: PayPlanType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PayPlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan type and its daily relay quota.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayPlan {
    pub plan_type: PayPlanType,
    pub daily_limit: i64,
}

// ============================================================================
// APPLICATIONS
// ============================================================================

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    AwaitingFreetierFunds,
    AwaitingFreetierStake,
    AwaitingFunds,
    AwaitingFundsRemoval,
    AwaitingGracePeriod,
    AwaitingSlotFunds,
    AwaitingSlotStake,
    AwaitingStake,
    AwaitingUnstake,
    Decommissioned,
    #[default]
    InService,
    Orphaned,
    Ready,
    Swappable,
    #[serde(other)]
    Unknown,
}

/// Plan assignment of an application.
///
/// `custom_limit` is only meaningful for [`PayPlanType::Enterprise`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppLimit {
    pub pay_plan: PayPlan,
    pub custom_limit: i64,
}

/// Gateway application authentication token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayAat {
    pub address: String,
    pub application_public_key: String,
    pub application_signature: String,
    pub client_public_key: String,
    pub private_key: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhitelistContract {
    #[serde(rename = "blockchainID")]
    pub blockchain_id: String,
    pub contracts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhitelistMethod {
    #[serde(rename = "blockchainID")]
    pub blockchain_id: String,
    pub methods: Vec<String>,
}

/// Request filtering and secret-key policy for an application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    pub secret_key: String,
    pub secret_key_required: bool,
    pub whitelist_origins: Vec<String>,
    pub whitelist_user_agents: Vec<String>,
    pub whitelist_contracts: Vec<WhitelistContract>,
    pub whitelist_methods: Vec<WhitelistMethod>,
    pub whitelist_blockchains: Vec<String>,
}

/// Usage thresholds the owner wants to be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub signed_up: bool,
    pub quarter: bool,
    pub half: bool,
    pub three_quarters: bool,
    pub full: bool,
}

/// Application - a relay consumer owned by a portal user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub id: String,
    /// Owner. Empty when the application is no longer owned by anyone.
    #[serde(rename = "userID")]
    pub user_id: String,
    pub name: String,
    pub status: AppStatus,
    pub dummy: bool,
    pub first_date_surpassed: Option<Timestamp>,
    #[serde(rename = "gatewayAAT")]
    pub gateway_aat: GatewayAat,
    pub gateway_settings: GatewaySettings,
    pub limit: AppLimit,
    pub notification_settings: NotificationSettings,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Application {
    /// Effective daily quota: the custom limit for enterprise plans, the plan
    /// quota otherwise.
    pub fn daily_limit(&self) -> i64 {
        if self.limit.pay_plan.plan_type.is_custom() {
            self.limit.custom_limit
        } else {
            self.limit.pay_plan.daily_limit
        }
    }

    pub fn has_owner(&self) -> bool {
        !self.user_id.is_empty()
    }
}

// ============================================================================
// BLOCKCHAINS
// ============================================================================

/// Parameters of the sync check performed against a chain's nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncCheckOptions {
    pub body: String,
    pub path: String,
    pub result_key: String,
    pub allowance: i64,
}

/// A domain alias routed to a chain through a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Redirect {
    #[serde(rename = "blockchainID")]
    pub blockchain_id: String,
    pub alias: String,
    pub domain: String,
    #[serde(rename = "loadBalancerID")]
    pub load_balancer_id: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Blockchain - a relay chain served by the gateway.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Blockchain {
    pub id: String,
    pub altruist: String,
    pub blockchain: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    #[serde(rename = "chainIDCheck")]
    pub chain_id_check: String,
    pub description: String,
    pub enforce_result: String,
    pub network: String,
    pub path: String,
    pub sync_check: String,
    pub ticker: String,
    pub blockchain_aliases: Vec<String>,
    pub log_limit_blocks: i64,
    pub request_timeout: i64,
    pub sync_allowance: i64,
    pub active: bool,
    pub redirects: Vec<Redirect>,
    pub sync_check_options: SyncCheckOptions,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

// ============================================================================
// LOAD BALANCERS
// ============================================================================

/// Session stickiness configuration of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StickyOptions {
    pub duration: String,
    pub sticky_origins: Vec<String>,
    pub sticky_max: i64,
    pub stickiness: bool,
}

/// LoadBalancer - a user-facing endpoint spreading relays over applications.
///
/// The source delivers `application_ids`; once the cache has resolved them
/// into `applications` the ID list is left empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub request_timeout: i64,
    pub gigastake: bool,
    pub gigastake_redirect: bool,
    pub sticky_options: StickyOptions,
    #[serde(rename = "applicationIDs")]
    pub application_ids: Vec<String>,
    pub applications: Vec<Application>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl LoadBalancer {
    pub fn has_owner(&self) -> bool {
        !self.user_id.is_empty()
    }
}

/// Association of an application with a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LbApp {
    #[serde(rename = "lbID")]
    pub lb_id: String,
    #[serde(rename = "appID")]
    pub app_id: String,
}

impl LbApp {
    pub fn new(lb_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            lb_id: lb_id.into(),
            app_id: app_id.into(),
        }
    }
}
