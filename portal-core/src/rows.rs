//! Child rows as delivered by the change feed.
//!
//! A child row carries the key of the entity it belongs to next to its value.
//! The key only routes the row; [`into_parts`](AppLimitRow::into_parts) splits
//! it off so the stored value never carries a second copy of the parent key.

use crate::entities::{
    AppLimit, GatewayAat, GatewaySettings, NotificationSettings, StickyOptions, SyncCheckOptions,
};
use serde::{Deserialize, Serialize};

/// Limit row keyed by application ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppLimitRow {
    #[serde(rename = "id", alias = "appID", default)]
    pub application_id: String,
    #[serde(flatten)]
    pub limit: AppLimit,
}

impl AppLimitRow {
    pub fn into_parts(self) -> (String, AppLimit) {
        (self.application_id, self.limit)
    }
}

/// Gateway AAT row keyed by application ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayAatRow {
    #[serde(rename = "id", alias = "appID", default)]
    pub application_id: String,
    #[serde(flatten)]
    pub aat: GatewayAat,
}

impl GatewayAatRow {
    pub fn into_parts(self) -> (String, GatewayAat) {
        (self.application_id, self.aat)
    }
}

/// Gateway settings row keyed by application ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewaySettingsRow {
    #[serde(rename = "id", alias = "appID", default)]
    pub application_id: String,
    #[serde(flatten)]
    pub settings: GatewaySettings,
}

impl GatewaySettingsRow {
    pub fn into_parts(self) -> (String, GatewaySettings) {
        (self.application_id, self.settings)
    }
}

/// Notification settings row keyed by application ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationSettingsRow {
    #[serde(rename = "id", alias = "appID", default)]
    pub application_id: String,
    #[serde(flatten)]
    pub settings: NotificationSettings,
}

impl NotificationSettingsRow {
    pub fn into_parts(self) -> (String, NotificationSettings) {
        (self.application_id, self.settings)
    }
}

/// Sync check options row keyed by blockchain ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncCheckOptionsRow {
    #[serde(rename = "blockchainID", default)]
    pub blockchain_id: String,
    #[serde(flatten)]
    pub options: SyncCheckOptions,
}

impl SyncCheckOptionsRow {
    pub fn into_parts(self) -> (String, SyncCheckOptions) {
        (self.blockchain_id, self.options)
    }
}

/// Sticky options row keyed by load balancer ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StickyOptionsRow {
    #[serde(rename = "id", alias = "lbID", default)]
    pub load_balancer_id: String,
    #[serde(flatten)]
    pub options: StickyOptions,
}

impl StickyOptionsRow {
    pub fn into_parts(self) -> (String, StickyOptions) {
        (self.load_balancer_id, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PayPlanType;
    use serde_json::json;

    #[test]
    fn test_app_limit_row_splits_key_from_value() {
        let row: AppLimitRow = serde_json::from_value(json!({
            "id": "app-1",
            "payPlan": { "planType": "ENTERPRISE", "dailyLimit": 0 },
            "customLimit": 2000000,
        }))
        .unwrap();

        let (app_id, limit) = row.into_parts();
        assert_eq!(app_id, "app-1");
        assert_eq!(limit.pay_plan.plan_type, PayPlanType::Enterprise);
        assert_eq!(limit.custom_limit, 2_000_000);
    }

    #[test]
    fn test_sync_check_options_row_is_keyed_by_blockchain() {
        let row: SyncCheckOptionsRow = serde_json::from_value(json!({
            "blockchainID": "0021",
            "path": "/v1/query/height",
            "resultKey": "height",
            "allowance": 2,
        }))
        .unwrap();

        let (blockchain_id, options) = row.into_parts();
        assert_eq!(blockchain_id, "0021");
        assert_eq!(options.result_key, "height");
        assert_eq!(options.allowance, 2);
    }

    #[test]
    fn test_sticky_options_row_accepts_lb_id_alias() {
        let row: StickyOptionsRow =
            serde_json::from_value(json!({ "lbID": "lb-9", "stickyMax": 5 })).unwrap();
        assert_eq!(row.load_balancer_id, "lb-9");
        assert_eq!(row.options.sticky_max, 5);
    }
}
