//! Change notifications emitted by the source of truth.
//!
//! A [`Notification`] names the table a row changed in, the action, and the
//! row itself as raw JSON. [`Notification::decode`] turns the row into a typed
//! [`Change`] according to the table.

use crate::entities::{Application, Blockchain, LbApp, LoadBalancer, Redirect};
use crate::error::DecodeError;
use crate::rows::{
    AppLimitRow, GatewayAatRow, GatewaySettingsRow, NotificationSettingsRow, StickyOptionsRow,
    SyncCheckOptionsRow,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Source table a notification originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Applications,
    AppLimits,
    GatewayAat,
    GatewaySettings,
    NotificationSettings,
    Blockchains,
    Redirects,
    SyncCheckOptions,
    #[serde(rename = "loadbalancers")]
    LoadBalancers,
    StickinessOptions,
    LbApps,
    /// Any table the cache does not track.
    #[serde(other)]
    Unknown,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Applications => "applications",
            Table::AppLimits => "app_limits",
            Table::GatewayAat => "gateway_aat",
            Table::GatewaySettings => "gateway_settings",
            Table::NotificationSettings => "notification_settings",
            Table::Blockchains => "blockchains",
            Table::Redirects => "redirects",
            Table::SyncCheckOptions => "sync_check_options",
            Table::LoadBalancers => "loadbalancers",
            Table::StickinessOptions => "stickiness_options",
            Table::LbApps => "lb_apps",
            Table::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Update,
}

/// One row-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub table: Table,
    pub action: Action,
    pub data: Value,
}

/// Typed payload of a decoded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Application(Application),
    AppLimit(AppLimitRow),
    GatewayAat(GatewayAatRow),
    GatewaySettings(GatewaySettingsRow),
    NotificationSettings(NotificationSettingsRow),
    Blockchain(Blockchain),
    Redirect(Redirect),
    SyncCheckOptions(SyncCheckOptionsRow),
    LoadBalancer(LoadBalancer),
    StickyOptions(StickyOptionsRow),
    LbApp(LbApp),
}

impl Notification {
    pub fn new(table: Table, action: Action, data: Value) -> Self {
        Self {
            table,
            action,
            data,
        }
    }

    /// Build a notification from any serializable row.
    pub fn from_row<T: Serialize>(
        table: Table,
        action: Action,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(table, action, serde_json::to_value(row)?))
    }

    /// Decode the payload according to the table.
    ///
    /// Returns `Ok(None)` for tables the cache does not track.
    pub fn decode(&self) -> Result<Option<Change>, DecodeError> {
        let change = match self.table {
            Table::Applications => Change::Application(self.decode_as()?),
            Table::AppLimits => Change::AppLimit(self.decode_as()?),
            Table::GatewayAat => Change::GatewayAat(self.decode_as()?),
            Table::GatewaySettings => Change::GatewaySettings(self.decode_as()?),
            Table::NotificationSettings => Change::NotificationSettings(self.decode_as()?),
            Table::Blockchains => Change::Blockchain(self.decode_as()?),
            Table::Redirects => Change::Redirect(self.decode_as()?),
            Table::SyncCheckOptions => Change::SyncCheckOptions(self.decode_as()?),
            Table::LoadBalancers => Change::LoadBalancer(self.decode_as()?),
            Table::StickinessOptions => Change::StickyOptions(self.decode_as()?),
            Table::LbApps => Change::LbApp(self.decode_as()?),
            Table::Unknown => return Ok(None),
        };
        Ok(Some(change))
    }

    fn decode_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        T::deserialize(&self.data).map_err(|e| DecodeError {
            table: self.table,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_decodes_wire_names() {
        let n: Notification = serde_json::from_value(json!({
            "table": "loadbalancers",
            "action": "INSERT",
            "data": { "id": "lb-1", "userID": "u-1" },
        }))
        .unwrap();

        assert_eq!(n.table, Table::LoadBalancers);
        assert_eq!(n.action, Action::Insert);
        match n.decode().unwrap() {
            Some(Change::LoadBalancer(lb)) => assert_eq!(lb.user_id, "u-1"),
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_table_decodes_to_none() {
        let n: Notification = serde_json::from_value(json!({
            "table": "user_sessions",
            "action": "UPDATE",
            "data": {},
        }))
        .unwrap();

        assert_eq!(n.table, Table::Unknown);
        assert!(n.decode().unwrap().is_none());
    }

    #[test]
    fn test_shape_mismatch_is_a_decode_error() {
        let n = Notification::new(Table::Applications, Action::Insert, json!("not an application"));
        let err = n.decode().unwrap_err();
        assert_eq!(err.table, Table::Applications);
    }

    #[test]
    fn test_from_row_roundtrips_lb_app() {
        let n = Notification::from_row(Table::LbApps, Action::Insert, &LbApp::new("lb", "app"))
            .unwrap();
        assert_eq!(n.data, json!({ "lbID": "lb", "appID": "app" }));
        assert_eq!(n.decode().unwrap(), Some(Change::LbApp(LbApp::new("lb", "app"))));
    }
}
