//! Portal Core - Entity Types and Source Contracts
//!
//! Pure data structures shared by the cache and its collaborators: the
//! entities kept in cache, the child rows and notifications delivered by the
//! change feed, the contracts of the source of truth, errors, and
//! configuration. This crate contains no cache logic.

use chrono::{DateTime, Utc};

pub mod config;
pub mod entities;
pub mod error;
pub mod notification;
pub mod rows;
pub mod source;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use config::CacheConfig;
pub use entities::{
    AppLimit, AppStatus, Application, Blockchain, GatewayAat, GatewaySettings, LbApp,
    LoadBalancer, NotificationSettings, PayPlan, PayPlanType, Redirect, StickyOptions,
    SyncCheckOptions, WhitelistContract, WhitelistMethod,
};
pub use error::{
    Collection, ConfigError, DecodeError, PortalError, PortalResult, ReloadError, SourceError,
};
pub use notification::{Action, Change, Notification, Table};
pub use rows::{
    AppLimitRow, GatewayAatRow, GatewaySettingsRow, NotificationSettingsRow, StickyOptionsRow,
    SyncCheckOptionsRow,
};
pub use source::{ChangeFeed, SourceReader};
