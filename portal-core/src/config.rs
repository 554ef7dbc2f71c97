//! Cache configuration
//!
//! Loaded from environment variables with defaults suitable for development.

use crate::error::ConfigError;
use std::time::Duration;

/// Default period between full snapshot reloads.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "portal_cache=info,info";

/// Runtime configuration of the cache service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How often the periodic refresh task reloads the full snapshot.
    pub refresh_interval: Duration,

    /// Tracing filter directive used when `RUST_LOG` is absent.
    pub log_filter: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PORTAL_CACHE_REFRESH_INTERVAL_SECS`: reload period (default: 300)
    /// - `PORTAL_CACHE_LOG_FILTER`: fallback tracing filter (default: "portal_cache=info,info")
    /// - `PORTAL_CACHE_LOG_JSON`: "true" or "false" (default: false)
    pub fn from_env() -> Self {
        let refresh_interval = std::env::var("PORTAL_CACHE_REFRESH_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL);

        let log_filter = std::env::var("PORTAL_CACHE_LOG_FILTER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_json = std::env::var("PORTAL_CACHE_LOG_JSON")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            refresh_interval,
            log_filter,
            log_json,
        }
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the fallback log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Enable or disable JSON log output.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.log_json = enabled;
        self
    }

    /// Reject values the refresh task cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
