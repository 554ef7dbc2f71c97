//! Error types for portal cache operations

use crate::notification::Table;
use std::fmt;
use thiserror::Error;

/// Entity collection read from the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    PayPlans,
    Applications,
    Blockchains,
    Redirects,
    LoadBalancers,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::PayPlans => "pay_plans",
            Collection::Applications => "applications",
            Collection::Blockchains => "blockchains",
            Collection::Redirects => "redirects",
            Collection::LoadBalancers => "load_balancers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-of-truth read errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Read of {collection} failed: {reason}")]
    ReadFailed {
        collection: Collection,
        reason: String,
    },

    #[error("Source unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A snapshot reload that stopped at `step`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Reload failed while loading {step}: {source}")]
pub struct ReloadError {
    pub step: Collection,
    #[source]
    pub source: SourceError,
}

/// A change-feed payload that does not match its table's shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Payload for table {table} could not be decoded: {reason}")]
pub struct DecodeError {
    pub table: Table,
    pub reason: String,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Tracing subscriber could not be installed: {reason}")]
    SubscriberInit { reason: String },
}

/// Master error type for the portal cache.
#[derive(Debug, Clone, Error)]
pub enum PortalError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Reload(#[from] ReloadError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for portal cache operations.
pub type PortalResult<T> = Result<T, PortalError>;

// =============================================================================
// TESTS
// =============================================================================
