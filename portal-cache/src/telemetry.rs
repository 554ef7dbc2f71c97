//! Tracing subscriber setup.

use portal_core::{CacheConfig, ConfigError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `config.log_filter`. Fails if the fallback filter does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &CacheConfig) -> Result<(), ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|e| {
            ConfigError::InvalidValue {
                field: "log_filter".to_string(),
                value: config.log_filter.clone(),
                reason: e.to_string(),
            }
        })?,
    };

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.log_json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigError::SubscriberInit {
            reason: e.to_string(),
        })?;

    tracing::info!(
        log_json = config.log_json,
        refresh_interval_secs = config.refresh_interval.as_secs(),
        "Tracing initialized"
    );

    Ok(())
}
