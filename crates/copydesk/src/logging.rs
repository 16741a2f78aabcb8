//! Process-wide tracing setup.
//!
//! Library code logs through `tracing` (pipeline, stages) and the `log`
//! facade (store, service); the subscriber installed here receives both.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "COPYDESK_LOG";

/// Builds the filter: `COPYDESK_LOG` when set and valid, else the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| ConfigError::Validation {
        message: format!("Invalid log level '{}': {}", level, e),
    })
}

/// Installs the global subscriber. Returns `Ok(false)` when one is already
/// installed (tests, embedding applications).
pub fn init(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
