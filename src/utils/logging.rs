//! Subscriber setup for applications embedding the client.
//!
//! The library itself only emits `tracing` events; nothing is printed until
//! the host application installs a subscriber, either its own or the one
//! built here from [`LoggingConfig`].

use crate::config::LoggingConfig;
use crate::error::{MapiError, Result};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, the configured level is the fallback
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_str().to_ascii_lowercase())
    })
}

/// Install a global subscriber.
///
/// # Errors
/// `ConfigError` if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_format {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(config.with_target),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(config.with_target))
            .try_init()
    };

    installed.map_err(|e| {
        MapiError::ConfigError(format!(
            "Logger for {} already initialized: {e}",
            config.app_name
        ))
    })?;

    tracing::debug!(app = %config.app_name, json = config.json_format, "Logging initialized");
    Ok(())
}
