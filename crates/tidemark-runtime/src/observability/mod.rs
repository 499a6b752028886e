//! Logging setup.

use tidemark_core::config::LoggingConfig;
use tidemark_core::error::{MigrateError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config)?);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| MigrateError::Config(format!("Failed to install logger: {}", e)))
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| MigrateError::Config(format!("Invalid log level '{}': {}", config.level, e)))
}
