//! Log subscriber setup.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(config);

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
    }
}
