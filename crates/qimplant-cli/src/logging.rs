//! Tracing subscriber setup.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Output goes to stderr; stdout is reserved for reports and diagnostics.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "json" => subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).try_init(),
        "compact" => subscriber.compact().try_init(),
        _ => subscriber.pretty().try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
