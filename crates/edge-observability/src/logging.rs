//! Log subscriber installation.

use edge_core::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives for the configured level, unless `RUST_LOG` is set.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

/// Install the global `tracing` subscriber.
///
/// Logs go to stderr, which Spin captures. Returns `false` when a subscriber
/// was already installed; the earlier one stays in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Human => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };

    match result {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
            true
        }
        Err(_) => false,
    }
}
