//! Structured logging infrastructure for Commander.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.
//! Components log with structured fields (`task_id`, `platform_id`,
//! `verdict`, `tick`) rather than interpolated strings.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level. Calling this more than once is a
/// no-op, so tests and embedding binaries can call it freely.
///
/// # Example
/// ```no_run
/// use commander_core::logging;
///
/// logging::init();
/// tracing::info!("Application started");
/// ```
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

/// Initialize the logging system with JSON output for production environments.
///
/// # Example
/// ```no_run
/// use commander_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "commander-node", "Service started");
/// ```
pub fn init_json() {
    let _ = tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .try_init();
}

/// Initialize from the `[logging]` config section. `RUST_LOG` still wins.
pub fn init_from_config(config: &LoggingConfig) {
    let filter = filter_or(&config.level);
    if config.json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        init();
        init();
        init_json();
        init_from_config(&LoggingConfig::default());
    }
}
