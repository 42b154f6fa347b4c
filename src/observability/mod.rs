//! Observability and telemetry.
//!
//! The persistence layer emits `tracing` events (fatal open/migration
//! failures at error level, schema changes at debug level) and `metrics`
//! counters/histograms per storage operation. This module provides the
//! process-wide logging initialization for applications that have no
//! subscriber of their own; embedding applications that already install one
//! can skip it.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global logging subscriber, once per process.
///
/// Subsequent calls are no-ops, as is a call made after the application has
/// installed its own subscriber.
pub fn init_logging(config: &LoggingConfig) {
    LOGGING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.filter));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
