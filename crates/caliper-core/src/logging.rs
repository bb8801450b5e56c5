//! Structured logging setup for the toolkit.
//!
//! Built on `tracing` with an `EnvFilter`, so `RUST_LOG` always wins over
//! the configured default level. Initialization is idempotent: test
//! binaries call it from several suites without coordination.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Verbosity used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level output.
    Trace,
    /// Debug-level output.
    Debug,
    /// Informational output.
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default verbosity.
    pub level: LogLevel,
    /// Include thread ids in output.
    pub with_thread_ids: bool,
    /// Include file and line of the event site.
    pub with_source_location: bool,
    /// Emit JSON instead of human-readable lines.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_thread_ids: false,
            with_source_location: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose human-readable output for local runs.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            with_thread_ids: true,
            with_source_location: true,
            json_format: false,
        }
    }

    /// JSON output at info level for CI log collection.
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            with_thread_ids: false,
            with_source_location: false,
            json_format: true,
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `Ok(false)` when a subscriber is already installed, which is the
/// normal case for every suite after the first in one test binary.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let installed = if config.json_format {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_thread_ids(config.with_thread_ids)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location);
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_thread_ids(config.with_thread_ids)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location);
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
    };

    Ok(installed)
}
