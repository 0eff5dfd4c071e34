//! Structured logging setup
//!
//! Everything in the crate logs through `tracing` with structured fields
//! (`request_id`, `pool`, `worker_id`, ...). This module installs the global
//! subscriber: an `EnvFilter`, then a JSON or pretty `fmt` layer, optionally
//! behind `tracing-appender`'s non-blocking writer.
//!
//! ## Environment Variables
//!
//! - `GATEPOOL_LOG_LEVEL`: trace/debug/info/warn/error (default: info)
//! - `GATEPOOL_LOG_FORMAT`: json/pretty (default: json)
//! - `GATEPOOL_LOG_ASYNC`: buffer output on a background thread (default: true)
//! - `GATEPOOL_LOG_TARGET_FILTER`: extra comma-separated filter directives
//!
//! `RUST_LOG`, when set, replaces the level entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json, // Default to JSON
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Enable async buffered logging
    pub async_logging: bool,
    /// Module filter (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Defaults with the `GATEPOOL_LOG_*` variables applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = env::var("GATEPOOL_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("GATEPOOL_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Some(async_logging) = env::var("GATEPOOL_LOG_ASYNC")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.async_logging = async_logging;
        }
        if let Ok(filter) = env::var("GATEPOOL_LOG_TARGET_FILTER") {
            self.target_filter = Some(filter);
        }
        self
    }

    /// Create a default configuration for local development
    pub fn default_dev() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    /// The configured level, `INFO` if it is not a level name.
    pub fn parsed_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Build the filter: `RUST_LOG` if set, else the configured level, plus the
/// fixed `may_minihttp` directive and any target filters.
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.parsed_level().as_str()));

    // may_minihttp logs every client disconnect; keep warn and above.
    if let Ok(directive) = "may_minihttp=warn".parse() {
        filter = filter.add_directive(directive);
    }

    if let Some(target_filter) = &config.target_filter {
        for directive in target_filter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
            }
        }
    }
    filter
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard owns the background writer; keep
/// it alive for the life of the process or buffered lines are lost.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_log_config_default_dev() {
        let config = LogConfig::default_dev();
        assert_eq!(config.parsed_level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.async_logging);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "loud".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.parsed_level(), Level::INFO);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("GATEPOOL_LOG_LEVEL", "warn");
        env::set_var("GATEPOOL_LOG_FORMAT", "pretty");
        env::set_var("GATEPOOL_LOG_ASYNC", "false");
        env::set_var("GATEPOOL_LOG_TARGET_FILTER", "gatepool::worker_pool=trace");

        let config = LogConfig::from_env();
        for var in [
            "GATEPOOL_LOG_LEVEL",
            "GATEPOOL_LOG_FORMAT",
            "GATEPOOL_LOG_ASYNC",
            "GATEPOOL_LOG_TARGET_FILTER",
        ] {
            env::remove_var(var);
        }

        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.async_logging);
        assert_eq!(
            config.target_filter.as_deref(),
            Some("gatepool::worker_pool=trace")
        );
    }

    #[test]
    fn test_log_config_deserializes_lowercase_format() {
        let config: LogConfig = serde_yaml::from_str("level: debug\nformat: pretty\n").unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.async_logging);
    }
}
