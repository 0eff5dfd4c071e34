//! # Application Configuration
//!
//! One YAML document with three sections, every field optional:
//!
//! ```yaml
//! server:
//!   addr: "0.0.0.0:8080"
//!   request_timeout_secs: 15
//!   shutdown_timeout_secs: 30
//! pool:
//!   num_workers: 4
//!   queue_capacity: 1024
//!   stack_size: 65536
//!   inline_warn_threshold: 256
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! ## Lookup order
//!
//! 1. The path passed on the command line
//! 2. `GATEPOOL_CONFIG`
//! 3. `config/<APP_ENVIRONMENT>.yaml` (`APP_ENVIRONMENT` defaults to `local`), if it exists
//! 4. Built-in defaults
//!
//! Environment variables are applied on top of whichever source won:
//! `GATEPOOL_ADDR`, `GATEPOOL_REQUEST_TIMEOUT_SECS`, `GATEPOOL_SHUTDOWN_TIMEOUT_SECS`,
//! the `GATEPOOL_LOG_*` variables and the pool's `GATEPOOL_*` variables.

use crate::logging::LogConfig;
use crate::worker_pool::WorkerPoolConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Listener and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Deadline given to each request's context; `0` disables it.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for busy workers.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 15,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.addr))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pool: WorkerPoolConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// Resolve, parse, apply env overrides, validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match resolve_path(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config")
    }

    /// Apply `GATEPOOL_*` variables. A server variable that is set but cannot
    /// be parsed is an error.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(addr) = env::var("GATEPOOL_ADDR") {
            self.server.addr = addr;
        }
        if let Some(secs) = env_secs("GATEPOOL_REQUEST_TIMEOUT_SECS")? {
            self.server.request_timeout_secs = secs;
        }
        if let Some(secs) = env_secs("GATEPOOL_SHUTDOWN_TIMEOUT_SECS")? {
            self.server.shutdown_timeout_secs = secs;
        }
        self.pool = self.pool.with_env_overrides();
        self.logging = self.logging.with_env_overrides();
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        self.pool.validate().context("invalid pool configuration")?;
        Ok(())
    }
}

/// Which file, if any, `load` should read.
pub fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(path) = env::var("GATEPOOL_CONFIG") {
        if !path.is_empty() {
            return Ok(Some(PathBuf::from(path)));
        }
    }
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
    if environment.contains(['/', '\\']) || environment.contains("..") {
        bail!("APP_ENVIRONMENT must be a plain name, got '{environment}'");
    }
    let candidate = PathBuf::from("config").join(format!("{environment}.yaml"));
    Ok(candidate.is_file().then_some(candidate))
}

fn env_secs(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.pool, WorkerPoolConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml("pool:\n  num_workers: 2\n").unwrap();
        assert_eq!(config.pool.num_workers, 2);
        assert_eq!(config.pool.queue_capacity, 1024);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_zero_request_timeout_disables_deadline() {
        let server = ServerConfig {
            request_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(server.request_timeout(), None);
    }

    #[test]
    fn test_validate_rejects_bad_addr() {
        let mut config = AppConfig::default();
        config.server.addr = "not an addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert_eq!(AppConfig::from_yaml(&yaml).unwrap(), AppConfig::default());
    }
}
