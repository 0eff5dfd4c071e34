use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Smallest coroutine stack a worker may be given.
pub const MIN_STACK_SIZE: usize = 0x1000;

/// Configuration for a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Jobs that may wait for a worker before submissions run inline
    pub queue_capacity: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
    /// Inline jobs in flight above which a warning is logged
    pub inline_warn_threshold: usize,
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `GATEPOOL_*` pool variables on top of `self`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_parse("GATEPOOL_WORKERS") {
            self.num_workers = n;
        }
        if let Some(n) = env_parse("GATEPOOL_QUEUE_CAPACITY") {
            self.queue_capacity = n;
        }
        if let Some(n) = env::var("GATEPOOL_STACK_SIZE")
            .ok()
            .and_then(|s| parse_stack_size(&s))
        {
            self.stack_size = n;
        }
        if let Some(n) = env_parse("GATEPOOL_INLINE_WARN_THRESHOLD") {
            self.inline_warn_threshold = n;
        }
        self
    }

    /// Create a custom configuration
    #[must_use]
    pub fn new(num_workers: usize, queue_capacity: usize) -> Self {
        Self {
            num_workers,
            queue_capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            bail!("worker pool needs at least one worker");
        }
        if self.stack_size < MIN_STACK_SIZE {
            bail!(
                "worker stack size {:#x} is below the minimum of {:#x}",
                self.stack_size,
                MIN_STACK_SIZE
            );
        }
        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_capacity: 1024,
            stack_size: 0x10000, // 64KB
            inline_warn_threshold: 256,
        }
    }
}

/// Parse a stack size given in decimal or `0x` hex.
pub fn parse_stack_size(s: &str) -> Option<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn env_parse(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "GATEPOOL_WORKERS",
        "GATEPOOL_QUEUE_CAPACITY",
        "GATEPOOL_STACK_SIZE",
        "GATEPOOL_INLINE_WARN_THRESHOLD",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.stack_size, 0x10000);
        assert_eq!(config.inline_warn_threshold, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("GATEPOOL_WORKERS", "8");
        env::set_var("GATEPOOL_QUEUE_CAPACITY", "16");
        env::set_var("GATEPOOL_STACK_SIZE", "0x8000");
        env::set_var("GATEPOOL_INLINE_WARN_THRESHOLD", "not-a-number");

        let config = WorkerPoolConfig::from_env();
        clear_env();

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.stack_size, 0x8000);
        assert_eq!(config.inline_warn_threshold, 256);
    }

    #[test]
    fn test_parse_stack_size() {
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size("16384"), Some(16384));
        assert_eq!(parse_stack_size("0xZZ"), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(WorkerPoolConfig::new(0, 10).validate().is_err());
        let tiny = WorkerPoolConfig {
            stack_size: 512,
            ..WorkerPoolConfig::default()
        };
        assert!(tiny.validate().is_err());
    }
}
