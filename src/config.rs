//! Service configuration.
//!
//! Loaded in three layers: built-in defaults, an optional TOML file, then
//! environment variables. Keys in the file use the names below:
//!
//! ```toml
//! EnableDeadlockSimulation = true
//! UseConsistentLockOrder = false
//! BindAddress = "0.0.0.0:8080"
//! WorkerPoolSize = 64
//! MemoryThresholdMb = 1024
//!
//! [PerformanceSettings]
//! TimeoutThresholdMs = 5000
//! HealthyResponseTimeMs = 500
//! DegradedResponseTimeMs = 2000
//!
//! [PathTimings]
//! LockWaitMs = 5000
//! FirstHoldMs = [50, 200]
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::HealthThresholds;
use crate::path::PathTimings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PerformanceSettings {
    /// Drives the outer per-request deadline (1.5x this value).
    pub timeout_threshold_ms: u64,
    pub healthy_response_time_ms: u64,
    pub degraded_response_time_ms: u64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        PerformanceSettings {
            timeout_threshold_ms: 5000,
            healthy_response_time_ms: 500,
            degraded_response_time_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Config {
    /// Run the dual-lock protocol instead of the lock-free fast path.
    pub enable_deadlock_simulation: bool,
    /// Give the inventory path the order path's lock order.
    pub use_consistent_lock_order: bool,
    pub bind_address: String,
    pub worker_pool_size: usize,
    pub memory_threshold_mb: u64,
    pub performance_settings: PerformanceSettings,
    pub path_timings: PathTimings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enable_deadlock_simulation: false,
            use_consistent_lock_order: false,
            bind_address: "0.0.0.0:8080".to_string(),
            worker_pool_size: 64,
            memory_threshold_mb: 1024,
            performance_settings: PerformanceSettings::default(),
            path_timings: PathTimings::default(),
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `NAME=value` overrides. Unknown names are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                "ENABLE_DEADLOCK_SIMULATION" => {
                    self.enable_deadlock_simulation = parse_bool(key, value)?
                }
                "USE_CONSISTENT_LOCK_ORDER" => {
                    self.use_consistent_lock_order = parse_bool(key, value)?
                }
                "BIND_ADDRESS" => self.bind_address = value.to_string(),
                "WORKER_POOL_SIZE" => self.worker_pool_size = parse(key, value)?,
                "MEMORY_THRESHOLD_MB" => self.memory_threshold_mb = parse(key, value)?,
                "LOCK_WAIT_MS" => self.path_timings.lock_wait_ms = parse(key, value)?,
                "TIMEOUT_THRESHOLD_MS" => {
                    self.performance_settings.timeout_threshold_ms = parse(key, value)?
                }
                "HEALTHY_RESPONSE_TIME_MS" => {
                    self.performance_settings.healthy_response_time_ms = parse(key, value)?
                }
                "DEGRADED_RESPONSE_TIME_MS" => {
                    self.performance_settings.degraded_response_time_ms = parse(key, value)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(invalid("WorkerPoolSize", self.worker_pool_size));
        }
        if self.performance_settings.timeout_threshold_ms == 0 {
            return Err(invalid(
                "PerformanceSettings.TimeoutThresholdMs",
                self.performance_settings.timeout_threshold_ms,
            ));
        }
        if self.performance_settings.degraded_response_time_ms
            < self.performance_settings.healthy_response_time_ms
        {
            return Err(invalid(
                "PerformanceSettings.DegradedResponseTimeMs",
                self.performance_settings.degraded_response_time_ms,
            ));
        }
        let lock_wait = Duration::from_millis(self.path_timings.lock_wait_ms);
        if self.request_timeout() <= lock_wait {
            return Err(ConfigError::InvalidValue {
                key: "PerformanceSettings.TimeoutThresholdMs / PathTimings.LockWaitMs".to_string(),
                value: format!(
                    "request deadline {}ms must exceed lock wait {}ms",
                    self.request_timeout().as_millis(),
                    self.path_timings.lock_wait_ms
                ),
            });
        }
        let rate = self.path_timings.downstream_failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(invalid("PathTimings.DownstreamFailureRate", rate));
        }
        Ok(())
    }

    /// Outer per-request deadline, 1.5x the timeout threshold.
    pub fn request_timeout(&self) -> Duration {
        let threshold = self.performance_settings.timeout_threshold_ms;
        Duration::from_millis(threshold.saturating_add(threshold / 2))
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            healthy_response_ms: self.performance_settings.healthy_response_time_ms as f64,
            degraded_response_ms: self.performance_settings.degraded_response_time_ms as f64,
            ..HealthThresholds::default()
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
