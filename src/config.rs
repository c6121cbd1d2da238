//! Startup configuration
//!
//! Read once from `CRANEPOINT_*` environment variables through the `config`
//! crate. Anything missing or unparsable keeps its default; user-editable
//! settings live in SQLite instead.

use ::config::{Config, ConfigError, Environment};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix shared by every environment variable this crate reads
pub const ENV_PREFIX: &str = "CRANEPOINT";

/// Local storage key holding the serialized market state
pub const DEFAULT_STORAGE_KEY: &str = "cranepoint_market_data";
/// Quiet period before a pending write-back is flushed
pub const DEFAULT_WRITE_DELAY_MS: u64 = 1000;
/// Tracing filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "cranepoint=debug,cranepoint_lib=debug,tauri=info";

/// Application configuration resolved at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Data directory override (falls back to the platform app data dir)
    pub data_dir: Option<PathBuf>,
    /// Key the market store persists under
    pub storage_key: String,
    /// Debounce period for market store write-back
    pub write_delay: Duration,
    /// Optional byte quota for the local storage table
    pub storage_quota: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            write_delay: Duration::from_millis(DEFAULT_WRITE_DELAY_MS),
            storage_quota: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `CRANEPOINT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn from_environment(environment: Environment) -> Self {
        let mut config = Self::default();

        let settings = match Config::builder().add_source(environment).build() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring environment configuration: {}", e);
                return config;
            }
        };

        if let Some(dir) = read::<String>(&settings, "data_dir").filter(|d| !d.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(key) = read::<String>(&settings, "storage_key").filter(|k| !k.trim().is_empty()) {
            config.storage_key = key;
        }

        if let Some(ms) = read::<u64>(&settings, "write_delay_ms") {
            config.write_delay = Duration::from_millis(ms);
        }

        if let Some(bytes) = read::<usize>(&settings, "storage_quota") {
            config.storage_quota = Some(bytes);
        }

        config
    }
}

/// Typed lookup; unset keys are silent, unusable values are logged and skipped
fn read<T: DeserializeOwned>(settings: &Config, key: &str) -> Option<T> {
    match settings.get::<T>(key) {
        Ok(value) => Some(value),
        Err(ConfigError::NotFound(_)) => None,
        Err(e) => {
            tracing::warn!("Ignoring {}_{}: {}", ENV_PREFIX, key.to_uppercase(), e);
            None
        }
    }
}
