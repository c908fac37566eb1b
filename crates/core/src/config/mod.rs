//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TOME_*)
//! 2. TOML config file (if TOME_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::Staleness;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TOME_*)
/// 2. TOML config file (if TOME_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of the disk cache.
    ///
    /// Set via TOME_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Hours before a "changing" resource is stale, -1 for never.
    ///
    /// Set via TOME_HOURS_CHANGING environment variable.
    #[serde(default = "default_hours_changing")]
    pub hours_changing: i64,

    /// Hours before a "stable" resource is stale, -1 for never.
    ///
    /// Set via TOME_HOURS_STABLE environment variable.
    #[serde(default = "default_hours_stable")]
    pub hours_stable: i64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via TOME_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via TOME_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed for one request.
    ///
    /// Set via TOME_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Start without network access.
    ///
    /// Set via TOME_OFFLINE environment variable.
    #[serde(default)]
    pub offline: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./tome-cache")
}

fn default_hours_changing() -> i64 {
    24
}

fn default_hours_stable() -> i64 {
    720
}

fn default_user_agent() -> String {
    "tome/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            hours_changing: default_hours_changing(),
            hours_stable: default_hours_stable(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            offline: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache staleness thresholds.
    pub fn staleness(&self) -> Staleness {
        Staleness::from_hours(self.hours_changing, self.hours_stable)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TOME_`
    /// 2. TOML file from `TOME_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TOME_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TOME_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(&figment)
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
