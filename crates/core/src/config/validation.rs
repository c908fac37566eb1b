//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `hours_changing` or `hours_stable` is below -1
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_redirects` exceeds 50
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, hours) in [("hours_changing", self.hours_changing), ("hours_stable", self.hours_stable)] {
            if hours < -1 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be -1 (never) or >= 0".into() });
            }
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_redirects > 50 {
            return Err(ConfigError::Invalid { field: "max_redirects".into(), reason: "must not exceed 50".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.hours_stable >= 0 && (self.hours_changing < 0 || self.hours_changing > self.hours_stable) {
            tracing::warn!(
                hours_changing = self.hours_changing,
                hours_stable = self.hours_stable,
                "changing resources outlive stable ones; old-entry cleanup uses the stable threshold"
            );
        }

        Ok(())
    }
}
