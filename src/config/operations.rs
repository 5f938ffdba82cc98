//! Config loading, validation, and conversion into lock options.

use super::model::Config;
use crate::error::{Result, WardenError};
use crate::locks::{AcquireOptions, LockOptions};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(WardenError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config if the file exists, otherwise return defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| WardenError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            WardenError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - every lock duration must be positive
    /// - `lock_retry_interval_ms` must not exceed `lock_acquire_timeout_ms`
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lock_stale_timeout_ms", self.lock_stale_timeout_ms),
            ("lock_acquire_timeout_ms", self.lock_acquire_timeout_ms),
            ("lock_retry_interval_ms", self.lock_retry_interval_ms),
        ] {
            if value == 0 {
                return Err(WardenError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        if self.lock_retry_interval_ms > self.lock_acquire_timeout_ms {
            return Err(WardenError::UserError(format!(
                "config validation failed: lock_retry_interval_ms ({}) must not exceed lock_acquire_timeout_ms ({})",
                self.lock_retry_interval_ms, self.lock_acquire_timeout_ms
            )));
        }

        Ok(())
    }

    /// Acquisition settings for store operations.
    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions::default()
            .with_timeout(Duration::from_millis(self.lock_acquire_timeout_ms))
            .with_retry_interval(Duration::from_millis(self.lock_retry_interval_ms))
            .with_auto_cleanup(self.lock_auto_cleanup)
    }

    /// Handle settings for store operations.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::default()
            .with_stale_timeout(Duration::from_millis(self.lock_stale_timeout_ms))
            .with_acquire(self.acquire_options())
    }
}
