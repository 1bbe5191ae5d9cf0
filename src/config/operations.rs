//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{MutexError, Result};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(MutexError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            MutexError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // Nothing to parse: all defaults
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| MutexError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MutexError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `retry_delay_ms` must be positive
    /// - `capacity` must be positive
    /// - `timeout_ms`, when present, must be positive
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_ms == 0 {
            return Err(MutexError::Config(
                "config validation failed: retry_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.capacity == 0 {
            return Err(MutexError::Config(
                "config validation failed: capacity must be greater than 0".to_string(),
            ));
        }

        if self.timeout_ms == Some(0) {
            return Err(MutexError::Config(
                "config validation failed: timeout_ms must be greater than 0 (omit it to wait forever)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
