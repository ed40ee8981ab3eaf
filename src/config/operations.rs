//! Config loading, validation, and conversion into runtime options.

use super::model::Config;
use super::types::MAX_INDENT;
use crate::error::{Result, StoreError};
use crate::lock::LockOptions;
use crate::store::JsonStore;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "safejson.yaml";

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(StoreError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load `path` if given, else `safejson.yaml` in the working directory if it
    /// exists, else the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| StoreError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            StoreError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - all durations must be positive and at most a year
    /// - `indent` must not exceed 16
    pub fn validate(&self) -> Result<()> {
        check_seconds("lock_timeout_secs", self.lock_timeout_secs)?;
        check_seconds("retry_interval_secs", self.retry_interval_secs)?;
        check_seconds("store_timeout_secs", self.store_timeout_secs)?;
        if let Some(stale) = self.stale_marker_secs {
            check_seconds("stale_marker_secs", stale)?;
        }

        if self.indent > MAX_INDENT {
            return Err(StoreError::UserError(format!(
                "config validation failed: indent must be at most {} (found {})",
                MAX_INDENT, self.indent
            )));
        }

        Ok(())
    }

    /// Options for a plain scoped lock.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::new()
            .with_timeout(Duration::from_secs_f64(self.lock_timeout_secs))
            .with_retry_interval(Duration::from_secs_f64(self.retry_interval_secs))
            .with_strategy(self.strategy.resolve())
            .with_stale_after(self.stale_marker_secs.map(Duration::from_secs_f64))
    }

    /// A store using the store timeout and indentation from this config.
    pub fn store(&self) -> JsonStore {
        JsonStore::new()
            .with_lock_options(
                self.lock_options()
                    .with_timeout(Duration::from_secs_f64(self.store_timeout_secs)),
            )
            .with_indent(self.indent)
    }
}

/// Upper bound on configured durations, roughly a year.
const MAX_SECONDS: f64 = 31_536_000.0;

fn check_seconds(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= MAX_SECONDS {
        Ok(())
    } else {
        Err(StoreError::UserError(format!(
            "config validation failed: {} must be a positive number of seconds (found {})",
            name, value
        )))
    }
}
