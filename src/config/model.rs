//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for safejson.
///
/// This struct represents the contents of `safejson.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Seconds a plain lock acquisition keeps retrying (default: 30).
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: f64,

    /// Seconds between acquisition attempts (default: 0.1).
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: f64,

    /// Age in seconds after which a marker file is considered abandoned.
    /// Unset means markers are never broken automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_marker_secs: Option<f64>,

    /// How lock ownership is represented.
    #[serde(default)]
    pub strategy: StrategySetting,

    // =========================================================================
    // Store settings
    // =========================================================================
    /// Seconds store reads and writes wait for the lock (default: 10).
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: f64,

    /// Indentation width of written documents (default: 2, 0 for compact).
    #[serde(default = "default_indent")]
    pub indent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
            retry_interval_secs: default_retry_interval_secs(),
            stale_marker_secs: None,
            strategy: StrategySetting::default(),
            store_timeout_secs: default_store_timeout_secs(),
            indent: default_indent(),
        }
    }
}
