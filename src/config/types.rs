//! Configuration types and defaults for safejson.

use crate::lock::LockStrategy;
use serde::{Deserialize, Serialize};

/// Lock strategy selection in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategySetting {
    /// Marker files on Windows, advisory locks elsewhere (default).
    #[default]
    Native,
    /// Always use advisory `flock` locks.
    Advisory,
    /// Always use `<resource>.lock` marker files.
    Marker,
}

impl StrategySetting {
    /// Resolve to a concrete strategy for this platform.
    pub fn resolve(self) -> LockStrategy {
        match self {
            Self::Native => LockStrategy::native(),
            Self::Advisory => LockStrategy::Advisory,
            Self::Marker => LockStrategy::Marker,
        }
    }
}

/// Largest accepted indentation width.
pub const MAX_INDENT: usize = 16;

pub fn default_lock_timeout_secs() -> f64 {
    30.0
}

pub fn default_retry_interval_secs() -> f64 {
    0.1
}

pub fn default_store_timeout_secs() -> f64 {
    10.0
}

pub fn default_indent() -> usize {
    2
}
