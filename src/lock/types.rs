//! Lock strategy, options, and marker information structures.

use super::metadata::MarkerMetadata;
use std::path::PathBuf;
use std::time::Duration;

/// Default acquisition budget for a scoped lock.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between acquisition attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// How ownership of a resource is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrategy {
    /// Kernel advisory lock (`flock`) held on the resource file's own descriptor.
    /// Leaves no artifact on disk.
    Advisory,
    /// Sibling `<resource>.lock` file created with exclusive-create semantics.
    /// Its existence is the lock.
    Marker,
}

impl LockStrategy {
    /// The strategy used by default on this platform.
    pub const fn native() -> Self {
        if cfg!(windows) {
            LockStrategy::Marker
        } else {
            LockStrategy::Advisory
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockStrategy::Advisory => "advisory",
            LockStrategy::Marker => "marker",
        }
    }
}

impl Default for LockStrategy {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a scoped lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Total time to keep retrying before giving up with a timeout error.
    pub timeout: Duration,

    /// Sleep between attempts.
    pub retry_interval: Duration,

    /// Ownership representation.
    pub strategy: LockStrategy,

    /// Age after which a marker file is treated as abandoned and removed.
    ///
    /// `None` keeps markers forever: a holder that died without cleaning up
    /// blocks everyone until the marker is cleared by hand.
    /// Ignored by the advisory strategy, whose locks die with the process.
    pub stale_after: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            strategy: LockStrategy::native(),
            stale_after: None,
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_strategy(mut self, strategy: LockStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/// Information about a marker file found on disk.
#[derive(Debug, Clone)]
pub struct MarkerInfo {
    /// The marker file path (`<resource>.lock`).
    pub path: PathBuf,

    /// Parsed marker contents, if the marker held valid metadata.
    pub metadata: Option<MarkerMetadata>,

    /// Age of the marker, from its metadata or else its modification time.
    pub age: Duration,
}

impl std::fmt::Display for MarkerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.metadata {
            Some(meta) => write!(
                f,
                "{} (owner: {}, pid: {}, age: {})",
                self.path.display(),
                meta.owner,
                meta.pid
                    .map(|pid| pid.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                meta.age_string()
            ),
            None => write!(
                f,
                "{} (unreadable metadata, age: {}s)",
                self.path.display(),
                self.age.as_secs()
            ),
        }
    }
}
