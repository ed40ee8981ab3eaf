use crate::lock::{FileLock, LockOptions, LockStrategy};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) const STRATEGIES: [LockStrategy; 2] = [LockStrategy::Advisory, LockStrategy::Marker];

/// Options with a short budget so contention tests finish quickly.
pub(crate) fn fast_options(strategy: LockStrategy) -> LockOptions {
    LockOptions::new()
        .with_strategy(strategy)
        .with_timeout(Duration::from_millis(300))
        .with_retry_interval(Duration::from_millis(10))
}

/// A thread that holds a lock on `path` for `hold`, then releases it.
pub(crate) struct Holder {
    handle: JoinHandle<()>,
}

impl Holder {
    /// Spawn the holder and return once it owns the lock.
    pub(crate) fn spawn(path: &Path, strategy: LockStrategy, hold: Duration) -> Self {
        let path: PathBuf = path.to_path_buf();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let options = LockOptions::new()
                .with_strategy(strategy)
                .with_timeout(Duration::from_secs(5));
            let guard = FileLock::acquire(&path, &options).unwrap();
            tx.send(()).unwrap();
            thread::sleep(hold);
            drop(guard);
        });
        rx.recv_timeout(Duration::from_secs(5))
            .expect("holder thread never acquired the lock");
        Self { handle }
    }

    pub(crate) fn join(self) {
        self.handle.join().unwrap();
    }
}
