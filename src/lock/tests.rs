//! Tests for the lock subsystem.

use super::*;
use crate::error::StoreError;
use crate::test_support::{Holder, STRATEGIES, fast_options};
use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

fn write_marker(resource: &Path, created_at: chrono::DateTime<Utc>) {
    let mut meta = MarkerMetadata::new();
    meta.created_at = created_at;
    std::fs::write(marker_path(resource), meta.to_json().unwrap()).unwrap();
}

#[test]
fn test_marker_path_appends_lock_suffix() {
    assert_eq!(
        marker_path("users/index.json"),
        Path::new("users/index.json.lock")
    );
    assert_eq!(marker_path("state"), Path::new("state.lock"));
}

#[test]
fn test_native_strategy_matches_platform() {
    if cfg!(windows) {
        assert_eq!(LockStrategy::native(), LockStrategy::Marker);
    } else {
        assert_eq!(LockStrategy::native(), LockStrategy::Advisory);
    }
    assert_eq!(LockOptions::default().strategy, LockStrategy::native());
}

#[test]
fn test_default_options() {
    let options = LockOptions::default();
    assert_eq!(options.timeout, Duration::from_secs(30));
    assert_eq!(options.retry_interval, Duration::from_millis(100));
    assert_eq!(options.stale_after, None);
}

#[test]
fn test_marker_metadata_creation() {
    let meta = MarkerMetadata::new();

    assert!(!meta.owner.is_empty());
    assert!(meta.owner.contains('@'));
    assert_eq!(meta.pid, Some(std::process::id()));
    assert!(meta.age().num_minutes() < 1);
}

#[test]
fn test_marker_metadata_serialization() {
    let meta = MarkerMetadata::new();
    let json = meta.to_json().unwrap();

    assert!(json.contains("owner"));
    assert!(json.contains("created_at"));

    let parsed: MarkerMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.pid, meta.pid);
    assert_eq!(parsed.created_at, meta.created_at);
}

#[test]
fn test_marker_metadata_age_string() {
    let mut meta = MarkerMetadata::new();
    assert!(meta.age_string().ends_with('s'));

    meta.created_at = Utc::now() - ChronoDuration::minutes(5);
    assert!(meta.age_string().starts_with("5m"));

    meta.created_at = Utc::now() - ChronoDuration::hours(2);
    assert!(meta.age_string().starts_with("2h"));

    meta.created_at = Utc::now() - ChronoDuration::days(3);
    assert!(meta.age_string().starts_with("3d"));
}

#[test]
fn test_acquire_creates_parent_dirs_and_resource() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dirs").join("state.json");

        let guard = FileLock::acquire(&path, &fast_options(strategy)).unwrap();

        assert!(path.exists(), "{strategy}: resource should be created");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(guard.path(), path.as_path());
        assert_eq!(guard.strategy(), strategy);
        drop(guard);
    }
}

#[test]
fn test_advisory_leaves_no_marker() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    let guard = FileLock::acquire(&path, &fast_options(LockStrategy::Advisory)).unwrap();
    assert!(guard.marker_path().is_none());
    assert!(!marker_path(&path).exists());
}

#[test]
fn test_marker_exists_only_while_held() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let marker = marker_path(&path);

    let guard = FileLock::acquire(&path, &fast_options(LockStrategy::Marker)).unwrap();
    assert_eq!(guard.marker_path(), Some(marker.as_path()));
    assert!(marker.exists());

    let meta = MarkerMetadata::from_file(&marker).unwrap();
    assert_eq!(meta.pid, Some(std::process::id()));

    drop(guard);
    assert!(!marker.exists());
    assert!(path.exists());
}

#[test]
fn test_guard_handle_is_read_write() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, b"existing").unwrap();

        let mut guard = FileLock::acquire(&path, &fast_options(strategy)).unwrap();
        let mut content = String::new();
        guard.file_mut().read_to_string(&mut content).unwrap();
        assert_eq!(content, "existing", "{strategy}: file must not be truncated");

        guard.file_mut().write_all(b" appended").unwrap();
        drop(guard);

        assert_eq!(std::fs::read(&path).unwrap(), b"existing appended");
    }
}

#[test]
fn test_try_acquire_returns_none_when_held() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy);

        let _guard = FileLock::acquire(&path, &options).unwrap();
        let second = FileLock::try_acquire(&path, &options).unwrap();
        assert!(second.is_none(), "{strategy}: second holder must be refused");
    }
}

#[test]
fn test_lock_released_on_drop() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy);

        {
            let _guard = FileLock::acquire(&path, &options).unwrap();
        }

        let again = FileLock::try_acquire(&path, &options).unwrap();
        assert!(again.is_some(), "{strategy}: lock should be free after drop");
    }
}

#[test]
fn test_explicit_release() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy);

        let guard = FileLock::acquire(&path, &options).unwrap();
        guard.release().unwrap();

        assert!(!marker_path(&path).exists());
        assert!(FileLock::try_acquire(&path, &options).unwrap().is_some());
    }
}

#[test]
fn test_release_reports_missing_marker() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    let guard = FileLock::acquire(&path, &fast_options(LockStrategy::Marker)).unwrap();
    std::fs::remove_file(marker_path(&path)).unwrap();

    let err = guard.release().unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}

#[test]
#[serial]
fn test_acquire_times_out_while_held() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy);

        let holder = Holder::spawn(&path, strategy, Duration::from_millis(1500));

        let started = Instant::now();
        let err = FileLock::acquire(&path, &options).unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout(), "{strategy}: expected timeout, got {err}");
        assert!(elapsed >= options.timeout, "{strategy}: gave up early");
        assert!(
            elapsed < options.timeout + options.retry_interval + Duration::from_millis(700),
            "{strategy}: took {elapsed:?}"
        );

        holder.join();
    }
}

#[test]
#[serial]
fn test_waiter_acquires_after_holder_releases() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy).with_timeout(Duration::from_secs(5));

        let holder = Holder::spawn(&path, strategy, Duration::from_millis(150));
        let guard = FileLock::acquire(&path, &options).unwrap();
        assert_eq!(guard.path(), path.as_path());

        drop(guard);
        holder.join();
    }
}

#[test]
#[serial]
fn test_concurrent_holders_never_interleave() {
    const WORKERS: usize = 8;
    const ROUNDS: usize = 10;

    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = Arc::new(temp_dir.path().join("counter.txt"));
        std::fs::write(path.as_ref(), "0").unwrap();

        let workers: Vec<_> = (0..WORKERS)
            .map(|_| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let options = LockOptions::new()
                        .with_strategy(strategy)
                        .with_timeout(Duration::from_secs(20))
                        .with_retry_interval(Duration::from_millis(1));
                    for _ in 0..ROUNDS {
                        let mut guard = FileLock::acquire(path.as_ref(), &options).unwrap();
                        let file = guard.file_mut();

                        let mut content = String::new();
                        file.seek(SeekFrom::Start(0)).unwrap();
                        file.read_to_string(&mut content).unwrap();
                        let value: usize = content.trim().parse().unwrap();

                        thread::yield_now();

                        let next = (value + 1).to_string();
                        file.seek(SeekFrom::Start(0)).unwrap();
                        file.set_len(0).unwrap();
                        file.write_all(next.as_bytes()).unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let total: usize = std::fs::read_to_string(path.as_ref())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(total, WORKERS * ROUNDS, "{strategy}: lost updates");
    }
}

#[test]
fn test_old_marker_is_honoured_without_stale_limit() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_marker(&path, Utc::now() - ChronoDuration::hours(1));

    let err = FileLock::acquire(&path, &fast_options(LockStrategy::Marker)).unwrap_err();
    assert!(err.is_timeout());
    assert!(marker_path(&path).exists());
}

#[test]
fn test_garbled_marker_is_honoured() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    std::fs::write(marker_path(&path), "not json").unwrap();

    let options = fast_options(LockStrategy::Marker).with_stale_after(Some(Duration::from_secs(60)));
    assert!(FileLock::try_acquire(&path, &options).unwrap().is_none());
}

#[test]
fn test_stale_marker_is_broken_when_limit_set() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_marker(&path, Utc::now() - ChronoDuration::hours(1));

    let options = fast_options(LockStrategy::Marker).with_stale_after(Some(Duration::from_secs(60)));
    let guard = FileLock::acquire(&path, &options).unwrap();

    let meta = MarkerMetadata::from_file(marker_path(&path)).unwrap();
    assert!(meta.age().num_minutes() < 1, "marker should belong to the new holder");
    drop(guard);
}

#[test]
fn test_young_marker_is_not_broken() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_marker(&path, Utc::now());

    let options = fast_options(LockStrategy::Marker).with_stale_after(Some(Duration::from_secs(60)));
    assert!(FileLock::try_acquire(&path, &options).unwrap().is_none());
}

#[test]
fn test_is_locked_tracks_holder() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let guard = FileLock::acquire(&path, &fast_options(strategy)).unwrap();
        assert!(is_locked(&path, strategy).unwrap(), "{strategy}: should be held");

        drop(guard);
        assert!(!is_locked(&path, strategy).unwrap(), "{strategy}: should be free");
    }
}

#[test]
fn test_is_locked_does_not_create_resource() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.json");

    for strategy in STRATEGIES {
        assert!(!is_locked(&path, strategy).unwrap());
    }
    assert!(!path.exists());
}

#[test]
fn test_inspect_marker() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");

    assert!(inspect_marker(&path).unwrap().is_none());

    let _guard = FileLock::acquire(&path, &fast_options(LockStrategy::Marker)).unwrap();
    let info = inspect_marker(&path).unwrap().unwrap();
    assert_eq!(info.path, marker_path(&path));
    assert_eq!(info.metadata.unwrap().pid, Some(std::process::id()));
    assert!(info.age < Duration::from_secs(60));
}

#[test]
fn test_inspect_garbled_marker_falls_back_to_mtime() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    std::fs::write(marker_path(&path), "").unwrap();

    let info = inspect_marker(&path).unwrap().unwrap();
    assert!(info.metadata.is_none());
    assert!(info.age < Duration::from_secs(60));
    assert!(info.to_string().contains("unreadable metadata"));
}

#[test]
fn test_clear_marker() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_marker(&path, Utc::now() - ChronoDuration::days(2));

    let info = clear_marker(&path).unwrap();
    assert!(info.to_string().contains("2d"));
    assert!(!marker_path(&path).exists());

    let err = clear_marker(&path).unwrap_err();
    assert!(matches!(err, StoreError::UserError(_)));
    assert!(err.to_string().contains("no marker exists"));
}

#[test]
fn test_acquire_with_unbounded_timeout() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy).with_timeout(Duration::MAX);

        let guard = FileLock::acquire(&path, &options).unwrap();
        assert_eq!(guard.strategy(), strategy);
    }
}

#[test]
#[serial]
fn test_unbounded_timeout_waits_for_holder() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy).with_timeout(Duration::MAX);

        let holder = Holder::spawn(&path, strategy, Duration::from_millis(150));
        let guard = FileLock::acquire(&path, &options).unwrap();
        drop(guard);
        holder.join();
    }
}

#[test]
fn test_created_resource_flag() {
    for strategy in STRATEGIES {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let options = fast_options(strategy);

        let guard = FileLock::acquire(&path, &options).unwrap();
        assert!(guard.created_resource(), "{strategy}: first holder creates the file");
        drop(guard);

        let guard = FileLock::acquire(&path, &options).unwrap();
        assert!(!guard.created_resource(), "{strategy}: file already existed");
    }
}

#[test]
#[serial]
fn test_waiters_racing_for_stale_marker_never_overlap() {
    const WAITERS: usize = 8;
    const ITERATIONS: usize = 50;

    for _ in 0..ITERATIONS {
        let temp_dir = TempDir::new().unwrap();
        let path = Arc::new(temp_dir.path().join("state.json"));
        write_marker(&path, Utc::now() - ChronoDuration::hours(1));

        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let start = Arc::new(Barrier::new(WAITERS));

        let waiters: Vec<_> = (0..WAITERS)
            .map(|_| {
                let path = Arc::clone(&path);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    let options = LockOptions::new()
                        .with_strategy(LockStrategy::Marker)
                        .with_timeout(Duration::from_secs(20))
                        .with_retry_interval(Duration::from_millis(1))
                        .with_stale_after(Some(Duration::from_secs(60)));

                    start.wait();
                    let guard = FileLock::acquire(path.as_ref(), &options).unwrap();
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(guard);
                })
            })
            .collect();

        for waiter in waiters {
            waiter.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0, "two holders at once");
        assert!(!marker_path(path.as_ref()).exists());
        let mut claim = marker_path(path.as_ref()).into_os_string();
        claim.push(".break");
        assert!(!Path::new(&claim).exists());
    }
}

#[test]
fn test_abandoned_break_claim_is_cleared() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    write_marker(&path, Utc::now() - ChronoDuration::hours(1));

    let mut claim = marker_path(&path).into_os_string();
    claim.push(".break");
    let claim = std::path::PathBuf::from(claim);
    let file = std::fs::File::create(&claim).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(7200))
        .unwrap();
    drop(file);

    let options = fast_options(LockStrategy::Marker)
        .with_timeout(Duration::from_secs(2))
        .with_stale_after(Some(Duration::from_secs(60)));
    let guard = FileLock::acquire(&path, &options).unwrap();

    assert!(!claim.exists());
    let meta = MarkerMetadata::from_file(marker_path(&path)).unwrap();
    assert!(meta.age().num_minutes() < 1);
    drop(guard);
}

#[cfg(target_os = "linux")]
fn open_handles_to(target: &Path) -> usize {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|link| link == target)
        .count()
}

#[test]
#[cfg(target_os = "linux")]
fn test_handle_closed_before_marker_removed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let marker = marker_path(&path);

    let guard = FileLock::acquire(&path, &fast_options(LockStrategy::Marker)).unwrap();
    let target = std::fs::canonicalize(&path).unwrap();
    assert_eq!(open_handles_to(&target), 1);

    let ready = Arc::new(Barrier::new(2));
    let watcher = {
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            ready.wait();
            while marker.exists() {
                std::hint::spin_loop();
            }
            open_handles_to(&target)
        })
    };

    ready.wait();
    drop(guard);
    assert_eq!(watcher.join().unwrap(), 0, "handle still open after marker removal");
}
