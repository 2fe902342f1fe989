//! Time-based retention sweep
//!
//! Deletes every regular file in the transient directory whose
//! last-modified time is strictly older than `now - retention`. A failure on
//! one file is logged and the scan continues.
//!
//! The periodic sweep is an explicitly owned background task: the service
//! starts it with [`RetentionSweeper::start`] and stops it through the
//! returned [`SweepHandle`].

use crate::error::{AudioError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Outcome of a single sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files examined
    pub scanned: usize,
    /// Files deleted
    pub removed: usize,
    /// Files that were eligible but could not be inspected or deleted
    pub failed: usize,
}

/// Delete expired files from `dir`
///
/// # Arguments
///
/// * `dir` - Transient storage directory
/// * `retention` - Files modified before `now - retention` are deleted
/// * `now` - Reference time
///
/// # Errors
///
/// Returns `AudioError::StorageError` only if the directory itself cannot be
/// listed. Per-file failures are counted in the report.
pub fn sweep_expired(dir: &Path, retention: Duration, now: SystemTime) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let Some(threshold) = now.checked_sub(retention) else {
        return Ok(report);
    };

    let entries = std::fs::read_dir(dir).map_err(|e| {
        AudioError::StorageError(format!("cannot list {}: {}", dir.display(), e))
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Error reading entry in {}: {}", dir.display(), e);
                report.failed += 1;
                continue;
            }
        };
        let path = entry.path();

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        report.scanned += 1;

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                log::warn!("No modification time for {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };
        if modified >= threshold {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Removed old file: {}", path.display());
                report.removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("Failed to remove {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Periodic retention sweep over one directory
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    /// Create a sweeper; nothing runs until [`start`](Self::start)
    pub fn new<P: Into<PathBuf>>(dir: P, retention: Duration, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
            interval,
        }
    }

    /// Spawn the sweep on the current tokio runtime
    ///
    /// The first sweep runs one interval after start.
    pub fn start(self) -> SweepHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        log::info!(
            "Starting retention sweep of {} every {:?} (retention {:?})",
            self.dir.display(),
            self.interval,
            self.retention
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let dir = self.dir.clone();
                        let retention = self.retention;
                        let outcome = tokio::task::spawn_blocking(move || {
                            sweep_expired(&dir, retention, SystemTime::now())
                        })
                        .await;
                        match outcome {
                            Ok(Ok(report)) => log::debug!("Retention sweep: {:?}", report),
                            Ok(Err(e)) => log::warn!("Retention sweep failed: {}", e),
                            Err(e) => log::warn!("Retention sweep task failed: {}", e),
                        }
                    }
                }
            }
            log::info!("Retention sweep stopped");
        });

        SweepHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Owned handle to a running retention sweep
#[derive(Debug)]
pub struct SweepHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweep to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            log::warn!("Retention sweep ended abnormally: {}", e);
        }
    }

    /// True once the sweep task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(path: &Path, modified: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    fn whole_second_now() -> SystemTime {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_sweep_removes_only_strictly_older_files() {
        let dir = tempfile::tempdir().unwrap();
        let now = whole_second_now();
        let retention = Duration::from_secs(600);

        let old = dir.path().join("old.mp3");
        let boundary = dir.path().join("boundary.wav");
        let fresh = dir.path().join("fresh.wav");
        touch(&old, now - Duration::from_secs(1200));
        touch(&boundary, now - retention);
        touch(&fresh, now - Duration::from_secs(60));

        let subdir = dir.path().join("keep");
        std::fs::create_dir(&subdir).unwrap();

        let report = sweep_expired(dir.path(), retention, now).unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!old.exists());
        assert!(boundary.exists());
        assert!(fresh.exists());
        assert!(subdir.exists());
    }

    #[test]
    fn test_sweep_of_missing_dir_is_an_error() {
        let result = sweep_expired(
            Path::new("/nonexistent/keyshift-sweep"),
            Duration::from_secs(1),
            SystemTime::now(),
        );
        assert!(matches!(result, Err(AudioError::StorageError(_))));
    }

    #[tokio::test]
    async fn test_background_sweep_runs_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("stale.wav");
        touch(&old, SystemTime::now() - Duration::from_secs(3600));

        let handle = RetentionSweeper::new(
            dir.path(),
            Duration::from_secs(600),
            Duration::from_millis(20),
        )
        .start();

        for _ in 0..100 {
            if !old.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!old.exists());
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }
}
