//! Age-based cleanup of orphaned temp files.
//!
//! Temp files normally disappear with the render that created them. Files
//! left behind by a crashed process are removed here once they are older
//! than the configured threshold. Only names this crate generates are
//! touched; anything else in the directory is left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::TEMP_PREFIXES;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub kept: usize,
}

fn is_ours(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| TEMP_PREFIXES.iter().any(|p| n.starts_with(p)))
}

/// Delete generated temp files in `dir` whose modification time is older
/// than `max_age`. A missing directory is an empty sweep.
pub fn sweep_stale(dir: &Path, max_age: Duration) -> io::Result<SweepStats> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SweepStats::default()),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut stats = SweepStats::default();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !is_ours(&path) {
            continue;
        }
        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if age > max_age {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "stale temp file removed");
                    stats.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove stale temp file");
                    stats.kept += 1;
                }
            }
        } else {
            stats.kept += 1;
        }
    }

    Ok(stats)
}

/// Run [`sweep_stale`] on `dir` every `interval` until the task is aborted.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sweeper(dir: PathBuf, max_age: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let target = dir.clone();
            match tokio::task::spawn_blocking(move || sweep_stale(&target, max_age)).await {
                Ok(Ok(stats)) if stats.removed > 0 => {
                    info!(
                        dir = %dir.display(),
                        removed = stats.removed,
                        remaining = stats.kept,
                        "swept stale temp files"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(dir = %dir.display(), error = %e, "temp sweep failed"),
                Err(e) => warn!(error = %e, "temp sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_only_removes_old_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let ours = dir.path().join("img_1234.png");
        let download = dir.path().join("download_abcd.jpg");
        let foreign = dir.path().join("notes.txt");
        for p in [&ours, &download, &foreign] {
            fs::write(p, b"x").unwrap();
        }

        // Nothing is old enough yet.
        let stats = sweep_stale(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(stats, SweepStats { removed: 0, kept: 2 });

        std::thread::sleep(Duration::from_millis(20));
        let stats = sweep_stale(dir.path(), Duration::from_millis(1)).unwrap();
        assert_eq!(stats, SweepStats { removed: 2, kept: 0 });
        assert!(!ours.exists());
        assert!(!download.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_missing_dir_is_empty_sweep() {
        let stats = sweep_stale(Path::new("/no/such/flotilla/temp"), Duration::ZERO).unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn test_sweeper_task_runs() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("img_old.png");
        fs::write(&stale, b"x").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let handle = spawn_sweeper(
            dir.path().to_path_buf(),
            Duration::from_millis(1),
            Duration::from_millis(10),
        );
        for _ in 0..50 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(!stale.exists());
    }
}
