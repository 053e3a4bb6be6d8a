use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::file_utils::FileManager;

/// Eager and delayed removal of render intermediates.
///
/// Delayed removal keeps failed runs around for inspection. It is best
/// effort: a process that exits before the retention window elapses leaves
/// the files behind unless `flush()` runs first, and the next start-up
/// `sweep()` picks up whatever is left.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    retention: Duration,
    pending: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupScheduler {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Paths waiting for delayed removal
    pub fn pending(&self) -> Vec<PathBuf> {
        self.pending.lock().clone()
    }

    /// Remove a file or directory now
    pub async fn remove_now(&self, path: &Path) {
        remove_path(path).await;
        self.pending.lock().retain(|p| p != path);
    }

    /// Remove `path` once the retention window has elapsed
    pub fn schedule(&self, path: PathBuf) {
        debug!("Scheduling removal of {:?} in {:?}", path, self.retention);
        self.pending.lock().push(path.clone());

        let pending = self.pending.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;

            // A flush may already have taken it
            let still_pending = {
                let mut pending = pending.lock();
                let before = pending.len();
                pending.retain(|p| p != &path);
                pending.len() != before
            };
            if still_pending {
                remove_path(&path).await;
            }
        });
    }

    /// Run every pending removal immediately, returning how many ran
    pub async fn flush(&self) -> usize {
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.pending.lock());
        for path in &paths {
            remove_path(path).await;
        }
        paths.len()
    }

    /// Remove leftover run directories under `root` older than the retention window
    pub fn sweep(&self, root: &Path) -> usize {
        match FileManager::sweep_stale_dirs(root, self.retention) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to sweep {:?}: {}", root, e);
                0
            }
        }
    }
}

async fn remove_path(path: &Path) {
    let result = if path.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}
