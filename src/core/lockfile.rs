//! Single-instance pid lock.
//!
//! An exclusive non-blocking `flock` on a pid file under the app config dir.
//! Held for the lifetime of the `run` loop; a second instance fails fast with
//! [`SyncwatchError::LockHeld`] instead of fighting over the same daemons.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::core::errors::{Result, SyncwatchError};

/// Held process lock. Releasing is dropping.
pub struct LockFile {
    path: PathBuf,
    // Kept only for the flock lifetime.
    _lock: Flock<std::fs::File>,
}

impl LockFile {
    /// Acquire the lock, writing our pid into the file.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncwatchError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| SyncwatchError::io(path, e))?;

        let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, _errno)) => {
                return Err(SyncwatchError::LockHeld {
                    path: path.to_path_buf(),
                });
            }
        };

        writeln!(lock, "{}", std::process::id()).map_err(|e| SyncwatchError::io(path, e))?;
        lock.flush().map_err(|e| SyncwatchError::io(path, e))?;
        debug!(path = %path.display(), "lock file acquired");

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Path of the underlying pid file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // The flock itself is released when the file handle drops; the stale
        // pid file is harmless but tidy to remove.
        let _ = fs::remove_file(&self.path);
        debug!(path = %self.path.display(), "lock file released");
    }
}
