//! Per-job advisory lock.
//!
//! Lifecycle commands run as separate processes, so mutual exclusion uses an
//! exclusive `flock(2)` on a lock file keyed by the job identity. The lock is
//! released when the guard is dropped, on every exit path.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use bpm_common::error::{BpmError, Result};

/// Exclusive lock held for the duration of one lifecycle operation.
#[derive(Debug)]
pub struct JobLock {
    _flock: Flock<File>,
    path: PathBuf,
}

impl JobLock {
    /// Blocks until the lock at `path` is held exclusively.
    ///
    /// Creates the lock file and its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or locked.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BpmError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| BpmError::io(path, e))?;

        tracing::debug!(path = %path.display(), "waiting for job lock");
        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| BpmError::io(path, std::io::Error::from(errno)))?;
        tracing::debug!(path = %path.display(), "job lock acquired");

        Ok(Self {
            _flock: flock,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "job lock released");
    }
}
