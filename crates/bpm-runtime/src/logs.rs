//! Job log files and directory preparation.
//!
//! Every helper is idempotent: existing directories and files are reused,
//! and log files are opened for append so prior output is never truncated.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::unistd::{Gid, Uid, chown};

use bpm_common::error::{BpmError, Result};
use bpm_core::oci::User;

/// Creates `path` and any missing parents.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| BpmError::io(path, e))
}

/// Opens a log file for appending, creating it and its directory if absent.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BpmError::io(path, e))
}

/// Hands `path` to `user`.
///
/// # Errors
///
/// Returns an I/O error if ownership cannot be changed.
pub fn chown_to(path: &Path, user: &User) -> Result<()> {
    chown(
        path,
        Some(Uid::from_raw(user.uid)),
        Some(Gid::from_raw(user.gid)),
    )
    .map_err(|errno| BpmError::io(path, std::io::Error::from(errno)))
}
