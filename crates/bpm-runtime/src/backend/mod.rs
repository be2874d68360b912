//! Contract over the external container runtime.
//!
//! The lifecycle code depends only on [`RuntimeClient`]; the `runc`
//! implementation and the in-memory test doubles are interchangeable.

pub mod runc;

use std::fs::File;
use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::Signal;

use bpm_common::error::Result;
use bpm_common::types::ContainerId;
use bpm_core::oci::{Spec, User};

use crate::state::ContainerRecord;

/// Standard streams handed to an attached container process.
#[derive(Debug)]
pub struct ProcessIo {
    /// Standard input.
    pub stdin: Stdio,
    /// Standard output.
    pub stdout: Stdio,
    /// Standard error.
    pub stderr: Stdio,
}

impl ProcessIo {
    /// Inherits the caller's terminal.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            stdin: Stdio::inherit(),
            stdout: Stdio::inherit(),
            stderr: Stdio::inherit(),
        }
    }

    /// Discards all streams.
    #[must_use]
    pub fn null() -> Self {
        Self {
            stdin: Stdio::null(),
            stdout: Stdio::null(),
            stderr: Stdio::null(),
        }
    }
}

/// Operations bpm needs from a container runtime.
///
/// `container_state` returns `Ok(None)` rather than an error for an unknown
/// container, and stopped containers stay listed until deleted. The
/// lifecycle's idempotency rules depend on both.
pub trait RuntimeClient: Send + Sync {
    /// Writes the runtime configuration and root filesystem into `bundle`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bundle` already holds a configuration or the
    /// files cannot be written.
    fn create_bundle(&self, bundle: &Path, spec: &Spec, user: &User) -> Result<()>;

    /// Creates and starts a detached container, writing its pid to
    /// `pid_file`. Returns once the container is started.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the container cannot be started.
    fn run_container(
        &self,
        pid_file: &Path,
        bundle: &Path,
        id: &ContainerId,
        stdout: File,
        stderr: File,
    ) -> Result<()>;

    /// Runs a container attached to `io` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the container cannot be started.
    fn run_container_attached(&self, bundle: &Path, id: &ContainerId, io: ProcessIo)
    -> Result<i32>;

    /// Runs `command` inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the session cannot be started.
    fn exec(&self, id: &ContainerId, command: &str, io: ProcessIo) -> Result<i32>;

    /// Looks up one container; `None` when the runtime does not know it.
    ///
    /// # Errors
    ///
    /// Returns a runtime error for any failure other than absence.
    fn container_state(&self, id: &ContainerId) -> Result<Option<ContainerRecord>>;

    /// Every container the runtime knows about, in any status.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the runtime cannot be queried.
    fn list_containers(&self) -> Result<Vec<ContainerRecord>>;

    /// Sends `signal` to the container's init process.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the signal cannot be delivered.
    fn signal_container(&self, id: &ContainerId, signal: Signal) -> Result<()>;

    /// Deletes the container, killing it if still running.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if deletion fails.
    fn delete_container(&self, id: &ContainerId) -> Result<()>;

    /// Removes the bundle directory. A missing bundle is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be removed.
    fn destroy_bundle(&self, bundle: &Path) -> Result<()>;
}
