//! Host-side tools attached to a running job.

use std::path::PathBuf;
use std::process::Command;

use bpm_common::error::{BpmError, Result};

/// Arguments passed to `strace` before the target pid.
const STRACE_ARGS: &[&str] = &["-s", "100", "-f", "-y", "-yy", "-p"];

/// Locates `strace` on `PATH`.
///
/// # Errors
///
/// Returns a configuration error if `strace` is not installed.
pub fn strace_binary() -> Result<PathBuf> {
    which::which("strace").map_err(|e| BpmError::Config {
        message: format!("strace is required to trace jobs: {e}"),
    })
}

/// Builds a `strace` invocation following every thread of `pid`.
#[must_use]
pub fn trace_command(strace: PathBuf, pid: i32) -> Command {
    tracing::debug!(pid, strace = %strace.display(), "building trace command");
    let mut command = Command::new(strace);
    let _ = command.args(STRACE_ARGS).arg(pid.to_string());
    command
}
