//! Host commands run on a job's behalf, such as the pre-start hook.

use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use bpm_common::config::split_env;
use bpm_common::error::{BpmError, Result};

/// Runs host commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the command cannot be spawned.
    fn run(&self, command: &mut Command) -> std::io::Result<ExitStatus>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &mut Command) -> std::io::Result<ExitStatus> {
        command.status()
    }
}

/// Builds the pre-start hook invocation.
///
/// The hook sees only the job's environment and appends to the job's logs.
///
/// # Errors
///
/// Returns an I/O error if the log handles cannot be duplicated, or a
/// configuration error for a malformed environment entry.
pub fn pre_start_command(
    hook: &Path,
    env: &[String],
    stdout: &File,
    stderr: &File,
    log_path: &Path,
) -> Result<Command> {
    let mut command = Command::new(hook);
    let _ = command.env_clear();
    for entry in env {
        let (key, value) = split_env(entry)?;
        let _ = command.env(key, value);
    }
    let out = stdout.try_clone().map_err(|e| BpmError::io(log_path, e))?;
    let err = stderr.try_clone().map_err(|e| BpmError::io(log_path, e))?;
    let _ = command
        .stdin(Stdio::null())
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err));
    Ok(command)
}

/// Runs the pre-start hook and maps a failing exit into an error.
///
/// # Errors
///
/// Returns a runtime error if the hook cannot be spawned or exits non-zero.
pub fn run_pre_start(runner: &dyn CommandRunner, hook: &Path, mut command: Command) -> Result<()> {
    tracing::info!(hook = %hook.display(), "running pre-start hook");
    let status = runner.run(&mut command).map_err(|e| BpmError::Runtime {
        operation: "pre-start",
        message: format!("failed to run {}: {e}", hook.display()),
    })?;
    if status.success() {
        tracing::info!(hook = %hook.display(), "pre-start hook complete");
        Ok(())
    } else {
        Err(BpmError::Runtime {
            operation: "pre-start",
            message: format!("{} exited with {status}", hook.display()),
        })
    }
}
