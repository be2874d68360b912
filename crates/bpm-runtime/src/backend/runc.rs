//! [`RuntimeClient`] backed by the `runc` command line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use nix::sys::signal::Signal;

use bpm_common::constants::{BUNDLE_CONFIG_FILE, BUNDLE_ROOTFS_DIR};
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::HostLayout;
use bpm_common::types::ContainerId;
use bpm_core::oci::{Spec, User};

use super::{ProcessIo, RuntimeClient};
use crate::logs::{chown_to, ensure_dir};
use crate::state::ContainerRecord;

/// Drives containers through a `runc` binary with a private state root.
#[derive(Debug, Clone)]
pub struct RuncClient {
    binary: PathBuf,
    root: PathBuf,
}

impl RuncClient {
    /// Creates a client for `binary` keeping state under `root`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            root: root.into(),
        }
    }

    /// Uses the packaged `runc` when installed, otherwise the one on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no `runc` binary can be found.
    pub fn from_layout(layout: &HostLayout) -> Result<Self> {
        let packaged = layout.runc_binary();
        let binary = if packaged.exists() {
            packaged
        } else {
            which::which("runc").map_err(|e| BpmError::Config {
                message: format!(
                    "runc not found at {} or on PATH: {e}",
                    packaged.display()
                ),
            })?
        };
        tracing::debug!(binary = %binary.display(), "using runc");
        Ok(Self::new(binary, layout.runc_root()))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        let _ = command.arg("--root").arg(&self.root);
        command
    }

    fn run_command(&self, pid_file: &Path, bundle: &Path, id: &ContainerId) -> Command {
        let mut command = self.command();
        let _ = command
            .arg("run")
            .arg("--bundle")
            .arg(bundle)
            .arg("--pid-file")
            .arg(pid_file)
            .arg("--detach")
            .arg(id.as_str());
        command
    }

    fn attached_command(&self, bundle: &Path, id: &ContainerId) -> Command {
        let mut command = self.command();
        let _ = command.arg("run").arg("--bundle").arg(bundle).arg(id.as_str());
        command
    }

    fn exec_command(&self, id: &ContainerId, program: &str) -> Command {
        let term = std::env::var("TERM").unwrap_or_else(|_| "xterm".into());
        let mut command = self.command();
        let _ = command
            .args(["exec", "--tty", "--env"])
            .arg(format!("TERM={term}"))
            .arg(id.as_str())
            .arg(program);
        command
    }

    fn state_command(&self, id: &ContainerId) -> Command {
        let mut command = self.command();
        let _ = command.arg("state").arg(id.as_str());
        command
    }

    fn list_command(&self) -> Command {
        let mut command = self.command();
        let _ = command.args(["list", "--format", "json"]);
        command
    }

    fn kill_command(&self, id: &ContainerId, signal: Signal) -> Command {
        let mut command = self.command();
        let _ = command.arg("kill").arg(id.as_str()).arg(signal.as_str());
        command
    }

    fn delete_command(&self, id: &ContainerId) -> Command {
        let mut command = self.command();
        let _ = command.args(["delete", "--force"]).arg(id.as_str());
        command
    }

    fn output(operation: &'static str, command: &mut Command) -> Result<Output> {
        command
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BpmError::Runtime {
                operation,
                message: e.to_string(),
            })
    }

    fn checked(operation: &'static str, command: &mut Command) -> Result<Output> {
        let output = Self::output(operation, command)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(runtime_error(operation, &output))
        }
    }
}

impl RuntimeClient for RuncClient {
    fn create_bundle(&self, bundle: &Path, spec: &Spec, user: &User) -> Result<()> {
        ensure_dir(bundle)?;
        std::fs::set_permissions(bundle, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| BpmError::io(bundle, e))?;

        let config_path = bundle.join(BUNDLE_CONFIG_FILE);
        let mut config = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&config_path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    BpmError::Runtime {
                        operation: "create bundle",
                        message: format!("bundle already exists at {}", bundle.display()),
                    }
                } else {
                    BpmError::io(&config_path, e)
                }
            })?;
        config
            .write_all(spec.to_json()?.as_bytes())
            .map_err(|e| BpmError::io(&config_path, e))?;

        let rootfs = bundle.join(BUNDLE_ROOTFS_DIR);
        ensure_dir(&rootfs)?;
        chown_to(&rootfs, user)?;
        tracing::info!(bundle = %bundle.display(), "bundle created");
        Ok(())
    }

    fn run_container(
        &self,
        pid_file: &Path,
        bundle: &Path,
        id: &ContainerId,
        stdout: File,
        stderr: File,
    ) -> Result<()> {
        tracing::info!(id = %id, bundle = %bundle.display(), "running container");
        let status = self
            .run_command(pid_file, bundle, id)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|e| BpmError::Runtime {
                operation: "run",
                message: e.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(BpmError::Runtime {
                operation: "run",
                message: format!("runc exited with {status}; see the job's stderr log"),
            })
        }
    }

    fn run_container_attached(
        &self,
        bundle: &Path,
        id: &ContainerId,
        io: ProcessIo,
    ) -> Result<i32> {
        tracing::info!(id = %id, bundle = %bundle.display(), "running attached container");
        let status = self
            .attached_command(bundle, id)
            .stdin(io.stdin)
            .stdout(io.stdout)
            .stderr(io.stderr)
            .status()
            .map_err(|e| BpmError::Runtime {
                operation: "run",
                message: e.to_string(),
            })?;
        Ok(exit_code(status))
    }

    fn exec(&self, id: &ContainerId, command: &str, io: ProcessIo) -> Result<i32> {
        tracing::info!(id = %id, command, "exec into container");
        let status = self
            .exec_command(id, command)
            .stdin(io.stdin)
            .stdout(io.stdout)
            .stderr(io.stderr)
            .status()
            .map_err(|e| BpmError::Runtime {
                operation: "exec",
                message: e.to_string(),
            })?;
        Ok(exit_code(status))
    }

    fn container_state(&self, id: &ContainerId) -> Result<Option<ContainerRecord>> {
        let output = Self::output("state", &mut self.state_command(id))?;
        if output.status.success() {
            let record = serde_json::from_slice(&output.stdout)?;
            return Ok(Some(record));
        }
        if is_not_exist(&output.stderr) {
            tracing::debug!(id = %id, "container does not exist");
            return Ok(None);
        }
        Err(runtime_error("state", &output))
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let output = Self::checked("list", &mut self.list_command())?;
        parse_list(&output.stdout)
    }

    fn signal_container(&self, id: &ContainerId, signal: Signal) -> Result<()> {
        tracing::info!(id = %id, signal = signal.as_str(), "signalling container");
        let _ = Self::checked("kill", &mut self.kill_command(id, signal))?;
        Ok(())
    }

    fn delete_container(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id, "deleting container");
        let _ = Self::checked("delete", &mut self.delete_command(id))?;
        Ok(())
    }

    fn destroy_bundle(&self, bundle: &Path) -> Result<()> {
        match std::fs::remove_dir_all(bundle) {
            Ok(()) => {
                tracing::info!(bundle = %bundle.display(), "bundle destroyed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BpmError::io(bundle, e)),
        }
    }
}

fn is_not_exist(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("does not exist")
}

fn parse_list(stdout: &[u8]) -> Result<Vec<ContainerRecord>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let records: Option<Vec<ContainerRecord>> = serde_json::from_slice(stdout)?;
    Ok(records.unwrap_or_default())
}

fn runtime_error(operation: &'static str, output: &Output) -> BpmError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("runc exited with {}", output.status)
    } else {
        stderr
    };
    BpmError::Runtime { operation, message }
}

/// Exit code of a child, using the shell's `128 + signal` convention.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}
