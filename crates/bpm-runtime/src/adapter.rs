//! Translates a process description into filesystem prerequisites and a
//! runtime configuration.
//!
//! Side effects stop at the filesystem: nothing here talks to the runtime.

use std::fs::File;
use std::path::PathBuf;

use bpm_common::config::{ProcessConfig, split_env};
use bpm_common::constants::{BUNDLE_ROOTFS_DIR, CGROUP_PATH};
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::HostLayout;
use bpm_common::types::JobIdentity;
use bpm_core::capability::capabilities_for;
use bpm_core::cgroup::{CgroupProbe, resolve_limits};
use bpm_core::filesystem::mount::{MountOrigin, MountPlanner};
use bpm_core::filesystem::{MASKED_PATHS, READONLY_PATHS, host_system_dirs};
use bpm_core::namespace::NamespaceConfig;
use bpm_core::oci::{self, Linux, Process, Root, Spec, User};

use crate::logs::{chown_to, ensure_dir, open_append};

/// `PATH` given to jobs that do not set one.
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Locale given to every job.
pub const DEFAULT_LANG: &str = "en_US.UTF-8";

/// Scratch directory as seen from inside the container.
const CONTAINER_TMPDIR: &str = "/tmp";

/// Builds job prerequisites and runtime configurations for one host.
#[derive(Debug, Clone)]
pub struct RuncAdapter {
    layout: HostLayout,
    probe: CgroupProbe,
    system_dirs: Vec<PathBuf>,
}

impl RuncAdapter {
    /// Creates an adapter probing the host's cgroup hierarchy and binding
    /// the host userland directories that exist.
    #[must_use]
    pub fn new(layout: HostLayout) -> Self {
        Self {
            layout,
            probe: CgroupProbe::new(CGROUP_PATH),
            system_dirs: host_system_dirs(),
        }
    }

    /// Probes a different cgroup hierarchy.
    #[must_use]
    pub fn with_cgroup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.probe = CgroupProbe::new(root);
        self
    }

    /// Binds `dirs` as the container userland instead of the host's.
    #[must_use]
    pub fn with_system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = dirs;
        self
    }

    /// Host layout this adapter writes into.
    #[must_use]
    pub const fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Creates the job's directories and opens its log files.
    ///
    /// Directories and files are created if absent and reused otherwise.
    /// Log files are opened for append and never truncated. Writable paths
    /// are handed to `user`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error naming the path that could not be prepared.
    pub fn create_job_prerequisites(
        &self,
        id: &JobIdentity,
        config: &ProcessConfig,
        user: &User,
    ) -> Result<(File, File)> {
        let layout = &self.layout;
        let mounts = self.planner(id).plan(config)?;

        ensure_dir(&layout.pid_dir(id))?;
        let mut owned = vec![
            layout.log_dir(id),
            layout.run_dir(id),
            layout.data_dir(id),
            layout.tmp_dir(id),
        ];
        if config.persistent_disk {
            owned.push(layout.store_dir(id));
        }
        for dir in &owned {
            ensure_dir(dir)?;
            chown_to(dir, user)?;
        }

        for volume in mounts
            .iter()
            .filter(|m| m.origin == MountOrigin::Volume && !m.mount_only)
        {
            ensure_dir(&volume.source)?;
            chown_to(&volume.source, user)?;
        }

        let stdout_path = layout.stdout_log(id);
        let stderr_path = layout.stderr_log(id);
        let stdout = open_append(&stdout_path)?;
        let stderr = open_append(&stderr_path)?;
        chown_to(&stdout_path, user)?;
        chown_to(&stderr_path, user)?;

        tracing::debug!(id = %id, "job prerequisites ready");
        Ok((stdout, stderr))
    }

    /// Builds the runtime configuration for the job.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid limits or environment
    /// entries, or a validation error from mount planning.
    pub fn build_spec(&self, id: &JobIdentity, config: &ProcessConfig, user: &User) -> Result<Spec> {
        let privileged = config.is_privileged();
        let limits = resolve_limits(config.limits.as_ref(), self.probe.swap_supported())?;
        let mounts = self.planner(id).plan(config)?;

        let cwd = match &config.workdir {
            Some(dir) => dir.clone(),
            None => self
                .layout
                .container_path(&self.layout.job_dir(id))
                .ok_or_else(|| BpmError::Config {
                    message: "job directory is outside the host root".into(),
                })?,
        };

        let mut args = Vec::with_capacity(config.args.len() + 1);
        args.push(config.executable.clone());
        args.extend(config.args.iter().cloned());

        let spec = Spec {
            oci_version: oci::OCI_VERSION.into(),
            process: Process {
                terminal: false,
                user: user.clone(),
                args,
                env: job_env(&config.env)?,
                cwd: cwd.to_string_lossy().into_owned(),
                capabilities: Some(capabilities_for(privileged)),
                rlimits: limits.rlimits,
                no_new_privileges: !privileged,
            },
            root: Root {
                path: BUNDLE_ROOTFS_DIR.into(),
                readonly: false,
            },
            hostname: Some(id.container_id().as_str().to_string()),
            mounts: mounts.iter().map(|m| m.to_oci()).collect(),
            linux: Linux {
                namespaces: NamespaceConfig::default().to_oci(),
                resources: limits.resources,
                masked_paths: MASKED_PATHS.iter().map(ToString::to_string).collect(),
                readonly_paths: READONLY_PATHS.iter().map(ToString::to_string).collect(),
            },
        };
        tracing::debug!(id = %id, privileged, mounts = spec.mounts.len(), "built spec");
        Ok(spec)
    }

    fn planner<'a>(&'a self, id: &'a JobIdentity) -> MountPlanner<'a> {
        MountPlanner::new(&self.layout, id).with_system_dirs(self.system_dirs.clone())
    }
}

/// The job's environment plus the variables bpm always sets.
///
/// `TMPDIR` and `LANG` are fixed; `PATH` is only supplied when the job does
/// not set it.
///
/// # Errors
///
/// Returns a configuration error for an entry without `=`.
pub fn job_env(configured: &[String]) -> Result<Vec<String>> {
    let mut env = Vec::with_capacity(configured.len() + 3);
    let mut has_path = false;
    for entry in configured {
        let (key, _) = split_env(entry)?;
        match key {
            "TMPDIR" | "LANG" => {}
            "PATH" => {
                has_path = true;
                env.push(entry.clone());
            }
            _ => env.push(entry.clone()),
        }
    }
    if !has_path {
        env.push(format!("PATH={DEFAULT_PATH}"));
    }
    env.push(format!("TMPDIR={CONTAINER_TMPDIR}"));
    env.push(format!("LANG={DEFAULT_LANG}"));
    Ok(env)
}
