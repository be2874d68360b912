//! Mount planning for job containers.
//!
//! The planner produces every mount a job container needs: kernel
//! filesystems, the read-only host userland, the job's own directories,
//! the cgroup hierarchy and any requested volumes. The result is ordered by
//! destination depth so a parent is always mounted before anything nested
//! under it, with ties broken lexically.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use bpm_common::config::{ProcessConfig, Volume};
use bpm_common::constants::{CGROUP_PATH, CONTAINER_ROOT};
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::{HostLayout, is_normalized_absolute};
use bpm_common::types::JobIdentity;

use crate::oci;

use super::DEFAULT_SYSTEM_DIRS;

/// Container subtrees owned by the runtime's kernel filesystems.
const RESERVED_ROOTS: &[&str] = &["/proc", "/sys", "/dev"];

/// Container roots a restricted volume may live under.
const VOLUME_ROOTS: &[&str] = &[
    "/var/vcap/data",
    "/var/vcap/store",
    "/var/vcap/sys/run",
];

/// Where a mount comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountOrigin {
    /// Kernel filesystem or read-only host userland.
    System,
    /// One of the job's own directories.
    Job,
    /// A volume requested by the process description.
    Volume,
    /// The cgroup hierarchy.
    Cgroup,
}

impl fmt::Display for MountOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Job => "job",
            Self::Volume => "volume",
            Self::Cgroup => "cgroup",
        };
        f.write_str(s)
    }
}

/// A planned mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Host path, or the pseudo-filesystem name.
    pub source: PathBuf,
    /// Absolute path inside the container.
    pub destination: PathBuf,
    /// Filesystem type (`bind`, `proc`, `tmpfs`, ...).
    pub fs_type: String,
    /// Mount options, including `ro`/`rw` for binds.
    pub options: Vec<String>,
    /// Where the mount comes from.
    pub origin: MountOrigin,
    /// Bind an existing source without creating it.
    pub mount_only: bool,
}

impl Mount {
    /// Number of path elements in the destination.
    #[must_use]
    pub fn depth(&self) -> usize {
        path_depth(&self.destination)
    }

    /// True for a read-write bind.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.options.iter().any(|o| o == "rw")
    }

    /// Converts into a runtime configuration entry.
    #[must_use]
    pub fn to_oci(&self) -> oci::Mount {
        oci::Mount {
            destination: self.destination.to_string_lossy().into_owned(),
            mount_type: self.fs_type.clone(),
            source: self.source.to_string_lossy().into_owned(),
            options: self.options.clone(),
        }
    }

    fn kernel(destination: &str, fs_type: &str, source: &str, options: &[&str]) -> Self {
        Self {
            source: PathBuf::from(source),
            destination: PathBuf::from(destination),
            fs_type: fs_type.into(),
            options: options.iter().map(ToString::to_string).collect(),
            origin: MountOrigin::System,
            mount_only: false,
        }
    }

    fn bind(source: PathBuf, destination: PathBuf, access: Access, origin: MountOrigin) -> Self {
        let mut options = vec!["nodev", "nosuid", "rbind"];
        options.push(if access.writable { "rw" } else { "ro" });
        if !access.exec {
            options.push("noexec");
        }
        Self {
            source,
            destination,
            fs_type: "bind".into(),
            options: options.into_iter().map(String::from).collect(),
            origin,
            mount_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Access {
    writable: bool,
    exec: bool,
}

const READ_ONLY: Access = Access {
    writable: false,
    exec: true,
};
const WRITABLE: Access = Access {
    writable: true,
    exec: true,
};
const WRITABLE_NOEXEC: Access = Access {
    writable: true,
    exec: false,
};

/// Computes the ordered mount list for one job process.
#[derive(Debug, Clone)]
pub struct MountPlanner<'a> {
    layout: &'a HostLayout,
    identity: &'a JobIdentity,
    system_dirs: Vec<PathBuf>,
}

impl<'a> MountPlanner<'a> {
    /// Creates a planner binding every default system directory.
    #[must_use]
    pub fn new(layout: &'a HostLayout, identity: &'a JobIdentity) -> Self {
        Self {
            layout,
            identity,
            system_dirs: DEFAULT_SYSTEM_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replaces the host userland directories to bind.
    #[must_use]
    pub fn with_system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = dirs;
        self
    }

    /// Plans every mount for `config`.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending path if a volume is
    /// not a clean absolute path, lies outside the permitted roots, targets
    /// a reserved destination, or is requested twice.
    pub fn plan(&self, config: &ProcessConfig) -> Result<Vec<Mount>> {
        let mut mounts = Self::kernel_mounts();
        mounts.extend(self.system_dir_mounts());
        mounts.extend(self.job_mounts(config));
        mounts.push(Self::cgroup_mount());
        let base = mounts.len();

        let mut taken = BTreeSet::new();
        let restricted = config.volumes.iter().map(|v| (v, true));
        let unrestricted = config.unrestricted_volumes().iter().map(|v| (v, false));
        for (volume, restrict) in restricted.chain(unrestricted) {
            let mount = self.volume_mount(volume, restrict, &mounts[..base])?;
            if !taken.insert(mount.destination.clone()) {
                return Err(BpmError::Validation {
                    message: format!("duplicate volume {}", volume.path.display()),
                });
            }
            mounts.push(mount);
        }

        sort_mounts(&mut mounts);
        tracing::debug!(
            id = %self.identity,
            count = mounts.len(),
            "planned mounts"
        );
        Ok(mounts)
    }

    fn kernel_mounts() -> Vec<Mount> {
        vec![
            Mount::kernel("/proc", "proc", "proc", &["nosuid", "noexec", "nodev"]),
            Mount::kernel(
                "/dev",
                "tmpfs",
                "tmpfs",
                &["nosuid", "strictatime", "mode=755", "size=65536k"],
            ),
            Mount::kernel(
                "/dev/pts",
                "devpts",
                "devpts",
                &[
                    "nosuid",
                    "noexec",
                    "newinstance",
                    "ptmxmode=0666",
                    "mode=0620",
                    "gid=5",
                ],
            ),
            Mount::kernel(
                "/dev/shm",
                "tmpfs",
                "shm",
                &["nosuid", "noexec", "nodev", "mode=1777", "size=65536k"],
            ),
            Mount::kernel(
                "/dev/mqueue",
                "mqueue",
                "mqueue",
                &["nosuid", "noexec", "nodev"],
            ),
            Mount::kernel("/sys", "sysfs", "sysfs", &["nosuid", "noexec", "nodev", "ro"]),
        ]
    }

    fn system_dir_mounts(&self) -> impl Iterator<Item = Mount> + '_ {
        self.system_dirs
            .iter()
            .map(|dir| Mount::bind(dir.clone(), dir.clone(), READ_ONLY, MountOrigin::System))
    }

    fn cgroup_mount() -> Mount {
        Mount {
            source: PathBuf::from("cgroup"),
            destination: PathBuf::from(CGROUP_PATH),
            fs_type: "cgroup".into(),
            options: ["nosuid", "noexec", "nodev", "relatime", "ro"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            origin: MountOrigin::Cgroup,
            mount_only: false,
        }
    }

    fn job_mounts(&self, config: &ProcessConfig) -> Vec<Mount> {
        let layout = self.layout;
        let id = self.identity;
        let root = layout.root();

        let mut binds = vec![
            (layout.job_dir(id), READ_ONLY),
            (root.join("packages"), READ_ONLY),
            (root.join("data").join("packages"), READ_ONLY),
            (layout.log_dir(id), WRITABLE_NOEXEC),
            (layout.run_dir(id), WRITABLE_NOEXEC),
        ];
        if config.ephemeral_disk {
            binds.push((layout.data_dir(id), WRITABLE));
        }
        if config.persistent_disk {
            binds.push((layout.store_dir(id), WRITABLE));
        }

        let mut mounts: Vec<Mount> = binds
            .into_iter()
            .filter_map(|(host, access)| {
                let inside = layout.container_path(&host)?;
                Some(Mount::bind(host, inside, access, MountOrigin::Job))
            })
            .collect();

        let tmp = layout.tmp_dir(id);
        for dest in ["/tmp", "/var/tmp"] {
            mounts.push(Mount::bind(
                tmp.clone(),
                PathBuf::from(dest),
                WRITABLE,
                MountOrigin::Job,
            ));
        }
        mounts
    }

    fn volume_mount(&self, volume: &Volume, restrict: bool, planned: &[Mount]) -> Result<Mount> {
        let path = volume.path.as_path();
        let invalid = |reason: String| BpmError::Validation {
            message: format!("{}: {reason}", path.display()),
        };

        if !is_normalized_absolute(path) {
            return Err(invalid("volume path must be absolute and normalized".into()));
        }
        if path == Path::new("/") {
            return Err(invalid("cannot mount over the container root".into()));
        }
        if let Some(reserved) = RESERVED_ROOTS.iter().find(|r| path.starts_with(r)) {
            return Err(invalid(format!("conflicts with reserved path {reserved}")));
        }
        if restrict
            && !VOLUME_ROOTS
                .iter()
                .any(|r| path.starts_with(r) && path != Path::new(r))
        {
            return Err(invalid(format!(
                "volumes must be within {}",
                VOLUME_ROOTS.join(", ")
            )));
        }
        if let Some(existing) = planned.iter().find(|m| m.destination == path) {
            return Err(invalid(format!(
                "conflicts with {} mount at the same destination",
                existing.origin
            )));
        }

        let source = if path.starts_with(CONTAINER_ROOT) {
            self.layout
                .host_path(path)
                .ok_or_else(|| invalid("cannot resolve host path".into()))?
        } else {
            path.to_path_buf()
        };

        let access = Access {
            writable: volume.writable,
            exec: volume.allow_executions,
        };
        let mut mount = Mount::bind(source, path.to_path_buf(), access, MountOrigin::Volume);
        mount.mount_only = volume.mount_only;
        Ok(mount)
    }
}

/// Sorts mounts by destination depth, then lexically by destination.
pub fn sort_mounts(mounts: &mut [Mount]) {
    mounts.sort_by(|a, b| {
        a.depth()
            .cmp(&b.depth())
            .then_with(|| a.destination.cmp(&b.destination))
    });
}

fn path_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}
