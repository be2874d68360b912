//! Host Layout: every on-disk location bpm reads or writes.
//!
//! Computed from a root directory and a [`JobIdentity`]; nothing here is
//! persisted. The same relative layout exists inside each container under
//! [`CONTAINER_ROOT`], so every host path has a container-side twin.

use std::path::{Component, Path, PathBuf};

use crate::constants::{BOSH_ROOT_ENV, CONTAINER_ROOT, DEFAULT_BOSH_ROOT};
use crate::types::JobIdentity;

/// Filesystem layout rooted at a BOSH-style root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    root: PathBuf,
}

impl HostLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a layout from `BPM_BOSH_ROOT`, falling back to `/var/vcap`.
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var_os(BOSH_ROOT_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_BOSH_ROOT), PathBuf::from);
        Self::new(root)
    }

    /// Returns the layout root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runtime state root handed to `runc --root`.
    #[must_use]
    pub fn runc_root(&self) -> PathBuf {
        self.root.join("data").join("bpm").join("runc")
    }

    /// Packaged `runc` binary.
    #[must_use]
    pub fn runc_binary(&self) -> PathBuf {
        self.root
            .join("packages")
            .join("bpm")
            .join("bin")
            .join("runc")
    }

    /// Directory holding every job's bundles.
    #[must_use]
    pub fn bundles_root(&self) -> PathBuf {
        self.root.join("data").join("bpm").join("bundles")
    }

    /// Bundle directory for one process.
    #[must_use]
    pub fn bundle_path(&self, id: &JobIdentity) -> PathBuf {
        self.bundles_root().join(id.job()).join(id.process())
    }

    /// Default process configuration file.
    #[must_use]
    pub fn config_path(&self, id: &JobIdentity) -> PathBuf {
        self.job_dir(id)
            .join("config")
            .join("bpm")
            .join(format!("{}.yml", id.process()))
    }

    /// Rendered job directory (`jobs/<job>`).
    #[must_use]
    pub fn job_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("jobs").join(id.job())
    }

    /// Ephemeral data directory (`data/<job>`).
    #[must_use]
    pub fn data_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("data").join(id.job())
    }

    /// Job scratch directory exported as `TMPDIR`.
    #[must_use]
    pub fn tmp_dir(&self, id: &JobIdentity) -> PathBuf {
        self.data_dir(id).join("tmp")
    }

    /// Persistent store directory (`store/<job>`).
    #[must_use]
    pub fn store_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("store").join(id.job())
    }

    /// Log directory (`sys/log/<job>`).
    #[must_use]
    pub fn log_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("sys").join("log").join(id.job())
    }

    /// Captured stdout of the process.
    #[must_use]
    pub fn stdout_log(&self, id: &JobIdentity) -> PathBuf {
        self.log_dir(id).join(format!("{}.out.log", id.process()))
    }

    /// Captured stderr of the process.
    #[must_use]
    pub fn stderr_log(&self, id: &JobIdentity) -> PathBuf {
        self.log_dir(id).join(format!("{}.err.log", id.process()))
    }

    /// bpm's own diagnostic log for the job.
    #[must_use]
    pub fn bpm_log(&self, id: &JobIdentity) -> PathBuf {
        self.log_dir(id).join("bpm.log")
    }

    /// Job run directory (`sys/run/<job>`), writable inside the container.
    #[must_use]
    pub fn run_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("sys").join("run").join(id.job())
    }

    /// bpm's per-job bookkeeping directory (`sys/run/bpm/<job>`).
    #[must_use]
    pub fn pid_dir(&self, id: &JobIdentity) -> PathBuf {
        self.root.join("sys").join("run").join("bpm").join(id.job())
    }

    /// Pid file written by the runtime.
    #[must_use]
    pub fn pid_file(&self, id: &JobIdentity) -> PathBuf {
        self.pid_dir(id).join(format!("{}.pid", id.process()))
    }

    /// Advisory lock file serializing lifecycle commands.
    ///
    /// Job and process names never contain `.`, so each container ID maps to
    /// exactly one lock file.
    #[must_use]
    pub fn lock_file(&self, id: &JobIdentity) -> PathBuf {
        self.pid_dir(id).join(format!("{}.lock", id.process()))
    }

    /// Maps a host path under the root to its location inside a container.
    ///
    /// Returns `None` when `host` is outside the root.
    #[must_use]
    pub fn container_path(&self, host: &Path) -> Option<PathBuf> {
        host.strip_prefix(&self.root)
            .ok()
            .map(|rel| Path::new(CONTAINER_ROOT).join(rel))
    }

    /// Maps a container-side path under `/var/vcap` to its host location.
    ///
    /// Returns `None` when `container` is outside `/var/vcap` or is not a
    /// normalized absolute path.
    #[must_use]
    pub fn host_path(&self, container: &Path) -> Option<PathBuf> {
        if !is_normalized_absolute(container) {
            return None;
        }
        container
            .strip_prefix(CONTAINER_ROOT)
            .ok()
            .map(|rel| self.root.join(rel))
    }
}

/// True for absolute paths made only of plain components.
#[must_use]
pub fn is_normalized_absolute(path: &Path) -> bool {
    path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::RootDir | Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> JobIdentity {
        JobIdentity::new("web", None).expect("valid")
    }

    fn web_server() -> JobIdentity {
        JobIdentity::new("web", Some("server".into())).expect("valid")
    }

    #[test]
    fn job_paths_follow_bosh_layout() {
        let layout = HostLayout::new("/root");
        let id = web_server();
        assert_eq!(
            layout.config_path(&id),
            PathBuf::from("/root/jobs/web/config/bpm/server.yml")
        );
        assert_eq!(
            layout.stdout_log(&id),
            PathBuf::from("/root/sys/log/web/server.out.log")
        );
        assert_eq!(
            layout.stderr_log(&id),
            PathBuf::from("/root/sys/log/web/server.err.log")
        );
        assert_eq!(layout.bpm_log(&id), PathBuf::from("/root/sys/log/web/bpm.log"));
        assert_eq!(
            layout.pid_file(&id),
            PathBuf::from("/root/sys/run/bpm/web/server.pid")
        );
        assert_eq!(
            layout.bundle_path(&id),
            PathBuf::from("/root/data/bpm/bundles/web/server")
        );
        assert_eq!(layout.store_dir(&id), PathBuf::from("/root/store/web"));
    }

    #[test]
    fn shared_paths_are_job_independent() {
        let layout = HostLayout::new("/root");
        assert_eq!(layout.runc_root(), PathBuf::from("/root/data/bpm/runc"));
        assert_eq!(
            layout.runc_binary(),
            PathBuf::from("/root/packages/bpm/bin/runc")
        );
    }

    #[test]
    fn lock_and_bundle_follow_the_container_id() {
        let layout = HostLayout::new("/root");
        let ids = [
            web(),
            web_server(),
            JobIdentity::new("web-server", None).expect("valid"),
            JobIdentity::new("web", Some("web-server".into())).expect("valid"),
            JobIdentity::new("web_server", Some("web".into())).expect("valid"),
        ];
        for a in &ids {
            for b in &ids {
                let same_container = a.container_id() == b.container_id();
                assert_eq!(same_container, layout.lock_file(a) == layout.lock_file(b), "{a} {b}");
                assert_eq!(same_container, layout.bundle_path(a) == layout.bundle_path(b), "{a} {b}");
                assert_eq!(same_container, layout.pid_file(a) == layout.pid_file(b), "{a} {b}");
            }
        }
    }

    #[test]
    fn lock_file_is_per_process() {
        let layout = HostLayout::new("/root");
        assert_ne!(layout.lock_file(&web()), layout.lock_file(&web_server()));
    }

    #[test]
    fn container_and_host_paths_mirror_each_other() {
        let layout = HostLayout::new("/tmp/bosh");
        let host = layout.store_dir(&web());
        let inside = layout.container_path(&host).expect("under root");
        assert_eq!(inside, PathBuf::from("/var/vcap/store/web"));
        assert_eq!(layout.host_path(&inside), Some(host));
    }

    #[test]
    fn host_path_rejects_escapes() {
        let layout = HostLayout::new("/tmp/bosh");
        assert!(layout.host_path(Path::new("/etc/passwd")).is_none());
        assert!(
            layout
                .host_path(Path::new("/var/vcap/data/../../etc"))
                .is_none()
        );
        assert!(layout.host_path(Path::new("var/vcap/data")).is_none());
    }
}
