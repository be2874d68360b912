//! Entry point for job commands.
//!
//! Every mutating operation holds the job's lock for its whole duration;
//! queries go straight to the runtime.

use std::time::Duration;

use bpm_common::config::ProcessConfig;
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::HostLayout;
use bpm_common::types::JobIdentity;

use crate::backend::ProcessIo;
use crate::lifecycle::{RuncLifecycle, StartOutcome, StopOutcome};
use crate::lock::JobLock;
use crate::state::Job;

/// The engine that serializes lifecycle operations per job.
#[derive(Debug)]
pub struct Engine {
    lifecycle: RuncLifecycle,
}

impl Engine {
    /// Creates an engine driving `runc` under `layout`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no `runc` binary can be found.
    pub fn new(layout: HostLayout) -> Result<Self> {
        Ok(Self::with_lifecycle(RuncLifecycle::system(layout)?))
    }

    /// Creates an engine over an assembled lifecycle.
    #[must_use]
    pub const fn with_lifecycle(lifecycle: RuncLifecycle) -> Self {
        Self { lifecycle }
    }

    /// Host layout jobs are laid out in.
    #[must_use]
    pub const fn layout(&self) -> &HostLayout {
        self.lifecycle.layout()
    }

    fn lock(&self, id: &JobIdentity) -> Result<JobLock> {
        JobLock::acquire(&self.layout().lock_file(id))
    }

    /// Starts the job under its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or the start fails.
    pub fn start(&self, id: &JobIdentity, config: &ProcessConfig) -> Result<StartOutcome> {
        let _lock = self.lock(id)?;
        self.lifecycle.start_job(id, config)
    }

    /// Stops the job and removes its container and bundle.
    ///
    /// A bundle left behind by a start whose container never came up is
    /// removed as well. Removal is attempted even when the stop times out; the stop error
    /// is reported in preference to a removal error.
    ///
    /// # Errors
    ///
    /// Returns [`BpmError::Timeout`] if the job did not stop in time, or
    /// the first runtime error hit.
    pub fn stop(&self, id: &JobIdentity, timeout: Duration) -> Result<StopOutcome> {
        let _lock = self.lock(id)?;
        if self.lifecycle.get_job(id)?.is_none() {
            let _ = self.lifecycle.remove_orphan_bundle(id)?;
            return Ok(StopOutcome::AlreadyStopped);
        }

        let stopped = self.lifecycle.stop_job(id, timeout);
        match &stopped {
            Err(e @ BpmError::Timeout { .. }) => {
                tracing::error!(id = %id, error = %e, "failed to stop job, removing anyway");
            }
            Err(_) => return stopped,
            Ok(_) => {}
        }
        let removed = self.lifecycle.remove_job(id);
        let outcome = stopped?;
        removed?;
        Ok(outcome)
    }

    /// Removes the job's container and bundle under its lock.
    ///
    /// # Errors
    ///
    /// Returns the runtime's delete error or an I/O error.
    pub fn remove(&self, id: &JobIdentity) -> Result<()> {
        let _lock = self.lock(id)?;
        self.lifecycle.remove_job(id)
    }

    /// Runs the job in the foreground under its lock.
    ///
    /// # Errors
    ///
    /// See [`RuncLifecycle::run_job`].
    pub fn run(&self, id: &JobIdentity, config: &ProcessConfig, io: ProcessIo) -> Result<i32> {
        let _lock = self.lock(id)?;
        self.lifecycle.run_job(id, config, io)
    }

    /// Every container the runtime knows.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the runtime cannot be queried.
    pub fn list(&self) -> Result<Vec<Job>> {
        self.lifecycle.list_jobs()
    }

    /// The job's container, if any.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the runtime cannot be queried.
    pub fn get(&self, id: &JobIdentity) -> Result<Option<Job>> {
        self.lifecycle.get_job(id)
    }

    /// Host pid of the running job.
    ///
    /// # Errors
    ///
    /// See [`RuncLifecycle::job_pid`].
    pub fn pid(&self, id: &JobIdentity) -> Result<i32> {
        self.lifecycle.job_pid(id)
    }

    /// Opens an interactive session in the running job.
    ///
    /// # Errors
    ///
    /// See [`RuncLifecycle::open_shell`].
    pub fn shell(&self, id: &JobIdentity, command: &str, io: ProcessIo) -> Result<i32> {
        self.lifecycle.open_shell(id, command, io)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use nix::unistd::{getegid, geteuid};

    use bpm_core::oci::User;
    use bpm_core::user::UserFinder;

    use super::*;
    use crate::adapter::RuncAdapter;
    use crate::clock::ManualClock;
    use crate::fake::FakeRuntime;
    use crate::process::SystemCommandRunner;
    use crate::state::ContainerStatus;

    struct CurrentUser;

    impl UserFinder for CurrentUser {
        fn lookup(&self, _name: &str) -> Result<User> {
            Ok(User {
                uid: geteuid().as_raw(),
                gid: getegid().as_raw(),
                additional_gids: Vec::new(),
            })
        }
    }

    fn engine(fake: &FakeRuntime, root: &std::path::Path) -> Engine {
        let adapter = RuncAdapter::new(HostLayout::new(root))
            .with_cgroup_root(root.join("cgroup"))
            .with_system_dirs(vec![PathBuf::from("/usr")]);
        Engine::with_lifecycle(RuncLifecycle::new(
            Box::new(fake.clone()),
            adapter,
            Box::new(CurrentUser),
            Box::new(SystemCommandRunner),
            Arc::new(ManualClock::new()),
        ))
    }

    fn web() -> JobIdentity {
        JobIdentity::new("web", None).expect("identity")
    }

    fn config() -> ProcessConfig {
        ProcessConfig {
            executable: "/var/vcap/packages/web/bin/web".into(),
            ..ProcessConfig::default()
        }
    }

    #[test]
    fn stop_of_absent_job_sends_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = FakeRuntime::default();
        let outcome = engine(&fake, dir.path())
            .stop(&web(), Duration::from_secs(20))
            .expect("stop");
        assert_eq!(outcome, StopOutcome::AlreadyStopped);
        assert_eq!(fake.calls(), vec!["state web"]);
    }

    #[test]
    fn failed_run_is_recoverable_with_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = FakeRuntime::default().failing_run("container_linux.go: permission denied");
        let first = engine(&broken, dir.path());
        let err = first.start(&web(), &config()).unwrap_err();
        assert!(matches!(err, BpmError::Runtime { operation: "run", .. }), "{err}");
        let bundle = first.layout().bundle_path(&web());
        assert!(bundle.exists());

        let err = first.start(&web(), &config()).unwrap_err();
        assert!(matches!(err, BpmError::CleanupFailed { .. }), "{err}");

        let outcome = first.stop(&web(), Duration::from_secs(20)).expect("stop");
        assert_eq!(outcome, StopOutcome::AlreadyStopped);
        assert!(!bundle.exists());

        let healthy = FakeRuntime::default();
        let outcome = engine(&healthy, dir.path())
            .start(&web(), &config())
            .expect("restart");
        assert_eq!(outcome, StartOutcome::Started);
        assert_eq!(healthy.count("run web"), 1);
    }

    #[test]
    fn stop_removes_the_stopped_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = FakeRuntime::default()
            .with_container("web", 7, ContainerStatus::Running)
            .stops_on_term();
        let engine = engine(&fake, dir.path());
        let bundle = engine.layout().bundle_path(&web());
        std::fs::create_dir_all(&bundle).expect("bundle");

        let outcome = engine.stop(&web(), Duration::from_secs(20)).expect("stop");
        assert_eq!(outcome, StopOutcome::Stopped);
        assert!(!bundle.exists());
        assert!(fake.current().is_none());
        assert!(engine.layout().lock_file(&web()).exists());
    }

    #[test]
    fn stop_timeout_still_removes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = FakeRuntime::default().with_container("web", 7, ContainerStatus::Running);
        let err = engine(&fake, dir.path())
            .stop(&web(), Duration::from_secs(3))
            .unwrap_err();
        assert!(matches!(err, BpmError::Timeout { .. }), "{err}");
        assert_eq!(fake.count("delete web"), 1);
    }

    #[test]
    fn stop_of_exited_job_still_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = FakeRuntime::default().with_container("web", 0, ContainerStatus::Stopped);
        let outcome = engine(&fake, dir.path())
            .stop(&web(), Duration::from_secs(20))
            .expect("stop");
        assert_eq!(outcome, StopOutcome::AlreadyStopped);
        assert_eq!(fake.count("kill"), 0);
        assert_eq!(fake.count("delete web"), 1);
    }
}
