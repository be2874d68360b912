//! Job lifecycle orchestration against a [`RuntimeClient`].
//!
//! Nothing here takes the per-job lock. Callers that mutate a job go
//! through [`crate::engine::Engine`], which serializes them.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;

use bpm_common::config::ProcessConfig;
use bpm_common::constants::SERVICE_USER;
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::HostLayout;
use bpm_common::types::{ContainerId, JobIdentity};
use bpm_core::oci::User;
use bpm_core::user::{SystemUserFinder, UserFinder};

use crate::adapter::{RuncAdapter, job_env};
use crate::backend::runc::RuncClient;
use crate::backend::{ProcessIo, RuntimeClient};
use crate::clock::{Clock, SystemClock};
use crate::process::{CommandRunner, SystemCommandRunner, pre_start_command, run_pre_start};
use crate::state::{ContainerStatus, Job};

/// Interval between state checks while waiting for a job to stop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay after the escalation signal before giving up on a stop.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Result of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh container was created and started.
    Started,
    /// The job was already running; nothing was done.
    AlreadyRunning,
}

/// Result of a successful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The job exited after being signalled.
    Stopped,
    /// No live container existed for the job.
    AlreadyStopped,
}

/// Drives jobs through start, stop and removal.
pub struct RuncLifecycle {
    client: Box<dyn RuntimeClient>,
    adapter: RuncAdapter,
    users: Box<dyn UserFinder + Send + Sync>,
    runner: Box<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RuncLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuncLifecycle")
            .field("adapter", &self.adapter)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RuncLifecycle {
    /// Assembles a lifecycle from its collaborators.
    #[must_use]
    pub fn new(
        client: Box<dyn RuntimeClient>,
        adapter: RuncAdapter,
        users: Box<dyn UserFinder + Send + Sync>,
        runner: Box<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            adapter,
            users,
            runner,
            clock,
        }
    }

    /// Production wiring: `runc`, host users, real processes and time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no `runc` binary can be found.
    pub fn system(layout: HostLayout) -> Result<Self> {
        let client = RuncClient::from_layout(&layout)?;
        Ok(Self::new(
            Box::new(client),
            RuncAdapter::new(layout),
            Box::new(SystemUserFinder),
            Box::new(SystemCommandRunner),
            Arc::new(SystemClock),
        ))
    }

    /// Host layout jobs are laid out in.
    #[must_use]
    pub const fn layout(&self) -> &HostLayout {
        self.adapter.layout()
    }

    /// Starts the job unless it is already running.
    ///
    /// A stale container left from an earlier run is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`BpmError::CleanupFailed`] if the stale container cannot be
    /// removed, or the first error hit while preparing, building or
    /// starting the container.
    pub fn start_job(&self, id: &JobIdentity, config: &ProcessConfig) -> Result<StartOutcome> {
        let cid = id.container_id();
        if self.clear_stale(id, &cid)? {
            tracing::info!(id = %cid, "job is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let (stdout, stderr) = self.prepare(id, config)?;
        let layout = self.layout();
        tracing::info!(id = %cid, "starting container");
        self.client.run_container(
            &layout.pid_file(id),
            &layout.bundle_path(id),
            &cid,
            stdout,
            stderr,
        )?;
        tracing::info!(id = %cid, "container started");
        Ok(StartOutcome::Started)
    }

    /// Runs the job in the foreground and returns its exit code.
    ///
    /// The container and bundle are removed once the process exits.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the job is already running, plus the
    /// errors of [`Self::start_job`] and [`Self::remove_job`].
    pub fn run_job(&self, id: &JobIdentity, config: &ProcessConfig, io: ProcessIo) -> Result<i32> {
        let cid = id.container_id();
        if self.clear_stale(id, &cid)? {
            return Err(BpmError::Runtime {
                operation: "run",
                message: format!("job {cid} is already running"),
            });
        }

        let _logs = self.prepare(id, config)?;
        let bundle = self.layout().bundle_path(id);
        tracing::info!(id = %cid, "running container attached");
        let exited = self.client.run_container_attached(&bundle, &cid, io);
        let removed = self.remove_job(id);
        let code = exited?;
        removed?;
        tracing::info!(id = %cid, code, "container exited");
        Ok(code)
    }

    /// Signals the job to terminate and waits up to `timeout` for it to stop.
    ///
    /// On timeout the job is sent `SIGQUIT`, given [`GRACE_PERIOD`], and
    /// reported as timed out without looking at it again.
    ///
    /// # Errors
    ///
    /// Returns [`BpmError::Timeout`] if the job was not seen stopped in
    /// time, or a runtime error if the initial state query or `SIGTERM`
    /// fails.
    pub fn stop_job(&self, id: &JobIdentity, timeout: Duration) -> Result<StopOutcome> {
        let cid = id.container_id();
        match self.client.container_state(&cid)? {
            Some(record) if record.status != ContainerStatus::Stopped => {}
            _ => {
                tracing::info!(id = %cid, "job already stopped");
                return Ok(StopOutcome::AlreadyStopped);
            }
        }

        tracing::info!(id = %cid, "sending SIGTERM");
        self.client.signal_container(&cid, Signal::SIGTERM)?;
        if self.observe_stopped(&cid) {
            return Ok(StopOutcome::Stopped);
        }

        let deadline = self.clock.now() + timeout;
        let mut next_poll = self.clock.now() + POLL_INTERVAL;
        loop {
            let now = self.clock.now();
            if next_poll >= deadline {
                self.clock.sleep(deadline.saturating_duration_since(now));
                return Err(self.escalate(&cid, timeout));
            }
            self.clock.sleep(next_poll.saturating_duration_since(now));
            next_poll += POLL_INTERVAL;
            if self.observe_stopped(&cid) {
                tracing::info!(id = %cid, "job stopped");
                return Ok(StopOutcome::Stopped);
            }
        }
    }

    /// Deletes the container and then its bundle.
    ///
    /// # Errors
    ///
    /// Returns the runtime's delete error, in which case the bundle is left
    /// in place, or an I/O error removing the bundle.
    pub fn remove_job(&self, id: &JobIdentity) -> Result<()> {
        let cid = id.container_id();
        tracing::info!(id = %cid, "removing container");
        self.client.delete_container(&cid)?;
        self.client.destroy_bundle(&self.layout().bundle_path(id))
    }

    /// Looks up the job's container.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the runtime cannot be queried.
    pub fn get_job(&self, id: &JobIdentity) -> Result<Option<Job>> {
        Ok(self.client.container_state(&id.container_id())?.map(Job::from))
    }

    /// Every container the runtime knows, stopped ones included.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the runtime cannot be queried.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self
            .client
            .list_containers()?
            .into_iter()
            .map(Job::from)
            .collect())
    }

    /// Host pid of the job's running process.
    ///
    /// # Errors
    ///
    /// Returns [`BpmError::NotRunning`] when no container exists and
    /// [`BpmError::NoPid`] when it has no live process.
    pub fn job_pid(&self, id: &JobIdentity) -> Result<i32> {
        let cid = id.container_id();
        let record = self
            .client
            .container_state(&cid)?
            .ok_or_else(|| BpmError::NotRunning { id: cid.to_string() })?;
        if record.pid == 0 || record.status != ContainerStatus::Running {
            return Err(BpmError::NoPid { id: cid.to_string() });
        }
        Ok(record.pid)
    }

    /// Runs `command` interactively inside the running job.
    ///
    /// # Errors
    ///
    /// Returns [`BpmError::NotFound`] unless the job is running.
    pub fn open_shell(&self, id: &JobIdentity, command: &str, io: ProcessIo) -> Result<i32> {
        let cid = id.container_id();
        match self.client.container_state(&cid)? {
            Some(record) if record.status == ContainerStatus::Running => {
                self.client.exec(&cid, command, io)
            }
            _ => Err(BpmError::NotFound {
                kind: "job",
                id: cid.to_string(),
            }),
        }
    }

    /// Destroys a bundle the runtime holds no container for.
    ///
    /// Returns true when a bundle was removed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the bundle cannot be removed.
    pub fn remove_orphan_bundle(&self, id: &JobIdentity) -> Result<bool> {
        let bundle = self.layout().bundle_path(id);
        if !bundle.exists() {
            return Ok(false);
        }
        tracing::info!(id = %id.container_id(), bundle = %bundle.display(), "removing orphaned bundle");
        self.client.destroy_bundle(&bundle)?;
        Ok(true)
    }

    /// Returns true when the job is alive; removes a stale container.
    ///
    /// A bundle with no container behind it is reported, not removed.
    fn clear_stale(&self, id: &JobIdentity, cid: &ContainerId) -> Result<bool> {
        let Some(record) = self.client.container_state(cid)? else {
            let bundle = self.layout().bundle_path(id);
            if bundle.exists() {
                return Err(BpmError::CleanupFailed {
                    id: cid.to_string(),
                    source: Box::new(BpmError::Runtime {
                        operation: "create bundle",
                        message: format!(
                            "{} is left from an earlier start with no container; \
                             `bpm stop` removes it",
                            bundle.display()
                        ),
                    }),
                    bundle,
                });
            }
            return Ok(false);
        };
        if record.status.is_alive() {
            return Ok(true);
        }
        tracing::info!(id = %cid, status = %record.status, "removing stale container");
        self.remove_job(id).map_err(|e| BpmError::CleanupFailed {
            id: cid.to_string(),
            bundle: self.layout().bundle_path(id),
            source: Box::new(e),
        })?;
        Ok(false)
    }

    /// Everything up to and including bundle creation.
    fn prepare(&self, id: &JobIdentity, config: &ProcessConfig) -> Result<(File, File)> {
        let user = self.resolve_user(config)?;
        let (stdout, stderr) = self.adapter.create_job_prerequisites(id, config, &user)?;

        if let Some(hook) = config.hooks.as_ref().and_then(|h| h.pre_start.as_deref()) {
            let layout = self.layout();
            let host_hook = layout.host_path(hook).unwrap_or_else(|| hook.to_path_buf());
            let env = job_env(&config.env)?;
            let command =
                pre_start_command(&host_hook, &env, &stdout, &stderr, &layout.stdout_log(id))?;
            run_pre_start(self.runner.as_ref(), &host_hook, command)?;
        }

        let spec = self.adapter.build_spec(id, config, &user)?;
        self.client
            .create_bundle(&self.layout().bundle_path(id), &spec, &user)?;
        Ok((stdout, stderr))
    }

    fn resolve_user(&self, config: &ProcessConfig) -> Result<User> {
        if config.is_privileged() {
            Ok(User::root())
        } else {
            self.users.lookup(SERVICE_USER)
        }
    }

    fn observe_stopped(&self, cid: &ContainerId) -> bool {
        match self.client.container_state(cid) {
            Ok(None) => true,
            Ok(Some(record)) => record.status == ContainerStatus::Stopped,
            Err(e) => {
                tracing::warn!(id = %cid, error = %e, "failed to fetch container state");
                false
            }
        }
    }

    fn escalate(&self, cid: &ContainerId, timeout: Duration) -> BpmError {
        tracing::warn!(id = %cid, "stop timed out, sending SIGQUIT");
        if let Err(e) = self.client.signal_container(cid, Signal::SIGQUIT) {
            tracing::warn!(id = %cid, error = %e, "failed to send SIGQUIT");
        }
        self.clock.sleep(GRACE_PERIOD);
        BpmError::Timeout {
            id: cid.to_string(),
            timeout,
        }
    }
}
