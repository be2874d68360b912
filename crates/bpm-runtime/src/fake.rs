//! Scripted in-memory runtime for lifecycle tests.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use nix::sys::signal::Signal;

use bpm_common::error::{BpmError, Result};
use bpm_common::types::ContainerId;
use bpm_core::oci::{Spec, User};

use crate::backend::{ProcessIo, RuntimeClient};
use crate::state::{ContainerRecord, ContainerStatus};

pub(crate) const FAKE_PID: i32 = 4242;

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<String>,
    current: Option<ContainerRecord>,
    scripted_states: VecDeque<std::result::Result<Option<ContainerRecord>, String>>,
    others: Vec<ContainerRecord>,
    stops_on_term: bool,
    fail_delete: Option<String>,
    fail_run: Option<String>,
    exit_code: i32,
}

/// Runtime double sharing its state across clones.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRuntime {
    inner: Arc<Mutex<Inner>>,
}

pub(crate) fn record(id: &str, pid: i32, status: ContainerStatus) -> ContainerRecord {
    ContainerRecord {
        id: ContainerId::new(id),
        pid,
        status,
        bundle: PathBuf::new(),
        created: None,
    }
}

impl FakeRuntime {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn with_container(self, id: &str, pid: i32, status: ContainerStatus) -> Self {
        self.lock().current = Some(record(id, pid, status));
        self
    }

    pub(crate) fn with_other(self, other: ContainerRecord) -> Self {
        self.lock().others.push(other);
        self
    }

    pub(crate) fn stops_on_term(self) -> Self {
        self.lock().stops_on_term = true;
        self
    }

    pub(crate) fn failing_delete(self, message: &str) -> Self {
        self.lock().fail_delete = Some(message.into());
        self
    }

    pub(crate) fn failing_run(self, message: &str) -> Self {
        self.lock().fail_run = Some(message.into());
        self
    }

    pub(crate) fn exiting_with(self, code: i32) -> Self {
        self.lock().exit_code = code;
        self
    }

    /// Queues replies for the next `container_state` calls.
    pub(crate) fn script_states(
        self,
        replies: impl IntoIterator<Item = std::result::Result<Option<ContainerRecord>, String>>,
    ) -> Self {
        self.lock().scripted_states.extend(replies);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub(crate) fn current(&self) -> Option<ContainerRecord> {
        self.lock().current.clone()
    }

    fn log(&self, call: String) {
        self.lock().calls.push(call);
    }
}

impl RuntimeClient for FakeRuntime {
    fn create_bundle(&self, bundle: &Path, spec: &Spec, _user: &User) -> Result<()> {
        self.log(format!("create_bundle {}", bundle.display()));
        std::fs::create_dir_all(bundle).map_err(|e| BpmError::io(bundle, e))?;
        let config = bundle.join("config.json");
        std::fs::write(&config, spec.to_json()?).map_err(|e| BpmError::io(&config, e))
    }

    fn run_container(
        &self,
        pid_file: &Path,
        _bundle: &Path,
        id: &ContainerId,
        _stdout: File,
        _stderr: File,
    ) -> Result<()> {
        self.log(format!("run {id}"));
        let mut inner = self.lock();
        if let Some(message) = inner.fail_run.clone() {
            return Err(BpmError::Runtime {
                operation: "run",
                message,
            });
        }
        inner.current = Some(record(id.as_str(), FAKE_PID, ContainerStatus::Running));
        std::fs::write(pid_file, FAKE_PID.to_string()).map_err(|e| BpmError::io(pid_file, e))
    }

    fn run_container_attached(&self, _bundle: &Path, id: &ContainerId, _io: ProcessIo) -> Result<i32> {
        self.log(format!("run_attached {id}"));
        let mut inner = self.lock();
        inner.current = Some(record(id.as_str(), 0, ContainerStatus::Stopped));
        Ok(inner.exit_code)
    }

    fn exec(&self, id: &ContainerId, command: &str, _io: ProcessIo) -> Result<i32> {
        self.log(format!("exec {id} {command}"));
        Ok(0)
    }

    fn container_state(&self, id: &ContainerId) -> Result<Option<ContainerRecord>> {
        self.log(format!("state {id}"));
        let mut inner = self.lock();
        match inner.scripted_states.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(BpmError::Runtime {
                operation: "state",
                message,
            }),
            None => Ok(inner.current.clone().filter(|r| r.id == *id)),
        }
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        self.log("list".into());
        let inner = self.lock();
        Ok(inner
            .current
            .iter()
            .chain(inner.others.iter())
            .cloned()
            .collect())
    }

    fn signal_container(&self, id: &ContainerId, signal: Signal) -> Result<()> {
        self.log(format!("kill {id} {}", signal.as_str()));
        let mut inner = self.lock();
        if signal == Signal::SIGTERM && inner.stops_on_term {
            if let Some(current) = inner.current.as_mut() {
                current.status = ContainerStatus::Stopped;
                current.pid = 0;
            }
        }
        Ok(())
    }

    fn delete_container(&self, id: &ContainerId) -> Result<()> {
        self.log(format!("delete {id}"));
        let mut inner = self.lock();
        if let Some(message) = inner.fail_delete.clone() {
            return Err(BpmError::Runtime {
                operation: "delete",
                message,
            });
        }
        inner.current = None;
        Ok(())
    }

    fn destroy_bundle(&self, bundle: &Path) -> Result<()> {
        self.log(format!("destroy {}", bundle.display()));
        match std::fs::remove_dir_all(bundle) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BpmError::io(bundle, e)),
            _ => Ok(()),
        }
    }
}
