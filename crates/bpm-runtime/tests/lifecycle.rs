//! Job lifecycle scenarios driven through the public `Engine`.
//!
//! A recording runtime stands in for `runc`; everything else (host
//! layout, prerequisites, bundle building, the job lock) is real and lives
//! under a scratch root.

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::unistd::{getegid, geteuid};

use bpm_common::config::ProcessConfig;
use bpm_common::error::{BpmError, Result};
use bpm_common::layout::HostLayout;
use bpm_common::types::{ContainerId, JobIdentity};
use bpm_core::oci::{Spec, User};
use bpm_core::user::UserFinder;
use bpm_runtime::adapter::RuncAdapter;
use bpm_runtime::backend::{ProcessIo, RuntimeClient};
use bpm_runtime::clock::ManualClock;
use bpm_runtime::engine::Engine;
use bpm_runtime::lifecycle::{RuncLifecycle, StartOutcome, StopOutcome};
use bpm_runtime::process::CommandRunner;
use bpm_runtime::state::{ContainerRecord, ContainerStatus};

const JOB_PID: i32 = 31337;

// ── Test doubles ─────────────────────────────────────────────────────

#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        let _ = self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runtime that keeps one container per id in memory and writes a
/// greeting to the job's stdout on start.
///
/// Every mutating call is held open for `call_delay` and counted by the
/// gauge.
#[derive(Clone, Default)]
struct RecordingRuntime {
    containers: Arc<Mutex<Vec<ContainerRecord>>>,
    gauge: Arc<Gauge>,
    call_delay: Duration,
}

impl RecordingRuntime {
    fn mutating<T>(&self, call: impl FnOnce() -> T) -> T {
        self.gauge.enter();
        std::thread::sleep(self.call_delay);
        let out = call();
        self.gauge.leave();
        out
    }

    fn find(&self, id: &ContainerId) -> Option<ContainerRecord> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == *id)
            .cloned()
    }
}

impl RuntimeClient for RecordingRuntime {
    fn create_bundle(&self, bundle: &Path, spec: &Spec, _user: &User) -> Result<()> {
        self.mutating(|| {
            std::fs::create_dir_all(bundle.join("rootfs")).map_err(|e| BpmError::io(bundle, e))?;
            let config = bundle.join("config.json");
            std::fs::write(&config, spec.to_json()?).map_err(|e| BpmError::io(&config, e))
        })
    }

    fn run_container(
        &self,
        pid_file: &Path,
        bundle: &Path,
        id: &ContainerId,
        mut stdout: File,
        _stderr: File,
    ) -> Result<()> {
        self.mutating(|| {
            stdout
                .write_all(b"listening on 8080\n")
                .map_err(|e| BpmError::io(bundle, e))?;
            std::fs::write(pid_file, JOB_PID.to_string()).map_err(|e| BpmError::io(pid_file, e))?;
            self.containers.lock().unwrap().push(ContainerRecord {
                id: id.clone(),
                pid: JOB_PID,
                status: ContainerStatus::Running,
                bundle: bundle.to_path_buf(),
                created: None,
            });
            Ok(())
        })
    }

    fn run_container_attached(&self, _bundle: &Path, _id: &ContainerId, _io: ProcessIo) -> Result<i32> {
        Ok(0)
    }

    fn exec(&self, _id: &ContainerId, _command: &str, _io: ProcessIo) -> Result<i32> {
        Ok(0)
    }

    fn container_state(&self, id: &ContainerId) -> Result<Option<ContainerRecord>> {
        Ok(self.find(id))
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        Ok(self.containers.lock().unwrap().clone())
    }

    fn signal_container(&self, id: &ContainerId, signal: Signal) -> Result<()> {
        self.mutating(|| {
            if signal == Signal::SIGTERM {
                for record in self.containers.lock().unwrap().iter_mut() {
                    if record.id == *id {
                        record.status = ContainerStatus::Stopped;
                        record.pid = 0;
                    }
                }
            }
        });
        Ok(())
    }

    fn delete_container(&self, id: &ContainerId) -> Result<()> {
        self.mutating(|| self.containers.lock().unwrap().retain(|r| r.id != *id));
        Ok(())
    }

    fn destroy_bundle(&self, bundle: &Path) -> Result<()> {
        match std::fs::remove_dir_all(bundle) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BpmError::io(bundle, e)),
            _ => Ok(()),
        }
    }
}

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

struct NoHooks;

impl CommandRunner for NoHooks {
    fn run(&self, _command: &mut Command) -> std::io::Result<ExitStatus> {
        Err(std::io::Error::other("no hooks configured"))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn engine(root: &Path, runtime: &RecordingRuntime) -> Engine {
    let adapter = RuncAdapter::new(HostLayout::new(root))
        .with_cgroup_root(root.join("cgroup"))
        .with_system_dirs(vec![PathBuf::from("/usr")]);
    Engine::with_lifecycle(RuncLifecycle::new(
        Box::new(runtime.clone()),
        adapter,
        Box::new(CurrentUser),
        Box::new(NoHooks),
        Arc::new(ManualClock::new()),
    ))
}

fn web() -> JobIdentity {
    JobIdentity::new("web", None).expect("identity")
}

fn web_config() -> ProcessConfig {
    ProcessConfig {
        executable: "/var/vcap/packages/web/bin/web".into(),
        args: vec!["--port".into(), "8080".into()],
        ..ProcessConfig::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn start_creates_bundle_pid_file_and_appends_logs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = HostLayout::new(dir.path());
    let stdout_log = layout.stdout_log(&web());
    std::fs::create_dir_all(stdout_log.parent().unwrap()).unwrap();
    std::fs::write(&stdout_log, "previous run\n").unwrap();

    let runtime = RecordingRuntime::default();
    let engine = engine(dir.path(), &runtime);
    let outcome = engine.start(&web(), &web_config()).expect("start");
    assert_eq!(outcome, StartOutcome::Started);

    let spec = Spec::load(&layout.bundle_path(&web()).join("config.json")).expect("spec");
    assert_eq!(spec.process.args, vec!["/var/vcap/packages/web/bin/web", "--port", "8080"]);
    assert_eq!(spec.hostname.as_deref(), Some("web"));

    let pid = std::fs::read_to_string(layout.pid_file(&web())).expect("pid file");
    assert_eq!(pid, JOB_PID.to_string());

    let log = std::fs::read_to_string(&stdout_log).expect("log");
    assert_eq!(log, "previous run\nlistening on 8080\n");
    assert!(layout.stderr_log(&web()).exists());
}

#[test]
fn duplicate_start_leaves_running_job_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime::default();
    let engine = engine(dir.path(), &runtime);

    engine.start(&web(), &web_config()).expect("first start");
    let outcome = engine.start(&web(), &web_config()).expect("second start");
    assert_eq!(outcome, StartOutcome::AlreadyRunning);
    assert_eq!(runtime.list_containers().unwrap().len(), 1);
}

#[test]
fn stop_removes_bundle_and_container() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime::default();
    let engine = engine(dir.path(), &runtime);
    engine.start(&web(), &web_config()).expect("start");
    let bundle = engine.layout().bundle_path(&web());
    assert!(bundle.exists());

    let outcome = engine.stop(&web(), Duration::from_secs(20)).expect("stop");
    assert_eq!(outcome, StopOutcome::Stopped);
    assert!(!bundle.exists());
    assert!(engine.get(&web()).expect("get").is_none());

    let again = engine.stop(&web(), Duration::from_secs(20)).expect("stop again");
    assert_eq!(again, StopOutcome::AlreadyStopped);
}

#[test]
fn restart_after_stop_builds_fresh_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime::default();
    let engine = engine(dir.path(), &runtime);
    engine.start(&web(), &web_config()).expect("start");
    engine.stop(&web(), Duration::from_secs(20)).expect("stop");

    let outcome = engine.start(&web(), &web_config()).expect("restart");
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(engine.pid(&web()).expect("pid"), JOB_PID);
}

#[test]
fn pid_of_missing_job_is_not_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine(dir.path(), &RecordingRuntime::default());
    let err = engine.pid(&web()).unwrap_err();
    assert!(err.to_string().contains("job is not running"), "{err}");
    assert!(err.is_not_found());
}

#[test]
fn list_reports_every_started_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime::default();
    let engine = engine(dir.path(), &runtime);
    let worker = JobIdentity::new("web", Some("worker".into())).expect("identity");
    engine.start(&web(), &web_config()).expect("start web");
    engine.start(&worker, &web_config()).expect("start worker");

    let mut names: Vec<_> = engine
        .list()
        .expect("list")
        .into_iter()
        .map(|j| j.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["web", "web.worker"]);
}

#[test]
fn concurrent_operations_on_one_job_are_serialized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime {
        call_delay: Duration::from_millis(20),
        ..RecordingRuntime::default()
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let root = dir.path().to_path_buf();
            let runtime = runtime.clone();
            std::thread::spawn(move || {
                let engine = engine(&root, &runtime);
                for _ in 0..5 {
                    engine.remove(&web()).expect("remove");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    assert_eq!(runtime.gauge.max.load(Ordering::SeqCst), 1);
}

#[test]
fn start_and_stop_racing_on_one_job_never_overlap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = RecordingRuntime {
        call_delay: Duration::from_millis(10),
        ..RecordingRuntime::default()
    };

    let starter = {
        let root = dir.path().to_path_buf();
        let runtime = runtime.clone();
        std::thread::spawn(move || {
            let engine = engine(&root, &runtime);
            for _ in 0..5 {
                let _ = engine.start(&web(), &web_config()).expect("start");
            }
        })
    };
    let stopper = {
        let root = dir.path().to_path_buf();
        let runtime = runtime.clone();
        std::thread::spawn(move || {
            let engine = engine(&root, &runtime);
            for _ in 0..5 {
                let _ = engine.stop(&web(), Duration::from_secs(20)).expect("stop");
            }
        })
    };
    starter.join().expect("starter");
    stopper.join().expect("stopper");

    assert_eq!(runtime.gauge.max.load(Ordering::SeqCst), 1);
    assert!(runtime.list_containers().unwrap().len() <= 1);
}
