//! CLI command definitions and dispatch.

pub mod list;
pub mod pid;
pub mod run;
pub mod shell;
pub mod start;
pub mod stop;
pub mod trace;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use nix::unistd::Uid;

use bpm_common::config::{ProcessConfig, Volume};
use bpm_common::error::BpmError;
use bpm_common::layout::HostLayout;
use bpm_common::types::JobIdentity;

/// BOSH process manager.
#[derive(Parser, Debug)]
#[command(name = "bpm", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a job process.
    Start(start::StartArgs),
    /// Stop a job process and remove its container.
    Stop(stop::StopArgs),
    /// List every job process the runtime knows.
    List(list::ListArgs),
    /// Print the host pid of a running job process.
    Pid(pid::PidArgs),
    /// Attach strace to a running job process.
    Trace(trace::TraceArgs),
    /// Open a shell inside a running job process.
    Shell(shell::ShellArgs),
    /// Run a job process in the foreground until it exits.
    Run(run::RunArgs),
}

/// Selects one process of one job.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Job name.
    pub job: String,

    /// Process name; defaults to the job name.
    #[arg(short, long)]
    pub process: Option<String>,
}

impl JobArgs {
    /// Validated identity of the selected process.
    ///
    /// # Errors
    ///
    /// Returns an error if the job or process name is invalid.
    pub fn identity(&self) -> anyhow::Result<JobIdentity> {
        Ok(JobIdentity::new(self.job.clone(), self.process.clone())?)
    }
}

/// Where the process description comes from and what to add to it.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Process configuration file; defaults to the job's bpm config.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra environment variable for the process.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Extra volume, as `PATH[:writable,allow_executions,mount_only]`.
    #[arg(short = 'v', long = "volume", value_name = "VOLUME")]
    pub volumes: Vec<String>,
}

impl ConfigArgs {
    /// Loads the process description and applies the flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or a flag is malformed.
    pub fn load(&self, layout: &HostLayout, id: &JobIdentity) -> anyhow::Result<ProcessConfig> {
        let path = self.config.clone().unwrap_or_else(|| layout.config_path(id));
        tracing::info!(path = %path.display(), "loading process config");
        let mut config = ProcessConfig::load(&path)?;
        config.merge_env(&self.env)?;
        let volumes = self
            .volumes
            .iter()
            .map(|flag| Volume::parse_flag(flag))
            .collect::<Result<Vec<_>, _>>()?;
        config.add_volumes(volumes);
        Ok(config)
    }
}

const ROOT_REQUIRED: &str = "bpm must be run as root. Please run 'sudo -i' to become the root user.";

/// Refuses to run jobs for anyone but root.
///
/// # Errors
///
/// Returns [`BpmError::PermissionDenied`] when `euid` is not root.
pub fn require_root(euid: Uid) -> bpm_common::error::Result<()> {
    if euid.is_root() {
        return Ok(());
    }
    Err(BpmError::PermissionDenied {
        message: ROOT_REQUIRED.into(),
    })
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let layout = HostLayout::from_env();
    match cli.command {
        Command::Start(args) => start::execute(&layout, &args),
        Command::Stop(args) => stop::execute(&layout, &args),
        Command::List(args) => list::execute(&layout, &args),
        Command::Pid(args) => pid::execute(&layout, &args),
        Command::Trace(args) => trace::execute(&layout, &args),
        Command::Shell(args) => shell::execute(&layout, &args),
        Command::Run(args) => run::execute(&layout, &args),
    }
}
