//! `bpm shell`: Open an interactive shell inside a running job process.

use std::process::ExitCode;

use clap::Args;

use bpm_common::constants::SHELL_PATH;
use bpm_common::layout::HostLayout;
use bpm_runtime::backend::ProcessIo;
use bpm_runtime::engine::Engine;

use super::JobArgs;
use crate::{logging, output};

/// Arguments for the `shell` command.
#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Process to enter.
    #[command(flatten)]
    pub job: JobArgs,
}

/// Executes the `shell` command and exits with the shell's status.
///
/// # Errors
///
/// Returns an error if no running container exists for the job.
pub fn execute(layout: &HostLayout, args: &ShellArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(None)?;
    let engine = Engine::new(layout.clone())?;
    let code = engine.shell(&id, SHELL_PATH, ProcessIo::inherit())?;
    Ok(output::exit_code(code))
}
