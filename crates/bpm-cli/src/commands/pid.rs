//! `bpm pid`: Print the host pid of a running job process.

use std::process::ExitCode;

use clap::Args;

use bpm_common::layout::HostLayout;
use bpm_runtime::engine::Engine;

use super::JobArgs;
use crate::{logging, output};

/// Arguments for the `pid` command.
#[derive(Args, Debug)]
pub struct PidArgs {
    /// Process to inspect.
    #[command(flatten)]
    pub job: JobArgs,
}

/// Executes the `pid` command.
///
/// # Errors
///
/// Returns an error if the job has no container or no live process.
pub fn execute(layout: &HostLayout, args: &PidArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(None)?;
    let engine = Engine::new(layout.clone())?;
    output::notice(&engine.pid(&id)?.to_string());
    Ok(ExitCode::SUCCESS)
}
