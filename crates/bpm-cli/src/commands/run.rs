//! `bpm run`: Run a job process in the foreground.

use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use bpm_common::layout::HostLayout;
use bpm_runtime::backend::ProcessIo;
use bpm_runtime::engine::Engine;

use super::{ConfigArgs, JobArgs};
use crate::{logging, output};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Process to run.
    #[command(flatten)]
    pub job: JobArgs,

    /// Process description and overrides.
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Executes the `run` command and exits with the process's status.
///
/// Ctrl+C reaches the container through the terminal; bpm ignores it so
/// the container is always removed afterwards.
///
/// # Errors
///
/// Returns an error if the job is already running or cannot be run.
pub fn execute(layout: &HostLayout, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(Some(&layout.bpm_log(&id)))?;
    let _span = tracing::info_span!("run", job = %id).entered();
    tracing::info!("starting");

    let config = args.config.load(layout, &id)?;
    ctrlc::set_handler(|| tracing::debug!("interrupt left to the job"))
        .context("failed to set Ctrl+C handler")?;

    let engine = Engine::new(layout.clone())?;
    let code = engine.run(&id, &config, ProcessIo::inherit())?;

    tracing::info!(code, "complete");
    Ok(output::exit_code(code))
}
