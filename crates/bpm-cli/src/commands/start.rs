//! `bpm start`: Start a job process in the background.

use std::process::ExitCode;

use clap::Args;

use bpm_common::layout::HostLayout;
use bpm_runtime::engine::Engine;
use bpm_runtime::lifecycle::StartOutcome;

use super::{ConfigArgs, JobArgs};
use crate::{logging, output};

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Process to start.
    #[command(flatten)]
    pub job: JobArgs,

    /// Process description and overrides.
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Executes the `start` command.
///
/// Starting a job that is already running is reported and succeeds.
///
/// # Errors
///
/// Returns an error if the description is invalid or the job cannot be
/// started.
pub fn execute(layout: &HostLayout, args: &StartArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(Some(&layout.bpm_log(&id)))?;
    let _span = tracing::info_span!("start", job = %id).entered();
    tracing::info!("starting");

    let config = args.config.load(layout, &id)?;
    let engine = Engine::new(layout.clone())?;
    if engine.start(&id, &config)? == StartOutcome::AlreadyRunning {
        output::notice(&format!("container {} is already running", id.container_id()));
    }

    tracing::info!("complete");
    Ok(ExitCode::SUCCESS)
}
