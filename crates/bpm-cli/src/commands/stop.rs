//! `bpm stop`: Stop a job process and clean up its container.

use std::process::ExitCode;
use std::time::Duration;

use clap::Args;

use bpm_common::constants::DEFAULT_STOP_TIMEOUT_SECS;
use bpm_common::layout::HostLayout;
use bpm_runtime::engine::Engine;
use bpm_runtime::lifecycle::StopOutcome;

use super::JobArgs;
use crate::{logging, output};

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Process to stop.
    #[command(flatten)]
    pub job: JobArgs,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the job does not stop within the timeout or its
/// container cannot be removed.
pub fn execute(layout: &HostLayout, args: &StopArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(Some(&layout.bpm_log(&id)))?;
    let _span = tracing::info_span!("stop", job = %id).entered();
    tracing::info!("starting");

    let engine = Engine::new(layout.clone())?;
    let timeout = Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS);
    if engine.stop(&id, timeout)? == StopOutcome::AlreadyStopped {
        output::notice("job-already-stopped");
    }

    tracing::info!("complete");
    Ok(ExitCode::SUCCESS)
}
