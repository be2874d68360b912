//! `bpm trace`: Attach strace to a running job process.

use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use bpm_common::layout::HostLayout;
use bpm_runtime::engine::Engine;
use bpm_runtime::exec::{strace_binary, trace_command};

use super::JobArgs;
use crate::{logging, output};

/// Arguments for the `trace` command.
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Process to trace.
    #[command(flatten)]
    pub job: JobArgs,
}

/// Executes the `trace` command and exits with strace's status.
///
/// # Errors
///
/// Returns an error if the job is not running or strace cannot be run.
pub fn execute(layout: &HostLayout, args: &TraceArgs) -> anyhow::Result<ExitCode> {
    let id = args.job.identity()?;
    logging::init(None)?;
    let engine = Engine::new(layout.clone())?;
    let pid = engine.pid(&id)?;
    let strace = strace_binary()?;
    let status = trace_command(strace, pid)
        .status()
        .context("failed to run strace")?;
    Ok(status.code().map_or(ExitCode::FAILURE, output::exit_code))
}
