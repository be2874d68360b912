//! `bpm list`: List job processes.

use std::process::ExitCode;

use clap::Args;

use bpm_common::layout::HostLayout;
use bpm_runtime::engine::Engine;

use crate::{logging, output};

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Executes the `list` command.
///
/// Stopped containers that have not been removed are listed too.
///
/// # Errors
///
/// Returns an error if the runtime cannot be queried.
pub fn execute(layout: &HostLayout, _args: &ListArgs) -> anyhow::Result<ExitCode> {
    logging::init(None)?;
    let engine = Engine::new(layout.clone())?;
    output::print_jobs(&engine.list()?);
    Ok(ExitCode::SUCCESS)
}
