//! # bpm: BOSH process manager
//!
//! Runs BOSH job processes in isolated `runc` containers.
//! Single binary for starting, stopping, and inspecting jobs.

mod commands;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = commands::require_root(nix::unistd::geteuid()) {
        output::error(&e.to_string());
        return ExitCode::FAILURE;
    }

    match commands::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            output::error(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}
