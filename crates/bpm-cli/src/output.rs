//! Operator-facing output.
//!
//! Status notices and listings go to stdout; errors go to stderr.

use std::fmt::Write;
use std::process::ExitCode;

use bpm_runtime::state::Job;

/// Prints a one-line status notice.
#[allow(clippy::print_stdout)]
pub fn notice(message: &str) {
    println!("{message}");
}

/// Prints an error line.
#[allow(clippy::print_stderr)]
pub fn error(message: &str) {
    eprintln!("{message}");
}

/// Prints the job table; nothing at all when there are no jobs.
#[allow(clippy::print_stdout)]
pub fn print_jobs(jobs: &[Job]) {
    print!("{}", format_jobs(jobs));
}

/// Renders jobs as left-aligned `Name Pid Status` columns.
#[must_use]
pub fn format_jobs(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return String::new();
    }
    let rows: Vec<[String; 3]> = jobs
        .iter()
        .map(|j| [j.name.clone(), j.pid.to_string(), j.status.to_string()])
        .collect();
    let name_width = rows.iter().map(|r| r[0].len()).max().unwrap_or(0).max(4);
    let pid_width = rows.iter().map(|r| r[1].len()).max().unwrap_or(0).max(3);

    let mut out = String::new();
    let _ = writeln!(out, "{:<name_width$}  {:<pid_width$}  Status", "Name", "Pid");
    for [name, pid, status] in &rows {
        let _ = writeln!(out, "{name:<name_width$}  {pid:<pid_width$}  {status}");
    }
    out
}

/// Maps a child exit code onto the process exit code.
#[must_use]
pub fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
