//! Filesystem view of a job container.
//!
//! Provides the mount planner and the fixed path lists the runtime masks or
//! remounts read-only.

pub mod mount;

use std::path::{Path, PathBuf};

/// Host directories bind-mounted read-only to give jobs a minimal userland.
pub const DEFAULT_SYSTEM_DIRS: &[&str] = &["/bin", "/etc", "/lib", "/lib64", "/sbin", "/usr"];

/// Paths hidden from the container.
pub const MASKED_PATHS: &[&str] = &[
    "/proc/acpi",
    "/proc/asound",
    "/proc/kcore",
    "/proc/keys",
    "/proc/latency_stats",
    "/proc/timer_list",
    "/proc/timer_stats",
    "/proc/sched_debug",
    "/proc/scsi",
    "/sys/firmware",
];

/// Paths remounted read-only inside the container.
pub const READONLY_PATHS: &[&str] = &[
    "/proc/bus",
    "/proc/fs",
    "/proc/irq",
    "/proc/sys",
    "/proc/sysrq-trigger",
];

/// The subset of [`DEFAULT_SYSTEM_DIRS`] present on this host.
#[must_use]
pub fn host_system_dirs() -> Vec<PathBuf> {
    DEFAULT_SYSTEM_DIRS
        .iter()
        .map(PathBuf::from)
        .filter(|dir| Path::new(dir).exists())
        .collect()
}
