//! Linux capability sets for job processes.
//!
//! Jobs run with no capabilities. Privileged jobs get every capability the
//! kernel defines.

use crate::oci::Capabilities;

/// Every capability known to the runtime, in kernel order.
pub const ALL_CAPABILITIES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_DAC_READ_SEARCH",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_LINUX_IMMUTABLE",
    "CAP_NET_BIND_SERVICE",
    "CAP_NET_BROADCAST",
    "CAP_NET_ADMIN",
    "CAP_NET_RAW",
    "CAP_IPC_LOCK",
    "CAP_IPC_OWNER",
    "CAP_SYS_MODULE",
    "CAP_SYS_RAWIO",
    "CAP_SYS_CHROOT",
    "CAP_SYS_PTRACE",
    "CAP_SYS_PACCT",
    "CAP_SYS_ADMIN",
    "CAP_SYS_BOOT",
    "CAP_SYS_NICE",
    "CAP_SYS_RESOURCE",
    "CAP_SYS_TIME",
    "CAP_SYS_TTY_CONFIG",
    "CAP_MKNOD",
    "CAP_LEASE",
    "CAP_AUDIT_WRITE",
    "CAP_AUDIT_CONTROL",
    "CAP_SETFCAP",
    "CAP_MAC_OVERRIDE",
    "CAP_MAC_ADMIN",
    "CAP_SYSLOG",
    "CAP_WAKE_ALARM",
    "CAP_BLOCK_SUSPEND",
    "CAP_AUDIT_READ",
];

/// Capability sets for a job.
///
/// Empty unless `privileged`, in which case every set except ambient holds
/// the full list.
#[must_use]
pub fn capabilities_for(privileged: bool) -> Capabilities {
    if !privileged {
        return Capabilities::default();
    }
    let all: Vec<String> = ALL_CAPABILITIES.iter().map(ToString::to_string).collect();
    tracing::debug!(count = all.len(), "granting full capability set");
    Capabilities {
        bounding: all.clone(),
        effective: all.clone(),
        inheritable: all.clone(),
        permitted: all,
        ambient: Vec::new(),
    }
}
