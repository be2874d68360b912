//! Container records as reported by the runtime.
//!
//! bpm keeps no state of its own: every record here is parsed fresh from
//! the runtime on each query.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bpm_common::types::ContainerId;

/// Container status reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The runtime is setting up the container.
    Creating,
    /// Created but the user process has not been started.
    Created,
    /// The user process is running.
    Running,
    /// The user process is frozen.
    Paused,
    /// The user process has exited.
    Stopped,
    /// A status this version does not recognise.
    #[serde(other)]
    Unknown,
}

impl ContainerStatus {
    /// True while the container holds a live process.
    ///
    /// Paused containers still own their process and count as alive.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Creating | Self::Running | Self::Paused)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A container as described by `runc state` and `runc list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container identifier.
    pub id: ContainerId,
    /// Host pid of the init process, 0 when none.
    #[serde(default)]
    pub pid: i32,
    /// Current status.
    pub status: ContainerStatus,
    /// Bundle the container was created from.
    #[serde(default)]
    pub bundle: PathBuf,
    /// Creation time.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// Job-facing view of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Container identifier, which is the job's display name.
    pub name: String,
    /// Host pid, 0 when none.
    pub pid: i32,
    /// Current status.
    pub status: ContainerStatus,
}

impl From<ContainerRecord> for Job {
    fn from(record: ContainerRecord) -> Self {
        Self {
            name: record.id.as_str().to_string(),
            pid: record.pid,
            status: record.status,
        }
    }
}
