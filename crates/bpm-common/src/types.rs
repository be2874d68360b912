//! Domain primitive types used across the bpm workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BpmError, Result};

/// Runtime-facing identifier for a job's container.
///
/// Equal to the job name when the process shares it, `<job>.<process>`
/// otherwise. Keys the bundle path, pid file, log paths, and lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job and one of its processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    job: String,
    process: String,
}

impl JobIdentity {
    /// Creates an identity, validating both names.
    ///
    /// When `process` is `None` the process takes the job's name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either name is not a valid
    /// filesystem and runtime ID token.
    pub fn new(job: impl Into<String>, process: Option<String>) -> Result<Self> {
        let job = job.into();
        let process = process.unwrap_or_else(|| job.clone());
        validate_name("job", &job)?;
        validate_name("process", &process)?;
        Ok(Self { job, process })
    }

    /// Returns the job name.
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Returns the process name.
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Derives the container ID for this identity.
    #[must_use]
    pub fn container_id(&self) -> ContainerId {
        if self.job == self.process {
            ContainerId::new(self.job.clone())
        } else {
            ContainerId::new(format!("{}.{}", self.job, self.process))
        }
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.container_id())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    // `.` joins job and process in the container ID, so it cannot appear in
    // either name.
    let valid = !name.is_empty()
        && name.len() <= 128
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(BpmError::Config {
            message: format!("invalid {kind} name: {name:?}"),
        })
    }
}
