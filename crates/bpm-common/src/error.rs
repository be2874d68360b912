//! Unified error types for the bpm workspace.
//!
//! Variants follow the operator-facing taxonomy: configuration and
//! validation problems are reported before anything touches the runtime,
//! prerequisite I/O failures abort before any runtime call, and runtime
//! failures carry the runtime's own message verbatim.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BpmError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid or missing.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A mount or volume request was rejected at plan time.
    #[error("invalid volume: {message}")]
    Validation {
        /// Description of the offending request.
        message: String,
    },

    /// The container runtime reported a failure.
    #[error("runtime {operation} failed: {message}")]
    Runtime {
        /// Runtime operation that failed (`run`, `delete`, ...).
        operation: &'static str,
        /// Message reported by the runtime.
        message: String,
    },

    /// Removing a stale container before a restart failed.
    #[error(
        "failed to clean up stale container {id}: {source}\n\
         manual cleanup may be required: delete the container and remove {}",
        bundle.display()
    )]
    CleanupFailed {
        /// Identity of the stale container.
        id: String,
        /// Bundle directory left behind.
        bundle: PathBuf,
        /// Underlying failure.
        source: Box<BpmError>,
    },

    /// The job did not stop within its wait budget.
    #[error("failed to stop job {id} within timeout ({}s)", timeout.as_secs())]
    Timeout {
        /// Identity of the container.
        id: String,
        /// Wait budget that elapsed.
        timeout: Duration,
    },

    /// No container exists for the job.
    #[error("job is not running: {id}")]
    NotRunning {
        /// Identity of the container.
        id: String,
    },

    /// A container exists but has no live process.
    #[error("no pid for job: {id}")]
    NoPid {
        /// Identity of the container.
        id: String,
    },

    /// A required resource was not found.
    #[error("{kind} {id} does not exist")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A permission or privilege error.
    #[error("{message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML configuration could not be parsed.
    #[error("failed to parse configuration: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl BpmError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the user-facing "nothing to act on" conditions.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotRunning { .. } | Self::NoPid { .. } | Self::NotFound { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BpmError>;
