//! Resolution of the OS user a job runs as.

use nix::unistd::User as PasswdEntry;

use bpm_common::error::{BpmError, Result};

use crate::oci::User;

/// Looks up users by name.
pub trait UserFinder {
    /// Resolves `name` to its uid and gid.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the user does not exist, or a
    /// configuration error if the user database cannot be read.
    fn lookup(&self, name: &str) -> Result<User>;
}

/// Resolves users from the host's user database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUserFinder;

impl UserFinder for SystemUserFinder {
    fn lookup(&self, name: &str) -> Result<User> {
        let entry = PasswdEntry::from_name(name)
            .map_err(|e| BpmError::Config {
                message: format!("failed to look up user {name}: {e}"),
            })?
            .ok_or_else(|| BpmError::NotFound {
                kind: "user",
                id: name.to_string(),
            })?;
        tracing::debug!(user = name, uid = entry.uid.as_raw(), "resolved user");
        Ok(User {
            uid: entry.uid.as_raw(),
            gid: entry.gid.as_raw(),
            additional_gids: Vec::new(),
        })
    }
}
