//! Translation of job limits into runtime resources.
//!
//! Memory and process ceilings become cgroup parameters; the open-files
//! ceiling becomes an rlimit. An absent limit is left out entirely so the
//! host default applies.

pub mod memory;

use bpm_common::config::Limits;
use bpm_common::error::{BpmError, Result};

use crate::oci::{MemoryResources, PidsResources, Resources, Rlimit};

pub use memory::CgroupProbe;

/// Runtime-facing form of a job's limits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePlan {
    /// Cgroup parameters, `None` when no cgroup limit applies.
    pub resources: Option<Resources>,
    /// Process rlimits.
    pub rlimits: Vec<Rlimit>,
}

/// Resolves `limits` against the host's capabilities.
///
/// When `swap_supported` is false the swap ceiling is omitted.
///
/// # Errors
///
/// Returns a configuration error if a limit is invalid or does not fit the
/// runtime's integer range.
pub fn resolve_limits(limits: Option<&Limits>, swap_supported: bool) -> Result<ResourcePlan> {
    let Some(limits) = limits else {
        return Ok(ResourcePlan::default());
    };

    let memory = limits
        .memory_bytes()?
        .map(|bytes| {
            let limit = i64::try_from(bytes).map_err(|_| BpmError::Config {
                message: format!("memory limit too large: {bytes} bytes"),
            })?;
            Ok::<_, BpmError>(MemoryResources {
                limit: Some(limit),
                swap: swap_supported.then_some(limit),
            })
        })
        .transpose()?;

    let pids = limits.processes()?.map(|limit| PidsResources { limit });

    let rlimits = limits
        .open_files()?
        .map(|n| Rlimit {
            rlimit_type: "RLIMIT_NOFILE".into(),
            hard: n,
            soft: n,
        })
        .into_iter()
        .collect();

    let resources = (memory.is_some() || pids.is_some()).then_some(Resources { memory, pids });
    tracing::debug!(
        memory = resources.as_ref().and_then(|r| r.memory.as_ref()).is_some(),
        swap_supported,
        "resolved limits"
    );
    Ok(ResourcePlan { resources, rlimits })
}
