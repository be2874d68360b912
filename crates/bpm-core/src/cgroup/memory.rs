//! Memory controller probing.
//!
//! A swap ceiling is only meaningful when the host exposes swap accounting.
//! Hosts without it silently get no swap limit.

use std::path::PathBuf;

/// Cgroup v1 control file for memory plus swap.
const V1_MEMSW_LIMIT: &str = "memory/memory.memsw.limit_in_bytes";

/// Cgroup v2 swap control files, checked in a non-root slice since the root
/// cgroup never carries them.
const V2_SWAP_MAX: &[&str] = &["system.slice/memory.swap.max", "init.scope/memory.swap.max"];

/// Probes a cgroup hierarchy for controller support.
#[derive(Debug, Clone)]
pub struct CgroupProbe {
    root: PathBuf,
}

impl CgroupProbe {
    /// Creates a probe for the hierarchy mounted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// True when the host can enforce a swap ceiling.
    #[must_use]
    pub fn swap_supported(&self) -> bool {
        let supported = self.root.join(V1_MEMSW_LIMIT).exists()
            || V2_SWAP_MAX.iter().any(|f| self.root.join(f).exists());
        tracing::debug!(
            root = %self.root.display(),
            supported,
            "probed swap accounting"
        );
        supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hierarchy_has_no_swap() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!CgroupProbe::new(dir.path()).swap_supported());
    }

    #[test]
    fn detects_v1_memsw() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("memory")).expect("mkdir");
        std::fs::write(dir.path().join(V1_MEMSW_LIMIT), "max").expect("write");
        assert!(CgroupProbe::new(dir.path()).swap_supported());
    }

    #[test]
    fn detects_v2_swap_max() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("system.slice")).expect("mkdir");
        std::fs::write(dir.path().join(V2_SWAP_MAX[0]), "max").expect("write");
        assert!(CgroupProbe::new(dir.path()).swap_supported());
    }
}
