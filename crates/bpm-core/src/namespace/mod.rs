//! Namespace selection for job containers.
//!
//! Jobs get private mount, PID, IPC and UTS namespaces. The network
//! namespace is inherited from the host.

use crate::oci::{Namespace, NamespaceType};

/// Which namespaces a container creates.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate user namespace.
    pub user: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            network: false,
            user: false,
            ipc: true,
            uts: true,
        }
    }
}

impl NamespaceConfig {
    /// Namespace entries for the runtime configuration, in a fixed order.
    #[must_use]
    pub fn to_oci(&self) -> Vec<Namespace> {
        [
            (self.ipc, NamespaceType::Ipc),
            (self.mount, NamespaceType::Mount),
            (self.network, NamespaceType::Network),
            (self.pid, NamespaceType::Pid),
            (self.user, NamespaceType::User),
            (self.uts, NamespaceType::Uts),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, ns_type)| Namespace { ns_type })
        .collect()
    }
}
