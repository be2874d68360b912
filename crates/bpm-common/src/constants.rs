//! System-wide constants and default paths.

/// Default Host Layout root.
pub const DEFAULT_BOSH_ROOT: &str = "/var/vcap";

/// Environment variable overriding the Host Layout root.
pub const BOSH_ROOT_ENV: &str = "BPM_BOSH_ROOT";

/// Host Layout root as seen from inside every container.
pub const CONTAINER_ROOT: &str = "/var/vcap";

/// Non-root service user processes run as unless privileged.
pub const SERVICE_USER: &str = "vcap";

/// Cgroup hierarchy mount point on the host.
pub const CGROUP_PATH: &str = "/sys/fs/cgroup";

/// Name of the bundle's runtime specification file.
pub const BUNDLE_CONFIG_FILE: &str = "config.json";

/// Name of the bundle's root filesystem directory.
pub const BUNDLE_ROOTFS_DIR: &str = "rootfs";

/// Shell opened by `bpm shell`.
pub const SHELL_PATH: &str = "/bin/bash";

/// Default stop timeout for `bpm stop`, in seconds.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 20;
