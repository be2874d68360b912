//! Process Description: the YAML configuration a job ships for one process.
//!
//! Loaded once per invocation and never mutated after the CLI flags have
//! been merged in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BpmError, Result};

/// Declarative description of one job process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Absolute path of the program to run inside the container.
    pub executable: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment in `KEY=VALUE` form.
    #[serde(default)]
    pub env: Vec<String>,
    /// Working directory inside the container; defaults to the job directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// Lifecycle hooks.
    #[serde(default)]
    pub hooks: Option<Hooks>,
    /// Resource ceilings.
    #[serde(default)]
    pub limits: Option<Limits>,
    /// Additional volumes to bind into the container.
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Mount the job's persistent store.
    #[serde(default)]
    pub persistent_disk: bool,
    /// Mount the job's ephemeral data directory.
    #[serde(default)]
    pub ephemeral_disk: bool,
    /// Escape hatches that weaken isolation.
    #[serde(default, rename = "unsafe")]
    pub unsafe_config: Option<UnsafeConfig>,
}

/// Hooks run by bpm around the process lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hooks {
    /// Executable run on the host before the container is created.
    #[serde(default)]
    pub pre_start: Option<PathBuf>,
}

/// Optional resource ceilings; an absent field inherits the host default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Memory ceiling as a byte string (`512M`, `1GiB`, `1073741824`).
    #[serde(default)]
    pub memory: Option<String>,
    /// Maximum open file descriptors.
    #[serde(default)]
    pub open_files: Option<i64>,
    /// Maximum number of processes (pids) in the container.
    #[serde(default)]
    pub processes: Option<i64>,
}

impl Limits {
    /// Parses the memory ceiling into bytes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparsable or zero values.
    pub fn memory_bytes(&self) -> Result<Option<u64>> {
        let Some(raw) = self.memory.as_deref() else {
            return Ok(None);
        };
        match parse_memory(raw) {
            Some(bytes) if bytes > 0 => Ok(Some(bytes)),
            _ => Err(BpmError::Config {
                message: format!("invalid memory limit: {raw:?}"),
            }),
        }
    }

    /// Open-files ceiling, validated positive.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-positive values.
    pub fn open_files(&self) -> Result<Option<u64>> {
        positive("open_files", self.open_files).map(|v| v.map(i64::unsigned_abs))
    }

    /// Process ceiling, validated positive.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-positive values.
    pub fn processes(&self) -> Result<Option<i64>> {
        positive("processes", self.processes)
    }

    fn validate(&self) -> Result<()> {
        let _ = self.memory_bytes()?;
        let _ = self.open_files()?;
        let _ = self.processes()?;
        Ok(())
    }
}

fn positive(name: &str, value: Option<i64>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(n)),
        Some(n) => Err(BpmError::Config {
            message: format!("invalid {name} limit: {n} (must be positive)"),
        }),
    }
}

/// An additional bind mount requested by the job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    /// Absolute path, identical on the host and in the container.
    pub path: PathBuf,
    /// Mount read-write instead of read-only.
    #[serde(default)]
    pub writable: bool,
    /// Allow executing files from the volume.
    #[serde(default)]
    pub allow_executions: bool,
    /// Bind an existing path without creating it.
    #[serde(default)]
    pub mount_only: bool,
}

impl Volume {
    /// Parses a `-v` flag: `PATH[:opt,opt...]` with options `writable`,
    /// `allow_executions` and `mount_only`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty path or unknown option.
    pub fn parse_flag(flag: &str) -> Result<Self> {
        let (path, opts) = flag.split_once(':').unwrap_or((flag, ""));
        if path.is_empty() {
            return Err(BpmError::Config {
                message: format!("invalid volume flag: {flag:?}"),
            });
        }
        let mut volume = Self {
            path: PathBuf::from(path),
            ..Self::default()
        };
        for opt in opts.split(',').filter(|o| !o.is_empty()) {
            match opt {
                "writable" => volume.writable = true,
                "allow_executions" => volume.allow_executions = true,
                "mount_only" => volume.mount_only = true,
                other => {
                    return Err(BpmError::Config {
                        message: format!("invalid volume option {other:?} in {flag:?}"),
                    });
                }
            }
        }
        Ok(volume)
    }
}

/// Unsafe configuration. Every field weakens isolation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnsafeConfig {
    /// Run as root with every capability.
    #[serde(default)]
    pub privileged: bool,
    /// Volumes exempt from the data/store/run path restriction.
    #[serde(default)]
    pub unrestricted_volumes: Vec<Volume>,
}

impl ProcessConfig {
    /// Loads and validates a description from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, a YAML
    /// error if it cannot be parsed, and a configuration error if the
    /// parsed description is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BpmError::Config {
            message: format!("failed to read process config {}: {e}", path.display()),
        })?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded process config");
        Ok(config)
    }

    /// Checks fields that can be validated without a host layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.executable.is_empty() {
            return Err(BpmError::Config {
                message: "executable is required".into(),
            });
        }
        if let Some(dir) = self.workdir.as_ref().filter(|d| !d.is_absolute()) {
            return Err(BpmError::Config {
                message: format!("workdir must be absolute: {}", dir.display()),
            });
        }
        for entry in &self.env {
            let _ = split_env(entry)?;
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
        }
        Ok(())
    }

    /// Merges `KEY=VALUE` overrides; a later value replaces an earlier key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for entries without `=`.
    pub fn merge_env(&mut self, overrides: &[String]) -> Result<()> {
        for entry in overrides {
            let (key, _) = split_env(entry)?;
            self.env
                .retain(|existing| !matches!(split_env(existing), Ok((k, _)) if k == key));
            self.env.push(entry.clone());
        }
        Ok(())
    }

    /// Appends volumes given on the command line.
    pub fn add_volumes(&mut self, volumes: impl IntoIterator<Item = Volume>) {
        self.volumes.extend(volumes);
    }

    /// True when unsafe privileged mode is requested.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.unsafe_config.as_ref().is_some_and(|u| u.privileged)
    }

    /// Volumes exempt from path restrictions.
    #[must_use]
    pub fn unrestricted_volumes(&self) -> &[Volume] {
        self.unsafe_config
            .as_ref()
            .map_or(&[], |u| u.unrestricted_volumes.as_slice())
    }
}

/// Splits a `KEY=VALUE` entry.
///
/// # Errors
///
/// Returns a configuration error when `=` is missing or the key is empty.
pub fn split_env(entry: &str) -> Result<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(BpmError::Config {
            message: format!("invalid environment entry {entry:?}, expected KEY=VALUE"),
        }),
    }
}

/// Parses a memory byte string into bytes.
///
/// Single-letter and `iB` suffixes are binary, `KB`/`MB`/`GB` are decimal.
#[must_use]
pub fn parse_memory(s: &str) -> Option<u64> {
    let s = s.trim().to_ascii_uppercase();
    let (num_str, multiplier): (&str, u64) = if let Some(n) = s.strip_suffix("GIB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("GB") {
        (n, 1_000_000_000)
    } else if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MIB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KIB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };
    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}
