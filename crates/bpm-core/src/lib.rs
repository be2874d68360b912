//! # bpm-core
//!
//! Isolation primitives for bpm, expressed as data handed to the
//! container runtime rather than as direct system calls.
//!
//! This crate provides:
//! - **OCI runtime config**: the `config.json` model written into bundles.
//! - **Mount planning**: the depth-ordered bind mount list for a job.
//! - **Namespaces**: which namespaces a job container creates.
//! - **Capabilities**: the empty default set and the privileged full set.
//! - **Cgroups**: translation of job limits into resources and rlimits.
//! - **Users**: resolution of the service user.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod capability;
pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod oci;
pub mod user;
