//! # bpm-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire bpm workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the process description, container identity,
//! and host layout that every lifecycle operation is keyed on.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod types;
