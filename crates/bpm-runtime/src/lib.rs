//! Job lifecycle management for bpm.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod adapter;
pub mod backend;
pub mod clock;
pub mod engine;
pub mod exec;
pub mod lifecycle;
pub mod lock;
pub mod logs;
pub mod process;
pub mod state;

#[cfg(test)]
pub(crate) mod fake;
