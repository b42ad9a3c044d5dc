//! # ctlhost-common
//!
//! Shared types, settings, init configuration, prompts, and error
//! definitions used across the ctlhost workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and knows nothing about the container runtime.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod init_config;
pub mod prompt;
pub mod types;
