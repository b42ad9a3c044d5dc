//! Provisioning core for the automation container.
//!
//! The pipeline runs strictly in order: [`probe`] the daemon, make sure the
//! image exists ([`image`]), [`resolver`] finds the managed container,
//! [`lifecycle`] reconciles it, and for a fresh container [`stage`] copies
//! the SSH key and inventory in before [`exec`] runs the init script.
//! [`orchestrator::Orchestrator`] ties the steps together over any
//! [`api::ContainerRuntime`], of which [`docker::DockerClient`] is the real
//! one.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod api;
pub mod docker;
pub mod error;
pub mod exec;
pub mod image;
pub mod lifecycle;
pub mod orchestrator;
pub mod probe;
pub mod resolver;
pub mod retry;
pub mod stage;

#[cfg(test)]
mod fake;
