//! CLI command definitions and dispatch.

pub mod check;
pub mod init;
pub mod status;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ctlhost_common::config::ProvisionSettings;
use ctlhost_runtime::docker::DockerClient;
use ctlhost_runtime::orchestrator::Orchestrator;
use tokio_util::sync::CancellationToken;

/// ctlhost: creates and initializes the Ansible control host container.
#[derive(Parser, Debug)]
#[command(name = "ctlhost", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON file overriding the provisioning settings.
    #[arg(long, global = true, env = "CTLHOST_SETTINGS")]
    pub settings: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect the configuration, then create and initialize the container.
    Init(init::InitArgs),
    /// Check that the Docker daemon is reachable.
    Check(check::CheckArgs),
    /// Report whether the managed container exists and is running.
    Status(status::StatusArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli, cancel: &CancellationToken) -> anyhow::Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;
    match cli.command {
        Command::Init(args) => init::execute(args, settings, cancel).await,
        Command::Check(args) => check::execute(args, settings, cancel).await,
        Command::Status(args) => status::execute(args, settings, cancel).await,
    }
}

fn load_settings(path: Option<&std::path::Path>) -> anyhow::Result<ProvisionSettings> {
    let Some(path) = path else {
        return Ok(ProvisionSettings::default());
    };
    let settings = ProvisionSettings::load(path)
        .with_context(|| format!("unable to load settings from {}", path.display()))?;
    tracing::info!(path = %path.display(), "settings loaded");
    Ok(settings)
}

/// Connects to the local daemon and wraps the client in an orchestrator.
fn connect(settings: ProvisionSettings) -> anyhow::Result<Orchestrator<DockerClient>> {
    let client = DockerClient::connect().context("unable to create a Docker client")?;
    Ok(Orchestrator::new(client, settings))
}
