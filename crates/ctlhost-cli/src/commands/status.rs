//! `ctlhost status`: Report the managed container.

use std::io::Write;

use clap::Args;
use ctlhost_common::config::ProvisionSettings;
use ctlhost_common::types::ContainerRecord;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// State of the managed container as reported by `status`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    /// Logical container name.
    pub container_name: String,
    /// Image new containers are created from.
    pub image: String,
    /// The container, if it exists.
    pub container: Option<ContainerRecord>,
}

impl StatusReport {
    fn render(&self) -> String {
        match &self.container {
            None => format!("Container {} does not exist.", self.container_name),
            Some(record) => format!(
                "Container {} exists with ID {} and is {}.",
                self.container_name,
                record.id,
                if record.is_running { "running" } else { "not running" }
            ),
        }
    }
}

/// Executes the `status` command.
///
/// # Errors
///
/// Returns an error if the daemon is unreachable or more than one container
/// carries the managed name.
pub async fn execute(
    args: StatusArgs,
    settings: ProvisionSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = super::connect(settings)?;
    let container = orchestrator.status(cancel).await?;
    let report = StatusReport {
        container_name: orchestrator.settings().container_name.clone(),
        image: orchestrator.settings().image.clone(),
        container,
    };

    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", report.render())?;
    }
    Ok(())
}
