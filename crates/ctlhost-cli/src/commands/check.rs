//! `ctlhost check`: Verify that the Docker daemon is reachable.

use std::io::Write;

use clap::Args;
use ctlhost_common::config::ProvisionSettings;
use tokio_util::sync::CancellationToken;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if the daemon does not answer within the configured
/// retries.
pub async fn execute(
    _args: CheckArgs,
    settings: ProvisionSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = super::connect(settings)?;
    orchestrator.check(cancel).await?;
    writeln!(std::io::stdout(), "Docker daemon is reachable.")?;
    Ok(())
}
