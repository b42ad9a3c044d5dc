//! `ctlhost init`: Collect the configuration, then create and initialize
//! the container.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use ctlhost_common::config::ProvisionSettings;
use ctlhost_common::prompt::TerminalPrompt;
use tokio_util::sync::CancellationToken;

use crate::wizard::Wizard;

/// Arguments for the `init` command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Init configuration file to use instead of the one in the current
    /// directory.
    #[arg(long)]
    pub util_config_file: Option<PathBuf>,
}

/// Executes the `init` command.
///
/// The daemon is checked before any question is asked, so an unreachable
/// daemon fails fast.
///
/// # Errors
///
/// Returns an error if the daemon is unreachable, the configuration cannot
/// be completed, or provisioning fails.
pub async fn execute(
    args: InitArgs,
    settings: ProvisionSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let max_attempts = settings.prompt.max_attempts;
    let orchestrator = super::connect(settings)?;
    orchestrator.check(cancel).await?;

    let workdir = std::env::current_dir().context("unable to determine the working directory")?;
    let mut prompt = TerminalPrompt::new(std::io::stdin().lock(), std::io::stdout());
    let mut wizard = Wizard::new(&mut prompt, max_attempts, workdir);
    let properties = wizard.collect(args.util_config_file.as_deref())?;
    let Some(config) = wizard.confirm(&properties)? else {
        tracing::info!("provisioning declined");
        return Ok(());
    };

    let mut out = std::io::stdout();
    let outcome = orchestrator.run(&config, &mut prompt, cancel, &mut out).await?;
    if outcome.reused {
        writeln!(out, "Using existing container {}.", outcome.container_id)?;
    }
    Ok(())
}
