//! # ctlhost
//!
//! Creates and initializes the Ansible control host container on the local
//! Docker daemon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;
mod wizard;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    match commands::execute(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let _ = writeln!(std::io::stderr(), "ERROR: {err:#}. This utility will now exit.");
            ExitCode::FAILURE
        }
    }
}

/// First Ctrl-C cancels pending retries; a second one exits immediately.
fn install_interrupt_handler(cancel: CancellationToken) {
    let installed = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        cancel.cancel();
        let _ = writeln!(
            std::io::stderr(),
            "Interrupted. Press Ctrl-C again to abort immediately."
        );
    });
    if let Err(error) = installed {
        tracing::warn!(%error, "unable to install Ctrl-C handler");
    }
}
