//! Daemon connectivity probe.

use tokio_util::sync::CancellationToken;

use crate::api::ContainerRuntime;
use crate::error::{ProvisionError, Result};
use crate::retry::RetryPolicy;

/// Pings the daemon until it answers or `policy` gives up.
///
/// # Errors
///
/// Returns [`ProvisionError::Connectivity`] when every attempt failed or
/// `cancel` fired while waiting between attempts.
pub async fn probe<R: ContainerRuntime>(
    runtime: &R,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<()> {
    policy
        .run("docker ping", cancel, || runtime.ping())
        .await
        .map_err(ProvisionError::Connectivity)?;
    tracing::info!("docker daemon reachable");
    Ok(())
}
