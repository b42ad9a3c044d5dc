//! Running the initialization script inside the container.

use std::io::Write;

use ctlhost_common::config::ProvisionSettings;
use ctlhost_common::init_config::InitConfig;
use ctlhost_common::types::ContainerId;
use futures_util::StreamExt;

use crate::api::{ContainerRuntime, ExecSpec};
use crate::error::ExecError;

/// Builds the init command: the script followed by the proxy address
/// prefix and the inventory file name.
#[must_use]
pub fn init_command(settings: &ProvisionSettings, config: &InitConfig) -> Vec<String> {
    vec![
        settings.init_script.clone(),
        format!("-p {}", config.proxy_ip_address_prefix),
        format!("-i {}", config.inventory_file_name()),
    ]
}

/// Runs the init command in container `id`, copying its output to `out`
/// until the session closes.
///
/// # Errors
///
/// Returns an [`ExecError`] if the container cannot be inspected, the
/// session cannot be created or started, the daemon returns an empty
/// session id, or the output cannot be relayed.
pub async fn run_init<R: ContainerRuntime>(
    runtime: &R,
    id: &ContainerId,
    settings: &ProvisionSettings,
    config: &InitConfig,
    out: &mut impl Write,
) -> Result<(), ExecError> {
    runtime
        .inspect_container(id)
        .await
        .map_err(ExecError::Inspect)?;

    let spec = ExecSpec {
        command: init_command(settings, config),
        user: settings.exec_user.clone(),
        working_dir: settings.exec_working_dir.clone(),
        tty: true,
    };
    tracing::info!(%id, command = ?spec.command, user = %spec.user, "creating exec session");
    let exec_id = runtime
        .create_exec(id, &spec)
        .await
        .map_err(ExecError::Create)?;
    if exec_id.is_empty() {
        return Err(ExecError::EmptySessionId);
    }

    let mut output = runtime
        .start_exec(&exec_id, spec.tty)
        .await
        .map_err(ExecError::Start)?;
    while let Some(chunk) = output.next().await {
        out.write_all(&chunk.map_err(ExecError::Output)?)
            .map_err(ExecError::Write)?;
    }
    out.flush().map_err(ExecError::Write)?;
    tracing::info!(%id, exec_id, "exec session finished");
    Ok(())
}
