//! Lookup of the managed container by its logical name.

use ctlhost_common::types::{ContainerId, ContainerRecord};

use crate::api::{ContainerListing, ContainerRuntime};
use crate::error::{ProvisionError, Result};

/// Finds the container named `name`, including stopped ones.
///
/// Returns `None` when it has not been created yet.
///
/// # Errors
///
/// Returns [`ProvisionError::Ambiguous`] when more than one container
/// matches, or [`ProvisionError::Resolution`] if the listing fails.
pub async fn resolve<R: ContainerRuntime>(
    runtime: &R,
    name: &str,
) -> Result<Option<ContainerRecord>> {
    let mut matches = runtime
        .list_containers(name)
        .await
        .map_err(|source| ProvisionError::Resolution {
            name: name.to_owned(),
            source,
        })?;
    if matches.len() > 1 {
        return Err(ProvisionError::Ambiguous {
            name: name.to_owned(),
            count: matches.len(),
        });
    }
    let Some(listing) = matches.pop() else {
        tracing::info!(name, "no existing container");
        return Ok(None);
    };
    let record = to_record(name, listing);
    tracing::info!(name, id = %record.id, running = record.is_running, "found existing container");
    Ok(Some(record))
}

fn to_record(name: &str, listing: ContainerListing) -> ContainerRecord {
    ContainerRecord {
        is_running: is_running_state(&listing.state),
        id: ContainerId::new(listing.id),
        name: name.to_owned(),
    }
}

fn is_running_state(state: &str) -> bool {
    state.trim().eq_ignore_ascii_case("running")
}
