//! [`ContainerRuntime`] over the Docker Engine API.

use std::collections::HashMap;
use std::pin::pin;

use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerCreateBody, HostConfig, RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, DownloadFromContainerOptionsBuilder,
    InspectContainerOptions, ListContainersOptions, ListImagesOptions,
    RemoveContainerOptionsBuilder, StartContainerOptions, UploadToContainerOptionsBuilder,
};
use ctlhost_common::types::{ContainerId, ImageReference};
use futures_util::StreamExt;

use crate::api::{
    ArchiveStream, ContainerListing, ContainerRuntime, ContainerSpec, ExecSpec, ImageListing,
    OutputStream, PathKind, PathStat, PullProgress, PullStream, RestartPolicy,
};
use crate::error::{RuntimeError, RuntimeResult};

const TAR_BLOCK: usize = 512;

/// Connection to the local Docker daemon.
///
/// Owned by exactly one provisioning run; dropping it releases the
/// connection.
#[derive(Debug)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connects using the local defaults (`DOCKER_HOST` or the platform
    /// socket).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured. Reachability is
    /// only checked by [`ContainerRuntime::ping`].
    pub fn connect() -> RuntimeResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(api("connect"))?;
        tracing::debug!("docker client created");
        Ok(Self { docker })
    }
}

impl Drop for DockerClient {
    fn drop(&mut self) {
        tracing::debug!("docker client released");
    }
}

fn api(operation: &'static str) -> impl FnOnce(bollard::errors::Error) -> RuntimeError {
    move |source| RuntimeError::Api { operation, source }
}

const fn restart_policy_name(policy: RestartPolicy) -> RestartPolicyNameEnum {
    match policy {
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    }
}

/// Builds an anchored name filter. The daemon matches `name` filters as a
/// regular expression against `/<name>`, so a bare name would also match
/// every container whose name merely contains it.
pub(crate) fn exact_name_filter(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 4);
    pattern.push_str("^/");
    for c in name.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('$');
    pattern
}

/// Outcome of looking for the first real entry of a tar stream prefix.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HeaderScan {
    Found(PathStat),
    NeedMore,
    Malformed,
}

/// Derives a [`PathStat`] from the first entry of a tar stream, skipping
/// PAX and GNU long-name headers.
pub(crate) fn scan_first_entry(buffer: &[u8]) -> HeaderScan {
    let mut offset = 0;
    loop {
        let Some(block) = buffer.get(offset..offset + TAR_BLOCK) else {
            return HeaderScan::NeedMore;
        };
        if block.iter().all(|b| *b == 0) {
            return HeaderScan::Malformed;
        }
        let header = tar::Header::from_byte_slice(block);
        let entry_type = header.entry_type();
        if entry_type.is_pax_global_extensions()
            || entry_type.is_pax_local_extensions()
            || entry_type.is_gnu_longname()
            || entry_type.is_gnu_longlink()
        {
            let Some(size) = header.entry_size().ok().and_then(|s| usize::try_from(s).ok()) else {
                return HeaderScan::Malformed;
            };
            offset += TAR_BLOCK + size.div_ceil(TAR_BLOCK) * TAR_BLOCK;
            continue;
        }
        let kind = match entry_type {
            tar::EntryType::Directory => PathKind::Directory,
            tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
                PathKind::File
            }
            tar::EntryType::Symlink | tar::EntryType::Link => PathKind::Symlink,
            tar::EntryType::Char | tar::EntryType::Block => PathKind::Device,
            _ => PathKind::Irregular,
        };
        let mode = header.mode().unwrap_or(0);
        return HeaderScan::Found(PathStat { kind, mode });
    }
}

impl ContainerRuntime for DockerClient {
    async fn ping(&self) -> RuntimeResult<()> {
        let _ = self.docker.ping().await.map_err(api("ping"))?;
        Ok(())
    }

    async fn list_images(&self, reference: &ImageReference) -> RuntimeResult<Vec<ImageListing>> {
        let filters = HashMap::from([("reference".to_owned(), vec![reference.to_string()])]);
        let options = ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(api("list_images"))?;
        Ok(images
            .into_iter()
            .map(|image| ImageListing {
                id: image.id,
                repo_tags: image.repo_tags,
            })
            .collect())
    }

    fn pull_image(&self, reference: &ImageReference) -> PullStream<'_> {
        let (repository, tag) = reference.repository_and_tag();
        let mut builder = CreateImageOptionsBuilder::new().from_image(repository);
        if let Some(tag) = tag {
            builder = builder.tag(tag);
        }
        let options = builder.build();
        self.docker
            .create_image(Some(options), None, None)
            .map(|item| {
                item.map(|info| PullProgress {
                    id: info.id,
                    status: info.status,
                    progress: info.progress,
                })
                .map_err(api("pull_image"))
            })
            .boxed()
    }

    async fn list_containers(&self, name: &str) -> RuntimeResult<Vec<ContainerListing>> {
        let filters = HashMap::from([("name".to_owned(), vec![exact_name_filter(name)])]);
        let options = ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(api("list_containers"))?;
        Ok(containers
            .into_iter()
            .map(|summary| ContainerListing {
                id: summary.id.unwrap_or_default(),
                state: summary.state.map(|s| s.to_string()).unwrap_or_default(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId> {
        let options = CreateContainerOptionsBuilder::new().name(&spec.name).build();
        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            tty: Some(spec.tty),
            host_config: Some(HostConfig {
                restart_policy: Some(DockerRestartPolicy {
                    name: Some(restart_policy_name(spec.restart_policy)),
                    maximum_retry_count: None,
                }),
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };
        let response = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(api("create_container"))?;
        for warning in &response.warnings {
            tracing::warn!(name = %spec.name, %warning, "daemon warning on container creation");
        }
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(api("start_container"))
    }

    async fn remove_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        self.docker
            .remove_container(id.as_str(), Some(options))
            .await
            .map_err(api("remove_container"))
    }

    async fn stat_path(&self, id: &ContainerId, path: &str) -> RuntimeResult<Option<PathStat>> {
        let options = DownloadFromContainerOptionsBuilder::new().path(path).build();
        let mut stream = pin!(self.docker.download_from_container(id.as_str(), Some(options)));
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => buffer.extend_from_slice(&bytes),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => return Ok(None),
                Err(source) => return Err(api("stat_path")(source)),
            }
            match scan_first_entry(&buffer) {
                HeaderScan::Found(stat) => return Ok(Some(stat)),
                HeaderScan::NeedMore => {}
                HeaderScan::Malformed => break,
            }
        }
        match scan_first_entry(&buffer) {
            HeaderScan::Found(stat) => Ok(Some(stat)),
            HeaderScan::NeedMore | HeaderScan::Malformed => Err(RuntimeError::Daemon {
                operation: "stat_path",
                message: format!("no archive entry returned for {path}"),
            }),
        }
    }

    async fn upload_archive(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: ArchiveStream,
    ) -> RuntimeResult<()> {
        let options = UploadToContainerOptionsBuilder::new()
            .path(dest_dir)
            .no_overwrite_dir_non_dir("true")
            .build();
        self.docker
            .upload_to_container(id.as_str(), Some(options), bollard::body_try_stream(archive))
            .await
            .map_err(api("upload_archive"))
    }

    async fn inspect_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        let _ = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(api("inspect_container"))?;
        Ok(())
    }

    async fn create_exec(&self, id: &ContainerId, spec: &ExecSpec) -> RuntimeResult<String> {
        let options = CreateExecOptions {
            cmd: Some(spec.command.clone()),
            user: Some(spec.user.clone()),
            working_dir: Some(spec.working_dir.clone()),
            tty: Some(spec.tty),
            privileged: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let created = self
            .docker
            .create_exec(id.as_str(), options)
            .await
            .map_err(api("create_exec"))?;
        Ok(created.id)
    }

    async fn start_exec(&self, exec_id: &str, tty: bool) -> RuntimeResult<OutputStream> {
        let options = StartExecOptions {
            detach: false,
            tty,
            ..Default::default()
        };
        match self
            .docker
            .start_exec(exec_id, Some(options))
            .await
            .map_err(api("start_exec"))?
        {
            StartExecResults::Attached { output, .. } => Ok(output
                .map(|item| item.map(|log| log.into_bytes()).map_err(api("exec_output")))
                .boxed()),
            StartExecResults::Detached => Err(RuntimeError::Daemon {
                operation: "start_exec",
                message: "exec session started detached".into(),
            }),
        }
    }
}
