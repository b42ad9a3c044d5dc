//! Container runtime abstraction.
//!
//! [`ContainerRuntime`] is the narrow slice of the Docker Engine API the
//! provisioning pipeline uses. [`DockerClient`](crate::docker::DockerClient)
//! implements it over a real daemon; tests substitute a recording fake.

use bytes::Bytes;
use ctlhost_common::types::{ContainerId, ImageReference};
use futures_util::stream::BoxStream;

use crate::error::RuntimeResult;

/// Tar archive streamed to the daemon.
pub type ArchiveStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Raw output of an attached exec session.
pub type OutputStream = BoxStream<'static, RuntimeResult<Bytes>>;

/// Progress of an image pull.
pub type PullStream<'a> = BoxStream<'a, RuntimeResult<PullProgress>>;

/// A locally available image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageListing {
    /// Image identifier.
    pub id: String,
    /// Tags pointing at the image.
    pub repo_tags: Vec<String>,
}

/// One progress message of an image pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullProgress {
    /// Layer identifier, if the message concerns a layer.
    pub id: Option<String>,
    /// Status text, e.g. `Downloading`.
    pub status: Option<String>,
    /// Rendered progress bar.
    pub progress: Option<String>,
}

/// A container as reported by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerListing {
    /// Container identifier.
    pub id: String,
    /// Reported state, e.g. `running` or `exited`.
    pub state: String,
}

/// Configuration for creating the managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image to create the container from.
    pub image: ImageReference,
    /// Whether a TTY is allocated.
    pub tty: bool,
    /// Restart policy applied by the daemon.
    pub restart_policy: RestartPolicy,
}

/// Daemon-side restart behaviour of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart unless explicitly stopped.
    UnlessStopped,
}

/// Kind of filesystem object found at a container path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A directory.
    Directory,
    /// A regular file.
    File,
    /// A symbolic link.
    Symlink,
    /// A character or block device.
    Device,
    /// A fifo, socket, or anything else.
    Irregular,
}

impl PathKind {
    /// Human-readable name used in error messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Directory => "a directory",
            Self::File => "a regular file",
            Self::Symlink => "a symbolic link",
            Self::Device => "a device",
            Self::Irregular => "an irregular file",
        }
    }
}

/// Result of stat-ing a path inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStat {
    /// Object kind.
    pub kind: PathKind,
    /// Permission bits.
    pub mode: u32,
}

/// Parameters of an exec session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    /// Command and arguments.
    pub command: Vec<String>,
    /// User the command runs as.
    pub user: String,
    /// Working directory.
    pub working_dir: String,
    /// Whether a pseudo-terminal is attached.
    pub tty: bool,
}

/// Docker Engine operations used by the provisioning pipeline.
///
/// Every method maps to one daemon call; none of them retries.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Checks that the daemon answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable.
    async fn ping(&self) -> RuntimeResult<()>;

    /// Lists local images matching `reference` exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon call fails.
    async fn list_images(&self, reference: &ImageReference) -> RuntimeResult<Vec<ImageListing>>;

    /// Pulls an image, yielding progress messages until the pull completes.
    fn pull_image(&self, reference: &ImageReference) -> PullStream<'_>;

    /// Lists containers, including stopped ones, whose name is exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon call fails.
    async fn list_containers(&self, name: &str) -> RuntimeResult<Vec<ContainerListing>>;

    /// Creates a container and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the creation.
    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId>;

    /// Starts a created or stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    async fn start_container(&self, id: &ContainerId) -> RuntimeResult<()>;

    /// Force-removes a container, stopping it first if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    async fn remove_container(&self, id: &ContainerId) -> RuntimeResult<()>;

    /// Stats a path inside a container. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon call fails for another reason.
    async fn stat_path(&self, id: &ContainerId, path: &str) -> RuntimeResult<Option<PathStat>>;

    /// Extracts a tar stream into directory `dest_dir` of the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or extraction fails.
    async fn upload_archive(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: ArchiveStream,
    ) -> RuntimeResult<()>;

    /// Inspects a container, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown to the daemon.
    async fn inspect_container(&self, id: &ContainerId) -> RuntimeResult<()>;

    /// Creates an exec session and returns its identifier as reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the session.
    async fn create_exec(&self, id: &ContainerId, spec: &ExecSpec) -> RuntimeResult<String>;

    /// Starts an exec session attached, returning its combined output.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started or attached.
    async fn start_exec(&self, exec_id: &str, tty: bool) -> RuntimeResult<OutputStream>;
}

impl<T: ContainerRuntime> ContainerRuntime for &T {
    async fn ping(&self) -> RuntimeResult<()> {
        (**self).ping().await
    }

    async fn list_images(&self, reference: &ImageReference) -> RuntimeResult<Vec<ImageListing>> {
        (**self).list_images(reference).await
    }

    fn pull_image(&self, reference: &ImageReference) -> PullStream<'_> {
        (**self).pull_image(reference)
    }

    async fn list_containers(&self, name: &str) -> RuntimeResult<Vec<ContainerListing>> {
        (**self).list_containers(name).await
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId> {
        (**self).create_container(spec).await
    }

    async fn start_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        (**self).start_container(id).await
    }

    async fn remove_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        (**self).remove_container(id).await
    }

    async fn stat_path(&self, id: &ContainerId, path: &str) -> RuntimeResult<Option<PathStat>> {
        (**self).stat_path(id, path).await
    }

    async fn upload_archive(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: ArchiveStream,
    ) -> RuntimeResult<()> {
        (**self).upload_archive(id, dest_dir, archive).await
    }

    async fn inspect_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        (**self).inspect_container(id).await
    }

    async fn create_exec(&self, id: &ContainerId, spec: &ExecSpec) -> RuntimeResult<String> {
        (**self).create_exec(id, spec).await
    }

    async fn start_exec(&self, exec_id: &str, tty: bool) -> RuntimeResult<OutputStream> {
        (**self).start_exec(exec_id, tty).await
    }
}
