//! Error types for daemon calls and the provisioning pipeline.

use std::path::PathBuf;

use ctlhost_common::prompt::PromptError;
use ctlhost_common::types::ContainerId;
use thiserror::Error;

use crate::retry::RetryError;

/// A single call against the container runtime failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The Docker Engine API returned an error.
    #[error("docker {operation} failed: {source}")]
    Api {
        /// API operation that failed.
        operation: &'static str,
        /// Underlying client error.
        source: bollard::errors::Error,
    },

    /// The daemon reported a failure that carries no client error, such as
    /// an error embedded in a progress stream.
    #[error("docker {operation} failed: {message}")]
    Daemon {
        /// API operation that failed.
        operation: &'static str,
        /// Message reported by the daemon.
        message: String,
    },

    /// Local I/O backing a daemon call failed.
    #[error("I/O error during {operation}: {source}")]
    Io {
        /// Operation that was in progress.
        operation: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for single runtime calls.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Failure while staging a file into the container.
#[derive(Debug, Error)]
pub enum StageError {
    /// The destination is a device, fifo, socket, or other irregular file.
    #[error("destination {path} must be a directory or a regular file, got {kind}")]
    InvalidDestination {
        /// Destination path inside the container.
        path: String,
        /// Kind that was found there.
        kind: &'static str,
    },

    /// Streaming from standard input needs an existing directory.
    #[error("destination {path} must be an existing directory")]
    DestinationNotDirectory {
        /// Destination path inside the container.
        path: String,
    },

    /// The destination path asserts a directory that does not exist.
    #[error("destination directory {path} does not exist")]
    DestinationDirMissing {
        /// Destination path inside the container.
        path: String,
    },

    /// A directory source cannot replace an existing file.
    #[error("cannot copy directory {source_path} over existing file {path}")]
    DirectoryOverFile {
        /// Local source directory.
        source_path: PathBuf,
        /// Destination file inside the container.
        path: String,
    },

    /// The source path ends with a separator but is not a directory.
    #[error("source {path} is not a directory")]
    SourceNotDirectory {
        /// Local source path.
        path: PathBuf,
    },

    /// Reading the local source or building the archive failed.
    #[error("archive preparation failed for {path}: {source}")]
    Archive {
        /// Local path being archived.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The daemon rejected the archive upload.
    #[error("archive transfer failed: {0}")]
    Transfer(#[source] RuntimeError),
}

/// Failure while running the init command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The container could not be inspected before exec.
    #[error("container inspection failed: {0}")]
    Inspect(#[source] RuntimeError),

    /// The exec session could not be created.
    #[error("exec creation failed: {0}")]
    Create(#[source] RuntimeError),

    /// The daemon returned an empty exec id.
    #[error("exec ID empty")]
    EmptySessionId,

    /// The exec session could not be started or attached.
    #[error("exec start failed: {0}")]
    Start(#[source] RuntimeError),

    /// Reading the session output failed.
    #[error("reading exec output failed: {0}")]
    Output(#[source] RuntimeError),

    /// Writing the session output locally failed.
    #[error("writing exec output failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Fatal failure of a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The daemon never answered the connectivity probe.
    #[error("unable to contact the Docker daemon: {0}")]
    Connectivity(#[source] RetryError<RuntimeError>),

    /// More than one container carries the logical name.
    #[error("found {count} containers named {name}, but only one is expected to exist")]
    Ambiguous {
        /// Logical container name.
        name: String,
        /// Number of matches.
        count: usize,
    },

    /// Listing containers failed.
    #[error("unable to check whether container {name} already exists: {source}")]
    Resolution {
        /// Logical container name.
        name: String,
        /// Underlying runtime error.
        source: RuntimeError,
    },

    /// The image could not be listed or pulled.
    #[error("unable to check or pull image {image}: {source}")]
    ImagePull {
        /// Image reference.
        image: String,
        /// Underlying runtime error.
        source: RuntimeError,
    },

    /// Container creation failed.
    #[error("unable to create container {name}: {source}")]
    ContainerCreate {
        /// Logical container name.
        name: String,
        /// Underlying runtime error.
        source: RuntimeError,
    },

    /// Container start failed.
    #[error("unable to start container {id}: {source}")]
    ContainerStart {
        /// Container identifier.
        id: ContainerId,
        /// Underlying runtime error.
        source: RuntimeError,
    },

    /// Removing the existing container before recreation failed.
    #[error("unable to remove container {id} prior to recreating it: {source}")]
    ContainerRemove {
        /// Container identifier.
        id: ContainerId,
        /// Underlying runtime error.
        source: RuntimeError,
    },

    /// The user never gave a clear answer to a confirmation.
    #[error("{context}: {source}")]
    Confirmation {
        /// What the unanswered question was about.
        context: &'static str,
        /// Underlying prompt error.
        source: PromptError,
    },

    /// Staging a file into the container failed.
    #[error("unable to copy {local} to {container}:{dest}: {source}")]
    FileStage {
        /// Container name.
        container: String,
        /// Local source path.
        local: String,
        /// Destination inside the container.
        dest: String,
        /// Underlying staging error.
        source: StageError,
    },

    /// Running the init script failed.
    #[error("unable to run the initialization script in container {container}: {source}")]
    Exec {
        /// Container name.
        container: String,
        /// Underlying exec error.
        source: ExecError,
    },

    /// Writing user-facing progress output failed.
    #[error("unable to write progress output: {0}")]
    Output(#[source] std::io::Error),
}

/// Result alias for the provisioning pipeline.
pub type Result<T> = std::result::Result<T, ProvisionError>;
