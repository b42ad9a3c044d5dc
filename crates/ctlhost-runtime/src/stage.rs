//! Copying local files into the container as a streamed tar archive.
//!
//! Follows the `docker cp` rules: the destination is stat-ed inside the
//! container, [`plan_copy`] decides which directory the archive is extracted
//! into and what its top-level entry is called, and the archive is built on
//! a blocking worker while it is uploaded.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use ctlhost_common::types::ContainerId;
use futures_util::StreamExt;
use tokio_util::io::{ReaderStream, SyncIoBridge};

use crate::api::{ArchiveStream, ContainerRuntime, PathKind, PathStat};
use crate::error::StageError;

/// Pipe capacity between the archive builder and the upload.
const ARCHIVE_PIPE_CAPACITY: usize = 64 * 1024;

/// Where staged content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSource {
    /// Standard input, carrying a ready-made tar stream.
    Stdin,
    /// A local file or directory, absolute, with any trailing `/` or `/.`
    /// kept.
    Path(PathBuf),
}

/// Resolves `raw` to a [`LocalSource`]. `-` means standard input.
///
/// # Errors
///
/// Returns [`StageError::Archive`] if the working directory is unavailable.
pub fn resolve_local_path(raw: &str) -> Result<LocalSource, StageError> {
    if raw == "-" {
        return Ok(LocalSource::Stdin);
    }
    let absolute = std::path::absolute(raw).map_err(|source| StageError::Archive {
        path: PathBuf::from(raw),
        source,
    })?;
    let mut resolved = absolute.to_string_lossy().into_owned();
    if raw.ends_with("/.") && !resolved.ends_with("/.") {
        resolved = format!("{}/.", resolved.trim_end_matches('/'));
    } else if raw.ends_with('/') && !resolved.ends_with('/') {
        resolved.push('/');
    }
    Ok(LocalSource::Path(PathBuf::from(resolved)))
}

/// A local file or directory about to be archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Path without any trailing `/` or `/.`.
    pub path: PathBuf,
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// The path ended with `/` or `/.`, asserting a directory.
    pub asserts_dir: bool,
    /// The path ended with `/.`: copy the directory contents, not the
    /// directory itself.
    pub contents_only: bool,
}

impl SourceInfo {
    /// Inspects a resolved local path. A final symlink is followed: the
    /// target is archived under the link's name.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Archive`] if the path cannot be read.
    pub fn inspect(resolved: &Path) -> Result<Self, StageError> {
        let raw = resolved.to_string_lossy();
        let contents_only = raw.ends_with("/.");
        let asserts_dir = contents_only || raw.ends_with('/');
        let trimmed = raw
            .strip_suffix("/.")
            .unwrap_or(&raw)
            .trim_end_matches('/');
        let path = if asserts_dir {
            PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed })
        } else {
            resolved.to_path_buf()
        };
        let metadata = std::fs::metadata(&path).map_err(|source| StageError::Archive {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            is_dir: metadata.is_dir(),
            asserts_dir,
            contents_only,
        })
    }

    fn base_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| ".".to_owned(), |n| n.to_string_lossy().into_owned())
    }
}

/// A destination path inside the container and what is there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestInfo {
    /// Path as given.
    pub path: String,
    /// Stat result, `None` when nothing exists there.
    pub stat: Option<PathStat>,
}

/// Top-level name of the archived content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveRoot {
    /// The source is archived under this name.
    Named(String),
    /// The children of the source directory are archived at the root.
    Contents,
}

/// Where to extract and how to name the archived content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    /// Container directory the archive is extracted into.
    pub extract_dir: String,
    /// Top-level entry naming.
    pub root: ArchiveRoot,
}

/// Decides the extraction directory and top-level entry for copying
/// `source` to `dest`.
///
/// # Errors
///
/// Returns a [`StageError`] when the combination is not allowed: a device or
/// irregular destination, a directory source over an existing file, a
/// missing directory destination for a file, or a directory-asserting source
/// that is not a directory.
pub fn plan_copy(source: &SourceInfo, dest: &DestInfo) -> Result<CopyPlan, StageError> {
    if source.asserts_dir && !source.is_dir {
        return Err(StageError::SourceNotDirectory {
            path: source.path.clone(),
        });
    }
    match dest.stat.as_ref().map(|stat| stat.kind) {
        Some(kind @ (PathKind::Device | PathKind::Irregular)) => Err(StageError::InvalidDestination {
            path: dest.path.clone(),
            kind: kind.describe(),
        }),
        Some(PathKind::Directory) => Ok(CopyPlan {
            extract_dir: dest.path.clone(),
            root: if source.contents_only {
                ArchiveRoot::Contents
            } else {
                ArchiveRoot::Named(source.base_name())
            },
        }),
        Some(PathKind::File | PathKind::Symlink) if source.is_dir => {
            Err(StageError::DirectoryOverFile {
                source_path: source.path.clone(),
                path: dest.path.clone(),
            })
        }
        Some(PathKind::File | PathKind::Symlink) => Ok(renamed_into_parent(&dest.path)),
        None if dest.path.ends_with('/') && !source.is_dir => {
            Err(StageError::DestinationDirMissing {
                path: dest.path.clone(),
            })
        }
        None => Ok(renamed_into_parent(&dest.path)),
    }
}

fn renamed_into_parent(dest: &str) -> CopyPlan {
    let trimmed = dest.trim_end_matches('/');
    let (parent, base) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (".", trimmed),
    };
    CopyPlan {
        extract_dir: parent.to_owned(),
        root: ArchiveRoot::Named(base.to_owned()),
    }
}

/// Copies `local` to `dest` inside container `id`.
///
/// # Errors
///
/// Returns a [`StageError`] if the copy is not allowed, the archive cannot
/// be built, or the daemon rejects the upload.
pub async fn stage<R: ContainerRuntime>(
    runtime: &R,
    id: &ContainerId,
    local: &str,
    dest: &str,
) -> Result<(), StageError> {
    let source = resolve_local_path(local)?;
    let dest_info = DestInfo {
        path: dest.to_owned(),
        stat: stat_destination(runtime, id, dest).await,
    };

    match source {
        LocalSource::Stdin => {
            if !matches!(dest_info.stat, Some(PathStat { kind: PathKind::Directory, .. })) {
                return Err(StageError::DestinationNotDirectory {
                    path: dest.to_owned(),
                });
            }
            let archive = ReaderStream::new(tokio::io::stdin()).boxed();
            runtime
                .upload_archive(id, dest, archive)
                .await
                .map_err(StageError::Transfer)
        }
        LocalSource::Path(resolved) => {
            let source = SourceInfo::inspect(&resolved)?;
            let plan = plan_copy(&source, &dest_info)?;
            tracing::debug!(
                %id,
                source = %source.path.display(),
                extract_dir = %plan.extract_dir,
                root = ?plan.root,
                "copy planned"
            );
            upload_path(runtime, id, source, plan).await
        }
    }
}

/// Stats the destination. A failed stat reads as "does not exist" and the
/// extraction decides.
async fn stat_destination<R: ContainerRuntime>(
    runtime: &R,
    id: &ContainerId,
    dest: &str,
) -> Option<PathStat> {
    match runtime.stat_path(id, dest).await {
        Ok(stat) => stat,
        Err(error) => {
            tracing::warn!(%id, path = dest, %error, "destination stat failed, assuming absent");
            None
        }
    }
}

async fn upload_path<R: ContainerRuntime>(
    runtime: &R,
    id: &ContainerId,
    source: SourceInfo,
    plan: CopyPlan,
) -> Result<(), StageError> {
    let source_path = source.path.clone();
    let (archive, worker) = spawn_archive(source, plan.root);
    let uploaded = runtime.upload_archive(id, &plan.extract_dir, archive).await;
    let built = worker.await.unwrap_or_else(|join| Err(std::io::Error::other(join)));
    // A rejected upload breaks the builder's pipe; report the rejection.
    uploaded.map_err(StageError::Transfer)?;
    built.map_err(|source| StageError::Archive {
        path: source_path,
        source,
    })
}

/// Starts building the archive on a blocking worker and returns the byte
/// stream it produces together with the worker handle.
fn spawn_archive(
    source: SourceInfo,
    root: ArchiveRoot,
) -> (ArchiveStream, tokio::task::JoinHandle<std::io::Result<()>>) {
    let (reader, writer) = tokio::io::duplex(ARCHIVE_PIPE_CAPACITY);
    let bridge = SyncIoBridge::new(writer);
    let worker = tokio::task::spawn_blocking(move || write_archive(bridge, &source, &root));
    (ReaderStream::new(reader).boxed(), worker)
}

fn write_archive<W: std::io::Write>(
    sink: W,
    source: &SourceInfo,
    root: &ArchiveRoot,
) -> std::io::Result<()> {
    let mut builder = tar::Builder::new(sink);
    builder.follow_symlinks(false);
    match root {
        ArchiveRoot::Contents => builder.append_dir_all(".", &source.path)?,
        ArchiveRoot::Named(name) if source.is_dir => builder.append_dir_all(name, &source.path)?,
        ArchiveRoot::Named(name) => {
            let mut file = std::fs::File::open(&source.path)?;
            builder.append_file(name, &mut file)?;
        }
    }
    let mut sink = builder.into_inner()?;
    sink.flush()
}
