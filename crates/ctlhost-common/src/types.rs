//! Domain primitive types used across the ctlhost workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the Docker daemon assigned to a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an image, e.g. `registry:5000/org/name:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference(String);

impl ImageReference {
    /// Creates an image reference from its textual form.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the full reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the reference into repository and tag, defaulting the tag to
    /// `latest`. A colon inside the registry host (`host:5000/name`) is not a
    /// tag separator. A digest reference (`name@sha256:...`) is returned
    /// whole with no tag.
    #[must_use]
    pub fn repository_and_tag(&self) -> (&str, Option<&str>) {
        if self.0.contains('@') {
            return (self.0.as_str(), None);
        }
        match self.0.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => (repository, Some(tag)),
            _ => (self.0.as_str(), Some("latest")),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of the managed container as reported by the daemon.
///
/// Becomes stale as soon as the container is started or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Daemon-assigned identifier.
    pub id: ContainerId,
    /// Container name without the leading slash.
    pub name: String,
    /// Whether the daemon reported the container as running.
    pub is_running: bool,
}
