//! Unified error types for the ctlhost workspace.
//!
//! The runtime crate defines its own provisioning error enum; this one covers
//! configuration loading, validation, and file persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CtlhostError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required init property is absent.
    #[error("missing required configuration property {name}")]
    MissingProperty {
        /// Name of the missing property.
        name: &'static str,
    },

    /// An init property value failed validation.
    #[error("invalid value {value:?} for property {name}: {reason}")]
    InvalidProperty {
        /// Name of the offending property.
        name: String,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CtlhostError>;
