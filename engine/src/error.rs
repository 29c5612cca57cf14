//! Error types for the migration engine.
//!
//! `EngineError` represents the conditions that stop an operation before (or
//! instead of) running its steps, plus persistence failures surfaced by the
//! ledger/manifest/checksum stores. Problems inside a step travel as
//! `AdapterOutcome` values and are never turned into an `EngineError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::OperationKind;

/// Errors that abort an operation or a persistence call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The target path failed validation
    #[error("Invalid target path '{path}': {reason}")]
    InvalidTarget { path: String, reason: String },

    /// The target directory does not exist (restore, verify)
    #[error("Target directory not found: {}", path.display())]
    TargetNotFound { path: PathBuf },

    /// Restore source carries no backup manifest
    #[error("No backup manifest in {}; the directory does not hold a complete backup", path.display())]
    ManifestMissing { path: PathBuf },

    /// Manifest exists but cannot be parsed
    #[error("Backup manifest {} is unreadable: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    /// Another process holds the target lock
    #[error("Target is locked by another migration ({}); remove the lock file if that process is gone", path.display())]
    TargetLocked { path: PathBuf },

    /// The target has an unfinished operation of the other kind
    #[error("{} has an unfinished {found} operation", path.display())]
    OperationInProgress { path: PathBuf, found: OperationKind },

    /// Failed to read a file
    #[error("Failed to read {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON (de)serialization of a persisted record failed
    #[error("Failed to encode {}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file could not be loaded
    #[error("Invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for conditions detected before any step could run.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::InvalidTarget { .. }
                | Self::TargetNotFound { .. }
                | Self::ManifestMissing { .. }
                | Self::ManifestInvalid { .. }
                | Self::TargetLocked { .. }
                | Self::OperationInProgress { .. }
        )
    }
}
