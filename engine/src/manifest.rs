//! Backup manifest (`backup-manifest.json`).
//!
//! Written once a backup finishes. A parseable manifest is the only evidence
//! that a directory holds a complete backup; restore refuses to start
//! without one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::EngineError;
use crate::fs_ops;
use crate::layout::BackupLayout;
use crate::ledger::LedgerState;
use crate::model::{HostIdentity, Step};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub operation_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub host: HostIdentity,
    /// OS and architecture of the source machine
    pub os: String,
    pub completed_steps: Vec<Step>,
    #[serde(default)]
    pub steps_with_warnings: Vec<Step>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

impl Manifest {
    /// Manifest for a backup whose ledger just ran to the end.
    pub fn from_ledger(state: &LedgerState, profiles: Vec<String>) -> Self {
        Manifest {
            format_version: FORMAT_VERSION,
            operation_id: state.operation_id,
            completed_at: Utc::now(),
            started_at: state.start_time,
            host: state.host.clone(),
            os: os_descriptor(),
            completed_steps: state.completed_steps.clone(),
            steps_with_warnings: state.step_warnings.keys().copied().collect(),
            profiles,
        }
    }
}

/// `<os> <arch>` of the running build, e.g. `windows x86_64`.
pub fn os_descriptor() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

pub fn write(target: &Path, manifest: &Manifest) -> Result<(), EngineError> {
    fs_ops::write_json_atomic(&BackupLayout::new(target).manifest(), manifest)
}

/// Read the manifest. `Ok(None)` when absent; `ManifestInvalid` when present
/// but unusable.
pub fn read(target: &Path) -> Result<Option<Manifest>, EngineError> {
    let path = BackupLayout::new(target).manifest();
    let manifest = match fs_ops::read_json::<Manifest>(&path) {
        Ok(manifest) => manifest,
        Err(e) => {
            return Err(EngineError::ManifestInvalid {
                path,
                reason: e.to_string(),
            })
        }
    };

    match manifest {
        Some(m) if m.format_version > FORMAT_VERSION => Err(EngineError::ManifestInvalid {
            path,
            reason: format!("format version {} is newer than supported {}", m.format_version, FORMAT_VERSION),
        }),
        other => Ok(other),
    }
}

/// Manifest required: restore's gate.
pub fn require(target: &Path) -> Result<Manifest, EngineError> {
    read(target)?.ok_or_else(|| EngineError::ManifestMissing {
        path: target.to_path_buf(),
    })
}

pub fn remove(target: &Path) -> Result<(), EngineError> {
    fs_ops::remove_if_exists(&BackupLayout::new(target).manifest())
}
