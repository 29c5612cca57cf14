//! Core data model for migration operations.
//!
//! This module defines the vocabulary shared by the engine and its front ends:
//! - OperationKind and Step: what runs, and in which fixed order
//! - PackageTool: the package managers whose exports are captured
//! - HostIdentity, InventoryEntry: provenance and reference data
//! - CopyStats, OverwritePolicy: user-data copy results and behavior

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The two operations the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Backup,
    Restore,
}

impl OperationKind {
    /// The fixed step sequence for this operation.
    pub fn steps(self) -> &'static [Step] {
        match self {
            OperationKind::Backup => &BACKUP_STEPS,
            OperationKind::Restore => &RESTORE_STEPS,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Backup => write!(f, "backup"),
            OperationKind::Restore => write!(f, "restore"),
        }
    }
}

const BACKUP_STEPS: [Step; 6] = [
    Step::ExportWinget,
    Step::ExportChocolatey,
    Step::ExportScoop,
    Step::BackupUserData,
    Step::GenerateInventory,
    Step::GenerateChecksums,
];

const RESTORE_STEPS: [Step; 6] = [
    Step::Verification,
    Step::PackageManagers,
    Step::RestoreWinget,
    Step::RestoreChocolatey,
    Step::RestoreScoop,
    Step::RestoreUserData,
];

/// A named phase of an operation.
///
/// The serialized names are what the progress ledger and the manifest store,
/// so renaming a variant's `serde(rename)` breaks resume of older ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "Winget")]
    ExportWinget,
    #[serde(rename = "Chocolatey")]
    ExportChocolatey,
    #[serde(rename = "Scoop")]
    ExportScoop,
    #[serde(rename = "UserData")]
    BackupUserData,
    #[serde(rename = "Inventory")]
    GenerateInventory,
    #[serde(rename = "Checksums")]
    GenerateChecksums,
    Verification,
    PackageManagers,
    RestoreWinget,
    RestoreChocolatey,
    RestoreScoop,
    RestoreUserData,
}

impl Step {
    /// Operation this step belongs to.
    pub fn operation(self) -> OperationKind {
        match self {
            Step::ExportWinget
            | Step::ExportChocolatey
            | Step::ExportScoop
            | Step::BackupUserData
            | Step::GenerateInventory
            | Step::GenerateChecksums => OperationKind::Backup,
            _ => OperationKind::Restore,
        }
    }

    /// Name used in the ledger and manifest.
    pub fn ledger_name(self) -> &'static str {
        match self {
            Step::ExportWinget => "Winget",
            Step::ExportChocolatey => "Chocolatey",
            Step::ExportScoop => "Scoop",
            Step::BackupUserData => "UserData",
            Step::GenerateInventory => "Inventory",
            Step::GenerateChecksums => "Checksums",
            Step::Verification => "Verification",
            Step::PackageManagers => "PackageManagers",
            Step::RestoreWinget => "RestoreWinget",
            Step::RestoreChocolatey => "RestoreChocolatey",
            Step::RestoreScoop => "RestoreScoop",
            Step::RestoreUserData => "RestoreUserData",
        }
    }

    /// Human-readable description for progress output.
    pub fn description(self) -> &'static str {
        match self {
            Step::ExportWinget => "Export winget packages",
            Step::ExportChocolatey => "Export Chocolatey packages",
            Step::ExportScoop => "Export Scoop packages",
            Step::BackupUserData => "Copy user profiles",
            Step::GenerateInventory => "Scan installed software",
            Step::GenerateChecksums => "Record checksums",
            Step::Verification => "Verify backup integrity",
            Step::PackageManagers => "Check package managers",
            Step::RestoreWinget => "Import winget packages",
            Step::RestoreChocolatey => "Import Chocolatey packages",
            Step::RestoreScoop => "Import Scoop packages",
            Step::RestoreUserData => "Restore user profiles",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ledger_name())
    }
}

/// Package managers whose installed-package lists are migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageTool {
    Winget,
    Chocolatey,
    Scoop,
}

impl PackageTool {
    pub const ALL: [PackageTool; 3] = [PackageTool::Winget, PackageTool::Chocolatey, PackageTool::Scoop];

    /// File name of the export inside `PackageManagers/`.
    pub fn export_file_name(self) -> &'static str {
        match self {
            PackageTool::Winget => "winget-packages.json",
            PackageTool::Chocolatey => "chocolatey-packages.config",
            PackageTool::Scoop => "scoop-packages.json",
        }
    }
}

impl fmt::Display for PackageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageTool::Winget => write!(f, "winget"),
            PackageTool::Chocolatey => write!(f, "chocolatey"),
            PackageTool::Scoop => write!(f, "scoop"),
        }
    }
}

/// Machine and user an operation ran as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub machine: String,
    pub user: String,
}

impl HostIdentity {
    /// Identity of the running process.
    pub fn current() -> Self {
        let machine = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        let user = std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "unknown-user".to_string());
        HostIdentity { machine, user }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.machine)
    }
}

/// One installed application, as reported by the inventory scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub name: String,
    pub version: Option<String>,
    pub publisher: Option<String>,
    pub install_date: Option<String>,
}

/// Contents of `inventory.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDocument {
    pub generated_at: DateTime<Utc>,
    pub host: HostIdentity,
    /// Sorted, without duplicates
    pub entries: Vec<InventoryEntry>,
}

impl InventoryDocument {
    pub fn new(host: HostIdentity, mut entries: Vec<InventoryEntry>) -> Self {
        entries.sort();
        entries.dedup();
        InventoryDocument {
            generated_at: Utc::now(),
            host,
            entries,
        }
    }
}

/// Policy for handling existing files at the destination of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Don't overwrite; skip existing files
    Skip,
    /// Always overwrite existing files
    Overwrite,
    /// Overwrite if source is newer OR size differs
    #[default]
    SmartUpdate,
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::Skip => write!(f, "skip"),
            OverwritePolicy::Overwrite => write!(f, "overwrite"),
            OverwritePolicy::SmartUpdate => write!(f, "smart-update"),
        }
    }
}

/// A file the copier could not transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result counters of one user-data copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    /// Files left alone because the destination was already up to date
    pub files_skipped: u64,
    pub failures: Vec<CopyFailure>,
}

impl CopyStats {
    /// Fold another copy's counters into this one.
    pub fn absorb(&mut self, other: CopyStats) {
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.files_skipped += other.files_skipped;
        self.failures.extend(other.failures);
    }
}
