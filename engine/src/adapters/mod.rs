//! Collaborators invoked by workflow steps.
//!
//! Each collaborator does the actual I/O of one phase (export or import a
//! package list, copy profiles, scan installed software) and reports back an
//! `AdapterOutcome`. Nothing here returns `Err` to the engine: a collaborator
//! that cannot do its job says so in the outcome, and the engine logs it and
//! moves on to the next step.

pub mod copy;
pub mod inventory;
pub mod packages;

use std::path::{Path, PathBuf};

use crate::config::{Configuration, CopyEngine};
use crate::exclusions::ExclusionPolicy;
use crate::model::{CopyStats, InventoryEntry, PackageTool};

pub use copy::{NativeCopier, RobocopyCopier};
pub use inventory::RegistryInventory;
pub use packages::CommandPackageManager;

/// Tagged result of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome<T> {
    /// Completed cleanly
    Success(T),
    /// Completed, but something was skipped or partially failed
    Warning(T, String),
    /// Nothing useful was produced
    Failure(String),
}

impl<T> AdapterOutcome<T> {
    /// Payload, if any, and the message to log.
    pub fn split(self) -> (Option<T>, Option<String>) {
        match self {
            AdapterOutcome::Success(value) => (Some(value), None),
            AdapterOutcome::Warning(value, message) => (Some(value), Some(message)),
            AdapterOutcome::Failure(reason) => (None, Some(reason)),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AdapterOutcome::Failure(_))
    }
}

/// A package manager whose installed packages can be exported and replayed.
pub trait PackageManager {
    fn tool(&self) -> PackageTool;

    fn is_installed(&self) -> bool;

    /// Install the package manager itself.
    fn install(&self) -> AdapterOutcome<()>;

    /// Write the export file into `dir`; returns its path.
    fn export(&self, dir: &Path) -> AdapterOutcome<PathBuf>;

    /// Install everything listed in `file`. Individual packages may fail.
    fn import(&self, file: &Path) -> AdapterOutcome<()>;
}

/// Bulk copy of one profile tree.
pub trait UserDataCopier {
    /// Copy `source` into `destination`, skipping what `exclusions` names and
    /// carrying on past per-file failures.
    fn copy(&self, source: &Path, destination: &Path, exclusions: &ExclusionPolicy) -> AdapterOutcome<CopyStats>;
}

/// Lists installed software for reference.
pub trait InventoryScanner {
    fn scan(&self) -> AdapterOutcome<Vec<InventoryEntry>>;
}

/// The set of collaborators a workflow runs with.
pub struct Collaborators {
    pub package_managers: Vec<Box<dyn PackageManager>>,
    pub copier: Box<dyn UserDataCopier>,
    pub inventory: Box<dyn InventoryScanner>,
}

impl Collaborators {
    /// Real implementations, chosen by configuration.
    pub fn system(config: &Configuration) -> Self {
        let copier: Box<dyn UserDataCopier> = match config.copy_engine {
            CopyEngine::Native => Box::new(NativeCopier::new(config.overwrite_policy)),
            CopyEngine::Robocopy => Box::new(RobocopyCopier::new(config.robocopy_threads)),
        };

        Collaborators {
            package_managers: PackageTool::ALL
                .iter()
                .map(|tool| Box::new(CommandPackageManager::new(*tool)) as Box<dyn PackageManager>)
                .collect(),
            copier,
            inventory: Box::new(RegistryInventory::default()),
        }
    }

    pub fn package_manager(&self, tool: PackageTool) -> Option<&dyn PackageManager> {
        self.package_managers
            .iter()
            .find(|pm| pm.tool() == tool)
            .map(|pm| pm.as_ref())
    }
}
