//! # HostMove Engine - Host Migration Library
//!
//! A headless, resumable backup/restore engine for moving a user's machine
//! to a replacement host. Designed as the foundation for front ends (the
//! `hostmove` CLI, automation).
//!
//! ## Overview
//!
//! An operation runs a fixed sequence of steps against a target directory:
//! - Backup: export winget / Chocolatey / Scoop package lists, copy user
//!   profiles, scan installed software, record checksums
//! - Restore: verify checksums, make sure package managers are present,
//!   import the package lists, copy the profiles back
//!
//! Progress is persisted after every step, so an interrupted run resumes at
//! the first incomplete step. A manifest marks a backup as complete.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{AutoPrompt, Collaborators, Configuration, RunOutcome, Workflow};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Configuration::default();
//! let collaborators = Collaborators::system(&config);
//! let workflow = Workflow::new(config, collaborators, Box::new(AutoPrompt::default()));
//!
//! match workflow.backup(Path::new("E:\\Migration"))? {
//!     RunOutcome::Finished(summary) => println!("{} files copied", summary.files_copied),
//!     other => println!("stopped early: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Operations, steps, package tools, copy results
//! - **error**: Error types and handling
//! - **workflow**: The step engine (backup, restore, verify, inventory)
//! - **ledger**: Persisted progress and resume
//! - **manifest**: Completion record of a backup
//! - **checksums**: Checksum computation and verification
//! - **path_validator**: Target path safety checks
//! - **exclusions**: Name-based exclusion rules
//! - **adapters**: Package manager, copy and inventory collaborators
//! - **fs_ops**: Low-level filesystem operations
//! - **progress**: Observer trait for front ends
//! - **prompt**: Operator decisions

pub mod adapters;
pub mod checksums;
pub mod config;
pub mod error;
pub mod exclusions;
pub mod fs_ops;
pub mod layout;
pub mod ledger;
pub mod lock;
pub mod manifest;
pub mod model;
pub mod path_validator;
pub mod progress;
pub mod prompt;
pub mod workflow;

// Re-export commonly used types
pub use adapters::{AdapterOutcome, Collaborators, InventoryScanner, PackageManager, UserDataCopier};
pub use checksums::{ChecksumAlgorithm, ChecksumStore, IntegrityErrorKind, VerificationReport, VerificationStatus};
pub use config::{Configuration, CopyEngine};
pub use error::EngineError;
pub use exclusions::ExclusionPolicy;
pub use layout::BackupLayout;
pub use ledger::{LedgerState, ProgressLedger};
pub use manifest::Manifest;
pub use model::{HostIdentity, OperationKind, OverwritePolicy, PackageTool, Step};
pub use path_validator::{PathValidator, Validation};
pub use progress::WorkflowObserver;
pub use prompt::{AutoPrompt, Prompt, ResumeChoice};
pub use workflow::{InventoryReport, RunOutcome, RunSummary, Workflow};
