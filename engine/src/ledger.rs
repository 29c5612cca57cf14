//! Persisted progress of an operation (`backup-progress.json`).
//!
//! The ledger records which steps of the running operation have completed
//! and which step is in flight. It is rewritten after every transition, so an
//! interruption loses at most the in-flight step. Its presence at a target
//! means the last operation there did not finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::fs_ops;
use crate::layout::BackupLayout;
use crate::model::{HostIdentity, OperationKind, Step};

/// Serialized ledger contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub operation: OperationKind,
    pub operation_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Completed steps in completion order, without duplicates
    pub completed_steps: Vec<Step>,
    pub current_step: Option<Step>,
    pub host: HostIdentity,
    /// Warnings raised by steps that were still marked complete
    #[serde(default)]
    pub step_warnings: BTreeMap<Step, Vec<String>>,
}

impl LedgerState {
    pub fn new(operation: OperationKind, host: HostIdentity) -> Self {
        let now = Utc::now();
        LedgerState {
            operation,
            operation_id: Uuid::new_v4(),
            start_time: now,
            last_update: now,
            completed_steps: Vec::new(),
            current_step: None,
            host,
            step_warnings: BTreeMap::new(),
        }
    }

    pub fn is_step_complete(&self, step: Step) -> bool {
        self.completed_steps.contains(&step)
    }

    /// First step of the operation that has not completed yet.
    pub fn next_step(&self) -> Option<Step> {
        self.operation
            .steps()
            .iter()
            .copied()
            .find(|s| !self.is_step_complete(*s))
    }
}

/// Write the ledger file.
pub fn save(target: &Path, state: &LedgerState) -> Result<(), EngineError> {
    fs_ops::write_json_atomic(&BackupLayout::new(target).ledger(), state)
}

/// Read the ledger file; None if absent or unparseable.
pub fn load(target: &Path) -> Option<LedgerState> {
    let path = BackupLayout::new(target).ledger();
    match fs_ops::read_json::<LedgerState>(&path) {
        Ok(state) => state,
        Err(e) => {
            warn!("Ignoring unreadable progress file {}: {}", path.display(), e);
            None
        }
    }
}

/// Delete the ledger file.
pub fn clear(target: &Path) -> Result<(), EngineError> {
    fs_ops::remove_if_exists(&BackupLayout::new(target).ledger())
}

/// The in-memory operation plus its on-disk mirror.
///
/// Every mutation saves immediately. A failed save is logged and otherwise
/// ignored: the operation carries on and only its ability to resume suffers.
#[derive(Debug)]
pub struct ProgressLedger {
    target: PathBuf,
    state: LedgerState,
}

impl ProgressLedger {
    /// Begin a new operation; the ledger file is written on the first
    /// transition.
    pub fn start_fresh<P: AsRef<Path>>(target: P, operation: OperationKind, host: HostIdentity) -> Self {
        ProgressLedger {
            target: target.as_ref().to_path_buf(),
            state: LedgerState::new(operation, host),
        }
    }

    /// Continue a previously persisted operation.
    pub fn resume<P: AsRef<Path>>(target: P, state: LedgerState) -> Self {
        ProgressLedger {
            target: target.as_ref().to_path_buf(),
            state,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn is_step_complete(&self, step: Step) -> bool {
        self.state.is_step_complete(step)
    }

    /// Record the step about to run, so a crash shows where it happened.
    pub fn set_current_step(&mut self, step: Step) {
        self.state.current_step = Some(step);
        self.persist();
    }

    /// Mark `step` done and clear the in-flight marker.
    pub fn mark_step_complete(&mut self, step: Step) {
        if !self.state.completed_steps.contains(&step) {
            self.state.completed_steps.push(step);
        }
        self.state.current_step = None;
        self.persist();
    }

    /// Attach a warning to `step`; saved with the next transition.
    pub fn record_warning<S: Into<String>>(&mut self, step: Step, message: S) {
        self.state.step_warnings.entry(step).or_default().push(message.into());
    }

    /// Save now. Returns false (after logging) when the write failed.
    pub fn persist(&mut self) -> bool {
        self.state.last_update = Utc::now();
        match save(&self.target, &self.state) {
            Ok(()) => {
                debug!(
                    "Progress saved: {} completed, current {:?}",
                    self.state.completed_steps.len(),
                    self.state.current_step
                );
                true
            }
            Err(e) => {
                warn!("Could not save progress to {}: {} (resume will not be possible)", self.target.display(), e);
                false
            }
        }
    }

    /// Remove the ledger file after the final step.
    pub fn clear(self) -> LedgerState {
        if let Err(e) = clear(&self.target) {
            warn!("Could not remove progress file in {}: {}", self.target.display(), e);
        }
        self.state
    }
}
