//! Operator decisions the engine needs, behind an injectable trait.
//!
//! The workflow never reads the console. Front ends pass a `Prompt`; tests
//! and unattended runs use `AutoPrompt`, which answers from fixed settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::checksums::VerificationReport;
use crate::ledger::LedgerState;

/// What to do with an unfinished operation found at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeChoice {
    /// Keep the completed steps and continue
    #[default]
    Resume,
    /// Discard the ledger and run every step
    StartFresh,
    /// Leave the target untouched
    Cancel,
}

impl fmt::Display for ResumeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeChoice::Resume => write!(f, "resume"),
            ResumeChoice::StartFresh => write!(f, "start fresh"),
            ResumeChoice::Cancel => write!(f, "cancel"),
        }
    }
}

pub trait Prompt {
    /// An unfinished operation of the requested kind exists.
    fn resume_choice(&self, existing: &LedgerState) -> ResumeChoice;

    /// Yes/no question (overwrite an existing backup, install a tool).
    fn confirm(&self, question: &str) -> bool;

    /// Verification found errors; continue the restore anyway?
    fn confirm_integrity_override(&self, report: &VerificationReport) -> bool;
}

/// Non-interactive answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoPrompt {
    pub resume: ResumeChoice,
    /// Answer yes to every `confirm`
    pub assume_yes: bool,
}

impl AutoPrompt {
    pub fn new(resume: ResumeChoice, assume_yes: bool) -> Self {
        AutoPrompt { resume, assume_yes }
    }
}

impl Prompt for AutoPrompt {
    fn resume_choice(&self, existing: &LedgerState) -> ResumeChoice {
        info!(
            "Unfinished {} from {} found; choosing to {}",
            existing.operation, existing.start_time, self.resume
        );
        self.resume
    }

    fn confirm(&self, question: &str) -> bool {
        info!("{} -> {}", question, if self.assume_yes { "yes" } else { "no" });
        self.assume_yes
    }

    /// Integrity failures are only ever overridden explicitly, through the
    /// skip-verification setting.
    fn confirm_integrity_override(&self, _report: &VerificationReport) -> bool {
        false
    }
}
