//! Progress reporting trait.
//!
//! This module defines the WorkflowObserver trait, which keeps the workflow
//! engine independent of how progress is shown. The CLI renders the calls as
//! console lines; tests record them.
//!
//! All methods are called synchronously on the engine's thread.

use crate::ledger::LedgerState;
use crate::model::Step;
use crate::workflow::RunOutcome;

pub trait WorkflowObserver {
    /// Called once the ledger for the run is settled (fresh or resumed).
    fn on_operation_started(&self, state: &LedgerState, resumed: bool);

    /// Called for a step that an earlier run already completed.
    fn on_step_skipped(&self, step: Step);

    /// Called right after the step is recorded as in flight.
    fn on_step_started(&self, step: Step);

    /// Called after the step is marked complete. `warnings` lists what went
    /// wrong inside it; empty for a clean step.
    fn on_step_completed(&self, step: Step, warnings: &[String]);

    /// Called with the terminal outcome of the run.
    fn on_operation_finished(&self, outcome: &RunOutcome);
}
