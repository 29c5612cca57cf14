//! Console rendering of workflow progress.

use engine::{LedgerState, RunOutcome, RunSummary, Step, WorkflowObserver};
use std::time::Duration;

/// CLI implementation of WorkflowObserver, one line per step on stderr.
pub struct CliProgress {
    verbose: bool,
}

impl CliProgress {
    pub fn new(verbose: bool) -> Self {
        CliProgress { verbose }
    }

    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    pub fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_summary(&self, summary: &RunSummary) {
        eprintln!();
        eprintln!("{} complete!", capitalize(&summary.operation.to_string()));
        eprintln!(
            "Summary: {} steps run, {} already done, {} warnings",
            summary.steps_executed,
            summary.steps_skipped,
            summary.warnings.len()
        );
        eprintln!(
            "Files copied: {} ({})",
            summary.files_copied,
            Self::format_bytes(summary.bytes_copied)
        );
        eprintln!("Elapsed: {}", Self::format_duration(summary.duration));
        if self.verbose {
            eprintln!("Operation id: {}", summary.operation_id);
        }

        if !summary.warnings.is_empty() {
            eprintln!();
            eprintln!("Warnings:");
            for warning in &summary.warnings {
                eprintln!("  {}", warning);
            }
        }

        eprintln!();
        eprintln!("Next steps:");
        for (i, hint) in summary.next_steps.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, hint);
        }
    }
}

impl WorkflowObserver for CliProgress {
    fn on_operation_started(&self, state: &LedgerState, resumed: bool) {
        let verb = if resumed { "Resuming" } else { "Starting" };
        eprintln!("{} {} on {}", verb, state.operation, state.host);
        if self.verbose {
            eprintln!("  Operation id: {}", state.operation_id);
        }
        eprintln!();
    }

    fn on_step_skipped(&self, step: Step) {
        eprintln!("[SKIP] {} (already done)", step.description());
    }

    fn on_step_started(&self, step: Step) {
        eprintln!("[RUN ] {}", step.description());
    }

    fn on_step_completed(&self, step: Step, warnings: &[String]) {
        if warnings.is_empty() {
            eprintln!("[ OK ] {}", step.description());
        } else {
            eprintln!("[WARN] {}", step.description());
            for warning in warnings {
                eprintln!("       {}", warning);
            }
        }
    }

    fn on_operation_finished(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Finished(summary) => self.print_summary(summary),
            RunOutcome::Cancelled => {
                eprintln!();
                eprintln!("Cancelled.");
            }
            RunOutcome::Interrupted { next_step } => {
                eprintln!();
                match next_step {
                    Some(step) => eprintln!(
                        "Interrupted. Run the same command again to resume at: {}",
                        step.description()
                    ),
                    None => eprintln!("Interrupted. Run the same command again to finish."),
                }
            }
            RunOutcome::RestartRequired { installed } => {
                let names: Vec<String> = installed.iter().map(|t| t.to_string()).collect();
                eprintln!();
                eprintln!("Installed: {}", names.join(", "));
                eprintln!("Open a new terminal (so the new tools are on PATH) and run the same command again to continue.");
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
