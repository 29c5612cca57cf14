//! Console answers to the engine's questions.

use chrono::Local;
use engine::{LedgerState, Prompt, ResumeChoice, VerificationReport};
use std::io::{self, BufRead, Write};

/// Errors listed before asking whether to continue a restore.
const MAX_LISTED_ERRORS: usize = 10;

/// Asks on stderr, reads stdin. End of input picks the safe default.
pub struct ConsolePrompt {
    /// Set by `--fresh`; skips the resume question
    resume_override: Option<ResumeChoice>,
}

impl ConsolePrompt {
    pub fn new(resume_override: Option<ResumeChoice>) -> Self {
        ConsolePrompt { resume_override }
    }

    fn ask(question: &str) -> Option<String> {
        eprint!("{} ", question);
        let _ = io::stderr().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn ask_yes_no(question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = Self::ask(&format!("{} {}", question, hint)) else {
                return default;
            };
            if let Some(yes) = parse_yes_no(&answer, default) {
                return yes;
            }
        }
    }
}

impl Prompt for ConsolePrompt {
    fn resume_choice(&self, existing: &LedgerState) -> ResumeChoice {
        if let Some(choice) = self.resume_override {
            return choice;
        }

        eprintln!(
            "An unfinished {} was found: started {} on {}, {} of {} steps done.",
            existing.operation,
            existing.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            existing.host,
            existing.completed_steps.len(),
            existing.operation.steps().len()
        );
        if let Some(step) = existing.current_step {
            eprintln!("It stopped during: {}", step.description());
        }

        loop {
            let Some(answer) = Self::ask("[R]esume, start [f]resh, or [c]ancel?") else {
                return ResumeChoice::Resume;
            };
            if let Some(choice) = parse_resume_answer(&answer) {
                return choice;
            }
        }
    }

    fn confirm(&self, question: &str) -> bool {
        Self::ask_yes_no(question, false)
    }

    fn confirm_integrity_override(&self, report: &VerificationReport) -> bool {
        eprintln!(
            "Backup verification failed: {} of {} files.",
            report.errors.len(),
            report.files_checked
        );
        for error in report.errors.iter().take(MAX_LISTED_ERRORS) {
            eprintln!("  {}", error);
        }
        if report.errors.len() > MAX_LISTED_ERRORS {
            eprintln!("  ... and {} more", report.errors.len() - MAX_LISTED_ERRORS);
        }
        Self::ask_yes_no("Continue the restore anyway?", false)
    }
}

fn parse_resume_answer(answer: &str) -> Option<ResumeChoice> {
    match answer.trim().to_lowercase().as_str() {
        "" | "r" | "resume" => Some(ResumeChoice::Resume),
        "f" | "fresh" => Some(ResumeChoice::StartFresh),
        "c" | "cancel" => Some(ResumeChoice::Cancel),
        _ => None,
    }
}

fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
