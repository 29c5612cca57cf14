//! The migration workflow engine.
//!
//! A `Workflow` runs one operation (backup or restore) against a target
//! directory as a fixed sequence of steps. Before each step the ledger is
//! consulted; after it the ledger is updated and saved. A run that stops
//! part-way (interrupt, crash, restart required) therefore picks up at the
//! first incomplete step the next time it is started.
//!
//! Problems inside a step never abort the run: they are logged, attached to
//! the step as warnings, and the step is still marked complete. Only the
//! pre-flight conditions in [`EngineError`] stop an operation.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{AdapterOutcome, Collaborators};
use crate::checksums::{ChecksumStore, VerificationReport, VerificationStatus};
use crate::config::Configuration;
use crate::error::EngineError;
use crate::exclusions::{fold_path, ExclusionPolicy};
use crate::fs_ops;
use crate::layout::BackupLayout;
use crate::ledger::{self, LedgerState, ProgressLedger};
use crate::lock::TargetLock;
use crate::manifest::{self, Manifest};
use crate::model::{CopyStats, HostIdentity, InventoryDocument, OperationKind, PackageTool, Step};
use crate::path_validator::PathValidator;
use crate::progress::WorkflowObserver;
use crate::prompt::{Prompt, ResumeChoice};

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub operation: OperationKind,
    pub operation_id: Uuid,
    /// True when the run continued an earlier, unfinished one
    pub resumed: bool,
    pub steps_executed: usize,
    pub steps_skipped: usize,
    pub files_copied: u64,
    pub bytes_copied: u64,
    /// Time since the operation was first started
    pub duration: Duration,
    /// `<step>: <message>` for every warning raised in this run
    pub warnings: Vec<String>,
    /// What the operator should do next
    pub next_steps: Vec<String>,
}

/// Terminal outcome of `backup` / `restore`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished(RunSummary),
    /// The operator declined to continue; nothing further was changed
    Cancelled,
    /// Stopped at a step boundary; the ledger is kept
    Interrupted { next_step: Option<Step> },
    /// Package managers were installed; the process must be restarted so
    /// they are on PATH. The ledger is kept.
    RestartRequired { installed: Vec<PackageTool> },
}

/// Result of a standalone inventory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReport {
    /// Written `inventory.json`; None when the scan produced nothing
    pub path: Option<PathBuf>,
    pub entries: usize,
    pub warning: Option<String>,
}

enum Control {
    Continue,
    Cancel,
    RestartRequired(Vec<PackageTool>),
}

struct StepReport {
    warnings: Vec<String>,
    control: Control,
}

impl StepReport {
    fn new() -> Self {
        StepReport {
            warnings: Vec::new(),
            control: Control::Continue,
        }
    }

    fn warn<S: Into<String>>(&mut self, message: S) {
        self.warnings.push(message.into());
    }

    /// Keep the adapter's message as a warning and hand back its payload.
    fn note<T>(&mut self, outcome: AdapterOutcome<T>) -> Option<T> {
        let (value, message) = outcome.split();
        if let Some(message) = message {
            self.warn(message);
        }
        value
    }
}

/// Per-run state shared by the step bodies.
struct RunContext {
    layout: BackupLayout,
    resumed: bool,
    steps_executed: usize,
    steps_skipped: usize,
    copy: CopyStats,
    warnings: Vec<String>,
}

impl RunContext {
    fn new(target: &Path, resumed: bool) -> Self {
        RunContext {
            layout: BackupLayout::new(target),
            resumed,
            steps_executed: 0,
            steps_skipped: 0,
            copy: CopyStats::default(),
            warnings: Vec::new(),
        }
    }
}

/// Drives backup, restore, verify and inventory against a target directory.
pub struct Workflow {
    config: Configuration,
    collaborators: Collaborators,
    prompt: Box<dyn Prompt>,
    observer: Option<Box<dyn WorkflowObserver>>,
    interrupt: Arc<AtomicBool>,
    validator: PathValidator,
    host: HostIdentity,
}

impl Workflow {
    pub fn new(config: Configuration, collaborators: Collaborators, prompt: Box<dyn Prompt>) -> Self {
        Workflow {
            config,
            collaborators,
            prompt,
            observer: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            validator: PathValidator::system(),
            host: HostIdentity::current(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn WorkflowObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share an interrupt flag; once set, the run stops at the next step
    /// boundary.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn with_validator(mut self, validator: PathValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Validate a target path and return its normalized form.
    pub fn validate_target(&self, target: &Path) -> Result<PathBuf, EngineError> {
        let raw = target.to_string_lossy();
        let validation = self.validator.validate(&raw);
        if !validation.valid {
            return Err(EngineError::InvalidTarget {
                path: raw.into_owned(),
                reason: validation.reason,
            });
        }
        Ok(validation.normalized.unwrap_or_else(|| target.to_path_buf()))
    }

    /// Back this machine up into `target`, creating it if needed.
    pub fn backup(&self, target: &Path) -> Result<RunOutcome, EngineError> {
        let target = self.validate_target(target)?;
        if fold_path(&self.config.users_root).starts_with(fold_path(&target)) {
            return Err(EngineError::InvalidTarget {
                path: target.display().to_string(),
                reason: format!("it contains the profiles folder {}", self.config.users_root.display()),
            });
        }
        fs_ops::ensure_dir(&target)?;
        let _lock = TargetLock::acquire(&target, self.config.break_stale_lock)?;

        let Some((mut ledger, resumed)) = self.open_ledger(&target, OperationKind::Backup)? else {
            return Ok(self.finish(RunOutcome::Cancelled));
        };

        let layout = BackupLayout::new(&target);
        if layout.manifest().is_file() {
            if resumed {
                info!("Removing manifest left next to an unfinished backup");
            } else {
                let question = format!("{} already holds a complete backup. Replace it?", target.display());
                if !self.prompt.confirm(&question) {
                    info!("Existing backup in {} kept", target.display());
                    return Ok(self.finish(RunOutcome::Cancelled));
                }
            }
            manifest::remove(&target)?;
        }

        let mut ctx = RunContext::new(&target, resumed);
        if let Some(early) = self.run_steps(&mut ledger, &mut ctx) {
            return Ok(self.finish(early));
        }

        let profiles = list_dirs(&layout.users_dir());
        let manifest = Manifest::from_ledger(ledger.state(), profiles);
        manifest::write(&target, &manifest)?;
        info!(
            "Backup {} complete: {} profiles, manifest written to {}",
            manifest.operation_id,
            manifest.profiles.len(),
            layout.manifest().display()
        );

        let state = ledger.clear();
        let next_steps = backup_next_steps(&target, &state);
        Ok(self.finish(RunOutcome::Finished(summarize(state, ctx, next_steps))))
    }

    /// Replay the backup in `source` onto this machine.
    pub fn restore(&self, source: &Path) -> Result<RunOutcome, EngineError> {
        let source = self.validate_target(source)?;
        if !source.is_dir() {
            return Err(EngineError::TargetNotFound { path: source });
        }
        let manifest = manifest::require(&source)?;
        info!(
            "Restoring backup {} of {} ({}) completed {}",
            manifest.operation_id, manifest.host, manifest.os, manifest.completed_at
        );
        if !manifest.steps_with_warnings.is_empty() {
            let steps: Vec<&str> = manifest.steps_with_warnings.iter().map(|s| s.ledger_name()).collect();
            warn!("The backup finished with warnings in: {}", steps.join(", "));
        }

        let _lock = TargetLock::acquire(&source, self.config.break_stale_lock)?;
        let Some((mut ledger, resumed)) = self.open_ledger(&source, OperationKind::Restore)? else {
            return Ok(self.finish(RunOutcome::Cancelled));
        };

        let mut ctx = RunContext::new(&source, resumed);
        if let Some(early) = self.run_steps(&mut ledger, &mut ctx) {
            return Ok(self.finish(early));
        }

        info!("Restore {} complete", ledger.state().operation_id);
        let state = ledger.clear();
        let next_steps = restore_next_steps(&source, &state);
        Ok(self.finish(RunOutcome::Finished(summarize(state, ctx, next_steps))))
    }

    /// Check the saved checksums of a backup.
    pub fn verify(&self, target: &Path) -> Result<VerificationReport, EngineError> {
        let target = self.validate_target(target)?;
        if !target.is_dir() {
            return Err(EngineError::TargetNotFound { path: target });
        }

        let report = ChecksumStore::new(self.config.checksum_algorithm).verify(&target);
        match report.status() {
            VerificationStatus::Verified => info!("{} files verified", report.files_checked),
            VerificationStatus::NoData => warn!("{} has no checksum data", target.display()),
            VerificationStatus::Failed => warn!(
                "{} of {} files failed verification",
                report.errors.len(),
                report.files_checked
            ),
        }
        Ok(report)
    }

    /// Scan installed software into `<target>/inventory.json`.
    pub fn inventory(&self, target: &Path) -> Result<InventoryReport, EngineError> {
        let target = self.validate_target(target)?;
        fs_ops::ensure_dir(&target)?;
        let _lock = TargetLock::acquire(&target, self.config.break_stale_lock)?;

        let (entries, warning) = self.collaborators.inventory.scan().split();
        if let Some(message) = &warning {
            warn!("Inventory: {}", message);
        }
        let Some(entries) = entries else {
            return Ok(InventoryReport {
                path: None,
                entries: 0,
                warning,
            });
        };

        let document = InventoryDocument::new(self.host.clone(), entries);
        let path = BackupLayout::new(&target).inventory();
        fs_ops::write_json_atomic(&path, &document)?;
        info!("{} applications written to {}", document.entries.len(), path.display());

        Ok(InventoryReport {
            path: Some(path),
            entries: document.entries.len(),
            warning,
        })
    }

    /// Find out whether to continue an earlier run. None means cancel.
    fn open_ledger(
        &self,
        target: &Path,
        kind: OperationKind,
    ) -> Result<Option<(ProgressLedger, bool)>, EngineError> {
        let Some(existing) = ledger::load(target) else {
            return Ok(Some((ProgressLedger::start_fresh(target, kind, self.host.clone()), false)));
        };

        if existing.operation != kind {
            return Err(EngineError::OperationInProgress {
                path: target.to_path_buf(),
                found: existing.operation,
            });
        }

        match self.prompt.resume_choice(&existing) {
            ResumeChoice::Resume => {
                info!(
                    "Resuming {} {} started {} ({} of {} steps done)",
                    kind,
                    existing.operation_id,
                    existing.start_time,
                    existing.completed_steps.len(),
                    kind.steps().len()
                );
                Ok(Some((ProgressLedger::resume(target, existing), true)))
            }
            ResumeChoice::StartFresh => {
                info!("Discarding unfinished {} started {}", kind, existing.start_time);
                if let Err(e) = ledger::clear(target) {
                    warn!("Could not remove old progress file: {}", e);
                }
                Ok(Some((ProgressLedger::start_fresh(target, kind, self.host.clone()), false)))
            }
            ResumeChoice::Cancel => {
                info!("Unfinished {} in {} left untouched", kind, target.display());
                Ok(None)
            }
        }
    }

    /// Run every step not yet complete. Some(outcome) if the run stopped early.
    fn run_steps(&self, ledger: &mut ProgressLedger, ctx: &mut RunContext) -> Option<RunOutcome> {
        let kind = ledger.state().operation;
        self.observe(|o| o.on_operation_started(ledger.state(), ctx.resumed));

        for &step in kind.steps() {
            if self.interrupt.load(Ordering::SeqCst) {
                let next_step = ledger.state().next_step();
                warn!("Interrupted; progress saved, next run resumes at {:?}", next_step);
                return Some(RunOutcome::Interrupted { next_step });
            }

            if ledger.is_step_complete(step) {
                debug!("Step {} already complete", step);
                ctx.steps_skipped += 1;
                self.observe(|o| o.on_step_skipped(step));
                continue;
            }

            ledger.set_current_step(step);
            info!("Step {}: {}", step, step.description());
            self.observe(|o| o.on_step_started(step));

            let report = self.run_step(step, ctx);

            if let Control::Cancel = report.control {
                if ledger.state().completed_steps.is_empty() {
                    if let Err(e) = ledger::clear(ledger.target()) {
                        warn!("Could not remove progress file: {}", e);
                    }
                }
                info!("{} cancelled at {}", kind, step);
                return Some(RunOutcome::Cancelled);
            }

            for message in &report.warnings {
                warn!("{}: {}", step, message);
                ledger.record_warning(step, message.clone());
                ctx.warnings.push(format!("{}: {}", step, message));
            }
            ledger.mark_step_complete(step);
            ctx.steps_executed += 1;
            self.observe(|o| o.on_step_completed(step, &report.warnings));

            if let Control::RestartRequired(installed) = report.control {
                info!("Restart required after installing {:?}", installed);
                return Some(RunOutcome::RestartRequired { installed });
            }
        }

        None
    }

    fn run_step(&self, step: Step, ctx: &mut RunContext) -> StepReport {
        match step {
            Step::ExportWinget => self.export_packages(PackageTool::Winget, ctx),
            Step::ExportChocolatey => self.export_packages(PackageTool::Chocolatey, ctx),
            Step::ExportScoop => self.export_packages(PackageTool::Scoop, ctx),
            Step::BackupUserData => self.backup_user_data(ctx),
            Step::GenerateInventory => self.generate_inventory(ctx),
            Step::GenerateChecksums => self.generate_checksums(ctx),
            Step::Verification => self.verify_backup(ctx),
            Step::PackageManagers => self.prepare_package_managers(ctx),
            Step::RestoreWinget => self.import_packages(PackageTool::Winget, ctx),
            Step::RestoreChocolatey => self.import_packages(PackageTool::Chocolatey, ctx),
            Step::RestoreScoop => self.import_packages(PackageTool::Scoop, ctx),
            Step::RestoreUserData => self.restore_user_data(ctx),
        }
    }

    fn export_packages(&self, tool: PackageTool, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        let stale = ctx.layout.package_export(tool);
        if let Err(e) = fs_ops::remove_if_exists(&stale) {
            report.warn(format!("cannot remove old export {}: {}", stale.display(), e));
        }

        if !self.config.tool_enabled(tool) {
            report.warn(format!("{} is disabled in configuration; skipped", tool));
            return report;
        }
        let Some(pm) = self.collaborators.package_manager(tool) else {
            report.warn(format!("no {} collaborator configured", tool));
            return report;
        };
        if !pm.is_installed() {
            report.warn(format!("{} is not installed; nothing exported", tool));
            return report;
        }

        if let Some(file) = report.note(pm.export(&ctx.layout.packages_dir())) {
            info!("{} packages exported to {}", tool, file.display());
        }
        report
    }

    fn backup_user_data(&self, ctx: &mut RunContext) -> StepReport {
        let mut report = StepReport::new();
        let users_root = &self.config.users_root;
        let policy = self.config.exclusion_policy();

        let profiles = match discover_profiles(users_root, &policy, ctx.layout.root()) {
            Ok(profiles) => profiles,
            Err(e) => {
                report.warn(format!("cannot list profiles in {}: {}", users_root.display(), e));
                return report;
            }
        };
        if profiles.is_empty() {
            report.warn(format!("no user profiles found under {}", users_root.display()));
            return report;
        }

        for name in profiles {
            let source = users_root.join(&name);
            let destination = ctx.layout.user_dir(&name);
            let policy = exclude_target(&policy, &source, ctx.layout.root());
            info!("Copying profile {} to {}", name, destination.display());

            let (stats, message) = self.collaborators.copier.copy(&source, &destination, &policy).split();
            if let Some(message) = message {
                report.warn(format!("profile {}: {}", name, message));
            }
            if let Some(stats) = stats {
                info!(
                    "Profile {}: {} files ({} bytes) copied, {} up to date",
                    name, stats.files_copied, stats.bytes_copied, stats.files_skipped
                );
                ctx.copy.absorb(stats);
            }
        }
        report
    }

    fn generate_inventory(&self, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        let path = ctx.layout.inventory();
        if let Err(e) = fs_ops::remove_if_exists(&path) {
            report.warn(format!("cannot remove old inventory: {}", e));
        }

        if let Some(entries) = report.note(self.collaborators.inventory.scan()) {
            let document = InventoryDocument::new(self.host.clone(), entries);
            match fs_ops::write_json_atomic(&path, &document) {
                Ok(()) => info!("{} applications recorded", document.entries.len()),
                Err(e) => report.warn(format!("cannot write inventory: {}", e)),
            }
        }
        report
    }

    fn generate_checksums(&self, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        let layout = &ctx.layout;

        let mut files: Vec<String> = fs_ops::list_files(&layout.packages_dir())
            .iter()
            .filter_map(|p| layout.relative(p))
            .collect();
        let inventory = layout.inventory();
        if inventory.is_file() {
            files.extend(layout.relative(&inventory));
        }

        let store = ChecksumStore::new(self.config.checksum_algorithm);
        let (record, unreadable) = store.record_files(layout.root(), &files);
        for file in unreadable {
            report.warn(format!("cannot read {} for checksumming", file));
        }
        if record.is_empty() {
            report.warn("nothing to checksum; this backup cannot be verified before restore");
        }

        match store.save(layout.root(), &record) {
            Ok(()) => info!("{} {} checksums recorded", record.files.len(), store.algorithm()),
            Err(e) => report.warn(format!("cannot save checksums: {}", e)),
        }
        report
    }

    fn verify_backup(&self, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        let result = ChecksumStore::new(self.config.checksum_algorithm).verify(ctx.layout.root());

        match result.status() {
            VerificationStatus::Verified => info!("{} files verified", result.files_checked),
            VerificationStatus::NoData => report.warn("backup has no checksum data; integrity not verified"),
            VerificationStatus::Failed => {
                for error in &result.errors {
                    warn!("Integrity error: {}", error);
                }
                let summary = format!(
                    "{} of {} checked files failed verification",
                    result.errors.len(),
                    result.files_checked
                );
                if self.config.skip_verification {
                    report.warn(format!("{}; continuing because verification is skipped", summary));
                } else if self.prompt.confirm_integrity_override(&result) {
                    report.warn(format!("{}; continuing at operator request", summary));
                } else {
                    warn!("{}; restore stopped", summary);
                    report.control = Control::Cancel;
                }
            }
        }
        report
    }

    fn prepare_package_managers(&self, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        let mut installed = Vec::new();

        for tool in PackageTool::ALL {
            if !self.config.tool_enabled(tool) || !ctx.layout.package_export(tool).is_file() {
                continue;
            }
            let Some(pm) = self.collaborators.package_manager(tool) else {
                continue;
            };
            if pm.is_installed() {
                debug!("{} is installed", tool);
                continue;
            }

            let question = format!("{} is needed to restore its packages but is not installed. Install it now?", tool);
            if !self.prompt.confirm(&question) {
                report.warn(format!("{} is not installed; its packages will be skipped", tool));
                continue;
            }

            match pm.install() {
                AdapterOutcome::Success(()) => installed.push(tool),
                AdapterOutcome::Warning((), message) => {
                    report.warn(format!("{} installed with warnings: {}", tool, message));
                    installed.push(tool);
                }
                AdapterOutcome::Failure(reason) => {
                    report.warn(format!("could not install {}: {}", tool, reason));
                }
            }
        }

        if !installed.is_empty() {
            report.control = Control::RestartRequired(installed);
        }
        report
    }

    fn import_packages(&self, tool: PackageTool, ctx: &RunContext) -> StepReport {
        let mut report = StepReport::new();
        if !self.config.tool_enabled(tool) {
            report.warn(format!("{} is disabled in configuration; skipped", tool));
            return report;
        }

        let file = ctx.layout.package_export(tool);
        if !file.is_file() {
            report.warn(format!("backup has no {} export", tool));
            return report;
        }
        let installed = self
            .collaborators
            .package_manager(tool)
            .filter(|pm| pm.is_installed());
        let Some(pm) = installed else {
            report.warn(format!("{} is not installed; {} not imported", tool, file.display()));
            return report;
        };

        if report.note(pm.import(&file)).is_some() {
            info!("{} packages imported from {}", tool, file.display());
        }
        report
    }

    fn restore_user_data(&self, ctx: &mut RunContext) -> StepReport {
        let mut report = StepReport::new();
        let users = ctx.layout.users_dir();
        let profiles = list_dirs(&users);
        if profiles.is_empty() {
            report.warn("backup holds no user profiles");
            return report;
        }

        let root = &self.config.restore_users_root;
        for name in profiles {
            let destination = root.join(&name);
            info!("Restoring profile {} to {}", name, destination.display());
            let (stats, message) = self
                .collaborators
                .copier
                .copy(&users.join(&name), &destination, &ExclusionPolicy::empty())
                .split();
            if let Some(message) = message {
                report.warn(format!("profile {}: {}", name, message));
            }
            if let Some(stats) = stats {
                ctx.copy.absorb(stats);
            }
        }
        report
    }

    fn observe<F: FnOnce(&dyn WorkflowObserver)>(&self, f: F) {
        if let Some(observer) = &self.observer {
            f(observer.as_ref());
        }
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        self.observe(|o| o.on_operation_finished(&outcome));
        outcome
    }
}

/// Profile folders under `root`, minus excluded names, sorted.
fn discover_profiles(root: &Path, policy: &ExclusionPolicy, target: &Path) -> io::Result<Vec<String>> {
    let target = fold_path(target);
    let mut profiles = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if policy.excludes_profile(&name) {
            debug!("Skipping profile {}", name);
            continue;
        }
        if fold_path(&entry.path()) == target {
            info!("Skipping {}: it is the backup target", name);
            continue;
        }
        profiles.push(name);
    }
    profiles.sort();
    Ok(profiles)
}

/// Subdirectory names of `dir`, sorted. Empty if `dir` is missing.
fn list_dirs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// A backup target inside the profile being copied must not be copied into
/// itself. Only that one directory is pruned.
fn exclude_target(policy: &ExclusionPolicy, profile: &Path, target: &Path) -> ExclusionPolicy {
    let (profile_key, target_key) = (fold_path(profile), fold_path(target));
    if target_key != profile_key && target_key.starts_with(&profile_key) {
        warn!("Backup target is inside {}; excluding {}", profile.display(), target.display());
        policy.clone().with_excluded_path(target)
    } else {
        policy.clone()
    }
}

fn summarize(state: LedgerState, ctx: RunContext, next_steps: Vec<String>) -> RunSummary {
    RunSummary {
        operation: state.operation,
        operation_id: state.operation_id,
        resumed: ctx.resumed,
        steps_executed: ctx.steps_executed,
        steps_skipped: ctx.steps_skipped,
        files_copied: ctx.copy.files_copied,
        bytes_copied: ctx.copy.bytes_copied,
        duration: (Utc::now() - state.start_time).to_std().unwrap_or_default(),
        warnings: ctx.warnings,
        next_steps,
    }
}

fn warned_steps_hint(state: &LedgerState) -> Option<String> {
    if state.step_warnings.is_empty() {
        return None;
    }
    let steps: Vec<&str> = state.step_warnings.keys().map(|s| s.ledger_name()).collect();
    Some(format!(
        "Review {} for the steps that finished with warnings: {}",
        crate::layout::LOG_FILE,
        steps.join(", ")
    ))
}

fn backup_next_steps(target: &Path, state: &LedgerState) -> Vec<String> {
    let mut hints = vec![
        format!(
            "Copy {} to the new machine, then run `hostmove restore <path to the copy>` there",
            target.display()
        ),
        "Keep this backup until the restored machine has been checked".to_string(),
    ];
    hints.extend(warned_steps_hint(state));
    hints
}

fn restore_next_steps(source: &Path, state: &LedgerState) -> Vec<String> {
    let mut hints = vec![
        "Sign out and back in (or restart) so restored settings take effect".to_string(),
        format!(
            "Reinstall software no package manager covers; see {}",
            BackupLayout::new(source).inventory().display()
        ),
    ];
    hints.extend(warned_steps_hint(state));
    hints
}
