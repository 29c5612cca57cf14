//! HostMove - Command-line interface for the migration engine.
//!
//! Backs a machine up into a target directory and restores it on a
//! replacement host. Progress is reported on stderr and logged to the
//! target's `migration.log`.

mod logging;
mod progress;
mod prompt;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use engine::lock::TargetLock;
use engine::{
    ledger, AutoPrompt, BackupLayout, Collaborators, Configuration, EngineError, Prompt, ResumeChoice, RunOutcome,
    VerificationReport, VerificationStatus, Workflow,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

use crate::progress::CliProgress;
use crate::prompt::ConsolePrompt;

/// Process exit codes.
mod exit {
    pub const OK: i32 = 0;
    /// `verify` found missing or corrupted files
    pub const INTEGRITY: i32 = 1;
    pub const FATAL: i32 = 2;
    /// `verify` found no checksum data
    pub const NO_DATA: i32 = 3;
    pub const CANCELLED: i32 = 4;
    pub const RESTART_REQUIRED: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}

/// HostMove - move installed software and user data to a new machine
#[derive(Parser, Debug)]
#[command(name = "hostmove")]
#[command(version)]
#[command(about = "Back up a Windows machine's packages and user profiles, and restore them on a new one")]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back this machine up into TARGET
    Backup {
        #[arg(value_name = "TARGET")]
        target: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Restore the backup in TARGET onto this machine
    Restore {
        #[arg(value_name = "TARGET")]
        target: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Continue even if checksum verification fails
        #[arg(long)]
        skip_verification: bool,
    },
    /// Check the checksums of the backup in TARGET
    Verify {
        #[arg(value_name = "TARGET")]
        target: PathBuf,
    },
    /// Write the installed-software inventory into TARGET
    Inventory {
        #[arg(value_name = "TARGET")]
        target: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Answer yes to every question
    #[arg(short = 'y', long)]
    yes: bool,

    /// Discard an unfinished operation instead of resuming it
    #[arg(long)]
    fresh: bool,

    /// Remove a lock left behind by a crashed run
    #[arg(long)]
    break_lock: bool,
}

impl Command {
    fn target(&self) -> &Path {
        match self {
            Command::Backup { target, .. }
            | Command::Restore { target, .. }
            | Command::Verify { target }
            | Command::Inventory { target } => target,
        }
    }

    fn run_args(&self) -> RunArgs {
        match self {
            Command::Backup { run, .. } | Command::Restore { run, .. } => run.clone(),
            _ => RunArgs::default(),
        }
    }

    /// Whether the command creates the target when it is missing.
    fn creates_target(&self) -> bool {
        matches!(self, Command::Backup { .. } | Command::Inventory { .. })
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match run_cli(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = error_hint(&e) {
                eprintln!("{}", hint);
            }
            exit::FATAL
        }
    };

    std::process::exit(exit_code);
}

/// Advice for OS failures the operator can fix.
fn error_hint(e: &anyhow::Error) -> Option<&'static str> {
    let code = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
        .and_then(EngineError::raw_os_error)?;
    match std::io::Error::from_raw_os_error(code).kind() {
        std::io::ErrorKind::PermissionDenied => {
            Some("Hint: run the command from an elevated (administrator) terminal.")
        }
        _ => None,
    }
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> anyhow::Result<i32> {
    let config = load_config(cli)?;
    let run = cli.command.run_args();

    let interrupt = Arc::new(AtomicBool::new(false));
    let workflow = Workflow::new(config.clone(), Collaborators::system(&config), make_prompt(&run, &config))
        .with_observer(Box::new(CliProgress::new(cli.verbose)))
        .with_interrupt_flag(Arc::clone(&interrupt));

    let target = workflow.validate_target(cli.command.target())?;

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    let log_file = if target.is_dir() || cli.command.creates_target() {
        Some(BackupLayout::new(&target).log())
    } else {
        None
    };
    if let Err(e) = logging::init(level, log_file.as_deref()) {
        eprintln!("Warning: file logging unavailable: {:#}", e);
    }

    install_interrupt_handler(interrupt, target.clone());
    dispatch(&cli.command, &workflow, &target)
}

/// Defaults, overlaid by `--config`, then by command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<Configuration> {
    let mut config = match &cli.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };

    match &cli.command {
        Command::Backup { run, .. } => config.break_stale_lock |= run.break_lock,
        Command::Restore {
            run, skip_verification, ..
        } => {
            config.break_stale_lock |= run.break_lock;
            config.skip_verification |= *skip_verification;
        }
        _ => {}
    }
    Ok(config)
}

fn make_prompt(run: &RunArgs, config: &Configuration) -> Box<dyn Prompt> {
    let fresh = run.fresh.then_some(ResumeChoice::StartFresh);
    if run.yes {
        Box::new(AutoPrompt::new(fresh.unwrap_or(config.resume), true))
    } else {
        Box::new(ConsolePrompt::new(fresh))
    }
}

fn dispatch(command: &Command, workflow: &Workflow, target: &Path) -> anyhow::Result<i32> {
    match command {
        Command::Backup { .. } => {
            let outcome = workflow.backup(target).context("backup failed")?;
            Ok(outcome_code(&outcome))
        }
        Command::Restore { .. } => {
            let outcome = workflow.restore(target).context("restore failed")?;
            Ok(outcome_code(&outcome))
        }
        Command::Verify { .. } => {
            let report = workflow.verify(target).context("verification failed")?;
            print_verification(&report);
            Ok(verification_code(&report))
        }
        Command::Inventory { .. } => {
            let report = workflow.inventory(target).context("inventory failed")?;
            let Some(path) = report.path else {
                bail!(
                    "inventory scan produced nothing: {}",
                    report.warning.unwrap_or_else(|| "no reason given".to_string())
                );
            };
            if let Some(warning) = &report.warning {
                eprintln!("Warning: {}", warning);
            }
            eprintln!("{} applications written to {}", report.entries, path.display());
            Ok(exit::OK)
        }
    }
}

fn outcome_code(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Finished(_) => exit::OK,
        RunOutcome::Cancelled => exit::CANCELLED,
        RunOutcome::Interrupted { .. } => exit::INTERRUPTED,
        RunOutcome::RestartRequired { .. } => exit::RESTART_REQUIRED,
    }
}

fn verification_code(report: &VerificationReport) -> i32 {
    match report.status() {
        VerificationStatus::Verified => exit::OK,
        VerificationStatus::Failed => exit::INTEGRITY,
        VerificationStatus::NoData => exit::NO_DATA,
    }
}

fn print_verification(report: &VerificationReport) {
    match report.status() {
        VerificationStatus::Verified => eprintln!("All {} recorded files verified.", report.files_checked),
        VerificationStatus::NoData => eprintln!("No checksum data found; nothing to verify."),
        VerificationStatus::Failed => {
            eprintln!(
                "{} of {} recorded files failed verification:",
                report.errors.len(),
                report.files_checked
            );
            for error in &report.errors {
                eprintln!("  {}", error);
            }
        }
    }
}

/// First Ctrl+C asks the engine to stop at the next step boundary; the
/// second exits on the spot.
fn install_interrupt_handler(flag: Arc<AtomicBool>, target: PathBuf) {
    let spawned = std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Ctrl+C handling unavailable: {}", e);
                    return;
                }
            };

            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Ctrl+C handling unavailable: {}", e);
                        return;
                    }
                    if flag.swap(true, Ordering::SeqCst) {
                        eprintln!("Interrupted again; exiting now.");
                        if let Err(e) = TargetLock::release_owned(&target) {
                            warn!("Could not release the target lock: {}", e);
                        }
                        std::process::exit(exit::INTERRUPTED);
                    }
                    match ledger::load(&target).and_then(|state| state.current_step) {
                        Some(step) => warn!(
                            "Interrupted during {}; stopping once it finishes (Ctrl+C again to exit now)",
                            step
                        ),
                        None => warn!("Interrupted; stopping at the next step (Ctrl+C again to exit now)"),
                    }
                }
            });
        });

    if let Err(e) = spawned {
        warn!("Ctrl+C handling unavailable: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::adapters::{AdapterOutcome, InventoryScanner, NativeCopier};
    use engine::model::InventoryEntry;
    use engine::OverwritePolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_error_hint_for_permission_denied() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let os_code = if cfg!(windows) { 5 } else { 13 };
        let err = anyhow::Error::new(EngineError::WriteError {
            path: PathBuf::from("backup/backup-progress.json"),
            source: std::io::Error::from_raw_os_error(os_code),
        });
        assert!(error_hint(&err).is_some());

        let no_code = anyhow::Error::new(EngineError::WriteError {
            path: PathBuf::from("backup/backup-progress.json"),
            source: denied,
        });
        assert!(error_hint(&no_code).is_none());
        assert!(error_hint(&anyhow::anyhow!("something else")).is_none());
    }

    struct NoInventory;

    impl InventoryScanner for NoInventory {
        fn scan(&self) -> AdapterOutcome<Vec<InventoryEntry>> {
            AdapterOutcome::Success(Vec::new())
        }
    }

    fn quiet_workflow(users: &Path, prompt: Box<dyn Prompt>) -> Workflow {
        let config = Configuration {
            users_root: users.to_path_buf(),
            restore_users_root: users.join("restored"),
            package_tools: Vec::new(),
            ..Default::default()
        };
        let collaborators = Collaborators {
            package_managers: Vec::new(),
            copier: Box::new(NativeCopier::new(OverwritePolicy::SmartUpdate)),
            inventory: Box::new(NoInventory),
        };
        Workflow::new(config, collaborators, prompt)
    }

    fn users_dir(temp: &TempDir) -> PathBuf {
        let users = temp.path().join("users");
        fs::create_dir_all(users.join("alice").join("Documents")).expect("Failed to create profile");
        fs::write(users.join("alice").join("Documents").join("cv.txt"), "hello").expect("Failed to write file");
        users
    }

    fn verify_command(target: &Path) -> Command {
        Command::Verify {
            target: target.to_path_buf(),
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["hostmove", "-v", "restore", "E:\\Migration", "-y", "--skip-verification"])
            .expect("valid arguments");
        assert!(cli.verbose);
        match cli.command {
            Command::Restore {
                target,
                run,
                skip_verification,
            } => {
                assert_eq!(target, PathBuf::from("E:\\Migration"));
                assert!(run.yes);
                assert!(!run.fresh);
                assert!(skip_verification);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["hostmove", "verify"]).is_err());
        assert!(Cli::try_parse_from(["hostmove", "verify", "D:\\bk", "--fresh"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from(["hostmove", "restore", "/mnt/bk", "--break-lock", "--skip-verification"])
            .expect("valid arguments");
        let config = load_config(&cli).expect("default config");
        assert!(config.break_stale_lock);
        assert!(config.skip_verification);
    }

    #[test]
    fn test_cli_rejects_bad_config_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("hostmove.toml");
        fs::write(&path, "robocopy_threads = 0").expect("Failed to write file");

        let cli = Cli {
            config: Some(path),
            verbose: false,
            command: verify_command(temp.path()),
        };
        assert!(run_cli(&cli).is_err(), "CLI should reject an invalid config");
    }

    #[test]
    fn test_verify_without_checksums_exits_no_data() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cli = Cli {
            config: None,
            verbose: false,
            command: verify_command(temp.path()),
        };
        assert_eq!(run_cli(&cli).expect("verify runs"), exit::NO_DATA);
    }

    #[test]
    fn test_backup_then_verify_exit_codes() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let users = users_dir(&temp);
        let target = temp.path().join("backup");
        let workflow = quiet_workflow(&users, Box::new(AutoPrompt::new(ResumeChoice::Resume, true)));

        let backup = Command::Backup {
            target: target.clone(),
            run: RunArgs::default(),
        };
        assert_eq!(dispatch(&backup, &workflow, &target).unwrap(), exit::OK);
        assert_eq!(dispatch(&verify_command(&target), &workflow, &target).unwrap(), exit::OK);

        fs::write(BackupLayout::new(&target).inventory(), "tampered").expect("Failed to write file");
        assert_eq!(
            dispatch(&verify_command(&target), &workflow, &target).unwrap(),
            exit::INTEGRITY
        );
    }

    #[test]
    fn test_declined_overwrite_exits_cancelled() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let users = users_dir(&temp);
        let target = temp.path().join("backup");
        let backup = Command::Backup {
            target: target.clone(),
            run: RunArgs::default(),
        };

        let yes = quiet_workflow(&users, Box::new(AutoPrompt::new(ResumeChoice::Resume, true)));
        assert_eq!(dispatch(&backup, &yes, &target).unwrap(), exit::OK);

        let no = quiet_workflow(&users, Box::new(AutoPrompt::new(ResumeChoice::Resume, false)));
        assert_eq!(dispatch(&backup, &no, &target).unwrap(), exit::CANCELLED);
    }

    #[test]
    fn test_restore_without_manifest_is_fatal() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let users = users_dir(&temp);
        let workflow = quiet_workflow(&users, Box::new(AutoPrompt::default()));
        let restore = Command::Restore {
            target: temp.path().to_path_buf(),
            run: RunArgs::default(),
            skip_verification: false,
        };

        let err = dispatch(&restore, &workflow, temp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("No backup manifest"));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(outcome_code(&RunOutcome::Cancelled), exit::CANCELLED);
        assert_eq!(
            outcome_code(&RunOutcome::Interrupted { next_step: None }),
            exit::INTERRUPTED
        );
        assert_eq!(
            outcome_code(&RunOutcome::RestartRequired { installed: Vec::new() }),
            exit::RESTART_REQUIRED
        );
    }
}
