//! User-data copiers.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use super::packages::tail;
use super::{AdapterOutcome, UserDataCopier};
use crate::exclusions::ExclusionPolicy;
use crate::fs_ops;
use crate::model::{CopyFailure, CopyStats, OverwritePolicy};

/// In-process copier: enumerate, then copy file by file.
///
/// A file that fails to copy is recorded and the rest of the tree still
/// goes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCopier {
    overwrite_policy: OverwritePolicy,
}

impl NativeCopier {
    pub fn new(overwrite_policy: OverwritePolicy) -> Self {
        NativeCopier { overwrite_policy }
    }
}

impl UserDataCopier for NativeCopier {
    fn copy(&self, source: &Path, destination: &Path, exclusions: &ExclusionPolicy) -> AdapterOutcome<CopyStats> {
        let plan = match fs_ops::plan_tree(source, destination, exclusions) {
            Ok(plan) => plan,
            Err(e) => return AdapterOutcome::Failure(e.to_string()),
        };
        debug!(
            "{}: {} files, {} bytes planned, {} excluded",
            source.display(),
            plan.files.len(),
            plan.total_bytes,
            plan.excluded
        );

        let mut stats = CopyStats {
            failures: plan.failures,
            ..Default::default()
        };

        for file in &plan.files {
            if !fs_ops::should_copy_file(file, self.overwrite_policy) {
                stats.files_skipped += 1;
                continue;
            }
            match fs_ops::copy_file_with_metadata(&file.source_path, &file.destination_path) {
                Ok(bytes) => {
                    stats.files_copied += 1;
                    stats.bytes_copied += bytes;
                }
                Err(e) => {
                    warn!("Failed to copy {}: {}", file.source_path.display(), e);
                    stats.failures.push(CopyFailure {
                        path: file.source_path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        finish(stats)
    }
}

/// Copier that hands each profile to `robocopy`.
#[derive(Debug, Clone, Copy)]
pub struct RobocopyCopier {
    threads: u32,
}

impl RobocopyCopier {
    pub fn new(threads: u32) -> Self {
        RobocopyCopier { threads }
    }

    fn arguments(&self, source: &Path, destination: &Path, exclusions: &ExclusionPolicy) -> Vec<String> {
        let mut args = vec![
            source.display().to_string(),
            destination.display().to_string(),
            "/E".to_string(),
            "/COPY:DAT".to_string(),
            "/R:1".to_string(),
            "/W:1".to_string(),
            format!("/MT:{}", self.threads),
            "/XJ".to_string(),
            "/NFL".to_string(),
            "/NDL".to_string(),
            "/NP".to_string(),
            "/BYTES".to_string(),
        ];

        let mut dirs: Vec<String> = exclusions.dir_patterns().map(str::to_string).collect();
        dirs.extend(exclusions.excluded_paths().map(|p| p.display().to_string()));
        if !dirs.is_empty() {
            args.push("/XD".to_string());
            args.extend(dirs);
        }
        let files: Vec<&str> = exclusions.file_patterns().collect();
        if !files.is_empty() {
            args.push("/XF".to_string());
            args.extend(files.into_iter().map(str::to_string));
        }
        args
    }
}

impl UserDataCopier for RobocopyCopier {
    fn copy(&self, source: &Path, destination: &Path, exclusions: &ExclusionPolicy) -> AdapterOutcome<CopyStats> {
        let args = self.arguments(source, destination, exclusions);
        info!("robocopy {} -> {}", source.display(), destination.display());

        let output = match Command::new("robocopy").args(&args).stdin(Stdio::null()).output() {
            Ok(output) => output,
            Err(e) => return AdapterOutcome::Failure(format!("cannot run robocopy: {}", e)),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = parse_summary(&stdout);
        let code = output.status.code().unwrap_or(16);

        let mut stats = CopyStats {
            files_copied: summary.files_copied,
            bytes_copied: summary.bytes_copied,
            files_skipped: summary.files_skipped,
            failures: Vec::new(),
        };

        match code {
            0..=7 => finish(stats),
            8..=15 => {
                if summary.files_failed > 0 {
                    stats.failures.push(CopyFailure {
                        path: source.to_path_buf(),
                        reason: format!("{} files failed to copy", summary.files_failed),
                    });
                }
                AdapterOutcome::Warning(
                    stats,
                    format!(
                        "robocopy exited with {} for {}; some files were not copied",
                        code,
                        source.display()
                    ),
                )
            }
            _ => AdapterOutcome::Failure(format!(
                "robocopy exited with {} for {}: {}",
                code,
                source.display(),
                tail(&output.stderr)
            )),
        }
    }
}

/// Counters from robocopy's closing table.
#[derive(Debug, Default, PartialEq, Eq)]
struct RobocopySummary {
    files_copied: u64,
    files_skipped: u64,
    files_failed: u64,
    bytes_copied: u64,
}

/// Read the `Files :` and `Bytes :` rows (Total, Copied, Skipped, Mismatch,
/// FAILED, Extras).
fn parse_summary(stdout: &str) -> RobocopySummary {
    let mut summary = RobocopySummary::default();
    for line in stdout.lines() {
        let Some((label, counts)) = line.split_once(':') else {
            continue;
        };
        let counts: Vec<u64> = counts
            .split_whitespace()
            .map_while(|c| c.parse().ok())
            .collect();
        if counts.len() < 5 {
            continue;
        }
        match label.trim() {
            "Files" => {
                summary.files_copied = counts[1];
                summary.files_skipped = counts[2];
                summary.files_failed = counts[4];
            }
            "Bytes" => summary.bytes_copied = counts[1],
            _ => {}
        }
    }
    summary
}

fn finish(stats: CopyStats) -> AdapterOutcome<CopyStats> {
    if stats.failures.is_empty() {
        return AdapterOutcome::Success(stats);
    }
    let first = &stats.failures[0];
    let message = format!(
        "{} files could not be copied (first: {}: {})",
        stats.failures.len(),
        first.path.display(),
        first.reason
    );
    AdapterOutcome::Warning(stats, message)
}
