//! Engine configuration.
//!
//! A `Configuration` is built once (defaults, optionally overlaid by a TOML
//! file) and handed to the workflow by value; nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::checksums::ChecksumAlgorithm;
use crate::error::EngineError;
use crate::exclusions::ExclusionPolicy;
use crate::model::{OverwritePolicy, PackageTool};
use crate::prompt::ResumeChoice;

/// Which user-data copier the system collaborators use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyEngine {
    /// In-process copy (walkdir + per-file copy)
    Native,
    /// External multithreaded `robocopy`
    Robocopy,
}

impl Default for CopyEngine {
    fn default() -> Self {
        if cfg!(windows) {
            CopyEngine::Robocopy
        } else {
            CopyEngine::Native
        }
    }
}

/// Patterns added to the built-in exclusion lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Directory holding one folder per user profile on this machine
    pub users_root: PathBuf,

    /// Where restored profiles are written
    pub restore_users_root: PathBuf,

    /// Package managers to export/import
    pub package_tools: Vec<PackageTool>,

    pub copy_engine: CopyEngine,

    /// `/MT` value for robocopy
    pub robocopy_threads: u32,

    pub overwrite_policy: OverwritePolicy,

    pub checksum_algorithm: ChecksumAlgorithm,

    pub exclusions: ExclusionConfig,

    /// Answer to "resume?" when no one is asked
    pub resume: ResumeChoice,

    /// Continue a restore even if checksum verification fails
    pub skip_verification: bool,

    /// Remove a lock file left behind by a crashed run
    pub break_stale_lock: bool,

    /// Default log filter (RUST_LOG overrides)
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        let users_root = default_users_root();
        Configuration {
            restore_users_root: users_root.clone(),
            users_root,
            package_tools: PackageTool::ALL.to_vec(),
            copy_engine: CopyEngine::default(),
            robocopy_threads: 16,
            overwrite_policy: OverwritePolicy::default(),
            checksum_algorithm: ChecksumAlgorithm::default(),
            exclusions: ExclusionConfig::default(),
            resume: ResumeChoice::default(),
            skip_verification: false,
            break_stale_lock: false,
            log_level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Load a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|reason| EngineError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        let config: Configuration = toml::from_str(text).map_err(|e| e.to_string())?;
        if config.robocopy_threads == 0 || config.robocopy_threads > 128 {
            return Err(format!(
                "robocopy_threads must be between 1 and 128, got {}",
                config.robocopy_threads
            ));
        }
        Ok(config)
    }

    /// Built-in exclusions plus the configured additions.
    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::default().with_extra(
            &self.exclusions.dirs,
            &self.exclusions.files,
            &self.exclusions.profiles,
        )
    }

    pub fn tool_enabled(&self, tool: PackageTool) -> bool {
        self.package_tools.contains(&tool)
    }
}

/// Parent of the current user's home (`C:\Users`, `/home`).
fn default_users_root() -> PathBuf {
    let home = std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"));
    home.map(PathBuf::from)
        .and_then(|h| h.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| {
            if cfg!(windows) {
                PathBuf::from("C:\\Users")
            } else {
                PathBuf::from("/home")
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.package_tools.len(), 3);
        assert_eq!(config.resume, ResumeChoice::Resume);
        assert_eq!(config.checksum_algorithm, ChecksumAlgorithm::Md5);
        assert_eq!(config.overwrite_policy, OverwritePolicy::SmartUpdate);
        assert!(!config.skip_verification);
        assert_eq!(config.users_root, config.restore_users_root);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Configuration::from_toml(
            r#"
            users_root = "D:\\Profiles"
            package_tools = ["winget", "scoop"]
            checksum_algorithm = "sha256"
            copy_engine = "native"
            resume = "start-fresh"

            [exclusions]
            dirs = ["Steam*"]
            "#,
        )
        .expect("valid config");

        assert_eq!(config.users_root, PathBuf::from("D:\\Profiles"));
        assert!(config.tool_enabled(PackageTool::Scoop));
        assert!(!config.tool_enabled(PackageTool::Chocolatey));
        assert_eq!(config.checksum_algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(config.copy_engine, CopyEngine::Native);
        assert_eq!(config.resume, ResumeChoice::StartFresh);
        assert_eq!(config.robocopy_threads, 16);
        assert!(config.exclusion_policy().excludes_dir("SteamLibrary"));
        assert!(config.exclusion_policy().excludes_dir("Dropbox"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Configuration::from_toml("robocopy_threads = 0").is_err());
        assert!(Configuration::from_toml("package_tools = [\"apt\"]").is_err());
        assert!(Configuration::from_toml("checksum_algorithm = \"crc32\"").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("hostmove.toml");
        std::fs::write(&path, "skip_verification = \"maybe\"").unwrap();
        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
        assert!(err.to_string().contains("hostmove.toml"));
    }
}
