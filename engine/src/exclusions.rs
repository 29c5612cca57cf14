//! Exclusion rules for user-data enumeration.
//!
//! Patterns are case-insensitive wildcards (`*` any run, `?` one character)
//! matched against a single entry name, never a full path. Three lists:
//! directory names, file names, and profile folder names (consulted when
//! discovering which user profiles exist). On top of the patterns a policy
//! can carry exact directory paths, pruned wherever they sit in the tree.

use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Cloud-sync roots, legacy junctions and caches.
pub const DEFAULT_DIR_PATTERNS: &[&str] = &[
    "OneDrive*",
    "Dropbox",
    "Google Drive",
    "iCloudDrive",
    "Box",
    "Application Data",
    "Cookies",
    "Local Settings",
    "My Documents",
    "NetHood",
    "PrintHood",
    "Recent",
    "SendTo",
    "Start Menu",
    "Templates",
    "Temp",
    "Cache",
    "INetCache",
    "CrashDumps",
    ".cache",
    "node_modules",
];

/// Temp, log, thumbnail and registry-hive files.
pub const DEFAULT_FILE_PATTERNS: &[&str] = &[
    "*.tmp",
    "*.temp",
    "*.log",
    "~$*",
    "Thumbs.db",
    "desktop.ini",
    "NTUSER.DAT*",
    "ntuser.*",
    "UsrClass.dat*",
];

/// Built-in and service profiles that are never migrated.
pub const DEFAULT_PROFILE_PATTERNS: &[&str] = &[
    "Default",
    "Default User",
    "Public",
    "All Users",
    "defaultuser*",
    "WDAGUtilityAccount",
];

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile a wildcard. None if the pattern is empty.
    pub fn new(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        let mut expr = String::from("(?i)^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        match Regex::new(&expr) {
            Ok(regex) => Some(NamePattern {
                source: pattern.to_string(),
                regex,
            }),
            Err(e) => {
                warn!("Ignoring exclusion pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Static exclusion rules applied while enumerating user data.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    dirs: Vec<NamePattern>,
    files: Vec<NamePattern>,
    profiles: Vec<NamePattern>,
    paths: Vec<PathBuf>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::from_patterns(DEFAULT_DIR_PATTERNS, DEFAULT_FILE_PATTERNS, DEFAULT_PROFILE_PATTERNS)
    }
}

impl ExclusionPolicy {
    /// A policy that excludes nothing.
    pub fn empty() -> Self {
        ExclusionPolicy {
            dirs: Vec::new(),
            files: Vec::new(),
            profiles: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn from_patterns<S: AsRef<str>>(dirs: &[S], files: &[S], profiles: &[S]) -> Self {
        let compile = |list: &[S]| -> Vec<NamePattern> {
            list.iter().filter_map(|p| NamePattern::new(p.as_ref())).collect()
        };
        ExclusionPolicy {
            dirs: compile(dirs),
            files: compile(files),
            profiles: compile(profiles),
            paths: Vec::new(),
        }
    }

    /// Defaults plus caller-supplied additions.
    pub fn with_extra(mut self, dirs: &[String], files: &[String], profiles: &[String]) -> Self {
        self.dirs.extend(dirs.iter().filter_map(|p| NamePattern::new(p)));
        self.files.extend(files.iter().filter_map(|p| NamePattern::new(p)));
        self.profiles.extend(profiles.iter().filter_map(|p| NamePattern::new(p)));
        self
    }

    /// Also prune the directory at exactly `path`.
    pub fn with_excluded_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn excludes_path(&self, path: &Path) -> bool {
        let path = fold_path(path);
        self.paths.iter().any(|p| fold_path(p) == path)
    }

    pub fn excluded_paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn excludes_dir(&self, name: &str) -> bool {
        self.dirs.iter().any(|p| p.matches(name))
    }

    pub fn excludes_file(&self, name: &str) -> bool {
        self.files.iter().any(|p| p.matches(name))
    }

    pub fn excludes_profile(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.matches(name))
    }

    pub fn dir_patterns(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(NamePattern::as_str)
    }

    pub fn file_patterns(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(NamePattern::as_str)
    }
}

/// Path in the form used for comparisons: case-folded where the filesystem
/// ignores case.
pub(crate) fn fold_path(path: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path.to_string_lossy().to_lowercase())
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards_are_case_insensitive() {
        let p = NamePattern::new("OneDrive*").unwrap();
        assert!(p.matches("OneDrive"));
        assert!(p.matches("onedrive - Contoso Ltd"));
        assert!(!p.matches("MyOneDrive"));

        let q = NamePattern::new("file?.txt").unwrap();
        assert!(q.matches("FILE1.TXT"));
        assert!(!q.matches("file12.txt"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = NamePattern::new("~$*").unwrap();
        assert!(p.matches("~$report.docx"));
        assert!(!p.matches("report.docx"));

        let dots = NamePattern::new("*.tmp").unwrap();
        assert!(dots.matches("a.tmp"));
        assert!(!dots.matches("atmp"));
    }

    #[test]
    fn test_empty_pattern_ignored() {
        assert!(NamePattern::new("  ").is_none());
    }

    #[test]
    fn test_default_policy() {
        let policy = ExclusionPolicy::default();
        assert!(policy.excludes_dir("Dropbox"));
        assert!(policy.excludes_dir("Application Data"));
        assert!(policy.excludes_dir("node_modules"));
        assert!(!policy.excludes_dir("Documents"));

        assert!(policy.excludes_file("NTUSER.DAT"));
        assert!(policy.excludes_file("ntuser.dat.LOG1"));
        assert!(policy.excludes_file("desktop.ini"));
        assert!(!policy.excludes_file("thesis.docx"));

        assert!(policy.excludes_profile("Public"));
        assert!(policy.excludes_profile("defaultuser0"));
        assert!(!policy.excludes_profile("alice"));
    }

    #[test]
    fn test_extra_patterns_extend_defaults() {
        let policy = ExclusionPolicy::default().with_extra(
            &["Steam*".to_string()],
            &["*.iso".to_string()],
            &["svc_*".to_string()],
        );
        assert!(policy.excludes_dir("SteamLibrary"));
        assert!(policy.excludes_dir("Dropbox"));
        assert!(policy.excludes_file("win11.iso"));
        assert!(policy.excludes_profile("svc_backup"));
        assert!(policy.file_patterns().any(|p| p == "*.iso"));
    }

    #[test]
    fn test_excluded_path_is_exact() {
        let policy = ExclusionPolicy::empty().with_excluded_path("/users/alice/Backups");
        assert!(policy.excludes_path(Path::new("/users/alice/Backups")));
        assert!(!policy.excludes_path(Path::new("/users/alice/Documents/Backups")));
        assert!(!policy.excludes_dir("Backups"));
        assert_eq!(policy.excluded_paths().count(), 1);
    }
}
