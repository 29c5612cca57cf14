//! Target path validation.
//!
//! Every operation validates its target before a directory is created or a
//! ledger is touched. Validation is a pure function of the path string plus
//! a denylist and home directory captured from the environment when the
//! validator is built.
//!
//! Rules, in order (the first failure wins):
//! 1. the path is non-empty
//! 2. the path is absolute
//! 3. the path parses and normalizes (no reserved characters, no `..` above
//!    the root)
//! 4. the normalized path is not a system location nor inside one
//! 5. the normalized path is not the current user's home directory itself

use std::path::PathBuf;

/// Path grammar the validator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Windows,
    Unix,
}

impl PathStyle {
    /// Style of the running platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }

    fn separator(self) -> char {
        match self {
            PathStyle::Windows => '\\',
            PathStyle::Unix => '/',
        }
    }
}

/// Outcome of validating one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: String,
    /// Normalized form of the path, present when `valid` is true
    pub normalized: Option<PathBuf>,
}

impl Validation {
    fn pass(normalized: String) -> Self {
        Validation {
            valid: true,
            reason: String::new(),
            normalized: Some(PathBuf::from(normalized)),
        }
    }

    fn fail<S: Into<String>>(reason: S) -> Self {
        Validation {
            valid: false,
            reason: reason.into(),
            normalized: None,
        }
    }
}

/// Validates backup target locations.
#[derive(Debug, Clone)]
pub struct PathValidator {
    style: PathStyle,
    /// Locations rejected together with everything below them
    protected_trees: Vec<String>,
    /// Locations rejected only when targeted exactly
    protected_exact: Vec<String>,
    home: Option<String>,
}

impl PathValidator {
    /// Build a validator from explicit lists. Entries are normalized with the
    /// same rules as candidate paths; unparseable entries are dropped.
    pub fn new(
        style: PathStyle,
        protected_trees: Vec<String>,
        protected_exact: Vec<String>,
        home: Option<String>,
    ) -> Self {
        let norm = |s: &String| normalize(style, s).ok().map(|n| fold_case(style, &n));
        PathValidator {
            style,
            protected_trees: protected_trees.iter().filter_map(norm).collect(),
            protected_exact: protected_exact.iter().filter_map(norm).collect(),
            home: home.as_ref().and_then(norm),
        }
    }

    /// Validator for the running system, with the denylist read from the
    /// environment.
    pub fn system() -> Self {
        match PathStyle::native() {
            PathStyle::Windows => Self::windows_from_env(|key| std::env::var(key).ok()),
            PathStyle::Unix => Self::unix_from_env(|key| std::env::var(key).ok()),
        }
    }

    /// Windows denylist built from an environment lookup.
    pub fn windows_from_env<F: Fn(&str) -> Option<String>>(env: F) -> Self {
        let var = |key: &str, fallback: &str| env(key).unwrap_or_else(|| fallback.to_string());
        let system_drive = var("SystemDrive", "C:");
        let profiles_root = env("USERPROFILE")
            .and_then(|home| {
                let trimmed = home.trim_end_matches(['\\', '/']);
                trimmed.rfind(['\\', '/']).map(|i| trimmed[..i].to_string())
            })
            .unwrap_or_else(|| format!("{}\\Users", system_drive));

        let mut trees = vec![
            var("SystemRoot", &format!("{}\\Windows", system_drive)),
            var("ProgramFiles", &format!("{}\\Program Files", system_drive)),
            var("ProgramFiles(x86)", &format!("{}\\Program Files (x86)", system_drive)),
            var("ProgramData", &format!("{}\\ProgramData", system_drive)),
            format!("{}\\Default", profiles_root),
            format!("{}\\Public", profiles_root),
        ];
        if let Some(w6432) = env("ProgramW6432") {
            trees.push(w6432);
        }

        Self::new(
            PathStyle::Windows,
            trees,
            vec![format!("{}\\", system_drive)],
            env("USERPROFILE"),
        )
    }

    /// Unix denylist; only the home directory comes from the environment.
    pub fn unix_from_env<F: Fn(&str) -> Option<String>>(env: F) -> Self {
        let trees = [
            "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/run", "/sbin", "/sys",
            "/usr", "/var",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self::new(PathStyle::Unix, trees, vec!["/".to_string()], env("HOME"))
    }

    /// Validate a candidate target path.
    pub fn validate(&self, path: &str) -> Validation {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Validation::fail("path is empty");
        }

        if !is_absolute(self.style, trimmed) {
            return Validation::fail("path must be absolute");
        }

        let normalized = match normalize(self.style, trimmed) {
            Ok(n) => n,
            Err(reason) => return Validation::fail(reason),
        };
        let folded = fold_case(self.style, &normalized);

        if self.protected_exact.iter().any(|p| *p == folded) {
            return Validation::fail(format!("{} is a filesystem root", normalized));
        }

        let sep = self.style.separator();
        if let Some(hit) = self
            .protected_trees
            .iter()
            .find(|p| folded == **p || is_below(&folded, p, sep))
        {
            return Validation::fail(format!("{} is inside protected location {}", normalized, hit));
        }

        if self.home.as_deref() == Some(folded.as_str()) {
            return Validation::fail("target cannot be the home directory itself; use a subfolder");
        }

        Validation::pass(normalized)
    }
}

/// Validate with the system validator.
pub fn validate(path: &str) -> Validation {
    PathValidator::system().validate(path)
}

fn fold_case(style: PathStyle, s: &str) -> String {
    match style {
        PathStyle::Windows => s.to_lowercase(),
        PathStyle::Unix => s.to_string(),
    }
}

fn is_below(candidate: &str, parent: &str, sep: char) -> bool {
    let prefix = if parent.ends_with(sep) {
        parent.to_string()
    } else {
        format!("{}{}", parent, sep)
    };
    candidate.starts_with(&prefix)
}

fn is_absolute(style: PathStyle, path: &str) -> bool {
    match style {
        PathStyle::Unix => path.starts_with('/'),
        PathStyle::Windows => {
            let p = path.replace('/', "\\");
            if p.starts_with("\\\\") {
                return true;
            }
            let bytes = p.as_bytes();
            bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\'
        }
    }
}

/// Lexically normalize an absolute path: collapse separators, resolve `.` and
/// `..`, reject characters the platform cannot store.
fn normalize(style: PathStyle, path: &str) -> Result<String, String> {
    if path.chars().any(|c| c == '\0') {
        return Err("path contains a NUL character".to_string());
    }

    let (prefix, rest) = match style {
        PathStyle::Unix => {
            if !path.starts_with('/') {
                return Err("path must be absolute".to_string());
            }
            ("/".to_string(), path.to_string())
        }
        PathStyle::Windows => split_windows_prefix(&path.replace('/', "\\"))?,
    };

    let sep = style.separator();
    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split(sep) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err("path escapes its root".to_string());
                }
            }
            other => {
                if style == PathStyle::Windows {
                    if let Some(bad) = other
                        .chars()
                        .find(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*' | ':') || (*c as u32) < 0x20)
                    {
                        return Err(format!("path contains invalid character {:?}", bad));
                    }
                }
                parts.push(other);
            }
        }
    }

    Ok(format!("{}{}", prefix, parts.join(&sep.to_string())))
}

/// Split `C:\rest` or `\\server\share\rest` into (root prefix, rest).
fn split_windows_prefix(path: &str) -> Result<(String, String), String> {
    if let Some(unc) = path.strip_prefix("\\\\") {
        let mut it = unc.splitn(3, '\\');
        let server = it.next().unwrap_or_default();
        let share = it.next().unwrap_or_default();
        if server.is_empty() || share.is_empty() {
            return Err("UNC path must name a server and a share".to_string());
        }
        let rest = it.next().unwrap_or_default().to_string();
        return Ok((format!("\\\\{}\\{}\\", server, share), rest));
    }

    let mut chars = path.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(drive), Some(':'), Some('\\')) if drive.is_ascii_alphabetic() => Ok((
            format!("{}:\\", drive.to_ascii_uppercase()),
            path[3..].to_string(),
        )),
        _ => Err("path must be absolute".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn windows_validator() -> PathValidator {
        let env: HashMap<&str, &str> = [
            ("SystemDrive", "C:"),
            ("SystemRoot", "C:\\Windows"),
            ("ProgramFiles", "C:\\Program Files"),
            ("ProgramFiles(x86)", "C:\\Program Files (x86)"),
            ("ProgramData", "C:\\ProgramData"),
            ("USERPROFILE", "C:\\Users\\alice"),
        ]
        .into_iter()
        .collect();
        PathValidator::windows_from_env(|k| env.get(k).map(|v| v.to_string()))
    }

    fn unix_validator() -> PathValidator {
        PathValidator::unix_from_env(|k| (k == "HOME").then(|| "/home/alice".to_string()))
    }

    #[test]
    fn test_windows_system_directory_rejected() {
        let v = windows_validator().validate("C:\\Windows\\Foo");
        assert!(!v.valid);
        assert!(v.reason.contains("protected"), "reason: {}", v.reason);
    }

    #[test]
    fn test_windows_data_drive_accepted() {
        let v = windows_validator().validate("D:\\Backup");
        assert!(v.valid, "reason: {}", v.reason);
        assert_eq!(v.normalized, Some(PathBuf::from("D:\\Backup")));
    }

    #[test]
    fn test_relative_paths_rejected_on_both_styles() {
        assert!(!windows_validator().validate("Backup\\here").valid);
        assert!(!windows_validator().validate("C:Backup").valid);
        assert!(!windows_validator().validate("\\Backup").valid);
        assert!(!unix_validator().validate("backup/here").valid);

        let permissive = PathValidator::new(PathStyle::Unix, vec![], vec![], None);
        let v = permissive.validate("./backup");
        assert!(!v.valid);
        assert_eq!(v.reason, "path must be absolute");
    }

    #[test]
    fn test_empty_path_rejected_first() {
        let v = windows_validator().validate("   ");
        assert!(!v.valid);
        assert_eq!(v.reason, "path is empty");
    }

    #[test]
    fn test_windows_comparison_ignores_case_and_dot_segments() {
        let v = windows_validator();
        assert!(!v.validate("c:/program files/App").valid);
        assert!(!v.validate("D:\\data\\..\\..\\..\\Windows").valid);
        assert!(!v.validate("C:\\Data\\..\\WINDOWS\\System32").valid);
        assert!(v.validate("C:\\Windows2\\Backup").valid);
    }

    #[test]
    fn test_windows_invalid_characters_rejected() {
        let v = windows_validator().validate("D:\\Back|up");
        assert!(!v.valid);
        assert!(v.reason.contains("invalid character"));
        assert!(!windows_validator().validate("D:\\a:b").valid);
    }

    #[test]
    fn test_windows_profile_roots() {
        let v = windows_validator();
        assert!(!v.validate("C:\\Users\\alice").valid);
        assert!(v.validate("C:\\Users\\alice\\Backup").valid);
        assert!(!v.validate("C:\\Users\\Public\\Backup").valid);
        assert!(!v.validate("C:\\Users\\Default").valid);
    }

    #[test]
    fn test_windows_drive_roots() {
        let v = windows_validator();
        assert!(!v.validate("C:\\").valid);
        assert!(v.validate("E:\\").valid);
        assert!(v.validate("\\\\nas\\backups\\laptop").valid);
        assert!(!v.validate("\\\\nas").valid);
    }

    #[test]
    fn test_unix_rules() {
        let v = unix_validator();
        assert!(!v.validate("/").valid);
        assert!(!v.validate("/etc/hostmove").valid);
        assert!(!v.validate("/usr").valid);
        assert!(!v.validate("/home/alice/").valid);
        assert!(v.validate("/home/alice/backup").valid);
        assert!(v.validate("/mnt/external/backup").valid);
        assert!(!v.validate("/../etc").valid);
    }

    #[test]
    fn test_prefix_match_respects_component_boundaries() {
        let v = unix_validator();
        assert!(v.validate("/variety/backup").valid);
        assert!(!v.validate("/var/backup").valid);
    }
}
