//! Directory layout of a backup target.

use std::path::{Component, Path, PathBuf};

use crate::model::PackageTool;

pub const PACKAGES_DIR: &str = "PackageManagers";
pub const USER_DATA_DIR: &str = "UserData";
pub const USERS_DIR: &str = "Users";
pub const MANIFEST_FILE: &str = "backup-manifest.json";
pub const LEDGER_FILE: &str = "backup-progress.json";
pub const CHECKSUMS_FILE: &str = "checksums.json";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const LOG_FILE: &str = "migration.log";
pub const LOCK_FILE: &str = ".hostmove.lock";

/// Paths of everything the engine writes under a target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLayout {
    root: PathBuf,
}

impl BackupLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        BackupLayout {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIR)
    }

    pub fn package_export(&self, tool: PackageTool) -> PathBuf {
        self.packages_dir().join(tool.export_file_name())
    }

    /// `UserData/Users`, the parent of one subtree per profile.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join(USER_DATA_DIR).join(USERS_DIR)
    }

    pub fn user_dir(&self, user: &str) -> PathBuf {
        self.users_dir().join(user)
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn checksums(&self) -> PathBuf {
        self.root.join(CHECKSUMS_FILE)
    }

    pub fn inventory(&self) -> PathBuf {
        self.root.join(INVENTORY_FILE)
    }

    pub fn log(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn lock(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Target-relative form of `path` with forward slashes, as stored in
    /// `checksums.json`. None if `path` is outside the target.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Inverse of [`BackupLayout::relative`]. None for anything that would
    /// leave the root: absolute paths, drive prefixes, `.` or `..` segments.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        if relative.starts_with('/') {
            return None;
        }
        let mut path = self.root.clone();
        for part in relative.split('/').filter(|part| !part.is_empty()) {
            let plain = Path::new(part)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return None;
            }
            path.push(part);
        }
        (path != self.root).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = BackupLayout::new("/backups/laptop");
        assert_eq!(
            layout.package_export(PackageTool::Scoop),
            Path::new("/backups/laptop/PackageManagers/scoop-packages.json")
        );
        assert_eq!(
            layout.user_dir("alice"),
            Path::new("/backups/laptop/UserData/Users/alice")
        );
        assert_eq!(layout.ledger(), Path::new("/backups/laptop/backup-progress.json"));
    }

    #[test]
    fn test_relative_round_trip() {
        let layout = BackupLayout::new("/backups/laptop");
        let export = layout.package_export(PackageTool::Winget);
        let rel = layout.relative(&export).unwrap();
        assert_eq!(rel, "PackageManagers/winget-packages.json");
        assert_eq!(layout.resolve(&rel), Some(export));
    }

    #[test]
    fn test_relative_outside_root() {
        let layout = BackupLayout::new("/backups/laptop");
        assert_eq!(layout.relative(Path::new("/elsewhere/file")), None);
        assert_eq!(layout.relative(Path::new("/backups/laptop")), None);
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let layout = BackupLayout::new("/backups/laptop");
        assert_eq!(
            layout.resolve("UserData//Users/alice/notes.txt"),
            Some(PathBuf::from("/backups/laptop/UserData/Users/alice/notes.txt"))
        );
        assert_eq!(layout.resolve("../secrets.txt"), None);
        assert_eq!(layout.resolve("UserData/../../secrets.txt"), None);
        assert_eq!(layout.resolve("./inventory.json"), None);
        assert_eq!(layout.resolve("/etc/passwd"), None);
        assert_eq!(layout.resolve(""), None);
    }
}
