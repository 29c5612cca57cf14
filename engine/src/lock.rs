//! Exclusive lock on a target directory.
//!
//! Two processes working on the same target would interleave ledger writes.
//! The lock file is created with `create_new`, so only one holder can exist;
//! it is removed when the guard drops. An exit that skips destructors calls
//! [`TargetLock::release_owned`] instead. A crash leaves it behind, which the
//! operator clears explicitly (`break_stale` / `--break-lock`).

use chrono::Utc;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::layout::BackupLayout;
use crate::model::HostIdentity;

#[derive(Debug)]
pub struct TargetLock {
    path: PathBuf,
}

impl TargetLock {
    /// Take the lock for `target`, which must already exist.
    pub fn acquire(target: &Path, break_stale: bool) -> Result<TargetLock, EngineError> {
        let path = BackupLayout::new(target).lock();

        if break_stale && path.exists() {
            warn!("Breaking existing lock {}", path.display());
            let _ = fs::remove_file(&path);
        }

        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let host = HostIdentity::current();
                let _ = writeln!(
                    file,
                    "pid={} host={} started={}",
                    std::process::id(),
                    host,
                    Utc::now().to_rfc3339()
                );
                debug!("Acquired lock {}", path.display());
                Ok(TargetLock { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(EngineError::TargetLocked { path }),
            Err(e) => Err(EngineError::WriteError { path, source: e }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock of `target` if this process wrote it. Returns whether
    /// a lock was removed.
    pub fn release_owned(target: &Path) -> io::Result<bool> {
        let path = BackupLayout::new(target).lock();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let owner = format!("pid={}", std::process::id());
        if content.split_whitespace().next() != Some(owner.as_str()) {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        debug!("Released lock {}", path.display());
        Ok(true)
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to release lock {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = TargetLock::acquire(temp_dir.path(), false).expect("first lock");
        assert!(first.path().exists());

        let second = TargetLock::acquire(temp_dir.path(), false);
        assert!(matches!(second, Err(EngineError::TargetLocked { .. })));

        drop(first);
        assert!(!temp_dir.path().join(".hostmove.lock").exists());
        TargetLock::acquire(temp_dir.path(), false).expect("lock after release");
    }

    #[test]
    fn test_release_owned_after_skipped_drop() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let lock = TargetLock::acquire(temp_dir.path(), false).expect("lock");
        std::mem::forget(lock);

        assert!(TargetLock::release_owned(temp_dir.path()).unwrap());
        assert!(!temp_dir.path().join(".hostmove.lock").exists());
        assert!(!TargetLock::release_owned(temp_dir.path()).unwrap());
        TargetLock::acquire(temp_dir.path(), false).expect("lock after release");
    }

    #[test]
    fn test_release_owned_leaves_foreign_lock() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join(".hostmove.lock");
        fs::write(&path, b"pid=0 host=OTHER-PC\\bob started=2026-01-01T00:00:00Z").unwrap();

        assert!(!TargetLock::release_owned(temp_dir.path()).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_break_stale_lock() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join(".hostmove.lock"), b"pid=1").unwrap();

        assert!(TargetLock::acquire(temp_dir.path(), false).is_err());
        let lock = TargetLock::acquire(temp_dir.path(), true).expect("stale lock broken");
        let content = fs::read_to_string(lock.path()).unwrap();
        assert!(content.starts_with(&format!("pid={}", std::process::id())));
    }
}
