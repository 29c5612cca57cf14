//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Enumerating a directory tree under an exclusion policy
//! - Copying files with modification-time preservation
//! - Creating directories recursively
//! - Reading and atomically writing the JSON records a target carries

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::exclusions::ExclusionPolicy;
use crate::model::{CopyFailure, OverwritePolicy};

/// A file selected for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    /// Path relative to the copy root
    pub relative_path: PathBuf,
    pub file_size: u64,
}

/// Result of enumerating a source tree.
#[derive(Debug, Default)]
pub struct TreePlan {
    pub files: Vec<PlannedFile>,
    pub total_bytes: u64,
    pub excluded: u64,
    /// Entries that could not be enumerated; siblings are still listed
    pub failures: Vec<CopyFailure>,
}

/// Enumerate `source` and map every kept file to its place under
/// `destination_root`.
///
/// Each entry is checked against the policy by name: an excluded directory
/// drops its own subtree only, an excluded file drops only itself. Reparse
/// points and symlinks are not followed.
///
/// # Errors
/// Returns EngineError only if `source` itself cannot be read.
pub fn plan_tree(
    source: &Path,
    destination_root: &Path,
    policy: &ExclusionPolicy,
) -> Result<TreePlan, EngineError> {
    fs::read_dir(source).map_err(|e| EngineError::ReadError {
        path: source.to_path_buf(),
        source: e,
    })?;

    let mut plan = TreePlan::default();
    let mut excluded_dirs = 0u64;

    let walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir()
                && (policy.excludes_path(entry.path()) || policy.excludes_dir(&entry.file_name().to_string_lossy()))
            {
                debug!("Excluding directory {}", entry.path().display());
                excluded_dirs += 1;
                false
            } else {
                true
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
                plan.failures.push(CopyFailure {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if policy.excludes_file(&entry.file_name().to_string_lossy()) {
            plan.excluded += 1;
            continue;
        }

        let relative_path = match entry.path().strip_prefix(source) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };

        let file_size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                plan.failures.push(CopyFailure {
                    path: entry.path().to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        plan.total_bytes += file_size;
        plan.files.push(PlannedFile {
            source_path: entry.path().to_path_buf(),
            destination_path: destination_root.join(&relative_path),
            relative_path,
            file_size,
        });
    }

    plan.excluded += excluded_dirs;
    Ok(plan)
}

/// Determine whether to copy or skip a file based on overwrite policy.
pub fn should_copy_file(file: &PlannedFile, policy: OverwritePolicy) -> bool {
    let dest_meta = match fs::metadata(&file.destination_path) {
        Ok(meta) => meta,
        Err(_) => return true,
    };

    match policy {
        OverwritePolicy::Skip => false,
        OverwritePolicy::Overwrite => true,
        OverwritePolicy::SmartUpdate => {
            if dest_meta.len() != file.file_size {
                return true;
            }
            let src_mtime = fs::metadata(&file.source_path).and_then(|m| m.modified()).ok();
            let dst_mtime = dest_meta.modified().ok();
            match (src_mtime, dst_mtime) {
                (Some(src), Some(dst)) => src > dst,
                _ => true,
            }
        }
    }
}

/// Copy a file from source to destination with metadata preservation.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file.metadata().and_then(|m| m.modified()).ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    // Preserve modification time if available
    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Create `dir` (and parents) unless it already is a directory.
pub fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "Path exists but is not a directory"),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Serialize `value` as pretty JSON and move it into place, so a crash never
/// leaves a half-written record behind.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), EngineError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| EngineError::Serialization {
        path: path.to_path_buf(),
        source: e,
    })?;

    ensure_parent_dir_exists(path)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let write_error = |e| EngineError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    fs::write(&tmp, body).map_err(write_error)?;
    fs::rename(&tmp, path).map_err(write_error)
}

/// Read a JSON record. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, EngineError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(EngineError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| EngineError::Serialization {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Files directly inside `dir`, sorted by name. Empty if `dir` is missing.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[test]
    fn test_plan_nested_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let subdir = src.join("subdir");
        fs::create_dir_all(&subdir).expect("Failed to create subdir");

        fs::write(src.join("file1.txt"), b"data1").unwrap();
        fs::write(subdir.join("file2.txt"), b"data22").unwrap();

        let dst = temp_dir.path().join("dst");
        let plan = plan_tree(&src, &dst, &ExclusionPolicy::empty()).expect("Failed to plan");

        assert_eq!(plan.files.len(), 2);
        assert_eq!(plan.total_bytes, 11);
        let nested = plan
            .files
            .iter()
            .find(|f| f.relative_path == Path::new("subdir").join("file2.txt"))
            .expect("nested file planned");
        assert_eq!(nested.destination_path, dst.join("subdir").join("file2.txt"));
    }

    #[test]
    fn test_plan_applies_exclusions_per_entry() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("profile");
        fs::create_dir_all(src.join("OneDrive - Contoso")).unwrap();
        fs::create_dir_all(src.join("Documents")).unwrap();
        fs::write(src.join("OneDrive - Contoso").join("big.bin"), b"x").unwrap();
        fs::write(src.join("Documents").join("notes.txt"), b"keep").unwrap();
        fs::write(src.join("Documents").join("scratch.tmp"), b"drop").unwrap();
        fs::write(src.join("Documents").join("Thumbs.db"), b"drop").unwrap();
        fs::write(src.join("Documents").join("zz-last.txt"), b"keep").unwrap();

        let plan = plan_tree(&src, temp_dir.path(), &ExclusionPolicy::default()).unwrap();

        let mut names: Vec<String> = plan
            .files
            .iter()
            .map(|f| f.source_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["notes.txt", "zz-last.txt"]);
        assert_eq!(plan.excluded, 3);
    }

    #[test]
    fn test_plan_prunes_excluded_path_only() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("profile");
        fs::create_dir_all(src.join("Backups")).unwrap();
        fs::create_dir_all(src.join("Documents").join("Backups")).unwrap();
        fs::write(src.join("Backups").join("backup-progress.json"), b"{}").unwrap();
        fs::write(src.join("Documents").join("Backups").join("thesis.docx"), b"keep").unwrap();

        let policy = ExclusionPolicy::empty().with_excluded_path(src.join("Backups"));
        let plan = plan_tree(&src, temp_dir.path(), &policy).unwrap();

        assert_eq!(plan.files.len(), 1);
        assert_eq!(
            plan.files[0].source_path,
            src.join("Documents").join("Backups").join("thesis.docx")
        );
    }

    #[test]
    fn test_plan_nonexistent_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = plan_tree(
            &temp_dir.path().join("nonexistent"),
            temp_dir.path(),
            &ExclusionPolicy::empty(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_copy_file_with_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("nested").join("dest.txt");

        let mut file = fs::File::create(&src_file).expect("Failed to create source");
        file.write_all(b"test content").expect("Failed to write source");
        drop(file);
        let old = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src_file, old).unwrap();

        let bytes = copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");
        assert_eq!(bytes, 12);
        assert_eq!(fs::read_to_string(&dst_file).unwrap(), "test content");

        let copied = filetime::FileTime::from_last_modification_time(&fs::metadata(&dst_file).unwrap());
        assert_eq!(copied.unix_seconds(), old.unix_seconds());
    }

    #[test]
    fn test_should_copy_respects_policy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("b.txt");
        fs::write(&src, b"same").unwrap();

        let planned = PlannedFile {
            source_path: src.clone(),
            destination_path: dst.clone(),
            relative_path: PathBuf::from("a.txt"),
            file_size: 4,
        };
        assert!(should_copy_file(&planned, OverwritePolicy::Skip), "missing destination is copied");

        copy_file_with_metadata(&src, &dst).unwrap();
        assert!(!should_copy_file(&planned, OverwritePolicy::Skip));
        assert!(should_copy_file(&planned, OverwritePolicy::Overwrite));
        assert!(!should_copy_file(&planned, OverwritePolicy::SmartUpdate));

        fs::write(&dst, b"different size").unwrap();
        assert!(should_copy_file(&planned, OverwritePolicy::SmartUpdate));
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("subdir").join("file.txt");
        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(path.parent().unwrap().is_dir());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_helpers() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("record.json");

        assert!(read_json::<Sample>(&path).unwrap().is_none());

        let value = Sample {
            name: "ledger".to_string(),
            count: 3,
        };
        write_json_atomic(&path, &value).unwrap();
        assert_eq!(read_json::<Sample>(&path).unwrap(), Some(value));
        assert!(!temp_dir.path().join("record.json.tmp").exists());

        fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            read_json::<Sample>(&path),
            Err(EngineError::Serialization { .. })
        ));

        remove_if_exists(&path).unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
