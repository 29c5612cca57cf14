//! Checksum computation and the target's checksum store.
//!
//! This module provides:
//! - Checksum algorithms (MD5, SHA-256, BLAKE3) behind one hasher trait
//! - File-level checksum computation
//! - `ChecksumStore`: persisting digests of a target's high-value files to
//!   `checksums.json` and verifying them before a restore
//!
//! Only package exports and the inventory are recorded. The user-data tree is
//! exempt: hashing it costs as much as copying it twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::fs_ops;
use crate::layout::BackupLayout;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (what existing backups carry; fine for corruption detection)
    #[default]
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    /// Create a new checksum value
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    /// Get the algorithm
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Get the hex string representation
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Compare against a stored hex digest (case-insensitive).
    pub fn matches(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Trait for computing checksums
pub trait ChecksumHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the checksum value
    fn finalize(self: Box<Self>) -> ChecksumValue;
}

/// MD5 hasher (backed by md5 crate)
struct Md5Hasher {
    context: md5::Context,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.context.compute();
        ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", digest))
    }
}

/// SHA-256 hasher (backed by sha2 crate)
struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        use sha2::Digest;
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Sha256, format!("{:x}", digest))
    }
}

/// BLAKE3 hasher (backed by blake3 crate)
struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Blake3, digest.to_hex().to_string())
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher {
            context: md5::Context::new(),
        }),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let read_error = |e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_error)?;
    let mut hasher = create_hasher(algorithm);
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match file.read(&mut buffer).map_err(read_error)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(hasher.finalize())
}

/// Persisted digests of a target's high-value files (`checksums.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub algorithm: ChecksumAlgorithm,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    /// Target-relative path (forward slashes) to hex digest
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl ChecksumRecord {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        ChecksumRecord {
            algorithm,
            generated_at: Some(Utc::now()),
            files: BTreeMap::new(),
        }
    }

    /// A record with no entries carries no verification data.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Why a recorded file failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityErrorKind {
    Missing,
    Corrupted,
}

impl fmt::Display for IntegrityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityErrorKind::Missing => write!(f, "missing"),
            IntegrityErrorKind::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// One failed entry of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityError {
    pub path: String,
    pub kind: IntegrityErrorKind,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path)
    }
}

/// Overall verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    Failed,
    /// No checksum data was saved; nothing could be checked
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub verified: bool,
    pub files_checked: usize,
    pub errors: Vec<IntegrityError>,
}

impl VerificationReport {
    pub fn status(&self) -> VerificationStatus {
        if self.verified {
            VerificationStatus::Verified
        } else if self.files_checked == 0 && self.errors.is_empty() {
            VerificationStatus::NoData
        } else {
            VerificationStatus::Failed
        }
    }
}

/// Computes, saves, loads and verifies checksum records of a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumStore {
    algorithm: ChecksumAlgorithm,
}

impl ChecksumStore {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        ChecksumStore { algorithm }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Checksum of one file; None if it cannot be read.
    pub fn checksum(&self, path: &Path) -> Option<ChecksumValue> {
        match compute_file_checksum(path, self.algorithm) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Cannot checksum {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Hash the given target-relative files into a new record. Files that
    /// cannot be read are left out and reported back.
    pub fn record_files(&self, target: &Path, relative_paths: &[String]) -> (ChecksumRecord, Vec<String>) {
        let layout = BackupLayout::new(target);
        let mut record = ChecksumRecord::new(self.algorithm);
        let mut unreadable = Vec::new();

        for rel in relative_paths {
            match layout.resolve(rel).and_then(|path| self.checksum(&path)) {
                Some(value) => {
                    record.files.insert(rel.clone(), value.hex().to_string());
                }
                None => unreadable.push(rel.clone()),
            }
        }

        (record, unreadable)
    }

    /// Write the record, replacing any previous one.
    pub fn save(&self, target: &Path, record: &ChecksumRecord) -> Result<(), EngineError> {
        fs_ops::write_json_atomic(&BackupLayout::new(target).checksums(), record)
    }

    /// Load the saved record; an empty record if absent or corrupt.
    pub fn load(&self, target: &Path) -> ChecksumRecord {
        let path = BackupLayout::new(target).checksums();
        match fs_ops::read_json::<ChecksumRecord>(&path) {
            Ok(Some(record)) => record,
            Ok(None) => ChecksumRecord::new(self.algorithm),
            Err(e) => {
                warn!("Ignoring unreadable checksum file {}: {}", path.display(), e);
                ChecksumRecord::new(self.algorithm)
            }
        }
    }

    /// Re-hash every recorded file and compare. Uses the algorithm the record
    /// was written with.
    pub fn verify(&self, target: &Path) -> VerificationReport {
        let record = self.load(target);
        let layout = BackupLayout::new(target);
        let hasher = ChecksumStore::new(record.algorithm);
        let mut errors = Vec::new();

        for (rel, expected) in &record.files {
            let kind = match layout.resolve(rel) {
                Some(path) if path.is_file() => match hasher.checksum(&path) {
                    Some(actual) if actual.matches(expected) => None,
                    _ => Some(IntegrityErrorKind::Corrupted),
                },
                _ => Some(IntegrityErrorKind::Missing),
            };

            if let Some(kind) = kind {
                warn!("Integrity check: {} {}", rel, kind);
                errors.push(IntegrityError {
                    path: rel.clone(),
                    kind,
                });
            }
        }

        VerificationReport {
            verified: !record.is_empty() && errors.is_empty(),
            files_checked: record.files.len(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn hash_bytes(algorithm: ChecksumAlgorithm, data: &[u8]) -> ChecksumValue {
        let mut hasher = create_hasher(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    fn seeded_target() -> (tempfile::TempDir, Vec<String>) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let packages = temp_dir.path().join("PackageManagers");
        fs::create_dir_all(&packages).unwrap();
        fs::write(packages.join("winget-packages.json"), b"{\"Sources\":[]}").unwrap();
        fs::write(packages.join("scoop-packages.json"), b"{\"apps\":[]}").unwrap();
        fs::write(temp_dir.path().join("inventory.json"), b"[]").unwrap();
        let files = vec![
            "PackageManagers/winget-packages.json".to_string(),
            "PackageManagers/scoop-packages.json".to_string(),
            "inventory.json".to_string(),
        ];
        (temp_dir, files)
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            hash_bytes(ChecksumAlgorithm::Md5, b"hello").hex(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            hash_bytes(ChecksumAlgorithm::Sha256, b"hello").hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let b3 = hash_bytes(ChecksumAlgorithm::Blake3, b"hello");
        assert_eq!(b3.algorithm(), ChecksumAlgorithm::Blake3);
        assert_eq!(b3.hex().len(), 64);
    }

    #[test]
    fn test_checksum_of_missing_file_is_none() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ChecksumStore::default();
        assert!(store.checksum(&temp_dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_round_trip_verifies() {
        let (temp_dir, files) = seeded_target();
        let store = ChecksumStore::new(ChecksumAlgorithm::Md5);

        let (record, unreadable) = store.record_files(temp_dir.path(), &files);
        assert!(unreadable.is_empty());
        store.save(temp_dir.path(), &record).expect("save");

        let loaded = store.load(temp_dir.path());
        assert_eq!(loaded.files, record.files);

        let report = store.verify(temp_dir.path());
        assert!(report.verified);
        assert_eq!(report.files_checked, 3);
        assert!(report.errors.is_empty());
        assert_eq!(report.status(), VerificationStatus::Verified);
    }

    #[test]
    fn test_single_byte_change_reports_corrupted() {
        let (temp_dir, files) = seeded_target();
        let store = ChecksumStore::new(ChecksumAlgorithm::Sha256);
        let (record, _) = store.record_files(temp_dir.path(), &files);
        store.save(temp_dir.path(), &record).unwrap();

        let target = temp_dir.path().join("PackageManagers/scoop-packages.json");
        let mut bytes = fs::read(&target).unwrap();
        bytes[0] ^= 0x01;
        fs::write(&target, bytes).unwrap();

        let report = store.verify(temp_dir.path());
        assert!(!report.verified);
        assert_eq!(report.files_checked, 3);
        assert_eq!(
            report.errors,
            vec![IntegrityError {
                path: "PackageManagers/scoop-packages.json".to_string(),
                kind: IntegrityErrorKind::Corrupted,
            }]
        );
        assert_eq!(report.status(), VerificationStatus::Failed);
    }

    #[test]
    fn test_deleted_file_reports_missing() {
        let (temp_dir, files) = seeded_target();
        let store = ChecksumStore::default();
        let (record, _) = store.record_files(temp_dir.path(), &files);
        store.save(temp_dir.path(), &record).unwrap();

        fs::remove_file(temp_dir.path().join("inventory.json")).unwrap();

        let report = store.verify(temp_dir.path());
        assert!(!report.verified);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IntegrityErrorKind::Missing);
        assert_eq!(report.errors[0].to_string(), "missing: inventory.json");
    }

    #[test]
    fn test_entries_outside_target_report_missing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let target = temp_dir.path().join("backup");
        fs::create_dir_all(&target).unwrap();
        let outside = temp_dir.path().join("outside.txt");
        fs::write(&outside, b"not part of the backup").unwrap();

        let store = ChecksumStore::default();
        let digest = store.checksum(&outside).expect("readable").hex().to_string();
        let mut record = ChecksumRecord::new(ChecksumAlgorithm::Md5);
        record.files.insert("../outside.txt".to_string(), digest);
        store.save(&target, &record).unwrap();

        let report = store.verify(&target);
        assert_eq!(
            report.errors,
            vec![IntegrityError {
                path: "../outside.txt".to_string(),
                kind: IntegrityErrorKind::Missing,
            }]
        );
    }

    #[test]
    fn test_no_saved_record_is_no_data() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let report = ChecksumStore::default().verify(temp_dir.path());
        assert!(!report.verified);
        assert_eq!(report.files_checked, 0);
        assert_eq!(report.status(), VerificationStatus::NoData);
    }

    #[test]
    fn test_corrupt_checksum_file_loads_empty() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("checksums.json"), b"{ not json").unwrap();
        let store = ChecksumStore::default();
        assert!(store.load(temp_dir.path()).is_empty());
        assert_eq!(store.verify(temp_dir.path()).status(), VerificationStatus::NoData);
    }

    #[test]
    fn test_verify_uses_recorded_algorithm() {
        let (temp_dir, files) = seeded_target();
        let (record, _) = ChecksumStore::new(ChecksumAlgorithm::Blake3).record_files(temp_dir.path(), &files);
        ChecksumStore::default().save(temp_dir.path(), &record).unwrap();

        let report = ChecksumStore::new(ChecksumAlgorithm::Md5).verify(temp_dir.path());
        assert!(report.verified);
    }

    #[test]
    fn test_record_files_reports_unreadable() {
        let (temp_dir, mut files) = seeded_target();
        files.push("PackageManagers/chocolatey-packages.config".to_string());
        let (record, unreadable) = ChecksumStore::default().record_files(temp_dir.path(), &files);
        assert_eq!(record.files.len(), 3);
        assert_eq!(unreadable, vec!["PackageManagers/chocolatey-packages.config".to_string()]);
    }
}
