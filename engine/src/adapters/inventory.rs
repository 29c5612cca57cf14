//! Installed-software inventory read from the Windows uninstall registry.

use regex::Regex;
use std::collections::BTreeSet;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use super::{AdapterOutcome, InventoryScanner};
use crate::model::InventoryEntry;

pub const UNINSTALL_KEYS: [&str; 3] = [
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Scans the uninstall keys with `reg query`.
#[derive(Debug, Clone)]
pub struct RegistryInventory {
    keys: Vec<String>,
}

impl Default for RegistryInventory {
    fn default() -> Self {
        RegistryInventory {
            keys: UNINSTALL_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl InventoryScanner for RegistryInventory {
    fn scan(&self) -> AdapterOutcome<Vec<InventoryEntry>> {
        if !cfg!(windows) {
            return AdapterOutcome::Failure("installed-software inventory needs the Windows registry".to_string());
        }

        let mut entries = BTreeSet::new();
        let mut unreadable = Vec::new();
        for key in &self.keys {
            match Command::new("reg")
                .args(["query", key.as_str(), "/s"])
                .stdin(Stdio::null())
                .output()
            {
                Ok(out) if out.status.success() => {
                    let found = parse_reg_query(&String::from_utf8_lossy(&out.stdout));
                    debug!("{}: {} entries", key, found.len());
                    entries.extend(found);
                }
                // HKCU\...\Uninstall often does not exist
                Ok(out) => {
                    debug!("reg query {} exited with {}", key, out.status);
                }
                Err(e) => {
                    warn!("Cannot query {}: {}", key, e);
                    unreadable.push(key.clone());
                }
            }
        }

        let entries: Vec<InventoryEntry> = entries.into_iter().collect();
        if unreadable.len() == self.keys.len() {
            AdapterOutcome::Failure("cannot run reg.exe".to_string())
        } else if !unreadable.is_empty() {
            AdapterOutcome::Warning(entries, format!("could not read {}", unreadable.join(", ")))
        } else {
            AdapterOutcome::Success(entries)
        }
    }
}

#[derive(Default)]
struct PartialEntry {
    name: Option<String>,
    version: Option<String>,
    publisher: Option<String>,
    install_date: Option<String>,
}

impl PartialEntry {
    fn take(&mut self) -> Option<InventoryEntry> {
        let partial = std::mem::take(self);
        partial.name.map(|name| InventoryEntry {
            name,
            version: partial.version,
            publisher: partial.publisher,
            install_date: partial.install_date,
        })
    }
}

/// Turn `reg query /s` output into entries; subkeys without a
/// `DisplayName` (updates, components) are dropped.
fn parse_reg_query(output: &str) -> Vec<InventoryEntry> {
    let value_line = match Regex::new(r"^\s+(.+?)\s{4}(REG_[A-Z_]+)(?:\s{4}(.*))?$") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let mut entries = Vec::new();
    let mut current = PartialEntry::default();
    for line in output.lines() {
        let line = line.trim_end();
        if line.starts_with("HKEY_") {
            entries.extend(current.take());
            continue;
        }
        let Some(caps) = value_line.captures(line) else {
            continue;
        };
        let data = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
        match &caps[1] {
            "DisplayName" => current.name = data,
            "DisplayVersion" => current.version = data,
            "Publisher" => current.publisher = data,
            "InstallDate" => current.install_date = data,
            _ => {}
        }
    }
    entries.extend(current.take());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\7-Zip
    DisplayName    REG_SZ    7-Zip 23.01 (x64)
    DisplayVersion    REG_SZ    23.01
    Publisher    REG_SZ    Igor Pavlov
    NoModify    REG_DWORD    0x1

HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\KB5034441
    ParentKeyName    REG_SZ    OperatingSystem

HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\{23170F69-40C1}
    DisplayName    REG_SZ    Git
    DisplayVersion    REG_SZ    2.44.0
    InstallDate    REG_SZ    20240312
    Comments    REG_SZ
";

    #[test]
    fn test_parse_reg_query() {
        let entries = parse_reg_query(SAMPLE);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "7-Zip 23.01 (x64)");
        assert_eq!(entries[0].version.as_deref(), Some("23.01"));
        assert_eq!(entries[0].publisher.as_deref(), Some("Igor Pavlov"));
        assert_eq!(entries[0].install_date, None);

        assert_eq!(entries[1].name, "Git");
        assert_eq!(entries[1].install_date.as_deref(), Some("20240312"));
        assert_eq!(entries[1].publisher, None);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_reg_query("").is_empty());
        assert!(parse_reg_query("ERROR: The system was unable to find the specified registry key").is_empty());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_scan_off_windows_fails() {
        assert!(RegistryInventory::default().scan().is_failure());
    }
}
