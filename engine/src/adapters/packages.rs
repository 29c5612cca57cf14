//! Package-manager collaborators backed by the tools' own CLIs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

use super::{AdapterOutcome, PackageManager};
use crate::model::PackageTool;

const WINGET_REGISTER: &str =
    "Add-AppxPackage -RegisterByFamilyName -MainPackage Microsoft.DesktopAppInstaller_8wekyb3d8bbwe";
const CHOCOLATEY_INSTALL: &str = "Set-ExecutionPolicy Bypass -Scope Process -Force; \
     [System.Net.ServicePointManager]::SecurityProtocol = 3072; \
     iex ((New-Object System.Net.WebClient).DownloadString('https://community.chocolatey.org/install.ps1'))";
const SCOOP_INSTALL: &str = "Set-ExecutionPolicy RemoteSigned -Scope CurrentUser -Force; irm get.scoop.sh | iex";

/// How a tool's CLI is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launcher {
    /// An executable on PATH
    Direct(&'static str),
    /// A PowerShell function/script (scoop)
    PowerShell(&'static str),
}

/// Runs winget / choco / scoop as child processes.
#[derive(Debug, Clone)]
pub struct CommandPackageManager {
    tool: PackageTool,
}

impl CommandPackageManager {
    pub fn new(tool: PackageTool) -> Self {
        CommandPackageManager { tool }
    }

    fn launcher(&self) -> Launcher {
        match self.tool {
            PackageTool::Winget => Launcher::Direct("winget"),
            PackageTool::Chocolatey => Launcher::Direct("choco"),
            PackageTool::Scoop => Launcher::PowerShell("scoop"),
        }
    }

    fn build(&self, args: &[String]) -> Command {
        match self.launcher() {
            Launcher::Direct(program) => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Launcher::PowerShell(function) => {
                let mut script = function.to_string();
                for arg in args {
                    script.push(' ');
                    script.push_str(&powershell_quote(arg));
                }
                powershell(&script)
            }
        }
    }

    fn run(&self, args: &[String]) -> io::Result<Output> {
        let mut cmd = self.build(args);
        debug!("Running {:?}", cmd);
        cmd.stdin(Stdio::null()).output()
    }
}

impl PackageManager for CommandPackageManager {
    fn tool(&self) -> PackageTool {
        self.tool
    }

    fn is_installed(&self) -> bool {
        matches!(self.run(&["--version".to_string()]), Ok(out) if out.status.success())
    }

    fn install(&self) -> AdapterOutcome<()> {
        let script = match self.tool {
            PackageTool::Winget => WINGET_REGISTER,
            PackageTool::Chocolatey => CHOCOLATEY_INSTALL,
            PackageTool::Scoop => SCOOP_INSTALL,
        };
        info!("Installing {}", self.tool);
        match powershell(script).stdin(Stdio::null()).output() {
            Ok(out) if out.status.success() => AdapterOutcome::Success(()),
            Ok(out) => AdapterOutcome::Failure(format!(
                "{} installer exited with {}: {}",
                self.tool,
                out.status,
                tail(&out.stderr)
            )),
            Err(e) => AdapterOutcome::Failure(format!("cannot start PowerShell: {}", e)),
        }
    }

    fn export(&self, dir: &Path) -> AdapterOutcome<PathBuf> {
        if let Err(e) = fs::create_dir_all(dir) {
            return AdapterOutcome::Failure(format!("cannot create {}: {}", dir.display(), e));
        }
        let file = dir.join(self.tool.export_file_name());
        let output = match self.run(&export_args(self.tool, &file)) {
            Ok(out) => out,
            Err(e) => return AdapterOutcome::Failure(format!("cannot run {}: {}", self.tool, e)),
        };

        // scoop prints its export instead of writing a file
        if self.tool == PackageTool::Scoop && output.status.success() {
            if let Err(e) = fs::write(&file, &output.stdout) {
                return AdapterOutcome::Failure(format!("cannot write {}: {}", file.display(), e));
            }
        }

        let written = fs::metadata(&file).map(|m| m.len() > 0).unwrap_or(false);
        match (output.status.success(), written) {
            (true, true) => AdapterOutcome::Success(file),
            (false, true) => AdapterOutcome::Warning(
                file,
                format!("{} export exited with {}; the list may be incomplete", self.tool, output.status),
            ),
            (_, false) => AdapterOutcome::Failure(format!(
                "{} export produced no file ({}): {}",
                self.tool,
                output.status,
                tail(&output.stderr)
            )),
        }
    }

    fn import(&self, file: &Path) -> AdapterOutcome<()> {
        match self.run(&import_args(self.tool, file)) {
            Ok(out) if out.status.success() => AdapterOutcome::Success(()),
            Ok(out) => AdapterOutcome::Warning(
                (),
                format!(
                    "{} import exited with {}; some packages may not have installed",
                    self.tool, out.status
                ),
            ),
            Err(e) => AdapterOutcome::Failure(format!("cannot run {}: {}", self.tool, e)),
        }
    }
}

fn export_args(tool: PackageTool, file: &Path) -> Vec<String> {
    let file = file.display().to_string();
    match tool {
        PackageTool::Winget => vec![
            "export".into(),
            "-o".into(),
            file,
            "--accept-source-agreements".into(),
        ],
        PackageTool::Chocolatey => vec!["export".into(), file, "--include-version-numbers".into()],
        PackageTool::Scoop => vec!["export".into()],
    }
}

fn import_args(tool: PackageTool, file: &Path) -> Vec<String> {
    let file = file.display().to_string();
    match tool {
        PackageTool::Winget => vec![
            "import".into(),
            "-i".into(),
            file,
            "--accept-package-agreements".into(),
            "--accept-source-agreements".into(),
            "--ignore-unavailable".into(),
        ],
        PackageTool::Chocolatey => vec!["install".into(), file, "-y".into()],
        PackageTool::Scoop => vec!["import".into(), file],
    }
}

pub(crate) fn powershell(script: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script]);
    cmd
}

/// Single-quoted PowerShell literal.
fn powershell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "''"))
}

/// Last line of a tool's diagnostic output.
pub(crate) fn tail(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_arguments() {
        let file = Path::new("PackageManagers").join("winget-packages.json");
        let args = export_args(PackageTool::Winget, &file);
        assert_eq!(args[0], "export");
        assert_eq!(args[1], "-o");
        assert!(args[2].ends_with("winget-packages.json"));

        assert_eq!(export_args(PackageTool::Scoop, &file), vec!["export".to_string()]);
    }

    #[test]
    fn test_import_arguments() {
        let file = Path::new("chocolatey-packages.config");
        assert_eq!(
            import_args(PackageTool::Chocolatey, file),
            vec!["install", "chocolatey-packages.config", "-y"]
        );
        assert!(import_args(PackageTool::Winget, file).contains(&"--ignore-unavailable".to_string()));
    }

    #[test]
    fn test_scoop_goes_through_powershell() {
        let pm = CommandPackageManager::new(PackageTool::Scoop);
        assert_eq!(pm.launcher(), Launcher::PowerShell("scoop"));
        let cmd = pm.build(&["import".to_string(), "D:\\It's here\\scoop.json".to_string()]);
        assert_eq!(cmd.get_program(), "powershell");
        let script = cmd.get_args().last().unwrap().to_string_lossy().into_owned();
        assert_eq!(script, "scoop 'import' 'D:\\It''s here\\scoop.json'");
    }

    #[test]
    fn test_tail_picks_last_non_empty_line() {
        assert_eq!(tail(b"first\nerror: no such package\n\n"), "error: no such package");
        assert_eq!(tail(b""), "");
    }
}
