// Capabilities
// Probes which interpreters and tools are available on this machine

use crate::runners::process::{run_process, ProcessSpec};

use std::path::PathBuf;

/// Locate the first available executable among the candidates
pub fn find_executable(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
}

pub fn find_shell() -> Option<PathBuf> {
    find_executable(&["sh"])
}

pub fn find_batch() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        find_executable(&["cmd"])
    } else {
        None
    }
}

/// Windows PowerShell first, then PowerShell Core
pub fn find_powershell() -> Option<PathBuf> {
    find_executable(&["powershell", "pwsh"])
}

pub fn find_python() -> Option<PathBuf> {
    find_executable(&["python", "python3"])
}

/// Whether `docker -v` runs successfully
pub async fn has_docker() -> bool {
    if which::which("docker").is_err() {
        return false;
    }
    run_process(&ProcessSpec::new("docker").arg("-v"), None)
        .await
        .success()
}

/// Snapshot of what this machine can run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub os: String,
    pub arch: String,
    pub shell: Option<PathBuf>,
    pub batch: Option<PathBuf>,
    pub powershell: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub docker: bool,
}

impl Capabilities {
    pub async fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            shell: find_shell(),
            batch: find_batch(),
            powershell: find_powershell(),
            python: find_python(),
            docker: has_docker().await,
        }
    }

    pub fn has_shell(&self) -> bool {
        self.shell.is_some()
    }

    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }

    pub fn has_powershell(&self) -> bool {
        self.powershell.is_some()
    }

    pub fn has_python(&self) -> bool {
        self.python.is_some()
    }

    pub fn has_docker(&self) -> bool {
        self.docker
    }

    /// Printable rows, one per capability
    pub fn lines(&self) -> Vec<String> {
        let tool = |path: &Option<PathBuf>| match path {
            Some(path) => format!("yes ({})", path.display()),
            None => "no".to_string(),
        };

        vec![
            format!("{:<20} {} ({})", "os", self.os, self.arch),
            format!("{:<20} {}", "shell", tool(&self.shell)),
            format!("{:<20} {}", "batch", tool(&self.batch)),
            format!("{:<20} {}", "powershell", tool(&self.powershell)),
            format!("{:<20} {}", "python", tool(&self.python)),
            format!(
                "{:<20} {}",
                "docker",
                if self.docker { "yes" } else { "no" }
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_layout() {
        let capabilities = Capabilities {
            os: "linux".into(),
            arch: "x86_64".into(),
            shell: Some(PathBuf::from("/bin/sh")),
            batch: None,
            powershell: None,
            python: None,
            docker: false,
        };

        let lines = capabilities.lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], format!("{:<20} linux (x86_64)", "os"));
        assert_eq!(lines[1], format!("{:<20} yes (/bin/sh)", "shell"));
        assert_eq!(lines[5], format!("{:<20} no", "docker"));
    }

    #[test]
    fn test_find_executable_skips_missing() {
        assert!(find_executable(&["definitely-not-a-real-program-xyz"]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detect_finds_shell() {
        let capabilities = Capabilities::detect().await;
        assert!(capabilities.has_shell());
        assert_eq!(capabilities.os, std::env::consts::OS);
    }
}
