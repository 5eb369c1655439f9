//! Shell command collaborator
//!
//! Process control operations (`kill`, `renice`), PID discovery (`ps`) and the
//! signal-name probe (`kill -l`) all go through a [`ShellRunner`]. The trait
//! exists so tests can substitute a scripted runner; production code uses
//! [`SystemShell`].

use std::io;
use std::process::{Command, Stdio};

use nix::unistd::Uid;

/// Captured result of one shell command
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Captured stdout, one entry per line, trailing whitespace trimmed
    pub lines: Vec<String>,
    /// Exit status of the command
    pub status: i32,
}

impl ShellOutput {
    /// Last output line, or the empty string when there was no output
    pub fn last_line(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// Whether the command reported success
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs a command line synchronously and captures its output.
pub trait ShellRunner {
    /// Execute `command` and collect stdout lines plus the exit status.
    ///
    /// A non-zero exit status is not an error at this layer; callers decide
    /// whether to reject it.
    fn run(&self, command: &str) -> io::Result<ShellOutput>;
}

/// [`ShellRunner`] backed by `sh -c`. Stderr passes through to the caller's
/// stderr, only stdout is captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl ShellRunner for SystemShell {
    fn run(&self, command: &str) -> io::Result<ShellOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stderr(Stdio::inherit())
            .output()?;
        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim_end().to_owned())
            .collect();
        Ok(ShellOutput {
            lines,
            status: output.status.code().unwrap_or(-1),
        })
    }
}

/// Prefix `command` with a non-interactive privilege elevation wrapper, unless
/// the effective user is already root.
pub fn elevated(command: &str) -> String {
    elevate_for(command, Uid::effective().is_root())
}

fn elevate_for(command: &str, is_root: bool) -> String {
    if is_root {
        command.to_owned()
    } else {
        format!("sudo -n -u root -- {command}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_lines_and_status() {
        let out = SystemShell.run("printf 'a\\nb\\n'").unwrap();
        assert_eq!(out.lines, vec!["a", "b"]);
        assert_eq!(out.last_line(), "b");
        assert!(out.success());
    }

    #[test]
    fn test_run_reports_nonzero_status() {
        let out = SystemShell.run("exit 3").unwrap();
        assert_eq!(out.status, 3);
        assert!(!out.success());
        assert_eq!(out.last_line(), "");
    }

    #[test]
    fn test_elevation_wrapper() {
        assert_eq!(elevate_for("kill 42", true), "kill 42");
        assert_eq!(elevate_for("kill 42", false), "sudo -n -u root -- kill 42");
    }
}
