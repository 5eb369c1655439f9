//! Bulk process control
//!
//! Stateless operations over sets of processes: batched kill, recursive kill
//! over discovered descendants, and priority adjustment. These go through the
//! shell collaborator rather than the handles themselves, so they never touch
//! a [`crate::Process`]'s internal state, only the external OS process.

use tracing::debug;

use crate::error::{ProcessError, Result};
use crate::pids::{self, PidSelector};
use crate::shell::{self, ShellOutput, ShellRunner, SystemShell};
use crate::signal::{resolve, SignalSpec};

/// Bulk operations over one or more processes.
///
/// Commands are run through the privilege elevation wrapper by default,
/// matching the helper tools' root requirements; disable it with
/// [`ProcessControl::elevated`] when operating on the caller's own processes.
pub struct ProcessControl<R: ShellRunner = SystemShell> {
    shell: R,
    elevate: bool,
    check_status: bool,
}

impl ProcessControl<SystemShell> {
    /// Controller backed by the system shell
    pub fn new() -> Self {
        Self::with_shell(SystemShell)
    }
}

impl Default for ProcessControl<SystemShell> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ShellRunner> ProcessControl<R> {
    /// Controller backed by a custom shell runner
    pub fn with_shell(shell: R) -> Self {
        Self {
            shell,
            elevate: true,
            check_status: true,
        }
    }

    /// Enable or disable the privilege elevation wrapper
    pub fn elevated(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    /// When set, a non-zero exit status from a helper command is not an error
    pub fn ignore_exit_status(mut self, ignore: bool) -> Self {
        self.check_status = !ignore;
        self
    }

    /// Send a signal to every target in one batched `kill` command.
    ///
    /// `None` leaves the tool's default terminate signal in effect.
    pub fn kill<'a>(
        &self,
        targets: impl Into<PidSelector<'a>>,
        signal: Option<SignalSpec>,
    ) -> Result<()> {
        self.kill_pids(targets.into().pids(), signal)
    }

    /// Kill the targets and every descendant discovered under them
    pub fn kill_recursive<'a>(
        &self,
        targets: impl Into<PidSelector<'a>>,
        signal: Option<SignalSpec>,
    ) -> Result<()> {
        let mut pids = targets.into().pids();
        for child in pids::child_pids(&self.shell, &pids, true)? {
            if !pids.contains(&child) {
                pids.push(child);
            }
        }
        self.kill_pids(pids, signal)
    }

    /// Adjust the scheduling priority of the targets
    pub fn renice<'a>(&self, targets: impl Into<PidSelector<'a>>, level: i32) -> Result<()> {
        let pids = targets.into().pids();
        if pids.is_empty() {
            return Ok(());
        }
        // renice reads a bare positive number ambiguously, force the sign
        let level = if level > 0 {
            format!("+{level}")
        } else {
            level.to_string()
        };
        debug!(?pids, level = %level, "renicing processes");
        self.run(&format!("renice {level} {}", join_pids(&pids)))?;
        Ok(())
    }

    /// Child PIDs discovered under the targets
    pub fn children_of<'a>(
        &self,
        targets: impl Into<PidSelector<'a>>,
        recursive: bool,
    ) -> Result<Vec<u32>> {
        pids::child_pids(&self.shell, &targets.into().pids(), recursive)
    }

    fn kill_pids(&self, pids: Vec<u32>, signal: Option<SignalSpec>) -> Result<()> {
        if pids.is_empty() {
            return Ok(());
        }
        let flag = match signal {
            Some(spec) => format!(" -{}", resolve(&self.shell, &spec)?),
            None => String::new(),
        };
        debug!(?pids, "killing processes");
        self.run(&format!("kill{flag} {}", join_pids(&pids)))?;
        Ok(())
    }

    fn run(&self, command: &str) -> Result<ShellOutput> {
        let command = if self.elevate {
            shell::elevated(command)
        } else {
            command.to_owned()
        };
        let out = self.shell.run(&command)?;
        if self.check_status && !out.success() {
            return Err(ProcessError::Command {
                command,
                status: out.status,
                output: out.lines.join("\n"),
            });
        }
        Ok(out)
    }
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;

    /// Records every command; answers `ps --ppid` from a fixed table
    /// (10 -> {11}) and everything else with the configured status.
    struct FakeShell {
        commands: RefCell<Vec<String>>,
        status: i32,
    }

    impl FakeShell {
        fn new(status: i32) -> Self {
            Self {
                commands: RefCell::new(vec![]),
                status,
            }
        }

        fn last_command(&self) -> String {
            self.commands.borrow().last().cloned().unwrap()
        }
    }

    impl ShellRunner for FakeShell {
        fn run(&self, command: &str) -> io::Result<ShellOutput> {
            self.commands.borrow_mut().push(command.to_owned());
            if let Some(rest) = command.strip_prefix("ps --ppid ") {
                let pid: u32 = rest.split_whitespace().next().unwrap().parse().unwrap();
                let lines: Vec<String> = if pid == 10 { vec!["11".into()] } else { vec![] };
                let status = if lines.is_empty() { 1 } else { 0 };
                return Ok(ShellOutput { lines, status });
            }
            Ok(ShellOutput {
                lines: vec![],
                status: self.status,
            })
        }
    }

    fn control(shell: FakeShell) -> ProcessControl<FakeShell> {
        ProcessControl::with_shell(shell).elevated(false)
    }

    #[test]
    fn test_kill_batches_pids_into_one_command() {
        let control = control(FakeShell::new(0));
        control.kill(vec![1u32, 2, 3], Some(SignalSpec::Force)).unwrap();
        assert_eq!(control.shell.last_command(), "kill -9 1 2 3");
    }

    #[test]
    fn test_kill_without_signal_omits_the_flag() {
        let control = control(FakeShell::new(0));
        control.kill(5u32, None).unwrap();
        assert_eq!(control.shell.last_command(), "kill 5");
    }

    #[test]
    fn test_kill_resolves_signal_names() {
        let control = control(FakeShell::new(0));
        control.kill(5u32, Some("HUP".into())).unwrap();
        assert_eq!(control.shell.last_command(), "kill -1 5");
    }

    #[test]
    fn test_kill_recursive_appends_descendants() {
        let control = control(FakeShell::new(0));
        control.kill_recursive(10u32, None).unwrap();

        let commands = control.shell.commands.borrow();
        assert!(commands.contains(&"ps --ppid 10 -o pid=".to_owned()));
        assert!(commands.contains(&"ps --ppid 11 -o pid=".to_owned()));
        assert_eq!(commands.last().unwrap(), "kill 10 11");
    }

    #[test]
    fn test_renice_signs_positive_levels() {
        let control = control(FakeShell::new(0));
        control.renice(vec![4u32, 7], 5).unwrap();
        assert_eq!(control.shell.last_command(), "renice +5 4 7");

        control.renice(4u32, -5).unwrap();
        assert_eq!(control.shell.last_command(), "renice -5 4");
    }

    #[test]
    fn test_rejected_status_becomes_command_error() {
        let control = control(FakeShell::new(1));
        let err = control.kill(4u32, None).unwrap_err();
        match err {
            ProcessError::Command { command, status, .. } => {
                assert_eq!(command, "kill 4");
                assert_eq!(status, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ignore_exit_status_accepts_rejections() {
        let control = control(FakeShell::new(1)).ignore_exit_status(true);
        control.kill(4u32, None).unwrap();
    }

    #[test]
    fn test_empty_target_set_is_a_no_op() {
        let control = control(FakeShell::new(0));
        control.kill(Vec::<u32>::new(), None).unwrap();
        control.renice(Vec::<u32>::new(), 3).unwrap();
        assert!(control.shell.commands.borrow().is_empty());
    }
}
