//! Signal name resolution
//!
//! Maps signal names and aliases to their numeric values. Names are looked up
//! in the compiled-in table for this OS family first; unknown names fall back
//! to a `kill -l <name>` probe through the shell collaborator.

use nix::sys::signal::Signal;
use tracing::debug;

use crate::error::{ProcessError, Result};
use crate::shell::ShellRunner;

/// The strongest available kill signal. Fixed so the force alias resolves even
/// when the compiled-in table is incomplete.
const FORCE_SIGNAL: i32 = 9;

/// A signal given by number, by name, or as the force-kill alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalSpec {
    /// Numeric signal value, passed through unchanged
    Number(i32),
    /// Signal name, with or without the `SIG` prefix
    Name(String),
    /// The strongest kill signal available on this platform
    Force,
}

impl From<i32> for SignalSpec {
    fn from(value: i32) -> Self {
        SignalSpec::Number(value)
    }
}

impl From<&str> for SignalSpec {
    fn from(value: &str) -> Self {
        SignalSpec::Name(value.to_owned())
    }
}

impl From<String> for SignalSpec {
    fn from(value: String) -> Self {
        SignalSpec::Name(value)
    }
}

/// Resolve a signal specification to its numeric value.
///
/// Resolution is idempotent: feeding the resolved number back in returns the
/// same number.
pub fn resolve<R: ShellRunner>(shell: &R, spec: &SignalSpec) -> Result<i32> {
    match spec {
        SignalSpec::Number(value) => Ok(*value),
        SignalSpec::Force => Ok(FORCE_SIGNAL),
        SignalSpec::Name(name) => {
            if let Some(value) = builtin(name) {
                return Ok(value);
            }
            probe(shell, name)
        }
    }
}

/// Look up a name in the compiled-in signal table.
fn builtin(name: &str) -> Option<i32> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::iterator()
        .find(|signal| signal.as_str() == full)
        .map(|signal| signal as i32)
}

/// Ask `kill -l` to translate a name the table does not know.
fn probe<R: ShellRunner>(shell: &R, name: &str) -> Result<i32> {
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ProcessError::UnknownSignal(name.to_owned()));
    }
    debug!(signal = %name, "probing signal number via kill -l");
    let out = shell.run(&format!("kill -l {name}"))?;
    if !out.success() {
        return Err(ProcessError::UnknownSignal(name.to_owned()));
    }
    match out.last_line().trim().parse::<i32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ProcessError::UnknownSignal(name.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOutput;
    use std::cell::RefCell;
    use std::io;

    struct ScriptedShell {
        lines: Vec<String>,
        status: i32,
        commands: RefCell<Vec<String>>,
    }

    impl ScriptedShell {
        fn new(lines: &[&str], status: i32) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                status,
                commands: RefCell::new(vec![]),
            }
        }
    }

    impl ShellRunner for ScriptedShell {
        fn run(&self, command: &str) -> io::Result<ShellOutput> {
            self.commands.borrow_mut().push(command.to_owned());
            Ok(ShellOutput {
                lines: self.lines.clone(),
                status: self.status,
            })
        }
    }

    /// Shell that must never be consulted.
    struct NoShell;

    impl ShellRunner for NoShell {
        fn run(&self, command: &str) -> io::Result<ShellOutput> {
            panic!("unexpected shell command: {command}");
        }
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(resolve(&NoShell, &SignalSpec::Number(15)).unwrap(), 15);
        assert_eq!(resolve(&NoShell, &SignalSpec::Number(-3)).unwrap(), -3);
    }

    #[test]
    fn test_force_is_fixed_without_table() {
        assert_eq!(resolve(&NoShell, &SignalSpec::Force).unwrap(), 9);
    }

    #[test]
    fn test_names_resolve_with_and_without_prefix() {
        assert_eq!(resolve(&NoShell, &"TERM".into()).unwrap(), 15);
        assert_eq!(resolve(&NoShell, &"SIGTERM".into()).unwrap(), 15);
        assert_eq!(resolve(&NoShell, &"kill".into()).unwrap(), 9);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let first = resolve(&NoShell, &"HUP".into()).unwrap();
        let second = resolve(&NoShell, &SignalSpec::Number(first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_probe_used_for_unknown_names() {
        let shell = ScriptedShell::new(&["34"], 0);
        assert_eq!(resolve(&shell, &"RTMIN".into()).unwrap(), 34);
        assert_eq!(shell.commands.borrow().as_slice(), ["kill -l RTMIN"]);
    }

    #[test]
    fn test_unrecognized_name_fails() {
        let shell = ScriptedShell::new(&[], 1);
        let err = resolve(&shell, &"NOSUCHSIG".into()).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownSignal(name) if name == "NOSUCHSIG"));
    }

    #[test]
    fn test_malformed_name_never_reaches_shell() {
        let err = resolve(&NoShell, &"TERM; reboot".into()).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownSignal(_)));
    }
}
