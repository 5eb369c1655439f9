//! The process handle
//!
//! [`Process`] owns one spawned child: the OS handle, the write end of the
//! child's stdin, the read end of its stdout, and the cached exit status.
//! Ownership is exclusive; no two handles ever reference the same OS process.

use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdin, ChildStdout, ExitStatus};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::config::SpawnConfig;
use crate::error::{ProcessError, Result};
use crate::pids;
use crate::shell::SystemShell;
use crate::signal::{resolve, SignalSpec};

/// Exit code placeholder reported when the real code is unavailable
const UNKNOWN_EXIT: i32 = -1;

/// One of the two pipe endpoints a handle owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    /// Write end of the child's standard input
    Stdin,
    /// Read end of the child's standard output
    Stdout,
}

/// Lifecycle state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The child has been spawned and not yet observed to exit
    Running,
    /// The child was observed to exit; the handle still owns its resources
    Exited,
    /// Streams released and the child reaped; the handle owns nothing
    Closed,
}

/// Snapshot of a child's status
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    /// Process ID
    pub pid: u32,
    /// Whether the child was still running at query time
    pub running: bool,
    /// Command line the child was spawned with
    pub command: String,
    /// Exit code, or -1 while unknown
    pub exit_code: i32,
    /// Whether the child was terminated by a signal
    pub signaled: bool,
    /// Whether the child is currently stopped by a signal
    pub stopped: bool,
}

/// A spawned child process and its stream endpoints.
///
/// Dropping a handle that still owns a live child performs a forced kill and
/// close, so neither the process nor its pipe descriptors can leak; errors on
/// that path are swallowed since there is no caller left to see them. Call
/// [`Process::close`] explicitly to observe them instead.
#[derive(Debug)]
pub struct Process {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    command: String,
    pid: u32,
    exit_code: Option<i32>,
    state: ProcessState,
}

impl Process {
    /// Spawn a child process.
    ///
    /// The child gets a piped stdin and stdout and inherits the caller's
    /// stderr. Fails fast when the OS cannot create the process (command not
    /// found, bad working directory, permission denied).
    pub fn spawn(config: SpawnConfig) -> Result<Self> {
        let command = config.command_line();
        debug!(command = %command, "spawning process");

        let mut child = config
            .build_command()
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: command.clone(),
                source,
            })?;
        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        info!(pid, command = %command, "process spawned");
        Ok(Self {
            child: Some(child),
            stdin,
            stdout,
            command,
            pid,
            exit_code: None,
            state: ProcessState::Running,
        })
    }

    /// Process ID, captured at spawn time
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Command line the child was spawned with
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Last observed lifecycle state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Query the child's current status.
    ///
    /// The OS reports a real exit code only on the first query after the child
    /// exits; later queries report the -1 sentinel. The handle caches the real
    /// code once the child is confirmed not running and substitutes it for the
    /// sentinel from then on. The sentinel itself is never cached.
    pub fn status(&mut self) -> Result<ProcessStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| ProcessError::Status("process handle is closed".into()))?;

        match child.try_wait() {
            Ok(None) => Ok(ProcessStatus {
                pid: self.pid,
                running: true,
                command: self.command.clone(),
                exit_code: self.exit_code.unwrap_or(UNKNOWN_EXIT),
                signaled: false,
                stopped: false,
            }),
            Ok(Some(status)) => {
                self.state = ProcessState::Exited;
                let raw = decode_exit(status);
                if raw != UNKNOWN_EXIT {
                    self.exit_code = Some(raw);
                }
                Ok(ProcessStatus {
                    pid: self.pid,
                    running: false,
                    command: self.command.clone(),
                    exit_code: self.exit_code.unwrap_or(UNKNOWN_EXIT),
                    signaled: status.signal().is_some(),
                    stopped: status.stopped_signal().is_some(),
                })
            }
            Err(e) => Err(ProcessError::Status(e.to_string())),
        }
    }

    /// Exit code of the child.
    ///
    /// Returns the cached value when present, otherwise queries status. Fails
    /// while the child is still running or the code is unavailable.
    pub fn exit_code(&mut self) -> Result<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let status = self.status()?;
        if status.running {
            return Err(ProcessError::Status("process is still running".into()));
        }
        if status.exit_code == UNKNOWN_EXIT {
            return Err(ProcessError::Status("exit code not available".into()));
        }
        Ok(status.exit_code)
    }

    /// Whether the child is still running. False once the handle is closed.
    pub fn is_running(&mut self) -> bool {
        if self.child.is_none() {
            return false;
        }
        self.status().map(|status| status.running).unwrap_or(false)
    }

    /// Read up to `max` bytes from the child's stdout.
    ///
    /// EOF yields an empty buffer, not an error; so does a would-block result
    /// on a stream switched to non-blocking mode. Use [`Process::ready`] to
    /// tell the two apart.
    pub fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let stream = self.stdout.as_mut().ok_or_else(|| closed_stream("stdout"))?;
        let mut buf = vec![0u8; max];
        match stream.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write bytes to the child's stdin, returning how many were accepted.
    ///
    /// A would-block result on a non-blocking stream reports zero bytes.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let stream = self.stdin.as_mut().ok_or_else(|| closed_stream("stdin"))?;
        match stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Send one CRLF-terminated line to the child's stdin
    pub fn put_line(&mut self, line: &str) -> Result<()> {
        let stream = self.stdin.as_mut().ok_or_else(|| closed_stream("stdin"))?;
        let mut framed = Vec::with_capacity(line.len() + 2);
        framed.extend_from_slice(line.as_bytes());
        framed.extend_from_slice(b"\r\n");
        stream.write_all(&framed)?;
        Ok(())
    }

    /// Read one line from the child's stdout, stripping the CRLF terminator.
    ///
    /// Meant for blocking streams. EOF before any byte arrives is an error;
    /// EOF mid-line returns what was read.
    pub fn read_line(&mut self) -> Result<String> {
        let stream = self.stdout.as_mut().ok_or_else(|| closed_stream("stdout"))?;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte).map_err(ProcessError::Io)?;
            if n == 0 {
                if line.is_empty() {
                    return Err(ProcessError::Io(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream ended before a line was read",
                    )));
                }
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Switch one stream, or both when `stream` is `None`, between blocking
    /// and non-blocking mode.
    pub fn set_blocking(&mut self, blocking: bool, stream: Option<StreamId>) -> Result<()> {
        match stream {
            Some(id) => self.set_fd_blocking(id, blocking),
            None => {
                self.set_fd_blocking(StreamId::Stdin, blocking)?;
                self.set_fd_blocking(StreamId::Stdout, blocking)
            }
        }
    }

    fn raw_fd(&self, id: StreamId) -> Result<RawFd> {
        match id {
            StreamId::Stdin => self.stdin.as_ref().map(AsRawFd::as_raw_fd),
            StreamId::Stdout => self.stdout.as_ref().map(AsRawFd::as_raw_fd),
        }
        .ok_or_else(|| closed_pipe_status(id))
    }

    fn set_fd_blocking(&self, id: StreamId, blocking: bool) -> Result<()> {
        let fd = self.raw_fd(id)?;
        let bits = fcntl(fd, FcntlArg::F_GETFL).map_err(errno_to_io)?;
        let mut flags = OFlag::from_bits_retain(bits);
        flags.set(OFlag::O_NONBLOCK, !blocking);
        fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(errno_to_io)?;
        Ok(())
    }

    /// Zero-timeout readiness poll: data available (`for_read`) or room to
    /// write. Never suspends the caller.
    pub fn ready(&self, stream: StreamId, for_read: bool) -> Result<bool> {
        let events = if for_read {
            PollFlags::POLLIN | PollFlags::POLLHUP
        } else {
            PollFlags::POLLOUT
        };
        let fd = match stream {
            StreamId::Stdin => self.stdin.as_ref().map(AsFd::as_fd),
            StreamId::Stdout => self.stdout.as_ref().map(AsFd::as_fd),
        }
        .ok_or_else(|| closed_pipe_status(stream))?;

        let mut fds = [PollFd::new(fd, events)];
        poll(&mut fds, PollTimeout::ZERO).map_err(errno_to_io)?;
        Ok(fds[0].revents().is_some_and(|r| r.intersects(events)))
    }

    /// Deliver a signal to the child.
    ///
    /// `None` sends the platform's default terminate signal; `Force` sends the
    /// strongest kill signal; names resolve through the signal table. Success
    /// means delivery was attempted, not that the child terminated: a signal
    /// can be blocked or ignored, and a child that is already gone is not an
    /// error. Confirm termination by polling [`Process::is_running`].
    pub fn kill(&mut self, spec: Option<SignalSpec>) -> Result<()> {
        if self.child.is_none() {
            return Err(ProcessError::Status("process handle is closed".into()));
        }
        let number = match spec {
            None => Signal::SIGTERM as i32,
            Some(spec) => resolve(&SystemShell, &spec)?,
        };
        let sig = Signal::try_from(number)
            .map_err(|_| ProcessError::UnknownSignal(number.to_string()))?;

        debug!(pid = self.pid, signal = %sig, "delivering signal");
        match signal::kill(Pid::from_raw(self.pid as i32), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(ProcessError::Io(errno.into())),
        }
    }

    /// Release both stream endpoints and reap the child, capturing its final
    /// exit code. The -1 sentinel is not cached.
    ///
    /// Waits for the child to terminate, so consider `kill` first when it may
    /// still be running. In non-forced mode a failure surfaces as
    /// [`ProcessError::Close`], and closing an already-closed handle is an
    /// error; forced mode suppresses every failure and is what the drop path
    /// uses.
    pub fn close(&mut self, force: bool) -> Result<()> {
        drop(self.stdin.take());
        drop(self.stdout.take());

        let Some(mut child) = self.child.take() else {
            if force {
                return Ok(());
            }
            return Err(ProcessError::Close(
                "no pipes or process handle left to close".into(),
            ));
        };
        self.state = ProcessState::Closed;

        match child.wait() {
            Ok(status) => {
                let raw = decode_exit(status);
                if raw != UNKNOWN_EXIT {
                    self.exit_code = Some(raw);
                }
                debug!(pid = self.pid, exit_code = raw, "process reaped");
                Ok(())
            }
            Err(e) => {
                if force {
                    warn!(pid = self.pid, error = %e, "ignoring close failure");
                    Ok(())
                } else {
                    Err(ProcessError::Close(e.to_string()))
                }
            }
        }
    }

    /// Child PIDs of this process, optionally transitive
    pub fn children(&self, recursive: bool) -> Result<Vec<u32>> {
        pids::child_pids(&SystemShell, &[self.pid], recursive)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!(pid = self.pid, "dropping live handle, forcing kill and close");
            let _ = self.kill(Some(SignalSpec::Force));
            let _ = self.close(true);
        }
    }
}

fn decode_exit(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => status
            .signal()
            .map(|sig| 128 + sig)
            .unwrap_or(UNKNOWN_EXIT),
    }
}

fn closed_stream(name: &str) -> ProcessError {
    ProcessError::Io(io::Error::new(
        ErrorKind::NotConnected,
        format!("{name} pipe is closed"),
    ))
}

fn closed_pipe_status(stream: StreamId) -> ProcessError {
    ProcessError::Status(match stream {
        StreamId::Stdin => "stdin pipe is closed".into(),
        StreamId::Stdout => "stdout pipe is closed".into(),
    })
}

fn errno_to_io(errno: Errno) -> ProcessError {
    ProcessError::Io(errno.into())
}
