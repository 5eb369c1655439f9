//! # proclet
//!
//! **Purpose**: Lifecycle management for externally spawned child processes
//!
//! Spawn children with a working directory and environment, exchange data over
//! their standard streams, inspect and cache their exit status, and terminate
//! them: one at a time through the handle, or in bulk with best-effort
//! discovery of descendant processes.
//!
//! ## Features
//!
//! - **Process spawning**: piped stdin/stdout, inherited stderr, fail-fast spawn errors
//! - **Status caching**: exit codes survive the once-only OS status read
//! - **Stream control**: per-stream blocking mode and zero-timeout readiness polls
//! - **Signal resolution**: names, numbers and the force alias, with a `kill -l` fallback
//! - **Tree-aware termination**: child-PID discovery and batched recursive kill
//! - **Leak-free teardown**: dropping a live handle force-kills and reaps the child
//!
//! Everything is synchronous: operations complete or fail immediately, and the
//! only non-blocking primitive is the readiness poll. Unix only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use proclet::{Process, SpawnConfig};
//!
//! fn main() -> proclet::Result<()> {
//!     let mut child = Process::spawn(SpawnConfig::new("cat"))?;
//!     child.write(b"hello\n")?;
//!     let echoed = child.read(64)?;
//!     assert_eq!(echoed, b"hello\n");
//!     child.kill(None)?;
//!     child.close(false)?;
//!     Ok(())
//! }
//! ```

pub mod child;
pub mod config;
pub mod control;
pub mod error;
pub mod pids;
pub mod shell;
pub mod signal;

pub use child::{Process, ProcessState, ProcessStatus, StreamId};
pub use config::SpawnConfig;
pub use control::ProcessControl;
pub use error::{ProcessError, Result};
pub use pids::{child_pids, PidSelector};
pub use shell::{elevated, ShellOutput, ShellRunner, SystemShell};
pub use signal::{resolve, SignalSpec};
