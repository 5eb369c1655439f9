//! Error types for process lifecycle operations

use std::io;
use thiserror::Error;

/// Process lifecycle errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to create the OS process
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// Underlying OS error
        source: io::Error,
    },

    /// Status query failed, or the handle no longer owns a live process
    #[error("status unavailable: {0}")]
    Status(String),

    /// Stream read/write failed (EOF is not an error)
    #[error("stream I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Pipe or handle release failed on the non-forced close path
    #[error("close failed: {0}")]
    Close(String),

    /// Signal name not recognized by the signal table or the `kill -l` probe
    #[error("unknown signal `{0}`")]
    UnknownSignal(String),

    /// Helper command reported a rejected exit status
    #[error("`{command}` exited with status {status}: {output}")]
    Command {
        /// Command line that was run
        command: String,
        /// Exit status the command reported
        status: i32,
        /// Captured output
        output: String,
    },
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
