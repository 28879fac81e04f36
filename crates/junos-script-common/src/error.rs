//! Error types for on-box script infrastructure.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use thiserror::Error;

/// Result type alias for script infrastructure operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised by the shell, NETCONF and syslog helpers.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Failed to spawn a shell command or child process.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// NETCONF transport or framing failure.
    #[error("NETCONF {operation} failed: {message}")]
    Netconf {
        /// The operation that failed (e.g., "hello", "rpc", "close").
        operation: String,
        /// Error message.
        message: String,
    },

    /// The device answered an RPC with one or more `<rpc-error>` elements.
    #[error("RPC '{rpc}' rejected: {message}")]
    RpcRejected {
        /// Name of the RPC element.
        rpc: String,
        /// Joined error messages reported by the device.
        message: String,
    },

    /// An operation did not finish within its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Deadline in seconds.
        seconds: u64,
    },

    /// The session has already been closed.
    #[error("NETCONF session is closed")]
    SessionClosed,

    /// Generic IO failure on the transport.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ScriptError {
    /// Creates a NETCONF transport error.
    pub fn netconf(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Netconf {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an RPC rejection error.
    pub fn rpc_rejected(rpc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RpcRejected {
            rpc: rpc.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }
}
