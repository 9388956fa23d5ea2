//! Error types for remote-pip.
//!
//! Connection and authentication problems surface immediately. A remote
//! command that keeps failing is reported as [`RemotePipError::CommandFailed`]
//! once its retry budget is spent, carrying the last attempt's exit status and
//! standard error so the caller can decide what to do next.

use std::time::Duration;

use thiserror::Error;

/// Maximum length of captured stderr to display in error messages.
const MAX_STDERR_DISPLAY: usize = 500;

/// Format captured stderr for display, keeping the tail if it is long.
fn format_stderr_snippet(stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        return "(no stderr)".to_string();
    }

    if stderr.len() <= MAX_STDERR_DISPLAY {
        return stderr.to_string();
    }

    let mut start = stderr.len() - MAX_STDERR_DISPLAY;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &stderr[start..])
}

/// Format a command failure message.
fn format_command_failed(command: &str, exit_status: i32, stderr: &str, attempts: u32) -> String {
    let plural = if attempts == 1 { "" } else { "s" };
    format!(
        "remote command failed with exit status {exit_status} after {attempts} attempt{plural}\n\
         \n\
         Command: {command}\n\
         \n\
         {}",
        format_stderr_snippet(stderr)
    )
}

/// The main error type for remote-pip operations.
#[derive(Debug, Error)]
pub enum RemotePipError {
    /// Credential material was missing, unreadable or refused by the server.
    #[error("authentication failed for user '{user}': {reason}")]
    Authentication {
        /// The user that failed to authenticate.
        user: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The TCP connection or SSH handshake failed.
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connection {
        /// The host that could not be connected to.
        host: String,
        /// The port that was used.
        port: u16,
        /// The reason for the failure.
        reason: String,
    },

    /// The server's host key was refused by the configured policy.
    #[error("host key for {host}:{port} was rejected by the host key policy")]
    HostKeyRejected {
        /// The host whose key was rejected.
        host: String,
        /// The port that was used.
        port: u16,
    },

    /// Connecting took longer than the configured timeout.
    #[error("SSH operation timed out after {duration:?}")]
    Timeout {
        /// The duration that elapsed.
        duration: Duration,
    },

    /// A channel could not be opened or the exec request failed.
    #[error("SSH channel error: {reason}")]
    Channel {
        /// The reason for the channel error.
        reason: String,
    },

    /// The remote command kept returning a non-zero exit status.
    #[error("{}", format_command_failed(command, *exit_status, stderr, *attempts))]
    CommandFailed {
        /// The command that was executed.
        command: String,
        /// Exit status of the last attempt.
        exit_status: i32,
        /// Standard error of the last attempt.
        stderr: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The session has been closed.
    #[error("session is closed")]
    SessionClosed,

    /// A value was refused before it reached the remote shell.
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidArgument {
        /// The kind of input (e.g. "package", "argument").
        kind: String,
        /// The value that was refused.
        value: String,
        /// Why it was refused.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for remote-pip operations.
pub type Result<T> = std::result::Result<T, RemotePipError>;

impl RemotePipError {
    /// Create an authentication error.
    pub fn authentication(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Create a host key rejection error.
    pub fn host_key_rejected(host: impl Into<String>, port: u16) -> Self {
        Self::HostKeyRejected {
            host: host.into(),
            port,
        }
    }

    /// Create a channel error.
    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel {
            reason: reason.into(),
        }
    }

    /// Create a command failure error.
    pub fn command_failed(
        command: impl Into<String>,
        exit_status: i32,
        stderr: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_status,
            stderr: stderr.into(),
            attempts,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(
        kind: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            kind: kind.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this is a command failure.
    #[must_use]
    pub const fn is_command_failed(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }

    /// Check if this error happened while establishing the session.
    #[must_use]
    pub const fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::Connection { .. }
                | Self::HostKeyRejected { .. }
                | Self::Timeout { .. }
        )
    }

    /// Exit status of the last attempt, for command failures.
    #[must_use]
    pub const fn exit_status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_status, .. } => Some(*exit_status),
            _ => None,
        }
    }

    /// Captured stderr of the last attempt, for command failures.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
