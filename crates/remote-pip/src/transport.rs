//! The seam between the executor and whatever runs commands remotely.

use std::future::Future;

use crate::error::Result;

/// Exit status reported when the server closes the channel without one.
pub const NO_EXIT_STATUS: i32 = -1;

/// Output of one command attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` if the server never reported one.
    pub exit_status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Create an output record.
    #[must_use]
    pub fn new(exit_status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A successful attempt with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    /// A failed attempt with the given status and stderr.
    #[must_use]
    pub fn failure(exit_status: i32, stderr: impl Into<String>) -> Self {
        Self::new(exit_status, "", stderr)
    }

    /// Only exit status 0 counts as success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Something that can run a shell command on a remote host.
///
/// Implementations serve one command at a time; `&mut self` makes callers
/// serialize access.
pub trait CommandTransport: Send {
    /// Run `command` to completion and collect its output.
    ///
    /// A non-zero exit status is not an error at this level.
    fn exec(&mut self, command: &str) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Release the connection. Must be safe to call more than once.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Check whether commands can still be sent.
    fn is_open(&self) -> bool;
}
