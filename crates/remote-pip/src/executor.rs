//! Execute-with-retry over a [`CommandTransport`].

use crate::error::{RemotePipError, Result};
use crate::retry::{RetryPolicy, RetryState};
use crate::transport::{CommandOutput, CommandTransport};

/// Runs commands over one transport, retrying non-zero exits.
#[derive(Debug)]
pub struct Executor<T> {
    transport: T,
    closed: bool,
}

impl<T: CommandTransport> Executor<T> {
    /// Wrap an open transport.
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            closed: false,
        }
    }

    /// Borrow the transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Check whether [`close`](Self::close) has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `command`, retrying on non-zero exit status.
    ///
    /// The command runs at most `retry.retries + 1` times with
    /// `retry.interval` between attempts. Only exit status 0 is success.
    /// Transport errors end the loop immediately.
    ///
    /// # Errors
    ///
    /// - [`RemotePipError::SessionClosed`] after [`close`](Self::close)
    /// - [`RemotePipError::CommandFailed`] once every attempt has failed
    /// - any transport error from the attempt that hit it
    pub async fn execute(&mut self, command: &str, retry: RetryPolicy) -> Result<CommandOutput> {
        if self.closed || !self.transport.is_open() {
            return Err(RemotePipError::SessionClosed);
        }

        let mut state = RetryState::new(retry);
        loop {
            state.record_attempt();
            let attempt = state.attempts();
            tracing::info!(
                attempt,
                max_attempts = retry.max_attempts(),
                command = %command,
                "Executing remote command"
            );

            let output = self.transport.exec(command).await?;

            if output.is_success() {
                if !output.stdout.is_empty() {
                    tracing::info!(attempt, stdout = %output.stdout.trim_end(), "Remote command output");
                }
                return Ok(output);
            }

            tracing::warn!(
                attempt,
                exit_status = output.exit_status,
                stderr = %output.stderr.trim_end(),
                "Remote command failed"
            );

            let Some(delay) = state.next_delay() else {
                return Err(RemotePipError::command_failed(
                    command,
                    output.exit_status,
                    output.stderr,
                    attempt,
                ));
            };

            tracing::info!(
                "Remote command failed. Waiting {} seconds before retry...",
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Release the session. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if closing fails; the executor counts as
    /// closed either way.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close().await
    }
}
