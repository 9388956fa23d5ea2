//! Scripted transport for tests.
//!
//! [`MockTransport`] answers each command with the next queued response and
//! keeps answering with the last one once the queue runs dry. Clones share
//! state, so a test can keep a handle for inspection after moving one into a
//! [`RemotePip`](crate::RemotePip).
//!
//! ```rust
//! use remote_pip::mock::MockTransport;
//! use remote_pip::{CommandOutput, RemotePip};
//!
//! # tokio_test_block_on(async {
//! let mock = MockTransport::new()
//!     .respond(CommandOutput::failure(1, "network unreachable"))
//!     .respond(CommandOutput::success("Successfully installed foo-1.0"));
//! let mut pip = RemotePip::with_transport(mock.clone());
//!
//! pip.install("foo", Default::default()).await.unwrap();
//! assert_eq!(mock.exec_count(), 2);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_all()
//! #         .start_paused(true)
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f)
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::Instant;

use crate::error::{RemotePipError, Result};
use crate::transport::{CommandOutput, CommandTransport};

type ErrorFactory = Arc<dyn Fn() -> RemotePipError + Send + Sync>;

/// One scripted answer.
#[derive(Clone)]
pub enum MockResponse {
    /// The command ran and produced this output.
    Output(CommandOutput),
    /// The transport failed with the produced error.
    Error(ErrorFactory),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(output) => f.debug_tuple("Output").field(output).finish(),
            Self::Error(_) => f.write_str("Error(..)"),
        }
    }
}

/// A command the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRecord {
    /// The command text.
    pub command: String,
    /// When it arrived, on tokio's clock.
    pub at: Instant,
}

#[derive(Debug)]
struct MockState {
    responses: VecDeque<MockResponse>,
    last: Option<MockResponse>,
    records: Vec<ExecRecord>,
    closes: u32,
    closed: bool,
}

/// A scripted [`CommandTransport`].
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A mock that answers every command with exit status 0 and no output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses: VecDeque::new(),
                last: None,
                records: Vec::new(),
                closes: 0,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an output.
    #[must_use]
    pub fn respond(self, output: CommandOutput) -> Self {
        self.push(MockResponse::Output(output));
        self
    }

    /// Queue the same output `times` times.
    #[must_use]
    pub fn respond_times(self, output: &CommandOutput, times: usize) -> Self {
        for _ in 0..times {
            self.push(MockResponse::Output(output.clone()));
        }
        self
    }

    /// Queue a transport error.
    #[must_use]
    pub fn respond_error<F>(self, error: F) -> Self
    where
        F: Fn() -> RemotePipError + Send + Sync + 'static,
    {
        self.push(MockResponse::Error(Arc::new(error)));
        self
    }

    /// Queue a response through a shared handle.
    pub fn push(&self, response: MockResponse) {
        self.lock().responses.push_back(response);
    }

    /// Commands received so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .records
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    /// Commands received so far with their arrival times.
    #[must_use]
    pub fn records(&self) -> Vec<ExecRecord> {
        self.lock().records.clone()
    }

    /// Number of commands received.
    #[must_use]
    pub fn exec_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Number of times `close` reached the transport.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.lock().closes
    }

    /// Check whether the transport was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl CommandTransport for MockTransport {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let response = {
            let mut state = self.lock();
            if state.closed {
                return Err(RemotePipError::SessionClosed);
            }
            state.records.push(ExecRecord {
                command: command.to_string(),
                at: Instant::now(),
            });
            let next = state.responses.pop_front().or_else(|| state.last.clone());
            if let Some(response) = &next {
                state.last = Some(response.clone());
            }
            next
        };

        match response {
            Some(MockResponse::Output(output)) => Ok(output),
            Some(MockResponse::Error(make)) => Err(make()),
            None => Ok(CommandOutput::success("")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.closes += 1;
        state.closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_repeats_last() {
        let mut mock = MockTransport::new()
            .respond(CommandOutput::failure(1, "a"))
            .respond(CommandOutput::success("b"));

        assert_eq!(mock.exec("x").await.unwrap().exit_status, 1);
        assert_eq!(mock.exec("y").await.unwrap().stdout, "b");
        assert_eq!(mock.exec("z").await.unwrap().stdout, "b");
        assert_eq!(mock.commands(), ["x", "y", "z"]);
    }

    #[tokio::test]
    async fn empty_mock_succeeds() {
        let mut mock = MockTransport::new();
        assert!(mock.exec("ls").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn errors_are_produced_each_time() {
        let mut mock = MockTransport::new().respond_error(|| RemotePipError::channel("reset"));
        assert!(matches!(mock.exec("a").await, Err(RemotePipError::Channel { .. })));
        assert!(matches!(mock.exec("b").await, Err(RemotePipError::Channel { .. })));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let handle = MockTransport::new();
        let mut mock = handle.clone();
        mock.exec("ls").await.unwrap();
        mock.close().await.unwrap();

        assert_eq!(handle.exec_count(), 1);
        assert!(handle.is_closed());
        assert!(!handle.is_open());
        assert!(matches!(mock.exec("ls").await, Err(RemotePipError::SessionClosed)));
    }
}
