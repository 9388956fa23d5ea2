//! Blocking wrapper for [`RemotePip`].
//!
//! [`SyncRemotePip`] owns a current-thread tokio runtime and blocks the
//! calling thread for each command, including retry sleeps. The session is
//! closed when the wrapper is dropped.
//!
//! ```rust,no_run
//! use remote_pip::sync::SyncRemotePip;
//! use remote_pip::{InstallOptions, RemotePipConfig};
//!
//! fn main() -> remote_pip::Result<()> {
//!     let config = RemotePipConfig::from_env()?;
//!     let mut pip = SyncRemotePip::connect(config)?;
//!     pip.install("requests", InstallOptions::new())?;
//!     Ok(())
//! }
//! ```

use tokio::runtime::{Builder, Runtime};

use crate::config::RemotePipConfig;
use crate::error::{RemotePipError, Result};
use crate::pip::{InstallOptions, RemotePip, UninstallOptions};
use crate::retry::RetryPolicy;
use crate::session::SshSession;
use crate::transport::{CommandOutput, CommandTransport};

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RemotePipError::io_context("creating tokio runtime", e))
}

/// A synchronous remote pip handle.
pub struct SyncRemotePip<T: CommandTransport = SshSession> {
    /// The tokio runtime.
    runtime: Runtime,
    /// The inner async handle.
    inner: RemotePip<T>,
}

impl<T: CommandTransport + std::fmt::Debug> std::fmt::Debug for SyncRemotePip<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRemotePip")
            .field("inner", &self.inner)
            .finish()
    }
}

impl SyncRemotePip<SshSession> {
    /// Connect over SSH.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created or connecting fails.
    pub fn connect(config: RemotePipConfig) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(RemotePip::connect(config))?;
        Ok(Self { runtime, inner })
    }
}

impl<T: CommandTransport> SyncRemotePip<T> {
    /// Wrap a configured async handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(inner: RemotePip<T>) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner,
        })
    }

    /// Wrap an open transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn with_transport(transport: T) -> Result<Self> {
        Self::new(RemotePip::with_transport(transport))
    }

    /// Borrow the async handle.
    #[must_use]
    pub const fn inner(&self) -> &RemotePip<T> {
        &self.inner
    }

    /// Run an arbitrary command.
    ///
    /// # Errors
    ///
    /// See [`RemotePip::execute`].
    pub fn execute(&mut self, command: &str, retry: RetryPolicy) -> Result<CommandOutput> {
        self.runtime.block_on(self.inner.execute(command, retry))
    }

    /// Install a package.
    ///
    /// # Errors
    ///
    /// See [`RemotePip::install`].
    pub fn install(&mut self, package: &str, options: InstallOptions) -> Result<CommandOutput> {
        self.runtime.block_on(self.inner.install(package, options))
    }

    /// Uninstall a package.
    ///
    /// # Errors
    ///
    /// See [`RemotePip::uninstall`].
    pub fn uninstall(&mut self, package: &str, options: UninstallOptions) -> Result<CommandOutput> {
        self.runtime.block_on(self.inner.uninstall(package, options))
    }

    /// Close the session.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if disconnecting fails.
    pub fn close(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.close())
    }
}

impl<T: CommandTransport> Drop for SyncRemotePip<T> {
    fn drop(&mut self) {
        if self.inner.is_closed() {
            return;
        }
        // block_on panics inside another runtime
        if tokio::runtime::Handle::try_current().is_ok() {
            tracing::debug!("SyncRemotePip dropped inside a runtime, skipping close");
            return;
        }
        if let Err(e) = self.runtime.block_on(self.inner.close()) {
            tracing::debug!(error = %e, "Failed to close session on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::MockTransport;

    #[test]
    fn blocking_install_retries() {
        let mock = MockTransport::new()
            .respond(CommandOutput::failure(1, "timeout"))
            .respond(CommandOutput::success("ok"));
        let mut pip = SyncRemotePip::with_transport(mock.clone()).unwrap();

        let output = pip
            .install(
                "foo",
                InstallOptions::new().retry(RetryPolicy::fixed(3, Duration::ZERO)),
            )
            .unwrap();

        assert_eq!(output.stdout, "ok");
        assert_eq!(mock.exec_count(), 2);
    }

    #[test]
    fn drop_closes_session() {
        let mock = MockTransport::new();
        {
            let mut pip = SyncRemotePip::with_transport(mock.clone()).unwrap();
            pip.uninstall("foo", UninstallOptions::new()).unwrap();
        }
        assert!(mock.is_closed());
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn explicit_close_is_not_repeated_on_drop() {
        let mock = MockTransport::new();
        let mut pip = SyncRemotePip::with_transport(mock.clone()).unwrap();
        pip.close().unwrap();
        drop(pip);
        assert_eq!(mock.close_count(), 1);
    }
}
