//! Remote pip facade.
//!
//! [`RemotePip`] owns one session and turns `install`/`uninstall` calls into
//! pip command lines run through the retrying [`Executor`].
//!
//! # Example
//!
//! ```rust,no_run
//! use remote_pip::{InstallOptions, RemotePip, RemotePipConfig};
//!
//! #[tokio::main]
//! async fn main() -> remote_pip::Result<()> {
//!     let config = RemotePipConfig::new("pkg-builder.internal", "deploy")
//!         .key_file("~/.ssh/id_ed25519");
//!     let mut pip = RemotePip::connect(config).await?;
//!
//!     pip.install("requests", InstallOptions::new().version("2.32.3")).await?;
//!     pip.close().await
//! }
//! ```

use crate::command::{DEFAULT_PIP_PATH, PipCommand};
use crate::config::RemotePipConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::retry::RetryPolicy;
use crate::session::SshSession;
use crate::transport::{CommandOutput, CommandTransport};

/// Options for [`RemotePip::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Pin a version (`pkg==version`).
    pub version: Option<String>,
    /// Extra pip arguments, one argv element each.
    pub args: Vec<String>,
    /// Retry policy; the `RemotePip` default (15 retries, 10 s) when unset.
    pub retry: Option<RetryPolicy>,
    /// Override the `RemotePip` sudo setting.
    pub sudo: Option<bool>,
}

impl InstallOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set extra pip arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Run with or without sudo for this call.
    #[must_use]
    pub const fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = Some(enabled);
        self
    }
}

/// Options for [`RemotePip::uninstall`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    /// Extra pip arguments, one argv element each.
    pub args: Vec<String>,
    /// Retry policy; a single attempt when unset.
    pub retry: Option<RetryPolicy>,
    /// Override the `RemotePip` sudo setting.
    pub sudo: Option<bool>,
}

impl UninstallOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set extra pip arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Run with or without sudo for this call.
    #[must_use]
    pub const fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = Some(enabled);
        self
    }
}

/// Package management on a remote host.
#[derive(Debug)]
pub struct RemotePip<T = SshSession> {
    executor: Executor<T>,
    pip_path: String,
    use_sudo: bool,
    install_retry: RetryPolicy,
}

impl RemotePip<SshSession> {
    /// Open an SSH session described by `config`.
    ///
    /// # Errors
    ///
    /// Returns configuration, authentication, host key and connection errors
    /// from [`SshSession::connect`].
    pub async fn connect(config: RemotePipConfig) -> Result<Self> {
        config.validate()?;
        let RemotePipConfig {
            ssh,
            pip_path,
            use_sudo,
            install_retry,
        } = config;

        let session = SshSession::connect(ssh).await?;
        Ok(Self::with_transport(session)
            .pip_path(pip_path)
            .use_sudo(use_sudo)
            .install_retry(install_retry))
    }
}

impl<T: CommandTransport> RemotePip<T> {
    /// Wrap an already open transport with default settings.
    pub fn with_transport(transport: T) -> Self {
        Self {
            executor: Executor::new(transport),
            pip_path: DEFAULT_PIP_PATH.to_string(),
            use_sudo: true,
            install_retry: RetryPolicy::install(),
        }
    }

    /// Set the remote pip executable.
    #[must_use]
    pub fn pip_path(mut self, path: impl Into<String>) -> Self {
        self.pip_path = path.into();
        self
    }

    /// Set whether pip runs through sudo.
    #[must_use]
    pub const fn use_sudo(mut self, enabled: bool) -> Self {
        self.use_sudo = enabled;
        self
    }

    /// Set the retry policy `install` uses by default.
    #[must_use]
    pub const fn install_retry(mut self, policy: RetryPolicy) -> Self {
        self.install_retry = policy;
        self
    }

    /// The remote pip executable.
    #[must_use]
    pub fn pip_executable(&self) -> &str {
        &self.pip_path
    }

    /// Whether pip runs through sudo by default.
    #[must_use]
    pub const fn sudo_enabled(&self) -> bool {
        self.use_sudo
    }

    /// Borrow the transport.
    pub const fn transport(&self) -> &T {
        self.executor.transport()
    }

    /// Run an arbitrary command, retrying per `retry`.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute`].
    pub async fn execute(&mut self, command: &str, retry: RetryPolicy) -> Result<CommandOutput> {
        self.executor.execute(command, retry).await
    }

    /// `pip install [args...] pkg[==version]`.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::InvalidArgument`](crate::RemotePipError::InvalidArgument)
    /// before sending anything if the package, version or arguments cannot be
    /// passed safely, and [`RemotePipError::CommandFailed`](crate::RemotePipError::CommandFailed)
    /// once the retries are spent.
    pub async fn install(&mut self, package: &str, options: InstallOptions) -> Result<CommandOutput> {
        let mut command = PipCommand::install(package)
            .args(options.args)
            .pip_path(self.pip_path.as_str())
            .sudo(options.sudo.unwrap_or(self.use_sudo));
        if let Some(version) = options.version {
            command = command.version(version);
        }

        let line = command.render()?;
        tracing::info!(package = %package, "pip command: {line}");
        self.execute(&line, options.retry.unwrap_or(self.install_retry))
            .await
    }

    /// `pip uninstall [args...] -y pkg`. One attempt unless a retry policy is
    /// given.
    ///
    /// # Errors
    ///
    /// Same as [`install`](Self::install).
    pub async fn uninstall(
        &mut self,
        package: &str,
        options: UninstallOptions,
    ) -> Result<CommandOutput> {
        let line = PipCommand::uninstall(package)
            .args(options.args)
            .pip_path(self.pip_path.as_str())
            .sudo(options.sudo.unwrap_or(self.use_sudo))
            .render()?;

        tracing::info!(package = %package, "pip command: {line}");
        self.execute(&line, options.retry.unwrap_or_else(RetryPolicy::none))
            .await
    }

    /// Close the session. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if disconnecting fails.
    pub async fn close(&mut self) -> Result<()> {
        self.executor.close().await
    }

    /// Check whether [`close`](Self::close) has been called.
    pub const fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[tokio::test]
    async fn install_renders_default_command() {
        let mock = MockTransport::new();
        let mut pip = RemotePip::with_transport(mock.clone());

        pip.install("foo", InstallOptions::new()).await.unwrap();
        assert_eq!(mock.commands(), ["sudo /usr/local/bin/pip install  foo"]);
    }

    #[tokio::test]
    async fn settings_and_overrides() {
        let mock = MockTransport::new();
        let mut pip = RemotePip::with_transport(mock.clone())
            .pip_path("/opt/venv/bin/pip")
            .use_sudo(false);

        assert_eq!(pip.pip_executable(), "/opt/venv/bin/pip");
        assert!(!pip.sudo_enabled());

        pip.install("foo", InstallOptions::new().sudo(true))
            .await
            .unwrap();
        pip.uninstall("foo", UninstallOptions::new()).await.unwrap();

        assert_eq!(
            mock.commands(),
            [
                "sudo /opt/venv/bin/pip install  foo",
                " /opt/venv/bin/pip uninstall  -y foo",
            ]
        );
    }

    #[tokio::test]
    async fn invalid_package_sends_nothing() {
        let mock = MockTransport::new();
        let mut pip = RemotePip::with_transport(mock.clone());

        assert!(pip.install("", InstallOptions::new()).await.is_err());
        assert!(pip.uninstall("a\0b", UninstallOptions::new()).await.is_err());
        assert_eq!(mock.exec_count(), 0);
    }
}
