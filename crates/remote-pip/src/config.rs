//! Configuration types for remote-pip.
//!
//! [`RemotePipConfig`] can be built in code, read from a TOML or JSON file
//! ([`file`]) or from `REMOTE_PIP_*` environment variables ([`env`]).
//! [`RemotePipConfig::load`] layers them: defaults, then the file, then the
//! environment.

pub mod env;
pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::command::DEFAULT_PIP_PATH;
use crate::error::{RemotePipError, Result};
use crate::host_key::HostKeyPolicy;
use crate::retry::RetryPolicy;
use crate::session::SshConfig;

pub use env::EnvConfig;
pub use file::{ConfigFormat, FileConfig};

/// Full configuration for a [`RemotePip`](crate::RemotePip).
#[derive(Debug, Clone)]
pub struct RemotePipConfig {
    /// SSH connection settings.
    pub ssh: SshConfig,
    /// Remote pip executable.
    pub pip_path: String,
    /// Run pip through sudo unless a call says otherwise.
    pub use_sudo: bool,
    /// Retry policy `install` uses when the call does not set one.
    pub install_retry: RetryPolicy,
}

impl Default for RemotePipConfig {
    fn default() -> Self {
        Self {
            ssh: SshConfig::default(),
            pip_path: DEFAULT_PIP_PATH.to_string(),
            use_sudo: true,
            install_retry: RetryPolicy::install(),
        }
    }
}

impl RemotePipConfig {
    /// Create a config for `user@host`.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            ssh: SshConfig::new(host).username(username),
            ..Default::default()
        }
    }

    /// Set the SSH settings wholesale.
    #[must_use]
    pub fn ssh(mut self, ssh: SshConfig) -> Self {
        self.ssh = ssh;
        self
    }

    /// Set port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.ssh.port = port;
        self
    }

    /// Set password (or key passphrase).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.ssh = self.ssh.password(password);
        self
    }

    /// Set private key file.
    #[must_use]
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh = self.ssh.key_file(path);
        self
    }

    /// Set base64-encoded private key.
    #[must_use]
    pub fn b64_key(mut self, key: impl Into<String>) -> Self {
        self.ssh = self.ssh.b64_key(key);
        self
    }

    /// Set host key policy.
    #[must_use]
    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.ssh = self.ssh.host_key_policy(policy);
        self
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

    /// Set the default install retry policy.
    #[must_use]
    pub const fn install_retry(mut self, policy: RetryPolicy) -> Self {
        self.install_retry = policy;
        self
    }

    /// Read configuration from `REMOTE_PIP_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Config`] for unparsable values.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&EnvConfig::default())
    }

    /// Read configuration through the given environment reader.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Config`] for unparsable values.
    pub fn from_env_with(env: &EnvConfig) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(env)?;
        Ok(config)
    }

    /// Read configuration from a TOML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(file::load(path.as_ref())?)?;
        Ok(config)
    }

    /// Layer defaults, an optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or any value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &EnvConfig::default())
    }

    /// Like [`load`](Self::load) with an explicit environment reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or any value is invalid.
    pub fn load_with(path: Option<&Path>, env: &EnvConfig) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply_file(file::load(path)?)?;
        }
        config.apply_env(env)?;
        Ok(config)
    }

    /// Overlay the values present in a file.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Config`] for an unknown host key policy.
    pub fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        let ssh = &mut self.ssh;
        if let Some(host) = file.host {
            ssh.host = host;
        }
        if let Some(port) = file.port {
            ssh.port = port;
        }
        apply_credentials(
            &mut ssh.credentials,
            file.user,
            file.password,
            file.key_file,
            file.b64_key,
        );
        if let Some(policy) = file.host_key_policy {
            ssh.host_key_policy = parse_policy(&policy)?;
        }
        if let Some(path) = file.known_hosts {
            ssh.known_hosts = Some(path);
        }
        if let Some(secs) = file.connect_timeout {
            ssh.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = file.pip_path {
            self.pip_path = path;
        }
        if let Some(sudo) = file.sudo {
            self.use_sudo = sudo;
        }
        if let Some(retries) = file.install_retries {
            self.install_retry.retries = retries;
        }
        if let Some(secs) = file.retry_interval {
            self.install_retry.interval = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Overlay the variables present in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Config`] for unparsable values.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        use crate::config::env::vars;

        let ssh = &mut self.ssh;
        if let Some(host) = env.get(vars::HOST) {
            ssh.host = host;
        }
        if let Some(port) = env.parse::<u16>(vars::PORT).map_err(bad_var)? {
            ssh.port = port;
        }
        apply_credentials(
            &mut ssh.credentials,
            env.get(vars::USER),
            env.get(vars::PASSWORD),
            env.get(vars::KEY_FILE).map(PathBuf::from),
            env.get(vars::B64_KEY),
        );
        if let Some(policy) = env.get(vars::HOST_KEY_POLICY) {
            ssh.host_key_policy = parse_policy(&policy)?;
        }
        if let Some(path) = env.get(vars::KNOWN_HOSTS) {
            ssh.known_hosts = Some(PathBuf::from(path));
        }
        if let Some(timeout) = env.duration_secs(vars::CONNECT_TIMEOUT).map_err(bad_var)? {
            ssh.connect_timeout = timeout;
        }
        if let Some(path) = env.get(vars::PIP_PATH) {
            self.pip_path = path;
        }
        if let Some(sudo) = env.bool(vars::SUDO).map_err(bad_var)? {
            self.use_sudo = sudo;
        }
        if let Some(retries) = env.parse::<u32>(vars::INSTALL_RETRIES).map_err(bad_var)? {
            self.install_retry.retries = retries;
        }
        if let Some(interval) = env.duration_secs(vars::RETRY_INTERVAL).map_err(bad_var)? {
            self.install_retry.interval = interval;
        }
        Ok(())
    }

    /// Check that the configuration is usable for connecting.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Config`] for a missing host, username or
    /// pip path.
    pub fn validate(&self) -> Result<()> {
        self.ssh.validate()?;
        if self.pip_path.is_empty() {
            return Err(RemotePipError::config("pip path cannot be empty"));
        }
        Ok(())
    }
}

fn apply_credentials(
    credentials: &mut Credentials,
    user: Option<String>,
    password: Option<String>,
    key_file: Option<PathBuf>,
    b64_key: Option<String>,
) {
    if let Some(user) = user {
        credentials.username = user;
    }
    if password.is_some() {
        credentials.password = password;
    }
    if key_file.is_some() {
        credentials.key_file = key_file;
    }
    if b64_key.is_some() {
        credentials.b64_key = b64_key;
    }
}

fn parse_policy(name: &str) -> Result<HostKeyPolicy> {
    name.parse().map_err(RemotePipError::config)
}

fn bad_var((name, value): (String, String)) -> RemotePipError {
    RemotePipError::config(format!("invalid value for {name}: {value:?}"))
}
