//! SSH session management on top of russh.
//!
//! [`SshSession::connect`] resolves credentials, performs the handshake under
//! the configured [`HostKeyPolicy`] and authenticates. The session then runs
//! one command per channel through [`CommandTransport::exec`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::ChannelMsg;
use russh::client;
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg, PublicKey};

use crate::auth::{AuthMethod, Credentials};
use crate::error::{RemotePipError, Result};
use crate::host_key::{HostKey, HostKeyPolicy};
use crate::known_hosts;
use crate::transport::{CommandOutput, CommandTransport, NO_EXIT_STATUS};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SSH session configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Host to connect to.
    pub host: String,
    /// Port (default 22).
    pub port: u16,
    /// Credentials.
    pub credentials: Credentials,
    /// Connection timeout, covering TCP connect and handshake.
    pub connect_timeout: Duration,
    /// Host key verification policy.
    pub host_key_policy: HostKeyPolicy,
    /// `known_hosts` file; [`known_hosts::default_path`] when unset.
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
        }
    }
}

impl SshConfig {
    /// Create new config for a host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = username.into();
        self
    }

    /// Set password (or key passphrase).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = Some(password.into());
        self
    }

    /// Set private key file.
    #[must_use]
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials.key_file = Some(path.into());
        self
    }

    /// Set base64-encoded private key.
    #[must_use]
    pub fn b64_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.b64_key = Some(key.into());
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set host key verification policy.
    #[must_use]
    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set the `known_hosts` file.
    #[must_use]
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    /// Get the address string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The `known_hosts` file in effect.
    #[must_use]
    pub fn known_hosts_path(&self) -> PathBuf {
        self.known_hosts
            .clone()
            .unwrap_or_else(known_hosts::default_path)
    }

    /// Check the fields needed before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty host or username.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RemotePipError::config("SSH host is required"));
        }
        if self.credentials.username.is_empty() {
            return Err(RemotePipError::config("SSH username is required"));
        }
        Ok(())
    }
}

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected yet.
    Unconnected,
    /// Connected and authenticated.
    Connected,
    /// Closed by the caller.
    Closed,
}

/// Client handler for russh that applies the host key policy.
struct ClientHandler {
    policy: HostKeyPolicy,
    host: String,
    port: u16,
    known_hosts: PathBuf,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let key = host_key_from(server_public_key);
        Ok(self
            .policy
            .verify(&self.host, self.port, &key, &self.known_hosts))
    }
}

/// Describe a russh public key in policy terms.
fn host_key_from(key: &PublicKey) -> HostKey {
    let openssh = key.to_openssh().unwrap_or_default();
    let mut parts = openssh.split_whitespace();
    let algorithm = parts
        .next()
        .map_or_else(|| key.algorithm().as_str().to_string(), str::to_string);
    let data = parts.next().unwrap_or_default().to_string();

    HostKey {
        algorithm,
        data,
        fingerprint: key.fingerprint(HashAlg::Sha256).to_string(),
    }
}

/// Authentication method with key material already decoded.
enum LoadedAuth {
    Password(String),
    Key { key: Arc<PrivateKey>, source: String },
}

/// Decode every key up front so bad material fails before connecting.
async fn load_methods(credentials: &Credentials) -> Result<Vec<LoadedAuth>> {
    let user = &credentials.username;
    let mut loaded = Vec::new();

    for method in credentials.resolve()? {
        tracing::debug!(user = %user, method = method.label(), "Loading authentication material");
        match method {
            AuthMethod::Password(password) => loaded.push(LoadedAuth::Password(password)),
            AuthMethod::KeyFile { path, passphrase } => {
                let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    RemotePipError::authentication(
                        user,
                        format!("failed to read key file {}: {e}", path.display()),
                    )
                })?;
                let source = path.display().to_string();
                let key = decode_key(user, &text, passphrase.as_deref(), &source)?;
                loaded.push(LoadedAuth::Key { key, source });
            }
            AuthMethod::KeyData { pem, passphrase } => {
                let source = "encoded key".to_string();
                let key = decode_key(user, &pem, passphrase.as_deref(), &source)?;
                loaded.push(LoadedAuth::Key { key, source });
            }
        }
    }

    Ok(loaded)
}

fn decode_key(
    user: &str,
    text: &str,
    passphrase: Option<&str>,
    source: &str,
) -> Result<Arc<PrivateKey>> {
    russh::keys::decode_secret_key(text, passphrase)
        .map(Arc::new)
        .map_err(|e| {
            let reason = if passphrase.is_none() && e.to_string().contains("encrypted") {
                format!("{source} appears to be encrypted but no password was provided")
            } else {
                format!("failed to decode {source}: {e}")
            };
            RemotePipError::authentication(user, reason)
        })
}

/// Try each method in order until the server accepts one.
async fn authenticate(
    handle: &mut client::Handle<ClientHandler>,
    user: &str,
    methods: Vec<LoadedAuth>,
) -> Result<()> {
    for method in methods {
        match method {
            LoadedAuth::Password(password) => {
                tracing::debug!(user = %user, "Attempting password authentication");
                match handle.authenticate_password(user, password.as_str()).await {
                    Ok(result) if result.success() => {
                        tracing::info!(user = %user, "Password authentication successful");
                        return Ok(());
                    }
                    Ok(_) => tracing::debug!(user = %user, "Password authentication failed"),
                    Err(e) => {
                        tracing::debug!(user = %user, error = %e, "Password authentication error");
                    }
                }
            }
            LoadedAuth::Key { key, source } => {
                tracing::debug!(user = %user, key = %source, "Attempting public key authentication");
                let rsa_hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                let key = PrivateKeyWithHashAlg::new(key, rsa_hash);

                match handle.authenticate_publickey(user, key).await {
                    Ok(result) if result.success() => {
                        tracing::info!(user = %user, "Public key authentication successful");
                        return Ok(());
                    }
                    Ok(_) => tracing::debug!(user = %user, "Public key authentication failed"),
                    Err(e) => {
                        tracing::debug!(user = %user, error = %e, "Public key authentication error");
                    }
                }
            }
        }
    }

    Err(RemotePipError::authentication(
        user,
        "all authentication methods were refused",
    ))
}

/// An authenticated SSH connection.
pub struct SshSession {
    /// Configuration.
    config: SshConfig,
    /// Current state.
    state: SessionState,
    /// The russh client handle while connected.
    handle: Option<client::Handle<ClientHandler>>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("connected", &self.handle.is_some())
            .finish()
    }
}

impl SshSession {
    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// - [`RemotePipError::Config`] if host or username is missing
    /// - [`RemotePipError::Authentication`] if credentials cannot be loaded
    ///   or every method is refused
    /// - [`RemotePipError::Timeout`] if the handshake exceeds the timeout
    /// - [`RemotePipError::HostKeyRejected`] if the policy refuses the key
    /// - [`RemotePipError::Connection`] for any other transport failure
    pub async fn connect(config: SshConfig) -> Result<Self> {
        config.validate()?;
        let methods = load_methods(&config.credentials).await?;

        let handler = ClientHandler {
            policy: config.host_key_policy.clone(),
            host: config.host.clone(),
            port: config.port,
            known_hosts: config.known_hosts_path(),
        };

        tracing::info!(
            host = %config.host,
            port = %config.port,
            "Connecting to SSH server"
        );

        let russh_config = Arc::new(client::Config::default());
        let addr = (config.host.as_str(), config.port);
        let connected = tokio::time::timeout(
            config.connect_timeout,
            client::connect(russh_config, addr, handler),
        )
        .await;

        let mut handle = match connected {
            Err(_) => {
                return Err(RemotePipError::Timeout {
                    duration: config.connect_timeout,
                });
            }
            Ok(Err(russh::Error::UnknownKey)) => {
                return Err(RemotePipError::host_key_rejected(&config.host, config.port));
            }
            Ok(Err(e)) => {
                return Err(RemotePipError::connection(
                    &config.host,
                    config.port,
                    e.to_string(),
                ));
            }
            Ok(Ok(handle)) => handle,
        };

        tracing::debug!(user = %config.credentials.username, "Authenticating with SSH server");
        authenticate(&mut handle, &config.credentials.username, methods).await?;

        tracing::info!(
            host = %config.host,
            user = %config.credentials.username,
            "SSH connection established"
        );

        Ok(Self {
            config,
            state: SessionState::Connected,
            handle: Some(handle),
        })
    }

    /// Get configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Get current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let handle = self.handle.as_mut().ok_or(RemotePipError::SessionClosed)?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| RemotePipError::channel(format!("failed to open channel: {e}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| RemotePipError::channel(format!("exec request failed: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                // ext 1 is stderr
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    tracing::debug!(signal = ?signal_name, "Remote command killed by signal");
                }
                ChannelMsg::Failure => {
                    return Err(RemotePipError::channel("server refused the exec request"));
                }
                _ => {}
            }
        }

        Ok(CommandOutput {
            exit_status: exit_status.map_or(NO_EXIT_STATUS, |s| s as i32),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(host = %self.config.host, "Closing SSH session");
            if let Err(e) = handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
            {
                tracing::debug!(host = %self.config.host, error = %e, "Disconnect failed");
            }
        }
        self.state = SessionState::Closed;
        Ok(())
    }
}

impl CommandTransport for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.run(command).await
    }

    async fn close(&mut self) -> Result<()> {
        self.disconnect().await
    }

    fn is_open(&self) -> bool {
        self.state == SessionState::Connected && self.handle.is_some()
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::debug!(
                host = %self.config.host,
                "SSH session dropped without close, connection is torn down"
            );
        }
    }
}
