//! remote-pip: run pip on a remote host over SSH
//!
//! This crate opens one authenticated SSH session and runs `pip install`,
//! `pip uninstall` or any shell command over it, retrying commands that exit
//! non-zero on a fixed interval.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime, plus a blocking [`sync`] wrapper
//! - **SSH transport** via `russh` with password, key file or base64 key auth
//! - **Explicit host key policy**, trust-on-first-use by default
//! - **Shell-safe command construction** for package names and arguments
//! - **Mock transport** for testing code built on this crate
//!
//! # Example
//!
//! ```rust,no_run
//! use remote_pip::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RemotePipConfig::new("10.0.0.12", "deploy").password("hunter2");
//!     let mut pip = RemotePip::connect(config).await?;
//!
//!     pip.install("numpy", InstallOptions::new().args(["--no-cache-dir"])).await?;
//!     pip.uninstall("pandas", UninstallOptions::new()).await?;
//!     pip.close().await
//! }
//! ```

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod host_key;
pub mod known_hosts;
pub mod logging;
pub mod mock;
pub mod pip;
pub mod prelude;
pub mod retry;
pub mod session;
pub mod sync;
pub mod transport;

pub use auth::{AuthMethod, Credentials};
pub use command::{DEFAULT_PIP_PATH, PipAction, PipCommand, shell_quote};
pub use config::RemotePipConfig;
pub use error::{RemotePipError, Result};
pub use executor::Executor;
pub use host_key::{HostKey, HostKeyPolicy, HostKeyVerifier};
pub use logging::{LogFormat, LoggingConfig};
pub use mock::MockTransport;
pub use pip::{InstallOptions, RemotePip, UninstallOptions};
pub use retry::{RetryPolicy, RetryState};
pub use session::{SessionState, SshConfig, SshSession};
pub use sync::SyncRemotePip;
pub use transport::{CommandOutput, CommandTransport};
