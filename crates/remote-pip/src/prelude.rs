//! Convenient re-exports for common remote-pip usage.

pub use crate::config::RemotePipConfig;
pub use crate::error::{RemotePipError, Result};
pub use crate::host_key::HostKeyPolicy;
pub use crate::pip::{InstallOptions, RemotePip, UninstallOptions};
pub use crate::retry::RetryPolicy;
pub use crate::session::SshConfig;
pub use crate::sync::SyncRemotePip;
pub use crate::transport::{CommandOutput, CommandTransport};
