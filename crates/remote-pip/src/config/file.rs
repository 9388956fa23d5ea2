//! File-based configuration loading.
//!
//! A config file is a flat table; every key is optional:
//!
//! ```toml
//! host = "pkg-builder.internal"
//! port = 22
//! user = "deploy"
//! key_file = "~/.ssh/id_ed25519"
//! pip_path = "/opt/venv/bin/pip"
//! sudo = false
//! host_key_policy = "known-hosts"
//! connect_timeout = 15
//! install_retries = 5
//! retry_interval = 3
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RemotePipError, Result};

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Settings as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SSH host.
    pub host: Option<String>,
    /// SSH port.
    pub port: Option<u16>,
    /// SSH username.
    pub user: Option<String>,
    /// Password or key passphrase.
    pub password: Option<String>,
    /// Private key file.
    pub key_file: Option<PathBuf>,
    /// Base64-encoded private key.
    pub b64_key: Option<String>,
    /// Remote pip executable.
    pub pip_path: Option<String>,
    /// Run pip through sudo.
    pub sudo: Option<bool>,
    /// Host key policy name.
    pub host_key_policy: Option<String>,
    /// `known_hosts` file.
    pub known_hosts: Option<PathBuf>,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<u64>,
    /// Retries for `install`.
    pub install_retries: Option<u32>,
    /// Retry interval in seconds.
    pub retry_interval: Option<u64>,
}

/// Parse config content.
///
/// # Errors
///
/// Returns [`RemotePipError::Config`] when the content is not valid for
/// `format` or contains unknown keys.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<FileConfig> {
    match format {
        ConfigFormat::Toml => toml::from_str(content)
            .map_err(|e| RemotePipError::config(format!("invalid TOML config: {e}"))),
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| RemotePipError::config(format!("invalid JSON config: {e}"))),
    }
}

/// Load a config file, picking the format from its extension.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read and a configuration error
/// for an unknown extension or invalid content.
pub fn load(path: &Path) -> Result<FileConfig> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        RemotePipError::config(format!(
            "unknown config format for {} (expected .toml or .json)",
            path.display()
        ))
    })?;

    let content = std::fs::read_to_string(path).map_err(|e| {
        RemotePipError::io_context(format!("reading config file {}", path.display()), e)
    })?;

    tracing::debug!(path = %path.display(), ?format, "Loaded config file");
    parse_config(&content, format)
}
