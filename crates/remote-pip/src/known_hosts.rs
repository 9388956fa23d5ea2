//! Reading and appending OpenSSH `known_hosts` files.
//!
//! Only the plain `hostnames keytype base64key [comment]` form is understood.
//! Marker lines (`@cert-authority`, `@revoked`) and hashed host names
//! (`|1|...`) are skipped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{RemotePipError, Result};

/// One key line from a `known_hosts` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostEntry {
    /// Host patterns on the line (comma separated in the file).
    pub hosts: Vec<String>,
    /// Key algorithm, e.g. `ssh-ed25519`.
    pub key_type: String,
    /// Base64 key blob.
    pub key_data: String,
}

impl KnownHostEntry {
    /// Check if this entry names the given host pattern. Host names compare
    /// case-insensitively.
    #[must_use]
    pub fn matches(&self, host: &str, port: u16) -> bool {
        let pattern = host_pattern(host, port);
        self.hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(&pattern) || h == "*")
    }
}

/// Result of looking a host key up in `known_hosts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// An entry for the host carries this exact key.
    Match,
    /// The host is listed, but only with different keys.
    Mismatch,
    /// The host is not listed.
    Unknown,
}

/// Parsed contents of a `known_hosts` file.
#[derive(Debug, Clone, Default)]
pub struct KnownHosts {
    entries: Vec<KnownHostEntry>,
}

impl KnownHosts {
    /// Parse `known_hosts` text.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('@'))
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let hosts = parts.next()?;
                let key_type = parts.next()?;
                let key_data = parts.next()?;
                if hosts.starts_with('|') {
                    return None;
                }
                Some(KnownHostEntry {
                    hosts: hosts.split(',').map(|h| h.trim().to_string()).collect(),
                    key_type: key_type.to_string(),
                    key_data: key_data.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Load a `known_hosts` file. A missing file is treated as empty; bytes
    /// that are not UTF-8 are replaced rather than failing the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::parse(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RemotePipError::io_context(
                format!("reading {}", path.display()),
                e,
            )),
        }
    }

    /// All parsed entries.
    #[must_use]
    pub fn entries(&self) -> &[KnownHostEntry] {
        &self.entries
    }

    /// Entries that name the host.
    pub fn lookup<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> impl Iterator<Item = &'a KnownHostEntry> + 'a {
        self.entries.iter().filter(move |e| e.matches(host, port))
    }

    /// Check a key against the entries for a host.
    ///
    /// `same_key` decides whether an entry carries the presented key.
    pub fn check<F>(&self, host: &str, port: u16, mut same_key: F) -> HostKeyStatus
    where
        F: FnMut(&KnownHostEntry) -> bool,
    {
        let mut listed = false;
        for entry in self.lookup(host, port) {
            listed = true;
            if same_key(entry) {
                return HostKeyStatus::Match;
            }
        }
        if listed {
            HostKeyStatus::Mismatch
        } else {
            HostKeyStatus::Unknown
        }
    }
}

/// The pattern OpenSSH writes for a host: `host` on port 22, `[host]:port`
/// otherwise, lower-cased.
#[must_use]
pub fn host_pattern(host: &str, port: u16) -> String {
    let host = host.to_ascii_lowercase();
    if port == 22 {
        host
    } else {
        format!("[{host}]:{port}")
    }
}

/// Append a key line for the host, creating the file and its directory.
///
/// `key_line` is `keytype base64` as produced by OpenSSH.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or written.
pub fn append(path: &Path, host: &str, port: u16, key_line: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| RemotePipError::io_context(format!("creating {}", parent.display()), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RemotePipError::io_context(format!("opening {}", path.display()), e))?;

    let line = format!("{} {key_line}\n", host_pattern(host, port));
    file.write_all(line.as_bytes())
        .map_err(|e| RemotePipError::io_context(format!("writing {}", path.display()), e))
}

/// Default `known_hosts` location: `$SSH_KNOWN_HOSTS`, else `~/.ssh/known_hosts`.
#[must_use]
pub fn default_path() -> PathBuf {
    if let Some(path) = crate::config::env::get_env("SSH_KNOWN_HOSTS") {
        return PathBuf::from(path);
    }

    crate::config::env::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join("known_hosts")
}
