//! SSH authentication material.
//!
//! Callers hand over up to three pieces of credential material: a password,
//! a private key file and a base64-encoded private key. [`Credentials::resolve`]
//! turns them into the ordered list of [`AuthMethod`]s tried at connect time.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{RemotePipError, Result};

/// SSH authentication method.
#[derive(Clone)]
pub enum AuthMethod {
    /// Password authentication.
    Password(String),
    /// Public key authentication with a key read from disk.
    KeyFile {
        /// Private key path.
        path: PathBuf,
        /// Passphrase for the key (if encrypted).
        passphrase: Option<String>,
    },
    /// Public key authentication with a key held in memory (PEM/OpenSSH text).
    KeyData {
        /// Decoded private key text.
        pem: String,
        /// Passphrase for the key (if encrypted).
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    /// Short label used in log fields.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::KeyFile { .. } => "key-file",
            Self::KeyData { .. } => "key-data",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::KeyData { passphrase, .. } => f
                .debug_struct("KeyData")
                .field("pem", &"<redacted>")
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Credential material for one user.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// User password, or the passphrase of the private key file.
    pub password: Option<String>,
    /// Path to a private key file. A leading `~` is expanded.
    pub key_file: Option<PathBuf>,
    /// Base64-encoded private key, used when no key file is given.
    pub b64_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("b64_key", &self.b64_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Create credentials for a user with no material yet.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the private key file.
    #[must_use]
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Set the base64-encoded private key.
    #[must_use]
    pub fn with_b64_key(mut self, key: impl Into<String>) -> Self {
        self.b64_key = Some(key.into());
        self
    }

    /// Check whether any credential material is present.
    #[must_use]
    pub const fn has_material(&self) -> bool {
        self.password.is_some() || self.key_file.is_some() || self.b64_key.is_some()
    }

    /// Resolve the material into the methods to try, in order.
    ///
    /// The key file wins over the encoded key. When a key is used the
    /// password doubles as the key passphrase (key file only) and is then
    /// tried as password authentication on its own.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::Authentication`] if no material is present
    /// or the encoded key is not valid base64 UTF-8 text.
    pub fn resolve(&self) -> Result<Vec<AuthMethod>> {
        let mut methods = Vec::with_capacity(2);

        if let Some(path) = &self.key_file {
            methods.push(AuthMethod::KeyFile {
                path: expand_tilde(path),
                passphrase: self.password.clone(),
            });
        } else if let Some(encoded) = &self.b64_key {
            methods.push(AuthMethod::KeyData {
                pem: decode_b64_key(&self.username, encoded)?,
                passphrase: None,
            });
        }

        if let Some(password) = &self.password {
            methods.push(AuthMethod::Password(password.clone()));
        }

        if methods.is_empty() {
            return Err(RemotePipError::authentication(
                &self.username,
                "no password, key file or encoded key was provided",
            ));
        }

        Ok(methods)
    }
}

/// Decode a base64-encoded private key into its text form.
fn decode_b64_key(user: &str, encoded: &str) -> Result<String> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| {
        RemotePipError::authentication(user, format!("encoded key is not valid base64: {e}"))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        RemotePipError::authentication(user, format!("encoded key is not valid UTF-8: {e}"))
    })
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match crate::config::env::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
