//! Environment-based configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "REMOTE_PIP";

/// Environment variable reader.
///
/// Values set through [`EnvConfig::with_var`] shadow the process environment,
/// which keeps tests away from the global environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Overrides consulted before the process environment.
    overrides: HashMap<String, String>,
    /// Skip the process environment entirely.
    isolated: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
            isolated: false,
        }
    }

    /// A reader that sees only the given variables (full names, prefix
    /// included).
    #[must_use]
    pub fn isolated<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            overrides: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            isolated: true,
        }
    }

    /// Shadow one variable, given by its short name.
    #[must_use]
    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        let var_name = self.var_name(name);
        self.overrides.insert(var_name, value.into());
        self
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value. Empty values count as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        let value = match self.overrides.get(&var_name) {
            Some(value) => Some(value.clone()),
            None if self.isolated => None,
            None => std::env::var(&var_name).ok(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Get a parsed value, reporting unparsable input.
    ///
    /// # Errors
    ///
    /// Returns the variable name and raw value when parsing fails.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, (String, String)> {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| (self.var_name(name), raw)),
            None => Ok(None),
        }
    }

    /// Get a boolean value.
    ///
    /// # Errors
    ///
    /// Returns the variable name and raw value when it is neither a true
    /// (`1`, `true`, `yes`, `on`, `enabled`) nor a false (`0`, `false`, `no`,
    /// `off`, `disabled`) spelling.
    pub fn bool(&self, name: &str) -> Result<Option<bool>, (String, String)> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "enabled" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "disabled" => Ok(Some(false)),
            _ => Err((self.var_name(name), raw)),
        }
    }

    /// Get a duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns the variable name and raw value when it is not a whole number.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>, (String, String)> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Variables read by [`RemotePipConfig::from_env`](super::RemotePipConfig::from_env).
pub mod vars {
    /// SSH host.
    pub const HOST: &str = "HOST";
    /// SSH port.
    pub const PORT: &str = "PORT";
    /// SSH username.
    pub const USER: &str = "USER";
    /// Password or key passphrase.
    pub const PASSWORD: &str = "PASSWORD";
    /// Private key file.
    pub const KEY_FILE: &str = "KEY_FILE";
    /// Base64-encoded private key.
    pub const B64_KEY: &str = "B64_KEY";
    /// Remote pip executable.
    pub const PIP_PATH: &str = "PIP_PATH";
    /// Run pip through sudo.
    pub const SUDO: &str = "SUDO";
    /// Host key policy name.
    pub const HOST_KEY_POLICY: &str = "HOST_KEY_POLICY";
    /// `known_hosts` file.
    pub const KNOWN_HOSTS: &str = "KNOWN_HOSTS";
    /// Connect timeout in seconds.
    pub const CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";
    /// Retries for `install`.
    pub const INSTALL_RETRIES: &str = "INSTALL_RETRIES";
    /// Retry interval in seconds.
    pub const RETRY_INTERVAL: &str = "RETRY_INTERVAL";
}

/// Get a standard environment variable.
#[must_use]
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get the home directory.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    get_env("HOME")
        .or_else(|| get_env("USERPROFILE"))
        .map(PathBuf::from)
}
