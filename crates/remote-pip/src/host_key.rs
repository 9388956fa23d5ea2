//! Host key verification policy.
//!
//! # Security
//!
//! The default policy is [`HostKeyPolicy::Tofu`]: an unseen host is recorded
//! in `known_hosts` and accepted, and a host whose recorded key differs is
//! rejected.
//!
//! The `AcceptAny` variant is only available when the `insecure-skip-verify`
//! feature is enabled. Using it in production environments enables MITM attacks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::known_hosts::{self, HostKeyStatus, KnownHosts};

/// A server public key as presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    /// Key algorithm, e.g. `ssh-ed25519`.
    pub algorithm: String,
    /// Base64 key blob in OpenSSH format.
    pub data: String,
    /// SHA-256 fingerprint, e.g. `SHA256:...`.
    pub fingerprint: String,
}

impl HostKey {
    /// The `keytype base64` form used in `known_hosts`.
    #[must_use]
    pub fn openssh_line(&self) -> String {
        format!("{} {}", self.algorithm, self.data)
    }
}

/// Caller-supplied host key check.
pub trait HostKeyVerifier: Send + Sync {
    /// Return `true` to trust `key` for `host:port`.
    fn verify(&self, host: &str, port: u16, key: &HostKey) -> bool;
}

impl<F> HostKeyVerifier for F
where
    F: Fn(&str, u16, &HostKey) -> bool + Send + Sync,
{
    fn verify(&self, host: &str, port: u16, key: &HostKey) -> bool {
        self(host, port, key)
    }
}

/// Host key verification policy.
#[derive(Clone, Default)]
#[non_exhaustive]
pub enum HostKeyPolicy {
    /// Accept all keys without verification.
    ///
    /// # Security Warning
    ///
    /// **DANGEROUS:** This disables SSH host key verification entirely, allowing
    /// man-in-the-middle attacks. Only use this in controlled testing environments
    /// where you trust the network completely.
    #[cfg(feature = "insecure-skip-verify")]
    AcceptAny,
    /// Reject every key.
    RejectUnknown,
    /// Require a matching entry in `known_hosts`.
    KnownHosts,
    /// Accept on first use and record the key, then verify.
    #[default]
    Tofu,
    /// Delegate to a caller-supplied verifier.
    Custom(Arc<dyn HostKeyVerifier>),
}

impl fmt::Debug for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "insecure-skip-verify")]
            Self::AcceptAny => f.write_str("AcceptAny"),
            Self::RejectUnknown => f.write_str("RejectUnknown"),
            Self::KnownHosts => f.write_str("KnownHosts"),
            Self::Tofu => f.write_str("Tofu"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "known-hosts" | "strict" => Ok(Self::KnownHosts),
            "tofu" | "trust-on-first-use" => Ok(Self::Tofu),
            "reject-unknown" | "reject" => Ok(Self::RejectUnknown),
            #[cfg(feature = "insecure-skip-verify")]
            "accept-any" | "auto-add" => Ok(Self::AcceptAny),
            #[cfg(not(feature = "insecure-skip-verify"))]
            "accept-any" | "auto-add" => Err(format!(
                "host key policy '{s}' requires the insecure-skip-verify feature"
            )),
            _ => Err(format!("unknown host key policy: {s}")),
        }
    }
}

impl HostKeyPolicy {
    /// Wrap a verifier closure.
    #[must_use]
    pub fn custom<V: HostKeyVerifier + 'static>(verifier: V) -> Self {
        Self::Custom(Arc::new(verifier))
    }

    /// Decide whether to trust `key` for `host:port`.
    ///
    /// The file at `known_hosts_path` is consulted by the `KnownHosts` and
    /// `Tofu` policies; `Tofu` appends unseen hosts to it. Both reject the key
    /// when the file exists but cannot be read.
    #[must_use]
    pub fn verify(&self, host: &str, port: u16, key: &HostKey, known_hosts_path: &Path) -> bool {
        match self {
            #[cfg(feature = "insecure-skip-verify")]
            Self::AcceptAny => {
                tracing::warn!(
                    host = %host,
                    fingerprint = %key.fingerprint,
                    "Accepting server key without verification (INSECURE)"
                );
                true
            }
            Self::RejectUnknown => {
                tracing::debug!(host = %host, fingerprint = %key.fingerprint, "Rejecting host key");
                false
            }
            Self::KnownHosts => match lookup(host, port, key, known_hosts_path) {
                Some(HostKeyStatus::Match) => {
                    tracing::debug!(host = %host, "Host key verified against known_hosts");
                    true
                }
                Some(HostKeyStatus::Mismatch) => {
                    mismatch(host, key);
                    false
                }
                Some(HostKeyStatus::Unknown) => {
                    tracing::warn!(
                        host = %host,
                        path = %known_hosts_path.display(),
                        "Host not found in known_hosts file"
                    );
                    false
                }
                None => false,
            },
            Self::Tofu => match lookup(host, port, key, known_hosts_path) {
                Some(HostKeyStatus::Match) => true,
                Some(HostKeyStatus::Mismatch) => {
                    mismatch(host, key);
                    false
                }
                None => {
                    tracing::warn!(
                        host = %host,
                        path = %known_hosts_path.display(),
                        "Cannot read known_hosts, refusing to trust host key"
                    );
                    false
                }
                Some(HostKeyStatus::Unknown) => {
                    match known_hosts::append(known_hosts_path, host, port, &key.openssh_line()) {
                        Ok(()) => tracing::info!(
                            host = %host,
                            fingerprint = %key.fingerprint,
                            path = %known_hosts_path.display(),
                            "Added host key to known_hosts (TOFU)"
                        ),
                        Err(e) => tracing::warn!(
                            host = %host,
                            error = %e,
                            "Failed to record host key, accepting key without saving"
                        ),
                    }
                    true
                }
            },
            Self::Custom(verifier) => verifier.verify(host, port, key),
        }
    }
}

fn lookup(host: &str, port: u16, key: &HostKey, path: &Path) -> Option<HostKeyStatus> {
    match KnownHosts::load(path) {
        Ok(hosts) => Some(hosts.check(host, port, |entry| {
            entry.key_type == key.algorithm && entry.key_data == key.data
        })),
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Failed to read known_hosts file");
            None
        }
    }
}

fn mismatch(host: &str, key: &HostKey) {
    tracing::error!(
        host = %host,
        fingerprint = %key.fingerprint,
        "HOST KEY MISMATCH! Possible man-in-the-middle attack!"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn key(data: &str) -> HostKey {
        HostKey {
            algorithm: "ssh-ed25519".to_string(),
            data: data.to_string(),
            fingerprint: format!("SHA256:{data}"),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("remote-pip-hk-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("known_hosts")
    }

    #[test]
    fn default_is_tofu() {
        assert!(matches!(HostKeyPolicy::default(), HostKeyPolicy::Tofu));
    }

    #[test]
    fn parse_policy_names() {
        assert!(matches!("known-hosts".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::KnownHosts)));
        assert!(matches!("STRICT".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::KnownHosts)));
        assert!(matches!("tofu".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::Tofu)));
        assert!(matches!(
            "reject_unknown".parse::<HostKeyPolicy>(),
            Ok(HostKeyPolicy::RejectUnknown)));
        assert!("bogus".parse::<HostKeyPolicy>().is_err());
    }

    #[cfg(not(feature = "insecure-skip-verify"))]
    #[test]
    fn accept_any_needs_feature() {
        let err = "accept-any".parse::<HostKeyPolicy>().unwrap_err();
        assert!(err.contains("insecure-skip-verify"));
    }

    #[test]
    fn tofu_records_then_verifies() {
        let path = scratch("tofu");
        let policy = HostKeyPolicy::Tofu;

        assert!(policy.verify("pkg.example", 22, &key("AAAAFIRST"), &path));
        assert!(policy.verify("pkg.example", 22, &key("AAAAFIRST"), &path));
        assert!(!policy.verify("pkg.example", 22, &key("AAAASECOND"), &path));

        let hosts = KnownHosts::load(&path).unwrap();
        assert_eq!(hosts.entries().len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn tofu_host_names_ignore_case() {
        let path = scratch("case");
        known_hosts::append(&path, "pkg.example", 22, "ssh-ed25519 AAAAGOOD").unwrap();
        let policy = HostKeyPolicy::Tofu;

        assert!(!policy.verify("PKG.example", 22, &key("AAAAEVIL"), &path));
        assert!(policy.verify("Pkg.Example", 22, &key("AAAAGOOD"), &path));
        assert_eq!(KnownHosts::load(&path).unwrap().entries().len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn tofu_still_rejects_changed_key_after_non_utf8_line() {
        let path = scratch("latin1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"pkg.example ssh-ed25519 AAAAGOOD\n# caf\xe9 comment\n").unwrap();

        assert!(!HostKeyPolicy::Tofu.verify("pkg.example", 22, &key("AAAAEVIL"), &path));
        assert!(HostKeyPolicy::Tofu.verify("pkg.example", 22, &key("AAAAGOOD"), &path));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn unreadable_known_hosts_is_rejected() {
        // a directory where the file should be cannot be read
        let path = scratch("unreadable");
        std::fs::create_dir_all(&path).unwrap();

        assert!(!HostKeyPolicy::Tofu.verify("pkg.example", 22, &key("AAAAKEY"), &path));
        assert!(!HostKeyPolicy::KnownHosts.verify("pkg.example", 22, &key("AAAAKEY"), &path));
        assert!(path.is_dir());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn known_hosts_is_strict() {
        let path = scratch("strict");
        let policy = HostKeyPolicy::KnownHosts;

        assert!(!policy.verify("pkg.example", 22, &key("AAAAKEY"), &path));
        known_hosts::append(&path, "pkg.example", 22, "ssh-ed25519 AAAAKEY").unwrap();
        assert!(policy.verify("pkg.example", 22, &key("AAAAKEY"), &path));
        assert!(!policy.verify("pkg.example", 22, &key("AAAAOTHER"), &path));
        assert!(!policy.verify("pkg.example", 2222, &key("AAAAKEY"), &path));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn reject_unknown_rejects() {
        let path = scratch("reject");
        assert!(!HostKeyPolicy::RejectUnknown.verify("h", 22, &key("AAAA"), &path));
        assert!(!path.exists());
    }

    #[test]
    fn custom_verifier_sees_fingerprint() {
        let path = scratch("custom");
        let policy = HostKeyPolicy::custom(|host: &str, port: u16, key: &HostKey| {
            host == "pinned.example" && port == 22 && key.fingerprint == "SHA256:AAAAPIN"
        });

        assert!(policy.verify("pinned.example", 22, &key("AAAAPIN"), &path));
        assert!(!policy.verify("pinned.example", 22, &key("AAAAEVIL"), &path));
        assert_eq!(format!("{policy:?}"), "Custom(..)");
    }
}
