//! Construction of the pip command lines sent to the remote shell.
//!
//! The line layout is `"{prefix} {pip} {verb} {args} {target}"`, where
//! `prefix` is `sudo` or empty and `args` is the space-joined extra
//! arguments. With no extra arguments this leaves two spaces before the
//! target, e.g. `sudo /usr/local/bin/pip install  requests`.
//!
//! Every interpolated value is quoted for a POSIX shell unless it only holds
//! characters the shell treats literally, so a package name cannot smuggle a
//! second command in.

use std::borrow::Cow;

use crate::error::{RemotePipError, Result};

/// Default pip executable on the remote host.
pub const DEFAULT_PIP_PATH: &str = "/usr/local/bin/pip";

/// Check if a character needs no quoting in a POSIX shell word.
///
/// `^` is left out since zsh with `EXTENDED_GLOB` treats it as a pattern.
const fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '-' | '_' | '.' | ',' | ':' | '/' | '=' | '+' | '@' | '%')
}

/// Check if a value can be sent as a bare word.
///
/// A leading `=` is quoted because zsh expands `=cmd` to a command path.
fn is_bare_word(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('=') && value.chars().all(is_shell_safe)
}

/// Quote a value as a single POSIX shell word.
///
/// Safe values are returned unchanged; anything else is wrapped in single
/// quotes with embedded quotes written as `'\''`.
#[must_use]
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    if is_bare_word(value) {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    Cow::Owned(quoted)
}

/// Refuse values that cannot be passed through a shell at all.
fn validate(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RemotePipError::invalid_argument(
            kind,
            value,
            format!("{kind} cannot be empty"),
        ));
    }
    if value.contains('\0') {
        return Err(RemotePipError::invalid_argument(
            kind,
            value.replace('\0', "\\0"),
            format!("{kind} contains null byte"),
        ));
    }
    Ok(())
}

/// pip sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipAction {
    /// `pip install`.
    Install,
    /// `pip uninstall -y`.
    Uninstall,
}

impl PipAction {
    /// The pip verb.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

/// A pip invocation to run on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipCommand {
    action: PipAction,
    package: String,
    version: Option<String>,
    args: Vec<String>,
    pip_path: String,
    sudo: bool,
}

impl PipCommand {
    /// `pip install <package>`.
    #[must_use]
    pub fn install(package: impl Into<String>) -> Self {
        Self::new(PipAction::Install, package)
    }

    /// `pip uninstall -y <package>`.
    #[must_use]
    pub fn uninstall(package: impl Into<String>) -> Self {
        Self::new(PipAction::Uninstall, package)
    }

    fn new(action: PipAction, package: impl Into<String>) -> Self {
        Self {
            action,
            package: package.into(),
            version: None,
            args: Vec::new(),
            pip_path: DEFAULT_PIP_PATH.to_string(),
            sudo: true,
        }
    }

    /// Pin a version (`install` only; ignored for `uninstall`).
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set extra pip arguments. Each item is one argument.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pip executable.
    #[must_use]
    pub fn pip_path(mut self, path: impl Into<String>) -> Self {
        self.pip_path = path.into();
        self
    }

    /// Run through `sudo` or not.
    #[must_use]
    pub const fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    /// The sub-command.
    #[must_use]
    pub const fn action(&self) -> PipAction {
        self.action
    }

    /// The requirement as pip sees it: `pkg` or `pkg==version`.
    #[must_use]
    pub fn requirement(&self) -> String {
        match (&self.action, &self.version) {
            (PipAction::Install, Some(version)) => format!("{}=={version}", self.package),
            _ => self.package.clone(),
        }
    }

    /// Render the shell command line.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePipError::InvalidArgument`] for an empty package name,
    /// an empty version or pip path, or any value containing a NUL byte.
    pub fn render(&self) -> Result<String> {
        validate("package", &self.package)?;
        if let Some(version) = &self.version {
            validate("version", version)?;
        }
        validate("pip path", &self.pip_path)?;
        for arg in &self.args {
            if arg.contains('\0') {
                validate("argument", arg)?;
            }
        }

        let prefix = if self.sudo { "sudo" } else { "" };
        let pip = shell_quote(&self.pip_path);
        let verb = self.action.verb();
        let args = self
            .args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ");
        let requirement = self.requirement();
        let target = shell_quote(&requirement);

        Ok(match self.action {
            PipAction::Install => format!("{prefix} {pip} {verb} {args} {target}"),
            PipAction::Uninstall => format!("{prefix} {pip} {verb} {args} -y {target}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn install_without_version() {
        let cmd = PipCommand::install("foo").render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install  foo");
    }

    #[test]
    fn install_with_version() {
        let cmd = PipCommand::install("foo").version("1.2.3").render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install  foo==1.2.3");
    }

    #[test]
    fn install_with_args() {
        let cmd = PipCommand::install("foo")
            .args(["--no-cache-dir"])
            .render()
            .unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install --no-cache-dir foo");
    }

    #[test]
    fn uninstall_layout() {
        let cmd = PipCommand::uninstall("foo").render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip uninstall  -y foo");
    }

    #[test]
    fn uninstall_ignores_version() {
        let cmd = PipCommand::uninstall("foo").version("1.0").render().unwrap();
        assert!(cmd.ends_with("-y foo"));
    }

    #[test]
    fn without_sudo_and_custom_pip() {
        let cmd = PipCommand::install("foo")
            .sudo(false)
            .pip_path("/opt/venv/bin/pip3")
            .render()
            .unwrap();
        assert_eq!(cmd, " /opt/venv/bin/pip3 install  foo");
    }

    #[test]
    fn metacharacters_are_quoted() {
        let cmd = PipCommand::install("foo; rm -rf /").render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install  'foo; rm -rf /'");

        let cmd = PipCommand::install("foo")
            .version("1.0 && reboot")
            .render()
            .unwrap();
        assert!(cmd.ends_with("'foo==1.0 && reboot'"));

        let cmd = PipCommand::install("foo")
            .args(["--index-url", "https://pypi.example/simple?x=$HOME"])
            .render()
            .unwrap();
        assert!(cmd.contains("--index-url 'https://pypi.example/simple?x=$HOME' foo"));
    }

    #[test]
    fn extras_are_quoted() {
        let cmd = PipCommand::install("requests[socks]").render().unwrap();
        assert!(cmd.ends_with("'requests[socks]'"));
    }

    #[test]
    fn shell_quote_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("plain-1.0"), "plain-1.0");
    }

    #[test]
    fn zsh_expansions_are_quoted() {
        assert_eq!(shell_quote("=python3"), "'=python3'");
        assert_eq!(shell_quote("a^b"), "'a^b'");
        assert_eq!(shell_quote("foo==1.0"), "foo==1.0");

        let cmd = PipCommand::install("foo").args(["=ls"]).render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install '=ls' foo");
    }

    #[test]
    fn empty_package_rejected() {
        let err = PipCommand::install("").render().unwrap_err();
        assert!(matches!(err, RemotePipError::InvalidArgument { ref kind, .. } if kind == "package"));
    }

    #[test]
    fn null_bytes_rejected() {
        assert!(PipCommand::install("fo\0o").render().is_err());
        assert!(PipCommand::install("foo").version("1\0").render().is_err());
        assert!(PipCommand::install("foo").args(["-\0"]).render().is_err());
    }

    #[test]
    fn empty_args_are_kept_as_words() {
        let cmd = PipCommand::install("foo").args([""]).render().unwrap();
        assert_eq!(cmd, "sudo /usr/local/bin/pip install '' foo");
    }

    /// Undo `shell_quote` the way a POSIX shell reads a single word.
    fn unquote(word: &str) -> String {
        let mut out = String::new();
        let mut in_quotes = false;
        let mut chars = word.chars();
        while let Some(c) = chars.next() {
            match c {
                '\'' => in_quotes = !in_quotes,
                '\\' if !in_quotes => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }

    proptest! {
        #[test]
        fn quoting_round_trips_through_the_shell(value in "[^\\x00]{0,40}") {
            let quoted = shell_quote(&value);
            prop_assert_eq!(unquote(&quoted), value);
        }

        #[test]
        fn quoted_words_never_expose_metacharacters(value in "[^\\x00]{1,40}") {
            let quoted = shell_quote(&value);
            if quoted.as_ref() == value {
                prop_assert!(value.chars().all(is_shell_safe));
                prop_assert!(!value.starts_with('='));
            } else {
                prop_assert!(quoted.starts_with('\''));
                prop_assert!(quoted.ends_with('\''));
            }
        }
    }
}
