//! Remote command description.

use std::fmt;

/// Which account a remote command runs as.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunAs {
    /// The SSH login user, without privilege escalation
    #[default]
    Login,
    /// root, through sudo
    Root,
    /// A named system account, through sudo
    Account(String),
}

impl RunAs {
    /// Shorthand for [`RunAs::Account`].
    pub fn account(name: impl Into<String>) -> Self {
        Self::Account(name.into())
    }
}

impl fmt::Display for RunAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login user"),
            Self::Root => write!(f, "root"),
            Self::Account(name) => write!(f, "{name}"),
        }
    }
}

/// A shell command to run on a remote host.
///
/// Secrets embedded in the script are registered with
/// [`RemoteCommand::with_secret`] and replaced by `***` whenever the command
/// is displayed or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    script: String,
    run_as: RunAs,
    secrets: Vec<String>,
}

impl RemoteCommand {
    /// A command run as the login user.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            run_as: RunAs::Login,
            secrets: Vec::new(),
        }
    }

    /// A command run as root.
    pub fn sudo(script: impl Into<String>) -> Self {
        Self::new(script).with_run_as(RunAs::Root)
    }

    /// Run as the named account instead.
    pub fn as_account(self, account: impl Into<String>) -> Self {
        self.with_run_as(RunAs::Account(account.into()))
    }

    /// Run as `run_as` instead.
    pub fn with_run_as(mut self, run_as: RunAs) -> Self {
        self.run_as = run_as;
        self
    }

    /// Mark a value in the script as secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// The raw shell text, secrets included.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// The account the command runs as.
    pub fn run_as(&self) -> &RunAs {
        &self.run_as
    }

    /// The script with every registered secret masked.
    pub fn redacted(&self) -> String {
        redact(&self.script, &self.secrets)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCommand")
            .field("script", &self.redacted())
            .field("run_as", &self.run_as)
            .finish_non_exhaustive()
    }
}

pub(crate) fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
}

/// Quote `value` for a POSIX shell.
///
/// Plain words pass through unchanged; everything else is wrapped in single
/// quotes.
pub fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | '=' | ',' | '+'));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
