//! Command results.

use crate::command::RemoteCommand;
use crate::error::{Error, Result};

/// Captured result of a finished remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status (-1 if the process was killed by a signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// An output with the given status and stdout.
    pub fn new(status: i32, stdout: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout with surrounding whitespace removed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// What a remote command reported.
///
/// There is no fatal variant: whether [`Outcome::Negative`] aborts the run is
/// the caller's decision (see [`Outcome::require`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit status zero
    Success(CommandOutput),
    /// Non-zero exit status
    Negative(CommandOutput),
}

impl Outcome {
    /// Classify a finished command by its exit status.
    pub fn from_output(output: CommandOutput) -> Self {
        if output.success() {
            Self::Success(output)
        } else {
            Self::Negative(output)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn output(&self) -> &CommandOutput {
        match self {
            Self::Success(output) | Self::Negative(output) => output,
        }
    }

    pub fn into_output(self) -> CommandOutput {
        match self {
            Self::Success(output) | Self::Negative(output) => output,
        }
    }

    /// Treat a negative outcome as fatal.
    pub fn require(self, host: &str, command: &RemoteCommand) -> Result<CommandOutput> {
        match self {
            Self::Success(output) => Ok(output),
            Self::Negative(output) => Err(Error::RemoteCommand {
                host: host.to_string(),
                command: command.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_output() {
        assert!(Outcome::from_output(CommandOutput::new(0, "")).is_success());
        assert!(!Outcome::from_output(CommandOutput::new(1, "")).is_success());
    }

    #[test]
    fn test_require_success_returns_output() {
        let cmd = RemoteCommand::new("echo hi");
        let output = Outcome::from_output(CommandOutput::new(0, "hi\n"))
            .require("db1", &cmd)
            .unwrap();
        assert_eq!(output.stdout_trimmed(), "hi");
    }

    #[test]
    fn test_require_negative_names_host_and_status() {
        let cmd = RemoteCommand::sudo("service postgresql stop");
        let err = Outcome::from_output(CommandOutput::new(3, ""))
            .require("10.0.0.1", &cmd)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.1"));
        assert!(msg.contains("service postgresql stop"));
        assert!(msg.contains('3'));
    }
}
