//! Error types for remote execution.
//!
//! A negative probe is not an error; see [`crate::Outcome`]. Everything here
//! aborts the operation that produced it.

use thiserror::Error;

/// Errors that can occur while driving a remote host.
#[derive(Debug, Error)]
pub enum Error {
    /// A command that had to succeed exited non-zero
    #[error("`{command}` on {host} exited with status {status}{}", stderr_suffix(.stderr))]
    RemoteCommand {
        /// Host the command ran on
        host: String,
        /// The command, with secrets masked
        command: String,
        /// Exit status
        status: i32,
        /// Trimmed standard error, possibly empty
        stderr: String,
    },

    /// The host could not be reached or the transport failed
    #[error("cannot reach {host}: {message}")]
    Transport {
        /// Host that could not be reached
        host: String,
        /// What the transport reported
        message: String,
    },

    /// An interactive program emitted a prompt the script did not expect
    #[error("unexpected prompt {actual:?} (expected {expected:?})")]
    PromptMismatch {
        /// The next prompt the script expected
        expected: String,
        /// What the program actually asked
        actual: String,
    },

    /// An interactive program asked for more input than was scripted
    #[error("prompt script exhausted, program still asking {prompt:?}")]
    PromptExhausted {
        /// The unanswered prompt
        prompt: String,
    },

    /// Local IO error (spawning ssh, pipes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the driven program's interactive behavior changed.
    pub fn is_prompt_error(&self) -> bool {
        matches!(self, Self::PromptMismatch { .. } | Self::PromptExhausted { .. })
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result type for remote execution.
pub type Result<T> = std::result::Result<T, Error>;
