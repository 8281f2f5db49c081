//! # hostexec
//!
//! Remote command execution for host bootstrapping.
//!
//! This crate provides the boundary between an orchestrator and the hosts it
//! drives:
//! - Running a shell command on a named host, optionally as another account
//! - Appending lines to remote files
//! - Driving interactive programs with a [`PromptScript`]
//!
//! ## Outcomes
//!
//! Every command returns a typed [`Outcome`] instead of failing on a non-zero
//! exit status. Call sites decide the policy:
//!
//! ```no_run
//! use hostexec::{Executor, RemoteCommand, SshExecutor};
//!
//! let ssh = SshExecutor::new(Some("admin"));
//! let probe = RemoteCommand::sudo("test -f /etc/postgresql/9.1/main/postgresql.conf");
//!
//! // Tolerant: a negative outcome (or a transport failure) means "absent"
//! if !ssh.probe("10.0.0.1", &probe) {
//!     println!("not configured yet");
//! }
//!
//! // Fatal: a negative outcome becomes an error naming host, command and status
//! let stop = RemoteCommand::sudo("service postgresql stop");
//! ssh.run("10.0.0.1", &stop).expect("stop failed");
//! ```
//!
//! ## Interactive programs
//!
//! ```no_run
//! use hostexec::{Executor, PromptScript, RemoteCommand, SshExecutor};
//!
//! let ssh = SshExecutor::new(Some("admin"));
//! let script = PromptScript::new()
//!     .expect("password:", "s3cret")
//!     .expect("password:", "s3cret");
//! ssh.run_interactive("10.0.0.1", &RemoteCommand::sudo("passwd postgres"), &script)
//!     .expect("passwd failed");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod interactive;
pub mod ssh;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod simulated;

pub use command::{RemoteCommand, RunAs, quote};
pub use error::{Error, Result};
pub use interactive::{PromptScript, PromptStep, Session, SessionEvent, drive};
pub use ssh::SshExecutor;
pub use types::{CommandOutput, Outcome};

#[cfg(any(test, feature = "testing"))]
pub use simulated::{Call, SimulatedExecutor};

/// Executes commands on remote hosts.
///
/// Implementations only report what happened; whether a non-zero exit is
/// fatal is decided by the caller through [`Executor::run`] or
/// [`Executor::probe`].
pub trait Executor {
    /// Run a command and capture its exit status and output.
    ///
    /// `Err` is reserved for failures to run the command at all.
    fn execute(&self, host: &str, command: &RemoteCommand) -> Result<Outcome>;

    /// Run a command that blocks on prompts, answering them from `script`.
    ///
    /// Returns the program's exit status.
    fn execute_interactive(
        &self,
        host: &str,
        command: &RemoteCommand,
        script: &PromptScript,
    ) -> Result<i32>;

    /// Append `lines` to the file at `path`, creating it if needed.
    fn append_to_file(&self, host: &str, path: &str, lines: &[String], run_as: &RunAs)
    -> Result<()>;

    /// Read a remote file. `Ok(None)` means it could not be read.
    fn read_file(&self, host: &str, path: &str, run_as: &RunAs) -> Result<Option<String>> {
        let command = RemoteCommand::new(format!("cat -- {}", quote(path))).with_run_as(run_as.clone());
        match self.execute(host, &command)? {
            Outcome::Success(output) => Ok(Some(output.stdout)),
            Outcome::Negative(_) => Ok(None),
        }
    }

    /// Run a command that must succeed.
    fn run(&self, host: &str, command: &RemoteCommand) -> Result<CommandOutput> {
        self.execute(host, command)?.require(host, command)
    }

    /// Run a tolerant check. Failure to run the check counts as negative.
    fn probe(&self, host: &str, command: &RemoteCommand) -> bool {
        match self.execute(host, command) {
            Ok(outcome) => {
                log::debug!(
                    "probe on {host}: {command} -> {}",
                    if outcome.is_success() { "present" } else { "absent" }
                );
                outcome.is_success()
            }
            Err(e) => {
                log::debug!("probe on {host}: {command} could not run ({e}), treating as absent");
                false
            }
        }
    }

    /// Run an interactive command that must exit with status zero.
    fn run_interactive(
        &self,
        host: &str,
        command: &RemoteCommand,
        script: &PromptScript,
    ) -> Result<()> {
        let status = self.execute_interactive(host, command, script)?;
        if status != 0 {
            return Err(Error::RemoteCommand {
                host: host.to_string(),
                command: command.to_string(),
                status,
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, host: &str, command: &RemoteCommand) -> Result<Outcome> {
        (**self).execute(host, command)
    }

    fn execute_interactive(
        &self,
        host: &str,
        command: &RemoteCommand,
        script: &PromptScript,
    ) -> Result<i32> {
        (**self).execute_interactive(host, command, script)
    }

    fn append_to_file(
        &self,
        host: &str,
        path: &str,
        lines: &[String],
        run_as: &RunAs,
    ) -> Result<()> {
        (**self).append_to_file(host, path, lines, run_as)
    }

    fn read_file(&self, host: &str, path: &str, run_as: &RunAs) -> Result<Option<String>> {
        (**self).read_file(host, path, run_as)
    }
}
