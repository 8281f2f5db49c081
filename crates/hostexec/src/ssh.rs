//! SSH executor using the system `ssh` client.
//!
//! The admin login must authenticate with keys (`BatchMode=yes`). Privilege
//! escalation goes through `sudo`; when a sudo password is configured it is
//! fed on stdin for plain commands and answered as a prompt for interactive
//! ones.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::command::{RemoteCommand, RunAs, quote, redact};
use crate::error::{Error, Result};
use crate::interactive::{PromptScript, Session, SessionEvent, drive};
use crate::types::{CommandOutput, Outcome};
use crate::Executor;

/// Exit status `ssh` uses for its own failures.
const SSH_FAILURE: i32 = 255;

/// Prompt text sudo is told to print in interactive sessions.
const SUDO_PROMPT: &str = "[sudo] password for login: ";

/// Executor that shells out to `ssh`.
#[derive(Clone)]
pub struct SshExecutor {
    user: Option<String>,
    sudo_password: Option<String>,
    options: Vec<String>,
    quiet_period: Duration,
}

impl SshExecutor {
    /// Connect as `user` (or the local default when `None`).
    pub fn new(user: Option<&str>) -> Self {
        Self {
            user: user.map(str::to_string),
            sudo_password: None,
            options: vec![
                "BatchMode=yes".to_string(),
                "ConnectTimeout=15".to_string(),
            ],
            quiet_period: Duration::from_millis(750),
        }
    }

    /// Password for `sudo` on the remote hosts.
    pub fn with_sudo_password(mut self, password: Option<String>) -> Self {
        self.sudo_password = password.filter(|p| !p.is_empty());
        self
    }

    /// Add an `-o` option for every connection.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// How long output must stall before a partial line counts as a prompt.
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    fn destination(&self, host: &str) -> String {
        match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        }
    }

    fn ssh(&self, host: &str, tty: bool) -> Command {
        let mut cmd = Command::new("ssh");
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }
        if tty {
            cmd.arg("-tt");
        }
        cmd.arg(self.destination(host)).arg("--");
        cmd
    }

    /// The command line handed to the remote shell.
    fn remote_line(&self, command: &RemoteCommand, interactive: bool) -> String {
        let body = format!("sh -c {}", quote(command.script()));
        let sudo = if interactive {
            format!("sudo -p {}", quote(SUDO_PROMPT))
        } else if self.sudo_password.is_some() {
            "sudo -S -p ''".to_string()
        } else {
            "sudo -n".to_string()
        };

        match command.run_as() {
            RunAs::Login => body,
            RunAs::Root => format!("{sudo} {body}"),
            RunAs::Account(account) => format!("{sudo} -H -u {} {body}", quote(account)),
        }
    }

    fn transport_error(&self, host: &str, stderr: &str) -> Error {
        let secrets: Vec<String> = self.sudo_password.iter().cloned().collect();
        Error::Transport {
            host: host.to_string(),
            message: redact(stderr.trim(), &secrets),
        }
    }
}

impl Executor for SshExecutor {
    fn execute(&self, host: &str, command: &RemoteCommand) -> Result<Outcome> {
        log::debug!("[{host}] ({}) {command}", command.run_as());

        let feed_password = self.sudo_password.is_some() && command.run_as() != &RunAs::Login;
        let mut child = self
            .ssh(host, false)
            .arg(self.remote_line(command, false))
            .stdin(if feed_password { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (true, Some(password), Some(mut stdin)) =
            (feed_password, self.sudo_password.as_deref(), child.stdin.take())
        {
            // sudo may not ask (cached credentials); a closed pipe is fine
            let _ = writeln!(stdin, "{password}");
        }

        let output = CommandOutput::from(child.wait_with_output()?);
        if output.status == SSH_FAILURE {
            return Err(self.transport_error(host, &output.stderr));
        }
        log::trace!("[{host}] exit {}", output.status);
        Ok(Outcome::from_output(output))
    }

    fn execute_interactive(
        &self,
        host: &str,
        command: &RemoteCommand,
        script: &PromptScript,
    ) -> Result<i32> {
        log::debug!("[{host}] ({}) {command} [interactive]", command.run_as());

        let script = match (&self.sudo_password, command.run_as()) {
            (Some(password), RunAs::Root | RunAs::Account(_)) => {
                script.with_leading_optional(SUDO_PROMPT.trim_end(), password.clone())
            }
            _ => script.clone(),
        };

        let child = self
            .ssh(host, true)
            .arg(self.remote_line(command, true))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut session = SshSession::start(child, self.quiet_period)?;
        let status = drive(&mut session, &script)?;
        if status == SSH_FAILURE {
            return Err(self.transport_error(host, &session.transcript));
        }
        Ok(status)
    }

    fn append_to_file(
        &self,
        host: &str,
        path: &str,
        lines: &[String],
        run_as: &RunAs,
    ) -> Result<()> {
        let quoted: Vec<String> = lines.iter().map(|l| quote(l)).collect();
        let script = format!("printf '%s\\n' {} >> {}", quoted.join(" "), quote(path));
        // file content may carry passwords (recovery.conf), keep it out of logs
        let command = quoted
            .into_iter()
            .fold(RemoteCommand::new(script), RemoteCommand::with_secret)
            .with_run_as(run_as.clone());
        self.run(host, &command)?;
        Ok(())
    }
}

/// An interactive `ssh -tt` session.
///
/// Output is read on background threads. A trailing partial line that stays
/// unchanged for the quiet period is reported as a prompt.
struct SshSession {
    child: Child,
    stdin: ChildStdin,
    chunks: Receiver<Vec<u8>>,
    pending: String,
    transcript: String,
    quiet_period: Duration,
}

impl SshSession {
    fn start(mut child: Child, quiet_period: Duration) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("ssh stdin not captured")))?;

        let (tx, chunks) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx);
        }

        Ok(Self {
            child,
            stdin,
            chunks,
            pending: String::new(),
            transcript: String::new(),
            quiet_period,
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        // a session abandoned mid-dialogue still has a live child; once it is
        // gone the pipes close and the reader threads finish
        if matches!(self.child.try_wait(), Ok(None)) {
            log::debug!("terminating abandoned ssh session");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

impl Session for SshSession {
    fn next_event(&mut self) -> Result<SessionEvent> {
        loop {
            if let Some(pos) = self.pending.find('\n') {
                let line: String = self.pending.drain(..=pos).collect();
                return Ok(SessionEvent::Output(line.trim_end().to_string()));
            }

            match self.chunks.recv_timeout(self.quiet_period) {
                Ok(chunk) => {
                    let text = String::from_utf8_lossy(&chunk);
                    self.transcript.push_str(&text);
                    self.pending.push_str(&text);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.pending.trim().is_empty() {
                        let prompt = std::mem::take(&mut self.pending);
                        return Ok(SessionEvent::Prompt(prompt.trim().to_string()));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.pending.is_empty() {
                        let rest = std::mem::take(&mut self.pending);
                        return Ok(SessionEvent::Output(rest.trim_end().to_string()));
                    }
                    let status = self.child.wait()?;
                    return Ok(SessionEvent::Exited(status.code().unwrap_or(-1)));
                }
            }
        }
    }

    fn respond(&mut self, response: &str) -> Result<()> {
        self.stdin.write_all(response.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }
}
