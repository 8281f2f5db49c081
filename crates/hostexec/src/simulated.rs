//! In-memory hosts for tests.
//!
//! [`SimulatedExecutor`] records every call in order, keeps a file map per
//! host, and answers commands from registered responses. Unmatched commands
//! succeed with empty output; unmatched interactive commands emit no prompts
//! and exit zero.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Executor;
use crate::command::{RemoteCommand, RunAs};
use crate::error::{Error, Result};
use crate::interactive::{PromptScript, Session, SessionEvent, drive};
use crate::types::{CommandOutput, Outcome};

/// A recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// [`Executor::execute`]
    Execute {
        /// Target host
        host: String,
        /// Raw script
        script: String,
        /// Account
        run_as: RunAs,
    },
    /// [`Executor::execute_interactive`]
    Interactive {
        /// Target host
        host: String,
        /// Raw script
        script: String,
        /// Account
        run_as: RunAs,
        /// Responses sent, in order
        responses: Vec<String>,
    },
    /// [`Executor::append_to_file`]
    Append {
        /// Target host
        host: String,
        /// File appended to
        path: String,
        /// Lines appended
        lines: Vec<String>,
        /// Account
        run_as: RunAs,
    },
    /// [`Executor::read_file`]
    Read {
        /// Target host
        host: String,
        /// File read
        path: String,
    },
}

impl Call {
    /// Host the call targeted.
    pub fn host(&self) -> &str {
        match self {
            Self::Execute { host, .. }
            | Self::Interactive { host, .. }
            | Self::Append { host, .. }
            | Self::Read { host, .. } => host,
        }
    }

    /// Script of an execute or interactive call.
    pub fn script(&self) -> Option<&str> {
        match self {
            Self::Execute { script, .. } | Self::Interactive { script, .. } => Some(script),
            _ => None,
        }
    }

    /// Whether this call ran a script on `host` containing `needle`.
    pub fn runs(&self, host: &str, needle: &str) -> bool {
        self.host() == host && self.script().is_some_and(|s| s.contains(needle))
    }
}

struct Response {
    host: Option<String>,
    needle: String,
    output: CommandOutput,
}

struct PromptResponse {
    host: Option<String>,
    needle: String,
    prompts: Vec<String>,
    status: i32,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    files: BTreeMap<(String, String), String>,
    responses: Vec<Response>,
    prompts: Vec<PromptResponse>,
    unreachable: Vec<String>,
}

fn applies(rule_host: Option<&String>, needle: &str, host: &str, script: &str) -> bool {
    rule_host.is_none_or(|h| h == host) && script.contains(needle)
}

/// Executor backed by in-memory hosts.
#[derive(Default)]
pub struct SimulatedExecutor {
    state: Mutex<State>,
}

impl SimulatedExecutor {
    /// Hosts with no files and no registered responses.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer commands containing `needle` on any host. Later rules win.
    pub fn respond(&self, needle: &str, status: i32, stdout: &str) -> &Self {
        self.state().responses.push(Response {
            host: None,
            needle: needle.to_string(),
            output: CommandOutput::new(status, stdout),
        });
        self
    }

    /// Answer commands containing `needle` on `host` only.
    pub fn respond_on(&self, host: &str, needle: &str, status: i32, stdout: &str) -> &Self {
        self.state().responses.push(Response {
            host: Some(host.to_string()),
            needle: needle.to_string(),
            output: CommandOutput::new(status, stdout),
        });
        self
    }

    /// Make interactive commands containing `needle` emit `prompts`, then exit.
    pub fn prompts(&self, needle: &str, prompts: &[&str], status: i32) -> &Self {
        self.state().prompts.push(PromptResponse {
            host: None,
            needle: needle.to_string(),
            prompts: prompts.iter().map(|p| (*p).to_string()).collect(),
            status,
        });
        self
    }

    /// Make every call to `host` fail with a transport error.
    pub fn unreachable(&self, host: &str) -> &Self {
        self.state().unreachable.push(host.to_string());
        self
    }

    /// Put a file on a host.
    pub fn seed_file(&self, host: &str, path: &str, content: &str) -> &Self {
        self.state()
            .files
            .insert((host.to_string(), path.to_string()), content.to_string());
        self
    }

    /// Current content of a file on a host.
    pub fn file(&self, host: &str, path: &str) -> Option<String> {
        self.state()
            .files
            .get(&(host.to_string(), path.to_string()))
            .cloned()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.state().calls.iter().position(pred)
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn check_reachable(&self, host: &str) -> Result<()> {
        if self.state().unreachable.iter().any(|h| h == host) {
            return Err(Error::Transport {
                host: host.to_string(),
                message: "simulated host unreachable".to_string(),
            });
        }
        Ok(())
    }
}

impl Executor for SimulatedExecutor {
    fn execute(&self, host: &str, command: &RemoteCommand) -> Result<Outcome> {
        self.check_reachable(host)?;
        let mut state = self.state();
        state.calls.push(Call::Execute {
            host: host.to_string(),
            script: command.script().to_string(),
            run_as: command.run_as().clone(),
        });
        let output = state
            .responses
            .iter()
            .rev()
            .find(|r| applies(r.host.as_ref(), &r.needle, host, command.script()))
            .map(|r| r.output.clone())
            .unwrap_or_default();
        Ok(Outcome::from_output(output))
    }

    fn execute_interactive(
        &self,
        host: &str,
        command: &RemoteCommand,
        script: &PromptScript,
    ) -> Result<i32> {
        self.check_reachable(host)?;
        let (prompts, status) = {
            let state = self.state();
            state
                .prompts
                .iter()
                .rev()
                .find(|p| applies(p.host.as_ref(), &p.needle, host, command.script()))
                .map(|p| (p.prompts.clone(), p.status))
                .unwrap_or_default()
        };

        let mut session = ScriptedSession {
            prompts: prompts.into(),
            responses: Vec::new(),
            status,
        };
        let result = drive(&mut session, script);

        self.state().calls.push(Call::Interactive {
            host: host.to_string(),
            script: command.script().to_string(),
            run_as: command.run_as().clone(),
            responses: session.responses,
        });
        result
    }

    fn append_to_file(
        &self,
        host: &str,
        path: &str,
        lines: &[String],
        run_as: &RunAs,
    ) -> Result<()> {
        self.check_reachable(host)?;
        let mut state = self.state();
        state.calls.push(Call::Append {
            host: host.to_string(),
            path: path.to_string(),
            lines: lines.to_vec(),
            run_as: run_as.clone(),
        });
        let content = state
            .files
            .entry((host.to_string(), path.to_string()))
            .or_default();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        Ok(())
    }

    fn read_file(&self, host: &str, path: &str, _run_as: &RunAs) -> Result<Option<String>> {
        self.check_reachable(host)?;
        let mut state = self.state();
        state.calls.push(Call::Read {
            host: host.to_string(),
            path: path.to_string(),
        });
        Ok(state.files.get(&(host.to_string(), path.to_string())).cloned())
    }
}

struct ScriptedSession {
    prompts: VecDeque<String>,
    responses: Vec<String>,
    status: i32,
}

impl Session for ScriptedSession {
    fn next_event(&mut self) -> Result<SessionEvent> {
        Ok(match self.prompts.pop_front() {
            Some(prompt) => SessionEvent::Prompt(prompt),
            None => SessionEvent::Exited(self.status),
        })
    }

    fn respond(&mut self, response: &str) -> Result<()> {
        self.responses.push(response.to_string());
        Ok(())
    }
}
