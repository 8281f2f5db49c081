//! Scripted answers for interactive programs.
//!
//! A [`PromptScript`] is an ordered list of expected prompts and the response
//! to send for each. [`drive`] consumes it against a running [`Session`]:
//!
//! - each prompt the program emits must contain the next required step's text
//! - optional steps are skipped when the prompt does not match them
//! - a prompt after the script is used up fails with
//!   [`Error::PromptExhausted`]
//!
//! Optional steps cover prompts that only appear on first contact, such as
//! SSH host-key confirmation.

use std::fmt;

use crate::error::{Error, Result};

/// One expected prompt and its response.
#[derive(Clone, PartialEq, Eq)]
pub struct PromptStep {
    /// Substring the prompt must contain
    pub expect: String,
    /// Line sent back (a newline is appended by the session)
    pub respond: String,
    /// Whether the prompt may not appear at all
    pub optional: bool,
}

impl fmt::Debug for PromptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptStep")
            .field("expect", &self.expect)
            .field("respond", &"***")
            .field("optional", &self.optional)
            .finish()
    }
}

/// Ordered prompt/response pairs for a single interactive command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptScript {
    steps: Vec<PromptStep>,
}

impl PromptScript {
    /// An empty script, for programs that should never prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `prompt`, answering with `response`.
    pub fn expect(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.steps.push(PromptStep {
            expect: prompt.into(),
            respond: response.into(),
            optional: false,
        });
        self
    }

    /// Answer `prompt` with `response` if it appears.
    pub fn expect_optional(
        mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.steps.push(PromptStep {
            expect: prompt.into(),
            respond: response.into(),
            optional: true,
        });
        self
    }

    /// Put an optional step in front of the script.
    pub fn with_leading_optional(
        &self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(PromptStep {
            expect: prompt.into(),
            respond: response.into(),
            optional: true,
        });
        steps.extend(self.steps.iter().cloned());
        Self { steps }
    }

    /// Steps in order.
    pub fn steps(&self) -> &[PromptStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the script expects no prompts.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every response, for masking in logs.
    pub fn responses(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.respond.as_str())
    }
}

/// Something an interactive program did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A complete line of output
    Output(String),
    /// The program is waiting for input after printing this text
    Prompt(String),
    /// The program exited with this status
    Exited(i32),
}

/// A running interactive program.
pub trait Session {
    /// Block until the program prints a line, prompts, or exits.
    fn next_event(&mut self) -> Result<SessionEvent>;

    /// Send one line of input.
    fn respond(&mut self, response: &str) -> Result<()>;
}

/// Answer every prompt of `session` from `script` and return its exit status.
pub fn drive(session: &mut dyn Session, script: &PromptScript) -> Result<i32> {
    let steps = script.steps();
    let mut cursor = 0;

    loop {
        match session.next_event()? {
            SessionEvent::Output(line) => log::debug!("| {line}"),
            SessionEvent::Prompt(prompt) => {
                let step = next_step(steps, &mut cursor, &prompt)?;
                log::debug!("answering prompt {prompt:?}");
                session.respond(&step.respond)?;
            }
            SessionEvent::Exited(status) => {
                let unanswered: Vec<&str> = steps[cursor..]
                    .iter()
                    .filter(|s| !s.optional)
                    .map(|s| s.expect.as_str())
                    .collect();
                if !unanswered.is_empty() {
                    log::warn!("program exited before prompting for {unanswered:?}");
                }
                return Ok(status);
            }
        }
    }
}

fn next_step<'a>(steps: &'a [PromptStep], cursor: &mut usize, prompt: &str) -> Result<&'a PromptStep> {
    if *cursor >= steps.len() {
        return Err(Error::PromptExhausted {
            prompt: prompt.to_string(),
        });
    }

    for (index, step) in steps.iter().enumerate().skip(*cursor) {
        if prompt.contains(&step.expect) {
            *cursor = index + 1;
            return Ok(step);
        }
        if !step.optional {
            return Err(Error::PromptMismatch {
                expected: step.expect.clone(),
                actual: prompt.to_string(),
            });
        }
    }

    Err(Error::PromptMismatch {
        expected: steps[*cursor].expect.clone(),
        actual: prompt.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A fake program that emits fixed prompts and records what it receives.
    struct FakeProgram {
        prompts: VecDeque<String>,
        received: Vec<String>,
        status: i32,
    }

    impl FakeProgram {
        fn new(prompts: &[&str], status: i32) -> Self {
            Self {
                prompts: prompts.iter().map(|p| (*p).to_string()).collect(),
                received: Vec::new(),
                status,
            }
        }
    }

    impl Session for FakeProgram {
        fn next_event(&mut self) -> Result<SessionEvent> {
            Ok(match self.prompts.pop_front() {
                Some(prompt) => SessionEvent::Prompt(prompt),
                None => SessionEvent::Exited(self.status),
            })
        }

        fn respond(&mut self, response: &str) -> Result<()> {
            self.received.push(response.to_string());
            Ok(())
        }
    }

    fn passwd_script() -> PromptScript {
        PromptScript::new()
            .expect("Enter new UNIX password:", "fluffysock")
            .expect("Retype new UNIX password:", "fluffysock")
    }

    #[test]
    fn test_drive_matching_prompts_returns_exit_status() {
        let mut program =
            FakeProgram::new(&["Enter new UNIX password: ", "Retype new UNIX password: "], 0);
        let status = drive(&mut program, &passwd_script()).unwrap();
        assert_eq!(status, 0);
        assert_eq!(program.received, vec!["fluffysock", "fluffysock"]);
    }

    #[test]
    fn test_drive_passes_through_non_zero_status() {
        let mut program =
            FakeProgram::new(&["Enter new UNIX password:", "Retype new UNIX password:"], 10);
        assert_eq!(drive(&mut program, &passwd_script()).unwrap(), 10);
    }

    #[test]
    fn test_drive_extra_prompt_is_exhausted() {
        let mut program = FakeProgram::new(
            &[
                "Enter new UNIX password:",
                "Retype new UNIX password:",
                "Enter it a third time:",
            ],
            0,
        );
        let err = drive(&mut program, &passwd_script()).unwrap_err();
        assert!(matches!(err, Error::PromptExhausted { ref prompt } if prompt == "Enter it a third time:"));
    }

    #[test]
    fn test_drive_empty_script_rejects_any_prompt() {
        let mut program = FakeProgram::new(&["Overwrite (y/n)?"], 0);
        let err = drive(&mut program, &PromptScript::new()).unwrap_err();
        assert!(matches!(err, Error::PromptExhausted { .. }));
    }

    #[test]
    fn test_drive_empty_script_without_prompts() {
        let mut program = FakeProgram::new(&[], 0);
        assert_eq!(drive(&mut program, &PromptScript::new()).unwrap(), 0);
    }

    #[test]
    fn test_drive_wrong_prompt_is_mismatch() {
        let mut program = FakeProgram::new(&["Current password:"], 0);
        let err = drive(&mut program, &passwd_script()).unwrap_err();
        match err {
            Error::PromptMismatch { expected, actual } => {
                assert_eq!(expected, "Enter new UNIX password:");
                assert_eq!(actual, "Current password:");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(program.received.is_empty());
    }

    #[test]
    fn test_optional_step_is_skipped_when_absent() {
        let script = PromptScript::new()
            .expect_optional("continue connecting (yes/no", "yes")
            .expect("postgres@10.0.0.2's password:", "pw");
        let mut program = FakeProgram::new(&["postgres@10.0.0.2's password: "], 0);
        assert_eq!(drive(&mut program, &script).unwrap(), 0);
        assert_eq!(program.received, vec!["pw"]);
    }

    #[test]
    fn test_optional_step_is_answered_when_present() {
        let script = PromptScript::new()
            .expect_optional("continue connecting (yes/no", "yes")
            .expect("password:", "pw");
        let mut program = FakeProgram::new(
            &[
                "Are you sure you want to continue connecting (yes/no)? ",
                "postgres@10.0.0.2's password: ",
            ],
            0,
        );
        assert_eq!(drive(&mut program, &script).unwrap(), 0);
        assert_eq!(program.received, vec!["yes", "pw"]);
    }

    #[test]
    fn test_program_exiting_early_keeps_status() {
        let mut program = FakeProgram::new(&["Enter new UNIX password:"], 0);
        assert_eq!(drive(&mut program, &passwd_script()).unwrap(), 0);
        assert_eq!(program.received.len(), 1);
    }

    #[test]
    fn test_leading_optional_step() {
        let script = passwd_script().with_leading_optional("[sudo] password", "admin");
        assert_eq!(script.len(), 3);
        assert!(script.steps()[0].optional);
        assert_eq!(script.steps()[1].expect, "Enter new UNIX password:");
    }

    #[test]
    fn test_debug_hides_responses() {
        let shown = format!("{:?}", passwd_script());
        assert!(!shown.contains("fluffysock"));
    }
}
