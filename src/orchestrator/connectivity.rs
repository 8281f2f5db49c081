use anyhow::Result;

use super::Orchestrator;
use crate::role::Assignment;
use hostexec::{Executor, PromptScript, RemoteCommand};

const KEY_PATH: &str = "~/.ssh/id_rsa";

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Give the service account a key and authorize it on the peer.
    pub(super) fn connectivity(&self, target: &Assignment<'_>) -> Result<()> {
        let account = &self.config.account;

        let has_key = RemoteCommand::new(format!("test -f {KEY_PATH}")).as_account(account);
        if self.exec.probe(target.host, &has_key) {
            log::info!("[{}] {account} already has an SSH key", target.host);
        } else {
            log::info!("[{}] generating SSH key for {account}", target.host);
            let keygen = RemoteCommand::new(format!(
                "mkdir -p -m 700 ~/.ssh && ssh-keygen -q -t rsa -b 4096 -N '' -f {KEY_PATH}"
            ))
            .as_account(account);
            self.exec
                .run_interactive(target.host, &keygen, &PromptScript::new())?;
        }

        let os_password = &self.config.secrets.os_password;
        let copy = RemoteCommand::new(format!(
            "ssh-copy-id -i {KEY_PATH}.pub {account}@{}",
            target.peer
        ))
        .as_account(account);
        let script = PromptScript::new()
            .expect_optional("continue connecting", "yes")
            .expect_optional(format!("{account}@{}'s password:", target.peer), os_password);
        self.exec.run_interactive(target.host, &copy, &script)?;

        Ok(())
    }
}
