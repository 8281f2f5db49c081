use anyhow::Result;

use super::{Orchestrator, sql_ident, sql_literal};
use crate::role::Assignment;
use hostexec::{Executor, PromptScript, RemoteCommand, quote};
use pkgkit::Installer;

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Install the server packages and set the service account's passwords.
    pub(super) fn install(&self, target: &Assignment<'_>) -> Result<()> {
        let packages = &self.config.packages;
        let installer = Installer::new(self.exec, target.host, packages.manager);
        let installed = installer.ensure_all(&packages.specs())?;
        log::info!(
            "[{}] {installed} of {} package(s) installed now",
            target.host,
            packages.names.len()
        );

        let account = &self.config.account;
        let secrets = &self.config.secrets;

        // passwd asks twice
        let script = PromptScript::new()
            .expect("password:", &secrets.os_password)
            .expect("password:", &secrets.os_password);
        self.exec.run_interactive(
            target.host,
            &RemoteCommand::sudo(format!("passwd {}", quote(account))),
            &script,
        )?;

        let sql = format!(
            "ALTER USER {} WITH PASSWORD {};",
            sql_ident(account),
            sql_literal(&secrets.superuser_password)
        );
        let alter = RemoteCommand::new(format!("psql -d template1 -c {}", quote(&sql)))
            .as_account(account)
            .with_secret(&secrets.superuser_password);
        self.exec
            .run_interactive(target.host, &alter, &PromptScript::new())?;

        Ok(())
    }
}
