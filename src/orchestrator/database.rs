use anyhow::Result;

use super::{Orchestrator, sql_ident, sql_literal};
use crate::cluster::ClusterInfo;
use crate::config::DatabaseConfig;
use crate::error::ConfigurationError;
use crate::role::Assignment;
use hostexec::{Executor, PromptScript, RemoteCommand, quote};

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Create the application database on the primary. The standby gets it
    /// through replication.
    pub(super) fn database(&self, target: &Assignment<'_>) -> Result<()> {
        let Some(database) = &self.config.database else {
            log::info!("[{}] no [database] configured, nothing to do", target.host);
            return Ok(());
        };
        if !target.is_primary() {
            log::info!("[{}] standby receives {} from the primary", target.host, database.name);
            return Ok(());
        }

        let cluster = self.discover(target)?;
        let owner = self.config.database_owner(database);
        if owner != self.config.account {
            self.ensure_owner(target, &cluster, owner)?;
        }

        let sql = format!("SELECT 1 FROM pg_database WHERE datname={}", sql_literal(&database.name));
        if self.psql_value(target, &cluster, &sql).as_deref() == Some("1") {
            log::info!("[{}] database {} already exists", target.host, database.name);
        } else {
            self.create_database(target, &cluster, database, owner)?;
        }

        for extension in &database.extensions {
            let sql = format!("CREATE EXTENSION IF NOT EXISTS {};", sql_ident(extension));
            self.exec
                .run(target.host, &self.psql(&cluster, Some(&database.name), &sql))?;
        }

        Ok(())
    }

    fn ensure_owner(&self, target: &Assignment<'_>, cluster: &ClusterInfo, owner: &str) -> Result<()> {
        if self.role_exists(target, cluster, owner) {
            return Ok(());
        }
        let password = self.config.secrets.db_owner_password.as_deref().ok_or(
            ConfigurationError::MissingSecret {
                what: "database owner password",
                flag: "db-owner-password",
                env: "PGPAIR_DB_OWNER_PASSWORD",
            },
        )?;

        log::info!("[{}] creating role {owner}", target.host);
        let command = RemoteCommand::new(format!(
            "createuser -p {} -d -S -R -P {}",
            cluster.port,
            quote(owner)
        ))
        .as_account(&self.config.account);
        let script = PromptScript::new()
            .expect("Enter password for new role:", password)
            .expect("Enter it again:", password);
        self.exec.run_interactive(target.host, &command, &script)?;
        Ok(())
    }

    fn create_database(
        &self,
        target: &Assignment<'_>,
        cluster: &ClusterInfo,
        database: &DatabaseConfig,
        owner: &str,
    ) -> Result<()> {
        log::info!("[{}] creating database {} owned by {owner}", target.host, database.name);
        let command = RemoteCommand::new(format!(
            "createdb -p {} -O {} {}",
            cluster.port,
            quote(owner),
            quote(&database.name)
        ))
        .as_account(&self.config.account);
        self.exec.run(target.host, &command)?;
        Ok(())
    }
}
