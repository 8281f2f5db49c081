//! Replication bring-up.
//!
//! Each [`Phase`] runs on one host at a time and branches on the host's
//! role. Phases can be run individually, in order, by the operator, or all at
//! once through the [`Coordinator`].
//!
//! | Phase          | Primary                                  | Standby                         |
//! |----------------|------------------------------------------|---------------------------------|
//! | `install`      | packages, OS and superuser passwords     | same                            |
//! | `connectivity` | service-account key, copied to standby   | key, copied to primary          |
//! | `configure`    | replication login, stop, conf, hba       | stop, conf, hba                 |
//! | `backup`       | start, script, bracketed rsync, recovery | script, recovery                |
//! | `bringup`      | -                                        | start                           |
//! | `database`     | application database and extensions      | -                               |

mod backup;
mod bringup;
mod connectivity;
mod coordinator;
mod database;
mod install;
mod replication;

pub use coordinator::{Coordinator, Step};

use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;

use crate::cluster::ClusterInfo;
use crate::config::ClusterConfig;
use crate::error::ConfigurationError;
use crate::role::{self, Assignment};
use hostexec::{Executor, RemoteCommand, quote};

/// Label passed to the backup start function
pub const BACKUP_LABEL: &str = "base_backup";

/// A step of the bring-up, run once per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Install,
    Connectivity,
    Configure,
    Backup,
    Bringup,
    Database,
}

impl Phase {
    /// Every phase, in bring-up order.
    pub const ALL: [Self; 6] = [
        Self::Install,
        Self::Connectivity,
        Self::Configure,
        Self::Backup,
        Self::Bringup,
        Self::Database,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Connectivity => "connectivity",
            Self::Configure => "configure",
            Self::Backup => "backup",
            Self::Bringup => "bringup",
            Self::Database => "database",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Install => "Install packages and set account passwords",
            Self::Connectivity => "Exchange service-account SSH keys",
            Self::Configure => "Create the replication login and configure the server",
            Self::Backup => "Copy the primary's data directory to the standby",
            Self::Bringup => "Start the standby",
            Self::Database => "Create the application database",
        }
    }

    fn expected() -> String {
        Self::ALL.map(Self::name).join(", ")
    }

    /// Phases to run given `--only` / `--skip` lists (comma separated).
    ///
    /// `only` wins when both are given. The result is always in bring-up
    /// order.
    pub fn select(only: Option<&str>, skip: Option<&str>) -> Result<Vec<Self>, ConfigurationError> {
        let parse_list = |list: &str| -> Result<Vec<Self>, ConfigurationError> {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect()
        };

        if let Some(only) = only {
            let wanted = parse_list(only)?;
            return Ok(Self::ALL.into_iter().filter(|p| wanted.contains(p)).collect());
        }
        if let Some(skip) = skip {
            let skipped = parse_list(skip)?;
            return Ok(Self::ALL.into_iter().filter(|p| !skipped.contains(p)).collect());
        }
        Ok(Self::ALL.to_vec())
    }
}

impl FromStr for Phase {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "install" | "packages" => Ok(Self::Install),
            "connectivity" | "ssh" | "keys" => Ok(Self::Connectivity),
            "configure" | "replication" => Ok(Self::Configure),
            "backup" | "base-backup" | "basebackup" => Ok(Self::Backup),
            "bringup" | "bring-up" | "start" => Ok(Self::Bringup),
            "database" | "db" => Ok(Self::Database),
            _ => Err(ConfigurationError::UnknownPhase(s.to_string(), Self::expected())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs phases against hosts of one configured pair.
pub struct Orchestrator<'a, E: Executor + ?Sized> {
    config: &'a ClusterConfig,
    exec: &'a E,
}

impl<'a, E: Executor + ?Sized> Orchestrator<'a, E> {
    pub fn new(config: &'a ClusterConfig, exec: &'a E) -> Self {
        Self { config, exec }
    }

    pub fn config(&self) -> &'a ClusterConfig {
        self.config
    }

    /// Run one phase on `host`.
    pub fn run(&self, phase: Phase, host: &str) -> Result<()> {
        let target = role::resolve(host, self.config)?;
        log::info!("[{host}] {phase} phase as {}", target.role);

        match phase {
            Phase::Install => self.install(&target),
            Phase::Connectivity => self.connectivity(&target),
            Phase::Configure => self.configure(&target),
            Phase::Backup => self.backup(&target),
            Phase::Bringup => self.bringup(&target),
            Phase::Database => self.database(&target),
        }
        .with_context(|| format!("{phase} phase failed on {host} ({})", target.role))
    }

    fn discover(&self, target: &Assignment<'_>) -> Result<ClusterInfo> {
        crate::cluster::discover(self.exec, target.host, &self.config.account)
    }

    fn service(&self, target: &Assignment<'_>, action: &str) -> Result<()> {
        log::info!("[{}] {action} {}", target.host, self.config.service);
        let command = RemoteCommand::sudo(format!("service {} {action}", quote(&self.config.service)));
        self.exec.run(target.host, &command)?;
        Ok(())
    }

    /// `psql` as the service account against the discovered cluster.
    fn psql(&self, cluster: &ClusterInfo, database: Option<&str>, sql: &str) -> RemoteCommand {
        let database = database.map_or_else(String::new, |db| format!(" -d {}", quote(db)));
        RemoteCommand::new(format!("psql -p {}{database} -c {}", cluster.port, quote(sql)))
            .as_account(&self.config.account)
    }

    /// Tolerant single-value query. `None` when the query fails.
    fn psql_value(&self, target: &Assignment<'_>, cluster: &ClusterInfo, sql: &str) -> Option<String> {
        let command = RemoteCommand::new(format!("psql -p {} -tAc {}", cluster.port, quote(sql)))
            .as_account(&self.config.account);
        match self.exec.execute(target.host, &command) {
            Ok(outcome) if outcome.is_success() => Some(outcome.into_output().stdout_trimmed().to_string()),
            Ok(_) => None,
            Err(e) => {
                log::debug!("[{}] query failed: {e}", target.host);
                None
            }
        }
    }

    fn role_exists(&self, target: &Assignment<'_>, cluster: &ClusterInfo, name: &str) -> bool {
        let sql = format!("SELECT 1 FROM pg_roles WHERE rolname={}", sql_literal(name));
        self.psql_value(target, cluster, &sql).as_deref() == Some("1")
    }
}

/// SQL string literal.
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// SQL identifier.
pub(crate) fn sql_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hostexec::SimulatedExecutor;

    pub(crate) use crate::cluster::tests::LSCLUSTERS_91;
    pub(crate) use crate::role::tests::config;

    pub(crate) const PRIMARY: &str = "10.0.0.1";
    pub(crate) const STANDBY: &str = "10.0.0.2";

    /// Two hosts each running a 9.1 cluster.
    pub(crate) fn hosts() -> SimulatedExecutor {
        let sim = SimulatedExecutor::new();
        sim.respond("pg_lsclusters", 0, LSCLUSTERS_91);
        sim
    }

    #[test]
    fn test_phase_parse_and_aliases() {
        assert_eq!("install".parse::<Phase>().unwrap(), Phase::Install);
        assert_eq!("SSH".parse::<Phase>().unwrap(), Phase::Connectivity);
        assert_eq!("base-backup".parse::<Phase>().unwrap(), Phase::Backup);
        assert_eq!("bring-up".parse::<Phase>().unwrap(), Phase::Bringup);
        let err = "failover".parse::<Phase>().unwrap_err();
        assert!(err.to_string().contains("connectivity"));
    }

    #[test]
    fn test_select_only_keeps_order() {
        let phases = Phase::select(Some("bringup, configure"), None).unwrap();
        assert_eq!(phases, vec![Phase::Configure, Phase::Bringup]);
    }

    #[test]
    fn test_select_skip() {
        let phases = Phase::select(None, Some("install,db")).unwrap();
        assert_eq!(
            phases,
            vec![Phase::Connectivity, Phase::Configure, Phase::Backup, Phase::Bringup]
        );
        assert_eq!(Phase::select(None, None).unwrap().len(), 6);
        assert!(Phase::select(Some("nope"), None).is_err());
    }

    #[test]
    fn test_unknown_host_is_rejected_before_remote_work() {
        let config = config();
        let sim = hosts();
        let err = Orchestrator::new(&config, &sim)
            .run(Phase::Configure, "10.0.0.3")
            .unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_failure_names_phase_and_host() {
        let config = config();
        let sim = hosts();
        sim.respond("service postgresql stop", 1, "");
        let err = Orchestrator::new(&config, &sim)
            .run(Phase::Configure, STANDBY)
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("configure phase failed on 10.0.0.2 (standby)"));
        assert!(message.contains("service postgresql stop"));
        assert!(message.contains("status 1"));
    }

    #[test]
    fn test_sql_quoting() {
        assert_eq!(sql_literal("it's"), "'it''s'");
        assert_eq!(sql_ident("postgis"), "\"postgis\"");
    }
}
