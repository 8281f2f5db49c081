use anyhow::Result;
use regex::Regex;

use super::{Orchestrator, sql_ident, sql_literal};
use crate::cluster::ClusterInfo;
use crate::config::host_cidr;
use crate::confpatch::ConfigMutator;
use crate::role::Assignment;
use hostexec::{Executor, RunAs};

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Prepare the server for streaming: replication login (primary), then
    /// stop the service and patch `postgresql.conf` and `pg_hba.conf`.
    pub(super) fn configure(&self, target: &Assignment<'_>) -> Result<()> {
        let cluster = self.discover(target)?;
        let mutator = ConfigMutator::new(self.exec, target.host);
        let main_config = cluster.main_config();

        let hot_standby = Regex::new(r"^\s*hot_standby\s*=\s*on\b")?;
        if mutator.contains(&main_config, &hot_standby) {
            log::warn!(
                "[{}] {main_config} already enables hot_standby; settings will be appended again",
                target.host
            );
        }

        if target.is_primary() {
            self.ensure_replication_login(target, &cluster)?;
        }

        self.service(target, "stop")?;

        mutator.append_lines(&main_config, &server_settings(target.host), &RunAs::Root)?;

        let login = &self.config.replication_user;
        let peer = host_cidr(target.peer)?;
        let rule = format!("host  replication {login} {peer}  md5");
        let pattern = Regex::new(&format!(
            r"^\s*host\s+replication\s+{}\s+{}\s",
            regex::escape(login),
            regex::escape(&peer)
        ))?;
        if mutator.append_if_absent(&cluster.hba_config(), &pattern, &rule)? {
            log::info!("[{}] allowed replication from {}", target.host, target.peer);
        }

        Ok(())
    }

    fn ensure_replication_login(&self, target: &Assignment<'_>, cluster: &ClusterInfo) -> Result<()> {
        let login = &self.config.replication_user;
        if self.role_exists(target, cluster, login) {
            log::info!("[{}] replication login {login} already exists", target.host);
            return Ok(());
        }

        let password = &self.config.secrets.replication_password;
        let sql = format!(
            "CREATE USER {} SUPERUSER LOGIN CONNECTION LIMIT 1 ENCRYPTED PASSWORD {};",
            sql_ident(login),
            sql_literal(password)
        );
        self.exec.run(
            target.host,
            &self.psql(cluster, None, &sql).with_secret(password),
        )?;
        Ok(())
    }
}

/// Settings appended to `postgresql.conf` on both hosts.
fn server_settings(host: &str) -> Vec<String> {
    vec![
        "hot_standby = on".to_string(),
        "max_wal_senders = 1".to_string(),
        "wal_level = 'hot_standby'".to_string(),
        "archive_mode = on".to_string(),
        "archive_command = 'cd .'".to_string(),
        format!("listen_addresses = 'localhost,{host}'"),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{PRIMARY, STANDBY, config, hosts};
    use super::super::{Orchestrator, Phase};
    use crate::config::{ClusterConfig, FileConfig, Overrides};
    use crate::role::tests::config_overrides;

    const CONF: &str = "/etc/postgresql/9.1/main/postgresql.conf";
    const HBA: &str = "/etc/postgresql/9.1/main/pg_hba.conf";

    #[test]
    fn test_primary_creates_login_then_stops_and_patches() {
        let config = config();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Configure, PRIMARY)
            .unwrap();

        let create = sim.position(|c| c.runs(PRIMARY, "CREATE USER")).unwrap();
        let stop = sim.position(|c| c.runs(PRIMARY, "service postgresql stop")).unwrap();
        assert!(create < stop);

        let conf = sim.file(PRIMARY, CONF).unwrap();
        assert!(conf.contains("hot_standby = on\n"));
        assert!(conf.contains("listen_addresses = 'localhost,10.0.0.1'"));
        assert_eq!(
            sim.file(PRIMARY, HBA).unwrap(),
            "host  replication replicator 10.0.0.2/32  md5\n"
        );
    }

    #[test]
    fn test_existing_login_is_not_recreated() {
        let config = config();
        let sim = hosts();
        sim.respond("FROM pg_roles", 0, "1\n");
        Orchestrator::new(&config, &sim)
            .run(Phase::Configure, PRIMARY)
            .unwrap();
        assert_eq!(sim.count(|c| c.runs(PRIMARY, "CREATE USER")), 0);
    }

    #[test]
    fn test_standby_never_creates_login() {
        let config = config();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Configure, STANDBY)
            .unwrap();
        assert_eq!(sim.count(|c| c.runs(STANDBY, "pg_roles")), 0);
        assert_eq!(sim.count(|c| c.runs(STANDBY, "CREATE USER")), 0);
        assert!(
            sim.file(STANDBY, HBA)
                .unwrap()
                .contains("replicator 10.0.0.1/32")
        );
    }

    #[test]
    fn test_ipv6_peer_gets_single_host_rule() {
        let overrides = Overrides {
            primary: Some("fe80::1".to_string()),
            standby: Some("fe80::2".to_string()),
            ..config_overrides()
        };
        let config = ClusterConfig::resolve(FileConfig::default(), overrides).unwrap();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Configure, "fe80::1")
            .unwrap();
        assert_eq!(
            sim.file("fe80::1", HBA).unwrap(),
            "host  replication replicator fe80::2/128  md5\n"
        );
    }

    #[test]
    fn test_rerun_keeps_single_hba_rule() {
        let config = config();
        let sim = hosts();
        let orchestrator = Orchestrator::new(&config, &sim);
        orchestrator.run(Phase::Configure, PRIMARY).unwrap();
        orchestrator.run(Phase::Configure, PRIMARY).unwrap();

        let hba = sim.file(PRIMARY, HBA).unwrap();
        assert_eq!(hba.matches("host  replication").count(), 1);
        let conf = sim.file(PRIMARY, CONF).unwrap();
        assert_eq!(conf.matches("hot_standby = on").count(), 2);
    }
}
