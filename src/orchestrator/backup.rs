use anyhow::{Context, Result};
use regex::Regex;

use super::{BACKUP_LABEL, Orchestrator, sql_literal};
use crate::cluster::ClusterInfo;
use crate::confpatch::ConfigMutator;
use crate::role::Assignment;
use hostexec::{Executor, RemoteCommand, RunAs, quote};

/// An open base backup on the primary.
///
/// Created by [`BackupWindow::begin`], which signals the server; the data
/// directory may only be copied while the window is open, through
/// [`BackupWindow::transfer`]. [`BackupWindow::end`] consumes the window. A
/// window dropped without ending stays open on the server and is reported.
#[must_use = "an open backup window must be closed with `end`"]
pub struct BackupWindow<'a, E: Executor + ?Sized> {
    exec: &'a E,
    host: &'a str,
    account: &'a str,
    cluster: &'a ClusterInfo,
    ended: bool,
}

impl<'a, E: Executor + ?Sized> BackupWindow<'a, E> {
    /// Signal the start of a base backup.
    pub fn begin(exec: &'a E, host: &'a str, account: &'a str, cluster: &'a ClusterInfo) -> Result<Self> {
        let sql = format!("select pg_start_backup({});", sql_literal(BACKUP_LABEL));
        exec.run(host, &psql(cluster, account, &sql))
            .context("could not start base backup")?;
        log::info!("[{host}] backup window open ({BACKUP_LABEL})");

        Ok(Self {
            exec,
            host,
            account,
            cluster,
            ended: false,
        })
    }

    /// Copy the data directory to `peer`, leaving out WAL segments.
    pub fn transfer(&self, peer: &str) -> Result<()> {
        log::info!("[{}] copying {} to {peer}", self.host, self.cluster.data_dir);
        let command = RemoteCommand::new(rsync_line(self.cluster, peer)).as_account(self.account);
        self.exec
            .run(self.host, &command)
            .with_context(|| format!("base backup transfer to {peer} failed, backup window left open"))?;
        Ok(())
    }

    /// Signal the end of the backup.
    pub fn end(mut self) -> Result<()> {
        self.exec
            .run(self.host, &psql(self.cluster, self.account, "select pg_stop_backup();"))
            .context("could not stop base backup")?;
        self.ended = true;
        log::info!("[{}] backup window closed", self.host);
        Ok(())
    }
}

impl<E: Executor + ?Sized> Drop for BackupWindow<'_, E> {
    fn drop(&mut self) {
        if !self.ended {
            log::warn!(
                "[{}] base backup still in progress; run `select pg_stop_backup();` as {} before retrying",
                self.host,
                self.account
            );
        }
    }
}

fn psql(cluster: &ClusterInfo, account: &str, sql: &str) -> RemoteCommand {
    RemoteCommand::new(format!("psql -p {} -c {}", cluster.port, quote(sql))).as_account(account)
}

fn rsync_line(cluster: &ClusterInfo, peer: &str) -> String {
    let data = &cluster.data_dir;
    // rsync reads `host:path`, so IPv6 hosts go in brackets
    let peer = if peer.contains(':') {
        format!("[{peer}]")
    } else {
        peer.to_string()
    };
    format!(
        "rsync -cva --inplace --exclude={} {data}/ -e ssh {peer}:{data}/",
        quote(&format!("*{}*", cluster.version.wal_dir()))
    )
}

/// A libpq connection-string value. Bare when it has no blanks, quotes
/// or backslashes.
fn conninfo_value(value: &str) -> String {
    let plain = !value.is_empty()
        && !value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// A quoted string in server configuration file syntax.
fn conf_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// `base_backup.sh`: the same bracket, runnable by hand.
fn backup_script(cluster: &ClusterInfo, peer: &str) -> Vec<String> {
    let port = cluster.port;
    vec![
        "#!/bin/bash".to_string(),
        format!("BACKUP_LABEL=\"{BACKUP_LABEL}\""),
        format!("psql -p {port} -c \"select pg_start_backup('$BACKUP_LABEL');\""),
        rsync_line(cluster, peer),
        format!("psql -p {port} -c \"select pg_stop_backup();\""),
    ]
}

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Copy the primary to the standby and write the recovery settings.
    pub(super) fn backup(&self, target: &Assignment<'_>) -> Result<()> {
        let cluster = self.discover(target)?;
        let account = self.config.account.as_str();
        let mutator = ConfigMutator::new(self.exec, target.host);
        let recovery = cluster.recovery_file();

        let standby_mode = Regex::new(r"^\s*standby_mode\s*=")?;
        if mutator.contains(&recovery, &standby_mode) {
            log::warn!(
                "[{}] {recovery} already has recovery settings; they will be appended again",
                target.host
            );
        }

        if target.is_primary() {
            self.service(target, "start")?;
        }

        self.write_backup_script(target, &cluster)?;

        if target.is_primary() {
            let window = BackupWindow::begin(self.exec, target.host, account, &cluster)?;
            window.transfer(target.peer)?;
            window.end()?;
        }

        let conninfo = format!(
            "host={} port={} user={} password={}",
            target.peer,
            cluster.port,
            conninfo_value(&self.config.replication_user),
            conninfo_value(&self.config.secrets.replication_password)
        );
        let lines = vec![
            "standby_mode = 'on'".to_string(),
            format!("primary_conninfo = {}", conf_string(&conninfo)),
            format!("trigger_file = {}", conf_string(&self.config.trigger_path(cluster.port))),
        ];
        mutator.append_lines(&recovery, &lines, &RunAs::account(account))?;

        Ok(())
    }

    fn write_backup_script(&self, target: &Assignment<'_>, cluster: &ClusterInfo) -> Result<()> {
        let account = self.config.account.as_str();
        let path = cluster.backup_script();
        let create = RemoteCommand::sudo(format!(
            "install -m 744 -o {account} -g {account} /dev/null {}",
            quote(&path)
        ));
        self.exec.run(target.host, &create)?;
        ConfigMutator::new(self.exec, target.host).append_lines(
            &path,
            &backup_script(cluster, target.peer),
            &RunAs::account(account),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::parse_lsclusters;
    use crate::orchestrator::tests::{LSCLUSTERS_91, PRIMARY, STANDBY, config, hosts};
    use crate::orchestrator::Phase;

    const DATA: &str = "/var/lib/postgresql/9.1/main";

    fn cluster() -> ClusterInfo {
        parse_lsclusters(LSCLUSTERS_91, "postgres").unwrap()
    }

    #[test]
    fn test_rsync_excludes_wal_dir() {
        assert_eq!(
            rsync_line(&cluster(), STANDBY),
            "rsync -cva --inplace --exclude='*pg_xlog*' /var/lib/postgresql/9.1/main/ -e ssh 10.0.0.2:/var/lib/postgresql/9.1/main/"
        );
    }

    #[test]
    fn test_rsync_brackets_ipv6_peer() {
        assert!(rsync_line(&cluster(), "fe80::2").ends_with(" [fe80::2]:/var/lib/postgresql/9.1/main/"));
    }

    #[test]
    fn test_conninfo_quoting() {
        assert_eq!(conninfo_value("shovelingstuff"), "shovelingstuff");
        assert_eq!(conninfo_value(""), "''");
        assert_eq!(conninfo_value(r"a\b c"), r"'a\\b c'");
        assert_eq!(conf_string(r"password='a\'b'"), r"'password=''a\\''b'''");
    }

    #[test]
    fn test_recovery_settings_escape_password() {
        let mut config = config();
        config.secrets.replication_password = "it's a pw".to_string();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Backup, STANDBY)
            .unwrap();

        let recovery = sim.file(STANDBY, &format!("{DATA}/recovery.conf")).unwrap();
        assert!(recovery.contains(
            r"primary_conninfo = 'host=10.0.0.1 port=5432 user=replicator password=''it\\''s a pw'''"
        ));
    }

    #[test]
    fn test_window_brackets_transfer() {
        let sim = hosts();
        let cluster = cluster();
        let window = BackupWindow::begin(&sim, PRIMARY, "postgres", &cluster).unwrap();
        window.transfer(STANDBY).unwrap();
        window.end().unwrap();

        let start = sim.position(|c| c.runs(PRIMARY, "pg_start_backup('base_backup')")).unwrap();
        let rsync = sim.position(|c| c.runs(PRIMARY, "rsync")).unwrap();
        let stop = sim.position(|c| c.runs(PRIMARY, "pg_stop_backup")).unwrap();
        assert!(start < rsync && rsync < stop);
    }

    #[test]
    fn test_failed_transfer_leaves_window_open() {
        let sim = hosts();
        sim.respond("rsync", 23, "");
        let cluster = cluster();
        let window = BackupWindow::begin(&sim, PRIMARY, "postgres", &cluster).unwrap();
        assert!(window.transfer(STANDBY).is_err());
        drop(window);
        assert_eq!(sim.count(|c| c.runs(PRIMARY, "pg_stop_backup")), 0);
    }

    #[test]
    fn test_standby_writes_script_and_recovery_only() {
        let config = config();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Backup, STANDBY)
            .unwrap();

        assert_eq!(sim.count(|c| c.runs(STANDBY, "pg_start_backup")), 0);
        assert_eq!(sim.count(|c| c.runs(STANDBY, "service postgresql start")), 0);

        let script = sim.file(STANDBY, &format!("{DATA}/base_backup.sh")).unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("10.0.0.1:/var/lib/postgresql/9.1/main/"));

        let recovery = sim.file(STANDBY, &format!("{DATA}/recovery.conf")).unwrap();
        assert_eq!(
            recovery,
            "standby_mode = 'on'\n\
             primary_conninfo = 'host=10.0.0.1 port=5432 user=replicator password=shovelingstuff'\n\
             trigger_file = '/tmp/postgresql.trigger.5432'\n"
        );
    }

    #[test]
    fn test_primary_starts_before_backup() {
        let config = config();
        let sim = hosts();
        Orchestrator::new(&config, &sim)
            .run(Phase::Backup, PRIMARY)
            .unwrap();

        let start = sim.position(|c| c.runs(PRIMARY, "service postgresql start")).unwrap();
        let begin = sim.position(|c| c.runs(PRIMARY, "pg_start_backup")).unwrap();
        assert!(start < begin);
        assert!(
            sim.file(PRIMARY, &format!("{DATA}/recovery.conf"))
                .unwrap()
                .contains("host=10.0.0.2")
        );
    }
}
