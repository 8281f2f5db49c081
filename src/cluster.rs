//! Database cluster discovery.
//!
//! Each host is asked for its clusters with `pg_lsclusters`; the first row
//! owned by the service account wins. Its version decides the paths and the
//! backup functions used by the later phases.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;
use hostexec::{Executor, RemoteCommand};

/// First major version using `pg_wal` instead of `pg_xlog`
const PG_WAL_SINCE: u32 = 10;

/// First major version without exclusive backups and `recovery.conf`
const UNSUPPORTED_SINCE: u32 = 12;

/// Server version as printed by `pg_lsclusters` (`9.1`, `10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: Option<u32>,
}

impl ServerVersion {
    /// WAL segment directory inside the data directory
    pub fn wal_dir(self) -> &'static str {
        if self.major >= PG_WAL_SINCE {
            "pg_wal"
        } else {
            "pg_xlog"
        }
    }

    /// Whether `pg_start_backup`/`pg_stop_backup` in exclusive mode and
    /// `recovery.conf` are available.
    pub fn supports_exclusive_backup(self) -> bool {
        self.major < UNSUPPORTED_SINCE
    }
}

impl FromStr for ServerVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid server version '{s}'");
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (s, None),
        };
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor
                .map(str::parse)
                .transpose()
                .map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{minor}", self.major),
            None => write!(f, "{}", self.major),
        }
    }
}

impl Serialize for ServerVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A cluster found on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterInfo {
    pub version: ServerVersion,
    pub name: String,
    pub port: u16,
    pub status: String,
    pub owner: String,
    pub data_dir: String,
}

impl ClusterInfo {
    /// `/etc/postgresql/<version>/<cluster>`
    pub fn config_dir(&self) -> String {
        format!("/etc/postgresql/{}/{}", self.version, self.name)
    }

    pub fn main_config(&self) -> String {
        format!("{}/postgresql.conf", self.config_dir())
    }

    pub fn hba_config(&self) -> String {
        format!("{}/pg_hba.conf", self.config_dir())
    }

    pub fn recovery_file(&self) -> String {
        format!("{}/recovery.conf", self.data_dir)
    }

    pub fn backup_script(&self) -> String {
        format!("{}/base_backup.sh", self.data_dir)
    }
}

/// Parse `pg_lsclusters` output, returning the first cluster owned by
/// `account`.
pub fn parse_lsclusters(output: &str, account: &str) -> Option<ClusterInfo> {
    output
        .lines()
        .map(str::split_whitespace)
        .map(Iterator::collect::<Vec<_>>)
        .filter(|fields| fields.len() >= 6 && fields[0] != "Ver")
        .find_map(|fields| {
            if fields[4] != account {
                return None;
            }
            Some(ClusterInfo {
                version: fields[0].parse().ok()?,
                name: fields[1].to_string(),
                port: fields[2].parse().ok()?,
                status: fields[3].to_string(),
                owner: fields[4].to_string(),
                data_dir: fields[5].to_string(),
            })
        })
}

fn lsclusters() -> RemoteCommand {
    RemoteCommand::sudo("pg_lsclusters")
}

/// Look up the cluster without judging its version. Any failure is `None`.
pub fn probe<E: Executor + ?Sized>(exec: &E, host: &str, account: &str) -> Option<ClusterInfo> {
    match exec.execute(host, &lsclusters()) {
        Ok(outcome) if outcome.is_success() => {
            parse_lsclusters(&outcome.into_output().stdout, account)
        }
        Ok(_) => None,
        Err(e) => {
            log::debug!("[{host}] cluster lookup failed: {e}");
            None
        }
    }
}

/// Discover the cluster a phase operates on.
pub fn discover<E: Executor + ?Sized>(
    exec: &E,
    host: &str,
    account: &str,
) -> anyhow::Result<ClusterInfo> {
    let output = exec.run(host, &lsclusters())?;
    let info = parse_lsclusters(&output.stdout, account).ok_or_else(|| {
        ConfigurationError::NoCluster {
            host: host.to_string(),
            account: account.to_string(),
        }
    })?;

    if !info.version.supports_exclusive_backup() {
        return Err(ConfigurationError::UnsupportedVersion {
            host: host.to_string(),
            version: info.version.to_string(),
        }
        .into());
    }

    log::debug!(
        "[{host}] cluster {}/{} on port {} at {}",
        info.version,
        info.name,
        info.port,
        info.data_dir
    );
    Ok(info)
}
