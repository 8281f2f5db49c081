//! Run configuration.
//!
//! Settings come from `~/.config/pgpair/config.toml` (or `--config`), then
//! CLI flags and environment variables override them. The merged result is a
//! validated, read-only [`ClusterConfig`] shared by every phase.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;
use pkgkit::{PackageManager, PackageSpec};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pgpair"))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// File Schema
// ============================================================================

/// The config file as written by the operator
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub secrets: SecretsSection,

    #[serde(default)]
    pub packages: PackagesConfig,

    /// Application database created on the primary after bring-up
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterSection {
    pub primary: Option<String>,
    pub standby: Option<String>,

    /// SSH login with sudo rights on both hosts
    pub ssh_user: Option<String>,

    /// System account owning the database service
    #[serde(default = "default_account")]
    pub account: String,

    /// Init service name
    #[serde(default = "default_service")]
    pub service: String,

    /// Login created on the primary for streaming
    #[serde(default = "default_replication_user")]
    pub replication_user: String,

    /// File whose creation promotes the standby; `{port}` expands to the
    /// cluster port
    #[serde(default = "default_trigger_file")]
    pub trigger_file: String,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            primary: None,
            standby: None,
            ssh_user: None,
            account: default_account(),
            service: default_service(),
            replication_user: default_replication_user(),
            trigger_file: default_trigger_file(),
        }
    }
}

fn default_account() -> String {
    "postgres".to_string()
}

fn default_service() -> String {
    "postgresql".to_string()
}

fn default_replication_user() -> String {
    "replicator".to_string()
}

fn default_trigger_file() -> String {
    "/tmp/postgresql.trigger.{port}".to_string()
}

#[derive(Default, Serialize, Deserialize)]
pub struct SecretsSection {
    pub sudo_password: Option<String>,
    pub os_password: Option<String>,
    pub superuser_password: Option<String>,
    pub replication_password: Option<String>,
    pub db_owner_password: Option<String>,
}

impl fmt::Debug for SecretsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsSection").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    #[serde(default)]
    pub manager: PackageManager,

    #[serde(default = "default_packages")]
    pub names: Vec<String>,

    /// Build arguments per package (ports)
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            manager: PackageManager::default(),
            names: default_packages(),
            build_args: BTreeMap::new(),
        }
    }
}

fn default_packages() -> Vec<String> {
    vec![
        "postgresql".to_string(),
        "postgresql-contrib".to_string(),
        "postgresql-client".to_string(),
    ]
}

impl PackagesConfig {
    /// Package specs in install order
    pub fn specs(&self) -> Vec<PackageSpec> {
        self.names
            .iter()
            .map(|name| {
                let spec = PackageSpec::new(name);
                match self.build_args.get(name) {
                    Some(args) => spec.with_build_args(args),
                    None => spec,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub name: String,

    /// Owning role; defaults to the service account
    pub owner: Option<String>,

    #[serde(default)]
    pub extensions: Vec<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, a missing default file
    /// yields an empty config so everything can come from flags.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let expanded = shellexpand::tilde(path);
                Self::read(Path::new(expanded.as_ref()))
            }
            None => {
                let path = default_config_path()?;
                if !path.exists() {
                    log::debug!("no config at {}, using flags only", path.display());
                    return Ok(Self::default());
                }
                Self::read(&path)
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub primary: Option<String>,
    pub standby: Option<String>,
    pub ssh_user: Option<String>,
    pub sudo_password: Option<String>,
    pub os_password: Option<String>,
    pub superuser_password: Option<String>,
    pub replication_password: Option<String>,
    pub db_owner_password: Option<String>,
}

// ============================================================================
// Resolved Config
// ============================================================================

/// Passwords for a run. Never printed.
#[derive(Clone)]
pub struct Secrets {
    pub sudo_password: Option<String>,
    pub os_password: String,
    pub superuser_password: String,
    pub replication_password: String,
    pub db_owner_password: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

/// Validated settings for one orchestration run
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub primary: String,
    pub standby: String,
    pub ssh_user: Option<String>,
    pub account: String,
    pub service: String,
    pub replication_user: String,
    pub trigger_file: String,
    pub secrets: Secrets,
    pub packages: PackagesConfig,
    pub database: Option<DatabaseConfig>,
}

fn pick(flag: Option<String>, file: Option<String>) -> Option<String> {
    flag.or(file)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Host address of a cluster member as a single-host CIDR block.
pub fn host_cidr(address: &str) -> Result<String, ConfigurationError> {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(format!("{ip}/32")),
        Ok(IpAddr::V6(ip)) => Ok(format!("{ip}/128")),
        Err(_) => Err(ConfigurationError::InvalidAddress(address.to_string())),
    }
}

fn parse_address(address: &str) -> Result<IpAddr, ConfigurationError> {
    address
        .parse()
        .map_err(|_| ConfigurationError::InvalidAddress(address.to_string()))
}

fn require_secret(
    value: Option<String>,
    what: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigurationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::MissingSecret { what, flag, env })
}

impl ClusterConfig {
    /// Merge file and overrides, then validate.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigurationError> {
        let primary = pick(overrides.primary, file.cluster.primary)
            .ok_or(ConfigurationError::MissingAddress("primary"))?;
        let standby = pick(overrides.standby, file.cluster.standby)
            .ok_or(ConfigurationError::MissingAddress("standby"))?;
        if parse_address(&primary)? == parse_address(&standby)? {
            return Err(ConfigurationError::SameHost(primary));
        }

        let s = file.secrets;
        let secrets = Secrets {
            sudo_password: overrides.sudo_password.or(s.sudo_password),
            os_password: require_secret(
                overrides.os_password.or(s.os_password),
                "OS account password",
                "os-password",
                "PGPAIR_OS_PASSWORD",
            )?,
            superuser_password: require_secret(
                overrides.superuser_password.or(s.superuser_password),
                "database superuser password",
                "superuser-password",
                "PGPAIR_SUPERUSER_PASSWORD",
            )?,
            replication_password: require_secret(
                overrides.replication_password.or(s.replication_password),
                "replication password",
                "replication-password",
                "PGPAIR_REPLICATION_PASSWORD",
            )?,
            db_owner_password: overrides.db_owner_password.or(s.db_owner_password),
        };

        let account = file.cluster.account;
        let separate_owner = file
            .database
            .as_ref()
            .and_then(|db| db.owner.as_deref())
            .is_some_and(|owner| owner != account);
        let secrets = if separate_owner {
            Secrets {
                db_owner_password: Some(require_secret(
                    secrets.db_owner_password,
                    "database owner password",
                    "db-owner-password",
                    "PGPAIR_DB_OWNER_PASSWORD",
                )?),
                ..secrets
            }
        } else {
            secrets
        };

        Ok(Self {
            primary,
            standby,
            ssh_user: pick(overrides.ssh_user, file.cluster.ssh_user),
            account,
            service: file.cluster.service,
            replication_user: file.cluster.replication_user,
            trigger_file: file.cluster.trigger_file,
            secrets,
            packages: file.packages,
            database: file.database,
        })
    }

    /// Both hosts, primary first
    pub fn hosts(&self) -> [&str; 2] {
        [self.primary.as_str(), self.standby.as_str()]
    }

    /// Trigger file for the cluster listening on `port`
    pub fn trigger_path(&self, port: u16) -> String {
        self.trigger_file.replace("{port}", &port.to_string())
    }

    /// Owner of the application database
    pub fn database_owner<'a>(&'a self, database: &'a DatabaseConfig) -> &'a str {
        database.owner.as_deref().unwrap_or(&self.account)
    }
}
