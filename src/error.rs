//! Pre-flight configuration errors.
//!
//! These are detected before (or instead of) touching a host and always
//! abort the run.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{host} is neither the primary ({primary}) nor the standby ({standby})")]
    UnknownHost {
        host: String,
        primary: String,
        standby: String,
    },

    #[error("missing {0} address (set it in [cluster] or pass --{0})")]
    MissingAddress(&'static str),

    #[error("'{0}' is not an IP address (the cluster hosts must be given by address)")]
    InvalidAddress(String),

    #[error("primary and standby must be different hosts, both are {0}")]
    SameHost(String),

    #[error("missing {what} (pass --{flag}, set {env}, or add it to [secrets])")]
    MissingSecret {
        what: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("no PostgreSQL cluster owned by {account} found on {host}")]
    NoCluster { host: String, account: String },

    #[error(
        "PostgreSQL {version} on {host} is not supported: exclusive base backups and recovery.conf need a server older than 12"
    )]
    UnsupportedVersion { host: String, version: String },

    #[error("unknown phase '{0}' (expected one of: {1})")]
    UnknownPhase(String, String),
}
