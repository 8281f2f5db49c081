//! Primary/standby role resolution.

use serde::Serialize;
use std::fmt;

use crate::config::ClusterConfig;
use crate::error::ConfigurationError;

/// Replication role of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    Primary,
    Standby,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Standby => write!(f, "standby"),
        }
    }
}

/// A host with its role and the address of the other host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub host: &'a str,
    pub role: HostRole,
    pub peer: &'a str,
}

impl Assignment<'_> {
    pub fn is_primary(&self) -> bool {
        self.role == HostRole::Primary
    }
}

/// Classify `host` against the configured pair.
pub fn resolve<'a>(
    host: &'a str,
    config: &'a ClusterConfig,
) -> Result<Assignment<'a>, ConfigurationError> {
    if host == config.primary {
        Ok(Assignment {
            host,
            role: HostRole::Primary,
            peer: &config.standby,
        })
    } else if host == config.standby {
        Ok(Assignment {
            host,
            role: HostRole::Standby,
            peer: &config.primary,
        })
    } else {
        Err(ConfigurationError::UnknownHost {
            host: host.to_string(),
            primary: config.primary.clone(),
            standby: config.standby.clone(),
        })
    }
}
