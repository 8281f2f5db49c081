//! Package identity and manager selection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::{Backend, apt::AptBackend, ports::PortsBackend};

/// A package to install.
///
/// For apt this is a package name (`postgresql-contrib`); for ports it is the
/// origin below `/usr/ports` (`databases/postgis21`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name or port origin
    pub name: String,
    /// Extra build arguments (ports only), e.g. `WITHOUT_X11=yes`
    pub build_args: Option<String>,
}

impl PackageSpec {
    /// A package without build arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build_args: None,
        }
    }

    /// Set build arguments.
    pub fn with_build_args(mut self, args: impl Into<String>) -> Self {
        let args = args.into();
        self.build_args = (!args.trim().is_empty()).then_some(args);
        self
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.build_args {
            Some(args) => write!(f, "{} ({args})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Which package manager the hosts use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// Debian/Ubuntu dpkg + apt-get
    #[default]
    Apt,
    /// FreeBSD ports tree
    Ports,
}

impl PackageManager {
    /// The backend implementing this manager.
    pub fn backend(self) -> Box<dyn Backend> {
        match self {
            Self::Apt => Box::new(AptBackend),
            Self::Ports => Box::new(PortsBackend::default()),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Ports => write!(f, "ports"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_spec_display() {
        assert_eq!(PackageSpec::new("postgresql").to_string(), "postgresql");
        assert_eq!(
            PackageSpec::new("databases/postgis21")
                .with_build_args("WITHOUT_X11=yes")
                .to_string(),
            "databases/postgis21 (WITHOUT_X11=yes)"
        );
    }

    #[test]
    fn test_blank_build_args_are_dropped() {
        assert!(PackageSpec::new("x").with_build_args("  ").build_args.is_none());
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(PackageManager::Apt.backend().name(), "apt");
        assert_eq!(PackageManager::Ports.backend().name(), "ports");
    }
}
