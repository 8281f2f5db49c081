//! FreeBSD ports backend.
//!
//! Ports are built from source below the ports tree with `BATCH=yes` so no
//! configuration dialogs appear. A fresh build is followed by `make clean`.

use crate::backend::Backend;
use crate::types::PackageSpec;
use hostexec::{RemoteCommand, quote};

/// Backend for a FreeBSD ports tree.
pub struct PortsBackend {
    /// Root of the ports tree
    pub tree: String,
}

impl Default for PortsBackend {
    fn default() -> Self {
        Self {
            tree: "/usr/ports".to_string(),
        }
    }
}

impl PortsBackend {
    fn make(&self, package: &PackageSpec, target: &str) -> RemoteCommand {
        let dir = format!("{}/{}", self.tree.trim_end_matches('/'), package.name);
        let args = package
            .build_args
            .as_deref()
            .map(|a| format!("{a} "))
            .unwrap_or_default();
        RemoteCommand::sudo(format!("make -C {} {args}BATCH=yes {target}", quote(&dir)))
    }
}

impl Backend for PortsBackend {
    fn name(&self) -> &'static str {
        "ports"
    }

    fn probe(&self, package: &PackageSpec) -> RemoteCommand {
        RemoteCommand::new(format!("pkg info -e {}", quote(&package.name)))
    }

    fn install(&self, package: &PackageSpec) -> RemoteCommand {
        self.make(package, "install")
    }

    fn cleanup(&self, package: &PackageSpec) -> Option<RemoteCommand> {
        Some(self.make(package, "clean"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_with_build_args() {
        let pkg = PackageSpec::new("databases/postgis21")
            .with_build_args("WITHOUT_X11=yes WITH_RASTER=on");
        let cmd = PortsBackend::default().install(&pkg);
        assert_eq!(
            cmd.script(),
            "make -C /usr/ports/databases/postgis21 WITHOUT_X11=yes WITH_RASTER=on BATCH=yes install"
        );
    }

    #[test]
    fn test_cleanup_without_build_args() {
        let pkg = PackageSpec::new("databases/postgresql93-server");
        let cmd = PortsBackend::default().cleanup(&pkg).unwrap();
        assert_eq!(
            cmd.script(),
            "make -C /usr/ports/databases/postgresql93-server BATCH=yes clean"
        );
    }

    #[test]
    fn test_probe_uses_origin() {
        let cmd = PortsBackend::default().probe(&PackageSpec::new("databases/postgis21"));
        assert_eq!(cmd.script(), "pkg info -e databases/postgis21");
    }
}
