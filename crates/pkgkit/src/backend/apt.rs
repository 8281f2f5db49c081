//! Debian/Ubuntu backend using `dpkg-query` and `apt-get`.

use crate::backend::Backend;
use crate::types::PackageSpec;
use hostexec::{CommandOutput, RemoteCommand, quote};

/// Backend for dpkg-based systems.
pub struct AptBackend;

impl Backend for AptBackend {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn probe(&self, package: &PackageSpec) -> RemoteCommand {
        RemoteCommand::new(format!(
            "dpkg-query -W -f='${{Status}}' {}",
            quote(&package.name)
        ))
    }

    fn confirms_installed(&self, output: &CommandOutput) -> bool {
        // Removed-but-not-purged packages are still known to dpkg
        output.stdout.contains("install ok installed")
    }

    fn install(&self, package: &PackageSpec) -> RemoteCommand {
        RemoteCommand::sudo(format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
            quote(&package.name)
        ))
    }
}
