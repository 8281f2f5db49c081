//! Backend abstraction for package managers.
//!
//! A [`Backend`] only builds commands; running them (and deciding which
//! failures are tolerated) is the [`crate::Installer`]'s job. This keeps the
//! backends free of any executor and easy to test.

pub mod apt;
pub mod ports;

use crate::types::PackageSpec;
use hostexec::{CommandOutput, RemoteCommand};

/// Commands for one package manager.
pub trait Backend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Command that exits zero when the package may be installed.
    fn probe(&self, package: &PackageSpec) -> RemoteCommand;

    /// Whether a successful probe really reports the package as installed.
    fn confirms_installed(&self, _output: &CommandOutput) -> bool {
        true
    }

    /// Command that installs the package.
    fn install(&self, package: &PackageSpec) -> RemoteCommand;

    /// Command to run after a fresh install, if any.
    fn cleanup(&self, _package: &PackageSpec) -> Option<RemoteCommand> {
        None
    }
}
