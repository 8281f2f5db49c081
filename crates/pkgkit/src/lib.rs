//! # pkgkit
//!
//! Idempotent package installation on remote hosts.
//!
//! The [`Installer`] probes the remote package database before installing
//! anything, so running it twice is harmless:
//!
//! ```no_run
//! use hostexec::SshExecutor;
//! use pkgkit::{Installer, PackageManager, PackageSpec};
//!
//! let ssh = SshExecutor::new(Some("admin"));
//! let installer = Installer::new(&ssh, "10.0.0.1", PackageManager::Apt);
//!
//! let installed_now = installer
//!     .ensure_installed(&PackageSpec::new("postgresql"))
//!     .expect("install failed");
//! println!("installed now: {installed_now}");
//! ```
//!
//! ## Probes
//!
//! The probe is tolerant: a non-zero exit, or a probe that cannot run at
//! all, is read as "not installed". Telling a broken probe apart from a
//! missing package is deliberately not attempted.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{PackageManager, PackageSpec};

use backend::Backend;
use hostexec::{Executor, Outcome};

/// Installs packages on one host.
pub struct Installer<'a, E: Executor + ?Sized> {
    executor: &'a E,
    host: &'a str,
    backend: Box<dyn Backend>,
}

impl<'a, E: Executor + ?Sized> Installer<'a, E> {
    /// Create an installer for `host` using `manager`.
    pub fn new(executor: &'a E, host: &'a str, manager: PackageManager) -> Self {
        Self::with_backend(executor, host, manager.backend())
    }

    /// Create an installer with a custom backend.
    pub fn with_backend(executor: &'a E, host: &'a str, backend: Box<dyn Backend>) -> Self {
        Self {
            executor,
            host,
            backend,
        }
    }

    /// Check whether a package is installed. Probe errors count as absent.
    pub fn is_installed(&self, package: &PackageSpec) -> bool {
        let probe = self.backend.probe(package);
        match self.executor.execute(self.host, &probe) {
            Ok(Outcome::Success(output)) => self.backend.confirms_installed(&output),
            Ok(Outcome::Negative(_)) => false,
            Err(e) => {
                log::debug!(
                    "[{}] probe for {package} failed ({e}), treating as absent",
                    self.host
                );
                false
            }
        }
    }

    /// Install `package` unless it is already present.
    ///
    /// Returns `true` if it was installed by this call.
    pub fn ensure_installed(&self, package: &PackageSpec) -> Result<bool> {
        if self.is_installed(package) {
            log::info!("[{}] {} package already installed: {package}", self.host, self.backend.name());
            return Ok(false);
        }

        log::info!("[{}] installing {package} via {}", self.host, self.backend.name());
        self.executor
            .run(self.host, &self.backend.install(package))
            .map_err(|source| Error::Install {
                package: package.name.clone(),
                host: self.host.to_string(),
                source,
            })?;

        if let Some(cleanup) = self.backend.cleanup(package) {
            self.executor
                .run(self.host, &cleanup)
                .map_err(|source| Error::Cleanup {
                    package: package.name.clone(),
                    host: self.host.to_string(),
                    source,
                })?;
        }

        Ok(true)
    }

    /// Install every package in order, stopping at the first failure.
    ///
    /// Returns how many were installed by this call.
    pub fn ensure_all(&self, packages: &[PackageSpec]) -> Result<usize> {
        let mut installed = 0;
        for package in packages {
            if self.ensure_installed(package)? {
                installed += 1;
            }
        }
        Ok(installed)
    }
}
