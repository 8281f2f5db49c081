//! Error types for package installation.

use thiserror::Error;

/// Errors that can occur while installing packages.
///
/// Probe failures never show up here: a probe that cannot run means the
/// package is treated as absent.
#[derive(Debug, Error)]
pub enum Error {
    /// The install command failed
    #[error("failed to install {package} on {host}")]
    Install {
        /// Package that failed
        package: String,
        /// Host it was installed on
        host: String,
        /// Underlying remote error
        #[source]
        source: hostexec::Error,
    },

    /// The post-install cleanup failed
    #[error("installed {package} on {host} but cleanup failed")]
    Cleanup {
        /// Package that was installed
        package: String,
        /// Host it was installed on
        host: String,
        /// Underlying remote error
        #[source]
        source: hostexec::Error,
    },
}

/// Result type for package installation.
pub type Result<T> = std::result::Result<T, Error>;
