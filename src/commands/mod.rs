pub mod bootstrap;
pub mod check;
pub mod phase;
pub mod status;

use anyhow::Result;
use hostexec::SshExecutor;

use crate::Context;
use crate::config::{ClusterConfig, FileConfig};

/// Load the config file and apply overrides.
fn load_config(ctx: &Context) -> Result<ClusterConfig> {
    let file = FileConfig::load(ctx.config.as_deref())?;
    Ok(ClusterConfig::resolve(file, ctx.overrides.clone())?)
}

/// The SSH executor for both hosts.
fn executor(config: &ClusterConfig) -> SshExecutor {
    SshExecutor::new(config.ssh_user.as_deref())
        .with_sudo_password(config.secrets.sudo_password.clone())
}
