//! Check command - validate the configuration and reach both hosts

use anyhow::Result;

use crate::Context;
use crate::cluster;
use crate::config::ClusterConfig;
use crate::role;
use crate::runner;
use crate::ui;
use hostexec::{Executor, RemoteCommand};

/// Problems found on one host.
fn check_host<E: Executor + ?Sized>(config: &ClusterConfig, exec: &E, host: &str) -> Result<Vec<String>> {
    let target = role::resolve(host, config)?;
    let mut problems = Vec::new();

    ui::host_section(host, target.role);
    if !exec.probe(host, &RemoteCommand::new("true")) {
        ui::error("SSH login failed (key-based login is required)");
        problems.push(format!("{host}: unreachable"));
        return Ok(problems);
    }
    ui::success("SSH login");

    if exec.probe(host, &RemoteCommand::sudo("true")) {
        ui::success("sudo");
    } else {
        ui::error("sudo failed (set --sudo-password or allow NOPASSWD)");
        problems.push(format!("{host}: sudo failed"));
    }

    match cluster::probe(exec, host, &config.account) {
        Some(info) if info.version.supports_exclusive_backup() => {
            ui::success(&format!("PostgreSQL {} cluster {} on port {}", info.version, info.name, info.port));
        }
        Some(info) => {
            ui::error(&format!("PostgreSQL {} is not supported (needs a server older than 12)", info.version));
            problems.push(format!("{host}: unsupported server {}", info.version));
        }
        None => ui::dim("No cluster yet (the install phase will create one)"),
    }

    Ok(problems)
}

pub fn run(ctx: &Context) -> Result<()> {
    let config = super::load_config(ctx)?;

    ui::header("Configuration");
    ui::success("Configuration valid");
    ui::kv("Primary", &config.primary);
    ui::kv("Standby", &config.standby);
    ui::kv("SSH user", config.ssh_user.as_deref().unwrap_or("(local default)"));
    ui::kv("Account", &config.account);
    ui::kv("Replication login", &config.replication_user);
    ui::kv("Packages", &format!("{} via {}", config.packages.names.join(", "), config.packages.manager));
    ui::kv("Sudo password", ui::secret_state(config.secrets.sudo_password.as_deref()));

    if !runner::command_exists("ssh") {
        anyhow::bail!("ssh client not found on PATH");
    }

    let exec = super::executor(&config);
    let mut problems = Vec::new();
    for host in config.hosts() {
        problems.extend(check_host(&config, &exec, host)?);
    }
    println!();

    if !problems.is_empty() {
        anyhow::bail!("{} problem(s) found: {}", problems.len(), problems.join("; "));
    }
    ui::success("Both hosts are ready");
    Ok(())
}
