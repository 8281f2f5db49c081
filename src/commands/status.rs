//! Status command - show each host's role and cluster

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::Context;
use crate::cluster::{self, ClusterInfo};
use crate::config::ClusterConfig;
use crate::role::{self, HostRole};
use crate::ui;
use hostexec::{Executor, RemoteCommand};

#[derive(Debug, Serialize)]
struct HostStatus {
    host: String,
    role: HostRole,
    peer: String,
    reachable: bool,
    cluster: Option<ClusterInfo>,
    supported: Option<bool>,
}

fn collect<E: Executor + ?Sized>(config: &ClusterConfig, exec: &E) -> Result<Vec<HostStatus>> {
    config
        .hosts()
        .into_iter()
        .map(|host| -> Result<HostStatus> {
            let target = role::resolve(host, config)?;
            let reachable = exec.probe(host, &RemoteCommand::new("true"));
            let cluster = if reachable {
                cluster::probe(exec, host, &config.account)
            } else {
                None
            };
            Ok(HostStatus {
                host: host.to_string(),
                role: target.role,
                peer: target.peer.to_string(),
                reachable,
                supported: cluster.as_ref().map(|c| c.version.supports_exclusive_backup()),
                cluster,
            })
        })
        .collect()
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let config = super::load_config(ctx)?;
    let exec = super::executor(&config);
    let statuses = collect(&config, &exec)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    ui::header("Replication pair");
    for status in &statuses {
        ui::host_section(&status.host, status.role);
        ui::kv("Peer", &status.peer);
        if !status.reachable {
            ui::kv("SSH", &"unreachable".red().to_string());
            continue;
        }
        ui::kv("SSH", &"ok".green().to_string());
        match &status.cluster {
            Some(cluster) => {
                let version = if status.supported == Some(true) {
                    cluster.version.to_string().normal()
                } else {
                    format!("{} (unsupported)", cluster.version).red()
                };
                ui::kv("Version", &version.to_string());
                ui::kv("Cluster", &format!("{} on port {}", cluster.name, cluster.port));
                ui::kv("Status", &cluster.status);
                ui::kv("Data", &cluster.data_dir);
            }
            None => ui::kv("Cluster", &format!("none owned by {}", config.account).dimmed().to_string()),
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tests::LSCLUSTERS_91;
    use crate::role::tests::config;
    use hostexec::SimulatedExecutor;

    #[test]
    fn test_collect_reports_both_hosts() {
        let config = config();
        let sim = SimulatedExecutor::new();
        sim.respond_on("10.0.0.1", "pg_lsclusters", 0, LSCLUSTERS_91);
        sim.unreachable("10.0.0.2");

        let statuses = collect(&config, &sim).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].role, HostRole::Primary);
        assert_eq!(statuses[0].supported, Some(true));
        assert_eq!(statuses[0].cluster.as_ref().unwrap().port, 5432);
        assert!(!statuses[1].reachable);
        assert!(statuses[1].cluster.is_none());
    }

    #[test]
    fn test_json_shape() {
        let config = config();
        let sim = SimulatedExecutor::new();
        sim.respond("pg_lsclusters", 0, LSCLUSTERS_91);

        let statuses = collect(&config, &sim).unwrap();
        let value = serde_json::to_value(&statuses).unwrap();
        assert_eq!(value[1]["role"], "standby");
        assert_eq!(value[1]["cluster"]["version"], "9.1");
        assert_eq!(value[1]["peer"], "10.0.0.1");
    }
}
