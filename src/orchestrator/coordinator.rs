//! Whole-pair bring-up.
//!
//! Phases run in order; within a phase the primary goes first. This keeps
//! the primary running before the transfer and the standby stopped (phase
//! `configure`) before its data directory is overwritten (phase `backup`).

use anyhow::Result;

use super::{Orchestrator, Phase};
use crate::config::ClusterConfig;
use crate::role::HostRole;
use hostexec::Executor;

/// One (phase, host) unit of work, reported before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step<'a> {
    pub phase: Phase,
    pub host: &'a str,
    pub role: HostRole,
    /// 1-based position
    pub index: usize,
    pub total: usize,
}

/// Runs a selection of phases on both hosts.
pub struct Coordinator<'a, E: Executor + ?Sized> {
    orchestrator: Orchestrator<'a, E>,
    phases: Vec<Phase>,
}

impl<'a, E: Executor + ?Sized> Coordinator<'a, E> {
    pub fn new(config: &'a ClusterConfig, exec: &'a E) -> Self {
        Self {
            orchestrator: Orchestrator::new(config, exec),
            phases: Phase::ALL.to_vec(),
        }
    }

    /// Restrict to `phases`. They still run in bring-up order.
    pub fn with_phases(mut self, mut phases: Vec<Phase>) -> Self {
        phases.sort_unstable();
        phases.dedup();
        self.phases = phases;
        self
    }

    /// Every step in execution order.
    pub fn plan(&self) -> Vec<Step<'a>> {
        let config = self.orchestrator.config();
        let hosts = [
            (config.primary.as_str(), HostRole::Primary),
            (config.standby.as_str(), HostRole::Standby),
        ];
        let total = self.phases.len() * hosts.len();

        self.phases
            .iter()
            .flat_map(|&phase| hosts.map(move |(host, role)| (phase, host, role)))
            .enumerate()
            .map(|(i, (phase, host, role))| Step {
                phase,
                host,
                role,
                index: i + 1,
                total,
            })
            .collect()
    }

    /// Run every step, calling `on_step` before each one. Stops at the
    /// first failure.
    pub fn run_with(&self, mut on_step: impl FnMut(&Step<'a>)) -> Result<()> {
        for step in self.plan() {
            on_step(&step);
            self.orchestrator.run(step.phase, step.host)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{PRIMARY, STANDBY, config, hosts};
    use hostexec::{Call, SimulatedExecutor};

    const DATA: &str = "/var/lib/postgresql/9.1/main";
    const HBA: &str = "/etc/postgresql/9.1/main/pg_hba.conf";

    fn first_contact(sim: &SimulatedExecutor) {
        sim.respond("dpkg-query", 0, "install ok installed");
        sim.respond("test -f", 1, "");
        sim.prompts("passwd", &["New password:", "Retype new password:"], 0);
        sim.prompts(
            "postgres@10.0.0.2",
            &[
                "Are you sure you want to continue connecting (yes/no)?",
                "postgres@10.0.0.2's password:",
            ],
            0,
        );
        sim.prompts(
            "postgres@10.0.0.1",
            &[
                "Are you sure you want to continue connecting (yes/no)?",
                "postgres@10.0.0.1's password:",
            ],
            0,
        );
    }

    #[test]
    fn test_plan_is_phase_major() {
        let config = config();
        let sim = hosts();
        let coordinator = Coordinator::new(&config, &sim)
            .with_phases(vec![Phase::Bringup, Phase::Configure, Phase::Configure]);
        let plan: Vec<(Phase, &str)> = coordinator.plan().iter().map(|s| (s.phase, s.host)).collect();
        assert_eq!(
            plan,
            vec![
                (Phase::Configure, PRIMARY),
                (Phase::Configure, STANDBY),
                (Phase::Bringup, PRIMARY),
                (Phase::Bringup, STANDBY),
            ]
        );
        assert!(coordinator.plan().iter().all(|s| s.total == 4));
    }

    #[test]
    fn test_full_bootstrap() {
        let config = config();
        let sim = hosts();
        first_contact(&sim);

        let mut seen = Vec::new();
        Coordinator::new(&config, &sim)
            .run_with(|step| seen.push((step.phase, step.role)))
            .unwrap();
        assert_eq!(seen.len(), 12);

        // one replication login, on the primary
        assert_eq!(sim.count(|c| c.script().is_some_and(|s| s.contains("CREATE USER"))), 1);
        assert_eq!(sim.count(|c| c.runs(PRIMARY, "CREATE USER \"replicator\"")), 1);

        // one bracket, on the primary, around the transfer
        assert_eq!(sim.count(|c| c.script().is_some_and(|s| s.contains("pg_start_backup"))), 1);
        assert_eq!(sim.count(|c| c.script().is_some_and(|s| s.contains("pg_stop_backup"))), 1);
        let begin = sim.position(|c| c.runs(PRIMARY, "pg_start_backup")).unwrap();
        let rsync = sim.position(|c| c.runs(PRIMARY, "rsync")).unwrap();
        let end = sim.position(|c| c.runs(PRIMARY, "pg_stop_backup")).unwrap();
        assert!(begin < rsync && rsync < end);
        assert!(
            sim.calls()[rsync]
                .script()
                .unwrap()
                .contains("10.0.0.2:/var/lib/postgresql/9.1/main/")
        );

        // the primary is up before the copy, the standby is down during it
        let primary_start = sim.position(|c| c.runs(PRIMARY, "service postgresql start")).unwrap();
        let standby_stop = sim.position(|c| c.runs(STANDBY, "service postgresql stop")).unwrap();
        assert!(primary_start < begin);
        assert!(standby_stop < rsync);

        // the standby comes up last, after the copy
        let standby_start = sim.position(|c| c.runs(STANDBY, "service postgresql start")).unwrap();
        assert!(rsync < standby_start);

        // recovery settings on both hosts, each naming its peer
        let recovery = format!("{DATA}/recovery.conf");
        assert!(sim.file(PRIMARY, &recovery).unwrap().contains("host=10.0.0.2 "));
        assert!(sim.file(STANDBY, &recovery).unwrap().contains("host=10.0.0.1 "));

        // keys were copied across, answering both prompts
        let copied = sim
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Interactive { script, responses, .. } if script.contains("ssh-copy-id") => {
                    Some(responses)
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(copied, vec![vec!["yes", "fluffysock"], vec!["yes", "fluffysock"]]);
    }

    #[test]
    fn test_rerun_configure_keeps_single_hba_rule() {
        let config = config();
        let sim = hosts();
        first_contact(&sim);
        Coordinator::new(&config, &sim).run_with(|_| {}).unwrap();

        Coordinator::new(&config, &sim)
            .with_phases(vec![Phase::Configure])
            .run_with(|_| {})
            .unwrap();

        for host in [PRIMARY, STANDBY] {
            let hba = sim.file(host, HBA).unwrap();
            assert_eq!(hba.matches("host  replication").count(), 1);
        }
    }

    #[test]
    fn test_stops_at_first_failure() {
        let config = config();
        let sim = hosts();
        first_contact(&sim);
        sim.respond_on(STANDBY, "service postgresql stop", 1, "");

        let err = Coordinator::new(&config, &sim).run_with(|_| {}).unwrap_err();
        assert!(format!("{err:#}").contains("configure phase failed on 10.0.0.2"));
        assert_eq!(sim.count(|c| c.runs(PRIMARY, "pg_start_backup")), 0);
        assert_eq!(sim.count(|c| c.runs(STANDBY, "service postgresql start")), 0);
    }

    #[test]
    fn test_unreachable_standby_fails_fast() {
        let config = config();
        let sim = hosts();
        first_contact(&sim);
        sim.unreachable(STANDBY);

        let err = Coordinator::new(&config, &sim).run_with(|_| {}).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("install phase failed on 10.0.0.2"));
        assert!(message.contains("cannot reach 10.0.0.2"));
    }
}
