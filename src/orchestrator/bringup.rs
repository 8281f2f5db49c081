use anyhow::Result;

use super::Orchestrator;
use crate::role::Assignment;
use hostexec::Executor;

impl<E: Executor + ?Sized> Orchestrator<'_, E> {
    /// Start the standby on its copied data directory.
    pub(super) fn bringup(&self, target: &Assignment<'_>) -> Result<()> {
        if target.is_primary() {
            log::info!("[{}] primary is already running", target.host);
            return Ok(());
        }
        self.service(target, "start")
    }
}

#[cfg(test)]
mod tests {
    use crate::orchestrator::tests::{PRIMARY, STANDBY, config, hosts};
    use crate::orchestrator::{Orchestrator, Phase};

    #[test]
    fn test_only_standby_starts() {
        let config = config();
        let sim = hosts();
        let orchestrator = Orchestrator::new(&config, &sim);
        orchestrator.run(Phase::Bringup, PRIMARY).unwrap();
        orchestrator.run(Phase::Bringup, STANDBY).unwrap();

        assert!(sim.calls().iter().all(|c| c.host() == STANDBY));
        assert_eq!(sim.count(|c| c.runs(STANDBY, "service postgresql start")), 1);
    }
}
