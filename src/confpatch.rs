//! Remote config file mutation.
//!
//! Two strategies: [`ConfigMutator::append_lines`] always appends, and
//! [`ConfigMutator::append_if_absent`] first looks for a line matching a
//! pattern so it can be re-applied safely.

use anyhow::{Context, Result};
use hostexec::{Executor, RunAs};
use regex::Regex;

/// Edits files on one host.
pub struct ConfigMutator<'a, E: Executor + ?Sized> {
    exec: &'a E,
    host: &'a str,
}

impl<'a, E: Executor + ?Sized> ConfigMutator<'a, E> {
    pub fn new(exec: &'a E, host: &'a str) -> Self {
        Self { exec, host }
    }

    /// Lines of the file, empty if it is missing or unreadable.
    pub fn read_lines(&self, path: &str) -> Vec<String> {
        match self.exec.read_file(self.host, path, &RunAs::Root) {
            Ok(Some(content)) => content.lines().map(str::to_string).collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::debug!("[{}] could not read {path} ({e}), treating as empty", self.host);
                Vec::new()
            }
        }
    }

    /// Whether any line of the file matches `pattern`.
    pub fn contains(&self, path: &str, pattern: &Regex) -> bool {
        self.read_lines(path).iter().any(|line| pattern.is_match(line))
    }

    /// Append `lines` unconditionally.
    pub fn append_lines(&self, path: &str, lines: &[String], run_as: &RunAs) -> Result<()> {
        log::debug!("[{}] appending {} line(s) to {path}", self.host, lines.len());
        self.exec
            .append_to_file(self.host, path, lines, run_as)
            .with_context(|| format!("Failed to append to {path} on {}", self.host))
    }

    /// Append `line` unless a line already matches `pattern`.
    ///
    /// Returns `true` if the line was appended.
    pub fn append_if_absent(&self, path: &str, pattern: &Regex, line: &str) -> Result<bool> {
        if self.contains(path, pattern) {
            log::info!("[{}] {path} already has an entry matching {pattern}", self.host);
            return Ok(false);
        }
        self.append_lines(path, &[line.to_string()], &RunAs::Root)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostexec::SimulatedExecutor;

    const HBA: &str = "/etc/postgresql/9.1/main/pg_hba.conf";

    #[test]
    fn test_append_if_absent_is_idempotent() {
        let sim = SimulatedExecutor::new();
        sim.seed_file("db1", HBA, "local all postgres peer\n");
        let mutator = ConfigMutator::new(&sim, "db1");
        let pattern = Regex::new(r"^\s*host\s+replication\s+replicator\s+10\.0\.0\.2/32").unwrap();
        let line = "host  replication replicator 10.0.0.2/32  md5";

        assert!(mutator.append_if_absent(HBA, &pattern, line).unwrap());
        assert!(!mutator.append_if_absent(HBA, &pattern, line).unwrap());

        let content = sim.file("db1", HBA).unwrap();
        assert_eq!(content.matches("replication replicator").count(), 1);
        assert!(content.starts_with("local all postgres peer\n"));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let sim = SimulatedExecutor::new();
        let mutator = ConfigMutator::new(&sim, "db1");
        assert!(mutator.read_lines("/nope").is_empty());
        assert!(!mutator.contains("/nope", &Regex::new("x").unwrap()));
    }

    #[test]
    fn test_unreadable_host_treated_as_absent() {
        let sim = SimulatedExecutor::new();
        sim.unreachable("db9");
        let mutator = ConfigMutator::new(&sim, "db9");
        assert!(mutator.read_lines(HBA).is_empty());
        assert!(
            mutator
                .append_if_absent(HBA, &Regex::new("x").unwrap(), "x")
                .is_err()
        );
    }

    #[test]
    fn test_append_lines_always_appends() {
        let sim = SimulatedExecutor::new();
        let mutator = ConfigMutator::new(&sim, "db1");
        let lines = vec!["hot_standby = on".to_string()];
        mutator.append_lines("/etc/pg.conf", &lines, &RunAs::Root).unwrap();
        mutator.append_lines("/etc/pg.conf", &lines, &RunAs::Root).unwrap();
        assert_eq!(
            sim.file("db1", "/etc/pg.conf").unwrap(),
            "hot_standby = on\nhot_standby = on\n"
        );
    }
}
