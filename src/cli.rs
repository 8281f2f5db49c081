use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::Overrides;

#[derive(Parser)]
#[command(name = "pgpair")]
#[command(version)]
#[command(about = "Bootstrap PostgreSQL primary/standby streaming replication over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/pgpair/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every phase on both hosts, primary first
    Bootstrap(BootstrapArgs),

    /// Run a single phase on one host
    Phase(PhaseArgs),

    /// Show each host's role and database cluster
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and reach both hosts
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct BootstrapArgs {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Only run these phases (comma-separated)
    #[arg(long, conflicts_with = "skip")]
    pub only: Option<String>,

    /// Skip these phases (comma-separated)
    #[arg(long)]
    pub skip: Option<String>,
}

#[derive(Debug, Args)]
pub struct PhaseArgs {
    /// Phase to run: install, connectivity, configure, backup, bringup, database
    pub phase: String,

    /// Host to run it on (the primary or the standby address)
    #[arg(long)]
    pub host: String,
}

/// Cluster settings that override the config file
#[derive(Debug, Args)]
pub struct ClusterArgs {
    /// Primary host address
    #[arg(long, global = true, env = "PGPAIR_PRIMARY")]
    pub primary: Option<String>,

    /// Standby host address
    #[arg(long, global = true, env = "PGPAIR_STANDBY")]
    pub standby: Option<String>,

    /// SSH login with sudo rights on both hosts
    #[arg(long, global = true, env = "PGPAIR_SSH_USER")]
    pub ssh_user: Option<String>,

    /// Password for sudo on the hosts
    #[arg(long, global = true, env = "PGPAIR_SUDO_PASSWORD", hide_env_values = true)]
    pub sudo_password: Option<String>,

    /// Password to set for the service OS account
    #[arg(long, global = true, env = "PGPAIR_OS_PASSWORD", hide_env_values = true)]
    pub os_password: Option<String>,

    /// Password to set for the database superuser
    #[arg(long, global = true, env = "PGPAIR_SUPERUSER_PASSWORD", hide_env_values = true)]
    pub superuser_password: Option<String>,

    /// Password for the replication login
    #[arg(long, global = true, env = "PGPAIR_REPLICATION_PASSWORD", hide_env_values = true)]
    pub replication_password: Option<String>,

    /// Password for the application database owner
    #[arg(long, global = true, env = "PGPAIR_DB_OWNER_PASSWORD", hide_env_values = true)]
    pub db_owner_password: Option<String>,
}

impl From<ClusterArgs> for Overrides {
    fn from(args: ClusterArgs) -> Self {
        Self {
            primary: args.primary,
            standby: args.standby,
            ssh_user: args.ssh_user,
            sudo_password: args.sudo_password,
            os_password: args.os_password,
            superuser_password: args.superuser_password,
            replication_password: args.replication_password,
            db_owner_password: args.db_owner_password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_phase() {
        let cli = Cli::try_parse_from([
            "pgpair",
            "phase",
            "configure",
            "--host",
            "10.0.0.1",
            "--primary",
            "10.0.0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Phase(args) => {
                assert_eq!(args.phase, "configure");
                assert_eq!(args.host, "10.0.0.1");
            }
            _ => panic!("expected phase"),
        }
        assert_eq!(cli.cluster.primary.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_only_conflicts_with_skip() {
        let result = Cli::try_parse_from([
            "pgpair",
            "bootstrap",
            "--only",
            "install",
            "--skip",
            "database",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["pgpair", "-vv", "check"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
