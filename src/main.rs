mod cli;
mod cluster;
mod commands;
mod config;
mod confpatch;
mod error;
mod orchestrator;
mod progress;
mod role;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

use crate::config::Overrides;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `--config` path, if given
    pub config: Option<String>,
    /// Flag and environment overrides
    pub overrides: Overrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        overrides: cli.cluster.into(),
    };

    match cli.command {
        Command::Bootstrap(args) => commands::bootstrap::run(&ctx, &args),
        Command::Phase(args) => commands::phase::run(&ctx, &args),
        Command::Status { json } => commands::status::run(&ctx, json),
        Command::Check => commands::check::run(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "pgpair", &mut io::stdout());
            Ok(())
        }
    }
}
