//! Bootstrap command - bring up replication on both hosts in one go

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::ProgressBar;

use crate::Context as AppContext;
use crate::cli::BootstrapArgs;
use crate::orchestrator::{Coordinator, Phase, Step};
use crate::progress;
use crate::ui;

pub fn run(ctx: &AppContext, args: &BootstrapArgs) -> Result<()> {
    let config = super::load_config(ctx)?;
    let phases = Phase::select(args.only.as_deref(), args.skip.as_deref())?;
    if phases.is_empty() {
        ui::warn("No phases selected, nothing to do");
        return Ok(());
    }

    if !ctx.quiet {
        ui::banner();
    }
    ui::header("Replication bootstrap");
    ui::kv("Primary", &config.primary);
    ui::kv("Standby", &config.standby);
    ui::kv("Service", &format!("{} (account {})", config.service, config.account));

    ui::section("Phases");
    for phase in &phases {
        println!("  {:<14} {}", phase.name().bold(), phase.description().dimmed());
    }
    println!();

    if phases.contains(&Phase::Backup) {
        ui::warn(&format!(
            "The data directory on {} will be overwritten with the primary's",
            config.standby
        ));
    }

    if !args.yes && !confirm_proceed()? {
        ui::info("Cancelled");
        return Ok(());
    }

    let exec = super::executor(&config);
    let coordinator = Coordinator::new(&config, &exec).with_phases(phases);

    // with -v the log lines are the progress
    let show_spinner = !ctx.quiet && ctx.verbose == 0;
    let mut current: Option<(ProgressBar, String)> = None;
    let result = coordinator.run_with(|step| {
        if let Some((pb, label)) = current.take() {
            progress::finish_success(&pb, &label);
        }
        let label = step_label(step);
        if show_spinner {
            current = Some((progress::spinner(&label, false), label));
        } else if !ctx.quiet {
            ui::step(step.index, step.total, &label);
        }
    });

    match (result, current) {
        (Ok(()), Some((pb, label))) => progress::finish_success(&pb, &label),
        (Err(e), Some((pb, label))) => {
            progress::finish_error(&pb, &label);
            return Err(e);
        }
        (result, None) => result?,
    }

    println!();
    ui::success(&format!(
        "{} is replicating from {}",
        config.standby.bold(),
        config.primary.bold()
    ));
    Ok(())
}

fn step_label(step: &Step<'_>) -> String {
    format!(
        "{} on {}",
        step.phase,
        ui::host_label(step.host, step.role)
    )
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}
