//! Phase command - run one phase on one host

use anyhow::Result;

use crate::Context;
use crate::cli::PhaseArgs;
use crate::orchestrator::{Orchestrator, Phase};
use crate::progress;
use crate::role;
use crate::ui;

pub fn run(ctx: &Context, args: &PhaseArgs) -> Result<()> {
    let phase: Phase = args.phase.parse()?;
    let config = super::load_config(ctx)?;
    let target = role::resolve(&args.host, &config)?;

    let label = format!("{phase} on {}", ui::host_label(target.host, target.role));
    let pb = progress::spinner(&label, ctx.quiet || ctx.verbose > 0);

    let exec = super::executor(&config);
    match Orchestrator::new(&config, &exec).run(phase, &args.host) {
        Ok(()) => {
            progress::finish_success(&pb, &label);
            if ctx.verbose > 0 && !ctx.quiet {
                ui::success(&label);
            }
            Ok(())
        }
        Err(e) => {
            progress::finish_error(&pb, &label);
            Err(e)
        }
    }
}
