//! Cleanup command implementation.

use colored::Colorize;

use super::{RunContext, print_json, runtime};
use crate::cli::Target;
use crate::error::Result;
use crate::executor::FsDeleter;
use crate::orchestrator::{Job, Orchestrator, shutdown_signal};

/// Apply the retention policy to the target's snapshots.
///
/// # Errors
///
/// Propagates guard, parse, deletion and interruption errors. Nothing is
/// deleted if any snapshot name fails to parse.
pub fn execute(target: &Target, ctx: &RunContext) -> Result<()> {
    let job = Job::new(
        &ctx.config,
        &target.source,
        &target.destination,
        target.bucket.clone(),
    )?;

    let orchestrator = Orchestrator::new(&ctx.config, ctx.config.rsync_executor(), FsDeleter)
        .dry_run(ctx.dry_run);
    let outcome =
        runtime()?.block_on(orchestrator.cleanup(&job, &ctx.now, shutdown_signal()))?;

    if ctx.json {
        return print_json(&outcome);
    }

    for decision in outcome.plan.decisions() {
        println!(
            "{:<8} {} kept, {} expired",
            decision.tier.to_string().cyan(),
            decision.keep.len(),
            decision.reconciled.len()
        );
    }

    if outcome.deleted.is_empty() {
        println!("{} Nothing to delete", "✓".green());
        return Ok(());
    }

    let verb = if outcome.dry_run { "Would delete" } else { "Deleted" };
    println!("{} {verb} {} snapshot(s):", "✓".green(), outcome.deleted.len());
    for path in &outcome.deleted {
        println!("  {}", path.display().to_string().red());
    }
    Ok(())
}
