//! Sync command implementation.

use colored::Colorize;

use super::{RunContext, print_json, runtime};
use crate::cli::SyncArgs;
use crate::error::Result;
use crate::executor::{FsDeleter, parse_exclude_file};
use crate::orchestrator::{Job, Orchestrator, shutdown_signal};

/// Take a snapshot of the source, hard-linking against recent snapshots.
///
/// # Errors
///
/// Propagates guard, scan, transfer and interruption errors.
pub fn execute(args: &SyncArgs, ctx: &RunContext) -> Result<()> {
    let target = &args.target;
    let job = Job::new(
        &ctx.config,
        &target.source,
        &target.destination,
        target.bucket.clone(),
    )?;

    let mut excludes = args.excludes.clone();
    if let Some(file) = &args.exclude_from {
        excludes.extend(parse_exclude_file(file)?);
    }

    let orchestrator = Orchestrator::new(&ctx.config, ctx.config.rsync_executor(), FsDeleter)
        .dry_run(ctx.dry_run);
    let outcome = runtime()?.block_on(orchestrator.sync(
        &job,
        &ctx.now,
        &excludes,
        shutdown_signal(),
    ))?;

    if ctx.json {
        return print_json(&outcome);
    }

    let verb = if outcome.dry_run { "Would sync" } else { "Synced" };
    println!(
        "{} {verb} {} → {}",
        "✓".green(),
        job.source().display(),
        outcome.destination.display().to_string().bold()
    );
    if outcome.link_dest.is_empty() {
        println!("  {}", "full transfer (no earlier snapshots)".dimmed());
    } else {
        println!(
            "  {} {}",
            "linked against:".dimmed(),
            outcome.link_dest.len()
        );
        for base in &outcome.link_dest {
            println!("    {}", base.display().to_string().dimmed());
        }
    }
    Ok(())
}
