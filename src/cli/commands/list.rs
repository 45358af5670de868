//! List command implementation.

use std::path::Path;

use colored::Colorize;

use super::{RunContext, print_json};
use crate::backup::SnapshotLayout;
use crate::error::Result;
use crate::executor::FsDeleter;
use crate::orchestrator::Orchestrator;
use crate::paths;

/// Show every snapshot under a destination with the tier that keeps it.
///
/// Read-only; does not take the run guard.
pub fn execute(destination: &Path, bucket: Option<&str>, ctx: &RunContext) -> Result<()> {
    let layout = SnapshotLayout::new(
        paths::resolve(destination)?,
        bucket.map(ToString::to_string),
        ctx.config.naming().clone(),
    )?;
    let orchestrator = Orchestrator::new(&ctx.config, ctx.config.rsync_executor(), FsDeleter);
    let listing = orchestrator.list(&layout, &ctx.now)?;

    if ctx.json {
        return print_json(&listing);
    }

    if listing.entries.is_empty() {
        println!("No snapshots in {}", listing.snapshot_dir.display());
        return Ok(());
    }

    println!(
        "{} {}",
        "Snapshots in".bold(),
        listing.snapshot_dir.display().to_string().bold()
    );
    for entry in &listing.entries {
        let status = match entry.kept_by {
            Some(tier) => tier.to_string().green(),
            None if entry.expired => "expired".red(),
            None => "-".dimmed(),
        };
        let link = if entry.link_dest { "link-dest".cyan() } else { "".normal() };
        println!("  {:<24} {:<8} {}", entry.name, status, link);
    }

    let expired = listing.entries.iter().filter(|e| e.expired).count();
    println!(
        "{}",
        format!("{} snapshot(s), {expired} expired", listing.entries.len()).dimmed()
    );
    Ok(())
}
