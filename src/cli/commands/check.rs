//! Check command implementation.

use colored::Colorize;

use super::{RunContext, print_json};
use crate::cli::Target;
use crate::error::Result;
use crate::executor::{FsDeleter, RsyncExecutor};
use crate::guard::GuardStatus;
use crate::orchestrator::{Job, Orchestrator};

/// Report whether a run is active for the target's source.
///
/// Always succeeds when the paths are valid; the answer is in the output.
pub fn execute(target: &Target, ctx: &RunContext) -> Result<()> {
    let job = Job::new(
        &ctx.config,
        &target.source,
        &target.destination,
        target.bucket.clone(),
    )?;
    let orchestrator = Orchestrator::new(&ctx.config, RsyncExecutor::default(), FsDeleter);
    let status = orchestrator.check(&job);

    if ctx.json {
        return print_json(&status);
    }

    let source = job.source().display();
    match status {
        GuardStatus::Free => {
            println!("{} causync is not running on {source}", "✓".green());
        }
        GuardStatus::Held {
            marker,
            holder,
            alive,
        } => {
            println!("{} causync is already running on {source}", "●".yellow());
            println!("  {} {}", "marker:".dimmed(), marker.display());
            if let Some(holder) = holder {
                let state = match alive {
                    Some(true) => "alive".green(),
                    _ => "not running (stale marker)".red(),
                };
                println!("  {} {} ({state})", "pid:".dimmed(), holder.pid);
                println!("  {} {}", "started:".dimmed(), holder.started_at);
                println!("  {} {}", "run id:".dimmed(), holder.run_id);
            }
        }
        GuardStatus::ProcessDetected { pid } => {
            println!(
                "{} causync is already running on {source} (pid {pid}, no marker)",
                "●".yellow()
            );
        }
    }
    Ok(())
}
