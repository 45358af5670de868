//! Unlock command implementation.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::{RunContext, print_json};
use crate::error::Result;
use crate::guard::RunGuard;
use crate::paths;

#[derive(Serialize)]
struct UnlockOutput<'a> {
    marker: &'a Path,
    removed: bool,
}

/// Clear the lock marker for `source`.
///
/// # Errors
///
/// Returns `AlreadyRunning` if the marker's process is still alive and
/// `force` is not set.
pub fn execute(source: &Path, force: bool, ctx: &RunContext) -> Result<()> {
    let marker = ctx
        .config
        .lock_scope()
        .marker_for(&paths::resolve(source)?)?;
    let removed = RunGuard::clear(&marker, force)?;

    if ctx.json {
        return print_json(&UnlockOutput {
            marker: &marker,
            removed,
        });
    }

    if removed {
        println!("{} Removed {}", "✓".green(), marker.display());
    } else {
        println!("No lock marker at {}", marker.display());
    }
    Ok(())
}
