//! Side-effecting executors behind traits.
//!
//! The orchestrator never touches rsync or the filesystem directly: it hands
//! a [`TransferRequest`] to a [`TransferExecutor`] and snapshot paths to a
//! [`DeletionExecutor`]. Tests substitute recording fakes.

mod delete;
mod rsync;

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

pub use delete::FsDeleter;
pub use rsync::{DEFAULT_RSYNC_FLAGS, DEFAULT_RSYNC_PROGRAM, RsyncExecutor};

/// One snapshot transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub sources: Vec<PathBuf>,
    /// The new snapshot directory.
    pub destination: PathBuf,
    /// Hard-link bases, most recent first.
    pub link_dest: Vec<PathBuf>,
    /// Patterns passed through to the transfer tool unchanged.
    pub excludes: Vec<String>,
    pub dry_run: bool,
}

/// What a finished transfer reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub stdout: String,
    pub stderr: String,
}

/// Copies sources into a new snapshot directory.
pub trait TransferExecutor: Send + Sync {
    /// Run the transfer to completion.
    ///
    /// Dropping the returned future must abort the transfer.
    fn transfer(
        &self,
        request: &TransferRequest,
    ) -> impl Future<Output = Result<TransferReport>> + Send;
}

/// Removes a snapshot directory recursively.
pub trait DeletionExecutor: Send + Sync {
    /// Remove `path`. A path that is already gone is not an error.
    fn remove(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Exclude patterns from file contents: one per line, blank lines and
/// `#` comments skipped.
#[must_use]
pub fn parse_excludes(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

/// Read an exclude file (see [`parse_excludes`]).
///
/// # Errors
///
/// Returns [`Error::Environment`] if the file cannot be read.
pub fn parse_exclude_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::environment(format!("Failed to read exclude file {}", path.display()), e)
    })?;
    let patterns = parse_excludes(&contents);
    debug!(file = %path.display(), count = patterns.len(), "Loaded exclude patterns");
    Ok(patterns)
}
