use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use super::DeletionExecutor;
use crate::error::{Error, Result};

/// Deletes snapshot directories from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDeleter;

impl DeletionExecutor for FsDeleter {
    fn remove(&self, path: &Path) -> impl Future<Output = Result<()>> + Send {
        let path = path.to_path_buf();
        async move {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Deleted snapshot");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Snapshot already gone");
                    Ok(())
                }
                Err(e) => Err(Error::environment(
                    format!("Failed to delete {}", path.display()),
                    e,
                )),
            }
        }
    }
}
