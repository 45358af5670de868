//! Run orchestration: guard, plan, execute, release.
//!
//! Every mutating run takes the [`RunGuard`] first and gives it back on every
//! exit path, including errors and interruption. Work is raced against a
//! shutdown future; when shutdown wins, the in-flight executor future is
//! dropped (which kills a running rsync) and the run ends with
//! [`Error::Interrupted`].

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::backup::{
    Catalog, Instant, RetentionPlan, RetentionPlanner, SnapshotLayout, Tier, select_chain,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{DeletionExecutor, TransferExecutor, TransferReport, TransferRequest};
use crate::guard::{Fingerprint, GuardStatus, RunGuard};
use crate::paths;

/// One source/destination pair and everything derived from it.
#[derive(Debug, Clone)]
pub struct Job {
    source: PathBuf,
    layout: SnapshotLayout,
    marker: PathBuf,
    fingerprint: Fingerprint,
}

impl Job {
    /// Resolve paths and derive the lock marker for a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for unusable paths (`/` as a source,
    /// leading `//`, non-UTF-8) and [`Error::InvalidArgument`] for a bad
    /// bucket name.
    pub fn new(
        config: &Config,
        source: &Path,
        destination: &Path,
        bucket: Option<String>,
    ) -> Result<Self> {
        let source = paths::resolve(source)?;
        let destination = paths::resolve(destination)?;
        let marker = config.lock_scope().marker_for(&source)?;
        let fingerprint =
            Fingerprint::current(paths::as_str(&source)?, paths::as_str(&destination)?);
        let layout = SnapshotLayout::new(destination, bucket, config.naming().clone())?;

        Ok(Self {
            source,
            layout,
            marker,
            fingerprint,
        })
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub const fn layout(&self) -> &SnapshotLayout {
        &self.layout
    }

    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }
}

/// Result of a finished sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub destination: PathBuf,
    pub link_dest: Vec<PathBuf>,
    pub dry_run: bool,
    #[serde(skip)]
    pub report: TransferReport,
}

/// Result of a finished cleanup.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub plan: RetentionPlan,
    /// Deleted snapshots, or the ones that would be deleted in a dry run.
    pub deleted: Vec<PathBuf>,
    pub dry_run: bool,
}

/// One snapshot in a [`Listing`].
#[derive(Debug, Clone, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub instant: Instant,
    pub path: PathBuf,
    pub kept_by: Option<Tier>,
    pub expired: bool,
    pub link_dest: bool,
}

/// Snapshots of one destination with their retention status, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub snapshot_dir: PathBuf,
    pub now: Instant,
    pub entries: Vec<ListingEntry>,
}

/// Drives the executors for one configuration.
pub struct Orchestrator<'a, T, D> {
    config: &'a Config,
    transfer: T,
    deleter: D,
    dry_run: bool,
}

impl<'a, T, D> Orchestrator<'a, T, D>
where
    T: TransferExecutor,
    D: DeletionExecutor,
{
    pub fn new(config: &'a Config, transfer: T, deleter: D) -> Self {
        Self {
            config,
            transfer,
            deleter,
            dry_run: false,
        }
    }

    /// Pass `--dry-run` to rsync and skip deletions.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Is the job free to run?
    #[must_use]
    pub fn check(&self, job: &Job) -> GuardStatus {
        let status = RunGuard::probe(&job.marker, &job.fingerprint, self.config.process_check());
        if status.is_free() {
            info!(source = %job.source.display(), "causync is not running");
        } else {
            info!(source = %job.source.display(), ?status, "causync is already running");
        }
        status
    }

    /// Take a new snapshot of the job's source.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if the guard is held, [`Error::Parse`] for a
    /// malformed destination, [`Error::Environment`] and
    /// [`Error::Transfer`] for I/O and rsync failures, and
    /// [`Error::Interrupted`] if `shutdown` resolves first.
    pub async fn sync(
        &self,
        job: &Job,
        now: &Instant,
        excludes: &[String],
        shutdown: impl Future<Output = ()>,
    ) -> Result<SyncOutcome> {
        if !job.source.exists() {
            return Err(Error::InvalidPath {
                path: job.source.display().to_string(),
                reason: "source does not exist".to_string(),
            });
        }

        let guard = self.acquire(job)?;
        let result = tokio::select! {
            result = self.sync_locked(job, now, excludes) => result,
            () = shutdown => Err(Error::Interrupted),
        };
        finish(guard, result)
    }

    async fn sync_locked(
        &self,
        job: &Job,
        now: &Instant,
        excludes: &[String],
    ) -> Result<SyncOutcome> {
        let layout = &job.layout;
        let snapshot_dir = layout.snapshot_dir();
        if !self.dry_run {
            tokio::fs::create_dir_all(&snapshot_dir).await.map_err(|e| {
                Error::environment(format!("Failed to create {}", snapshot_dir.display()), e)
            })?;
        }

        let stamp = self.config.date_format().truncate(now)?;
        let catalog = layout.scan()?;
        if catalog.contains(&stamp) {
            info!(
                snapshot = %layout.naming().name_for(&stamp),
                "Snapshot for this instant exists, updating it in place"
            );
        }
        let others: Catalog = catalog.iter().copied().filter(|i| *i != stamp).collect();
        let link_dest: Vec<PathBuf> = select_chain(&others, self.config.link_dest_count())
            .iter()
            .map(|instant| layout.snapshot_path(instant))
            .collect();

        let request = TransferRequest {
            sources: vec![job.source.clone()],
            destination: layout.snapshot_path(&stamp),
            link_dest,
            excludes: excludes.to_vec(),
            dry_run: self.dry_run,
        };
        info!(
            source = %job.source.display(),
            destination = %request.destination.display(),
            "Syncing"
        );
        let report = self.transfer.transfer(&request).await?;

        Ok(SyncOutcome {
            destination: request.destination,
            link_dest: request.link_dest,
            dry_run: self.dry_run,
            report,
        })
    }

    /// Delete snapshots that fall out of every retention tier.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::sync`], minus transfer failures. A
    /// [`Error::Parse`] aborts before anything is deleted.
    pub async fn cleanup(
        &self,
        job: &Job,
        now: &Instant,
        shutdown: impl Future<Output = ()>,
    ) -> Result<CleanupOutcome> {
        let guard = self.acquire(job)?;
        let result = tokio::select! {
            result = self.cleanup_locked(job, now) => result,
            () = shutdown => Err(Error::Interrupted),
        };
        finish(guard, result)
    }

    async fn cleanup_locked(&self, job: &Job, now: &Instant) -> Result<CleanupOutcome> {
        let layout = &job.layout;
        let catalog = layout.scan()?;
        let plan = RetentionPlanner::new(self.config.retention().clone()).plan(&catalog, now);
        info!(
            snapshots = catalog.len(),
            delete = plan.final_delete().len(),
            dry_run = self.dry_run,
            "Retention planned"
        );

        let mut deleted = Vec::with_capacity(plan.final_delete().len());
        for instant in plan.final_delete() {
            let path = layout.snapshot_path(instant);
            if self.dry_run {
                info!(path = %path.display(), "Would delete snapshot");
            } else {
                self.deleter.remove(&path).await?;
            }
            deleted.push(path);
        }

        if !self.dry_run {
            info!(count = deleted.len(), "Successfully deleted old backups");
        }
        Ok(CleanupOutcome {
            plan,
            deleted,
            dry_run: self.dry_run,
        })
    }

    /// Describe the snapshots under `layout` without taking the guard.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] and [`Error::Environment`] from scanning.
    pub fn list(&self, layout: &SnapshotLayout, now: &Instant) -> Result<Listing> {
        let catalog = layout.scan()?;
        let plan = RetentionPlanner::new(self.config.retention().clone()).plan(&catalog, now);
        let chain = select_chain(&catalog, self.config.link_dest_count());

        let entries = catalog
            .sorted_desc()
            .into_iter()
            .map(|instant| ListingEntry {
                name: layout.naming().name_for(&instant),
                path: layout.snapshot_path(&instant),
                kept_by: plan.kept_by(&instant),
                expired: plan.final_delete().contains(&instant),
                link_dest: chain.contains(&instant),
                instant,
            })
            .collect();

        Ok(Listing {
            snapshot_dir: layout.snapshot_dir(),
            now: *now,
            entries,
        })
    }

    fn acquire(&self, job: &Job) -> Result<RunGuard> {
        RunGuard::acquire(&job.marker, &job.fingerprint, self.config.process_check()).inspect_err(
            |e| {
                if matches!(e, Error::AlreadyRunning { .. }) {
                    info!(source = %job.source.display(), "causync is already running");
                }
            },
        )
    }
}

/// Release the guard and merge its outcome with the run's.
fn finish<T>(guard: RunGuard, result: Result<T>) -> Result<T> {
    if matches!(result, Err(Error::Interrupted)) {
        warn!(marker = %guard.marker().display(), "Interrupted, releasing run guard");
    }
    match (result, guard.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release)) => {
            error!(error = %release, "Failed to release run guard");
            Err(e)
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Unable to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    warn!("Shutdown signal received");
}
