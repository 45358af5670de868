//! Single-instance run guard.
//!
//! A run holds an exclusive lock marker for its source for as long as it
//! transfers or deletes. The marker is created with `create_new`, so two
//! runs racing for the same source cannot both succeed. Its JSON content
//! (pid, run id, start time, paths) is for operators and `causync check`.
//!
//! On Linux the guard additionally scans `/proc` for another causync process
//! working on the same source and destination. That probe is advisory: it
//! catches runs started by older versions that did not write a marker.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::paths;

/// Where lock markers live.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LockScope {
    /// `<parent>/<basename>.lock` next to each source.
    #[default]
    PerSource,
    /// One marker for every source, serializing all runs on this host.
    Global(PathBuf),
}

impl LockScope {
    /// Marker path guarding `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `source` has no final component.
    pub fn marker_for(&self, source: &Path) -> Result<PathBuf> {
        match self {
            Self::PerSource => paths::source_marker(source),
            Self::Global(path) => paths::absolutize(path),
        }
    }
}

/// Subcommands that write to a destination. Read-only runs such as `check`
/// and `list` never count as concurrent.
const MUTATING_COMMANDS: [&str; 2] = ["sync", "cleanup"];

/// What a concurrent run of the same job looks like in a process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    program: String,
    source: String,
    destination: String,
}

impl Fingerprint {
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Fingerprint of this executable working on `source` and `destination`.
    #[must_use]
    pub fn current(source: impl Into<String>, destination: impl Into<String>) -> Self {
        let program = std::env::args_os()
            .next()
            .and_then(|argv0| {
                Path::new(&argv0)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        Self::new(program, source, destination)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Does a command line (argv) belong to a `sync` or `cleanup` run of
    /// this job?
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, argv: &[S]) -> bool {
        let Some((argv0, args)) = argv.split_first() else {
            return false;
        };
        let program = Path::new(argv0.as_ref())
            .file_name()
            .map(|name| name.to_string_lossy());
        if program.as_deref() != Some(self.program.as_str()) {
            return false;
        }

        let mentions = |wanted: &str| {
            args.iter().any(|arg| {
                let arg = arg.as_ref();
                arg == wanted || paths::normalize(arg).is_ok_and(|n| n == wanted)
            })
        };
        let mutating = args
            .iter()
            .any(|arg| MUTATING_COMMANDS.contains(&arg.as_ref()));
        mutating && mentions(&self.source) && mentions(&self.destination)
    }
}

/// Diagnostic content of a lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockContent {
    pub pid: u32,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub destination: String,
}

impl LockContent {
    fn for_current_run(fingerprint: &Fingerprint) -> Self {
        Self {
            pid: std::process::id(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            source: fingerprint.source.clone(),
            destination: fingerprint.destination.clone(),
        }
    }
}

/// Result of inspecting a guard without acquiring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardStatus {
    Free,
    Held {
        marker: PathBuf,
        holder: Option<LockContent>,
        /// `None` when the marker is unreadable.
        alive: Option<bool>,
    },
    ProcessDetected {
        pid: u32,
    },
}

impl GuardStatus {
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

/// An acquired run guard. Dropping it removes the marker.
#[derive(Debug)]
pub struct RunGuard {
    marker: PathBuf,
    content: LockContent,
    released: bool,
}

impl RunGuard {
    /// Take the guard for `fingerprint`'s job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if the marker exists or, with
    /// `probe_processes`, another matching process is alive.
    /// Returns [`Error::Environment`] if the marker cannot be written.
    pub fn acquire(marker: &Path, fingerprint: &Fingerprint, probe_processes: bool) -> Result<Self> {
        if probe_processes {
            if let Some(pid) = find_running(fingerprint) {
                return Err(Error::AlreadyRunning {
                    key: fingerprint.source.clone(),
                    marker: None,
                    holder: Some(pid),
                });
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(marker) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read_marker(marker).ok().map(|content| content.pid);
                return Err(Error::AlreadyRunning {
                    key: fingerprint.source.clone(),
                    marker: Some(marker.to_path_buf()),
                    holder,
                });
            }
            Err(e) => {
                return Err(Error::environment(
                    format!("Failed to create lock marker {}", marker.display()),
                    e,
                ));
            }
        };

        let content = LockContent::for_current_run(fingerprint);
        let written = serde_json::to_vec_pretty(&content)
            .map_err(std::io::Error::from)
            .and_then(|bytes| file.write_all(&bytes));
        if let Err(e) = written {
            let _ = fs::remove_file(marker);
            return Err(Error::environment(
                format!("Failed to write lock marker {}", marker.display()),
                e,
            ));
        }

        info!(
            marker = %marker.display(),
            run_id = %content.run_id,
            "Acquired run guard"
        );
        Ok(Self {
            marker: marker.to_path_buf(),
            content,
            released: false,
        })
    }

    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    #[must_use]
    pub const fn content(&self) -> &LockContent {
        &self.content
    }

    /// Remove the marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if the marker exists but cannot be
    /// removed. A marker that is already gone only logs a warning.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.marker) {
            Ok(()) => {
                debug!(marker = %self.marker.display(), "Released run guard");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(marker = %self.marker.display(), "Lock marker vanished before release");
                Ok(())
            }
            Err(e) => Err(Error::environment(
                format!("Failed to remove lock marker {}", self.marker.display()),
                e,
            )),
        }
    }

    /// Inspect the guard for a job without taking it.
    #[must_use]
    pub fn probe(marker: &Path, fingerprint: &Fingerprint, probe_processes: bool) -> GuardStatus {
        if marker.exists() {
            let holder = read_marker(marker).ok();
            let alive = holder.as_ref().map(|content| is_pid_alive(content.pid));
            return GuardStatus::Held {
                marker: marker.to_path_buf(),
                holder,
                alive,
            };
        }
        if probe_processes {
            if let Some(pid) = find_running(fingerprint) {
                return GuardStatus::ProcessDetected { pid };
            }
        }
        GuardStatus::Free
    }

    /// Remove a marker left behind by a run that died without cleaning up.
    ///
    /// Returns `false` if there was no marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if the recorded holder is still
    /// alive and `force` is not set, and [`Error::Environment`] if the
    /// marker cannot be removed.
    pub fn clear(marker: &Path, force: bool) -> Result<bool> {
        let holder = match read_marker(marker) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                warn!(marker = %marker.display(), error = %e, "Lock marker is unreadable");
                None
            }
        };

        if let Some(content) = &holder {
            if !force && content.pid != std::process::id() && is_pid_alive(content.pid) {
                return Err(Error::AlreadyRunning {
                    key: content.source.clone(),
                    marker: Some(marker.to_path_buf()),
                    holder: Some(content.pid),
                });
            }
        }

        match fs::remove_file(marker) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(Error::environment(
                    format!("Failed to remove lock marker {}", marker.display()),
                    e,
                ));
            }
        }
        info!(
            marker = %marker.display(),
            holder = ?holder.map(|content| content.pid),
            force,
            "Cleared lock marker"
        );
        Ok(true)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!(marker = %self.marker.display(), "Dropping run guard");
            let _ = fs::remove_file(&self.marker);
        }
    }
}

fn read_marker(path: &Path) -> std::io::Result<LockContent> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(std::io::Error::from)
}

#[cfg(target_os = "linux")]
fn is_pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn is_pid_alive(_pid: u32) -> bool {
    // Unknown platforms: assume alive.
    true
}

#[cfg(target_os = "linux")]
fn find_running(fingerprint: &Fingerprint) -> Option<u32> {
    let own = std::process::id();
    let entries = fs::read_dir("/proc").ok()?;

    for entry in entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        if pid == own {
            continue;
        }
        let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        let argv: Vec<String> = raw
            .split(|byte| *byte == 0)
            .filter(|arg| !arg.is_empty())
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect();
        if fingerprint.matches(&argv) {
            debug!(pid, ?argv, "Found concurrent run");
            return Some(pid);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn find_running(_fingerprint: &Fingerprint) -> Option<u32> {
    None
}
