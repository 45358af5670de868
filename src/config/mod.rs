//! Configuration management.
//!
//! causync reads one JSON file, by default `~/.causync/config.json`
//! (override with `--config` or `CAUSYNC_CONFIG`). Every field is optional:
//!
//! ```json
//! {
//!   "date_format": "%Y%m%d",
//!   "name_prefix": "",
//!   "link_dest_count": 5,
//!   "retention": {
//!     "yearly":  { "keep": 10, "period_days": 365 },
//!     "monthly": { "keep": 6,  "period_days": 31 },
//!     "weekly":  { "keep": 4,  "period_days": 7 },
//!     "daily":   { "keep": 7,  "period_days": 1 },
//!     "weekly_anchor": "Mon"
//!   },
//!   "rsync": { "program": "rsync", "flags": ["--archive", "..."] },
//!   "lock_file": null,
//!   "process_check": true,
//!   "log_file": null
//! }
//! ```
//!
//! The file is validated once into an immutable [`Config`] that is passed
//! explicitly to everything that needs it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backup::{DEFAULT_DATE_FORMAT, DateFormat, NamingScheme, RetentionPolicy};
use crate::error::{Error, Result};
use crate::executor::{DEFAULT_RSYNC_FLAGS, DEFAULT_RSYNC_PROGRAM, RsyncExecutor};
use crate::guard::LockScope;

/// rsync refuses more basis directories than this.
pub const MAX_LINK_DEST: usize = 20;

/// How the transfer tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsyncSettings {
    pub program: String,
    pub flags: Vec<String>,
}

impl Default for RsyncSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_RSYNC_PROGRAM.to_string(),
            flags: DEFAULT_RSYNC_FLAGS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub date_format: String,
    pub name_prefix: String,
    pub link_dest_count: usize,
    pub retention: RetentionPolicy,
    pub rsync: RsyncSettings,
    /// Single marker shared by every source instead of one per source.
    pub lock_file: Option<PathBuf>,
    /// Also look for concurrent runs in the process table.
    pub process_check: bool,
    /// Append logs here as well as to the console. Unset means no log file.
    pub log_file: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            name_prefix: String::new(),
            link_dest_count: 5,
            retention: RetentionPolicy::default(),
            rsync: RsyncSettings::default(),
            lock_file: None,
            process_check: true,
            log_file: None,
        }
    }
}

/// Validated, read-only configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    naming: NamingScheme,
    link_dest_count: usize,
    retention: RetentionPolicy,
    rsync: RsyncSettings,
    lock_scope: LockScope,
    process_check: bool,
    log_file: Option<PathBuf>,
    origin: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            naming: NamingScheme::default(),
            link_dest_count: 5,
            retention: RetentionPolicy::default(),
            rsync: RsyncSettings::default(),
            lock_scope: LockScope::PerSource,
            process_check: true,
            log_file: None,
            origin: None,
        }
    }
}

impl Config {
    /// Load from `explicit`, or from the default location if it exists, or
    /// fall back to built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit file is missing, a file cannot
    /// be read or parsed, or a value is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        };

        let Some(path) = path else {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_json(&content)
            .map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
                other => other,
            })?;
        debug!(path = %path.display(), "Loaded config");
        config.origin = Some(path);
        Ok(config)
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or invalid values.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        Self::from_file(file)
    }

    /// Validate raw settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid values.
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let format = DateFormat::new(file.date_format)
            .map_err(|e| Error::Config(format!("date_format: {e}")))?;
        if file.name_prefix.contains('/') {
            return Err(Error::Config(format!(
                "name_prefix '{}' must not contain '/'",
                file.name_prefix
            )));
        }
        if file.link_dest_count > MAX_LINK_DEST {
            return Err(Error::Config(format!(
                "link_dest_count {} exceeds rsync's limit of {MAX_LINK_DEST}",
                file.link_dest_count
            )));
        }
        if file.rsync.program.trim().is_empty() {
            return Err(Error::Config("rsync.program must not be empty".to_string()));
        }
        file.retention.validate()?;

        Ok(Self {
            naming: NamingScheme::new(file.name_prefix, format),
            link_dest_count: file.link_dest_count,
            retention: file.retention,
            rsync: file.rsync,
            lock_scope: file.lock_file.map_or(LockScope::PerSource, LockScope::Global),
            process_check: file.process_check,
            log_file: file.log_file,
            origin: None,
        })
    }

    #[must_use]
    pub const fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    #[must_use]
    pub fn date_format(&self) -> &DateFormat {
        self.naming.format()
    }

    #[must_use]
    pub const fn link_dest_count(&self) -> usize {
        self.link_dest_count
    }

    #[must_use]
    pub const fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    #[must_use]
    pub const fn lock_scope(&self) -> &LockScope {
        &self.lock_scope
    }

    #[must_use]
    pub const fn process_check(&self) -> bool {
        self.process_check
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// File this configuration was read from, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    #[must_use]
    pub fn rsync_executor(&self) -> RsyncExecutor {
        RsyncExecutor::new(self.rsync.program.clone(), self.rsync.flags.clone())
    }
}

/// `~/.causync/config.json`, if a home directory can be determined.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".causync").join("config.json"))
}
