//! Error types for causync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=parse, 3=already running, 5=environment, ...)
//! - Context-aware recovery hints
//! - Structured JSON output for cron wrappers and other non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for causync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Wrappers match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Parse (exit 2)
    ParseError,

    // Guard (exit 3)
    AlreadyRunning,

    // Validation (exit 4)
    InvalidArgument,
    InvalidPath,

    // Environment (exit 5)
    EnvironmentError,

    // Transfer (exit 6)
    TransferFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Interrupted (exit 130)
    Interrupted,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidPath => "INVALID_PATH",
            Self::EnvironmentError => "ENVIRONMENT_ERROR",
            Self::TransferFailed => "TRANSFER_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::Interrupted => "INTERRUPTED",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ParseError => 2,
            Self::AlreadyRunning => 3,
            Self::InvalidArgument | Self::InvalidPath => 4,
            Self::EnvironmentError => 5,
            Self::TransferFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::Interrupted => 130,
        }
    }

    /// Whether running the same command again later can succeed unchanged.
    ///
    /// True only for `AlreadyRunning`: the other run will eventually finish
    /// and release its marker. Everything else needs operator attention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in causync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot parse '{name}' with date format '{format}': {reason}")]
    Parse {
        name: String,
        format: String,
        reason: String,
    },

    #[error("Invalid date format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("causync is already running for {key}")]
    AlreadyRunning {
        key: String,
        marker: Option<PathBuf>,
        holder: Option<u32>,
    },

    #[error("{context}: {source}")]
    Environment {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rsync failed ({}): {stderr}", .status.map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}")))]
    Transfer { status: Option<i32>, stderr: String },

    #[error("Interrupted by signal; run aborted")]
    Interrupted,

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an `Environment` error from an I/O failure and a short description.
    pub fn environment(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Environment {
            context: context.into(),
            source,
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::AlreadyRunning { .. } => ErrorCode::AlreadyRunning,
            Self::Environment { .. } => ErrorCode::EnvironmentError,
            Self::Transfer { .. } => ErrorCode::TransferFailed,
            Self::Interrupted => ErrorCode::Interrupted,
            Self::InvalidPath { .. } => ErrorCode::InvalidPath,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidFormat { .. } | Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for operators.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Parse { format, .. } => Some(format!(
                "The destination holds an entry that looks like a snapshot but does not \
                 match '{format}'. Nothing was deleted. Fix or move the entry, or check \
                 that `date_format` has not changed since the snapshots were written."
            )),

            Self::AlreadyRunning { marker, holder, .. } => {
                let mut hint = match holder {
                    Some(pid) => format!("Another run (PID {pid}) holds the lock."),
                    None => "Another run holds the lock.".to_string(),
                };
                if let Some(marker) = marker {
                    hint.push_str(&format!(
                        "\n  Marker: {}\n  If no run is active, clear it: causync unlock <source>",
                        marker.display()
                    ));
                }
                Some(hint)
            }

            Self::Environment { .. } => Some(
                "Check that the directory exists and is writable by this user.".to_string(),
            ),

            Self::Transfer { status: Some(127), .. } => {
                Some("rsync was not found. Install it or set `rsync.program` in the config.".to_string())
            }

            Self::InvalidFormat { .. } => Some(
                "Use chrono strftime specifiers, e.g. %Y%m%d or %y%m%d_%H%M%S.".to_string(),
            ),

            Self::Interrupted => Some(
                "The newest snapshot may be incomplete; the next sync will link against it."
                    .to_string(),
            ),

            Self::Transfer { .. }
            | Self::InvalidPath { .. }
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
