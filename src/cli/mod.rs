//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// rsync snapshot backups with grandfather-father-son retention
#[derive(Parser, Debug)]
#[command(name = "causync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.causync/config.json)
    #[arg(long, global = true, env = "CAUSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON (results on stdout, errors on stderr)
    #[arg(long, global = true)]
    pub json: bool,

    /// Pass --dry-run to rsync and delete nothing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Use this timestamp as the current time, written in the configured date format
    #[arg(long, global = true, value_name = "TIMESTAMP")]
    pub now: Option<String>,

    /// Also append logs to this file (overrides `log_file` in the config)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Don't log to the console (the log file, if any, still receives logs)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report whether a run is active for a source
    Check(Target),

    /// Take a new snapshot of a source
    Sync(SyncArgs),

    /// Delete snapshots that no retention tier keeps
    Cleanup(Target),

    /// List snapshots with their retention status
    List {
        /// Destination root directory
        destination: PathBuf,

        /// Subdirectory of the destination holding the snapshots
        #[arg(long)]
        bucket: Option<String>,
    },

    /// Remove a lock marker left behind by a crashed run
    Unlock {
        /// Source directory whose marker should be cleared
        source: PathBuf,

        /// Remove the marker even if its recorded process is alive
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// A source and the destination its snapshots go to.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Source directory
    pub source: PathBuf,

    /// Destination root directory
    pub destination: PathBuf,

    /// Subdirectory of the destination holding the snapshots
    #[arg(long)]
    pub bucket: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: Target,

    /// Exclude files matching PATTERN (repeatable, passed to rsync)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Read exclude patterns from FILE, one per line
    #[arg(long, value_name = "FILE")]
    pub exclude_from: Option<PathBuf>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
