//! Command implementations.

pub mod check;
pub mod cleanup;
pub mod completions;
pub mod list;
pub mod sync;
pub mod unlock;
pub mod version;

use serde::Serialize;
use tokio::runtime::Runtime;

use crate::backup::Instant;
use crate::cli::Cli;
use crate::config::Config;
use crate::error::{Error, Result};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Config,
    pub now: Instant,
    pub json: bool,
    pub dry_run: bool,
}

impl RunContext {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `--now` does not match the
    /// configured date format.
    pub fn new(cli: &Cli, config: Config) -> Result<Self> {
        let now = match &cli.now {
            Some(raw) => config.date_format().decode(raw).map_err(|e| {
                Error::InvalidArgument(format!("--now: {e}"))
            })?,
            None => Instant::now(),
        };
        Ok(Self {
            config,
            now,
            json: cli.json,
            dry_run: cli.dry_run,
        })
    }
}

fn runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| Error::environment("Failed to create async runtime", e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
