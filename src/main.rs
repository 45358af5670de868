//! causync CLI entry point.

use causync::cli::commands::{self, RunContext};
use causync::cli::{Cli, Commands};
use causync::config::Config;
use causync::error::{Error, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};

/// Run start/finish records. Kept off the console, which gets the
/// human-readable error instead.
const OUTCOME_TARGET: &str = "causync::outcome";

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(()) => {
            info!(target: OUTCOME_TARGET, "causync finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                target: OUTCOME_TARGET,
                code = e.error_code().as_str(),
                "causync failed: {e}"
            );
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Console logging on stderr plus an optional log file.
///
/// `RUST_LOG` overrides the verbosity flag for both. The log file records at
/// least `info` so cron runs leave a trace, and `--quiet` only silences the
/// console.
fn init_tracing(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = |floor: u8| {
        rust_log
            .clone()
            .unwrap_or_else(|| level(verbose.max(floor)).to_string())
    };

    let console = (!quiet).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_filter(EnvFilter::new(format!("{},{OUTCOME_TARGET}=off", directives(0))))
    });

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::environment(format!("Failed to open log file {}", path.display()), e)
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new(directives(1))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Completions { shell } => return commands::completions::execute(shell),
        Commands::Version => {
            init_tracing(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
            return commands::version::execute(cli.json);
        }
        _ => {}
    }

    // The log file may come from the config, so load it before logging
    // starts and report a broken config afterwards.
    let config = Config::load(cli.config.as_deref());
    let log_file: Option<PathBuf> = cli.log_file.clone().or_else(|| {
        config
            .as_ref()
            .ok()
            .and_then(|c| c.log_file().map(Path::to_path_buf))
    });
    init_tracing(cli.verbose, cli.quiet, log_file.as_deref())?;
    info!(
        target: OUTCOME_TARGET,
        pid = std::process::id(),
        command = ?cli.command,
        "causync started"
    );

    let ctx = RunContext::new(cli, config?)?;

    match &cli.command {
        Commands::Check(target) => commands::check::execute(target, &ctx),
        Commands::Sync(args) => commands::sync::execute(args, &ctx),
        Commands::Cleanup(target) => commands::cleanup::execute(target, &ctx),
        Commands::List { destination, bucket } => {
            commands::list::execute(destination, bucket.as_deref(), &ctx)
        }
        Commands::Unlock { source, force } => commands::unlock::execute(source, *force, &ctx),
        Commands::Completions { .. } | Commands::Version => Ok(()),
    }
}
