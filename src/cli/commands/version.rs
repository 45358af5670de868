//! Version command implementation.

use std::path::PathBuf;

use crate::config::default_config_path;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    build: &'static str,
    default_config: Option<PathBuf>,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        default_config: default_config_path(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("causync {} ({})", output.version, output.build);
    if let Some(path) = &output.default_config {
        println!("config: {}", path.display());
    }
    Ok(())
}
