//! Textual path helpers for sources, destinations and lock markers.
//!
//! These work on the string form of a path so that `/tmp//src/`,
//! `/tmp/src/.` and `/tmp/src` resolve to the same lock marker. `.` and `..`
//! are collapsed lexically, without following symlinks. Paths beginning
//! with `//` are rejected: POSIX leaves their meaning implementation-defined.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn invalid(path: &str, reason: &str) -> Error {
    Error::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a path into its components with `.` and `..` resolved.
///
/// `..` at the root stays at the root; leading `..` of a relative path is
/// kept.
fn components(path: &str) -> Result<(bool, Vec<&str>)> {
    if path.is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    if path.starts_with("//") {
        return Err(invalid(path, "too many leading slashes"));
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push(part);
                }
            }
            _ => parts.push(part),
        }
    }
    Ok((absolute, parts))
}

fn join(absolute: bool, parts: &[&str]) -> String {
    match (absolute, parts.is_empty()) {
        (true, _) => format!("/{}", parts.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => parts.join("/"),
    }
}

/// Path with repeated and trailing slashes, `.` and `..` collapsed.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for empty paths and paths starting with `//`.
pub fn normalize(path: &str) -> Result<String> {
    let (absolute, parts) = components(path)?;
    Ok(join(absolute, &parts))
}

/// Directory containing `path`. The parent of `/` is `/`.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for empty paths and paths starting with `//`.
pub fn parent_dir(path: &str) -> Result<String> {
    let (absolute, parts) = components(path)?;
    let keep = parts.len().saturating_sub(1);
    Ok(join(absolute, &parts[..keep]))
}

/// Final component of `path`.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if the path has no final component (`/`).
pub fn basename(path: &str) -> Result<String> {
    let (_, parts) = components(path)?;
    parts
        .last()
        .map(|part| (*part).to_string())
        .ok_or_else(|| invalid(path, "path has no final component"))
}

/// Absolute form of `path`, joined onto the working directory if relative.
///
/// The path does not need to exist.
///
/// # Errors
///
/// Returns [`Error::Environment`] if the working directory is unavailable.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::environment("Failed to resolve the working directory", e))?;
    Ok(cwd.join(path))
}

/// Absolute, normalized form of a user-supplied path.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for non-UTF-8 paths and paths starting
/// with `//`, and [`Error::Environment`] if the working directory is
/// unavailable.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = absolutize(path)?;
    Ok(PathBuf::from(normalize(as_str(&absolute)?)?))
}

/// UTF-8 view of a path, required for everything that ends up in a marker
/// or an rsync argument.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for non-UTF-8 paths.
pub fn as_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| invalid(&path.to_string_lossy(), "path is not valid UTF-8"))
}

/// Per-source lock marker: `<parent>/<basename>.lock`, next to the source.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if `source` is `/` or otherwise has no
/// final component.
pub fn source_marker(source: &Path) -> Result<PathBuf> {
    let source = absolutize(source)?;
    let text = as_str(&source)?;
    let parent = parent_dir(text)?;
    let name = basename(text)?;
    Ok(PathBuf::from(parent).join(format!("{name}.lock")))
}
