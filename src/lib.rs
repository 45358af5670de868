//! causync - rsync snapshot backups with grandfather-father-son retention
//!
//! This crate provides the core functionality for the `causync` CLI tool.
//!
//! # Architecture
//!
//! - [`backup`] - Snapshot naming, catalog, link-dest chain and retention planning
//! - [`guard`] - Single-instance run guard (lock marker + process probe)
//! - [`executor`] - rsync transfers and snapshot deletion behind traits
//! - [`orchestrator`] - Guarded sync/cleanup/list runs with interruption handling
//! - [`paths`] - Path normalization and lock marker placement
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod orchestrator;
pub mod paths;

pub use error::{Error, Result};
