use std::ffi::OsString;
use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::{TransferExecutor, TransferReport, TransferRequest};
use crate::error::{Error, Result};

pub const DEFAULT_RSYNC_PROGRAM: &str = "rsync";

pub const DEFAULT_RSYNC_FLAGS: &[&str] = &[
    "--archive",
    "--one-file-system",
    "--hard-links",
    "--human-readable",
    "--inplace",
    "--numeric-ids",
    "--stats",
];

/// Runs transfers through an external rsync binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncExecutor {
    program: String,
    flags: Vec<String>,
}

impl Default for RsyncExecutor {
    fn default() -> Self {
        Self::new(
            DEFAULT_RSYNC_PROGRAM,
            DEFAULT_RSYNC_FLAGS.iter().map(ToString::to_string).collect(),
        )
    }
}

impl RsyncExecutor {
    #[must_use]
    pub fn new(program: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            program: program.into(),
            flags,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list (without the program) for `request`.
    ///
    /// `<flags> [--dry-run] [--link-dest=<base>]... [--exclude=<pattern>]...
    /// <sources>... <destination>`
    #[must_use]
    pub fn command_args(&self, request: &TransferRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        if request.dry_run {
            args.push("--dry-run".into());
        }
        for base in &request.link_dest {
            let mut arg = OsString::from("--link-dest=");
            arg.push(base);
            args.push(arg);
        }
        for pattern in &request.excludes {
            args.push(format!("--exclude={pattern}").into());
        }
        args.extend(request.sources.iter().map(OsString::from));
        args.push(request.destination.clone().into_os_string());
        args
    }
}

impl TransferExecutor for RsyncExecutor {
    fn transfer(
        &self,
        request: &TransferRequest,
    ) -> impl Future<Output = Result<TransferReport>> + Send {
        let program = self.program.clone();
        let args = self.command_args(request);
        let destination = request.destination.clone();
        let link_dest = request.link_dest.len();
        let dry_run = request.dry_run;

        async move {
            info!(
                program = %program,
                destination = %destination.display(),
                link_dest,
                dry_run,
                "Starting transfer"
            );
            debug!(?args, "Transfer command");

            let output = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| Error::environment(format!("Failed to run '{program}'"), e))?;

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            if !output.status.success() {
                return Err(Error::Transfer {
                    status: output.status.code(),
                    stderr,
                });
            }

            debug!(stats = %stdout.trim(), "Transfer output");
            info!(destination = %destination.display(), "Transfer finished");
            Ok(TransferReport { stdout, stderr })
        }
    }
}
