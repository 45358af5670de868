//! Where snapshots live: `<root>[/<bucket>]/<prefix><ENCODED_INSTANT>`.

use std::path::{Path, PathBuf};

use super::catalog::Catalog;
use super::instant::Instant;
use super::naming::NamingScheme;
use crate::error::{Error, Result};

/// Maps instants to snapshot directories under one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
    root: PathBuf,
    bucket: Option<String>,
    naming: NamingScheme,
}

impl SnapshotLayout {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `bucket` is not a single plain
    /// path component.
    pub fn new(root: PathBuf, bucket: Option<String>, naming: NamingScheme) -> Result<Self> {
        if let Some(bucket) = &bucket {
            if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains('/') {
                return Err(Error::InvalidArgument(format!(
                    "bucket '{bucket}' must be a single directory name"
                )));
            }
        }
        Ok(Self {
            root,
            bucket,
            naming,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    /// Directory holding the snapshots.
    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        match &self.bucket {
            Some(bucket) => self.root.join(bucket),
            None => self.root.clone(),
        }
    }

    #[must_use]
    pub fn snapshot_path(&self, instant: &Instant) -> PathBuf {
        self.snapshot_dir().join(self.naming.name_for(instant))
    }

    /// Current catalog of this layout's snapshot directory.
    ///
    /// # Errors
    ///
    /// See [`Catalog::scan`].
    pub fn scan(&self) -> Result<Catalog> {
        Catalog::scan(&self.snapshot_dir(), &self.naming)
    }
}
