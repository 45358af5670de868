//! The set of snapshots currently present in a destination.
//!
//! A catalog is rebuilt from the filesystem on every call; the directory
//! listing is the only source of truth.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use super::instant::{DateFormat, Instant};
use super::naming::{NameMatch, NamingScheme};
use crate::error::{Error, Result};

/// Instants of the snapshots in one destination, in no particular order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<Instant>,
}

impl Catalog {
    /// Decode every name with `format`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on the first name that does not decode;
    /// no partial catalog is produced.
    pub fn build<I, S>(names: I, format: &DateFormat) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = names
            .into_iter()
            .map(|name| format.decode(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Decode the names that follow `scheme`, ignoring foreign entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a snapshot-looking name does not decode.
    pub fn from_names<I, S>(names: I, scheme: &NamingScheme) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for name in names {
            if let NameMatch::Snapshot(instant) = scheme.classify(name.as_ref())? {
                entries.push(instant);
            }
        }
        Ok(Self { entries })
    }

    /// List the subdirectories of `dir` and build a catalog from their names.
    ///
    /// A missing `dir` yields an empty catalog (first run).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if the directory cannot be listed and
    /// [`Error::Parse`] for malformed snapshot names.
    pub fn scan(dir: &Path, scheme: &NamingScheme) -> Result<Self> {
        let listing_error =
            |e| Error::environment(format!("Failed to list {}", dir.display()), e);

        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Destination does not exist yet, catalog is empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(listing_error(e)),
        };

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(listing_error)?;
            let is_dir = entry.file_type().map_err(listing_error)?.is_dir();
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir {
                names.push(name);
            } else {
                trace!(name, "Skipping non-directory entry");
            }
        }

        let catalog = Self::from_names(&names, scheme)?;
        debug!(
            dir = %dir.display(),
            entries = names.len(),
            snapshots = catalog.len(),
            "Scanned destination"
        );
        Ok(catalog)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instant> {
        self.entries.iter()
    }

    #[must_use]
    pub fn contains(&self, instant: &Instant) -> bool {
        self.entries.contains(instant)
    }

    /// All entries, most recent first.
    #[must_use]
    pub fn sorted_desc(&self) -> Vec<Instant> {
        let mut sorted = self.entries.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted
    }
}

impl FromIterator<Instant> for Catalog {
    fn from_iter<T: IntoIterator<Item = Instant>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
