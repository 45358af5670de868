//! Snapshot directory naming convention: `<prefix><ENCODED_INSTANT>`.

use tracing::debug;

use super::instant::{DateFormat, Instant};
use crate::error::Result;

/// How snapshot directories are named inside a destination root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamingScheme {
    prefix: String,
    format: DateFormat,
}

/// Outcome of matching one directory entry against the convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// A well-formed snapshot name.
    Snapshot(Instant),
    /// Not a snapshot at all (`lost+found`, a stray file, another prefix).
    Foreign,
}

impl NamingScheme {
    #[must_use]
    pub fn new(prefix: impl Into<String>, format: DateFormat) -> Self {
        Self {
            prefix: prefix.into(),
            format,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn format(&self) -> &DateFormat {
        &self.format
    }

    /// Directory name for a snapshot taken at `instant`.
    #[must_use]
    pub fn name_for(&self, instant: &Instant) -> String {
        format!("{}{}", self.prefix, self.format.encode(instant))
    }

    /// Classify a directory entry name.
    ///
    /// Entries without the prefix, or whose remainder does not begin with the
    /// character class of the format's first field (digit, letter or
    /// literal), are [`NameMatch::Foreign`]. Entries that
    /// pass that check must decode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] for names that look like snapshots
    /// but do not decode with the configured format.
    pub fn classify(&self, name: &str) -> Result<NameMatch> {
        let Some(encoded) = name.strip_prefix(self.prefix.as_str()) else {
            debug!(name, prefix = %self.prefix, "Ignoring entry without snapshot prefix");
            return Ok(NameMatch::Foreign);
        };

        if !self.looks_encoded(encoded) {
            debug!(name, "Ignoring entry outside the naming convention");
            return Ok(NameMatch::Foreign);
        }

        self.format.decode(encoded).map(NameMatch::Snapshot)
    }

    fn looks_encoded(&self, candidate: &str) -> bool {
        candidate
            .chars()
            .next()
            .is_some_and(|first| self.format.leading().admits(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::backup::Catalog;

    #[test]
    fn test_name_for_with_prefix() {
        let scheme = NamingScheme::new("causync_", DateFormat::new("%y%m%d_%H%M%S").unwrap());
        let instant = Instant::from_ymd_hms(2018, 4, 11, 20, 20, 48).unwrap();
        assert_eq!(scheme.name_for(&instant), "causync_180411_202048");
        assert_eq!(
            scheme.classify("causync_180411_202048").unwrap(),
            NameMatch::Snapshot(instant)
        );
    }

    #[test]
    fn test_foreign_entries_are_ignored() {
        let scheme = NamingScheme::default();
        for name in ["lost+found", ".causync.lock", "README", "daily", ""] {
            assert_eq!(scheme.classify(name).unwrap(), NameMatch::Foreign, "{name}");
        }

        let prefixed = NamingScheme::new("home_", DateFormat::default());
        assert_eq!(prefixed.classify("20180411").unwrap(), NameMatch::Foreign);
        assert_eq!(prefixed.classify("etc_20180411").unwrap(), NameMatch::Foreign);
    }

    #[test]
    fn test_malformed_snapshot_names_fail() {
        let scheme = NamingScheme::default();
        for name in ["2018-04-11", "20181301", "2018041", "20180411.partial"] {
            assert!(
                matches!(scheme.classify(name), Err(Error::Parse { .. })),
                "{name} should be a parse error"
            );
        }
    }

    #[test]
    fn test_month_name_format_keeps_own_snapshots() {
        let scheme = NamingScheme::new("", DateFormat::new("%b%d%Y").unwrap());
        let new_year = Instant::from_ymd(2018, 1, 1).unwrap();
        assert_eq!(scheme.name_for(&new_year), "Jan012018");
        assert_eq!(scheme.classify("Jan012018").unwrap(), NameMatch::Snapshot(new_year));

        let catalog = Catalog::from_names(["Jan012018", "Feb012018", "20180411"], &scheme).unwrap();
        assert_eq!(catalog.len(), 2);

        // Letters now look like snapshots, so stray words must decode.
        assert!(matches!(scheme.classify("lost+found"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_literal_leading_format() {
        let scheme = NamingScheme::new("", DateFormat::new("v%Y%m%d").unwrap());
        assert!(matches!(scheme.classify("v20180411").unwrap(), NameMatch::Snapshot(_)));
        assert_eq!(scheme.classify("20180411").unwrap(), NameMatch::Foreign);
        assert!(scheme.classify("v2018").is_err());
    }
}
