//! Snapshot timestamps and the date format that names them on disk.
//!
//! Every snapshot directory name embeds one `Instant` rendered with a single
//! process-wide [`DateFormat`]. Decoding is strict: a string that does not
//! match the format is a [`Error::Parse`], never a silent skip.

use std::fmt;

use chrono::format::{Fixed, Item, Pad, ParseErrorKind, StrftimeItems};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default on-disk format: one snapshot per day.
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

/// A calendar timestamp decoded from a snapshot directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instant(NaiveDateTime);

impl Instant {
    /// Midnight of the given calendar date, or `None` if the date is invalid.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|d| Self(d.and_time(NaiveTime::default())))
    }

    /// A full timestamp, or `None` if any component is out of range.
    #[must_use]
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(h, m, s)
            .map(Self)
    }

    /// Wall-clock time in the local timezone.
    ///
    /// Only the CLI calls this; planning code always takes `now` explicitly.
    #[must_use]
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    #[must_use]
    pub const fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Subtract a number of whole days, or `None` on calendar overflow.
    #[must_use]
    pub fn checked_sub_days(&self, days: i64) -> Option<Self> {
        TimeDelta::try_days(days)
            .and_then(|delta| self.0.checked_sub_signed(delta))
            .map(Self)
    }
}

impl From<NaiveDateTime> for Instant {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl From<NaiveDate> for Instant {
    fn from(value: NaiveDate) -> Self {
        Self(value.and_time(NaiveTime::default()))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Character class every encoded name starts with, derived from the first
/// item of a [`DateFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leading {
    Digit,
    /// Space-padded numeric field (`%e`, `%k`, `%l`).
    DigitOrSpace,
    /// Month or weekday name, AM/PM marker.
    Alphabetic,
    Literal(char),
    /// No usable constraint; only decoding can tell.
    Any,
}

impl Leading {
    #[must_use]
    pub fn admits(self, c: char) -> bool {
        match self {
            Self::Digit => c.is_ascii_digit(),
            Self::DigitOrSpace => c.is_ascii_digit() || c == ' ',
            Self::Alphabetic => c.is_alphabetic(),
            Self::Literal(expected) => c == expected,
            Self::Any => true,
        }
    }
}

/// A validated strftime-style pattern used to encode and decode snapshot names.
///
/// The pattern must stay stable for the lifetime of a destination tree:
/// changing it orphans every snapshot written under the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
}

impl DateFormat {
    /// Validate `pattern` and build a format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the pattern contains unknown
    /// specifiers, or cannot round-trip a calendar date.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let label = pattern.clone();
        let invalid = |reason: &str| Error::InvalidFormat {
            format: label.clone(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(invalid("unknown or malformed specifier"));
        }

        let format = Self { pattern };
        let reference = Instant::from_ymd_hms(2001, 2, 3, 4, 5, 6)
            .ok_or_else(|| invalid("reference timestamp out of range"))?;
        let encoded = format.encode(&reference);
        let decoded = format
            .decode(&encoded)
            .map_err(|_| invalid("pattern does not identify a calendar date"))?;
        if decoded.date() != reference.date() {
            return Err(invalid("pattern loses part of the calendar date"));
        }

        Ok(format)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Render an instant as a directory name component.
    #[must_use]
    pub fn encode(&self, instant: &Instant) -> String {
        instant.0.format(&self.pattern).to_string()
    }

    /// Parse a directory name component back into an instant.
    ///
    /// Patterns without time-of-day fields decode to midnight. The name must
    /// be in canonical form, i.e. re-encoding the result reproduces it
    /// (`2018041` is rejected even though chrono would read it as April 1st).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if `name` does not match the pattern exactly.
    pub fn decode(&self, name: &str) -> Result<Instant> {
        let instant = match NaiveDateTime::parse_from_str(name, &self.pattern) {
            Ok(dt) => Instant(dt),
            Err(e) if e.kind() == ParseErrorKind::NotEnough => {
                NaiveDate::parse_from_str(name, &self.pattern)
                    .map(Instant::from)
                    .map_err(|e| self.parse_error(name, &e.to_string()))?
            }
            Err(e) => return Err(self.parse_error(name, &e.to_string())),
        };

        if self.encode(&instant) != name {
            return Err(self.parse_error(name, "not in canonical form"));
        }
        Ok(instant)
    }

    /// Reduce an instant to the resolution this format can represent.
    ///
    /// # Errors
    ///
    /// Only fails if the encoded form cannot be decoded, which a validated
    /// format never produces for in-range instants.
    pub fn truncate(&self, instant: &Instant) -> Result<Instant> {
        self.decode(&self.encode(instant))
    }

    /// What the first character of any encoded name looks like.
    #[must_use]
    pub fn leading(&self) -> Leading {
        match StrftimeItems::new(&self.pattern).next() {
            Some(Item::Literal(text) | Item::Space(text)) => {
                text.chars().next().map_or(Leading::Any, Leading::Literal)
            }
            Some(Item::Numeric(_, Pad::Space)) => Leading::DigitOrSpace,
            Some(Item::Numeric(..)) => Leading::Digit,
            Some(Item::Fixed(
                Fixed::ShortMonthName
                | Fixed::LongMonthName
                | Fixed::ShortWeekdayName
                | Fixed::LongWeekdayName
                | Fixed::LowerAmPm
                | Fixed::UpperAmPm,
            )) => Leading::Alphabetic,
            _ => Leading::Any,
        }
    }

    fn parse_error(&self, name: &str, reason: &str) -> Error {
        Error::Parse {
            name: name.to_string(),
            format: self.pattern.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
