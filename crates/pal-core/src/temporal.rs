//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds.
//!
//! ## Security Invariant
//!
//! The fingerprint hashes the ISO-8601 rendering of manufacturing and expiry
//! instants. A local offset or a stray sub-second component would change the
//! rendering and therefore the digest, so both are eliminated at construction:
//! every `Timestamp` renders as `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! [`Timestamp::parse()`] rejects non-`Z` inputs; [`Timestamp::parse_lenient()`]
//! converts offsets for ingesting external data.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// Serializes as the `Z`-suffixed ISO-8601 string and deserializes through
/// [`Timestamp::parse`], so stored renderings are never re-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    ///
    /// Prefer a [`crate::Clock`] in code that needs to be testable.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string with a `Z` suffix.
    ///
    /// Explicit offsets, including `+00:00`, are rejected so that a stored
    /// rendering always round-trips to the same bytes.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::Malformed {
                field: "timestamp",
                reason: format!("must use Z suffix (UTC only), got {s:?}"),
            });
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::Malformed {
            field: "timestamp",
            reason: format!("invalid RFC 3339 timestamp {s:?}: {e}"),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        let dt = DateTime::from_timestamp(secs, 0).ok_or_else(|| ValidationError::Malformed {
            field: "timestamp",
            reason: format!("invalid Unix timestamp: {secs}"),
        })?;
        Ok(Self(dt))
    }

    /// Add a whole number of days.
    ///
    /// Returns `None` if the result leaves chrono's representable range.
    pub fn checked_add_days(&self, days: u32) -> Option<Self> {
        self.0
            .checked_add_signed(Duration::days(i64::from(days)))
            .map(Self)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO-8601 with Z suffix (e.g. `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
