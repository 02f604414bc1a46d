//! Common types and utilities shared across models.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way every table stores it.
///
/// Fixed nanosecond precision with a `Z` suffix keeps lexical order equal to
/// chronological order, which the listing relies on for `ORDER BY`.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp back into UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
