// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.
//!
//! Platforms report start times at different precisions (`2026.02.05`,
//! `2026-02-05 08:30`, RFC 3339). Everything is normalized to a
//! [`Timestamp`] so the incremental filter can compare them.

use crate::error::TimestampParseError;
use crate::models::Timestamp;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Date+time layouts, tried in order after RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    // Filename-safe layout used by the local archive
    "%Y-%m-%dT%H-%M-%S",
    "%Y-%m-%dT%H-%M",
];

/// Date-only layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a platform start time into a [`Timestamp`].
///
/// RFC 3339 inputs keep their wall-clock time and drop the offset, which is
/// how the platforms display activity start times to the athlete.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, TimestampParseError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Timestamp::DateTime(dt.naive_local()));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Timestamp::DateTime(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(Timestamp::Date(date));
        }
    }

    Err(TimestampParseError {
        raw: raw.to_string(),
    })
}
