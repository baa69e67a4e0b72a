// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity record model shared by every adapter and the sync engine.

use crate::error::TimestampParseError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Platform tag identifying where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// iGPSport cycling computer cloud
    Igpsport,
    /// Strava
    Strava,
    /// Local directory archive
    Archive,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Igpsport => "igpsport",
            Platform::Strava => "strava",
            Platform::Archive => "archive",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown platform name in configuration or a filename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "igpsport" => Ok(Platform::Igpsport),
            "strava" => Ok(Platform::Strava),
            "archive" => Ok(Platform::Archive),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Activity payload file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    #[default]
    Fit,
    Gpx,
    Tcx,
}

impl FileFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Fit => "fit",
            FileFormat::Gpx => "gpx",
            FileFormat::Tcx => "tcx",
        }
    }

    /// Detect the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "fit" => Some(FileFormat::Fit),
            "gpx" => Some(FileFormat::Gpx),
            "tcx" => Some(FileFormat::Tcx),
            _ => None,
        }
    }

    /// Detect the format of a file on disk from its name.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// A start time at the precision the platform reported it.
///
/// Date-only values compare as midnight of that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Timestamp {
    pub fn date(&self) -> NaiveDate {
        match self {
            Timestamp::Date(d) => *d,
            Timestamp::DateTime(dt) => dt.date(),
        }
    }

    /// The point in time used for ordering and full-precision comparisons.
    pub fn point(&self) -> NaiveDateTime {
        match self {
            Timestamp::Date(d) => d.and_time(NaiveTime::MIN),
            Timestamp::DateTime(dt) => *dt,
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, Timestamp::Date(_))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Timestamp::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::time_utils::parse_timestamp(s)
    }
}

/// One workout as listed by a platform. Never mutated after listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Platform-scoped identifier
    pub source_id: String,
    /// Start time exactly as the platform reported it
    pub start_time: String,
    /// Distance in meters
    pub distance_m: f64,
    /// Moving time in seconds (0 when unknown)
    pub duration_s: u64,
    /// Platform the record was listed from
    pub platform: Platform,
    /// Opaque handle the adapter uses to fetch the payload
    pub download_ref: String,
    /// Payload file format
    #[serde(default)]
    pub format: FileFormat,
}

impl ActivityRecord {
    /// Parse `start_time` into a comparable timestamp.
    pub fn parsed_start(&self) -> Result<Timestamp, TimestampParseError> {
        self.start_time.parse()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    /// Deterministic local filename: `{platform}_{start}_{id}.{ext}`.
    ///
    /// Neither the start time nor the id can contain `_` after
    /// sanitizing, so the name splits back into its three parts. Distinct
    /// ids always give distinct names.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.platform,
            sanitize_component(&self.start_time.replace(' ', "T")),
            id_component(&self.source_id),
            self.format.extension()
        )
    }
}

/// Filename-safe form of a source id.
///
/// Ids that survive sanitizing unchanged are used as is. Any other id gets
/// `+` and a digest of the raw id appended; `+` never survives sanitizing,
/// so the two forms cannot collide.
fn id_component(raw: &str) -> String {
    let cleaned = sanitize_component(raw);
    if cleaned == raw {
        return cleaned;
    }
    let digest = Sha256::digest(raw.as_bytes());
    format!("{}+{}", cleaned, hex::encode(&digest[..6]))
}

/// Replace everything outside `[A-Za-z0-9.-]` with `-`.
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}
