// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for adapters and sync runs.
//!
//! Adapter errors are item-scoped unless they happen while authenticating or
//! listing the source; only those become a [`SyncError`] and end the run.

use crate::models::Platform;
use std::time::Duration;

/// Error returned by a platform adapter call.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Message used when a platform answers with HTTP 429.
    pub const RATE_LIMIT: &'static str = "Rate limit exceeded (429)";

    /// Message used when a platform rejects our session token.
    pub const TOKEN_REJECTED: &'static str = "Session token rejected (401)";

    /// Check whether the platform throttled us.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AdapterError::Http(msg) if msg == Self::RATE_LIMIT)
    }

    /// Check whether the error means our credentials or session are bad.
    pub fn is_auth_error(&self) -> bool {
        match self {
            AdapterError::Auth(_) => true,
            AdapterError::Http(msg) => msg == Self::TOKEN_REJECTED,
            _ => false,
        }
    }
}

/// A start time that matches none of the known layouts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unparsable timestamp: {raw:?}")]
pub struct TimestampParseError {
    pub raw: String,
}

/// Run-level failure. Only these abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication with {platform} failed: {source}")]
    Authentication {
        platform: Platform,
        source: AdapterError,
    },

    #[error("Listing {platform} activities failed: {source}")]
    Listing {
        platform: Platform,
        source: AdapterError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for adapter calls
pub type Result<T> = std::result::Result<T, AdapterError>;
