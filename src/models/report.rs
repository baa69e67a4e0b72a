// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync frontier and end-of-run report.

use super::{Platform, Timestamp};
use serde::Serialize;

/// Most recent activity time known to exist at a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Watermark {
    /// Destination that produced the timestamp
    pub platform: Platform,
    pub time: Timestamp,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every incremental item was downloaded and uploaded
    Completed,
    /// At least one item failed to download or upload
    Partial,
    /// Nothing newer than the watermark
    NoOp,
    /// Dry run computed a non-empty incremental set
    Previewed,
    /// Aborted before filtering
    Failed,
}

impl SyncStatus {
    /// Derive the status of a run that reached filtering.
    pub fn derive(dry_run: bool, incremental: usize, downloaded: usize, uploaded: usize) -> Self {
        if incremental == 0 {
            SyncStatus::NoOp
        } else if dry_run {
            SyncStatus::Previewed
        } else if uploaded == downloaded && downloaded == incremental {
            SyncStatus::Completed
        } else {
            SyncStatus::Partial
        }
    }
}

/// Per-activity row in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub source_id: String,
    pub start_time: String,
    pub distance_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    pub downloaded: bool,
    pub uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a sync run. Always produced, even for failed runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub dry_run: bool,
    pub source_total: usize,
    pub watermark: Option<Watermark>,
    pub incremental_count: usize,
    pub downloaded_count: usize,
    pub uploaded_count: usize,
    /// Why the run failed (only for `failed`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Source ids whose start time could not be parsed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unparsed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_downloads: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_uploads: Vec<String>,
    pub items: Vec<ItemOutcome>,
    /// When the report was produced (RFC 3339)
    pub finished_at: String,
}

impl SyncReport {
    /// Report for a run that aborted before filtering.
    pub fn failed(dry_run: bool, reason: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed,
            dry_run,
            source_total: 0,
            watermark: None,
            incremental_count: 0,
            downloaded_count: 0,
            uploaded_count: 0,
            failure: Some(reason.into()),
            unparsed: Vec::new(),
            failed_downloads: Vec::new(),
            failed_uploads: Vec::new(),
            items: Vec::new(),
            finished_at: crate::time_utils::format_utc_rfc3339(chrono::Utc::now()),
        }
    }

    /// Check `uploaded <= downloaded <= incremental <= source_total`.
    pub fn counts_are_consistent(&self) -> bool {
        self.uploaded_count <= self.downloaded_count
            && self.downloaded_count <= self.incremental_count
            && self.incremental_count <= self.source_total
    }
}
