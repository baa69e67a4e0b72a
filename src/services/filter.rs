// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental filter: which source activities are newer than the watermark.

use crate::models::{ActivityRecord, Platform, Timestamp, Watermark};
use std::collections::HashSet;

/// Output of [`filter_incremental`].
#[derive(Debug, Clone, Default)]
pub struct IncrementalSet {
    /// Records to transfer, newest first; unparsable ones last
    pub activities: Vec<ActivityRecord>,
    /// Source ids kept only because their start time could not be parsed
    pub unparsed: Vec<String>,
    /// Repeated `(platform, source_id)` entries dropped from the input
    pub duplicates: usize,
}

impl IncrementalSet {
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

/// Strict-greater comparison at the watermark's granularity.
///
/// A date-only watermark compares calendar dates; a full watermark compares
/// points in time, with date-only records at midnight. Equal is not newer.
pub fn is_newer(time: &Timestamp, watermark: &Timestamp) -> bool {
    match watermark {
        Timestamp::Date(date) => time.date() > *date,
        Timestamp::DateTime(point) => time.point() > *point,
    }
}

/// Select the source records to transfer.
///
/// With no watermark every record is kept. Records with an unparsable start
/// time are always kept: transferring a duplicate is harmless, losing an
/// activity is not.
pub fn filter_incremental(
    source: &[ActivityRecord],
    watermark: Option<&Watermark>,
) -> IncrementalSet {
    let mut seen: HashSet<(Platform, &str)> = HashSet::with_capacity(source.len());
    let mut dated = Vec::new();
    let mut undated = Vec::new();
    let mut unparsed = Vec::new();
    let mut duplicates = 0;

    for record in source {
        if !seen.insert((record.platform, record.source_id.as_str())) {
            duplicates += 1;
            continue;
        }

        match record.parsed_start() {
            Ok(time) => {
                if watermark.is_some_and(|w| !is_newer(&time, &w.time)) {
                    continue;
                }
                dated.push((time.point(), record));
            }
            Err(e) => {
                tracing::warn!(
                    source_id = %record.source_id,
                    error = %e,
                    "Including activity with unparsable start time"
                );
                unparsed.push(record.source_id.clone());
                undated.push(record);
            }
        }
    }

    // Stable, so equal points keep source order
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let activities = dated
        .into_iter()
        .map(|(_, r)| r)
        .chain(undated)
        .cloned()
        .collect();

    IncrementalSet {
        activities,
        unparsed,
        duplicates,
    }
}
