// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync frontier resolution.
//!
//! Destinations are asked in priority order for their most recent activity
//! time. The first one that logs in and answers wins. Everything else is
//! logged and skipped; running out of candidates means a full sync.

use super::Destination;
use crate::adapters::{with_timeout, LatestActivity};
use crate::models::Watermark;
use std::time::Duration;

/// Resolves the watermark across destination candidates.
pub struct WatermarkResolver {
    timeout: Duration,
}

impl WatermarkResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Try each candidate in order. `None` means "no discoverable history".
    pub async fn resolve(&self, candidates: &mut [Destination]) -> Option<Watermark> {
        for candidate in candidates.iter_mut() {
            let platform = candidate.platform();
            let settings = candidate.settings();

            if !settings.enabled || !settings.watermark_lookup {
                tracing::debug!(%platform, "Watermark candidate disabled, skipping");
                continue;
            }
            if settings.credentials.is_none() {
                tracing::debug!(%platform, "Watermark candidate has no credentials, skipping");
                continue;
            }

            if let Err(e) = candidate.ensure_session(self.timeout).await {
                tracing::warn!(%platform, error = %e, "Watermark candidate login failed");
                continue;
            }

            match with_timeout(self.timeout, candidate.adapter().get_latest_activity_time()).await
            {
                Ok(LatestActivity::Found(time)) => {
                    tracing::info!(%platform, latest = %time, "Watermark resolved");
                    return Some(Watermark { platform, time });
                }
                Ok(LatestActivity::NoHistory) => {
                    tracing::warn!(%platform, "Destination has no activities");
                }
                Ok(LatestActivity::Unsupported) => {
                    tracing::warn!(%platform, "Destination cannot report its latest activity");
                }
                Err(e) => {
                    tracing::warn!(%platform, error = %e, "Latest activity lookup failed");
                }
            }
        }

        tracing::warn!("No watermark available, every source activity will be transferred");
        None
    }
}
