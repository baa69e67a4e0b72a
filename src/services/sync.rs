// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run controller.
//!
//! Drives one sync run through its states, always produces a
//! [`SyncReport`] and closes every adapter exactly once.

use super::filter::{filter_incremental, IncrementalSet};
use super::transfer::{DownloadOutcome, TransferPipeline, UploadOutcome};
use super::watermark::WatermarkResolver;
use super::Destination;
use crate::adapters::{with_timeout, PlatformAdapter};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::{ActivityRecord, ItemOutcome, SyncReport, SyncStatus, Watermark};
use std::collections::HashMap;

/// States of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticating,
    ListingSource,
    ResolvingWatermark,
    Filtering,
    DryRunReport,
    Downloading,
    Uploading,
    Reporting,
    Done,
    Failed,
}

/// One sync run from source to destinations.
pub struct SyncRun {
    config: SyncConfig,
    source: Box<dyn PlatformAdapter>,
    destinations: Vec<Destination>,
    pipeline: TransferPipeline,
    state: RunState,
    history: Vec<RunState>,
    torn_down: bool,
}

impl SyncRun {
    /// Pair each configured destination with the adapter for its platform.
    ///
    /// Fails with [`SyncError::Config`] if a configured destination has no
    /// adapter or the source adapter is for the wrong platform.
    pub fn new(
        config: SyncConfig,
        source: Box<dyn PlatformAdapter>,
        adapters: Vec<Box<dyn PlatformAdapter>>,
    ) -> Result<Self, SyncError> {
        if source.platform() != config.source.platform {
            return Err(SyncError::Config(format!(
                "source adapter is {}, configuration expects {}",
                source.platform(),
                config.source.platform
            )));
        }

        let mut adapters: Vec<Option<Box<dyn PlatformAdapter>>> =
            adapters.into_iter().map(Some).collect();
        let mut destinations = Vec::with_capacity(config.destinations.len());

        for settings in &config.destinations {
            let adapter = adapters
                .iter_mut()
                .find(|slot| {
                    slot.as_ref()
                        .is_some_and(|a| a.platform() == settings.platform)
                })
                .and_then(Option::take)
                .ok_or_else(|| {
                    SyncError::Config(format!("no adapter for destination {}", settings.platform))
                })?;
            destinations.push(Destination::new(adapter, settings.clone()));
        }

        for unused in adapters.into_iter().flatten() {
            tracing::warn!(platform = %unused.platform(), "Adapter has no destination settings, ignoring");
        }

        let pipeline = TransferPipeline::new(config.storage_dir.clone(), config.transfer.clone());

        Ok(Self {
            config,
            source,
            destinations,
            pipeline,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            torn_down: false,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Execute the run. Never fails: errors end up in the report.
    ///
    /// A run executes once; calling this again yields a `failed` report.
    pub async fn run(&mut self) -> SyncReport {
        let dry_run = self.config.is_dry_run();
        if self.state != RunState::Idle {
            tracing::error!(state = ?self.state, "Sync run already executed");
            return SyncReport::failed(dry_run, "sync run already executed");
        }

        let report = match self.execute().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Sync run failed");
                self.transition(RunState::Failed);
                SyncReport::failed(dry_run, e.to_string())
            }
        };

        self.teardown().await;

        tracing::info!(
            status = ?report.status,
            source_total = report.source_total,
            incremental = report.incremental_count,
            downloaded = report.downloaded_count,
            uploaded = report.uploaded_count,
            "Sync run finished"
        );
        report
    }

    async fn execute(&mut self) -> Result<SyncReport, SyncError> {
        let dry_run = self.config.is_dry_run();
        let timeout = self.config.transfer.operation_timeout;

        self.transition(RunState::Authenticating);
        self.authenticate_source().await?;
        if !dry_run {
            self.authenticate_upload_target().await?;
        }

        self.transition(RunState::ListingSource);
        let platform = self.source.platform();
        // Paginated; each page request is bounded by the HTTP client timeout
        let source_records = self
            .source
            .list_activities()
            .await
            .map_err(|source| SyncError::Listing { platform, source })?;
        tracing::info!(%platform, count = source_records.len(), "Source activities listed");

        self.transition(RunState::ResolvingWatermark);
        let watermark = WatermarkResolver::new(timeout)
            .resolve(&mut self.destinations)
            .await;

        self.transition(RunState::Filtering);
        let set = filter_incremental(&source_records, watermark.as_ref());
        log_incremental(&set, watermark.as_ref());

        if dry_run {
            self.transition(RunState::DryRunReport);
            let items = set
                .activities
                .iter()
                .map(|record| outcome_row(record, None, false, None))
                .collect();

            self.transition(RunState::Reporting);
            let report = build_report(
                true,
                source_records.len(),
                watermark,
                &set,
                Vec::new(),
                Vec::new(),
                items,
                0,
                0,
            );
            self.transition(RunState::Done);
            return Ok(report);
        }

        self.transition(RunState::Downloading);
        let DownloadOutcome {
            mut items,
            failed: failed_downloads,
            fetched,
            reused,
        } = self
            .pipeline
            .download_all(self.source.as_ref(), &set.activities)
            .await;
        tracing::info!(
            fetched,
            reused,
            failed = failed_downloads.len(),
            "Download phase finished"
        );

        self.transition(RunState::Uploading);
        let upload = match self.destinations.first() {
            Some(target) if !items.is_empty() => {
                self.pipeline.upload_all(target.adapter(), &mut items).await
            }
            _ => UploadOutcome::default(),
        };
        tracing::info!(
            uploaded = upload.uploaded,
            failed = upload.failed.len(),
            "Upload phase finished"
        );

        self.transition(RunState::Reporting);
        let local: HashMap<&str, _> = items
            .iter()
            .map(|item| (item.record().source_id.as_str(), item))
            .collect();
        let errors: HashMap<&str, &str> = failed_downloads
            .iter()
            .chain(upload.failed.iter())
            .map(|f| (f.record.source_id.as_str(), f.error.as_str()))
            .collect();

        let rows = set
            .activities
            .iter()
            .map(|record| {
                let item = local.get(record.source_id.as_str());
                outcome_row(
                    record,
                    item.and_then(|i| i.local_path()).map(|p| p.display().to_string()),
                    item.and_then(|i| i.uploaded()).unwrap_or(false),
                    errors.get(record.source_id.as_str()).map(|e| e.to_string()),
                )
            })
            .collect();

        let report = build_report(
            false,
            source_records.len(),
            watermark,
            &set,
            failed_downloads
                .iter()
                .map(|f| f.record.source_id.clone())
                .collect(),
            upload
                .failed
                .iter()
                .map(|f| f.record.source_id.clone())
                .collect(),
            rows,
            items.len(),
            upload.uploaded,
        );
        self.transition(RunState::Done);
        Ok(report)
    }

    async fn authenticate_source(&mut self) -> Result<(), SyncError> {
        let platform = self.source.platform();
        let credentials = self.config.source.credentials.clone().ok_or_else(|| {
            SyncError::Config(format!("no credentials configured for source {}", platform))
        })?;

        with_timeout(
            self.config.transfer.operation_timeout,
            self.source.authenticate(&credentials),
        )
        .await
        .map_err(|source| SyncError::Authentication { platform, source })?;

        tracing::info!(%platform, "Source authenticated");
        Ok(())
    }

    /// The first destination receives uploads and must be usable.
    async fn authenticate_upload_target(&mut self) -> Result<(), SyncError> {
        let timeout = self.config.transfer.operation_timeout;
        let target = self
            .destinations
            .first_mut()
            .ok_or_else(|| SyncError::Config("no upload destination configured".to_string()))?;
        let platform = target.platform();

        if !target.settings().enabled {
            return Err(SyncError::Config(format!(
                "upload destination {} is disabled",
                platform
            )));
        }
        if target.settings().credentials.is_none() {
            return Err(SyncError::Config(format!(
                "no credentials configured for upload destination {}",
                platform
            )));
        }

        target
            .ensure_session(timeout)
            .await
            .map_err(|source| SyncError::Authentication { platform, source })?;

        tracing::info!(%platform, "Upload destination authenticated");
        Ok(())
    }

    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.source.close().await;
        for destination in &mut self.destinations {
            destination.close().await;
        }
        tracing::debug!("Adapters closed");
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
        self.history.push(next);
    }
}

fn log_incremental(set: &IncrementalSet, watermark: Option<&Watermark>) {
    match watermark {
        Some(w) => tracing::info!(
            platform = %w.platform,
            watermark = %w.time,
            count = set.len(),
            "Activities newer than watermark"
        ),
        None => tracing::info!(count = set.len(), "No watermark, full sync"),
    }
    if set.duplicates > 0 {
        tracing::warn!(duplicates = set.duplicates, "Dropped duplicate source activities");
    }

    let total = set.len();
    for (i, record) in set.activities.iter().enumerate() {
        tracing::info!(
            "[{}/{}] {} - {:.1} km",
            i + 1,
            total,
            record.start_time,
            record.distance_km()
        );
    }
}

fn outcome_row(
    record: &ActivityRecord,
    local_path: Option<String>,
    uploaded: bool,
    error: Option<String>,
) -> ItemOutcome {
    ItemOutcome {
        source_id: record.source_id.clone(),
        start_time: record.start_time.clone(),
        distance_m: record.distance_m,
        downloaded: local_path.is_some(),
        local_path,
        uploaded,
        error,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_report(
    dry_run: bool,
    source_total: usize,
    watermark: Option<Watermark>,
    set: &IncrementalSet,
    failed_downloads: Vec<String>,
    failed_uploads: Vec<String>,
    items: Vec<ItemOutcome>,
    downloaded: usize,
    uploaded: usize,
) -> SyncReport {
    let incremental = set.len();
    SyncReport {
        status: SyncStatus::derive(dry_run, incremental, downloaded, uploaded),
        dry_run,
        source_total,
        watermark,
        incremental_count: incremental,
        downloaded_count: downloaded,
        uploaded_count: uploaded,
        failure: None,
        unparsed: set.unparsed.clone(),
        failed_downloads,
        failed_uploads,
        items,
        finished_at: crate::time_utils::format_utc_rfc3339(chrono::Utc::now()),
    }
}
