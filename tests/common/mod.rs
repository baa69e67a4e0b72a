// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use ridesync::adapters::{Credentials, LatestActivity, PlatformAdapter};
use ridesync::config::{
    DestinationSettings, SourceSettings, SyncConfig, SyncMode, TransferSettings,
};
use ridesync::error::{AdapterError, Result};
use ridesync::models::{ActivityRecord, FileFormat, Platform, Timestamp};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behavior and call log of a [`FakeAdapter`].
#[derive(Debug, Default)]
pub struct FakeState {
    pub records: Vec<ActivityRecord>,
    pub latest: Option<Timestamp>,
    pub fail_auth: bool,
    pub fail_list: bool,
    /// Listing walks this many pages, pausing `page_delay` on each
    pub list_pages: usize,
    pub page_delay: Duration,
    pub fail_latest: bool,
    pub latest_unsupported: bool,
    /// Source ids whose download fails
    pub fail_download: HashSet<String>,
    /// Source ids whose download never finishes
    pub hang_download: HashSet<String>,
    /// Source ids whose download produces an empty file
    pub empty_download: HashSet<String>,
    /// Size of every downloaded payload (default: a small FIT header)
    pub payload_size: Option<usize>,
    /// Source ids whose upload is rejected
    pub fail_upload: HashSet<String>,
    /// Source ids whose upload is throttled with HTTP 429
    pub throttle_upload: HashSet<String>,

    pub auth_calls: usize,
    pub list_calls: usize,
    pub latest_calls: usize,
    pub downloads: Vec<String>,
    pub uploads: Vec<String>,
    pub close_calls: usize,
}

/// In-memory adapter; clones share one [`FakeState`].
#[derive(Clone)]
pub struct FakeAdapter {
    platform: Platform,
    pub state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn with_records(self, records: Vec<ActivityRecord>) -> Self {
        self.state.lock().unwrap().records = records;
        self
    }

    pub fn with_latest(self, raw: &str) -> Self {
        self.state.lock().unwrap().latest = Some(raw.parse().unwrap());
        self
    }

    pub fn failing_auth(self) -> Self {
        self.state.lock().unwrap().fail_auth = true;
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn boxed(&self) -> Box<dyn PlatformAdapter> {
        Box::new(self.clone())
    }
}

/// Source id encoded in a deterministic download filename.
fn source_id_of(file: &Path) -> String {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.rsplit('_').next().unwrap_or_default().to_string()
}

#[async_trait]
impl PlatformAdapter for FakeAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.auth_calls += 1;
        if state.fail_auth {
            return Err(AdapterError::Auth("invalid credentials".to_string()));
        }
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<ActivityRecord>> {
        let (pages, delay) = {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            if state.fail_list {
                return Err(AdapterError::Listing("HTTP 502".to_string()));
            }
            (state.list_pages, state.page_delay)
        };

        for _ in 0..pages {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.lock().unwrap().records.clone())
    }

    async fn get_latest_activity_time(&self) -> Result<LatestActivity> {
        let mut state = self.state.lock().unwrap();
        state.latest_calls += 1;
        if state.fail_latest {
            return Err(AdapterError::Http("HTTP 500".to_string()));
        }
        if state.latest_unsupported {
            return Ok(LatestActivity::Unsupported);
        }
        Ok(match state.latest {
            Some(ts) => LatestActivity::Found(ts),
            None => LatestActivity::NoHistory,
        })
    }

    async fn download(&self, record: &ActivityRecord, dest: &Path) -> Result<()> {
        let (hang, payload) = {
            let mut state = self.state.lock().unwrap();
            state.downloads.push(record.source_id.clone());
            if state.fail_download.contains(&record.source_id) {
                return Err(AdapterError::Download("connection reset".to_string()));
            }
            let payload = if state.empty_download.contains(&record.source_id) {
                Vec::new()
            } else {
                match state.payload_size {
                    Some(size) => vec![0x2e; size],
                    None => format!(".FIT {}", record.source_id).into_bytes(),
                }
            };
            (state.hang_download.contains(&record.source_id), payload)
        };

        tokio::fs::write(dest, &payload).await?;
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn upload(&self, file: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = source_id_of(file);
        state.uploads.push(id.clone());
        if state.fail_upload.contains(&id) {
            return Err(AdapterError::Upload("rejected by platform".to_string()));
        }
        if state.throttle_upload.contains(&id) {
            return Err(AdapterError::Http(AdapterError::RATE_LIMIT.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().close_calls += 1;
    }
}

/// Source record with a 10 km, one hour ride.
#[allow(dead_code)]
pub fn record(id: &str, start: &str) -> ActivityRecord {
    ActivityRecord {
        source_id: id.to_string(),
        start_time: start.to_string(),
        distance_m: 10_000.0,
        duration_s: 3600,
        platform: Platform::Igpsport,
        download_ref: id.to_string(),
        format: FileFormat::Fit,
    }
}

/// Three rides at 2025-01-01, 2025-01-05 and 2025-01-10, in source order.
#[allow(dead_code)]
pub fn three_rides() -> Vec<ActivityRecord> {
    vec![
        record("1", "2025-01-01"),
        record("2", "2025-01-05"),
        record("3", "2025-01-10"),
    ]
}

/// Transfer settings with no delays and a short timeout.
#[allow(dead_code)]
pub fn fast_transfer() -> TransferSettings {
    TransferSettings {
        pacing: Duration::ZERO,
        operation_timeout: Duration::from_millis(500),
        max_file_size: 1024 * 1024,
        upload_batch_size: 2,
        batch_pause: Duration::ZERO,
    }
}

#[allow(dead_code)]
pub fn strava_settings() -> DestinationSettings {
    DestinationSettings {
        platform: Platform::Strava,
        enabled: true,
        watermark_lookup: true,
        credentials: Some(Credentials::OAuthRefresh {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        }),
    }
}

#[allow(dead_code)]
pub fn archive_settings() -> DestinationSettings {
    DestinationSettings {
        platform: Platform::Archive,
        enabled: true,
        watermark_lookup: true,
        credentials: Some(Credentials::Anonymous),
    }
}

/// Config syncing iGPSport to Strava with the archive as second candidate.
#[allow(dead_code)]
pub fn test_config(storage_dir: PathBuf, mode: SyncMode) -> SyncConfig {
    SyncConfig {
        mode,
        storage_dir,
        archive_dir: PathBuf::from("/nonexistent/archive"),
        source: SourceSettings {
            platform: Platform::Igpsport,
            credentials: Some(Credentials::Password {
                username: "rider".to_string(),
                password: "secret".to_string(),
            }),
        },
        destinations: vec![strava_settings(), archive_settings()],
        transfer: fast_transfer(),
    }
}
