// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! iGPSport API client (source platform).
//!
//! Handles:
//! - Account login (bearer token)
//! - Paginated activity listing
//! - Latest-activity lookup from the first page
//! - Two-step FIT download (resolve signed URL, then fetch)

use super::http::{check_response, check_response_json, send_with_retry, stream_to_file, RetryPolicy};
use super::{Credentials, LatestActivity, PlatformAdapter};
use crate::error::{AdapterError, Result};
use crate::models::{ActivityRecord, FileFormat, Platform};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const BASE_URL: &str = "https://prod.zh.igpsport.com/service";

/// Rows per listing page.
const PAGE_SIZE: u32 = 20;

/// Pause between listing pages.
const PAGE_PACING: Duration = Duration::from_millis(300);

/// iGPSport API client.
#[derive(Clone)]
pub struct IgpsportClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    token: Option<String>,
}

impl IgpsportClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            token: None,
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| AdapterError::Auth("iGPSport session not established".to_string()))
    }

    /// Fetch one page of the activity list.
    async fn query_page(&self, page: u32, page_size: u32) -> Result<ActivityPage> {
        let token = self.token()?;
        let url = format!(
            "{}/web-gateway/web-analyze/activity/queryMyActivity",
            self.base_url
        );

        let response = send_with_retry(&self.retry, || {
            self.http.get(&url).bearer_auth(token).query(&[
                ("pageNo", page.to_string()),
                ("pageSize", page_size.to_string()),
                ("reqType", "0".to_string()),
                ("sort", "1".to_string()),
            ])
        })
        .await
        .map_err(|e| AdapterError::Listing(e.to_string()))?;

        let envelope: Envelope<ActivityPage> = check_response_json(response)
            .await
            .map_err(|e| AdapterError::Listing(e.to_string()))?;
        envelope.into_data().map_err(AdapterError::Listing)
    }
}

#[async_trait]
impl PlatformAdapter for IgpsportClient {
    fn platform(&self) -> Platform {
        Platform::Igpsport
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let Credentials::Password { username, password } = credentials else {
            return Err(AdapterError::Auth(
                "iGPSport requires username/password credentials".to_string(),
            ));
        };

        tracing::info!(platform = %Platform::Igpsport, "Logging in");

        let body = serde_json::json!({
            "username": username,
            "password": password,
            "appId": "igpsport-web",
        });

        let response = self
            .http
            .post(format!("{}/auth/account/login", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Auth(format!("Login request failed: {}", e)))?;

        let envelope: Envelope<LoginData> = check_response_json(response)
            .await
            .map_err(|e| AdapterError::Auth(e.to_string()))?;
        let login = envelope.into_data().map_err(AdapterError::Auth)?;

        self.token = Some(login.access_token);
        tracing::info!(platform = %Platform::Igpsport, "Login successful");
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<ActivityRecord>> {
        let mut activities = Vec::new();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages {
            let data = self.query_page(page, PAGE_SIZE).await?;
            total_pages = data.total_page.max(1);

            tracing::debug!(
                platform = %Platform::Igpsport,
                page,
                total_pages,
                rows = data.rows.len(),
                "Fetched activity page"
            );

            if data.rows.is_empty() {
                break;
            }
            activities.extend(data.rows.into_iter().map(RideRow::into_record));

            page += 1;
            if page <= total_pages {
                tokio::time::sleep(PAGE_PACING).await;
            }
        }

        tracing::info!(
            platform = %Platform::Igpsport,
            count = activities.len(),
            "Listed activities"
        );
        Ok(activities)
    }

    async fn get_latest_activity_time(&self) -> Result<LatestActivity> {
        let data = self.query_page(1, 1).await?;
        let Some(row) = data.rows.into_iter().next() else {
            return Ok(LatestActivity::NoHistory);
        };

        let record = row.into_record();
        let ts = record
            .parsed_start()
            .map_err(|e| AdapterError::Listing(e.to_string()))?;
        Ok(LatestActivity::Found(ts))
    }

    async fn download(&self, record: &ActivityRecord, dest: &Path) -> Result<()> {
        let token = self.token()?;
        let url = format!(
            "{}/web-gateway/web-analyze/activity/getDownloadUrl/{}",
            self.base_url, record.download_ref
        );

        let response = send_with_retry(&self.retry, || self.http.get(&url).bearer_auth(token))
            .await
            .map_err(|e| AdapterError::Download(e.to_string()))?;
        let envelope: Envelope<String> = check_response_json(response)
            .await
            .map_err(|e| AdapterError::Download(e.to_string()))?;
        let file_url = envelope.into_data().map_err(AdapterError::Download)?;

        // Signed storage URL, no bearer token

        let response = send_with_retry(&self.retry, || self.http.get(&file_url))
            .await
            .map_err(|e| AdapterError::Download(e.to_string()))?;
        let response = check_response(response)
            .await
            .map_err(|e| AdapterError::Download(e.to_string()))?;

        let bytes = stream_to_file(response, dest).await?;
        tracing::debug!(source_id = %record.source_id, bytes, "Downloaded FIT file");
        Ok(())
    }

    async fn upload(&self, _file: &Path) -> Result<()> {
        Err(AdapterError::Unsupported("iGPSport upload"))
    }

    async fn close(&mut self) {
        self.token = None;
    }
}

/// Standard iGPSport response wrapper (`code == 0` means success).
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> std::result::Result<T, String> {
        if self.code != 0 {
            return Err(format!(
                "iGPSport error {}: {}",
                self.code,
                self.message.unwrap_or_default()
            ));
        }
        self.data
            .ok_or_else(|| "iGPSport response missing data".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPage {
    #[serde(default)]
    rows: Vec<RideRow>,
    #[serde(default)]
    total_page: u32,
}

/// One row of the activity list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RideRow {
    ride_id: serde_json::Value,
    /// Date like `2026.02.05`
    start_time: Option<String>,
    /// Meters
    ride_distance: Option<f64>,
    /// Seconds
    total_moving_time: Option<f64>,
}

impl RideRow {
    fn into_record(self) -> ActivityRecord {
        let ride_id = match self.ride_id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };

        let start_time = self
            .start_time
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().replace('.', "-"))
            .unwrap_or_else(|| "Unknown".to_string());

        ActivityRecord {
            source_id: ride_id.clone(),
            start_time,
            distance_m: self.ride_distance.unwrap_or(0.0).max(0.0),
            duration_s: self.total_moving_time.unwrap_or(0.0).max(0.0) as u64,
            platform: Platform::Igpsport,
            download_ref: ride_id,
            format: FileFormat::Fit,
        }
    }
}
