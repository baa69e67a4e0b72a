// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client (destination platform).
//!
//! Handles:
//! - Access token from a long-lived refresh token
//! - Activity listing and latest-activity lookup
//! - FIT/GPX/TCX uploads
//!
//! Strava has no API for exporting original files, so downloads are
//! unsupported.

use super::http::{check_response_json, send_with_retry, RetryPolicy};
use super::{Credentials, LatestActivity, PlatformAdapter};
use crate::error::{AdapterError, Result};
use crate::models::{ActivityRecord, FileFormat, Platform};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Activities per listing page (Strava maximum is 200).
const PER_PAGE: u32 = 100;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    retry: RetryPolicy,
    access_token: Option<String>,
    rotated_refresh_token: Option<String>,
}

impl StravaClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth/token".to_string(),
            retry: RetryPolicy::default(),
            access_token: None,
            rotated_refresh_token: None,
        }
    }

    /// Point the client at a different API root (`/oauth/token` lives under it).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.oauth_url = format!("{}/oauth/token", base_url);
        self.base_url = base_url;
        self
    }

    /// Refresh token Strava issued in place of the configured one, if any.
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.rotated_refresh_token.as_deref()
    }

    fn access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| AdapterError::Auth("Strava session not established".to_string()))
    }

    /// List one page of the athlete's activities (newest first).
    async fn list_page(&self, page: u32, per_page: u32) -> Result<Vec<StravaActivitySummary>> {
        let access_token = self.access_token()?;
        let url = format!("{}/athlete/activities", self.base_url);

        let response = send_with_retry(&self.retry, || {
            self.http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
        })
        .await
        .map_err(|e| AdapterError::Listing(e.to_string()))?;

        check_response_json(response)
            .await
            .map_err(|e| AdapterError::Listing(e.to_string()))
    }
}

#[async_trait]
impl PlatformAdapter for StravaClient {
    fn platform(&self) -> Platform {
        Platform::Strava
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let Credentials::OAuthRefresh {
            client_id,
            client_secret,
            refresh_token,
        } = credentials
        else {
            return Err(AdapterError::Auth(
                "Strava requires OAuth refresh-token credentials".to_string(),
            ));
        };

        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::Auth(format!("Token refresh request failed: {}", e)))?;

        let tokens: TokenRefreshResponse = check_response_json(response)
            .await
            .map_err(|e| AdapterError::Auth(e.to_string()))?;

        tracing::info!(
            platform = %Platform::Strava,
            expires_at = tokens.expires_at,
            "Access token refreshed"
        );
        if tokens.refresh_token != *refresh_token {
            tracing::warn!(
                platform = %Platform::Strava,
                "Strava rotated the refresh token; update STRAVA_REFRESH_TOKEN"
            );
            self.rotated_refresh_token = Some(tokens.refresh_token);
        }
        self.access_token = Some(tokens.access_token);
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<ActivityRecord>> {
        let mut activities = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.list_page(page, PER_PAGE).await?;
            if batch.is_empty() {
                break;
            }
            let full_page = batch.len() as u32 == PER_PAGE;
            activities.extend(batch.into_iter().map(StravaActivitySummary::into_record));
            if !full_page {
                break;
            }
            page += 1;
        }

        tracing::info!(
            platform = %Platform::Strava,
            count = activities.len(),
            "Listed activities"
        );
        Ok(activities)
    }

    async fn get_latest_activity_time(&self) -> Result<LatestActivity> {
        let Some(latest) = self.list_page(1, 1).await?.into_iter().next() else {
            return Ok(LatestActivity::NoHistory);
        };

        let record = latest.into_record();
        let ts = record
            .parsed_start()
            .map_err(|e| AdapterError::Listing(e.to_string()))?;
        Ok(LatestActivity::Found(ts))
    }

    async fn download(&self, _record: &ActivityRecord, _dest: &Path) -> Result<()> {
        Err(AdapterError::Unsupported("Strava original file export"))
    }

    async fn upload(&self, file: &Path) -> Result<()> {
        let access_token = self.access_token()?;
        let format = FileFormat::from_path(file)
            .ok_or_else(|| AdapterError::Upload(format!("Unsupported file type: {}", file.display())))?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("activity")
            .to_string();

        let bytes = tokio::fs::read(file).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("data_type", format.extension())
            .text("external_id", file_name.clone());

        let response = self
            .http
            .post(format!("{}/uploads", self.base_url))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdapterError::Upload(e.to_string()))?;

        let status: UploadStatus = check_response_json(response)
            .await
            .map_err(|e| AdapterError::Upload(e.to_string()))?;

        match status.error {
            Some(err) if is_duplicate_error(&err) => {
                tracing::info!(file = %file_name, "Strava already has this activity");
                Ok(())
            }
            Some(err) => Err(AdapterError::Upload(err)),
            None => {
                tracing::debug!(file = %file_name, upload_id = status.id, status = %status.status, "Upload accepted");
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        self.access_token = None;
    }
}

/// Strava reports re-uploads of an existing activity as an error string.
fn is_duplicate_error(error: &str) -> bool {
    error.contains("duplicate of")
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    /// Local wall-clock start with a `Z` suffix
    pub start_date_local: String,
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
}

impl StravaActivitySummary {
    fn into_record(self) -> ActivityRecord {
        ActivityRecord {
            source_id: self.id.to_string(),
            start_time: self.start_date_local,
            distance_m: self.distance.max(0.0),
            duration_s: self.moving_time,
            platform: Platform::Strava,
            download_ref: self.id.to_string(),
            format: FileFormat::Fit,
        }
    }
}

/// Response of `POST /uploads`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadStatus {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::testing::{response, serve};
    use crate::models::Timestamp;

    fn oauth(refresh_token: &str) -> Credentials {
        Credentials::OAuthRefresh {
            client_id: "1".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: refresh_token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_authenticate_keeps_rotated_refresh_token() {
        let body = r#"{"access_token": "acc", "refresh_token": "rotated", "expires_at": 1767225600}"#;
        let (url, _) = serve(vec![response(200, body)]).await;
        let mut client = StravaClient::new(reqwest::Client::new()).with_base_url(url);

        client.authenticate(&oauth("original")).await.unwrap();

        assert_eq!(client.rotated_refresh_token(), Some("rotated"));
        assert_eq!(client.access_token().unwrap(), "acc");
    }

    #[tokio::test]
    async fn test_authenticate_same_refresh_token_is_not_rotation() {
        let body = r#"{"access_token": "acc", "refresh_token": "original", "expires_at": 1767225600}"#;
        let (url, _) = serve(vec![response(200, body)]).await;
        let mut client = StravaClient::new(reqwest::Client::new()).with_base_url(url);

        client.authenticate(&oauth("original")).await.unwrap();

        assert_eq!(client.rotated_refresh_token(), None);
    }

    #[tokio::test]
    async fn test_authenticate_rejected_token() {
        let (url, _) = serve(vec![response(401, r#"{"message": "Bad Request"}"#)]).await;
        let mut client = StravaClient::new(reqwest::Client::new()).with_base_url(url);

        let err = client.authenticate(&oauth("stale")).await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(client.access_token().is_err());
    }

    #[test]
    fn test_summary_into_record() {
        let json = r#"{
            "id": 16906743520,
            "name": "Morning Ride",
            "sport_type": "Ride",
            "start_date_local": "2025-01-10T07:45:00Z",
            "distance": 32100.4,
            "moving_time": 4520
        }"#;
        let summary: StravaActivitySummary = serde_json::from_str(json).unwrap();
        let record = summary.into_record();

        assert_eq!(record.source_id, "16906743520");
        assert_eq!(record.platform, Platform::Strava);
        assert_eq!(record.duration_s, 4520);
        let ts = record.parsed_start().unwrap();
        assert!(matches!(ts, Timestamp::DateTime(_)));
        assert_eq!(ts.to_string(), "2025-01-10 07:45:00");
    }

    #[test]
    fn test_upload_status_duplicate_detection() {
        let json = r#"{
            "id": 1,
            "status": "There was an error processing your activity.",
            "error": "igpsport_2025-01-10_7.fit duplicate of activity 123"
        }"#;
        let status: UploadStatus = serde_json::from_str(json).unwrap();
        assert!(is_duplicate_error(status.error.as_deref().unwrap()));
        assert!(!is_duplicate_error("Improperly formatted data."));
    }

    #[tokio::test]
    async fn test_download_unsupported() {
        let client = StravaClient::new(reqwest::Client::new());
        let record = ActivityRecord {
            source_id: "1".to_string(),
            start_time: "2025-01-10".to_string(),
            distance_m: 0.0,
            duration_s: 0,
            platform: Platform::Strava,
            download_ref: "1".to_string(),
            format: FileFormat::Fit,
        };
        let err = client
            .download(&record, Path::new("/tmp/never-written.fit"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_upload_without_session_is_auth_error() {
        let client = StravaClient::new(reqwest::Client::new());
        let err = client
            .upload(Path::new("/tmp/whatever.fit"))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }
}
