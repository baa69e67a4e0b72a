// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Platform adapters.
//!
//! Every platform is driven through [`PlatformAdapter`]. The engine never
//! looks behind it: HTTP, pagination and session handling stay in here.

pub mod archive;
pub mod http;
pub mod igpsport;
pub mod strava;

pub use archive::LocalArchive;
pub use igpsport::IgpsportClient;
pub use strava::StravaClient;

use crate::error::{AdapterError, Result};
use crate::models::{ActivityRecord, Platform, Timestamp};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Login material for one platform.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Account name and password
    Password { username: String, password: String },
    /// OAuth application plus a long-lived refresh token
    OAuthRefresh {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// Platform needs no login
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::OAuthRefresh { client_id, .. } => f
                .debug_struct("OAuthRefresh")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Answer to "what is your most recent activity?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestActivity {
    Found(Timestamp),
    /// The account has no activities yet
    NoHistory,
    /// The adapter cannot answer this question
    Unsupported,
}

/// Capability set every platform implements.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Log in and keep whatever session the platform hands back.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()>;

    /// Enumerate every activity on the account (paginating internally).
    async fn list_activities(&self) -> Result<Vec<ActivityRecord>>;

    /// Cheap single-page lookup of the newest activity.
    async fn get_latest_activity_time(&self) -> Result<LatestActivity>;

    /// Write the activity payload to `dest`.
    async fn download(&self, record: &ActivityRecord, dest: &Path) -> Result<()>;

    async fn upload(&self, file: &Path) -> Result<()>;

    /// Release the session. Called exactly once at the end of a run.
    async fn close(&mut self) {}
}

/// Run an adapter call with an upper time bound.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AdapterError::Timeout(limit))?
}

/// Build the shipped adapter for a platform.
pub fn for_platform(
    platform: Platform,
    http: &reqwest::Client,
    archive_dir: PathBuf,
) -> Box<dyn PlatformAdapter> {
    match platform {
        Platform::Igpsport => Box::new(IgpsportClient::new(http.clone())),
        Platform::Strava => Box::new(StravaClient::new(http.clone())),
        Platform::Archive => Box::new(LocalArchive::new(archive_dir)),
    }
}
