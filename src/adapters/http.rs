// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP plumbing shared by the web adapters.

use crate::error::{AdapterError, Result};
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("ridesync/", env!("CARGO_PKG_VERSION"));

/// Retry policy for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Build the shared HTTP client.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AdapterError::Http(format!("Failed to build HTTP client: {}", e)))
}

/// Statuses worth retrying on an idempotent request.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Send an idempotent request, retrying transient failures.
///
/// `make` builds a fresh request for every attempt. Only use this for GETs;
/// uploads must not be replayed within a run.
pub async fn send_with_retry<F>(policy: &RetryPolicy, mut make: F) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let last_error = match make().send().await {
            Ok(response) if is_retryable_status(response.status()) => {
                tracing::warn!(
                    status = %response.status(),
                    attempt,
                    "HTTP request failed with retryable status"
                );
                if attempt >= policy.max_attempts {
                    return Ok(response);
                }
                None
            }
            Ok(response) => return Ok(response),
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::warn!(error = %e, attempt, "HTTP request failed");
                Some(AdapterError::Http(e.to_string()))
            }
            Err(e) => return Err(AdapterError::Http(e.to_string())),
        };

        if attempt >= policy.max_attempts {
            return Err(last_error
                .unwrap_or_else(|| AdapterError::Http("All retry attempts exhausted".to_string())));
        }
        tokio::time::sleep(policy.delay_for(attempt)).await;
    }
}

/// Check response status and return error if not successful.
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Platform rate limit hit (429)");
        return Err(AdapterError::Http(AdapterError::RATE_LIMIT.to_string()));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(AdapterError::Http(AdapterError::TOKEN_REJECTED.to_string()));
    }

    Err(AdapterError::Http(format!("HTTP {}: {}", status, body)))
}

/// Check response and parse JSON body.
pub async fn check_response_json<T: for<'de> serde::Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    check_response(response)
        .await?
        .json()
        .await
        .map_err(|e| AdapterError::Http(format!("JSON parse error: {}", e)))
}

/// Stream a response body into `dest`, returning the byte count.
pub async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AdapterError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}
