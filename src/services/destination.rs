// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! A destination adapter paired with its settings and session state.

use crate::adapters::{with_timeout, PlatformAdapter};
use crate::config::DestinationSettings;
use crate::error::{AdapterError, Result};
use crate::models::Platform;
use std::time::Duration;

/// Where a destination's login stands within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotAttempted,
    Active,
    Failed,
}

/// Destination adapter plus the configuration that governs it.
pub struct Destination {
    adapter: Box<dyn PlatformAdapter>,
    settings: DestinationSettings,
    session: SessionState,
}

impl Destination {
    pub fn new(adapter: Box<dyn PlatformAdapter>, settings: DestinationSettings) -> Self {
        Self {
            adapter,
            settings,
            session: SessionState::NotAttempted,
        }
    }

    pub fn platform(&self) -> Platform {
        self.settings.platform
    }

    pub fn settings(&self) -> &DestinationSettings {
        &self.settings
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn adapter(&self) -> &dyn PlatformAdapter {
        self.adapter.as_ref()
    }

    /// Log in once per run; later calls reuse the outcome.
    ///
    /// A previous failure is returned as an auth error without calling the
    /// platform again.
    pub async fn ensure_session(&mut self, limit: Duration) -> Result<()> {
        match self.session {
            SessionState::Active => return Ok(()),
            SessionState::Failed => {
                return Err(AdapterError::Auth(format!(
                    "{} login already failed this run",
                    self.platform()
                )))
            }
            SessionState::NotAttempted => {}
        }

        let credentials = self.settings.credentials.clone().ok_or_else(|| {
            AdapterError::Auth(format!("No credentials configured for {}", self.platform()))
        })?;

        match with_timeout(limit, self.adapter.authenticate(&credentials)).await {
            Ok(()) => {
                self.session = SessionState::Active;
                Ok(())
            }
            Err(e) => {
                self.session = SessionState::Failed;
                Err(e)
            }
        }
    }

    pub(crate) async fn close(&mut self) {
        self.adapter.close().await;
    }
}
