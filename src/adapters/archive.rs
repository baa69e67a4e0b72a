// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local directory archive.
//!
//! Stores activity files flat under one directory using the same
//! `{platform}_{start}_{id}.{ext}` names as the download cache, so the
//! start time of every archived activity can be read back from its name.
//! The directory is created by the first upload; until then the archive is
//! empty.

use super::{Credentials, LatestActivity, PlatformAdapter};
use crate::error::{AdapterError, Result};
use crate::models::{ActivityRecord, FileFormat, Platform};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Archive of activity files in a local directory.
pub struct LocalArchive {
    root: PathBuf,
    ready: bool,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ready: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(AdapterError::Auth("Archive not opened".to_string()))
        }
    }

    /// Every archived file that parses as an activity name.
    async fn scan(&self) -> Result<Vec<ActivityRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match parse_file_name(name) {
                Some(record) => records.push(record),
                None => tracing::debug!(file = name, "Ignoring non-activity file in archive"),
            }
        }

        records.sort_by(|a, b| a.download_ref.cmp(&b.download_ref));
        Ok(records)
    }
}

/// Split an archive filename back into an [`ActivityRecord`].
///
/// The record is tagged [`Platform::Archive`]; its id is the file stem so it
/// stays unique even when two platforms share an id.
fn parse_file_name(name: &str) -> Option<ActivityRecord> {
    let (stem, ext) = name.rsplit_once('.')?;
    let format = FileFormat::from_extension(ext)?;
    let (_, rest) = stem.split_once('_')?;
    let (start, _) = rest.rsplit_once('_')?;
    if start.is_empty() {
        return None;
    }

    Some(ActivityRecord {
        source_id: stem.to_string(),
        start_time: start.to_string(),
        distance_m: 0.0,
        duration_s: 0,
        platform: Platform::Archive,
        download_ref: name.to_string(),
        format,
    })
}

#[async_trait]
impl PlatformAdapter for LocalArchive {
    fn platform(&self) -> Platform {
        Platform::Archive
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(AdapterError::Auth(format!(
                    "Archive root {} is not a directory",
                    self.root.display()
                )))
            }
            Ok(_) => tracing::debug!(root = %self.root.display(), "Archive opened"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(root = %self.root.display(), "Archive does not exist yet")
            }
            Err(e) => {
                return Err(AdapterError::Auth(format!(
                    "Cannot open archive {}: {}",
                    self.root.display(),
                    e
                )))
            }
        }
        self.ready = true;
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<ActivityRecord>> {
        self.ensure_ready()?;
        self.scan()
            .await
            .map_err(|e| AdapterError::Listing(e.to_string()))
    }

    async fn get_latest_activity_time(&self) -> Result<LatestActivity> {
        self.ensure_ready()?;
        let latest = self
            .scan()
            .await?
            .iter()
            .filter_map(|r| r.parsed_start().ok())
            .max_by_key(|ts| ts.point());

        Ok(match latest {
            Some(ts) => LatestActivity::Found(ts),
            None => LatestActivity::NoHistory,
        })
    }

    async fn download(&self, record: &ActivityRecord, dest: &Path) -> Result<()> {
        self.ensure_ready()?;
        let src = self.root.join(&record.download_ref);
        tokio::fs::copy(&src, dest)
            .await
            .map_err(|e| AdapterError::Download(format!("{}: {}", src.display(), e)))?;
        Ok(())
    }

    async fn upload(&self, file: &Path) -> Result<()> {
        self.ensure_ready()?;
        let name = file
            .file_name()
            .ok_or_else(|| AdapterError::Upload(format!("Not a file: {}", file.display())))?;
        let dest = self.root.join(name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AdapterError::Upload(format!("{}: {}", self.root.display(), e)))?;
        if tokio::fs::try_exists(&dest).await? {
            tracing::debug!(file = %dest.display(), "Already archived");
            return Ok(());
        }

        let mut part_name = name.to_os_string();
        part_name.push(".part");
        let part = self.root.join(part_name);

        if let Err(e) = tokio::fs::copy(file, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(AdapterError::Upload(format!("{}: {}", file.display(), e)));
        }
        tokio::fs::rename(&part, &dest).await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.ready = false;
    }
}
