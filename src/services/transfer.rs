// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transfer pipeline: download phase, then upload phase.
//!
//! The storage directory is the dedup index. A file that exists under its
//! deterministic name was fully downloaded by an earlier run (payloads are
//! written to `<name>.part` and renamed only after verification), so it is
//! never fetched again. Failed uploads leave their file behind and are
//! retried by the next run.

use crate::adapters::{with_timeout, PlatformAdapter};
use crate::config::TransferSettings;
use crate::error::{AdapterError, Result};
use crate::models::{ActivityRecord, TransferItem};
use std::path::{Path, PathBuf};

/// An activity that failed in one of the phases.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub record: ActivityRecord,
    pub error: String,
}

/// Result of the download phase.
#[derive(Debug, Default)]
pub struct DownloadOutcome {
    /// Items whose file is on disk, in input order
    pub items: Vec<TransferItem>,
    pub failed: Vec<FailedItem>,
    /// Network downloads performed
    pub fetched: usize,
    /// Files found from an earlier run
    pub reused: usize,
}

/// Result of the upload phase.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub uploaded: usize,
    pub failed: Vec<FailedItem>,
}

/// Downloads activity payloads into the storage directory and uploads them.
pub struct TransferPipeline {
    storage_dir: PathBuf,
    settings: TransferSettings,
}

impl TransferPipeline {
    pub fn new(storage_dir: impl Into<PathBuf>, settings: TransferSettings) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            settings,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Deterministic local path of a record's payload.
    pub fn path_for(&self, record: &ActivityRecord) -> PathBuf {
        self.storage_dir.join(record.file_name())
    }

    /// Make sure every record has a file on disk.
    ///
    /// One item failing never stops the batch.
    pub async fn download_all(
        &self,
        source: &dyn PlatformAdapter,
        records: &[ActivityRecord],
    ) -> DownloadOutcome {
        let mut outcome = DownloadOutcome::default();
        if records.is_empty() {
            return outcome;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.storage_dir).await {
            tracing::error!(
                dir = %self.storage_dir.display(),
                error = %e,
                "Cannot create storage directory"
            );
            outcome.failed = records
                .iter()
                .map(|record| FailedItem {
                    record: record.clone(),
                    error: format!("storage directory unavailable: {}", e),
                })
                .collect();
            return outcome;
        }

        let total = records.len();
        let mut network_calls = 0usize;

        for (i, record) in records.iter().enumerate() {
            let path = self.path_for(record);
            tracing::info!(
                item = i + 1,
                total,
                start_time = %record.start_time,
                distance_km = format_args!("{:.1}", record.distance_km()),
                "Downloading activity"
            );

            match tokio::fs::try_exists(&path).await {
                Ok(true) => {
                    tracing::info!(file = %path.display(), "File already present, skipping download");
                    let mut item = TransferItem::new(record.clone());
                    item.mark_downloaded(path);
                    outcome.items.push(item);
                    outcome.reused += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Cannot check for existing file");
                }
            }

            if network_calls > 0 && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
            network_calls += 1;

            match self.fetch(source, record, &path).await {
                Ok(size) => {
                    tracing::info!(
                        file = %path.display(),
                        size_kb = format_args!("{:.1}", size as f64 / 1024.0),
                        "Download complete"
                    );
                    let mut item = TransferItem::new(record.clone());
                    item.mark_downloaded(path);
                    outcome.items.push(item);
                    outcome.fetched += 1;
                }
                Err(e) => {
                    tracing::error!(source_id = %record.source_id, error = %e, "Download failed");
                    outcome.failed.push(FailedItem {
                        record: record.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// Download one payload via a `.part` file and verify it.
    async fn fetch(
        &self,
        source: &dyn PlatformAdapter,
        record: &ActivityRecord,
        path: &Path,
    ) -> Result<u64> {
        let part = part_path(path);

        let result = async {
            with_timeout(self.settings.operation_timeout, source.download(record, &part)).await?;

            let size = tokio::fs::metadata(&part).await?.len();
            if size == 0 {
                return Err(AdapterError::Download("downloaded file is empty".to_string()));
            }
            if size > self.settings.max_file_size {
                return Err(AdapterError::Download(format!(
                    "downloaded file is {} bytes, limit is {}",
                    size, self.settings.max_file_size
                )));
            }

            tokio::fs::rename(&part, path).await?;
            Ok(size)
        }
        .await;

        if result.is_err() {
            remove_partial(&part).await;
        }
        result
    }

    /// Upload every downloaded item, in batches.
    ///
    /// No retries: a failed upload is retried by rerunning the sync.
    pub async fn upload_all(
        &self,
        destination: &dyn PlatformAdapter,
        items: &mut [TransferItem],
    ) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();
        let total = items.len();
        let batch_size = self.settings.upload_batch_size.max(1);

        for (batch_index, batch) in items.chunks_mut(batch_size).enumerate() {
            if batch_index > 0 && !self.settings.batch_pause.is_zero() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }
            tracing::info!(batch = batch_index + 1, files = batch.len(), "Uploading batch");

            for (offset, item) in batch.iter_mut().enumerate() {
                if offset > 0 && !self.settings.pacing.is_zero() {
                    tokio::time::sleep(self.settings.pacing).await;
                }

                let number = batch_index * batch_size + offset + 1;
                let result = match item.local_path() {
                    Some(path) => {
                        tracing::info!(
                            item = number,
                            total,
                            file = %path.display(),
                            start_time = %item.record().start_time,
                            "Uploading activity"
                        );
                        with_timeout(self.settings.operation_timeout, destination.upload(path))
                            .await
                    }
                    None => Err(AdapterError::Upload("item was never downloaded".to_string())),
                };

                match result {
                    Ok(()) => {
                        tracing::info!(source_id = %item.record().source_id, "Upload complete");
                        item.mark_uploaded(true);
                        outcome.uploaded += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            source_id = %item.record().source_id,
                            error = %e,
                            "Upload failed, file kept for the next run"
                        );
                        item.mark_uploaded(false);
                        let throttled = e.is_rate_limit();
                        outcome.failed.push(FailedItem {
                            record: item.record().clone(),
                            error: e.to_string(),
                        });

                        // Back off before the next upload
                        if throttled && !self.settings.batch_pause.is_zero() {
                            tracing::warn!(
                                pause_ms = self.settings.batch_pause.as_millis() as u64,
                                "Destination is throttling uploads, pausing"
                            );
                            tokio::time::sleep(self.settings.batch_pause).await;
                        }
                    }
                }
            }
        }

        outcome
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => tracing::warn!(file = %part.display(), "Removed incomplete download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %part.display(), error = %e, "Failed to remove incomplete download"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/data/igpsport_2025-01-05_1.fit")),
            PathBuf::from("/data/igpsport_2025-01-05_1.fit.part")
        );
    }

    #[test]
    fn test_path_for_is_flat_in_storage_dir() {
        let pipeline = TransferPipeline::new("/data", TransferSettings::default());
        let record = ActivityRecord {
            source_id: "42".to_string(),
            start_time: "2025-01-10".to_string(),
            distance_m: 0.0,
            duration_s: 0,
            platform: crate::models::Platform::Igpsport,
            download_ref: "42".to_string(),
            format: crate::models::FileFormat::Fit,
        };
        assert_eq!(
            pipeline.path_for(&record),
            PathBuf::from("/data/igpsport_2025-01-10_42.fit")
        );
    }
}
