// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory transfer state for one activity during one run.

use super::ActivityRecord;
use std::path::{Path, PathBuf};

/// An activity paired with its local file and upload outcome.
///
/// Set once when the file is on disk and once when the upload is attempted.
#[derive(Debug, Clone)]
pub struct TransferItem {
    record: ActivityRecord,
    local_path: Option<PathBuf>,
    uploaded: Option<bool>,
}

impl TransferItem {
    pub fn new(record: ActivityRecord) -> Self {
        Self {
            record,
            local_path: None,
            uploaded: None,
        }
    }

    pub fn record(&self) -> &ActivityRecord {
        &self.record
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// `None` until an upload has been attempted.
    pub fn uploaded(&self) -> Option<bool> {
        self.uploaded
    }

    pub(crate) fn mark_downloaded(&mut self, path: PathBuf) {
        debug_assert!(self.local_path.is_none(), "download recorded twice");
        self.local_path = Some(path);
    }

    pub(crate) fn mark_uploaded(&mut self, ok: bool) {
        debug_assert!(self.uploaded.is_none(), "upload recorded twice");
        self.uploaded = Some(ok);
    }
}
