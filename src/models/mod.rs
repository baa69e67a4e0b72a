// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the sync engine.

pub mod activity;
pub mod report;
pub mod transfer;

pub use activity::{ActivityRecord, FileFormat, Platform, Timestamp};
pub use report::{ItemOutcome, SyncReport, SyncStatus, Watermark};
pub use transfer::TransferItem;
