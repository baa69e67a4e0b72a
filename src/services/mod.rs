// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync engine.

pub mod destination;
pub mod filter;
pub mod sync;
pub mod transfer;
pub mod watermark;

pub use destination::{Destination, SessionState};
pub use filter::{filter_incremental, is_newer, IncrementalSet};
pub use sync::{RunState, SyncRun};
pub use transfer::{DownloadOutcome, FailedItem, TransferPipeline, UploadOutcome};
pub use watermark::WatermarkResolver;
