// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ridesync: incremental activity sync between fitness platforms
//!
//! This crate lists activities on a source platform, works out which ones
//! are newer than anything a destination already has, downloads those into
//! a local directory and uploads them to the destination.

pub mod adapters;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

pub use config::SyncConfig;
pub use models::{SyncReport, SyncStatus};
pub use services::SyncRun;
