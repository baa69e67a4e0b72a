// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

mod common;

use common::{fast_transfer, record, three_rides, FakeAdapter};
use ridesync::models::Platform;
use ridesync::services::TransferPipeline;
use std::time::{Duration, Instant};

fn pipeline(dir: &std::path::Path) -> TransferPipeline {
    TransferPipeline::new(dir, fast_transfer())
}

fn leftover_parts(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .count()
}

#[tokio::test]
async fn test_download_writes_deterministic_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let pipeline = pipeline(dir.path());

    let outcome = pipeline.download_all(&source, &three_rides()).await;

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.fetched, 3);
    assert!(outcome.failed.is_empty());
    assert!(dir.path().join("igpsport_2025-01-05_2.fit").is_file());
    for item in &outcome.items {
        assert_eq!(item.local_path(), Some(pipeline.path_for(item.record()).as_path()));
    }
    assert_eq!(leftover_parts(dir.path()), 0);
}

#[tokio::test]
async fn test_second_download_makes_no_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let pipeline = pipeline(dir.path());

    pipeline.download_all(&source, &three_rides()).await;
    let again = pipeline.download_all(&source, &three_rides()).await;

    assert_eq!(again.items.len(), 3);
    assert_eq!(again.fetched, 0);
    assert_eq!(again.reused, 3);
    assert_eq!(source.state().downloads.len(), 3);
}

#[tokio::test]
async fn test_failed_download_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    source.state().hang_download.insert("2".to_string());

    let outcome = pipeline(dir.path())
        .download_all(&source, &three_rides())
        .await;

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].record.source_id, "2");
    assert!(outcome.failed[0].error.contains("timed out"));
    assert!(!dir.path().join("igpsport_2025-01-05_2.fit").exists());
    assert_eq!(leftover_parts(dir.path()), 0);
}

#[tokio::test]
async fn test_empty_and_oversized_payloads_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    source.state().empty_download.insert("1".to_string());
    let pipeline = pipeline(dir.path());

    let outcome = pipeline
        .download_all(&source, &[record("1", "2025-01-01")])
        .await;
    assert!(outcome.items.is_empty());
    assert!(outcome.failed[0].error.contains("empty"));

    let big = FakeAdapter::new(Platform::Igpsport);
    big.state().payload_size = Some(2 * 1024 * 1024);
    let outcome = pipeline
        .download_all(&big, &[record("9", "2025-01-09")])
        .await;
    assert!(outcome.items.is_empty());
    assert!(outcome.failed[0].error.contains("limit"));
    assert_eq!(leftover_parts(dir.path()), 0);
}

#[tokio::test]
async fn test_empty_input_creates_nothing() {
    let parent = tempfile::tempdir().unwrap();
    let dir = parent.path().join("downloads");
    let source = FakeAdapter::new(Platform::Igpsport);

    let outcome = TransferPipeline::new(&dir, fast_transfer())
        .download_all(&source, &[])
        .await;

    assert!(outcome.items.is_empty());
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_uploads_record_outcomes_and_keep_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let dest = FakeAdapter::new(Platform::Strava);
    dest.state().fail_upload.insert("3".to_string());
    let pipeline = pipeline(dir.path());

    let mut items = pipeline.download_all(&source, &three_rides()).await.items;
    let outcome = pipeline.upload_all(&dest, &mut items).await;

    assert_eq!(outcome.uploaded, 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].record.source_id, "3");
    assert_eq!(items[2].uploaded(), Some(false));
    assert_eq!(items[0].uploaded(), Some(true));
    assert!(items[2].local_path().unwrap().is_file());
}

#[tokio::test]
async fn test_rerun_retries_failed_upload_without_downloading() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let dest = FakeAdapter::new(Platform::Strava);
    dest.state().fail_upload.insert("2".to_string());
    let pipeline = pipeline(dir.path());
    let rides = vec![record("2", "2025-01-05")];

    let mut items = pipeline.download_all(&source, &rides).await.items;
    assert_eq!(pipeline.upload_all(&dest, &mut items).await.uploaded, 0);

    dest.state().fail_upload.clear();
    let mut items = pipeline.download_all(&source, &rides).await.items;
    assert_eq!(pipeline.upload_all(&dest, &mut items).await.uploaded, 1);

    assert_eq!(source.state().downloads, vec!["2".to_string()]);
    assert_eq!(dest.state().uploads, vec!["2".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_uploads_go_out_in_input_order_across_batches() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let dest = FakeAdapter::new(Platform::Strava);
    let pipeline = pipeline(dir.path());
    let rides: Vec<_> = (1..=5)
        .map(|i| record(&i.to_string(), &format!("2025-03-0{}", i)))
        .collect();

    let mut items = pipeline.download_all(&source, &rides).await.items;
    let outcome = pipeline.upload_all(&dest, &mut items).await;

    assert_eq!(outcome.uploaded, 5);
    assert_eq!(dest.state().uploads, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_throttled_upload_pauses_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let dest = FakeAdapter::new(Platform::Strava);
    dest.state().throttle_upload.insert("1".to_string());

    let mut settings = fast_transfer();
    settings.upload_batch_size = 5;
    settings.batch_pause = Duration::from_millis(200);
    let pipeline = TransferPipeline::new(dir.path(), settings);

    let mut items = pipeline.download_all(&source, &three_rides()).await.items;
    let started = Instant::now();
    let outcome = pipeline.upload_all(&dest, &mut items).await;

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(outcome.uploaded, 2);
    assert_eq!(outcome.failed.len(), 1);
    assert!(outcome.failed[0].error.contains("Rate limit"));
    assert_eq!(dest.state().uploads, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_ids_that_sanitize_alike_get_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeAdapter::new(Platform::Igpsport);
    let pipeline = pipeline(dir.path());
    let rides = vec![record("a/b", "2025-01-05"), record("a-b", "2025-01-05")];

    let outcome = pipeline.download_all(&source, &rides).await;

    assert_eq!(outcome.fetched, 2);
    assert_eq!(outcome.reused, 0);
    assert_ne!(outcome.items[0].local_path(), outcome.items[1].local_path());
    assert_eq!(source.state().downloads, vec!["a/b", "a-b"]);
    assert_eq!(
        std::fs::read(outcome.items[0].local_path().unwrap()).unwrap(),
        b".FIT a/b"
    );
}
