//! End-to-end tests against the real records service
//!
//! These tests talk to the public records endpoints and need `pdftotext` in
//! PATH. They are feature-gated behind `live-tests` and marked `#[ignore]`.
//!
//! # Running the tests
//!
//! ```bash
//! RECORDS_API_KEY=... cargo test --features live-tests --test e2e_live -- --ignored --nocapture
//! ```
//!
//! # Required environment variables (.env file)
//!
//! - `RECORDS_API_KEY` - credential handed to the pipeline configuration

#![cfg(feature = "live-tests")]

mod common;

use common::has_live_credentials;
use records_ingest::config::Credentials;
use records_ingest::{Category, Config, Ingestor, MemorySink, RecordSearch, RecordsClient};
use std::sync::Arc;

fn live_config() -> Config {
    Config {
        credentials: Credentials::new(std::env::var("RECORDS_API_KEY").unwrap_or_default()),
        ..Config::default()
    }
}

#[tokio::test]
#[ignore]
async fn test_live_search_returns_records() {
    if !has_live_credentials() {
        eprintln!("Skipping: RECORDS_API_KEY not set");
        return;
    }

    let client = RecordsClient::from_config(&live_config().records).unwrap();
    let page = client
        .search(Category::Minutes, &[], 5, 0)
        .await
        .expect("search should succeed");

    println!(
        "received {} records (truncated: {})",
        page.records.len(),
        page.truncated
    );
    assert!(page.records.iter().all(|r| !r.id.is_empty()));
}

#[tokio::test]
#[ignore]
async fn test_live_single_record_run() {
    if !has_live_credentials() {
        eprintln!("Skipping: RECORDS_API_KEY not set");
        return;
    }
    if which::which("pdftotext").is_err() {
        eprintln!("Skipping: pdftotext not found in PATH");
        return;
    }

    let sink = Arc::new(MemorySink::new());
    let ingestor = Ingestor::from_config(live_config(), sink.clone()).unwrap();

    let result = ingestor
        .run(Category::Minutes, &[], 1)
        .await
        .expect("run should not hit a fatal error");

    for failure in &result.failed {
        println!("{} failed while {}: {}", failure.record_id, failure.stage, failure.error);
    }
    assert_eq!(result.total(), 1);
    for upload in sink.uploads() {
        println!("{}: {} chars", upload.name, upload.content.len());
    }
}
