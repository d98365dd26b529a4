//! # records-ingest
//!
//! Ingestion pipeline for a public-records document service.
//!
//! A run searches one document category, walks every result page, streams
//! each record's document through an external text converter and hands the
//! extracted text to an upload sink.
//!
//! ## Design Philosophy
//!
//! records-ingest is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Failure-isolating** - One bad record never aborts the batch
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Injectable** - Search, documents, converter and sink are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use records_ingest::{Category, Config, Ingestor};
//! use records_ingest::config::Credentials;
//! use records_ingest::sink::DirectorySink;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         credentials: Credentials::new(std::env::var("RECORDS_API_KEY")?),
//!         ..Default::default()
//!     };
//!
//!     let ingestor = Ingestor::from_config(config, Arc::new(DirectorySink::new("extracted")))?;
//!
//!     // Subscribe to events
//!     let mut events = ingestor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let keywords = vec!["housing".to_string()];
//!     let result = ingestor.run(Category::StaffReports, &keywords, 0).await?;
//!     for failure in &result.failed {
//!         eprintln!("{} failed while {}: {}", failure.record_id, failure.stage, failure.error);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Records service client (search and documents)
pub mod client;
/// Configuration types
pub mod config;
/// Document-to-text converters
pub mod converter;
/// Error types
pub mod error;
/// Ingestion pipeline
pub mod ingest;
/// Paginated search
pub mod pagination;
/// Retry logic with exponential backoff
pub mod retry;
/// Upload sinks
pub mod sink;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::{DocumentSource, RecordSearch, RecordsClient};
pub use config::Config;
pub use converter::{CliConverter, Converter, PlainTextConverter};
pub use error::{Error, Result};
pub use ingest::{Ingestor, Services};
pub use pagination::{PaginationSettings, Paginator};
pub use sink::{DirectorySink, MemorySink, UploadSink};
pub use types::{
    BatchResult, Category, DocumentStream, Event, ExtractedDocument, FailedRecord, Record,
    RecordPage, RecordState, Stage, UploadedRecord,
};

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
