//! Records service client
//!
//! [`RecordsClient`] talks to the two endpoints of the public-records service:
//! - [`search`] - keyword search, one page of records per call
//! - [`document`] - streaming download of a record's document
//!
//! The pipeline depends on the [`RecordSearch`] and [`DocumentSource`] traits
//! rather than on the concrete client, so tests can substitute fakes.
//! The HTTP client is injected; nothing here is process-global.

mod document;
mod search;


use crate::config::RecordsApiConfig;
use crate::error::{Error, Result};
use crate::types::{Category, DocumentStream, RecordPage};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// One search call against the records service
#[async_trait]
pub trait RecordSearch: Send + Sync {
    /// Fetch one page of records
    ///
    /// `limit = 0` sends no explicit cap. No retries happen here; the caller
    /// owns the retry policy.
    async fn search(
        &self,
        category: Category,
        keywords: &[String],
        limit: u32,
        offset: usize,
    ) -> Result<RecordPage>;
}

/// Source of raw document bytes for a record
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Open a live stream of the record's document
    ///
    /// The caller owns the returned stream; it is not buffered in memory.
    async fn fetch(&self, record_id: &str) -> Result<DocumentStream>;
}

/// HTTP client for the records service
#[derive(Clone, Debug)]
pub struct RecordsClient {
    http: reqwest::Client,
    search_url: Url,
    document_url: Url,
    request_timeout: Duration,
}

impl RecordsClient {
    /// Create a client around an existing `reqwest::Client`
    pub fn new(http: reqwest::Client, config: &RecordsApiConfig) -> Result<Self> {
        let search_url = Url::parse(&config.search_url).map_err(|e| {
            Error::config(
                "records.search_url",
                format!("invalid URL '{}': {}", config.search_url, e),
            )
        })?;
        let document_url = Url::parse(&config.document_url).map_err(|e| {
            Error::config(
                "records.document_url",
                format!("invalid URL '{}': {}", config.document_url, e),
            )
        })?;

        Ok(Self {
            http,
            search_url,
            document_url,
            request_timeout: config.request_timeout,
        })
    }

    /// Build the HTTP client from configuration and wrap it
    pub fn from_config(config: &RecordsApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;
        Self::new(http, config)
    }

    /// Search endpoint in use
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }
}
