//! Document endpoint

use super::{DocumentSource, RecordsClient};
use crate::error::{Error, Result};
use crate::types::DocumentStream;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use tokio_util::io::StreamReader;
use url::Url;

/// The service only serves documents to browser-like Accept headers
pub(super) const DOCUMENT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

impl RecordsClient {
    /// URL of a record's document
    ///
    /// The id is percent-encoded as one path segment: every byte outside the
    /// unreserved set is escaped, so `/`, `?`, `#` and spaces in an id cannot
    /// change the URL structure.
    pub fn document_url(&self, record_id: &str) -> Result<Url> {
        let base = self.document_url.as_str().trim_end_matches('/');
        let raw = format!("{}/{}/", base, urlencoding::encode(record_id));
        Url::parse(&raw).map_err(|e| {
            Error::config(
                "records.document_url",
                format!("cannot build document URL '{}': {}", raw, e),
            )
        })
    }
}

#[async_trait]
impl DocumentSource for RecordsClient {
    async fn fetch(&self, record_id: &str) -> Result<DocumentStream> {
        let url = self.document_url(record_id)?;

        // Only the wait for response headers is bounded; the body streams
        // for as long as the converter keeps reading
        let request = self
            .http
            .get(url.clone())
            .header(ACCEPT, DOCUMENT_ACCEPT)
            .send();
        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| Error::ResponseTimeout {
                url: url.to_string(),
                timeout: self.request_timeout,
            })??;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            record_id,
            content_length = response.content_length(),
            "document stream opened"
        );

        // The reqwest::Error stays inside the io::Error so a mid-body
        // transfer failure can still be told apart from a converter failure
        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}
