//! Keyword search endpoint

use super::{RecordSearch, RecordsClient};
use crate::error::{Error, Result};
use crate::types::{Category, RecordPage};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;

/// JSON body of a search request
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SearchRequest<'a> {
    #[serde(rename = "QueryID")]
    query_id: i32,
    keywords: &'a [String],
    query_limit: u32,
    // Absent on the first page
    #[serde(skip_serializing_if = "is_zero")]
    query_offset: usize,
}

fn is_zero(offset: &usize) -> bool {
    *offset == 0
}

#[async_trait]
impl RecordSearch for RecordsClient {
    async fn search(
        &self,
        category: Category,
        keywords: &[String],
        limit: u32,
        offset: usize,
    ) -> Result<RecordPage> {
        let payload = SearchRequest {
            query_id: category.query_id(),
            keywords,
            query_limit: limit,
            query_offset: offset,
        };

        tracing::debug!(
            category = %category,
            offset,
            limit,
            keywords = keywords.len(),
            "sending search request"
        );

        let response = self
            .http
            .post(self.search_url.clone())
            .header(ACCEPT, "application/json")
            .json(&payload)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                category = %category,
                status = status.as_u16(),
                "search request rejected"
            );
            return Err(Error::BadStatus {
                url: self.search_url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let page: RecordPage = serde_json::from_str(&body)?;

        tracing::debug!(
            category = %category,
            offset,
            records = page.records.len(),
            truncated = page.truncated,
            "search page received"
        );

        Ok(page)
    }
}
