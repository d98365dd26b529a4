//! Common test utilities for records-ingest integration tests

use records_ingest::Config;
use records_ingest::config::{Credentials, RetryConfig};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration pointing both endpoints at a mock server
#[allow(dead_code)]
pub fn mock_config(server: &MockServer) -> Config {
    let mut config = Config {
        credentials: Credentials::new("integration-test-key"),
        ..Config::default()
    };
    config.records.search_url = format!("{}/api/CustomQuery/KeywordSearch", server.uri());
    config.records.document_url = format!("{}/api/Document", server.uri());
    config.records.request_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Search response body in the service's wire format
#[allow(dead_code)]
pub fn search_page(records: &[(&str, &str)], truncated: bool) -> Value {
    let data: Vec<Value> = records
        .iter()
        .map(|(id, name)| {
            json!({
                "ID": id,
                "Name": name,
                "DisplayType": "PDF",
                "DisplayColumnValues": [
                    {"Value": "1/9/2024", "RawValue": "2024-01-09T00:00:00"}
                ]
            })
        })
        .collect();
    json!({
        "Data": data,
        "Truncated": truncated,
        "DisplayColumns": [{"Heading": "Date", "DataType": "Date"}]
    })
}

/// Serve `body` for the document of `record_id` (already URL-safe)
#[allow(dead_code)]
pub async fn mount_document(server: &MockServer, record_id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/Document/{}/", record_id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// True when credentials for the real records service are available
#[allow(dead_code)]
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("RECORDS_API_KEY").is_ok_and(|key| !key.trim().is_empty())
}
