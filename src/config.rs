//! Configuration types for records-ingest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default records search endpoint
pub const DEFAULT_SEARCH_URL: &str =
    "https://records.cityofberkeley.info/PublicAccess/api/CustomQuery/KeywordSearch";

/// Default document endpoint; record ids are appended as a path segment
pub const DEFAULT_DOCUMENT_URL: &str = "https://records.cityofberkeley.info/PublicAccess/api/Document";

/// Main configuration for the ingestion pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`credentials`](Credentials) - the API credential, required
/// - [`records`](RecordsApiConfig) - search and document endpoints
/// - [`converter`](ConverterConfig) - external text converter
/// - [`pipeline`](PipelineConfig) - concurrency and pagination limits
/// - [`retry`](RetryConfig) - backoff for transient failures
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Credentials (the api key has no default and must be supplied)
    #[serde(default)]
    pub credentials: Credentials,

    /// Records service endpoints and HTTP timeouts
    #[serde(default)]
    pub records: RecordsApiConfig,

    /// External converter settings
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Worker pool and pagination settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry behavior for network requests and uploads
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any network or process work starts
    ///
    /// A missing credential is reported here, at startup, rather than on the
    /// first upload.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.api_key.trim().is_empty() {
            return Err(Error::config(
                "credentials.api_key",
                "an api key is required",
            ));
        }

        for (key, value) in [
            ("records.search_url", &self.records.search_url),
            ("records.document_url", &self.records.document_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(key, format!("invalid URL '{}': {}", value, e)))?;
        }

        if self.pipeline.max_concurrent_records == 0 {
            return Err(Error::config(
                "pipeline.max_concurrent_records",
                "must be greater than zero",
            ));
        }

        if self.pipeline.max_pages == 0 {
            return Err(Error::config(
                "pipeline.max_pages",
                "must be greater than zero",
            ));
        }

        if self.converter.binary_path.is_none() && self.converter.program.trim().is_empty() {
            return Err(Error::config(
                "converter.program",
                "either binary_path or program must be set",
            ));
        }

        Ok(())
    }
}

/// Credentials supplied by the embedding application
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// API key of the embedding application
    ///
    /// Checked at startup so a missing key fails before any run. Sinks that
    /// need it read it through [`Ingestor::get_config`](crate::Ingestor::get_config).
    #[serde(default)]
    pub api_key: String,
}

impl Credentials {
    /// Create credentials from an api key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Credentials")
            .field("api_key", &shown)
            .finish()
    }
}

/// Records service endpoints and HTTP client timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordsApiConfig {
    /// Keyword search endpoint (POST)
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Document endpoint base (GET `{document_url}/{id}/`)
    #[serde(default = "default_document_url")]
    pub document_url: String,

    /// Request timeout (default: 30 seconds)
    ///
    /// Bounds the whole search call. For documents it bounds the wait for
    /// response headers only; the streamed body is not subject to it.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for RecordsApiConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            document_url: default_document_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// External converter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Explicit path to the converter executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Program name looked up in PATH when `binary_path` is not set (default: "pdftotext")
    #[serde(default = "default_converter_program")]
    pub program: String,

    /// Arguments making the converter read stdin and write stdout (default: ["-", "-"])
    #[serde(default = "default_converter_args")]
    pub args: Vec<String>,

    /// Whether to search PATH for `program` if `binary_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Per-document conversion deadline (default: 120 seconds)
    #[serde(default = "default_converter_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            program: default_converter_program(),
            args: default_converter_args(),
            search_path: true,
            timeout: default_converter_timeout(),
        }
    }
}

/// Worker pool and pagination settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum records processed concurrently (default: 4)
    ///
    /// Kept small to stay within the records service's rate tolerance.
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,

    /// `QueryLimit` sent with each search request (default: 0 = no explicit cap)
    #[serde(default)]
    pub page_size: u32,

    /// Hard ceiling on pages fetched per run (default: 1000)
    ///
    /// Guarantees termination even if the service never clears `Truncated`.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: default_max_concurrent_records(),
            page_size: 0,
            max_pages: default_max_pages(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_document_url() -> String {
    DEFAULT_DOCUMENT_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_converter_program() -> String {
    "pdftotext".to_string()
}

fn default_converter_args() -> Vec<String> {
    vec!["-".to_string(), "-".to_string()]
}

fn default_converter_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_concurrent_records() -> usize {
    4
}

fn default_max_pages() -> usize {
    1000
}

fn default_event_buffer() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Durations are (de)serialized as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
