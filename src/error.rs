//! Error types for records-ingest
//!
//! This module provides the single error type used across the pipeline:
//! - Transport errors from the records service (network, status, decoding)
//! - Converter errors (missing binary, non-zero exit, timeout)
//! - Upload sink errors
//! - Configuration errors with the offending key

use std::time::Duration;
use thiserror::Error;

/// Result type alias for records-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for records-ingest
///
/// Each variant carries enough context to attribute a failure to the request,
/// process or configuration key that caused it.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, timeout or body-transfer failure talking to the records service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the records service
    #[error("request to {url} failed with status {status}: {body}")]
    BadStatus {
        /// The request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, captured for diagnostics
        body: String,
    },

    /// The records service accepted the request but sent no response headers in time
    #[error("no response from {url} within {timeout:?}")]
    ResponseTimeout {
        /// The request URL
        url: String,
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// Document endpoint answered 404
    #[error("document not found at {url}")]
    NotFound {
        /// The request URL
        url: String,
    },

    /// Response body could not be decoded
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Converter binary is missing or not executable
    #[error("converter unavailable: {0}")]
    ConverterUnavailable(String),

    /// Converter exited with a non-zero status
    #[error("converter exited with {}: {stderr}", exit_code_label(.code))]
    ConverterExit {
        /// Exit code, `None` when the process was terminated by a signal
        code: Option<i32>,
        /// Captured standard error output
        stderr: String,
    },

    /// Converter did not finish before its deadline and was killed
    #[error("converter timed out after {timeout:?}")]
    ConverterTimeout {
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// Upload sink rejected or failed to store the content
    #[error("upload failed: {0}")]
    Upload(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "credentials.api_key")
        key: Option<String>,
    },

    /// Query id that is not one of the known categories
    #[error("unknown record category: {0}")]
    InvalidCategory(i32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before this operation completed
    #[error("operation cancelled")]
    Cancelled,
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::Network(_) => "network_error",
            Error::BadStatus { .. } => "bad_status",
            Error::ResponseTimeout { .. } => "response_timeout",
            Error::NotFound { .. } => "not_found",
            Error::Decode(_) => "decode_error",
            Error::ConverterUnavailable(_) => "converter_unavailable",
            Error::ConverterExit { .. } => "converter_exit",
            Error::ConverterTimeout { .. } => "converter_timeout",
            Error::Upload(_) => "upload_error",
            Error::Config { .. } => "config_error",
            Error::InvalidCategory(_) => "invalid_category",
            Error::Io(_) => "io_error",
            Error::Cancelled => "cancelled",
        }
    }

    /// Whether this error aborts a whole run rather than a single record
    ///
    /// A missing converter is an environment problem: every remaining record
    /// would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConverterUnavailable(_) | Error::Config { .. } | Error::InvalidCategory(_)
        )
    }
}
