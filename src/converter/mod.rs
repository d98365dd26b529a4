//! Document-to-text conversion
//!
//! This module defines the [`Converter`] capability used by the pipeline to
//! turn a raw document stream into plain text. Two implementations are
//! provided:
//!
//! - [`CliConverter`]: pipes the document through an external program
//!   (`pdftotext - -` by default)
//! - [`PlainTextConverter`]: in-memory variant that treats the input as text
//!
//! ## Usage
//!
//! ```no_run
//! use records_ingest::config::ConverterConfig;
//! use records_ingest::converter::{CliConverter, Converter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = CliConverter::from_config(&ConverterConfig::default())?;
//!
//! let document = std::fs::read("minutes.pdf")?;
//! let text = converter
//!     .extract(Box::new(std::io::Cursor::new(document)))
//!     .await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

mod cli;
mod plain;

pub use cli::CliConverter;
pub use plain::PlainTextConverter;

use crate::error::Result;
use crate::types::DocumentStream;
use async_trait::async_trait;

/// Converts a document byte stream into plain text
///
/// Implementations consume the stream fully (or until the converter stops
/// reading) and return the trimmed text. Conversion failures are never
/// retried by the pipeline.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert the document and return its trimmed text
    ///
    /// An empty input yields an empty string.
    async fn extract(&self, input: DocumentStream) -> Result<String>;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}
