//! In-memory converter for documents that are already text

use super::Converter;
use crate::error::Result;
use crate::types::DocumentStream;
use async_trait::async_trait;
use tokio::io::AsyncReadExt;

/// Reads the whole stream as UTF-8 text (lossy) and trims it
///
/// Useful for text-only collections, dry runs and tests where no external
/// converter is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextConverter;

#[async_trait]
impl Converter for PlainTextConverter {
    async fn extract(&self, mut input: DocumentStream) -> Result<String> {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw).await?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    fn name(&self) -> &'static str {
        "plain-text"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_trims_surrounding_whitespace() {
        let input: DocumentStream = Box::new(Cursor::new(b"\n\n  Agenda item 4  \n".to_vec()));
        let text = PlainTextConverter.extract(input).await.unwrap();
        assert_eq!(text, "Agenda item 4");
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_string() {
        let input: DocumentStream = Box::new(Cursor::new(Vec::new()));
        assert_eq!(PlainTextConverter.extract(input).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let input: DocumentStream = Box::new(Cursor::new(vec![b'o', b'k', 0xFF]));
        let text = PlainTextConverter.extract(input).await.unwrap();
        assert_eq!(text, "ok\u{FFFD}");
    }
}
