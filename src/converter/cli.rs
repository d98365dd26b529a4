//! Converter backed by an external program

use super::Converter;
use crate::config::ConverterConfig;
use crate::error::{Error, Result};
use crate::types::DocumentStream;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Runs an external converter that reads the document on stdin and writes
/// text on stdout
///
/// Stdin is fed while stdout and stderr are drained concurrently, so a
/// converter producing large output cannot deadlock against a full pipe.
/// The child is spawned with `kill_on_drop`, so dropping an in-flight
/// extraction terminates the subprocess.
///
/// # Examples
///
/// ```no_run
/// use records_ingest::converter::{CliConverter, Converter};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = CliConverter::new(
///     PathBuf::from("/usr/bin/pdftotext"),
///     vec!["-".into(), "-".into()],
/// )
/// .with_timeout(Duration::from_secs(30));
///
/// let pdf = std::fs::read("report.pdf")?;
/// let text = converter.extract(Box::new(std::io::Cursor::new(pdf))).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CliConverter {
    binary_path: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CliConverter {
    /// Create a converter with an explicit binary path and arguments
    pub fn new(binary_path: PathBuf, args: Vec<String>) -> Self {
        Self {
            binary_path,
            args,
            timeout: ConverterConfig::default().timeout,
        }
    }

    /// Build the converter from configuration
    ///
    /// Uses `binary_path` if set, otherwise looks `program` up in PATH with
    /// the `which` crate. A converter that cannot be located is reported as
    /// [`Error::ConverterUnavailable`] here rather than on the first record.
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        let binary_path = match &config.binary_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which(&config.program).map_err(|e| {
                Error::ConverterUnavailable(format!(
                    "'{}' not found in PATH: {}",
                    config.program, e
                ))
            })?,
            None => PathBuf::from(&config.program),
        };

        tracing::debug!(
            converter = %binary_path.display(),
            args = ?config.args,
            "using external converter"
        );

        Ok(Self::new(binary_path, config.args.clone()).with_timeout(config.timeout))
    }

    /// Set the per-document deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the converter executable
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::ConverterUnavailable(format!(
                    "cannot execute '{}': {}",
                    self.binary_path.display(),
                    e
                ))
            }
            _ => Error::Io(e),
        }
    }
}

#[async_trait]
impl Converter for CliConverter {
    async fn extract(&self, input: DocumentStream) -> Result<String> {
        let mut input = BufReader::new(input);

        // Nothing to convert; converters tend to reject empty documents
        if input.fill_buf().await?.is_empty() {
            return Ok(String::new());
        }

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let missing_pipe = || Error::Io(std::io::Error::other("converter pipe was not captured"));
        let mut stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        let mut stderr = child.stderr.take().ok_or_else(missing_pipe)?;

        let feed = async move {
            let copied = tokio::io::copy_buf(&mut input, &mut stdin).await;
            // Closing stdin signals end of input
            drop(stdin);
            match copied {
                Ok(_) => Ok(()),
                // The converter stopped reading; its exit status decides
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                Err(e) => Err(e),
            }
        };
        let read_stdout = async {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        };

        let outcome = tokio::time::timeout(self.timeout, async {
            let ((), out, err) = tokio::try_join!(feed, read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        let (status, out, err) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    converter = %self.binary_path.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "converter timed out, killing"
                );
                child.kill().await.ok();
                return Err(Error::ConverterTimeout {
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            return Err(Error::ConverterExit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
