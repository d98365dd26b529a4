//! Upload sinks
//!
//! The pipeline hands every extracted document to an [`UploadSink`] through a
//! single call, `create(name, content) -> remote id`. Two sinks are bundled:
//!
//! - [`MemorySink`]: keeps uploads in memory (dry runs, tests)
//! - [`DirectorySink`]: writes each upload as a file into a directory

use crate::error::{Error, Result};
use crate::types::DocumentStream;
use crate::utils::{MAX_RENAME_ATTEMPTS, numbered_file_name, sanitize_file_name};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Durable destination for extracted text
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Store `content` under `name` and return the sink's identifier for it
    ///
    /// Failures are reported as [`Error::Upload`].
    async fn create(&self, name: &str, content: DocumentStream) -> Result<String>;
}

/// One upload held by a [`MemorySink`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUpload {
    /// Identifier returned to the caller
    pub remote_id: String,
    /// Name passed to `create`
    pub name: String,
    /// Uploaded bytes
    pub content: Vec<u8>,
}

impl StoredUpload {
    /// Content as text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Sink that keeps every upload in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    uploads: Mutex<Vec<StoredUpload>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the uploads received so far, in arrival order
    pub fn uploads(&self) -> Vec<StoredUpload> {
        self.uploads
            .lock()
            .map(|uploads| uploads.clone())
            .unwrap_or_default()
    }

    /// Number of uploads received
    pub fn len(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or_default()
    }

    /// True if nothing was uploaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UploadSink for MemorySink {
    async fn create(&self, name: &str, mut content: DocumentStream) -> Result<String> {
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Error::Upload(format!("failed to read content for '{}': {}", name, e)))?;

        let mut uploads = self
            .uploads
            .lock()
            .map_err(|_| Error::Upload("memory sink lock poisoned".to_string()))?;
        let remote_id = format!("mem-{}", uploads.len() + 1);
        uploads.push(StoredUpload {
            remote_id: remote_id.clone(),
            name: name.to_string(),
            content: buf,
        });
        Ok(remote_id)
    }
}

/// Sink that writes each upload as a file into a directory
///
/// Names are sanitized into a single file name. If a file with that name
/// already exists, ` (1)`, ` (2)`, ... is inserted before the extension. The
/// remote id is the final file name.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Write uploads into `dir` (created on first upload if missing)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn create_unique(&self, name: &str) -> Result<(String, tokio::fs::File)> {
        for attempt in 0..=MAX_RENAME_ATTEMPTS {
            let file_name = numbered_file_name(name, attempt);
            let path = self.dir.join(&file_name);

            // create_new makes the existence check and creation one step
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file_name, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::Upload(format!(
                        "failed to create '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(Error::Upload(format!(
            "could not find a free file name for '{}' after {} attempts",
            name, MAX_RENAME_ATTEMPTS
        )))
    }
}

#[async_trait]
impl UploadSink for DirectorySink {
    async fn create(&self, name: &str, mut content: DocumentStream) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Upload(format!(
                "failed to create directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let safe_name = sanitize_file_name(name);
        let (file_name, mut file) = self.create_unique(&safe_name).await?;
        let path = self.dir.join(&file_name);

        let written = async {
            tokio::io::copy(&mut content, &mut file).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // Don't leave a partial file behind
            drop(file);
            tokio::fs::remove_file(&path).await.ok();
            return Err(Error::Upload(format!(
                "failed to write '{}': {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(name, file = %path.display(), "upload written");
        Ok(file_name)
    }
}
