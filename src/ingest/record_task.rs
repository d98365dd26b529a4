//! Per-record task: fetch, extract, upload.

use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::DocumentSource;
use crate::config::RetryConfig;
use crate::converter::Converter;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::sink::UploadSink;
use crate::types::{
    DocumentStream, Event, ExtractedDocument, FailedRecord, Record, RecordState, Stage,
    UploadedRecord,
};

/// Everything a record task needs, shared across the tasks of one run
pub(crate) struct RecordTaskContext {
    pub(crate) documents: Arc<dyn DocumentSource>,
    pub(crate) converter: Arc<dyn Converter>,
    pub(crate) sink: Arc<dyn UploadSink>,
    pub(crate) retry: RetryConfig,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// Terminal outcome of one record
#[derive(Debug)]
pub(crate) enum RecordOutcome {
    Uploaded(UploadedRecord),
    Failed(FailedRecord),
}

impl RecordTaskContext {
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    fn enter(&self, record: &Record, stage: Stage) {
        self.emit_event(Event::RecordStateChanged {
            record_id: record.id.clone(),
            state: RecordState::from(stage),
        });
    }
}

/// Run one record through its stages, stopping at the first failure
///
/// Cancellation is observed at every stage; the in-flight stage is dropped
/// (closing the HTTP connection or killing the converter) and the record is
/// reported as failed with [`Error::Cancelled`] at that stage.
pub(crate) async fn run_record_task(
    ctx: Arc<RecordTaskContext>,
    record: Record,
    cancel_token: CancellationToken,
) -> RecordOutcome {
    match process_record(&ctx, &record, &cancel_token).await {
        Ok(uploaded) => {
            tracing::info!(
                record_id = %uploaded.record_id,
                remote_id = %uploaded.remote_id,
                "record uploaded"
            );
            ctx.emit_event(Event::RecordStateChanged {
                record_id: record.id.clone(),
                state: RecordState::Done,
            });
            ctx.emit_event(Event::RecordCompleted {
                record_id: uploaded.record_id.clone(),
                remote_id: uploaded.remote_id.clone(),
            });
            RecordOutcome::Uploaded(uploaded)
        }
        Err((stage, error)) => {
            if matches!(error, Error::Cancelled) {
                tracing::info!(record_id = %record.id, stage = %stage, "record cancelled");
            } else {
                tracing::warn!(
                    record_id = %record.id,
                    stage = %stage,
                    error = %error,
                    "record failed"
                );
            }
            ctx.emit_event(Event::RecordStateChanged {
                record_id: record.id.clone(),
                state: RecordState::Failed,
            });
            ctx.emit_event(Event::RecordFailed {
                record_id: record.id.clone(),
                stage,
                code: error.code().to_string(),
                error: error.to_string(),
            });
            RecordOutcome::Failed(FailedRecord {
                record_id: record.id,
                stage,
                error,
            })
        }
    }
}

async fn process_record(
    ctx: &RecordTaskContext,
    record: &Record,
    cancel_token: &CancellationToken,
) -> std::result::Result<UploadedRecord, (Stage, Error)> {
    // Fetching: only obtaining the response is retried; the body is streamed
    // straight into the converter
    ctx.enter(record, Stage::Fetching);
    let documents = &ctx.documents;
    let record_id = record.id.as_str();
    let stream = cancellable(
        cancel_token,
        with_retry(&ctx.retry, move || documents.fetch(record_id)),
    )
    .await
    .map_err(|e| (Stage::Fetching, e))?;

    // Extracting: never retried. The stream is dropped when this stage ends.
    ctx.enter(record, Stage::Extracting);
    let text = cancellable(cancel_token, ctx.converter.extract(stream))
        .await
        .map_err(extraction_failure)?;
    let document = ExtractedDocument {
        record_id: record.id.clone(),
        text,
    };

    tracing::debug!(
        record_id = %document.record_id,
        chars = document.text.len(),
        converter = ctx.converter.name(),
        "document extracted"
    );

    ctx.enter(record, Stage::Uploading);
    let name = record.upload_name();
    let sink = &ctx.sink;
    let name_ref = name.as_str();
    let content = document.text.as_bytes();
    let remote_id = cancellable(
        cancel_token,
        with_retry(&ctx.retry, move || {
            let body: DocumentStream = Box::new(Cursor::new(content.to_vec()));
            sink.create(name_ref, body)
        }),
    )
    .await
    .map_err(|e| (Stage::Uploading, e))?;

    Ok(UploadedRecord {
        record_id: document.record_id,
        name,
        remote_id,
    })
}

/// Attribute a failed extraction to the stage that actually failed
///
/// The document body is streamed while the converter runs, so a transfer
/// error on it reaches the converter as an I/O error wrapping the
/// `reqwest::Error`. That failure belongs to fetching.
fn extraction_failure(error: Error) -> (Stage, Error) {
    match error {
        Error::Io(e) if e.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>()) => {
            let kind = e.kind();
            match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
                Some(Ok(transfer)) => (Stage::Fetching, Error::Network(*transfer)),
                Some(Err(inner)) => (Stage::Extracting, Error::Io(std::io::Error::new(kind, inner))),
                None => (Stage::Extracting, Error::Io(kind.into())),
            }
        }
        other => (Stage::Extracting, other),
    }
}

/// Race a stage against cancellation
async fn cancellable<T>(
    cancel_token: &CancellationToken,
    stage: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(Error::Cancelled),
        result = stage => result,
    }
}
