//! Ingestion pipeline (decomposed into focused submodules)
//!
//! [`Ingestor`] composes the paginated search, document fetching, text
//! extraction and upload. Pages are fetched sequentially by a single stream;
//! records are processed concurrently by a bounded worker pool, one task per
//! record.

mod record_task;


use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::{DocumentSource, RecordSearch, RecordsClient};
use crate::config::Config;
use crate::converter::{CliConverter, Converter};
use crate::error::{Error, Result};
use crate::pagination::{PaginationSettings, Paginator};
use crate::sink::UploadSink;
use crate::types::{BatchResult, Category, Event, RecordState};

use record_task::{RecordOutcome, RecordTaskContext, run_record_task};

/// The collaborators a pipeline run talks to
///
/// Injected so the pipeline can run against fakes; [`Ingestor::from_config`]
/// wires the real HTTP client and external converter.
#[derive(Clone)]
pub struct Services {
    /// Keyword search
    pub search: Arc<dyn RecordSearch>,
    /// Document downloads
    pub documents: Arc<dyn DocumentSource>,
    /// Document-to-text conversion
    pub converter: Arc<dyn Converter>,
    /// Destination for extracted text
    pub sink: Arc<dyn UploadSink>,
}

impl Services {
    /// Use one records client for both search and document downloads
    pub fn with_client(
        client: RecordsClient,
        converter: Arc<dyn Converter>,
        sink: Arc<dyn UploadSink>,
    ) -> Self {
        let client = Arc::new(client);
        Self {
            search: client.clone(),
            documents: client,
            converter,
            sink,
        }
    }
}

/// Public-records ingestion pipeline
///
/// # Example
///
/// ```no_run
/// use records_ingest::{Category, Config, Ingestor};
/// use records_ingest::config::Credentials;
/// use records_ingest::sink::DirectorySink;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config {
///         credentials: Credentials::new("api-key"),
///         ..Default::default()
///     };
///     let ingestor = Ingestor::from_config(config, Arc::new(DirectorySink::new("out")))?;
///     ingestor.cancel_on_signal();
///
///     let result = ingestor.run(Category::Minutes, &[], 10).await?;
///     println!("{} uploaded, {} failed", result.succeeded.len(), result.failed.len());
///     Ok(())
/// }
/// ```
pub struct Ingestor {
    config: Arc<Config>,
    services: Services,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Ingestor {
    /// Create an ingestor from configuration and injected services
    ///
    /// The configuration is validated first, so a missing credential fails
    /// here rather than partway through a run.
    pub fn new(config: Config, services: Services) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.pipeline.event_buffer.max(1));

        Ok(Self {
            config: Arc::new(config),
            services,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Create an ingestor with the HTTP records client and the external
    /// converter built from configuration
    ///
    /// Fails with [`Error::ConverterUnavailable`] if the converter cannot be
    /// located.
    pub fn from_config(config: Config, sink: Arc<dyn UploadSink>) -> Result<Self> {
        config.validate()?;

        let client = RecordsClient::from_config(&config.records)?;
        let converter = Arc::new(CliConverter::from_config(&config.converter)?);
        let services = Services::with_client(client, converter, sink);

        Self::new(config, services)
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives every event emitted after it subscribed.
    /// A subscriber that falls more than `pipeline.event_buffer` events
    /// behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Cancel the running and any future runs
    ///
    /// In-flight records end as failed with [`Error::Cancelled`]; uploads
    /// that already completed are kept. Runs started afterwards fail with
    /// [`Error::Cancelled`] before searching.
    pub fn cancel(&self) {
        tracing::info!("cancellation requested");
        self.cancel_token.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel when the process receives a termination signal
    ///
    /// - **Unix:** SIGTERM and SIGINT
    /// - **Windows/other:** Ctrl+C
    pub fn cancel_on_signal(&self) -> tokio::task::JoinHandle<()> {
        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = crate::wait_for_signal() => {
                    tracing::info!("termination signal received, cancelling ingestion");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() only fails when nobody is subscribed
        self.event_tx.send(event).ok();
    }

    /// Ingest every record matching `category` and `keywords`
    ///
    /// `max_records = 0` processes all matches. Per-record failures are
    /// collected in the result; the run itself fails only on fatal
    /// conditions (the search failing after retries, or the converter being
    /// unavailable). When cancelled mid-run, the partial result is returned;
    /// on an already cancelled ingestor the run fails with [`Error::Cancelled`].
    pub async fn run(
        &self,
        category: Category,
        keywords: &[String],
        max_records: usize,
    ) -> Result<BatchResult> {
        if self.cancel_token.is_cancelled() {
            tracing::warn!(category = %category, "ingestor was cancelled, refusing to start run");
            return Err(Error::Cancelled);
        }

        let mut result = BatchResult::new(Utc::now());
        let run_token = self.cancel_token.child_token();

        tracing::info!(
            category = %category,
            keywords = ?keywords,
            max_records,
            "starting ingestion run"
        );

        let records = Paginator::new(
            Arc::clone(&self.services.search),
            category,
            keywords.to_vec(),
            max_records,
            PaginationSettings::from_config(&self.config),
        )
        .with_events(self.event_tx.clone())
        .into_stream();
        let mut records = Box::pin(records);

        let ctx = Arc::new(RecordTaskContext {
            documents: Arc::clone(&self.services.documents),
            converter: Arc::clone(&self.services.converter),
            sink: Arc::clone(&self.services.sink),
            retry: self.config.retry.clone(),
            event_tx: self.event_tx.clone(),
        });

        let concurrent_limit = Arc::new(Semaphore::new(self.config.pipeline.max_concurrent_records));
        let mut tasks: JoinSet<RecordOutcome> = JoinSet::new();
        let mut records_done = false;
        let mut fatal: Option<Error> = None;

        loop {
            if records_done && tasks.is_empty() {
                break;
            }

            // A permit is taken before the next record is pulled, so pages are
            // only requested when a worker is free
            let next_record = async {
                let permit = concurrent_limit.clone().acquire_owned().await;
                (permit, records.next().await)
            };

            tokio::select! {
                biased;

                _ = run_token.cancelled() => break,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Some(error) = collect_outcome(&mut result, joined) {
                        tracing::error!(error = %error, "fatal error, aborting run");
                        fatal = Some(error);
                        run_token.cancel();
                        break;
                    }
                }

                (permit, item) = next_record, if !records_done => {
                    match item {
                        None => records_done = true,
                        Some(Err(e)) => {
                            tracing::error!(category = %category, error = %e, "search failed, aborting run");
                            fatal = Some(e);
                            run_token.cancel();
                            break;
                        }
                        Some(Ok(record)) => {
                            let Ok(permit) = permit else {
                                break;
                            };
                            self.emit_event(Event::RecordStateChanged {
                                record_id: record.id.clone(),
                                state: RecordState::Pending,
                            });
                            let ctx = Arc::clone(&ctx);
                            let token = run_token.child_token();
                            tasks.spawn(async move {
                                let outcome = run_record_task(ctx, record, token).await;
                                drop(permit);
                                outcome
                            });
                        }
                    }
                }
            }
        }

        // In-flight records observe the cancelled token and finish promptly
        while let Some(joined) = tasks.join_next().await {
            if let Some(error) = collect_outcome(&mut result, joined) {
                fatal.get_or_insert(error);
            }
        }

        result.finished_at = Utc::now();

        if let Some(error) = fatal {
            return Err(error);
        }

        if run_token.is_cancelled() {
            tracing::warn!(
                category = %category,
                succeeded = result.succeeded.len(),
                failed = result.failed.len(),
                "ingestion run cancelled, returning partial result"
            );
        } else {
            tracing::info!(
                category = %category,
                succeeded = result.succeeded.len(),
                failed = result.failed.len(),
                "ingestion run finished"
            );
        }

        self.emit_event(Event::RunFinished {
            category,
            succeeded: result.succeeded.len(),
            failed: result.failed.len(),
        });

        Ok(result)
    }
}

/// Record a finished task in the result
///
/// A fatal failure is handed back instead of recorded, since it aborts the run.
fn collect_outcome(
    result: &mut BatchResult,
    joined: std::result::Result<RecordOutcome, tokio::task::JoinError>,
) -> Option<Error> {
    match joined {
        Ok(RecordOutcome::Uploaded(uploaded)) => {
            result.succeeded.push(uploaded);
            None
        }
        Ok(RecordOutcome::Failed(failed)) if failed.error.is_fatal() => Some(failed.error),
        Ok(RecordOutcome::Failed(failed)) => {
            result.failed.push(failed);
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "record task panicked or was aborted");
            None
        }
    }
}
