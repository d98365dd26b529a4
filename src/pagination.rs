//! Pagination over the keyword search
//!
//! The search service returns one page at a time with a `Truncated` flag. A
//! [`Paginator`] re-issues the query with an advancing offset until the
//! service reports a final page, the caller's record limit is reached, or the
//! page ceiling is hit. Records are de-duplicated by id across pages.

use crate::client::RecordSearch;
use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::retry::with_retry;
use crate::types::{Category, Event, Record};
use futures::Stream;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Paging limits and the retry policy applied to each page request
#[derive(Clone, Debug)]
pub struct PaginationSettings {
    /// `QueryLimit` sent with each request (0 = no explicit cap)
    pub page_size: u32,
    /// Pages fetched before giving up regardless of `Truncated`
    pub max_pages: usize,
    /// Backoff for transient search failures
    pub retry: RetryConfig,
}

impl PaginationSettings {
    /// Take the paging settings from the pipeline configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.pipeline.page_size,
            max_pages: config.pipeline.max_pages,
            retry: config.retry.clone(),
        }
    }
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives a search across pages
pub struct Paginator {
    search: Arc<dyn RecordSearch>,
    category: Category,
    keywords: Vec<String>,
    max_records: usize,
    settings: PaginationSettings,
    events: Option<broadcast::Sender<Event>>,
}

impl Paginator {
    /// Create a paginator
    ///
    /// `max_records = 0` means unbounded.
    pub fn new(
        search: Arc<dyn RecordSearch>,
        category: Category,
        keywords: Vec<String>,
        max_records: usize,
        settings: PaginationSettings,
    ) -> Self {
        Self {
            search,
            category,
            keywords,
            max_records,
            settings,
            events: None,
        }
    }

    /// Emit a [`Event::PageFetched`] for every page received
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Consume the paginator into a lazy stream of records
    ///
    /// Pages are requested only as the stream is polled. A search failure
    /// that survives the retry policy is yielded once as `Err` and ends the
    /// stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send {
        let state = PageState {
            paginator: self,
            offset: 0,
            pages_fetched: 0,
            yielded: 0,
            seen: HashSet::new(),
            buffer: VecDeque::new(),
            exhausted: false,
        };
        futures::stream::unfold(state, |mut state| async move {
            let item = state.next_record().await;
            item.map(|item| (item, state))
        })
    }
}

struct PageState {
    paginator: Paginator,
    offset: usize,
    pages_fetched: usize,
    yielded: usize,
    seen: HashSet<String>,
    buffer: VecDeque<Record>,
    exhausted: bool,
}

impl PageState {
    async fn next_record(&mut self) -> Option<Result<Record>> {
        loop {
            let max_records = self.paginator.max_records;
            if max_records > 0 && self.yielded >= max_records {
                return None;
            }

            if let Some(record) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(record));
            }

            if self.exhausted {
                return None;
            }

            if self.pages_fetched >= self.paginator.settings.max_pages {
                tracing::warn!(
                    category = %self.paginator.category,
                    pages = self.pages_fetched,
                    "page ceiling reached while results were still truncated"
                );
                self.exhausted = true;
                return None;
            }

            if let Err(e) = self.fetch_page().await {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let paginator = &self.paginator;
        let search = &paginator.search;
        let keywords = paginator.keywords.as_slice();
        let category = paginator.category;
        let limit = paginator.settings.page_size;
        let offset = self.offset;

        let page = with_retry(&paginator.settings.retry, move || {
            search.search(category, keywords, limit, offset)
        })
        .await?;

        self.pages_fetched += 1;
        let raw_count = page.records.len();

        if let Some(events) = &paginator.events {
            events
                .send(Event::PageFetched {
                    category,
                    offset,
                    records: raw_count,
                    truncated: page.truncated,
                })
                .ok();
        }

        let mut duplicates = 0;
        for record in page.records {
            if self.seen.insert(record.id.clone()) {
                self.buffer.push_back(record);
            } else {
                duplicates += 1;
            }
        }

        tracing::debug!(
            category = %category,
            offset,
            records = raw_count,
            duplicates,
            truncated = page.truncated,
            "page processed"
        );

        self.offset += raw_count;

        // A truncated empty page would repeat the same offset forever
        if !page.truncated || raw_count == 0 {
            self.exhausted = true;
        }

        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::RecordPage;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            name: format!("Doc {}", id),
            display_type: "PDF".to_string(),
            columns: vec![],
        }
    }

    fn page(ids: &[&str], truncated: bool) -> RecordPage {
        RecordPage {
            records: ids.iter().map(|id| record(id)).collect(),
            truncated,
            display_columns: vec![],
        }
    }

    fn settings(max_pages: usize) -> PaginationSettings {
        PaginationSettings {
            page_size: 0,
            max_pages,
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
                jitter: false,
            },
        }
    }

    /// Replays scripted responses and records the offsets it was asked for
    struct ScriptedSearch {
        responses: Mutex<VecDeque<Result<RecordPage>>>,
        offsets: Mutex<Vec<usize>>,
    }

    impl ScriptedSearch {
        fn new(responses: Vec<Result<RecordPage>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                offsets: Mutex::new(Vec::new()),
            })
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSearch for ScriptedSearch {
        async fn search(
            &self,
            _category: Category,
            _keywords: &[String],
            _limit: u32,
            offset: usize,
        ) -> Result<RecordPage> {
            self.offsets.lock().unwrap().push(offset);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(page(&[], false)))
        }
    }

    /// Always reports more pages, with fresh ids at every offset
    struct EndlessSearch {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl RecordSearch for EndlessSearch {
        async fn search(
            &self,
            _category: Category,
            _keywords: &[String],
            _limit: u32,
            offset: usize,
        ) -> Result<RecordPage> {
            *self.calls.lock().unwrap() += 1;
            let ids = [format!("E{}", offset), format!("E{}", offset + 1)];
            Ok(RecordPage {
                records: ids.iter().map(|id| record(id)).collect(),
                truncated: true,
                display_columns: vec![],
            })
        }
    }

    async fn collect_ids(paginator: Paginator) -> Vec<Result<String>> {
        paginator
            .into_stream()
            .map(|item| item.map(|r| r.id))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_single_final_page() {
        let search = ScriptedSearch::new(vec![Ok(page(&["R1", "R2", "R3"], false))]);
        let paginator = Paginator::new(
            search.clone(),
            Category::Communications,
            vec![],
            0,
            settings(10),
        );

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(ids, vec!["R1", "R2", "R3"]);
        assert_eq!(search.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_offset_advances_by_raw_page_size() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["R1", "R2"], true)),
            // R2 repeats; the offset still counts it
            Ok(page(&["R2", "R3", "R4"], true)),
            Ok(page(&["R5"], false)),
        ]);
        let paginator = Paginator::new(search.clone(), Category::Minutes, vec![], 0, settings(10));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(ids, vec!["R1", "R2", "R3", "R4", "R5"]);
        assert_eq!(search.offsets(), vec![0, 2, 5]);
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_yield_once() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["A", "B"], true)),
            Ok(page(&["B", "A", "C"], true)),
            Ok(page(&["C", "D", "A"], false)),
        ]);
        let paginator = Paginator::new(search, Category::Contracts, vec![], 0, settings(10));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_max_records_stops_before_next_page() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["R1", "R2", "R3"], true)),
            Ok(page(&["R4", "R5"], false)),
        ]);
        let paginator =
            Paginator::new(search.clone(), Category::Ordinances, vec![], 2, settings(10));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(ids, vec!["R1", "R2"]);
        assert_eq!(search.offsets(), vec![0], "second page must not be requested");
    }

    #[tokio::test]
    async fn test_endless_truncation_stops_at_page_ceiling() {
        let search = Arc::new(EndlessSearch {
            calls: Mutex::new(0),
        });
        let paginator = Paginator::new(search.clone(), Category::AllRecords, vec![], 0, settings(5));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(*search.calls.lock().unwrap(), 5);
        assert_eq!(ids.len(), 10);
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn test_truncated_empty_page_ends_pagination() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["R1"], true)),
            Ok(page(&[], true)),
            Ok(page(&["never"], false)),
        ]);
        let paginator =
            Paginator::new(search.clone(), Category::Resolutions, vec![], 0, settings(10));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(ids, vec!["R1"]);
        assert_eq!(search.offsets(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_transient_search_failure_is_retried() {
        let search = ScriptedSearch::new(vec![
            Err(Error::BadStatus {
                url: "http://records.test/search".into(),
                status: 502,
                body: String::new(),
            }),
            Ok(page(&["R1"], false)),
        ]);
        let paginator = Paginator::new(search.clone(), Category::StaffReports, vec![], 0, settings(10));

        let ids: Vec<String> = collect_ids(paginator)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(ids, vec!["R1"]);
        assert_eq!(search.offsets(), vec![0, 0]);
    }

    #[tokio::test]
    async fn test_permanent_search_failure_ends_stream_with_error() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["R1"], true)),
            Err(Error::BadStatus {
                url: "http://records.test/search".into(),
                status: 400,
                body: "bad query".into(),
            }),
            Ok(page(&["R2"], false)),
        ]);
        let paginator = Paginator::new(search.clone(), Category::ElectionInfo, vec![], 0, settings(10));

        let items = collect_ids(paginator).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "R1");
        assert!(matches!(
            items[1],
            Err(Error::BadStatus { status: 400, .. })
        ));
        assert_eq!(search.offsets(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_page_events_are_emitted() {
        let search = ScriptedSearch::new(vec![
            Ok(page(&["R1", "R2"], true)),
            Ok(page(&["R3"], false)),
        ]);
        let (tx, mut rx) = broadcast::channel(16);
        let paginator = Paginator::new(search, Category::Minutes, vec![], 0, settings(10))
            .with_events(tx);

        let _ = collect_ids(paginator).await;

        let mut pages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::PageFetched {
                offset,
                records,
                truncated,
                ..
            } = event
            {
                pages.push((offset, records, truncated));
            }
        }
        assert_eq!(pages, vec![(0, 2, true), (2, 1, false)]);
    }
}
