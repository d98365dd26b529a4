//! Core types for records-ingest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Live byte stream of a document or of content handed to a sink
///
/// Whoever holds the stream owns the underlying connection; dropping it closes it.
pub type DocumentStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Document collection searched by a query
///
/// The discriminant is the `QueryID` understood by the search endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Every public record
    AllRecords = 127,
    /// Council communications
    Communications = 129,
    /// Contracts
    Contracts = 126,
    /// Election information
    ElectionInfo = 114,
    /// Meeting minutes
    Minutes = 131,
    /// Ordinances
    Ordinances = 132,
    /// Resolutions
    Resolutions = 133,
    /// Staff reports
    StaffReports = 134,
}

impl Category {
    /// All known categories
    pub const ALL: [Category; 8] = [
        Category::AllRecords,
        Category::Communications,
        Category::Contracts,
        Category::ElectionInfo,
        Category::Minutes,
        Category::Ordinances,
        Category::Resolutions,
        Category::StaffReports,
    ];

    /// The `QueryID` sent to the search endpoint
    pub fn query_id(&self) -> i32 {
        *self as i32
    }

    /// Canonical upper-case name (e.g. `STAFF_REPORTS`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AllRecords => "ALL_RECORDS",
            Category::Communications => "COMMUNICATIONS",
            Category::Contracts => "CONTRACTS",
            Category::ElectionInfo => "ELECTION_INFO",
            Category::Minutes => "MINUTES",
            Category::Ordinances => "ORDINANCES",
            Category::Resolutions => "RESOLUTIONS",
            Category::StaffReports => "STAFF_REPORTS",
        }
    }
}

impl TryFrom<i32> for Category {
    type Error = Error;

    fn try_from(query_id: i32) -> Result<Self, Self::Error> {
        Category::ALL
            .into_iter()
            .find(|c| c.query_id() == query_id)
            .ok_or(Error::InvalidCategory(query_id))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        if let Some(category) = Category::ALL.into_iter().find(|c| c.as_str() == wanted) {
            return Ok(category);
        }
        match wanted.parse::<i32>() {
            Ok(query_id) => Category::try_from(query_id),
            Err(_) => Err(Error::Config {
                message: format!("unknown category name '{}'", s),
                key: None,
            }),
        }
    }
}

/// Schema metadata for one column of a result set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayColumn {
    /// Column heading
    #[serde(default)]
    pub heading: String,
    /// Upstream data type name
    #[serde(default)]
    pub data_type: String,
}

/// Formatted and raw value of one column for one record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayColumnValue {
    /// Formatted value
    #[serde(default)]
    pub value: String,
    /// Raw value
    #[serde(default)]
    pub raw_value: String,
}

/// One matched item from the search service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    /// Stable record id, unique within a query
    #[serde(rename = "ID", alias = "Id", alias = "id")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Display type reported by the service
    #[serde(default)]
    pub display_type: String,
    /// Column values, parallel to [`RecordPage::display_columns`]
    #[serde(rename = "DisplayColumnValues", default)]
    pub columns: Vec<DisplayColumnValue>,
}

impl Record {
    /// Name used when handing the extracted text to the upload sink
    ///
    /// The record id is embedded so names stay distinct even when two records
    /// share a display name.
    pub fn upload_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            format!("{}.txt", self.id)
        } else {
            format!("{} ({}).txt", name, self.id)
        }
    }
}

/// One page of search results
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page, in service order
    #[serde(rename = "Data", default)]
    pub records: Vec<Record>,
    /// More pages exist; re-query with an advanced offset
    #[serde(rename = "Truncated", default)]
    pub truncated: bool,
    /// Column schema for `Record::columns`
    #[serde(rename = "DisplayColumns", default)]
    pub display_columns: Vec<DisplayColumn>,
}

/// Plain text extracted from a record's document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Source record id
    pub record_id: String,
    /// Trimmed text output of the converter
    pub text: String,
}

/// Pipeline stage a record failure is attributed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Downloading the document, including transfer errors on the body
    /// while it streams into the converter
    Fetching,
    /// Converting the document to text
    Extracting,
    /// Handing the text to the upload sink
    Uploading,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Fetching => "Fetching",
            Stage::Extracting => "Extracting",
            Stage::Uploading => "Uploading",
        };
        f.write_str(s)
    }
}

/// Per-record processing state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Yielded by the paginator, waiting for a worker
    Pending,
    /// Document download in progress
    Fetching,
    /// Conversion in progress
    Extracting,
    /// Upload in progress
    Uploading,
    /// Uploaded successfully
    Done,
    /// Failed at some stage
    Failed,
}

impl RecordState {
    /// `Done` and `Failed` never transition further
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordState::Done | RecordState::Failed)
    }
}

impl From<Stage> for RecordState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Fetching => RecordState::Fetching,
            Stage::Extracting => RecordState::Extracting,
            Stage::Uploading => RecordState::Uploading,
        }
    }
}

/// A record whose text reached the upload sink
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedRecord {
    /// Source record id
    pub record_id: String,
    /// Name passed to the sink
    pub name: String,
    /// Identifier returned by the sink
    pub remote_id: String,
}

/// A record that failed, with the stage and error responsible
#[derive(Debug)]
pub struct FailedRecord {
    /// Source record id
    pub record_id: String,
    /// Stage that failed
    pub stage: Stage,
    /// The error
    pub error: Error,
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct BatchResult {
    /// Uploaded records, unordered
    pub succeeded: Vec<UploadedRecord>,
    /// Failed records, unordered; each failure appears exactly once
    pub failed: Vec<FailedRecord>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    /// Number of records that reached a terminal state
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when every processed record was uploaded
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Event emitted during a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A search page was received
    PageFetched {
        /// Category searched
        category: Category,
        /// Offset the page was requested at
        offset: usize,
        /// Records on the page (before de-duplication)
        records: usize,
        /// Whether the service reported more pages
        truncated: bool,
    },
    /// A record moved to a new state
    RecordStateChanged {
        /// Record id
        record_id: String,
        /// New state
        state: RecordState,
    },
    /// A record was uploaded
    RecordCompleted {
        /// Record id
        record_id: String,
        /// Identifier returned by the sink
        remote_id: String,
    },
    /// A record failed
    RecordFailed {
        /// Record id
        record_id: String,
        /// Stage that failed
        stage: Stage,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },
    /// The run ended
    RunFinished {
        /// Category searched
        category: Category,
        /// Uploaded count
        succeeded: usize,
        /// Failed count
        failed: usize,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_query_ids_match_service_enumerants() {
        assert_eq!(Category::AllRecords.query_id(), 127);
        assert_eq!(Category::Communications.query_id(), 129);
        assert_eq!(Category::Contracts.query_id(), 126);
        assert_eq!(Category::ElectionInfo.query_id(), 114);
        assert_eq!(Category::Minutes.query_id(), 131);
        assert_eq!(Category::Ordinances.query_id(), 132);
        assert_eq!(Category::Resolutions.query_id(), 133);
        assert_eq!(Category::StaffReports.query_id(), 134);
    }

    #[test]
    fn category_try_from_rejects_unknown_ids() {
        assert_eq!(Category::try_from(131).unwrap(), Category::Minutes);
        assert!(matches!(
            Category::try_from(128),
            Err(Error::InvalidCategory(128))
        ));
    }

    #[test]
    fn category_parses_names_and_ids() {
        assert_eq!(
            "STAFF_REPORTS".parse::<Category>().unwrap(),
            Category::StaffReports
        );
        assert_eq!(
            "election-info".parse::<Category>().unwrap(),
            Category::ElectionInfo
        );
        assert_eq!("129".parse::<Category>().unwrap(), Category::Communications);
        assert!("parking".parse::<Category>().is_err());
    }

    #[test]
    fn category_display_round_trips_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn record_page_decodes_service_payload() {
        let json = r#"{
            "Data": [
                {
                    "ID": "abc-1",
                    "Name": "Council Minutes 2024-01-09",
                    "DisplayType": "PDF",
                    "DisplayColumnValues": [{"Value": "1/9/2024", "RawValue": "2024-01-09T00:00:00"}]
                },
                {"ID": "abc-2"}
            ],
            "Truncated": true,
            "DisplayColumns": [{"Heading": "Meeting Date", "DataType": "Date"}]
        }"#;

        let page: RecordPage = serde_json::from_str(json).unwrap();
        assert!(page.truncated);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, "abc-1");
        assert_eq!(page.records[0].display_type, "PDF");
        assert_eq!(page.records[0].columns[0].raw_value, "2024-01-09T00:00:00");
        assert_eq!(page.records[1].name, "");
        assert!(page.records[1].columns.is_empty());
        assert_eq!(page.display_columns[0].heading, "Meeting Date");
    }

    #[test]
    fn record_without_id_fails_to_decode() {
        let json = r#"{"Data": [{"Name": "orphan"}], "Truncated": false}"#;
        assert!(serde_json::from_str::<RecordPage>(json).is_err());
    }

    #[test]
    fn empty_object_is_a_final_empty_page() {
        let page: RecordPage = serde_json::from_str("{}").unwrap();
        assert!(page.records.is_empty());
        assert!(!page.truncated);
    }

    #[test]
    fn upload_name_embeds_record_id() {
        let record = Record {
            id: "R1".into(),
            name: "  Budget Memo ".into(),
            display_type: String::new(),
            columns: vec![],
        };
        assert_eq!(record.upload_name(), "Budget Memo (R1).txt");

        let unnamed = Record {
            name: String::new(),
            ..record
        };
        assert_eq!(unnamed.upload_name(), "R1.txt");
    }

    #[test]
    fn terminal_states() {
        assert!(RecordState::Done.is_terminal());
        assert!(RecordState::Failed.is_terminal());
        assert!(!RecordState::Pending.is_terminal());
        assert!(!RecordState::from(Stage::Uploading).is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::RecordFailed {
            record_id: "R2".into(),
            stage: Stage::Extracting,
            code: "converter_exit".into(),
            error: "converter exited with status 1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "record_failed");
        assert_eq!(json["stage"], "Extracting");
    }
}
