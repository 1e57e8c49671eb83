//! Core domain types for the events pipeline.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extension appended to filenames derived from an event title.
const CONTENT_EXTENSION: &str = ".md";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// ---------------------------------------------------------------------------
// Year
// ---------------------------------------------------------------------------

/// Key into the event manifest. Opaque: no format validation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(String);

impl Year {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Year {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for Year {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for Year {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<u32> for Year {
    fn from(key: u32) -> Self {
        Self(key.to_string())
    }
}

impl From<i32> for Year {
    fn from(key: i32) -> Self {
        Self(key.to_string())
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifying one pipeline run in logs (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// Derive the canonical content filename for an event title.
///
/// The title is lower-cased, every run of whitespace becomes a single `_`,
/// and `.md` is appended. The remote content store is keyed by this exact name.
pub fn derive_filename(title: &str) -> String {
    let joined = WHITESPACE_RUN.replace_all(title, "_");
    format!("{}{CONTENT_EXTENSION}", joined.to_lowercase())
}

/// One event entry as it appears in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Display title; also the source of the derived content filename.
    pub title: String,

    /// Explicit content filename, overriding the derived one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Remaining descriptive attributes (date, location, ...), passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventRecord {
    /// Create a record with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            filename: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The filename of this record's companion document.
    ///
    /// An empty explicit `filename` counts as absent.
    pub fn content_filename(&self) -> String {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => derive_filename(&self.title),
        }
    }
}

/// An [`EventRecord`] with its companion document attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEventRecord {
    #[serde(flatten)]
    pub record: EventRecord,

    /// Raw text of the companion document. `None` only when the partial
    /// failure policy kept a record whose retrieval failed.
    pub content: Option<String>,
}

impl EnrichedEventRecord {
    /// Attach `content`. A manifest-supplied `content` attribute is dropped so
    /// the retrieved text is the only `content` key when serialized.
    pub fn new(mut record: EventRecord, content: Option<String>) -> Self {
        record.extra.remove("content");
        Self { record, content }
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Renderer-visible status of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PipelineState {
    /// A run is in flight.
    #[default]
    Loading,
    /// The run succeeded with at least one record.
    Ready(Vec<EnrichedEventRecord>),
    /// No events for the year, or the run failed.
    Empty,
}

impl PipelineState {
    /// `Ready` for a non-empty collection, `Empty` otherwise.
    pub fn from_records(records: Vec<EnrichedEventRecord>) -> Self {
        if records.is_empty() {
            Self::Empty
        } else {
            Self::Ready(records)
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Records when `Ready`, an empty slice otherwise.
    pub fn records(&self) -> &[EnrichedEventRecord] {
        match self {
            Self::Ready(records) => records,
            _ => &[],
        }
    }
}

/// What subscribers observe: the state plus the request that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSnapshot {
    /// Incremented on every request; 0 before the first one.
    pub generation: u64,
    /// Year of the request this state belongs to.
    pub year: Option<Year>,
    pub state: PipelineState,
}

impl PipelineSnapshot {
    /// Whether the run for this generation has finished.
    pub fn is_settled(&self) -> bool {
        !self.state.is_loading()
    }
}
