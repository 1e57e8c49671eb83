//! Year-indexed manifest parser.
//!
//! The manifest is a JSON object whose keys are years and whose values are
//! arrays of event objects:
//!
//! ```json
//! { "2023": [ { "title": "Intro Talk", "date": "2023-08-01" } ] }
//! ```
//!
//! Only the top-level shape is checked up front. Each year's entries are
//! decoded when that year is requested.

use gamma_events_shared::{EventRecord, EventsError, Result, Year};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed manifest: year key to its raw entry list.
#[derive(Debug, Clone, Default)]
pub struct EventManifest {
    years: Map<String, Value>,
}

/// A year present in the manifest and how many entries it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSummary {
    pub year: Year,
    pub event_count: usize,
}

impl EventManifest {
    /// Events recorded for `year`, in manifest order.
    ///
    /// An absent key or a `null` value is a year with no events.
    pub fn year(&self, year: &Year) -> Result<Vec<EventRecord>> {
        match self.years.get(year.as_str()) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(entries @ Value::Array(_)) => serde_json::from_value(entries.clone())
                .map_err(|e| EventsError::manifest_parse(format!("year {year}: {e}"))),
            Some(other) => Err(EventsError::manifest_parse(format!(
                "year {year}: expected an array of events, found {}",
                kind(other)
            ))),
        }
    }

    /// All years in key order with their entry counts.
    pub fn years(&self) -> Vec<YearSummary> {
        self.years
            .iter()
            .map(|(key, entries)| YearSummary {
                year: Year::new(key.as_str()),
                event_count: entries.as_array().map_or(0, Vec::len),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a manifest body.
pub fn parse_manifest(body: &str) -> Result<EventManifest> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| EventsError::manifest_parse(format!("invalid JSON: {e}")))?;

    match value {
        Value::Object(years) => Ok(EventManifest { years }),
        other => Err(EventsError::manifest_parse(format!(
            "expected an object keyed by year, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
