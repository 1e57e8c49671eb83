//! Text and JSON rendering of pipeline states.

use std::io::{self, Write};

use gamma_events_shared::{EnrichedEventRecord, PipelineState, Year};

/// Message shown while a run is in flight.
pub(crate) fn loading_message(year: &Year) -> String {
    format!("Loading events for {year}...")
}

/// Render a state as a human-readable listing.
pub(crate) fn render_text(year: &Year, state: &PipelineState, out: &mut impl Write) -> io::Result<()> {
    match state {
        PipelineState::Loading => writeln!(out, "{}", loading_message(year)),
        PipelineState::Empty => writeln!(out, "No events found for the year {year}."),
        PipelineState::Ready(records) => {
            writeln!(out, "Events {year}")?;
            for record in records {
                writeln!(out)?;
                render_record(record, out)?;
            }
            Ok(())
        }
    }
}

/// Render a state for an interactive session and flush it to the terminal.
pub(crate) fn render_update(year: &Year, state: &PipelineState, out: &mut impl Write) -> io::Result<()> {
    render_text(year, state, out)?;
    out.flush()
}

fn render_record(record: &EnrichedEventRecord, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "## {}", record.title())?;

    // Only scalar attributes are shown; nested values stay in the JSON output.
    for (key, value) in &record.record.extra {
        let shown = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        writeln!(out, "  {key}: {shown}")?;
    }

    match &record.content {
        Some(content) => {
            writeln!(out)?;
            for line in content.trim_end().lines() {
                writeln!(out, "  {line}")?;
            }
        }
        None => writeln!(out, "  (content unavailable)")?,
    }

    Ok(())
}

/// Render a state as a JSON array of enriched records (`[]` unless Ready).
pub(crate) fn render_json(state: &PipelineState, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, state.records())?;
    writeln!(out)
}
