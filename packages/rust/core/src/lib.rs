//! Events pipeline orchestration for gamma-events.
//!
//! This crate ties the manifest fetcher and the content enricher together
//! into the per-year pipeline the renderer subscribes to.

pub mod enricher;
pub mod pipeline;

pub use enricher::ContentEnricher;
pub use pipeline::{DiagnosticSink, EventsPipeline, TracingSink, load_year};
