//! Shared types, error model, and configuration for gamma-events.
//!
//! This crate is the foundation depended on by all other gamma-events crates.
//! It provides:
//! - [`EventsError`]: the unified error type
//! - Domain types ([`Year`], [`EventRecord`], [`EnrichedEventRecord`], [`PipelineState`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, EnrichmentConfig, FailurePolicy, FetchConfig, PipelineConfig,
    SourcesConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EventsError, Result};
pub use types::{
    EnrichedEventRecord, EventRecord, PipelineSnapshot, PipelineState, RunId, Year,
    derive_filename,
};
