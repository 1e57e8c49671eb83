//! Per-year events pipeline: manifest → enrichment → state hand-off.
//!
//! [`EventsPipeline`] owns a `watch` channel of [`PipelineSnapshot`]s. Every
//! request bumps the generation and publishes `Loading` in one step, then
//! spawns a run. A run may only publish its result while its generation is
//! still current, so a superseded run can never overwrite a newer request.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, instrument};

use gamma_events_manifest::{ManifestFetcher, build_client};
use gamma_events_shared::{
    EnrichedEventRecord, EventsError, PipelineConfig, PipelineSnapshot, PipelineState, Result,
    RunId, Year,
};

use crate::enricher::ContentEnricher;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Receives the failures that the pipeline collapses into `Empty`.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, year: &Year, error: &EventsError);
}

/// Default sink: one `error!` event per failed run.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, year: &Year, error: &EventsError) {
        error!(%year, error = %error, "events pipeline failed");
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Run both stages for `year` with typed errors.
///
/// An empty year short-circuits: no content is requested.
#[instrument(skip_all, fields(year = %year))]
pub async fn load_year(
    fetcher: &ManifestFetcher,
    enricher: &ContentEnricher,
    year: &Year,
) -> Result<Vec<EnrichedEventRecord>> {
    let records = fetcher.fetch_year(year).await?;

    if records.is_empty() {
        debug!("no events recorded for year");
        return Ok(Vec::new());
    }

    enricher.enrich(records).await
}

// ---------------------------------------------------------------------------
// EventsPipeline
// ---------------------------------------------------------------------------

struct Shared {
    fetcher: ManifestFetcher,
    enricher: ContentEnricher,
    sink: Arc<dyn DiagnosticSink>,
    state: watch::Sender<PipelineSnapshot>,
}

impl Shared {
    async fn execute(&self, generation: u64, year: Year) {
        let run_id = RunId::new();
        let span = info_span!("pipeline_run", %run_id, generation, %year);

        let outcome = load_year(&self.fetcher, &self.enricher, &year)
            .instrument(span)
            .await;

        self.settle(generation, &year, outcome);
    }

    /// Commit the outcome of a run; a failure is reported only once it has
    /// been published as this generation's `Empty`.
    fn settle(&self, generation: u64, year: &Year, outcome: Result<Vec<EnrichedEventRecord>>) {
        let (state, failure) = match outcome {
            Ok(records) => {
                let count = records.len();
                (PipelineState::from_records(records), Ok(count))
            }
            Err(e) => (PipelineState::Empty, Err(e)),
        };

        if !self.commit(generation, state) {
            debug!(generation, %year, "run superseded, discarding result");
            return;
        }

        match failure {
            Ok(count) => info!(%year, count, "events ready"),
            Err(e) => self.sink.report(year, &e),
        }
    }

    /// Publish `state` if `generation` is still the latest request.
    fn commit(&self, generation: u64, state: PipelineState) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            snapshot.state = state;
            true
        })
    }
}

/// Cancel-and-restart state machine over the two pipeline stages.
pub struct EventsPipeline {
    shared: Arc<Shared>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl EventsPipeline {
    /// Build a pipeline with one HTTP client shared by both stages.
    pub fn new(config: &PipelineConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let client = build_client(config.timeout)?;
        let fetcher = ManifestFetcher::new(client.clone(), config);
        let enricher = ContentEnricher::new(client, config);
        Ok(Self::from_parts(fetcher, enricher, sink))
    }

    pub fn from_parts(
        fetcher: ManifestFetcher,
        enricher: ContentEnricher,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                fetcher,
                enricher,
                sink,
                state,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Start a run for `year`, superseding any run in flight.
    ///
    /// Publishes `Loading` before returning. Returns the new generation.
    /// Must be called from within a tokio runtime.
    pub fn request(&self, year: impl Into<Year>) -> u64 {
        let year = year.into();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let mut generation = 0;
        self.shared.state.send_modify(|snapshot| {
            generation = snapshot.generation + 1;
            *snapshot = PipelineSnapshot {
                generation,
                year: Some(year.clone()),
                state: PipelineState::Loading,
            };
        });

        debug!(generation, %year, "pipeline requested");

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { shared.execute(generation, year).await });

        if let Some(previous) = in_flight.replace(handle) {
            previous.abort();
        }

        generation
    }

    /// Request `year` and wait for its outcome.
    ///
    /// If another request supersedes this one first, waits for the newest
    /// request to settle and returns its state. Never returns `Loading`.
    pub async fn run(&self, year: impl Into<Year>) -> PipelineState {
        let mut updates = self.subscribe();
        let generation = self.request(year);

        let settled = updates
            .wait_for(|snapshot| snapshot.generation >= generation && snapshot.is_settled())
            .await;

        match settled {
            Ok(snapshot) => snapshot.state.clone(),
            // The sender lives in `self`, so this is unreachable while we hold `&self`.
            Err(_) => PipelineState::Empty,
        }
    }
}

impl Drop for EventsPipeline {
    fn drop(&mut self) {
        let in_flight = self.in_flight.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = in_flight.take() {
            handle.abort();
        }
    }
}
