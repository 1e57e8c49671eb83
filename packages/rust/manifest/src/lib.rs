//! Event manifest retrieval and year selection.
//!
//! The manifest is a single remote JSON document listing every recorded event
//! grouped by year. Each pipeline run fetches it once, then keeps only the
//! requested year's entries.

mod cache;
mod parser;

use std::sync::Arc;
use std::time::Duration;

use gamma_events_shared::{EventRecord, EventsError, PipelineConfig, Result, Year};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use cache::ManifestCache;

pub use parser::{EventManifest, YearSummary, parse_manifest};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum manifest size we accept (10 MB).
const MAX_MANIFEST_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for all pipeline requests.
const USER_AGENT: &str = concat!("gamma-events/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the manifest fetcher and content enricher.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| EventsError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// ManifestFetcher
// ---------------------------------------------------------------------------

/// Retrieves the manifest and selects a year from it.
#[derive(Debug)]
pub struct ManifestFetcher {
    client: Client,
    url: Url,
    cache: Option<ManifestCache>,
}

impl ManifestFetcher {
    /// Create a fetcher for the manifest URL in `config`.
    pub fn new(client: Client, config: &PipelineConfig) -> Self {
        Self {
            client,
            url: config.manifest_url.clone(),
            cache: config.manifest_ttl.map(ManifestCache::new),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Retrieve and parse the whole manifest.
    ///
    /// Performs one GET unless a cache TTL is configured and a fresh copy is held.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn fetch_manifest(&self) -> Result<Arc<EventManifest>> {
        if let Some(cache) = &self.cache {
            if let Some(manifest) = cache.get().await {
                debug!("manifest served from cache");
                return Ok(manifest);
            }
        }

        let body = fetch_body(&self.client, &self.url).await?;
        let manifest = Arc::new(parse_manifest(&body)?);

        info!(years = manifest.len(), "manifest fetched");

        if let Some(cache) = &self.cache {
            cache.put(Arc::clone(&manifest)).await;
        }

        Ok(manifest)
    }

    /// Events recorded for `year`, in manifest order. Empty when the year is absent.
    #[instrument(skip_all, fields(year = %year))]
    pub async fn fetch_year(&self, year: &Year) -> Result<Vec<EventRecord>> {
        let manifest = self.fetch_manifest().await?;
        let events = manifest.year(year)?;
        debug!(count = events.len(), "year selected");
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn fetch_body(client: &Client, url: &Url) -> Result<String> {
    debug!(%url, "fetching manifest");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| EventsError::manifest_fetch(url.as_str(), e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EventsError::manifest_fetch(
            url.as_str(),
            format!("HTTP {status}"),
        ));
    }

    if let Some(len) = response.content_length() {
        ensure_within_limit(url, len)?;
    }

    let body = response.text().await.map_err(|e| {
        EventsError::manifest_fetch(url.as_str(), format!("failed to read body: {e}"))
    })?;

    // Chunked responses carry no Content-Length.
    ensure_within_limit(url, body.len() as u64)?;

    Ok(body)
}

fn ensure_within_limit(url: &Url, len: u64) -> Result<()> {
    if len > MAX_MANIFEST_SIZE {
        return Err(EventsError::manifest_fetch(
            url.as_str(),
            format!("response too large ({len} bytes, max {MAX_MANIFEST_SIZE})"),
        ));
    }
    Ok(())
}
