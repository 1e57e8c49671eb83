//! Concurrent content enrichment.
//!
//! Every selected event has a companion text document stored under the
//! content base URL. All documents are requested at once; the batch resolves
//! only after every request has settled, and results are placed back by input
//! index so the output order never depends on completion order.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use gamma_events_shared::{
    EnrichedEventRecord, EventRecord, EventsError, FailurePolicy, PipelineConfig, Result,
};

/// Attaches companion documents to event records.
#[derive(Debug, Clone)]
pub struct ContentEnricher {
    client: Client,
    base_url: Url,
    /// Caps in-flight requests; `None` is unbounded fan-out.
    limit: Option<Arc<Semaphore>>,
    policy: FailurePolicy,
}

impl ContentEnricher {
    pub fn new(client: Client, config: &PipelineConfig) -> Self {
        Self {
            client,
            base_url: config.content_base_url.clone(),
            limit: config
                .max_concurrent
                .map(|permits| Arc::new(Semaphore::new(permits.max(1)))),
            policy: config.failure_policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Location of the document named `filename`.
    ///
    /// The filename is appended as path segments under the base, so it can
    /// never replace the base's scheme, host or path.
    pub fn content_url(&self, filename: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                EventsError::content_fetch(filename, "content base URL cannot hold a path")
            })?
            .pop_if_empty()
            .extend(filename.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Fetch every record's document and attach it, preserving input order.
    ///
    /// With [`FailurePolicy::AllOrNothing`] a single failed retrieval fails the
    /// whole batch (after all retrievals have settled), returning the error of
    /// the first failing record in input order. With [`FailurePolicy::Partial`]
    /// failed records are kept with `content: None`.
    ///
    /// Dropping the returned future aborts all in-flight retrievals.
    #[instrument(skip_all, fields(records = records.len(), policy = ?self.policy))]
    pub async fn enrich(&self, records: Vec<EventRecord>) -> Result<Vec<EnrichedEventRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let filenames: Vec<String> = records.iter().map(EventRecord::content_filename).collect();
        let mut tasks = JoinSet::new();

        for (index, filename) in filenames.iter().enumerate() {
            let client = self.client.clone();
            let url = self.content_url(filename);
            let limit = self.limit.clone();
            let filename = filename.clone();

            tasks.spawn(async move {
                let outcome = match url {
                    Ok(url) => fetch_limited(&client, &url, &filename, limit).await,
                    Err(e) => Err(e),
                };
                (index, outcome)
            });
        }

        let mut settled: Vec<Option<Result<String>>> = records.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => settled[index] = Some(outcome),
                Err(e) => warn!(error = %e, "content task did not complete"),
            }
        }

        let mut enriched = Vec::with_capacity(records.len());
        let mut failed = 0usize;

        for ((record, filename), outcome) in records.into_iter().zip(filenames).zip(settled) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(EventsError::content_fetch(&filename, "content task did not complete"))
            });

            match outcome {
                Ok(content) => enriched.push(EnrichedEventRecord::new(record, Some(content))),
                Err(e) => match self.policy {
                    FailurePolicy::AllOrNothing => {
                        debug!(%filename, "discarding batch after content failure");
                        return Err(e);
                    }
                    FailurePolicy::Partial => {
                        warn!(%filename, error = %e, "content unavailable, keeping record without it");
                        failed += 1;
                        enriched.push(EnrichedEventRecord::new(record, None));
                    }
                },
            }
        }

        info!(
            enriched = enriched.len() - failed,
            failed,
            "enrichment completed"
        );

        Ok(enriched)
    }
}

// ---------------------------------------------------------------------------
// Content fetching
// ---------------------------------------------------------------------------

async fn fetch_limited(
    client: &Client,
    url: &Url,
    filename: &str,
    limit: Option<Arc<Semaphore>>,
) -> Result<String> {
    let _permit = match limit {
        Some(semaphore) => Some(
            semaphore
                .acquire_owned()
                .await
                .map_err(|e| EventsError::content_fetch(filename, e.to_string()))?,
        ),
        None => None,
    };

    fetch_content(client, url, filename).await
}

/// Fetch a single document as opaque text.
async fn fetch_content(client: &Client, url: &Url, filename: &str) -> Result<String> {
    debug!(%url, "fetching content");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| EventsError::content_fetch(filename, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EventsError::content_fetch(filename, format!("HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| EventsError::content_fetch(filename, format!("failed to read body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> PipelineConfig {
        let manifest_url = Url::parse(&format!("{}/events.json", server.uri())).unwrap();
        let content_url = Url::parse(&format!("{}/markdowns", server.uri())).unwrap();
        PipelineConfig::new(manifest_url, content_url)
    }

    fn enricher_with(config: &PipelineConfig) -> ContentEnricher {
        let client = gamma_events_manifest::build_client(config.timeout).unwrap();
        ContentEnricher::new(client, config)
    }

    fn enricher_for(
        server: &MockServer,
        policy: FailurePolicy,
        max_concurrent: Option<usize>,
    ) -> ContentEnricher {
        let mut config = config_for(server);
        config.failure_policy = policy;
        config.max_concurrent = max_concurrent;
        enricher_with(&config)
    }

    async fn mount_content(server: &MockServer, filename: &str, body: &str, delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/markdowns/{filename}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn example_enricher() -> ContentEnricher {
        let config = PipelineConfig::new(
            Url::parse("https://example.com/JSON/events.json").unwrap(),
            Url::parse("https://example.com/JSON/markdowns").unwrap(),
        );
        enricher_with(&config)
    }

    #[test]
    fn content_url_joins_under_base() {
        let enricher = example_enricher();
        assert_eq!(
            enricher.content_url("hack_night.md").unwrap().as_str(),
            "https://example.com/JSON/markdowns/hack_night.md"
        );
    }

    #[test]
    fn content_url_stays_under_base() {
        let enricher = example_enricher();

        // A colon in the first segment must not be read as a scheme.
        let colon = EventRecord::new("Workshop: Git Basics").content_filename();
        assert_eq!(colon, "workshop:_git_basics.md");
        assert_eq!(
            enricher.content_url(&colon).unwrap().as_str(),
            "https://example.com/JSON/markdowns/workshop:_git_basics.md"
        );

        assert_eq!(
            enricher.content_url("/notes/intro.md").unwrap().as_str(),
            "https://example.com/JSON/markdowns/notes/intro.md"
        );
        assert_eq!(
            enricher.content_url("2023/recap.md").unwrap().as_str(),
            "https://example.com/JSON/markdowns/2023/recap.md"
        );

        let absolute = enricher.content_url("https://elsewhere.test/x.md").unwrap();
        assert_eq!(absolute.host_str(), Some("example.com"));
        assert!(absolute.path().starts_with("/JSON/markdowns/"));
    }

    #[tokio::test]
    async fn colon_title_is_fetched_under_base() {
        let server = MockServer::start().await;
        mount_content(&server, "workshop:_git_basics.md", "git 101", 0).await;

        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, None);
        let enriched = enricher
            .enrich(vec![EventRecord::new("Workshop: Git Basics")])
            .await
            .unwrap();

        assert_eq!(enriched[0].content.as_deref(), Some("git 101"));
    }

    #[tokio::test]
    async fn output_order_follows_input_not_completion() {
        let server = MockServer::start().await;

        // Completion order deliberately scrambled relative to input order.
        let delays = [120, 10, 80, 0, 60, 30];
        let titles = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];
        for (title, delay) in titles.iter().zip(delays) {
            let filename = format!("{}.md", title.to_lowercase());
            mount_content(&server, &filename, &format!("body of {title}"), delay).await;
        }

        let records: Vec<_> = titles.iter().map(|t| EventRecord::new(*t)).collect();
        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, None);
        let enriched = enricher.enrich(records).await.unwrap();

        assert_eq!(enriched.len(), titles.len());
        for (i, record) in enriched.iter().enumerate() {
            assert_eq!(record.title(), titles[i]);
            assert_eq!(record.content.as_deref(), Some(format!("body of {}", titles[i]).as_str()));
        }
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch_after_all_settle() {
        let server = MockServer::start().await;

        mount_content(&server, "a.md", "a", 150).await;
        mount_content(&server, "c.md", "c", 150).await;
        Mock::given(method("GET"))
            .and(path("/markdowns/b.md"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let records = vec![EventRecord::new("A"), EventRecord::new("B"), EventRecord::new("C")];
        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, None);

        let started = Instant::now();
        let err = enricher.enrich(records).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(150));
        match err {
            EventsError::ContentFetch { filename, message } => {
                assert_eq!(filename, "b.md");
                assert!(message.contains("404"));
            }
            other => panic!("expected ContentFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_policy_keeps_failed_records() {
        let server = MockServer::start().await;

        mount_content(&server, "a.md", "a", 0).await;
        Mock::given(method("GET"))
            .and(path("/markdowns/b.md"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let records = vec![EventRecord::new("A"), EventRecord::new("B")];
        let enricher = enricher_for(&server, FailurePolicy::Partial, None);
        let enriched = enricher.enrich(records).await.unwrap();

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].content.as_deref(), Some("a"));
        assert_eq!(enriched[1].title(), "B");
        assert_eq!(enriched[1].content, None);
    }

    #[tokio::test]
    async fn concurrency_cap_serializes_requests() {
        let server = MockServer::start().await;

        let titles = ["A", "B", "C", "D"];
        for title in titles {
            mount_content(&server, &format!("{}.md", title.to_lowercase()), title, 100).await;
        }

        let records: Vec<_> = titles.iter().map(|t| EventRecord::new(*t)).collect();
        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, Some(1));

        let started = Instant::now();
        let enriched = enricher.enrich(records).await.unwrap();

        // One permit: the four 100 ms responses cannot overlap.
        assert!(started.elapsed() >= Duration::from_millis(400));
        let contents: Vec<_> = enriched.iter().map(|e| e.content.as_deref().unwrap()).collect();
        assert_eq!(contents, titles);
    }

    #[tokio::test]
    async fn slow_content_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/markdowns/slow.md"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout = Duration::from_millis(100);
        let enricher = enricher_with(&config);

        let started = Instant::now();
        let err = enricher
            .enrich(vec![EventRecord::new("Slow")])
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            EventsError::ContentFetch { filename, .. } => assert_eq!(filename, "slow.md"),
            other => panic!("expected ContentFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_filename_passes_through() {
        let server = MockServer::start().await;

        mount_content(&server, "kickoff-2023.md", "kickoff", 20).await;
        mount_content(&server, "demo_day.md", "demo", 20).await;
        mount_content(&server, "hack_night.md", "hack", 20).await;

        let mut kickoff = EventRecord::new("Kickoff");
        kickoff.filename = Some("kickoff-2023.md".into());
        kickoff
            .extra
            .insert("location".into(), serde_json::json!("Main Hall"));

        let records = vec![kickoff, EventRecord::new("Demo Day"), EventRecord::new("Hack Night")];
        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, Some(1));
        let enriched = enricher.enrich(records).await.unwrap();

        let contents: Vec<_> = enriched.iter().map(|e| e.content.as_deref().unwrap()).collect();
        assert_eq!(contents, ["kickoff", "demo", "hack"]);
        assert_eq!(enriched[0].record.extra["location"], "Main Hall");
    }

    #[tokio::test]
    async fn empty_input_issues_no_requests() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let enricher = enricher_for(&server, FailurePolicy::AllOrNothing, None);
        assert!(enricher.enrich(Vec::new()).await.unwrap().is_empty());
    }
}
