//! Time-bounded in-memory cache for the parsed manifest.
//!
//! A fetcher talks to exactly one manifest URL, so the cache holds a single
//! slot keyed implicitly by that URL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::parser::EventManifest;

#[derive(Debug, Clone)]
struct CachedManifest {
    manifest: Arc<EventManifest>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct ManifestCache {
    ttl: Duration,
    slot: Mutex<Option<CachedManifest>>,
}

impl ManifestCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// The cached manifest, if one was stored less than `ttl` ago.
    pub(crate) async fn get(&self) -> Option<Arc<EventManifest>> {
        let slot = self.slot.lock().await;
        let cached = slot.as_ref()?;
        let age = (Utc::now() - cached.fetched_at).to_std().ok()?;
        (age < self.ttl).then(|| Arc::clone(&cached.manifest))
    }

    pub(crate) async fn put(&self, manifest: Arc<EventManifest>) {
        *self.slot.lock().await = Some(CachedManifest {
            manifest,
            fetched_at: Utc::now(),
        });
    }
}
