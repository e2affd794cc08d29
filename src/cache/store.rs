use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use metrics::counter;
use tracing::{debug, info};

use crate::infra::fetch::{DocumentFetcher, FetchOutcome};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

struct CacheEntry {
    content: String,
    expires_at: Instant,
}

/// Process-wide time-bounded store of fetched document bodies.
///
/// Entries are added or replaced by fetches and never deleted individually;
/// the only removal is the wholesale reset performed by [`DocumentCache::bust`].
/// An expired entry is treated as a miss and refetched in place, not evicted
/// proactively.
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    fetcher: Arc<dyn DocumentFetcher>,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fetcher,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serve the document at `url` from the store, fetching it when no live
    /// entry exists. Failed fetches are never stored, so every later call
    /// retries until the origin recovers.
    pub async fn get(&self, url: &str) -> FetchOutcome {
        if let Some(content) = self.live_entry(url) {
            counter!("foglio_document_cache_hit_total").increment(1);
            return FetchOutcome::success(content);
        }

        counter!("foglio_document_cache_miss_total").increment(1);
        debug!(target: SOURCE, url, "fetching remote document");

        let outcome = self.fetcher.fetch(url).await;
        match outcome.body.as_deref() {
            Some(body) => {
                debug!(target: SOURCE, url, bytes = body.len(), "storing fetched document");
                self.store(url, body);
            }
            None => {
                counter!("foglio_document_cache_fetch_failure_total").increment(1);
            }
        }

        outcome
    }

    /// Atomically discard every cached entry. Concurrent `get`s observe either
    /// the pre-bust or the post-bust store, never a mix.
    pub fn bust(&self) {
        info!(target: SOURCE, "busting document cache");
        counter!("foglio_document_cache_bust_total").increment(1);
        *rw_write(&self.entries, SOURCE, "bust") = HashMap::new();
    }

    fn live_entry(&self, url: &str) -> Option<String> {
        let entries = rw_read(&self.entries, SOURCE, "get");
        entries
            .get(url)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.content.clone())
    }

    fn store(&self, url: &str, content: &str) {
        let entry = CacheEntry {
            content: content.to_string(),
            expires_at: Instant::now() + self.ttl,
        };
        rw_write(&self.entries, SOURCE, "store").insert(url.to_string(), entry);
    }
}
