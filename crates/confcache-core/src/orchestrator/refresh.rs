//! Source fetching and incremental refresh of cached entries.

use crate::cache::config::saturating_millis;
use crate::cache::{BoundedCache, CacheEntry};
use confcache_abstraction::{ConfigSource, ContinuationToken, Fetched, SourceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

pub(crate) type EntryCache = BoundedCache<String, Arc<CacheEntry>>;

/// What a single-key refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The key was not cached (never was, or already evicted).
    Missing,
    /// The source reported no change; content and timestamp were kept.
    Unchanged,
    /// New content replaced the entry.
    Updated,
    /// The source no longer has the key, so it was evicted.
    Evicted,
    /// The fetch failed; the stale entry was kept.
    Failed,
}

/// Running totals behind `CacheStats`.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) refreshed: AtomicU64,
    pub(crate) unchanged: AtomicU64,
    pub(crate) refresh_errors: AtomicU64,
    pub(crate) not_found_evictions: AtomicU64,
    pub(crate) sweeps: AtomicU64,
    /// Shared with every cache instance so it survives disable/enable.
    pub(crate) evictions: Arc<AtomicU64>,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Calls the source under the per-call timeout.
#[derive(Clone)]
pub(crate) struct Fetcher {
    source: Arc<dyn ConfigSource>,
    timeout_ms: Arc<AtomicU64>,
}

impl Fetcher {
    pub(crate) fn new(source: Arc<dyn ConfigSource>, timeout: Duration) -> Self {
        Self { source, timeout_ms: Arc::new(AtomicU64::new(saturating_millis(timeout))) }
    }

    pub(crate) fn source_name(&self) -> &str {
        self.source.name()
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_timeout(&self, timeout: Duration) -> Duration {
        Duration::from_millis(self.timeout_ms.swap(saturating_millis(timeout), Ordering::Relaxed))
    }

    pub(crate) async fn fetch(
        &self,
        key: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<Fetched, SourceError> {
        let timeout = self.timeout();
        let started = Instant::now();

        let fetched = tokio::time::timeout(timeout, self.source.fetch(key, token))
            .await
            .map_err(|_| SourceError::Timeout(timeout))??;

        debug!(
            key = %key,
            source = %self.source.name(),
            incremental = token.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched configuration from source"
        );
        Ok(fetched)
    }
}

/// Re-fetches cached keys with their stored tokens.
#[derive(Clone)]
pub(crate) struct Refresher {
    fetcher: Fetcher,
    cache: Arc<EntryCache>,
    counters: Arc<Counters>,
}

impl Refresher {
    pub(crate) fn new(fetcher: Fetcher, cache: Arc<EntryCache>, counters: Arc<Counters>) -> Self {
        Self { fetcher, cache, counters }
    }

    /// One sweep: a task per cached key, joined before returning.
    ///
    /// Fan-out is unbounded; a sweep issues as many concurrent fetches as
    /// there are cached keys.
    pub(crate) async fn refresh_all(&self) {
        let started = Instant::now();
        let keys = self.cache.keys();
        let total = keys.len();
        debug!(keys = total, "Starting refresh of all cached configurations");

        let mut tasks = JoinSet::new();
        for key in keys {
            let refresher = self.clone();
            tasks.spawn(async move { refresher.refresh_one(&key).await });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Refresh task aborted");
            }
        }

        Counters::bump(&self.counters.sweeps);
        debug!(
            keys = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finished refresh of all cached configurations"
        );
    }

    /// Incrementally refreshes one key.
    pub(crate) async fn refresh_one(&self, key: &str) -> RefreshOutcome {
        let Some(entry) = self.cache.get(key) else {
            return RefreshOutcome::Missing;
        };
        debug!(key = %key, "Refreshing cached configuration");

        let fetched = match self.fetcher.fetch(key, Some(&entry.token)).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_not_found() => {
                warn!(key = %key, error = %e, "Configuration no longer exists, evicting");
                self.cache.delete(key);
                Counters::bump(&self.counters.not_found_evictions);
                return RefreshOutcome::Evicted;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(key = %key, error = %e, "Refresh failed, keeping cached configuration");
                } else {
                    error!(key = %key, error = %e, "Refresh failed, keeping cached configuration");
                }
                Counters::bump(&self.counters.refresh_errors);
                return RefreshOutcome::Failed;
            }
        };

        let changed = fetched.content.filter(|c| !c.is_empty() && *c != entry.content);
        match changed {
            None => {
                if fetched.token != entry.token {
                    self.cache.replace(key, Arc::new(entry.with_token(fetched.token)));
                }
                Counters::bump(&self.counters.unchanged);
                debug!(key = %key, "Configuration unchanged");
                RefreshOutcome::Unchanged
            }
            Some(content) => {
                warn!(key = %key, "Configuration changed, replacing cached entry");
                self.cache.replace(key, Arc::new(CacheEntry::cached(content, fetched.token)));
                Counters::bump(&self.counters.refreshed);
                RefreshOutcome::Updated
            }
        }
    }
}
