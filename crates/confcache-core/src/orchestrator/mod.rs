//! Self-refreshing configuration cache.
//!
//! `CacheOrchestrator` ties a [`BoundedCache`], a [`RefreshScheduler`] and a
//! [`ConfigSource`] together:
//!
//! - reads are served from memory and filled from the source on a miss
//! - a background sweep replays each key's continuation token so unchanged
//!   configurations cost the source almost nothing
//! - keys the source reports as gone are evicted
//! - caching can be switched off and on at runtime
//!
//! # Usage
//!
//! ```rust,no_run
//! use confcache_core::{CacheOrchestrator, MemorySource};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), confcache_core::CacheError> {
//! let source = Arc::new(MemorySource::new());
//! source.put("feature-flags", r#"{"beta": true}"#);
//!
//! let cache = CacheOrchestrator::builder(source)
//!     .with_capacity(100)
//!     .with_refresh_interval(Duration::from_secs(30))
//!     .build()?;
//!
//! let flags = cache.get_content("feature-flags").await?;
//! # Ok(())
//! # }
//! ```

mod refresh;

pub use refresh::RefreshOutcome;

use crate::cache::config::saturating_millis;
use crate::cache::{BoundedCache, CacheConfig, CacheConfigError, CacheEntry, CacheStats};
use crate::error::{CacheError, Result};
use crate::scheduler::RefreshScheduler;
use confcache_abstraction::{ConfigSource, ContinuationToken};
use parking_lot::{Mutex, RwLock};
use refresh::{Counters, EntryCache, Fetcher, Refresher};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The cache and its scheduler live and die together.
struct CacheState {
    cache: Arc<EntryCache>,
    scheduler: RefreshScheduler,
}

/// Read-through configuration cache kept warm by a background refresh.
pub struct CacheOrchestrator {
    /// Source access under the fetch timeout.
    fetcher: Fetcher,
    /// `None` while caching is disabled.
    state: RwLock<Option<CacheState>>,
    /// Settings used when the cache is (re)created.
    settings: Mutex<CacheConfig>,
    /// Statistics counters.
    counters: Arc<Counters>,
}

impl fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled = self.is_caching_enabled();
        f.debug_struct("CacheOrchestrator")
            .field("source", &self.fetcher.source_name())
            .field("settings", &self.config())
            .field("enabled", &enabled)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CacheOrchestrator`].
pub struct CacheOrchestratorBuilder {
    source: Arc<dyn ConfigSource>,
    config: CacheConfig,
}

impl CacheOrchestratorBuilder {
    /// Replace all settings at once.
    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Maximum approximate number of cached configurations.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Period of the background refresh sweep.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.refresh_interval_ms = saturating_millis(interval);
        self
    }

    /// Timeout applied to every source call.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Whether to cache at all.
    #[must_use]
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Validate the settings and create the orchestrator.
    ///
    /// With caching enabled the refresh scheduler is started, so this must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if any setting is invalid, or
    /// `CacheError::Scheduler` if the refresh scheduler cannot be created.
    pub fn build(self) -> Result<CacheOrchestrator> {
        self.config.validate()?;

        let orchestrator = CacheOrchestrator {
            fetcher: Fetcher::new(self.source, self.config.fetch_timeout()),
            state: RwLock::new(None),
            settings: Mutex::new(self.config.clone()),
            counters: Arc::new(Counters::default()),
        };

        if self.config.enabled {
            *orchestrator.state.write() = Some(orchestrator.start_cache(&self.config)?);
        } else {
            warn!(source = %orchestrator.fetcher.source_name(), "Configuration cache is off");
        }

        Ok(orchestrator)
    }
}

impl CacheOrchestrator {
    /// Start building an orchestrator over `source` with default settings.
    pub fn builder(source: Arc<dyn ConfigSource>) -> CacheOrchestratorBuilder {
        CacheOrchestratorBuilder { source, config: CacheConfig::default() }
    }

    /// Get a configuration, from the cache when possible.
    ///
    /// A hit returns the stored entry (`served_from_cache == true`) without
    /// touching the source. A miss performs a full fetch, stores the result
    /// when caching is enabled and returns a fresh entry.
    ///
    /// # Errors
    /// Returns the source error on a failed miss, or `CacheError::EmptyContent`
    /// if the source returned nothing. Nothing is cached in either case.
    pub async fn get_configuration(&self, key: &str) -> Result<Arc<CacheEntry>> {
        let cache = self.cache();

        if let Some(entry) = cache.as_ref().and_then(|cache| cache.get(key)) {
            Counters::bump(&self.counters.hits);
            debug!(key = %key, "Cache hit");
            return Ok(entry);
        }

        Counters::bump(&self.counters.misses);
        let (content, token) = self.fetch_full(key).await?;

        if let Some(cache) = cache {
            debug!(key = %key, "Adding configuration to cache");
            cache.add(key.to_string(), Arc::new(CacheEntry::cached(content.clone(), token.clone())));
        }

        Ok(Arc::new(CacheEntry::fresh(content, token)))
    }

    /// Get only the content of a configuration, from the cache when possible.
    ///
    /// # Errors
    /// See [`CacheOrchestrator::get_configuration`].
    pub async fn get_content(&self, key: &str) -> Result<String> {
        Ok(self.get_configuration(key).await?.content.clone())
    }

    /// Fetch a configuration straight from the source.
    ///
    /// The cache is neither read nor populated.
    ///
    /// # Errors
    /// Returns the source error, or `CacheError::EmptyContent`.
    pub async fn get_configuration_ignore_cache(&self, key: &str) -> Result<CacheEntry> {
        let (content, token) = self.fetch_full(key).await?;
        Ok(CacheEntry::fresh(content, token))
    }

    /// Content-only variant of [`CacheOrchestrator::get_configuration_ignore_cache`].
    ///
    /// # Errors
    /// Returns the source error, or `CacheError::EmptyContent`.
    pub async fn get_content_ignore_cache(&self, key: &str) -> Result<String> {
        Ok(self.fetch_full(key).await?.0)
    }

    /// Run one refresh sweep over every cached key now.
    ///
    /// Does nothing while caching is disabled.
    pub async fn refresh_all(&self) {
        if let Some(refresher) = self.refresher() {
            refresher.refresh_all().await;
        }
    }

    /// Incrementally refresh a single cached key now.
    pub async fn refresh_one(&self, key: &str) -> RefreshOutcome {
        match self.refresher() {
            Some(refresher) => refresher.refresh_one(key).await,
            None => RefreshOutcome::Missing,
        }
    }

    /// Turn caching on or off.
    ///
    /// Disabling stops the scheduler and drops every cached entry. Enabling
    /// creates a new, empty cache and starts a new scheduler, which requires a
    /// Tokio runtime. If that fails the error is logged and caching stays off.
    pub fn set_caching_enabled(&self, enabled: bool) {
        let mut state = self.state.write();
        let config = {
            let mut settings = self.settings.lock();
            settings.enabled = enabled;
            settings.clone()
        };

        if enabled {
            if state.is_none() {
                match self.start_cache(&config) {
                    Ok(started) => *state = Some(started),
                    Err(e) => error!(error = %e, "Failed to enable configuration cache"),
                }
            }
        } else if let Some(previous) = state.take() {
            previous.scheduler.stop();
            warn!("Refresh scheduler stopped and configuration cache shut down");
        }
    }

    /// Change the capacity and return the previous setting.
    ///
    /// A live cache is shrunk right away if needed.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if `capacity` is 0.
    pub fn set_capacity(&self, capacity: usize) -> Result<usize> {
        if capacity == 0 {
            return Err(CacheConfigError::InvalidCapacity.into());
        }

        let old = std::mem::replace(&mut self.settings.lock().capacity, capacity);
        if let Some(cache) = self.cache() {
            cache.update_capacity(capacity);
        }
        warn!(old, new = capacity, "Reset configuration cache capacity");

        Ok(old)
    }

    /// Change the refresh interval and return the previous setting.
    ///
    /// A running scheduler picks it up from its next tick.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if `interval` is shorter than a millisecond.
    pub fn set_refresh_interval(&self, interval: Duration) -> Result<Duration> {
        let interval_ms = saturating_millis(interval);
        if interval_ms == 0 {
            return Err(CacheConfigError::InvalidRefreshInterval.into());
        }

        if let Some(state) = self.state.read().as_ref() {
            state.scheduler.reset(interval)?;
        }
        let old = std::mem::replace(&mut self.settings.lock().refresh_interval_ms, interval_ms);
        warn!(old_ms = old, new_ms = interval_ms, "Reset refresh interval");

        Ok(Duration::from_millis(old))
    }

    /// Change the per-call fetch timeout and return the previous one.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if `timeout` is shorter than a millisecond.
    pub fn set_fetch_timeout(&self, timeout: Duration) -> Result<Duration> {
        let timeout_ms = saturating_millis(timeout);
        if timeout_ms == 0 {
            return Err(CacheConfigError::InvalidFetchTimeout.into());
        }

        self.settings.lock().fetch_timeout_ms = timeout_ms;
        let old = self.fetcher.set_timeout(timeout);
        info!(old_ms = saturating_millis(old), new_ms = timeout_ms, "Reset fetch timeout");

        Ok(old)
    }

    /// Whether caching is currently on.
    pub fn is_caching_enabled(&self) -> bool {
        self.state.read().is_some()
    }

    /// Peek at a cached entry without counting a hit or calling the source.
    pub fn cached_entry(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.cache().and_then(|cache| cache.get(key))
    }

    /// Snapshot of the cached keys.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache().map(|cache| cache.keys()).unwrap_or_default()
    }

    /// Current settings.
    pub fn config(&self) -> CacheConfig {
        self.settings.lock().clone()
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache();
        let counters = &self.counters;

        CacheStats {
            enabled: cache.is_some(),
            size: cache.as_ref().map_or(0, |cache| cache.len()),
            capacity: self.settings.lock().capacity,
            hits: Counters::read(&counters.hits),
            misses: Counters::read(&counters.misses),
            evictions: Counters::read(&counters.evictions),
            refreshed: Counters::read(&counters.refreshed),
            unchanged: Counters::read(&counters.unchanged),
            refresh_errors: Counters::read(&counters.refresh_errors),
            not_found_evictions: Counters::read(&counters.not_found_evictions),
            sweeps: Counters::read(&counters.sweeps),
        }
    }

    fn cache(&self) -> Option<Arc<EntryCache>> {
        self.state.read().as_ref().map(|state| Arc::clone(&state.cache))
    }

    fn refresher(&self) -> Option<Refresher> {
        self.cache()
            .map(|cache| Refresher::new(self.fetcher.clone(), cache, Arc::clone(&self.counters)))
    }

    async fn fetch_full(&self, key: &str) -> Result<(String, ContinuationToken)> {
        let fetched = self.fetcher.fetch(key, None).await?;
        match fetched.content {
            Some(content) if !content.is_empty() => Ok((content, fetched.token)),
            _ => {
                error!(key = %key, "Source returned no content");
                Err(CacheError::EmptyContent(key.to_string()))
            }
        }
    }

    fn start_cache(&self, config: &CacheConfig) -> Result<CacheState> {
        info!(
            capacity = config.capacity,
            refresh_interval_ms = config.refresh_interval_ms,
            "Initializing configuration cache and refresh scheduler"
        );

        let cache = Arc::new(BoundedCache::with_eviction_counter(
            config.capacity,
            Arc::clone(&self.counters.evictions),
        ));
        let refresher =
            Refresher::new(self.fetcher.clone(), Arc::clone(&cache), Arc::clone(&self.counters));
        let scheduler = RefreshScheduler::new(config.refresh_interval(), move || {
            let refresher = refresher.clone();
            async move { refresher.refresh_all().await }
        })?;
        scheduler.start()?;

        Ok(CacheState { cache, scheduler })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use confcache_abstraction::SourceError;

    fn orchestrator(source: &Arc<MemorySource>) -> CacheOrchestrator {
        CacheOrchestrator::builder(Arc::clone(source) as Arc<dyn ConfigSource>)
            .with_refresh_interval(Duration::from_secs(3600))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let source = Arc::new(MemorySource::new());
        source.put("app", "v=1");
        let cache = orchestrator(&source);

        let first = cache.get_configuration("app").await.unwrap();
        assert_eq!(first.content, "v=1");
        assert!(!first.served_from_cache);

        let second = cache.get_configuration("app").await.unwrap();
        assert_eq!(second.content, "v=1");
        assert!(second.served_from_cache);

        assert_eq!(source.calls_for("app").len(), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_miss_error_is_not_cached() {
        let source = Arc::new(MemorySource::new());
        let cache = orchestrator(&source);

        let err = cache.get_configuration("absent").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.cached_keys().is_empty());

        source.put("flaky", "v=1");
        source.fail_next("flaky", SourceError::Request("reset".to_string()));
        assert!(cache.get_configuration("flaky").await.is_err());
        assert!(cache.cached_entry("flaky").is_none());
        assert!(cache.get_configuration("flaky").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let source = Arc::new(MemorySource::new());
        source.put("blank", "");
        let cache = orchestrator(&source);

        assert!(matches!(
            cache.get_configuration("blank").await,
            Err(CacheError::EmptyContent(key)) if key == "blank"
        ));
        assert!(cache.cached_entry("blank").is_none());
    }

    #[tokio::test]
    async fn test_ignore_cache_never_touches_cache() {
        let source = Arc::new(MemorySource::new());
        source.put("app", "v=1");
        let cache = orchestrator(&source);

        assert_eq!(cache.get_content_ignore_cache("app").await.unwrap(), "v=1");
        let entry = cache.get_configuration_ignore_cache("app").await.unwrap();
        assert!(!entry.served_from_cache);
        assert!(cache.cached_entry("app").is_none());
        assert_eq!(source.calls_for("app").len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_one_outcomes() {
        let source = Arc::new(MemorySource::new());
        source.put("app", "v=1");
        let cache = orchestrator(&source);
        cache.get_configuration("app").await.unwrap();

        assert_eq!(cache.refresh_one("app").await, RefreshOutcome::Unchanged);

        source.put("app", "v=2");
        assert_eq!(cache.refresh_one("app").await, RefreshOutcome::Updated);
        assert_eq!(cache.cached_entry("app").unwrap().content, "v=2");

        source.fail_next("app", SourceError::Throttled("busy".to_string()));
        assert_eq!(cache.refresh_one("app").await, RefreshOutcome::Failed);
        assert_eq!(cache.cached_entry("app").unwrap().content, "v=2");

        source.remove("app");
        assert_eq!(cache.refresh_one("app").await, RefreshOutcome::Evicted);
        assert!(cache.cached_entry("app").is_none());

        assert_eq!(cache.refresh_one("app").await, RefreshOutcome::Missing);
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let source: Arc<dyn ConfigSource> = Arc::new(MemorySource::new());
        let result = CacheOrchestrator::builder(source).with_capacity(0).build();
        assert!(matches!(result, Err(CacheError::Config(CacheConfigError::InvalidCapacity))));
    }

    #[tokio::test]
    async fn test_setters_validate_and_return_previous() {
        let source = Arc::new(MemorySource::new());
        let cache = orchestrator(&source);

        assert_eq!(cache.set_capacity(10).unwrap(), 500);
        assert!(cache.set_capacity(0).is_err());
        assert_eq!(cache.set_refresh_interval(Duration::from_secs(5)).unwrap(), Duration::from_secs(3600));
        assert!(cache.set_refresh_interval(Duration::ZERO).is_err());
        assert_eq!(cache.set_fetch_timeout(Duration::from_secs(2)).unwrap(), Duration::from_secs(10));
        assert!(cache.set_fetch_timeout(Duration::from_micros(10)).is_err());

        let config = cache.config();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.refresh_interval_ms, 5000);
        assert_eq!(config.fetch_timeout_ms, 2000);
    }

    #[tokio::test]
    async fn test_evictions_survive_disable_enable() {
        let source = Arc::new(MemorySource::new());
        for key in ["a", "b", "c"] {
            source.put(key, "x");
        }
        let cache = CacheOrchestrator::builder(Arc::clone(&source) as Arc<dyn ConfigSource>)
            .with_capacity(1)
            .with_refresh_interval(Duration::from_secs(3600))
            .build()
            .unwrap();

        cache.get_configuration("a").await.unwrap();
        cache.get_configuration("b").await.unwrap();
        assert_eq!(cache.stats().evictions, 1);

        cache.set_caching_enabled(false);
        cache.set_caching_enabled(true);
        assert_eq!(cache.stats().evictions, 1);

        cache.get_configuration("a").await.unwrap();
        cache.get_configuration("c").await.unwrap();
        assert_eq!(cache.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_oversized_durations_saturate() {
        let source = Arc::new(MemorySource::new());
        source.put("app", "v=1");
        let cache = CacheOrchestrator::builder(Arc::clone(&source) as Arc<dyn ConfigSource>)
            .with_refresh_interval(Duration::MAX)
            .with_fetch_timeout(Duration::MAX)
            .build()
            .unwrap();

        let config = cache.config();
        assert_eq!(config.refresh_interval_ms, u64::MAX);
        assert_eq!(config.fetch_timeout_ms, u64::MAX);
        assert_eq!(cache.get_content("app").await.unwrap(), "v=1");

        cache.set_refresh_interval(Duration::MAX).unwrap();
        assert!(cache.is_caching_enabled());
    }
}
