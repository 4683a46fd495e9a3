//! Core data types for configuration caching.

use chrono::{DateTime, Utc};
use confcache_abstraction::ContinuationToken;
use serde::Serialize;

/// A configuration value together with its refresh metadata.
///
/// Entries are immutable once built; an update swaps in a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// The configuration content.
    pub content: String,
    /// Token to replay on the next incremental fetch.
    pub token: ContinuationToken,
    /// When the content was stored in the cache.
    pub cached_at: DateTime<Utc>,
    /// Whether this entry was answered from the cache.
    pub served_from_cache: bool,
}

impl CacheEntry {
    /// An entry to store in the cache, stamped with the current time.
    pub fn cached(content: String, token: ContinuationToken) -> Self {
        Self { content, token, cached_at: Utc::now(), served_from_cache: true }
    }

    /// An entry handed straight to a caller after a source fetch.
    pub fn fresh(content: String, token: ContinuationToken) -> Self {
        Self { content, token, cached_at: Utc::now(), served_from_cache: false }
    }

    /// Same content and timestamp, carrying a newer token.
    #[must_use]
    pub fn with_token(&self, token: ContinuationToken) -> Self {
        Self { token, ..self.clone() }
    }
}

/// Cache statistics for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Whether caching is currently enabled.
    pub enabled: bool,
    /// Current number of cached configurations.
    pub size: usize,
    /// Current capacity.
    pub capacity: usize,
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that went to the source.
    pub misses: u64,
    /// Entries removed to stay under capacity.
    pub evictions: u64,
    /// Refreshes that picked up new content.
    pub refreshed: u64,
    /// Refreshes where the source reported no change.
    pub unchanged: u64,
    /// Refreshes that failed and kept the stale entry.
    pub refresh_errors: u64,
    /// Entries dropped because the source no longer has them.
    pub not_found_evictions: u64,
    /// Completed refresh sweeps.
    pub sweeps: u64,
}
