//! In-process configuration source.

use async_trait::async_trait;
use confcache_abstraction::{ConfigSource, ConfigWriter, ContinuationToken, Fetched, SourceError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Number of fetch calls kept in the call log; older calls are dropped.
pub const MAX_RECORDED_CALLS: usize = 1024;

/// One recorded call to [`MemorySource::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    /// Requested key.
    pub key: String,
    /// Token the caller replayed, if any.
    pub token: Option<ContinuationToken>,
}

/// A configuration source backed by an in-memory map.
///
/// Every `put` assigns a new version and the token handed out is that
/// version, so fetching with the latest token answers "unchanged". Calls are
/// recorded (the most recent [`MAX_RECORDED_CALLS`]) and failures can be
/// injected, which makes it the source of choice for tests and demos.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: DashMap<String, (String, u64)>,
    next_version: AtomicU64,
    failures: Mutex<HashMap<String, VecDeque<SourceError>>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<VecDeque<FetchCall>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` under `key` with a new version.
    ///
    /// Storing identical content still bumps the version.
    pub fn put(&self, key: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(key.into(), (content.into(), self.bump_version()));
    }

    /// Removes `key`; later fetches answer `NotFound`.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Makes the next fetch of `key` fail with `error`. Calls queue up.
    pub fn fail_next(&self, key: impl Into<String>, error: SourceError) {
        self.failures.lock().entry(key.into()).or_default().push_back(error);
    }

    /// Delays every fetch by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Recorded fetches, oldest first.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().iter().cloned().collect()
    }

    /// Fetches seen so far for one key.
    pub fn calls_for(&self, key: &str) -> Vec<FetchCall> {
        self.calls.lock().iter().filter(|call| call.key == key).cloned().collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn bump_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, call: FetchCall) {
        let mut calls = self.calls.lock();
        if calls.len() == MAX_RECORDED_CALLS {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    fn token_for(version: u64) -> ContinuationToken {
        ContinuationToken::new(format!("v{version}"))
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn fetch(
        &self,
        key: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<Fetched, SourceError> {
        self.record(FetchCall { key: key.to_string(), token: token.cloned() });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self.failures.lock().get_mut(key).and_then(VecDeque::pop_front);
        if let Some(error) = injected {
            debug!(key = %key, error = %error, "MemorySource returning injected failure");
            return Err(error);
        }

        let Some((content, version)) = self.entries.get(key).map(|entry| entry.value().clone())
        else {
            return Err(SourceError::NotFound(key.to_string()));
        };

        let current = Self::token_for(version);
        if token == Some(&current) {
            return Ok(Fetched::unchanged(current));
        }
        Ok(Fetched::changed(content, current))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl ConfigWriter for MemorySource {
    async fn create(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Err(SourceError::AlreadyExists(key.to_string())),
            Entry::Vacant(vacant) => {
                let version = self.bump_version();
                vacant.insert((content.to_string(), version));
                Ok(Self::token_for(version))
            }
        }
    }

    async fn update(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Err(SourceError::NotFound(key.to_string()));
        };
        let version = self.bump_version();
        *entry = (content.to_string(), version);
        Ok(Self::token_for(version))
    }

    async fn delete(&self, key: &str) -> Result<(), SourceError> {
        if self.remove(key) { Ok(()) } else { Err(SourceError::NotFound(key.to_string())) }
    }
}
