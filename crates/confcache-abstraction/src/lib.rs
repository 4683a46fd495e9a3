//! Configuration source abstraction for confcache.
//!
//! This module defines the trait and types a cache uses to talk to wherever
//! configuration values actually live.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when fetching from a configuration source.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceError {
    /// The keyed configuration no longer exists upstream.
    #[error("Configuration not found: {0}")]
    NotFound(String),

    /// A create targeted a key that already exists.
    #[error("Configuration already exists: {0}")]
    AlreadyExists(String),

    /// The key cannot be mapped onto the source (e.g. escapes its root).
    #[error("Invalid configuration key: {0}")]
    InvalidKey(String),

    /// The source is rate limiting this client.
    #[error("Source throttled: {0}")]
    Throttled(String),

    /// An error occurred while talking to the source (network, I/O, ...).
    #[error("Request Error: {0}")]
    Request(String),

    /// The call did not complete within the configured timeout.
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Other unexpected errors.
    #[error("Other Source Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Returns `true` if the configuration is gone upstream.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for failures that may succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Request(_) | Self::Timeout(_))
    }
}

/// Opaque cursor returned by a fetch.
///
/// Replaying it on the next fetch lets the source answer "unchanged" without
/// shipping the content again. Callers store and replay it, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a source-specific token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value, for sources that need to decode it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetched {
    /// The configuration content, or `None` when the source reports that
    /// nothing changed since the supplied token.
    pub content: Option<String>,

    /// Token to replay on the next fetch of the same key.
    pub token: ContinuationToken,
}

impl Fetched {
    /// A fetch that carried new content.
    pub fn changed(content: impl Into<String>, token: ContinuationToken) -> Self {
        Self { content: Some(content.into()), token }
    }

    /// A fetch where the source reported no change.
    #[must_use]
    pub const fn unchanged(token: ContinuationToken) -> Self {
        Self { content: None, token }
    }
}

/// A trait for reading configuration values from an external store.
///
/// All sources must be `Send + Sync` so one instance can serve foreground
/// reads and background refresh tasks at the same time.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetches the configuration stored under `key`.
    ///
    /// # Arguments
    /// * `key` - Name of the configuration
    /// * `token` - Token from the previous fetch of `key`, or `None` for a full fetch
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the configuration no longer exists,
    /// or another `SourceError` if the fetch fails.
    async fn fetch(
        &self,
        key: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<Fetched, SourceError>;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str;
}

/// Write access to a configuration store.
///
/// Writes go straight to the store; caches reading from it pick the change up
/// on their next refresh.
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    /// Creates a new configuration and returns the token of its first version.
    ///
    /// # Errors
    /// Returns `SourceError::AlreadyExists` if `key` is taken.
    async fn create(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError>;

    /// Replaces an existing configuration and returns the new token.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if `key` does not exist.
    async fn update(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError>;

    /// Deletes a configuration.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if `key` does not exist.
    async fn delete(&self, key: &str) -> Result<(), SourceError>;
}
