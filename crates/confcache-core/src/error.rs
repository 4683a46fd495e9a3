//! Error types for confcache.

use crate::cache::CacheConfigError;
use confcache_abstraction::SourceError;
use thiserror::Error;

/// Core error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The configuration source failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A full fetch returned no content.
    #[error("Source returned no content for configuration [{0}]")]
    EmptyContent(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] CacheConfigError),

    /// The refresh scheduler rejected a request.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl CacheError {
    /// Returns `true` if the configuration does not exist upstream.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Source(SourceError::NotFound(_)))
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors returned by the refresh scheduler lifecycle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// `start` was called on a scheduler that is already running.
    #[error("Refresh scheduler is already running")]
    AlreadyStarted,

    /// `start` was called after `stop`.
    #[error("Refresh scheduler has been stopped")]
    Stopped,

    /// The tick period was zero.
    #[error("Refresh interval must be greater than zero")]
    InvalidInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_source_conversion() {
        let err: CacheError = SourceError::NotFound("app".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Source error: Configuration not found: app");
    }

    #[test]
    fn test_cache_error_config_conversion() {
        let err: CacheError = CacheConfigError::InvalidCapacity.into();
        assert!(matches!(err, CacheError::Config(CacheConfigError::InvalidCapacity)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_transient_is_not_not_found() {
        let err: CacheError = SourceError::Request("connection reset".to_string()).into();
        assert!(!err.is_not_found());
    }
}
