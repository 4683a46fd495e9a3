//! Self-refreshing, capacity-bounded configuration cache.
//!
//! This crate keeps configurations fetched from a [`ConfigSource`] in memory
//! and refreshes them in the background using continuation tokens, so only
//! changed configurations are transferred again.
//!
//! # Components
//!
//! - **cache**: `BoundedCache` with approximate capacity, entry and settings types
//! - **scheduler**: `RefreshScheduler`, a cancellable periodic task runner
//! - **orchestrator**: `CacheOrchestrator`, the read-through cache callers use
//! - **source**: in-memory and directory-backed `ConfigSource` and `ConfigWriter`
//!   implementations

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod source;

pub use cache::{
    BoundedCache, CacheConfig, CacheConfigError, CacheEntry, CacheStats, load_cache_config,
};
pub use error::{CacheError, Result, SchedulerError};
pub use orchestrator::{CacheOrchestrator, CacheOrchestratorBuilder, RefreshOutcome};
pub use scheduler::RefreshScheduler;
pub use source::{
    ConfigSource, ConfigWriter, ContinuationToken, FetchCall, Fetched, FileSource, MemorySource,
    SourceError,
};
