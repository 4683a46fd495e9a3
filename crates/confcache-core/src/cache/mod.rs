//! Bounded in-memory storage for configuration values.
//!
//! This module provides the concurrent store the orchestrator keeps warm,
//! the entry type it stores, and the configuration that sizes it.

pub mod bounded;
pub mod config;
pub mod types;

pub use bounded::BoundedCache;
pub use config::{CacheConfig, CacheConfigError, load_cache_config};
pub use types::{CacheEntry, CacheStats};
