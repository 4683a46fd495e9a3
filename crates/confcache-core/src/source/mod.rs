//! Concrete configuration sources.
//!
//! - **Memory**: in-process map with versioned tokens, for tests and demos
//! - **File**: one file per key below a root directory, content-hash tokens
//!
//! Both also implement `ConfigWriter`, so configurations can be created,
//! updated and deleted through them.

pub mod file;
pub mod memory;

pub use confcache_abstraction::{
    ConfigSource, ConfigWriter, ContinuationToken, Fetched, SourceError,
};
pub use file::FileSource;
pub use memory::{FetchCall, MAX_RECORDED_CALLS, MemorySource};
