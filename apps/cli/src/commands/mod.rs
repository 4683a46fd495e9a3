//! Command implementations for the confcache CLI.

pub mod config;
pub mod get;
pub mod watch;
pub mod write;

use anyhow::{Context, Result};
use confcache_core::{CacheConfig, CacheOrchestrator, ConfigSource, FileSource};
use std::path::Path;
use std::sync::Arc;

/// Build an orchestrator serving files below `root`.
pub fn build_orchestrator(root: &Path, config: CacheConfig) -> Result<CacheOrchestrator> {
    let source: Arc<dyn ConfigSource> = Arc::new(FileSource::new(root));
    CacheOrchestrator::builder(source)
        .with_config(config)
        .build()
        .context("Invalid cache configuration")
}
