//! CLI configuration loading and merging.

use anyhow::{Context, Result};
use confcache_core::{CacheConfig, load_cache_config};
use std::path::Path;

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "confcache.toml";

/// Load and merge cache configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (applied by the caller)
/// 2. Environment variables (`CONFCACHE_*`)
/// 3. Config file (`--config`, or `./confcache.toml` if present)
/// 4. Defaults
pub fn load_config(path: Option<&Path>) -> Result<CacheConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            load_cache_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => load_cache_config(Path::new(DEFAULT_CONFIG_FILE))
            .context("Failed to load ./confcache.toml")?,
    };

    config
        .apply_env_overrides(|name| std::env::var(name).ok())
        .context("Invalid CONFCACHE_* environment variable")?;

    Ok(config)
}
