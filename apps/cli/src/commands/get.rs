//! `confcache get`: print one configuration.

use anyhow::{Context, Result};
use confcache_core::{CacheConfig, CacheEntry};
use std::path::Path;

/// Execute the get command.
///
/// # Arguments
/// * `root` - Directory configurations are read from
/// * `config` - Effective cache settings
/// * `key` - Configuration key, relative to `root`
/// * `ignore_cache` - Go straight to the source
/// * `json` - Print the entry with its metadata as JSON
pub async fn execute(
    root: &Path,
    config: CacheConfig,
    key: &str,
    ignore_cache: bool,
    json: bool,
) -> Result<()> {
    let cache = super::build_orchestrator(root, config)?;

    let entry = if ignore_cache {
        cache.get_configuration_ignore_cache(key).await
    } else {
        cache.get_configuration(key).await.map(|entry| CacheEntry::clone(&entry))
    }
    .with_context(|| format!("Failed to get configuration '{}'", key))?;

    if json {
        let output = serde_json::json!({
            "key": key,
            "content": entry.content,
            "token": entry.token,
            "cached_at": entry.cached_at,
            "served_from_cache": entry.served_from_cache,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", entry.content);
        if !entry.content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
