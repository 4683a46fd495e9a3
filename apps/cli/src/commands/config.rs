//! `confcache config`: print the effective settings.

use anyhow::Result;
use confcache_core::CacheConfig;
use serde::Serialize;

#[derive(Serialize)]
struct ConfigFile<'a> {
    cache: &'a CacheConfig,
}

/// Execute the config command.
///
/// Output is a valid config file, so it can be redirected into
/// `confcache.toml` and edited.
pub fn execute(config: &CacheConfig) -> Result<()> {
    config.validate()?;
    print!("{}", toml::to_string_pretty(&ConfigFile { cache: config })?);
    Ok(())
}
