//! Configuration for configuration caching.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration for the configuration cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of configurations to keep in memory (default: 500).
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// How often cached configurations are refreshed in milliseconds
    /// (default: 300000 = 5 minutes).
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Timeout for a single source fetch in milliseconds (default: 10000).
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_capacity() -> usize {
    500
}

fn default_refresh_interval_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

/// Errors that can occur while loading or validating cache configuration.
#[derive(Debug, Error)]
pub enum CacheConfigError {
    /// Invalid capacity (must be > 0).
    #[error("Invalid capacity: must be greater than 0")]
    InvalidCapacity,

    /// Invalid refresh interval (must be > 0).
    #[error("Invalid refresh interval: must be greater than 0")]
    InvalidRefreshInterval,

    /// Invalid fetch timeout (must be > 0).
    #[error("Invalid fetch timeout: must be greater than 0")]
    InvalidFetchTimeout,

    /// I/O error reading config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// The rejected value.
        value: String,
    },
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_capacity(),
            refresh_interval_ms: default_refresh_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.capacity == 0 {
            return Err(CacheConfigError::InvalidCapacity);
        }

        if self.refresh_interval_ms == 0 {
            return Err(CacheConfigError::InvalidRefreshInterval);
        }

        if self.fetch_timeout_ms == 0 {
            return Err(CacheConfigError::InvalidFetchTimeout);
        }

        Ok(())
    }

    /// Get the refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Get the fetch timeout as a Duration.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Apply `CONFCACHE_*` overrides using `lookup` to read variables.
    ///
    /// Recognized: `CONFCACHE_ENABLED`, `CONFCACHE_CAPACITY`,
    /// `CONFCACHE_REFRESH_INTERVAL_MS`, `CONFCACHE_FETCH_TIMEOUT_MS`.
    ///
    /// # Errors
    /// Returns `CacheConfigError::InvalidEnv` if a value cannot be parsed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), CacheConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_env(&lookup, "CONFCACHE_ENABLED")? {
            self.enabled = value;
        }
        if let Some(value) = parse_env(&lookup, "CONFCACHE_CAPACITY")? {
            self.capacity = value;
        }
        if let Some(value) = parse_env(&lookup, "CONFCACHE_REFRESH_INTERVAL_MS")? {
            self.refresh_interval_ms = value;
        }
        if let Some(value) = parse_env(&lookup, "CONFCACHE_FETCH_TIMEOUT_MS")? {
            self.fetch_timeout_ms = value;
        }
        Ok(())
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_env<T, F>(lookup: &F, name: &str) -> Result<Option<T>, CacheConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| CacheConfigError::InvalidEnv { name: name.to_string(), value: raw })
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: Option<CacheConfig>,
}

/// Load cache configuration from a TOML file.
///
/// Reads the `[cache]` table. A missing file or a missing table yields the
/// default configuration.
///
/// # Errors
/// Returns error if the file exists but cannot be read, parsed or validated.
pub fn load_cache_config(path: &Path) -> Result<CacheConfig, CacheConfigError> {
    if !path.exists() {
        return Ok(CacheConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&content)?;
    let config = file.cache.unwrap_or_default();
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 500);
        assert_eq!(config.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_validation_invalid_capacity() {
        let config = CacheConfig { capacity: 0, ..CacheConfig::default() };
        assert!(matches!(config.validate(), Err(CacheConfigError::InvalidCapacity)));
    }

    #[test]
    fn test_cache_config_validation_invalid_interval() {
        let config = CacheConfig { refresh_interval_ms: 0, ..CacheConfig::default() };
        assert!(matches!(config.validate(), Err(CacheConfigError::InvalidRefreshInterval)));
    }

    #[test]
    fn test_cache_config_validation_invalid_timeout() {
        let config = CacheConfig { fetch_timeout_ms: 0, ..CacheConfig::default() };
        assert!(matches!(config.validate(), Err(CacheConfigError::InvalidFetchTimeout)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CONFCACHE_ENABLED", "false"),
            ("CONFCACHE_CAPACITY", " 42 "),
            ("CONFCACHE_REFRESH_INTERVAL_MS", "1500"),
        ]);
        let mut config = CacheConfig::default();
        config.apply_env_overrides(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();

        assert!(!config.enabled);
        assert_eq!(config.capacity, 42);
        assert_eq!(config.refresh_interval_ms, 1500);
        assert_eq!(config.fetch_timeout_ms, 10_000);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = CacheConfig::default();
        let result = config.apply_env_overrides(|name| {
            (name == "CONFCACHE_CAPACITY").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(CacheConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_load_cache_config_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let config = load_cache_config(&temp.path().join("confcache.toml")).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_load_cache_config_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("confcache.toml");
        std::fs::write(
            &path,
            r#"
[cache]
enabled = true
capacity = 20
refresh_interval_ms = 30000
"#,
        )
        .unwrap();

        let config = load_cache_config(&path).unwrap();
        assert_eq!(config.capacity, 20);
        assert_eq!(config.refresh_interval_ms, 30_000);
        assert_eq!(config.fetch_timeout_ms, 10_000);
    }

    #[test]
    fn test_load_cache_config_default_when_section_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("confcache.toml");
        std::fs::write(&path, "[other]\nvalue = \"test\"\n").unwrap();

        let config = load_cache_config(&path).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_load_cache_config_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("confcache.toml");
        std::fs::write(&path, "[cache]\ncapacity = 0\n").unwrap();

        assert!(matches!(load_cache_config(&path), Err(CacheConfigError::InvalidCapacity)));
    }
}
