//! `confcache watch`: keep keys cached and report what refreshes change.

use anyhow::Result;
use confcache_core::CacheConfig;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Lowest poll period for change detection.
const MIN_POLL: Duration = Duration::from_millis(10);

/// Execute the watch command.
///
/// Primes the cache with `keys`, then lets the background refresh run and
/// prints a line for every key whose content changed or that the source no
/// longer has. Runs until `duration` elapses, or until Ctrl-C when no
/// duration is given. Requires caching to be enabled.
pub async fn execute(
    root: &Path,
    config: CacheConfig,
    keys: &[String],
    duration: Option<Duration>,
) -> Result<()> {
    if !config.enabled {
        anyhow::bail!("watch requires caching; remove --no-cache and unset CONFCACHE_ENABLED");
    }

    let poll = (config.refresh_interval() / 2).max(MIN_POLL);
    let cache = super::build_orchestrator(root, config)?;

    let mut seen: HashMap<String, String> = HashMap::new();
    for key in keys {
        match cache.get_content(key).await {
            Ok(content) => {
                seen.insert(key.clone(), content);
            }
            Err(e) => warn!(key = %key, error = %e, "Skipping key"),
        }
    }

    if seen.is_empty() {
        anyhow::bail!("None of the requested keys could be loaded");
    }
    println!("watching {} key(s)", seen.len());

    let deadline = duration.map(|duration| Instant::now() + duration);
    let mut ticker = time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        let mut removed = Vec::new();
        for (key, content) in &mut seen {
            let current = match cache.cached_entry(key) {
                Some(entry) => entry.content.clone(),
                // Dropped from the cache: gone upstream, or evicted for space
                None => match cache.get_content(key).await {
                    Ok(current) => current,
                    Err(e) if e.is_not_found() => {
                        removed.push(key.clone());
                        continue;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Could not reload key");
                        continue;
                    }
                },
            };
            if current != *content {
                println!("changed {}: {}", key, current.trim_end());
                *content = current;
            }
        }
        for key in removed {
            println!("removed {}", key);
            seen.remove(&key);
        }

        if seen.is_empty() {
            println!("no keys left to watch");
            break;
        }
    }

    let stats = cache.stats();
    println!(
        "sweeps={} refreshed={} unchanged={} errors={} not_found={}",
        stats.sweeps,
        stats.refreshed,
        stats.unchanged,
        stats.refresh_errors,
        stats.not_found_evictions
    );

    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
