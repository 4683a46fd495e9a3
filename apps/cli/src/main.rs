//! confcache CLI - read configurations through a self-refreshing cache
//!
//! Serves files below a root directory as configurations, keeping them in a
//! bounded cache that is refreshed in the background. Configurations can also
//! be created, updated and deleted.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// confcache - self-refreshing configuration cache
#[derive(Parser, Debug)]
#[command(
    name = "confcache",
    author,
    version,
    about = "Read configurations through a self-refreshing, capacity-bounded cache"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Config file (defaults to ./confcache.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory configurations are read from
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Disable caching (overrides config and environment)
    #[arg(long, global = true)]
    no_cache: bool,

    /// Cache capacity (overrides config and environment)
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Fetch timeout in milliseconds (overrides config and environment)
    #[arg(long, global = true)]
    fetch_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one configuration
    Get {
        /// Configuration key, relative to the root directory
        key: String,

        /// Read straight from the source, bypassing the cache
        #[arg(long)]
        ignore_cache: bool,

        /// Output the entry and its metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep configurations cached and report changes picked up by refreshes
    Watch {
        /// Configuration keys to watch
        #[arg(required = true)]
        keys: Vec<String>,

        /// Refresh interval in milliseconds (overrides config and environment)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Create a new configuration
    Create {
        /// Configuration key, relative to the root directory
        key: String,

        /// Content of the configuration
        value: Option<String>,

        /// Read the content from this file instead
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Replace the content of an existing configuration
    Update {
        /// Configuration key, relative to the root directory
        key: String,

        /// New content
        value: Option<String>,

        /// Read the content from this file instead
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Delete a configuration
    Delete {
        /// Configuration key, relative to the root directory
        key: String,
    },

    /// Print the effective cache configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration: file, then environment, then flags
    let mut cache_config = config::load_config(args.config.as_deref())?;
    if args.no_cache {
        cache_config.enabled = false;
    }
    if let Some(capacity) = args.capacity {
        cache_config.capacity = capacity;
    }
    if let Some(timeout) = args.fetch_timeout_ms {
        cache_config.fetch_timeout_ms = timeout;
    }

    match args.command {
        Command::Get { key, ignore_cache, json } => {
            commands::get::execute(&args.root, cache_config, &key, ignore_cache, json).await?;
        }
        Command::Watch { keys, interval_ms, duration_secs } => {
            if let Some(interval) = interval_ms {
                cache_config.refresh_interval_ms = interval;
            }
            let duration = duration_secs.map(Duration::from_secs);
            commands::watch::execute(&args.root, cache_config, &keys, duration).await?;
        }
        Command::Create { key, value, from_file } => {
            let content = commands::write::Content::from_args(value, from_file)?;
            commands::write::create(&args.root, &key, content).await?;
        }
        Command::Update { key, value, from_file } => {
            let content = commands::write::Content::from_args(value, from_file)?;
            commands::write::update(&args.root, &key, content).await?;
        }
        Command::Delete { key } => {
            commands::write::delete(&args.root, &key).await?;
        }
        Command::Config => {
            commands::config::execute(&cache_config)?;
        }
    }

    Ok(())
}
