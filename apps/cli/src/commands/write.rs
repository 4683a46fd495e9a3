//! `confcache create`, `update` and `delete`: write to the configuration store.

use anyhow::{Context, Result};
use confcache_core::{ConfigWriter, FileSource};
use std::path::{Path, PathBuf};

/// Where new content comes from.
#[derive(Debug)]
pub enum Content {
    /// Given on the command line.
    Inline(String),
    /// Read from a file.
    File(PathBuf),
}

impl Content {
    /// Build from the `<value>` argument and `--from-file` flag.
    pub fn from_args(value: Option<String>, from_file: Option<PathBuf>) -> Result<Self> {
        match (value, from_file) {
            (Some(value), None) => Ok(Self::Inline(value)),
            (None, Some(path)) => Ok(Self::File(path)),
            (Some(_), Some(_)) => anyhow::bail!("Pass either a value or --from-file, not both"),
            (None, None) => anyhow::bail!("Missing content: pass a value or --from-file"),
        }
    }

    async fn load(self) -> Result<String> {
        match self {
            Self::Inline(value) => Ok(value),
            Self::File(path) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// Execute the create command.
pub async fn create(root: &Path, key: &str, content: Content) -> Result<()> {
    let content = content.load().await?;
    let token = FileSource::new(root)
        .create(key, &content)
        .await
        .with_context(|| format!("Failed to create configuration '{}'", key))?;
    println!("created {} ({})", key, token);
    Ok(())
}

/// Execute the update command.
pub async fn update(root: &Path, key: &str, content: Content) -> Result<()> {
    let content = content.load().await?;
    let token = FileSource::new(root)
        .update(key, &content)
        .await
        .with_context(|| format!("Failed to update configuration '{}'", key))?;
    println!("updated {} ({})", key, token);
    Ok(())
}

/// Execute the delete command.
pub async fn delete(root: &Path, key: &str) -> Result<()> {
    FileSource::new(root)
        .delete(key)
        .await
        .with_context(|| format!("Failed to delete configuration '{}'", key))?;
    println!("deleted {}", key);
    Ok(())
}
