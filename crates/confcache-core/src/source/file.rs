//! Directory-backed configuration source.

use async_trait::async_trait;
use confcache_abstraction::{ConfigSource, ConfigWriter, ContinuationToken, Fetched, SourceError};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Serves `root/<key>` files as configurations.
///
/// The token is the SHA-256 of the file content, so replaying it answers
/// "unchanged" until the file is edited. A deleted file is `NotFound`.
/// Writes through [`ConfigWriter`] create parent directories as needed.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory configurations are read from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a path below the root.
    ///
    /// Only plain relative components are accepted.
    fn resolve(&self, key: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(key);
        let plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(SourceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn io_error(path: &Path, e: &std::io::Error) -> SourceError {
        SourceError::Request(format!("{}: {e}", path.display()))
    }

    fn digest(content: &str) -> ContinuationToken {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        ContinuationToken::new(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch(
        &self,
        key: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<Fetched, SourceError> {
        let path = self.resolve(key)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::NotFound(key.to_string()));
            }
            Err(e) => return Err(Self::io_error(&path, &e)),
        };

        let current = Self::digest(&content);
        if token == Some(&current) {
            debug!(key = %key, "File unchanged since last fetch");
            return Ok(Fetched::unchanged(current));
        }
        Ok(Fetched::changed(content, current))
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[async_trait]
impl ConfigWriter for FileSource {
    async fn create(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Self::io_error(parent, &e))?;
        }

        let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SourceError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(Self::io_error(&path, &e)),
        };
        file.write_all(content.as_bytes()).await.map_err(|e| Self::io_error(&path, &e))?;
        file.flush().await.map_err(|e| Self::io_error(&path, &e))?;

        info!(key = %key, "Created configuration file");
        Ok(Self::digest(content))
    }

    async fn update(&self, key: &str, content: &str) -> Result<ContinuationToken, SourceError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(SourceError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::NotFound(key.to_string()));
            }
            Err(e) => return Err(Self::io_error(&path, &e)),
        }

        tokio::fs::write(&path, content).await.map_err(|e| Self::io_error(&path, &e))?;

        info!(key = %key, "Updated configuration file");
        Ok(Self::digest(content))
    }

    async fn delete(&self, key: &str) -> Result<(), SourceError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(key = %key, "Deleted configuration file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SourceError::NotFound(key.to_string())),
            Err(e) => Err(Self::io_error(&path, &e)),
        }
    }
}
