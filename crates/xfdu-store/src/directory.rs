//! Byte source over a package directory on disk.
//!
//! Hrefs are resolved against the package root and must stay inside it,
//! symlinks included. Reads are bounded by [`SourceConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::debug;
use xfdu_core::Reference;

use crate::error::{Result, StoreError};
use crate::traits::{entry_path, ByteSource};

/// Read bounds for a directory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Largest entry that will be read, in bytes.
    pub max_stream_bytes: u64,
    /// Time allowed for reading one entry.
    pub read_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_stream_bytes: 4 * 1024 * 1024 * 1024,
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// A package laid out as files under one root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    config: SourceConfig,
}

impl DirectorySource {
    /// Open a package directory with default bounds.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .map_err(|e| StoreError::io(&root.display().to_string(), e))?;
        Ok(Self {
            root,
            config: SourceConfig::default(),
        })
    }

    /// Replace the read bounds (builder style).
    pub fn with_config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Map a reference to a file inside the root.
    async fn locate(&self, location: &Reference) -> Result<PathBuf> {
        let relative = entry_path(location)?;
        let path = tokio::fs::canonicalize(self.root.join(&relative))
            .await
            .map_err(|e| StoreError::io(&location.href, e))?;
        if !path.starts_with(&self.root) {
            return Err(StoreError::InvalidLocation {
                href: location.href.clone(),
                reason: "resolves outside the package root".into(),
            });
        }
        Ok(path)
    }

    async fn file_len(&self, location: &Reference, path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| StoreError::io(&location.href, e))?;
        if !metadata.is_file() {
            return Err(StoreError::InvalidLocation {
                href: location.href.clone(),
                reason: "not a regular file".into(),
            });
        }
        Ok(metadata.len())
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Read at most `limit + 1` bytes, enough to tell an oversized file.
async fn read_bounded(path: &Path, limit: u64) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut data = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .await?;
    Ok(data)
}

#[async_trait]
impl ByteSource for DirectorySource {
    async fn fetch(&self, location: &Reference) -> Result<Bytes> {
        let path = self.locate(location).await?;
        let len = self.file_len(location, &path).await?;
        if len > self.config.max_stream_bytes {
            return Err(StoreError::TooLarge {
                href: location.href.clone(),
                size: len,
                limit: self.config.max_stream_bytes,
            });
        }

        // The file may grow after the length check; the read is bounded
        // again on its own.
        let limit = self.config.max_stream_bytes;
        let after = self.config.read_timeout;
        let data = match tokio::time::timeout(after, read_bounded(&path, limit)).await {
            Ok(read) => read.map_err(|e| StoreError::io(&location.href, e))?,
            Err(_) => {
                return Err(StoreError::Timeout {
                    href: location.href.clone(),
                    after,
                })
            }
        };
        if data.len() as u64 > limit {
            return Err(StoreError::TooLarge {
                href: location.href.clone(),
                size: data.len() as u64,
                limit,
            });
        }
        debug!(href = %location.href, len = data.len(), "fetched from directory");
        Ok(Bytes::from(data))
    }

    async fn size(&self, location: &Reference) -> Result<u64> {
        let path = self.locate(location).await?;
        self.file_len(location, &path).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let root_href = self.root.display().to_string();
        let io = |e: std::io::Error| StoreError::io(&root_href, e);

        let mut entries = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir).await.map_err(io)?;
            while let Some(entry) = reader.next_entry().await.map_err(io)? {
                let file_type = entry.file_type().await.map_err(io)?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(rel) = self.relative(&path) {
                    entries.push(rel);
                }
            }
        }
        entries.sort();
        debug!(root = %root_href, entries = entries.len(), "listed package directory");
        Ok(entries)
    }
}
