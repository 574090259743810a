//! In-memory byte source.
//!
//! Used by tests and by callers that already hold a package in memory (for
//! example after unpacking an archive).

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use xfdu_core::Reference;

use crate::error::{Result, StoreError};
use crate::traits::{entry_path, normalize_href, ByteSource};

/// Entries keyed by normalized path. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<BTreeMap<String, Bytes>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry (builder style).
    pub fn with(self, path: &str, data: impl Into<Bytes>) -> Result<Self> {
        self.insert(path, data)?;
        Ok(self)
    }

    /// Store or replace an entry.
    pub fn insert(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let key = normalize_href(path)?;
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, data.into());
        Ok(())
    }

    /// Remove an entry, returning its bytes.
    pub fn remove(&self, path: &str) -> Result<Option<Bytes>> {
        let key = normalize_href(path)?;
        Ok(self
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, location: &Reference) -> Result<Bytes> {
        let key = entry_path(location)?;
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                href: location.href.clone(),
            })
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn fetch(&self, location: &Reference) -> Result<Bytes> {
        let data = self.get(location)?;
        debug!(href = %location.href, len = data.len(), "fetched from memory");
        Ok(data)
    }

    async fn size(&self, location: &Reference) -> Result<u64> {
        Ok(self.get(location)?.len() as u64)
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_and_size() {
        let source = MemorySource::new().with("./measurement/B1", "AB").unwrap();
        let location = Reference::url("measurement/B1");
        assert_eq!(source.fetch(&location).await.unwrap(), Bytes::from("AB"));
        assert_eq!(source.size(&location).await.unwrap(), 2);
        assert!(source.exists(&location).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let source = MemorySource::new();
        let location = Reference::url("./nothing");
        assert!(matches!(
            source.fetch(&location).await,
            Err(StoreError::NotFound { ref href }) if href == "./nothing"
        ));
        assert!(!source.exists(&location).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted_and_normalized() {
        let source = MemorySource::new()
            .with("./z.dat", "z")
            .unwrap()
            .with("a/./b.dat", "b")
            .unwrap();
        assert_eq!(source.list().await.unwrap(), vec!["a/b.dat", "z.dat"]);
        assert_eq!(source.remove("./z.dat").unwrap(), Some(Bytes::from("z")));
        assert_eq!(source.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let source = MemorySource::new();
        assert!(source.insert("../outside", "x").is_err());
        assert!(matches!(
            source.fetch(&Reference::url("../outside")).await,
            Err(StoreError::InvalidLocation { .. })
        ));
    }
}
