//! ByteSource trait: the I/O collaborator that maps a file location to bytes.
//!
//! The core never touches storage directly. A source enforces its own bounds
//! (size, time); callers only see a fetch that either completes or fails.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use xfdu_core::{LocatorType, Reference};

use crate::error::{Result, StoreError};

/// Async access to the payload files of one package.
#[async_trait]
pub trait ByteSource: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the whole entry a reference points at.
    async fn fetch(&self, location: &Reference) -> Result<Bytes>;

    /// Length of the entry in bytes.
    async fn size(&self, location: &Reference) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Inventory
    // ─────────────────────────────────────────────────────────────────────────

    /// Every stored entry, as normalized paths relative to the package root,
    /// sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Whether the entry exists.
    async fn exists(&self, location: &Reference) -> Result<bool> {
        match self.size(location).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    async fn fetch(&self, location: &Reference) -> Result<Bytes> {
        (**self).fetch(location).await
    }

    async fn size(&self, location: &Reference) -> Result<u64> {
        (**self).size(location).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        (**self).list().await
    }
}

/// Normalize an href into a package-relative entry path.
///
/// `./a/./b` becomes `a/b`. Empty, absolute, scheme-qualified and
/// parent-escaping paths are rejected.
pub fn normalize_href(href: &str) -> Result<String> {
    let invalid = |reason: &str| StoreError::InvalidLocation {
        href: href.to_string(),
        reason: reason.to_string(),
    };

    if href.contains("://") {
        return Err(invalid("only package-relative paths are supported"));
    }
    if href.starts_with('/') || href.starts_with('\\') || href.get(1..2) == Some(":") {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut parts = Vec::new();
    for segment in href.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid("path escapes the package root")),
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(parts.join("/"))
}

/// The entry path a reference names, checking its locator.
pub fn entry_path(location: &Reference) -> Result<String> {
    if location.locator_type == LocatorType::Other {
        return Err(StoreError::UnsupportedLocator {
            href: location.href.clone(),
            locator: format!(
                "OTHER ({})",
                location.other_locator_type.as_deref().unwrap_or("unspecified")
            ),
        });
    }
    if location.locator() != xfdu_core::data::DEFAULT_LOCATOR {
        return Err(StoreError::UnsupportedLocator {
            href: location.href.clone(),
            locator: location.locator().to_string(),
        });
    }
    normalize_href(&location.href)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_href() {
        assert_eq!(normalize_href("./measurement/s1a.tiff").unwrap(), "measurement/s1a.tiff");
        assert_eq!(normalize_href("a/./b//c").unwrap(), "a/b/c");
        assert_eq!(normalize_href("manifest.safe").unwrap(), "manifest.safe");
    }

    #[test]
    fn test_rejected_hrefs() {
        for href in ["../secret", "a/../../b", "/etc/passwd", "C:\\data", "http://example.org/x", "", "./"] {
            assert!(
                matches!(normalize_href(href), Err(StoreError::InvalidLocation { .. })),
                "{href} accepted"
            );
        }
    }

    #[test]
    fn test_entry_path_locators() {
        assert_eq!(entry_path(&Reference::url("./a.dat")).unwrap(), "a.dat");
        assert!(matches!(
            entry_path(&Reference::other("./a.dat", "DOI")),
            Err(StoreError::UnsupportedLocator { .. })
        ));
        let mut nested = Reference::url("./a.zip");
        nested.locator = Some("/inner/entry".into());
        assert!(matches!(entry_path(&nested), Err(StoreError::UnsupportedLocator { .. })));
    }
}
