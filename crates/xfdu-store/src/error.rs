//! Error types for byte sources.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while locating or reading a stored entry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored under this href.
    #[error("no stored entry for '{href}'")]
    NotFound { href: String },

    /// The href cannot name an entry inside the package.
    #[error("invalid location '{href}': {reason}")]
    InvalidLocation { href: String, reason: String },

    /// The reference uses a locator this source cannot follow.
    #[error("unsupported locator for '{href}': {locator}")]
    UnsupportedLocator { href: String, locator: String },

    /// The entry exceeds the configured read bound.
    #[error("'{href}' is {size} bytes, limit is {limit}")]
    TooLarge { href: String, size: u64, limit: u64 },

    /// The read did not finish in time.
    #[error("reading '{href}' timed out after {after:?}")]
    Timeout { href: String, after: Duration },

    /// I/O error.
    #[error("I/O error on '{href}': {source}")]
    Io {
        href: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// The href the error is about.
    pub fn href(&self) -> &str {
        match self {
            StoreError::NotFound { href }
            | StoreError::InvalidLocation { href, .. }
            | StoreError::UnsupportedLocator { href, .. }
            | StoreError::TooLarge { href, .. }
            | StoreError::Timeout { href, .. }
            | StoreError::Io { href, .. } => href,
        }
    }

    pub(crate) fn io(href: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                href: href.to_string(),
            }
        } else {
            StoreError::Io {
                href: href.to_string(),
                source,
            }
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
