//! Error types for the package API.

use thiserror::Error;
use xfdu_codec::CodecError;
use xfdu_core::{CoreError, ResolutionError, ValidationReport};
use xfdu_store::StoreError;

/// Errors that stop one data object from materializing.
///
/// Materialization fails fast: whichever error comes first is returned and
/// no partial bytes are produced.
#[derive(Debug, Error)]
pub enum MaterializationError {
    /// The package declares no data object with this identifier.
    #[error("no data object '{id}' in the package")]
    UnknownDataObject { id: String },

    /// Stored bytes do not match the declared checksum.
    #[error(
        "checksum mismatch for byte stream '{stream}' of data object '{data_object}': \
         {algorithm} declared {expected}, computed {actual}"
    )]
    ChecksumMismatch {
        data_object: String,
        stream: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// Several byte streams and no way to combine them.
    #[error("data object '{data_object}' has {streams} byte streams but no supported combination method")]
    UnsupportedCombination { data_object: String, streams: usize },

    /// Declared size disagrees with the bytes read (strict mode only).
    #[error("{subject}: declared size {declared}, actual {actual}")]
    SizeMismatch {
        subject: String,
        declared: u64,
        actual: u64,
    },

    /// The byte source could not deliver a stream.
    #[error("fetching byte stream '{stream}' of data object '{data_object}': {source}")]
    Fetch {
        data_object: String,
        stream: String,
        #[source]
        source: StoreError,
    },

    /// A checksum or transform codec failed.
    #[error("{subject}: {source}")]
    Transform {
        subject: String,
        #[source]
        source: CodecError,
    },

    /// Outstanding fetches were aborted before completing.
    #[error("materialization of data object '{data_object}' was cancelled")]
    Cancelled { data_object: String },
}

/// Errors raised by [`crate::Archive`].
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The manifest tree does not describe well-formed entities.
    #[error("malformed manifest: {0}")]
    Core(#[from] CoreError),

    /// An identifier reference could not be resolved.
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Structural validation found errors and the archive rejects invalid packages.
    #[error("invalid package: {} error(s), first: {}", .0.errors().count(), first_error(.0))]
    Invalid(ValidationReport),

    /// A data object failed to materialize.
    #[error("materialization failed: {0}")]
    Materialization(#[from] MaterializationError),

    /// The byte source failed outside of a single stream fetch.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

fn first_error(report: &ValidationReport) -> String {
    report
        .errors()
        .next()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
