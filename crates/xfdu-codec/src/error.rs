//! Error types for codecs and the transform pipeline.

use std::fmt;

use thiserror::Error;

/// A family of named algorithms in the codec registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Checksum,
    Compression,
    Encryption,
    Authentication,
    KeyDerivation,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Checksum => "checksum",
            Family::Compression => "compression",
            Family::Encryption => "encryption",
            Family::Authentication => "authentication",
            Family::KeyDerivation => "key derivation",
        })
    }
}

/// Errors raised by codecs and the pipeline engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No algorithm of this name is registered in the family.
    #[error("unknown {family} algorithm '{name}'")]
    UnknownAlgorithm { family: Family, name: String },

    /// An authentication tag did not verify.
    #[error("authentication failed for '{algorithm}'")]
    AuthenticationFailed { algorithm: String },

    /// A codec rejected its input.
    #[error("transform '{algorithm}' failed: {message}")]
    Transform { algorithm: String, message: String },

    /// The transform needs key material and no secret is configured.
    #[error("transform '{algorithm}' requires a key but no secret is configured")]
    KeyRequired { algorithm: String },

    /// A key derivation function rejected its parameters.
    #[error("key derivation '{name}' failed: {message}")]
    KeyDerivation { name: String, message: String },

    /// A payload does not conform to its representation schema.
    #[error("payload of type '{mime_type}' is invalid: {message}")]
    InvalidPayload { mime_type: String, message: String },

    /// The chain's order hints cannot be reconciled.
    #[error("ambiguous transform order: {reason}")]
    AmbiguousOrder { reason: String },
}

impl CodecError {
    pub(crate) fn transform(algorithm: &str, message: impl fmt::Display) -> Self {
        CodecError::Transform {
            algorithm: algorithm.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
