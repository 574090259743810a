//! # XFDU Codec
//!
//! Name-keyed codec registry and the transform pipeline engine.
//!
//! The engine only knows the capability traits in [`registry`]; the concrete
//! algorithms shipped here (MD5, CRC32, deflate/zlib/gzip, ChaCha20-Poly1305,
//! HMAC-SHA-256, keyed BLAKE3, PBKDF2) are registered by
//! [`CodecRegistry::with_defaults`] and can be replaced or extended.
//!
//! ## Example
//!
//! ```
//! use xfdu_codec::{decode, encode, CodecRegistry};
//! use xfdu_core::{Transform, TransformKind};
//!
//! let registry = CodecRegistry::with_defaults();
//! let chain = [Transform::new(TransformKind::Compression, "gzip")];
//! let stored = encode(b"payload", &chain, &registry).unwrap();
//! assert_eq!(decode(&stored, &chain, &registry).unwrap(), b"payload");
//! ```

pub mod checksum;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use error::{CodecError, Family, Result};
pub use pipeline::{decode, encode, ordered_chain};
pub use registry::{
    Authenticator, ChecksumAlgorithm, CodecRegistry, KeyDerivationFunction, PayloadValidator,
    TransformCodec,
};
