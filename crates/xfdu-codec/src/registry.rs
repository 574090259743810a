//! Capability traits per algorithm family and the name-keyed registry.
//!
//! Names come straight from manifests and are matched exactly
//! (case-sensitive).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::checksum::{Crc32, Md5Checksum};
use crate::compression::{Deflate, Gzip, Zlib};
use crate::crypto::{Blake3Keyed, ChaChaPoly, HmacSha256, Pbkdf2Sha256};
use crate::error::{CodecError, Family, Result};

/// A digest algorithm used by `checksum` elements.
pub trait ChecksumAlgorithm: Send + Sync {
    /// Registry name (the manifest's `checksumName`).
    fn name(&self) -> &str;

    /// Digest rendered as lower-case hex.
    fn digest(&self, data: &[u8]) -> String;
}

/// A reversible byte transform (compression or encryption).
pub trait TransformCodec: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `encode`/`decode` need key material.
    fn needs_key(&self) -> bool {
        false
    }

    fn encode(&self, data: &[u8], key: Option<&[u8]>) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8], key: Option<&[u8]>) -> Result<Vec<u8>>;
}

/// A keyed message authentication code.
pub trait Authenticator: Send + Sync {
    fn name(&self) -> &str;

    /// Length of the tags produced by [`Authenticator::tag`].
    fn tag_len(&self) -> usize;

    fn tag(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>>;

    /// Check a tag. Implementations compare in constant time.
    fn verify(&self, data: &[u8], tag: &[u8], key: &[u8]) -> Result<bool>;
}

/// A key derivation function.
pub trait KeyDerivationFunction: Send + Sync {
    fn name(&self) -> &str;

    fn derive(&self, key: &[u8], salt: &[u8], iterations: u64) -> Result<Vec<u8>>;
}

/// Checks a stored payload against its representation schema.
///
/// Registered per MIME type; streams of other types are not checked.
pub trait PayloadValidator: Send + Sync {
    /// The byte stream `mimeType` this validator handles.
    fn mime_type(&self) -> &str;

    /// `Err(CodecError::InvalidPayload)` when `payload` does not conform to
    /// `schema`.
    fn validate(&self, payload: &[u8], schema: &[u8]) -> Result<()>;
}

/// Name-keyed lookup of every codec family, plus the secret that key
/// derivation starts from.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    checksums: HashMap<String, Arc<dyn ChecksumAlgorithm>>,
    compression: HashMap<String, Arc<dyn TransformCodec>>,
    encryption: HashMap<String, Arc<dyn TransformCodec>>,
    authentication: HashMap<String, Arc<dyn Authenticator>>,
    key_derivation: HashMap<String, Arc<dyn KeyDerivationFunction>>,
    payload_validators: HashMap<String, Arc<dyn PayloadValidator>>,
    secret: Option<Arc<[u8]>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in codec.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_checksum(Md5Checksum)
            .with_checksum(Crc32)
            .with_compression(Deflate::default())
            .with_compression(Zlib::default())
            .with_compression(Gzip::default())
            .with_encryption(ChaChaPoly)
            .with_authenticator(HmacSha256)
            .with_authenticator(Blake3Keyed)
            .with_key_derivation(Pbkdf2Sha256)
    }

    /// Set the secret used as the first key of derivation chains.
    pub fn with_secret(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.secret = Some(Arc::from(secret.as_ref()));
        self
    }

    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_checksum(mut self, algorithm: impl ChecksumAlgorithm + 'static) -> Self {
        self.checksums
            .insert(algorithm.name().to_string(), Arc::new(algorithm));
        self
    }

    /// Re-register the built-in compression codecs with a bound on
    /// decompressed output.
    pub fn with_decompression_limit(self, max_output_bytes: u64) -> Self {
        self.with_compression(Deflate { max_output_bytes })
            .with_compression(Zlib { max_output_bytes })
            .with_compression(Gzip { max_output_bytes })
    }

    pub fn with_compression(mut self, codec: impl TransformCodec + 'static) -> Self {
        self.compression.insert(codec.name().to_string(), Arc::new(codec));
        self
    }

    pub fn with_encryption(mut self, codec: impl TransformCodec + 'static) -> Self {
        self.encryption.insert(codec.name().to_string(), Arc::new(codec));
        self
    }

    pub fn with_authenticator(mut self, auth: impl Authenticator + 'static) -> Self {
        self.authentication.insert(auth.name().to_string(), Arc::new(auth));
        self
    }

    pub fn with_key_derivation(mut self, kdf: impl KeyDerivationFunction + 'static) -> Self {
        self.key_derivation.insert(kdf.name().to_string(), Arc::new(kdf));
        self
    }

    pub fn with_payload_validator(mut self, validator: impl PayloadValidator + 'static) -> Self {
        self.payload_validators
            .insert(validator.mime_type().to_string(), Arc::new(validator));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    pub fn checksum(&self, name: &str) -> Result<&dyn ChecksumAlgorithm> {
        lookup(&self.checksums, Family::Checksum, name)
    }

    pub fn compression(&self, name: &str) -> Result<&dyn TransformCodec> {
        lookup(&self.compression, Family::Compression, name)
    }

    pub fn encryption(&self, name: &str) -> Result<&dyn TransformCodec> {
        lookup(&self.encryption, Family::Encryption, name)
    }

    pub fn authenticator(&self, name: &str) -> Result<&dyn Authenticator> {
        lookup(&self.authentication, Family::Authentication, name)
    }

    pub fn key_derivation(&self, name: &str) -> Result<&dyn KeyDerivationFunction> {
        lookup(&self.key_derivation, Family::KeyDerivation, name)
    }

    /// The validator for a MIME type, if one is registered.
    pub fn payload_validator(&self, mime_type: &str) -> Option<&dyn PayloadValidator> {
        self.payload_validators.get(mime_type).map(|v| &**v)
    }

    /// Names of every registered checksum algorithm, sorted.
    pub fn checksum_names(&self) -> Vec<&str> {
        sorted_names(&self.checksums)
    }

    /// Digest `data` with the named checksum algorithm.
    pub fn compute_checksum(&self, name: &str, data: &[u8]) -> Result<String> {
        Ok(self.checksum(name)?.digest(data))
    }
}

fn lookup<'a, T: ?Sized>(
    map: &'a HashMap<String, Arc<T>>,
    family: Family,
    name: &str,
) -> Result<&'a T> {
    map.get(name)
        .map(|codec| &**codec)
        .ok_or_else(|| CodecError::UnknownAlgorithm {
            family,
            name: name.to_string(),
        })
}

fn sorted_names<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("checksums", &sorted_names(&self.checksums))
            .field("compression", &sorted_names(&self.compression))
            .field("encryption", &sorted_names(&self.encryption))
            .field("authentication", &sorted_names(&self.authentication))
            .field("key_derivation", &sorted_names(&self.key_derivation))
            .field("payload_validators", &sorted_names(&self.payload_validators))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
