//! Built-in encryption, authentication and key derivation.
//!
//! Key material of any length is accepted: ciphers and keyed hashes that need
//! exactly 32 bytes condense it with BLAKE3 key derivation first.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{CodecError, Result};
use crate::registry::{Authenticator, KeyDerivationFunction, TransformCodec};

/// Nonce length of ChaCha20-Poly1305.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length.
const AEAD_TAG_LEN: usize = 16;

fn condense(context: &str, key: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, key)
}

fn require_key<'a>(algorithm: &str, key: Option<&'a [u8]>) -> Result<&'a [u8]> {
    key.ok_or_else(|| CodecError::KeyRequired {
        algorithm: algorithm.to_string(),
    })
}

/// ChaCha20-Poly1305 with a random nonce prefixed to the ciphertext.
///
/// Layout: `nonce (12) || ciphertext || tag (16)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaChaPoly;

impl ChaChaPoly {
    fn cipher(&self, key: Option<&[u8]>) -> Result<ChaCha20Poly1305> {
        let key = condense("xfdu chacha20poly1305 key", require_key(self.name(), key)?);
        ChaCha20Poly1305::new_from_slice(&key).map_err(|e| CodecError::transform(self.name(), e))
    }
}

impl TransformCodec for ChaChaPoly {
    fn name(&self) -> &str {
        "chacha20poly1305"
    }

    fn needs_key(&self) -> bool {
        true
    }

    fn encode(&self, data: &[u8], key: Option<&[u8]>) -> Result<Vec<u8>> {
        let cipher = self.cipher(key)?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|e| CodecError::transform(self.name(), e))?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decode(&self, data: &[u8], key: Option<&[u8]>) -> Result<Vec<u8>> {
        let cipher = self.cipher(key)?;
        if data.len() < NONCE_LEN + AEAD_TAG_LEN {
            return Err(CodecError::transform(
                self.name(),
                format!("ciphertext of {} bytes is too short", data.len()),
            ));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::transform(self.name(), "decryption failed"))
    }
}

/// HMAC-SHA-256 over the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256;

impl HmacSha256 {
    fn mac(&self, key: &[u8]) -> Result<Hmac<Sha256>> {
        <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|e| CodecError::transform(self.name(), e))
    }
}

impl Authenticator for HmacSha256 {
    fn name(&self) -> &str {
        "hmac-sha256"
    }

    fn tag_len(&self) -> usize {
        32
    }

    fn tag(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac(key)?;
        Mac::update(&mut mac, data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], tag: &[u8], key: &[u8]) -> Result<bool> {
        let mut mac = self.mac(key)?;
        Mac::update(&mut mac, data);
        Ok(mac.verify_slice(tag).is_ok())
    }
}

/// Keyed BLAKE3.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Keyed;

impl Authenticator for Blake3Keyed {
    fn name(&self) -> &str {
        "blake3-keyed"
    }

    fn tag_len(&self) -> usize {
        blake3::OUT_LEN
    }

    fn tag(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let key = condense("xfdu blake3-keyed authentication key", key);
        Ok(blake3::keyed_hash(&key, data).as_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], tag: &[u8], key: &[u8]) -> Result<bool> {
        let Ok(expected) = <[u8; blake3::OUT_LEN]>::try_from(tag) else {
            return Ok(false);
        };
        let key = condense("xfdu blake3-keyed authentication key", key);
        // blake3::Hash equality is constant time
        Ok(blake3::keyed_hash(&key, data) == blake3::Hash::from(expected))
    }
}

/// PBKDF2-HMAC-SHA-256 producing a 32-byte key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2Sha256;

impl KeyDerivationFunction for Pbkdf2Sha256 {
    fn name(&self) -> &str {
        "pbkdf2-hmac-sha256"
    }

    fn derive(&self, key: &[u8], salt: &[u8], iterations: u64) -> Result<Vec<u8>> {
        let rounds = u32::try_from(iterations)
            .ok()
            .filter(|&r| r > 0)
            .ok_or_else(|| CodecError::KeyDerivation {
                name: self.name().to_string(),
                message: format!("iteration count {iterations} is out of range"),
            })?;
        Ok(pbkdf2_hmac_array::<Sha256, 32>(key, salt, rounds).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chacha_roundtrip_and_fresh_nonce() {
        let key = Some(&b"correct horse battery staple"[..]);
        let a = ChaChaPoly.encode(b"payload", key).unwrap();
        let b = ChaChaPoly.encode(b"payload", key).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), NONCE_LEN + 7 + AEAD_TAG_LEN);
        assert_eq!(ChaChaPoly.decode(&a, key).unwrap(), b"payload");
    }

    #[test]
    fn test_chacha_wrong_key_or_short_input() {
        let sealed = ChaChaPoly.encode(b"payload", Some(&b"k1"[..])).unwrap();
        assert!(matches!(
            ChaChaPoly.decode(&sealed, Some(&b"k2"[..])),
            Err(CodecError::Transform { .. })
        ));
        assert!(ChaChaPoly.decode(&sealed[..10], Some(&b"k1"[..])).is_err());
        assert_eq!(
            ChaChaPoly.encode(b"x", None),
            Err(CodecError::KeyRequired {
                algorithm: "chacha20poly1305".into()
            })
        );
    }

    #[test]
    fn test_authenticators() {
        let auths: [&dyn Authenticator; 2] = [&HmacSha256, &Blake3Keyed];
        for auth in auths {
            let tag = auth.tag(b"data", b"key").unwrap();
            assert_eq!(tag.len(), auth.tag_len());
            assert!(auth.verify(b"data", &tag, b"key").unwrap());
            assert!(!auth.verify(b"dat4", &tag, b"key").unwrap());
            assert!(!auth.verify(b"data", &tag, b"other").unwrap());
            assert!(!auth.verify(b"data", &tag[1..], b"key").unwrap());
        }
    }

    #[test]
    fn test_pbkdf2_deterministic() {
        let a = Pbkdf2Sha256.derive(b"secret", b"0123456789abcdef", 100).unwrap();
        let b = Pbkdf2Sha256.derive(b"secret", b"0123456789abcdef", 100).unwrap();
        let c = Pbkdf2Sha256.derive(b"secret", b"0123456789abcdef", 101).unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Pbkdf2Sha256.derive(b"secret", b"salt", 0).is_err());
        assert!(Pbkdf2Sha256.derive(b"secret", b"salt", u64::MAX).is_err());
    }
}
