//! Built-in checksum algorithms.

use md5::{Digest, Md5};

use crate::registry::ChecksumAlgorithm;

/// `MD5`, as used by SAFE manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Checksum;

impl ChecksumAlgorithm for Md5Checksum {
    fn name(&self) -> &str {
        "MD5"
    }

    fn digest(&self, data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

/// `CRC32` (IEEE), rendered as eight hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

impl ChecksumAlgorithm for Crc32 {
    fn name(&self) -> &str {
        "CRC32"
    }

    fn digest(&self, data: &[u8]) -> String {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        format!("{:08x}", crc.sum())
    }
}
