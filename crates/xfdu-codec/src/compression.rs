//! Built-in compression codecs, backed by flate2.
//!
//! Decoders stop once the output would exceed `max_output_bytes`, so a
//! small stored stream cannot inflate without bound.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{CodecError, Result};
use crate::registry::TransformCodec;

/// Default bound on decompressed output (4 GiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 4 * 1024 * 1024 * 1024;

fn finish<W: Write>(
    name: &str,
    mut encoder: W,
    data: &[u8],
    done: impl FnOnce(W) -> std::io::Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    encoder
        .write_all(data)
        .map_err(|e| CodecError::transform(name, e))?;
    done(encoder).map_err(|e| CodecError::transform(name, e))
}

fn inflate(name: &str, decoder: impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| CodecError::transform(name, e))?;
    if out.len() as u64 > limit {
        return Err(CodecError::transform(
            name,
            format!("decompressed output exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}

/// Raw DEFLATE (RFC 1951).
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    pub max_output_bytes: u64,
}

impl Default for Deflate {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl TransformCodec for Deflate {
    fn name(&self) -> &str {
        "deflate"
    }

    fn encode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        let encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        finish(self.name(), encoder, data, DeflateEncoder::finish)
    }

    fn decode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        inflate(self.name(), DeflateDecoder::new(data), self.max_output_bytes)
    }
}

/// zlib container (RFC 1950).
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    pub max_output_bytes: u64,
}

impl Default for Zlib {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl TransformCodec for Zlib {
    fn name(&self) -> &str {
        "zlib"
    }

    fn encode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        let encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        finish(self.name(), encoder, data, ZlibEncoder::finish)
    }

    fn decode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        inflate(self.name(), ZlibDecoder::new(data), self.max_output_bytes)
    }
}

/// gzip container (RFC 1952).
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    pub max_output_bytes: u64,
}

impl Default for Gzip {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl TransformCodec for Gzip {
    fn name(&self) -> &str {
        "gzip"
    }

    fn encode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        finish(self.name(), encoder, data, GzEncoder::finish)
    }

    fn decode(&self, data: &[u8], _key: Option<&[u8]>) -> Result<Vec<u8>> {
        inflate(self.name(), GzDecoder::new(data), self.max_output_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_each_codec() {
        let data = b"s1a-iw-grd-vv-20141003t170425".repeat(40);
        let codecs: [&dyn TransformCodec; 3] =
            [&Deflate::default(), &Zlib::default(), &Gzip::default()];
        for codec in codecs {
            let packed = codec.encode(&data, None).unwrap();
            assert!(packed.len() < data.len(), "{} did not compress", codec.name());
            assert_eq!(codec.decode(&packed, None).unwrap(), data);
        }
    }

    #[test]
    fn test_garbage_is_a_transform_error() {
        let err = Gzip::default().decode(b"definitely not gzip", None).unwrap_err();
        assert!(matches!(err, CodecError::Transform { ref algorithm, .. } if algorithm == "gzip"));
    }

    #[test]
    fn test_output_bound_stops_a_bomb() {
        // a megabyte of zeros packs into about a kilobyte
        let zeros = vec![0u8; 1 << 20];
        let codecs: [&dyn TransformCodec; 3] = [
            &Deflate { max_output_bytes: 64 * 1024 },
            &Zlib { max_output_bytes: 64 * 1024 },
            &Gzip { max_output_bytes: 64 * 1024 },
        ];
        for codec in codecs {
            let packed = codec.encode(&zeros, None).unwrap();
            assert!(packed.len() < 64 * 1024);
            let err = codec.decode(&packed, None).unwrap_err();
            assert!(
                matches!(err, CodecError::Transform { ref message, .. } if message.contains("exceeds")),
                "{}: {err}",
                codec.name()
            );
        }
    }

    #[test]
    fn test_output_exactly_at_bound() {
        let data = vec![7u8; 1000];
        let codec = Zlib { max_output_bytes: 1000 };
        let packed = codec.encode(&data, None).unwrap();
        assert_eq!(codec.decode(&packed, None).unwrap(), data);
    }
}
