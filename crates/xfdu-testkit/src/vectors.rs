//! Golden scenarios and checksum vectors.
//!
//! Every implementation of the package reader must agree on these outcomes.
//! The scenarios only describe inputs and the expected result; the
//! integration tests of the `xfdu` crate run them end to end.

use xfdu_codec::CodecRegistry;
use xfdu_core::{Element, KeyDerivation, Salt, Transform, TransformKind};
use xfdu_store::MemorySource;

use crate::fixtures::{abcd_fixture, PackageFixture};

/// A known digest.
#[derive(Debug, Clone)]
pub struct ChecksumVector {
    pub algorithm: &'static str,
    pub input: &'static [u8],
    /// Expected digest, lower-case hex.
    pub digest: &'static str,
}

/// Digests of the default checksum algorithms.
pub fn checksum_vectors() -> Vec<ChecksumVector> {
    vec![
        ChecksumVector {
            algorithm: "MD5",
            input: b"",
            digest: "d41d8cd98f00b204e9800998ecf8427e",
        },
        ChecksumVector {
            algorithm: "MD5",
            input: b"abc",
            digest: "900150983cd24fb0d6963f7d28e17f72",
        },
        ChecksumVector {
            algorithm: "CRC32",
            input: b"",
            digest: "00000000",
        },
        ChecksumVector {
            algorithm: "CRC32",
            input: b"123456789",
            digest: "cbf43926",
        },
    ]
}

/// Check a registry against every checksum vector, returning
/// `(algorithm, matches, computed)` per vector.
pub fn verify_checksum_vectors(registry: &CodecRegistry) -> Vec<(String, bool, String)> {
    checksum_vectors()
        .iter()
        .map(|v| {
            let computed = registry
                .compute_checksum(v.algorithm, v.input)
                .unwrap_or_else(|e| e.to_string());
            (v.algorithm.to_string(), computed == v.digest, computed)
        })
        .collect()
}

/// The outcome a scenario must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// Opening succeeds and the data object materializes to these bytes.
    Materializes {
        data_object: &'static str,
        bytes: &'static [u8],
    },
    /// Building entities fails with a malformed-entity error.
    Malformed,
    /// Resolution reports this identifier as declared twice.
    DuplicateIdentifier { id: &'static str },
    /// Resolution reports this reference as dangling.
    UnresolvedReference { reference: &'static str },
    /// Materialization stops on a checksum mismatch of this stream.
    ChecksumMismatch {
        data_object: &'static str,
        stream: &'static str,
    },
}

/// A golden scenario: a manifest, its payload and the expected outcome.
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub manifest: Element,
    pub source: MemorySource,
    pub registry: CodecRegistry,
    pub expected: Expected,
}

impl Scenario {
    fn from_fixture(
        name: &'static str,
        description: &'static str,
        fixture: PackageFixture,
        expected: Expected,
    ) -> Self {
        let (manifest, source, registry) = fixture.into_parts();
        Self {
            name,
            description,
            manifest,
            source,
            registry,
            expected,
        }
    }
}

/// Get all golden scenarios.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::from_fixture(
            "concat",
            "two byte streams 'AB' and 'CD' concatenate in document order",
            abcd_fixture(),
            Expected::Materializes {
                data_object: "D1",
                bytes: b"ABCD",
            },
        ),
        tampered_checksum(),
        short_salt(),
        Scenario::from_fixture(
            "duplicate-metadata-id",
            "two metadata objects share an identifier",
            abcd_fixture().schema("measurementSchema"),
            Expected::DuplicateIdentifier {
                id: "measurementSchema",
            },
        ),
        Scenario::from_fixture(
            "dangling-rep-id",
            "a data object names a representation that is not declared",
            PackageFixture::new()
                .schema("measurementSchema")
                .data_object("D1", "missingSchema", &[b"AB"]),
            Expected::UnresolvedReference {
                reference: "missingSchema",
            },
        ),
        Scenario::from_fixture(
            "compressed-encrypted",
            "a gzip then ChaCha20-Poly1305 chain split over two streams",
            PackageFixture::new()
                .schema("measurementSchema")
                .encoded_data_object(
                    "D1",
                    "measurementSchema",
                    &[b"SAFE ", b"measurement"],
                    vec![Transform::new(TransformKind::Compression, "gzip"), encryption()],
                ),
            Expected::Materializes {
                data_object: "D1",
                bytes: b"SAFE measurement",
            },
        ),
    ]
}

fn tampered_checksum() -> Scenario {
    let mut fixture = abcd_fixture();
    let registry = fixture.registry();
    let stream = &mut fixture.data_object_mut("D1").byte_streams[1];
    stream.checksum.value = registry
        .compute_checksum("MD5", b"XX")
        .unwrap_or_default();
    Scenario::from_fixture(
        "tampered-checksum",
        "the second stream's declared checksum no longer matches its bytes",
        fixture,
        Expected::ChecksumMismatch {
            data_object: "D1",
            stream: "./measurement/D1-2.dat",
        },
    )
}

fn short_salt() -> Scenario {
    let fixture = PackageFixture::new()
        .schema("measurementSchema")
        .encoded_data_object("D1", "measurementSchema", &[b"AB"], vec![encryption()]);
    let mut scenario = Scenario::from_fixture(
        "short-salt",
        "a key derivation salt of 15 characters",
        fixture,
        Expected::Malformed,
    );
    set_attribute(&mut scenario.manifest, "keyDerivation", "salt", "0123456789abcde");
    scenario
}

fn encryption() -> Transform {
    let salt = Salt::parse("0123456789abcdef").expect("16-character salt");
    Transform::new(TransformKind::Encryption, "chacha20poly1305")
        .with_key_derivation(KeyDerivation::new("pbkdf2-hmac-sha256", salt, 100))
}

/// Overwrite an attribute on every element with the given local name.
pub fn set_attribute(el: &mut Element, element: &str, attribute: &str, value: &str) {
    if el.is(element) {
        for (name, v) in el.attributes.iter_mut() {
            if name == attribute {
                *v = value.to_string();
            }
        }
    }
    for child in el.children.iter_mut() {
        set_attribute(child, element, attribute, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_matches_checksum_vectors() {
        for (algorithm, matches, computed) in verify_checksum_vectors(&CodecRegistry::with_defaults()) {
            assert!(matches, "{algorithm} computed {computed}");
        }
    }

    #[test]
    fn test_scenario_names_are_unique() {
        let scenarios = all_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_short_salt_reaches_the_manifest() {
        let scenario = short_salt();
        let mut salts = Vec::new();
        collect_salts(&scenario.manifest, &mut salts);
        assert_eq!(salts, vec!["0123456789abcde".to_string()]);
    }

    fn collect_salts(el: &Element, out: &mut Vec<String>) {
        if el.is("keyDerivation") {
            out.extend(el.get("salt").map(str::to_string));
        }
        for child in &el.children {
            collect_salts(child, out);
        }
    }
}
