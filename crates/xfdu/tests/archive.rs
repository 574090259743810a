//! End-to-end tests of the Archive over memory and directory sources.

use std::path::Path;

use bytes::Bytes;
use proptest::prelude::*;
use xfdu::codec::{CodecError, PayloadValidator};
use xfdu::core::{resolve, Package, Reference, Rule, Severity};
use xfdu::store::{ByteSource, DirectorySource, MemorySource, StoreError};
use xfdu::{Archive, ArchiveConfig, ArchiveError, Check, MaterializationError, Verdict};
use xfdu_testkit::fixtures::{abcd_fixture, PackageFixture};
use xfdu_testkit::generators::{fixture_from_params, PackageParams};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn open(fixture: PackageFixture, config: ArchiveConfig) -> Archive<MemorySource> {
    let (manifest, source, registry) = fixture.into_parts();
    match Archive::with_registry(&manifest, source, registry, config) {
        Ok(archive) => archive,
        Err(e) => panic!("fixture failed to open: {e}"),
    }
}

/// Copy every stored entry of a memory source into a directory.
async fn unpack(source: &MemorySource, dir: &Path) {
    for entry in source.list().await.unwrap() {
        let bytes = source.fetch(&Reference::url(entry.as_str())).await.unwrap();
        let path = dir.join(&entry);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, &bytes).unwrap();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Opening
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_emitted_manifest_matches_input() {
    let fixture = abcd_fixture();
    let manifest = fixture.manifest();
    let archive = open(fixture, ArchiveConfig::default());
    assert_eq!(archive.to_element(), manifest);
    assert!(archive.report().is_empty());
}

#[test]
fn test_invalid_package_is_rejected() {
    // a single metadata object is below the section minimum
    let mut fixture = abcd_fixture();
    fixture
        .package
        .metadata_section
        .as_mut()
        .unwrap()
        .retain(|m| m.id.as_str() != "processing");
    let (manifest, source, registry) = fixture.into_parts();

    match Archive::with_registry(&manifest, source, registry.clone(), ArchiveConfig::default()) {
        Err(ArchiveError::Invalid(report)) => {
            assert_eq!(report.by_rule(Rule::MetadataCardinality).count(), 1);
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("invalid package opened"),
    }

    let lenient = ArchiveConfig {
        reject_invalid: false,
        ..ArchiveConfig::default()
    };
    let archive = Archive::with_registry(&manifest, MemorySource::new(), registry, lenient).unwrap();
    assert!(!archive.report().is_valid());
}

#[test]
fn test_registry_checksums_extend_the_validator() {
    // SHA-1 is not a default algorithm, so this package is invalid...
    let mut fixture = abcd_fixture();
    fixture.data_object_mut("D1").byte_streams[0].checksum.algorithm = "SHA-1".into();
    let (manifest, source, registry) = fixture.into_parts();
    assert!(matches!(
        Archive::with_registry(&manifest, source, registry, ArchiveConfig::default()),
        Err(ArchiveError::Invalid(_))
    ));

    // ...unless the validator is told to accept it
    let config = ArchiveConfig {
        validator: xfdu::ValidatorConfig::default().with_checksum_algorithms(["SHA-1"]),
        ..ArchiveConfig::default()
    };
    let archive = Archive::open(&manifest, MemorySource::new(), config).unwrap();
    assert!(archive.report().is_valid());
}

// ─────────────────────────────────────────────────────────────────────────────
// Materialization
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_data_object() {
    let archive = open(abcd_fixture(), ArchiveConfig::default());
    assert!(matches!(
        archive.materialize("D9").await,
        Err(MaterializationError::UnknownDataObject { ref id }) if id == "D9"
    ));
}

#[tokio::test]
async fn test_materialize_all_reports_each_object() {
    init_tracing();
    let fixture = PackageFixture::new()
        .schema("measurementSchema")
        .data_object("D1", "measurementSchema", &[b"AB", b"CD"])
        .data_object("D2", "measurementSchema", &[b"EF"]);
    fixture.store("./measurement/D2-1.dat", "XX");
    let archive = open(fixture, ArchiveConfig::default());

    let results = archive.materialize_all().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.as_str(), "D1");
    assert_eq!(results[0].1.as_ref().unwrap(), &Bytes::from("ABCD"));
    assert!(matches!(
        results[1].1,
        Err(MaterializationError::ChecksumMismatch { .. })
    ));
}

#[tokio::test]
async fn test_strict_size_from_config() {
    let mut fixture = abcd_fixture();
    fixture.data_object_mut("D1").size = Some(5);
    let strict = ArchiveConfig {
        strict_size: true,
        reject_invalid: false,
        ..ArchiveConfig::default()
    };
    let archive = open(fixture, strict);
    assert_eq!(archive.report().by_rule(Rule::DeclaredSize).count(), 1);
    assert!(matches!(
        archive.materialize("D1").await,
        Err(MaterializationError::SizeMismatch {
            declared: 5,
            actual: 4,
            ..
        })
    ));
}

#[tokio::test]
async fn test_other_locator_is_a_fetch_error() {
    let mut fixture = abcd_fixture();
    fixture.data_object_mut("D1").byte_streams[1].file_location =
        Reference::other("urn:esa:D1-2", "URN");
    let archive = open(fixture, ArchiveConfig::default());
    assert!(matches!(
        archive.materialize("D1").await,
        Err(MaterializationError::Fetch {
            source: StoreError::UnsupportedLocator { .. },
            ..
        })
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory source
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_directory_package() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (manifest, memory, registry) = abcd_fixture().into_parts();
    unpack(&memory, dir.path()).await;

    let source = DirectorySource::open(dir.path()).unwrap();
    let archive = Archive::with_registry(&manifest, source, registry, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.materialize("D1").await.unwrap(), Bytes::from("ABCD"));

    let report = archive.verify().await.unwrap();
    assert_eq!(report.verdict(), Verdict::Clean, "{:?}", report.findings());
}

#[tokio::test]
async fn test_verify_accumulates_findings() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = PackageFixture::new()
        .schema("measurementSchema")
        .data_object("D1", "measurementSchema", &[b"AB", b"CD"])
        .data_object("D2", "measurementSchema", &[b"EFGH"]);
    let (manifest, memory, registry) = fixture.into_parts();
    unpack(&memory, dir.path()).await;

    // same length, different bytes
    std::fs::write(dir.path().join("measurement/D1-2.dat"), "CX").unwrap();
    // gone
    std::fs::remove_file(dir.path().join("measurement/D2-1.dat")).unwrap();
    // nobody refers to it
    std::fs::write(dir.path().join("measurement/stray.dat"), "?").unwrap();

    let source = DirectorySource::open(dir.path()).unwrap();
    let archive = Archive::with_registry(&manifest, source, registry, ArchiveConfig::default()).unwrap();
    let report = archive.verify().await.unwrap();

    assert_eq!(report.verdict(), Verdict::Errors);
    let checksum: Vec<_> = report.by_check(Check::Checksum).collect();
    assert_eq!(checksum.len(), 1);
    assert_eq!(checksum[0].subject, "./measurement/D1-2.dat");

    let missing: Vec<_> = report.by_check(Check::Existence).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].subject, "./measurement/D2-1.dat");

    let stray: Vec<_> = report.by_check(Check::UnreferencedEntry).collect();
    assert_eq!(stray.len(), 1);
    assert_eq!(stray[0].subject, "measurement/stray.dat");
    assert_eq!(stray[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_verify_missing_representation_schema_is_an_error() {
    let fixture = abcd_fixture();
    fixture.source.remove("./support/measurementSchema.xsd").unwrap();

    let archive = open(fixture, ArchiveConfig::default());
    let report = archive.verify().await.unwrap();
    assert_eq!(report.verdict(), Verdict::Errors);
    let missing: Vec<_> = report.by_check(Check::Existence).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].subject, "./support/measurementSchema.xsd");
    assert_eq!(missing[0].severity, Severity::Error);
}

#[tokio::test]
async fn test_verify_warns_on_missing_unused_schema() {
    let fixture = abcd_fixture().schema("annotationSchema");
    fixture.source.remove("./support/annotationSchema.xsd").unwrap();

    let archive = open(fixture, ArchiveConfig::default());
    let report = archive.verify().await.unwrap();
    assert_eq!(report.verdict(), Verdict::Warnings);
    let missing: Vec<_> = report.by_check(Check::Existence).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::Warning);
}

/// Accepts documents that start with `<`, given a stored schema.
struct AngleBracketXml;

impl PayloadValidator for AngleBracketXml {
    fn mime_type(&self) -> &str {
        "text/xml"
    }

    fn validate(&self, payload: &[u8], schema: &[u8]) -> xfdu::codec::Result<()> {
        assert!(schema.starts_with(b"<xs:schema"));
        if payload.starts_with(b"<") {
            Ok(())
        } else {
            Err(CodecError::InvalidPayload {
                mime_type: "text/xml".into(),
                message: "not an XML document".into(),
            })
        }
    }
}

#[tokio::test]
async fn test_verify_checks_xml_payloads_against_schema() {
    let mut fixture = PackageFixture::new()
        .schema("measurementSchema")
        .data_object("D1", "measurementSchema", &[b"<a/>"])
        .data_object("D2", "measurementSchema", &[b"EFGH"])
        .data_object("D3", "measurementSchema", &[b"IJKL"]);
    for id in ["D1", "D2"] {
        fixture.data_object_mut(id).byte_streams[0].mime_type = "text/xml".into();
    }
    let (manifest, source, registry) = fixture.into_parts();
    let registry = registry.with_payload_validator(AngleBracketXml);
    let archive =
        Archive::with_registry(&manifest, source, registry, ArchiveConfig::default()).unwrap();

    let report = archive.verify().await.unwrap();
    assert_eq!(report.verdict(), Verdict::Errors);
    let invalid: Vec<_> = report.by_check(Check::Payload).collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].subject, "./measurement/D2-1.dat");
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_resolve_then_emit_round_trips(params: PackageParams) {
        let manifest = fixture_from_params(&params).manifest();
        let graph = resolve(Package::from_element(&manifest).unwrap()).unwrap();
        prop_assert_eq!(graph.to_element(), manifest);
    }

    #[test]
    fn test_generated_objects_materialize(params: PackageParams) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let archive = open(fixture_from_params(&params), ArchiveConfig::default());

        for (i, object) in params.objects.iter().enumerate() {
            let id = format!("dataObject{i}");
            let bytes = runtime.block_on(archive.materialize(&id)).unwrap();
            prop_assert_eq!(&bytes[..], &object.chunks.concat()[..]);
        }
    }
}
