//! Test fixtures and helpers.
//!
//! A [`PackageFixture`] builds a package and its stored payload side by side,
//! so checksums and sizes in the manifest always match what is stored unless
//! a test tampers with one of them on purpose.

use bytes::Bytes;
use xfdu_codec::CodecRegistry;
use xfdu_core::{
    ByteStream, Category, Checksum, CombinationMethod, ContentNode, ContentUnit, DataObject,
    DataObjectPointer, Element, Id, MetadataBody, MetadataObject, MetadataReference, MetadataWrap,
    Package, Reference, Transform,
};
use xfdu_store::MemorySource;

/// Secret the fixture registry uses for keyed transforms.
pub const FIXTURE_SECRET: &[u8] = b"xfdu fixture secret";

/// Name of the stored manifest entry.
pub const MANIFEST_ENTRY: &str = "manifest.safe";

/// A package under construction plus the bytes it describes.
pub struct PackageFixture {
    pub package: Package,
    pub source: MemorySource,
    registry: CodecRegistry,
}

impl Default for PackageFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageFixture {
    /// A root unit and a `processing` metadata object.
    pub fn new() -> Self {
        let root = ContentUnit {
            id: Some(id("packageUnit")),
            unit_type: Some("SAFE Archive Information Package".to_string()),
            ..Default::default()
        };
        let mut package = Package::new("esa/safe/sentinel-1.0/test", root);
        package.metadata_section = Some(vec![MetadataObject {
            id: id("processing"),
            classification: None,
            category: Some(Category::Pdi),
            body: MetadataBody::Wrap(MetadataWrap {
                mime_type: Some("text/xml".to_string()),
                text_info: Some("Processing".to_string()),
                vocabulary_name: Some("SAFE".to_string()),
                xml_data: vec![Element::new("safe:processing").attr("name", "fixture")],
            }),
        }]);

        Self {
            package,
            source: MemorySource::new(),
            registry: CodecRegistry::with_defaults().with_secret(FIXTURE_SECRET),
        }
    }

    /// Add a representation schema stored at `./support/{id}.xsd`.
    pub fn schema(mut self, schema_id: &str) -> Self {
        let href = format!("./support/{schema_id}.xsd");
        self.store(&href, format!("<xs:schema id=\"{schema_id}\"/>"));
        self.metadata().push(MetadataObject {
            id: id(schema_id),
            classification: None,
            category: Some(Category::Rep),
            body: MetadataBody::Reference(MetadataReference {
                reference: Reference::url(href),
                vocabulary_name: Some("XSD".to_string()),
                mime_type: Some("text/xml".to_string()),
            }),
        });
        self
    }

    /// Add a data object whose streams store `chunks` verbatim, with a
    /// content unit pointing at it.
    pub fn data_object(self, object_id: &str, rep: &str, chunks: &[&[u8]]) -> Self {
        self.encoded_data_object(object_id, rep, chunks, Vec::new())
    }

    /// Like [`Self::data_object`], but the concatenation of `chunks` is
    /// first run through `chain`; the encoded bytes are split back into
    /// streams of the original chunk lengths, the last stream taking the rest.
    pub fn encoded_data_object(
        mut self,
        object_id: &str,
        rep: &str,
        chunks: &[&[u8]],
        chain: Vec<Transform>,
    ) -> Self {
        let plain: Vec<u8> = chunks.concat();
        let encoded = xfdu_codec::encode(&plain, &chain, &self.registry)
            .expect("fixture chain must encode");

        let mut pieces = Vec::with_capacity(chunks.len());
        let mut rest = encoded.as_slice();
        for (i, chunk) in chunks.iter().enumerate() {
            let take = if i + 1 == chunks.len() {
                rest.len()
            } else {
                chunk.len().min(rest.len())
            };
            let (head, tail) = rest.split_at(take);
            pieces.push(head.to_vec());
            rest = tail;
        }

        let byte_streams = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let href = format!("./measurement/{object_id}-{}.dat", i + 1);
                let stream = self.stream(&href, &piece);
                self.store(&href, piece);
                stream
            })
            .collect::<Vec<_>>();

        let object = DataObject {
            id: id(object_id),
            rep_ids: vec![id(rep)],
            size: Some(encoded.len() as u64),
            combination: (byte_streams.len() > 1).then_some(CombinationMethod::Concat),
            registration_authority: None,
            registered_id: None,
            byte_streams,
            transforms: chain,
        };
        self.push_data_object(object)
    }

    /// Add an already-built data object and a unit pointing at it.
    pub fn push_data_object(mut self, object: DataObject) -> Self {
        let unit = ContentUnit {
            id: Some(id(&format!("{}Unit", object.id))),
            unit_type: Some("Measurement Data Unit".to_string()),
            rep_ids: object.rep_ids.iter().take(1).cloned().collect(),
            data_object_pointer: Some(DataObjectPointer::to(object.id.clone())),
            ..Default::default()
        };
        self.package.root.children.push(ContentNode::ContentUnit(unit));
        self.package
            .data_object_section
            .get_or_insert_with(Vec::new)
            .push(object);
        self
    }

    /// A byte stream declaring the MD5 and size of `stored`.
    pub fn stream(&self, href: &str, stored: &[u8]) -> ByteStream {
        let digest = self
            .registry
            .compute_checksum("MD5", stored)
            .expect("MD5 is a default checksum");
        let mut stream = ByteStream::new(
            "application/octet-stream",
            Reference::url(href),
            Checksum::new("MD5", digest),
        );
        stream.size = Some(stored.len() as u64);
        stream
    }

    /// Store (or overwrite) an entry without touching the manifest.
    pub fn store(&self, href: &str, data: impl Into<Bytes>) {
        self.source
            .insert(href, data)
            .expect("fixture hrefs are package-relative");
    }

    /// Mutable access to a data object by identifier.
    pub fn data_object_mut(&mut self, object_id: &str) -> &mut DataObject {
        self.package
            .data_object_section
            .iter_mut()
            .flatten()
            .find(|d| d.id.as_str() == object_id)
            .expect("unknown fixture data object")
    }

    pub fn registry(&self) -> CodecRegistry {
        self.registry.clone()
    }

    /// The manifest tree, also stored as [`MANIFEST_ENTRY`].
    pub fn manifest(&self) -> Element {
        self.package.to_element()
    }

    /// Manifest, payload and registry, ready to open.
    pub fn into_parts(self) -> (Element, MemorySource, CodecRegistry) {
        let manifest = self.manifest();
        self.store(MANIFEST_ENTRY, "<xfdu:XFDU/>");
        (manifest, self.source, self.registry)
    }

    fn metadata(&mut self) -> &mut Vec<MetadataObject> {
        self.package.metadata_section.get_or_insert_with(Vec::new)
    }
}

/// Parse an identifier known to be valid.
pub fn id(value: &str) -> Id {
    Id::parse("fixture", value).expect("fixture identifiers are NCNames")
}

/// The package from the concatenation walkthrough: `D1` backed by streams
/// `"AB"` and `"CD"` under a representation schema.
pub fn abcd_fixture() -> PackageFixture {
    PackageFixture::new()
        .schema("measurementSchema")
        .data_object("D1", "measurementSchema", &[b"AB", b"CD"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfdu_core::{resolve, validate, TransformKind, ValidatorConfig};
    use xfdu_store::ByteSource;

    #[test]
    fn test_fixture_resolves_and_validates() {
        let fixture = abcd_fixture();
        let package = Package::from_element(&fixture.manifest()).unwrap();
        let graph = resolve(package).unwrap();
        let report = validate(&graph, &ValidatorConfig::default());
        assert!(report.is_empty(), "{:?}", report.violations());
    }

    #[tokio::test]
    async fn test_fixture_stores_streams() {
        let (_, source, _) = abcd_fixture().into_parts();
        assert_eq!(
            source.list().await.unwrap(),
            vec![
                "manifest.safe",
                "measurement/D1-1.dat",
                "measurement/D1-2.dat",
                "support/measurementSchema.xsd",
            ]
        );
        let b2 = source.fetch(&Reference::url("./measurement/D1-2.dat")).await.unwrap();
        assert_eq!(b2, Bytes::from("CD"));
    }

    #[test]
    fn test_encoded_object_declares_stored_size() {
        let fixture = PackageFixture::new().schema("xSchema").encoded_data_object(
            "D1",
            "xSchema",
            &[b"payload"],
            vec![Transform::new(TransformKind::Compression, "gzip")],
        );
        let object = &fixture.package.data_objects()[0];
        assert_eq!(object.transforms.len(), 1);
        assert_ne!(object.size, Some(7));
    }
}
