//! Proptest generators for property-based testing.

use proptest::prelude::*;

use xfdu_core::{Category, Classification, Id, KeyDerivation, Salt, Transform, TransformKind};

use crate::fixtures::{id, PackageFixture};

/// Generate an NCName identifier stem (suffixes make it unique).
pub fn id_stem() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,11}".prop_map(String::from)
}

/// Generate a valid `xs:ID`.
pub fn identifier() -> impl Strategy<Value = Id> {
    id_stem().prop_map(|s| id(&s))
}

/// Generate a 16-character salt.
pub fn salt() -> impl Strategy<Value = Salt> {
    "[0-9a-f]{16}".prop_map(|s| Salt::parse(&s).expect("16 hex characters"))
}

/// Generate payload bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a metadata category.
pub fn category() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Rep),
        Just(Category::Pdi),
        Just(Category::Dmd),
        Just(Category::Other),
        Just(Category::Any),
    ]
}

/// Generate a metadata classification.
pub fn classification() -> impl Strategy<Value = Classification> {
    prop_oneof![
        Just(Classification::Ded),
        Just(Classification::Syntax),
        Just(Classification::Fixity),
        Just(Classification::Provenance),
        Just(Classification::Context),
        Just(Classification::Reference),
        Just(Classification::Description),
        Just(Classification::Other),
    ]
}

/// Generate a transform chain the default registry can run.
pub fn transform_chain() -> impl Strategy<Value = Vec<Transform>> {
    let step = prop_oneof![
        prop::sample::select(vec!["deflate", "zlib", "gzip"])
            .prop_map(|a| Transform::new(TransformKind::Compression, a)),
        (salt(), 1u64..=16).prop_map(|(salt, iterations)| {
            Transform::new(TransformKind::Encryption, "chacha20poly1305").with_key_derivation(
                KeyDerivation::new("pbkdf2-hmac-sha256", salt, iterations),
            )
        }),
        prop::sample::select(vec!["hmac-sha256", "blake3-keyed"])
            .prop_map(|a| Transform::new(TransformKind::Authentication, a)),
    ];
    prop::collection::vec(step, 0..=3)
}

/// Parameters for one generated data object.
#[derive(Debug, Clone)]
pub struct DataObjectParams {
    /// Payload of each byte stream, in order.
    pub chunks: Vec<Vec<u8>>,
    pub chain: Vec<Transform>,
}

impl Arbitrary for DataObjectParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (prop::collection::vec(payload(64), 1..=3), transform_chain())
            .prop_map(|(chunks, chain)| DataObjectParams { chunks, chain })
            .boxed()
    }
}

/// Parameters for a generated package.
#[derive(Debug, Clone)]
pub struct PackageParams {
    /// Representation schema identifiers (already suffixed `Schema`).
    pub schemas: Vec<String>,
    pub objects: Vec<DataObjectParams>,
    pub classification: Option<Classification>,
}

impl Arbitrary for PackageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::collection::btree_set(id_stem(), 1..=3),
            prop::collection::vec(any::<DataObjectParams>(), 1..=4),
            prop::option::of(classification()),
        )
            .prop_map(|(stems, objects, classification)| PackageParams {
                schemas: stems.into_iter().map(|s| format!("{s}Schema")).collect(),
                objects,
                classification,
            })
            .boxed()
    }
}

/// Build a fixture from parameters. Data object `i` is `dataObject{i}` and
/// uses schema `i mod schemas.len()`.
pub fn fixture_from_params(params: &PackageParams) -> PackageFixture {
    let mut fixture = params
        .schemas
        .iter()
        .fold(PackageFixture::new(), |f, schema| f.schema(schema));
    for (i, object) in params.objects.iter().enumerate() {
        let chunks: Vec<&[u8]> = object.chunks.iter().map(Vec::as_slice).collect();
        let schema = &params.schemas[i % params.schemas.len()];
        fixture = fixture.encoded_data_object(
            &format!("dataObject{i}"),
            schema,
            &chunks,
            object.chain.clone(),
        );
    }
    if let Some(section) = fixture.package.metadata_section.as_mut() {
        for object in section.iter_mut() {
            object.classification = params.classification;
        }
    }
    fixture
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfdu_core::{resolve, Package};

    proptest! {
        #[test]
        fn test_generated_packages_resolve(params: PackageParams) {
            let fixture = fixture_from_params(&params);
            let package = Package::from_element(&fixture.manifest()).unwrap();
            let graph = resolve(package).unwrap();
            prop_assert_eq!(graph.package().data_objects().len(), params.objects.len());
        }

        #[test]
        fn test_generated_ids_parse(stem in id_stem()) {
            prop_assert!(Id::parse("test", &stem).is_ok());
        }
    }
}
