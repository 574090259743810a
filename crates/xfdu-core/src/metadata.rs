//! Metadata objects and the closed grammar their identifiers follow.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{names, only_children, optional, required, required_child};
use crate::content::DataObjectPointer;
use crate::data::Reference;
use crate::error::CoreError;
use crate::tree::Element;
use crate::types::{Category, Classification, Id};

/// Naming patterns a metadata object identifier may follow.
///
/// Variants are listed most specific first, so [`MetadataIdPattern::classify`]
/// reports `QualityInformation` rather than the broader `Information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataIdPattern {
    /// `processing`
    Processing,
    /// `(a|.+A)cquisitionPeriod`
    AcquisitionPeriod,
    /// `(p|.+P)latform`
    Platform,
    /// `.+Schema`
    Schema,
    /// `.+QualityInformation`
    QualityInformation,
    /// `.+OrbitReference`
    OrbitReference,
    /// `.+GridReference`
    GridReference,
    /// `.+FrameSet`
    FrameSet,
    /// `.+Index`
    Index,
    /// `.+Annotation`
    Annotation,
    /// `.+Information`
    Information,
}

impl MetadataIdPattern {
    pub const ALL: &'static [MetadataIdPattern] = &[
        MetadataIdPattern::Processing,
        MetadataIdPattern::AcquisitionPeriod,
        MetadataIdPattern::Platform,
        MetadataIdPattern::Schema,
        MetadataIdPattern::QualityInformation,
        MetadataIdPattern::OrbitReference,
        MetadataIdPattern::GridReference,
        MetadataIdPattern::FrameSet,
        MetadataIdPattern::Index,
        MetadataIdPattern::Annotation,
        MetadataIdPattern::Information,
    ];

    /// The pattern as written in the schema.
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataIdPattern::Processing => "processing",
            MetadataIdPattern::AcquisitionPeriod => "(a|.+A)cquisitionPeriod",
            MetadataIdPattern::Platform => "(p|.+P)latform",
            MetadataIdPattern::Schema => ".+Schema",
            MetadataIdPattern::QualityInformation => ".+QualityInformation",
            MetadataIdPattern::OrbitReference => ".+OrbitReference",
            MetadataIdPattern::GridReference => ".+GridReference",
            MetadataIdPattern::FrameSet => ".+FrameSet",
            MetadataIdPattern::Index => ".+Index",
            MetadataIdPattern::Annotation => ".+Annotation",
            MetadataIdPattern::Information => ".+Information",
        }
    }

    /// Whether `id` matches this pattern in full.
    pub fn matches(self, id: &str) -> bool {
        match self {
            MetadataIdPattern::Processing => id == "processing",
            MetadataIdPattern::AcquisitionPeriod => capitalized_suffix(id, "acquisitionPeriod"),
            MetadataIdPattern::Platform => capitalized_suffix(id, "platform"),
            MetadataIdPattern::Schema => proper_suffix(id, "Schema"),
            MetadataIdPattern::QualityInformation => proper_suffix(id, "QualityInformation"),
            MetadataIdPattern::OrbitReference => proper_suffix(id, "OrbitReference"),
            MetadataIdPattern::GridReference => proper_suffix(id, "GridReference"),
            MetadataIdPattern::FrameSet => proper_suffix(id, "FrameSet"),
            MetadataIdPattern::Index => proper_suffix(id, "Index"),
            MetadataIdPattern::Annotation => proper_suffix(id, "Annotation"),
            MetadataIdPattern::Information => proper_suffix(id, "Information"),
        }
    }

    /// The most specific pattern `id` matches, if any.
    pub fn classify(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.matches(id))
    }
}

impl fmt::Display for MetadataIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `.+suffix`: at least one character before `suffix`.
fn proper_suffix(id: &str, suffix: &str) -> bool {
    id.len() > suffix.len() && id.ends_with(suffix)
}

/// `(w|.+W)ord`: the bare lower-case word, or a prefix then the capitalized word.
fn capitalized_suffix(id: &str, word: &str) -> bool {
    if id == word {
        return true;
    }
    let mut chars = word.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return false,
    };
    proper_suffix(id, &capitalized)
}

/// Reference to an external metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataReference {
    pub reference: Reference,
    pub vocabulary_name: Option<String>,
    pub mime_type: Option<String>,
}

impl MetadataReference {
    fn from_element(el: &Element) -> Result<Self, CoreError> {
        Ok(Self {
            reference: Reference::from_element(el)?,
            vocabulary_name: optional(el, "vocabularyName"),
            mime_type: optional(el, "mimeType"),
        })
    }

    fn to_element(&self) -> Element {
        self.reference
            .to_element(names::METADATA_REFERENCE)
            .attr_opt("vocabularyName", self.vocabulary_name.as_deref())
            .attr_opt("mimeType", self.mime_type.as_deref())
    }
}

/// Metadata carried inline in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataWrap {
    pub mime_type: Option<String>,
    pub text_info: Option<String>,
    pub vocabulary_name: Option<String>,
    /// Children of `xmlData`, kept opaque.
    pub xml_data: Vec<Element>,
}

impl MetadataWrap {
    fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(el, &[names::XML_DATA])?;
        Ok(Self {
            mime_type: optional(el, "mimeType"),
            text_info: optional(el, "textInfo"),
            vocabulary_name: optional(el, "vocabularyName"),
            xml_data: required_child(el, names::XML_DATA)?.children.clone(),
        })
    }

    fn to_element(&self) -> Element {
        Element::new(names::METADATA_WRAP)
            .attr_opt("mimeType", self.mime_type.as_deref())
            .attr_opt("textInfo", self.text_info.as_deref())
            .attr_opt("vocabularyName", self.vocabulary_name.as_deref())
            .child(Element::new(names::XML_DATA).children(self.xml_data.iter().cloned()))
    }
}

/// The single body of a metadata object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataBody {
    Reference(MetadataReference),
    Wrap(MetadataWrap),
    Pointer(DataObjectPointer),
}

impl MetadataBody {
    /// The data object this body points at, if it is a pointer.
    pub fn data_object_id(&self) -> Option<&Id> {
        match self {
            MetadataBody::Pointer(p) => Some(&p.data_object_id),
            _ => None,
        }
    }

    fn to_element(&self) -> Element {
        match self {
            MetadataBody::Reference(r) => r.to_element(),
            MetadataBody::Wrap(w) => w.to_element(),
            MetadataBody::Pointer(p) => p.to_element(),
        }
    }
}

/// A metadata object of the metadata section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataObject {
    /// Identifier; its naming pattern is checked by the validator.
    pub id: Id,
    pub classification: Option<Classification>,
    pub category: Option<Category>,
    pub body: MetadataBody,
}

impl MetadataObject {
    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        let id = Id::parse(names::METADATA_OBJECT, required(el, "ID")?)?;

        let mut bodies = el.children.iter();
        let body_el = match (bodies.next(), bodies.next()) {
            (Some(body), None) => body,
            (None, _) => {
                return Err(CoreError::malformed(
                    names::METADATA_OBJECT,
                    format!("'{id}' has no body"),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(CoreError::malformed(
                    names::METADATA_OBJECT,
                    format!("'{id}' must have exactly one body"),
                ))
            }
        };
        let body = match body_el.local_name() {
            names::METADATA_REFERENCE => {
                MetadataBody::Reference(MetadataReference::from_element(body_el)?)
            }
            names::METADATA_WRAP => MetadataBody::Wrap(MetadataWrap::from_element(body_el)?),
            names::DATA_OBJECT_POINTER => {
                MetadataBody::Pointer(DataObjectPointer::from_element(body_el)?)
            }
            other => {
                return Err(CoreError::malformed(
                    names::METADATA_OBJECT,
                    format!("unexpected element '{other}'"),
                ))
            }
        };

        Ok(Self {
            classification: el
                .get("classification")
                .map(|v| Classification::parse(names::METADATA_OBJECT, "classification", v))
                .transpose()?,
            category: el
                .get("category")
                .map(|v| Category::parse(names::METADATA_OBJECT, "category", v))
                .transpose()?,
            body,
            id,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        Element::new(names::METADATA_OBJECT)
            .attr("ID", self.id.as_str())
            .attr_opt("classification", self.classification.map(Classification::as_str))
            .attr_opt("category", self.category.map(Category::as_str))
            .child(self.body.to_element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        use MetadataIdPattern as P;

        assert!(P::Processing.matches("processing"));
        assert!(!P::Processing.matches("xprocessing"));

        assert!(P::AcquisitionPeriod.matches("acquisitionPeriod"));
        assert!(P::AcquisitionPeriod.matches("s1AcquisitionPeriod"));
        assert!(!P::AcquisitionPeriod.matches("AcquisitionPeriod"));
        assert!(!P::AcquisitionPeriod.matches("s1acquisitionPeriod"));

        assert!(P::Platform.matches("platform"));
        assert!(P::Platform.matches("measurementPlatform"));
        assert!(!P::Platform.matches("Platform"));

        assert!(P::Schema.matches("s1Level1ProductSchema"));
        assert!(!P::Schema.matches("Schema"));
        assert!(!P::Schema.matches("schemaFile"));
    }

    #[test]
    fn test_classify_prefers_specific_pattern() {
        assert_eq!(
            MetadataIdPattern::classify("measurementQualityInformation"),
            Some(MetadataIdPattern::QualityInformation)
        );
        assert_eq!(
            MetadataIdPattern::classify("generalProductInformation"),
            Some(MetadataIdPattern::Information)
        );
        assert_eq!(
            MetadataIdPattern::classify("s1aiwgrdMeasurementIndex"),
            Some(MetadataIdPattern::Index)
        );
        assert_eq!(MetadataIdPattern::classify("M1"), None);
    }

    #[test]
    fn test_parse_each_body() {
        let reference = Element::new("metadataObject")
            .attr("ID", "s1Level1ProductSchema")
            .attr("category", "REP")
            .child(
                Element::new("metadataReference")
                    .attr("locatorType", "URL")
                    .attr("mimeType", "text/xml")
                    .attr("vocabularyName", "XML Schema")
                    .attr("href", "./support/s1-level-1-product.xsd"),
            );
        let m = MetadataObject::from_element(&reference).unwrap();
        assert_eq!(m.category, Some(Category::Rep));
        assert!(matches!(m.body, MetadataBody::Reference(_)));

        let wrap = Element::new("metadataObject")
            .attr("ID", "processing")
            .attr("classification", "PROVENANCE")
            .attr("category", "PDI")
            .child(
                Element::new("metadataWrap")
                    .attr("mimeType", "text/xml")
                    .child(Element::new("xmlData").child(Element::new("safe:processing"))),
            );
        let m = MetadataObject::from_element(&wrap).unwrap();
        match &m.body {
            MetadataBody::Wrap(w) => assert_eq!(w.xml_data[0].name, "safe:processing"),
            other => panic!("unexpected body {other:?}"),
        }

        let pointer = Element::new("metadataObject")
            .attr("ID", "s1QuicklookSchema")
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "quicklook"));
        let m = MetadataObject::from_element(&pointer).unwrap();
        assert_eq!(m.body.data_object_id().unwrap().as_str(), "quicklook");
    }

    #[test]
    fn test_exactly_one_body() {
        let none = Element::new("metadataObject").attr("ID", "processing");
        assert!(MetadataObject::from_element(&none).is_err());

        let two = Element::new("metadataObject")
            .attr("ID", "processing")
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "a"))
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "b"));
        assert!(MetadataObject::from_element(&two).is_err());
    }

    #[test]
    fn test_bad_vocabulary() {
        let el = Element::new("metadataObject")
            .attr("ID", "processing")
            .attr("category", "rep")
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "a"));
        assert!(matches!(
            MetadataObject::from_element(&el),
            Err(CoreError::MalformedEntity { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn test_suffix_patterns_need_a_prefix(prefix in "[a-z][a-zA-Z0-9]{0,12}") {
            for suffix in ["Schema", "Index", "Annotation", "FrameSet", "OrbitReference"] {
                let id = format!("{prefix}{suffix}");
                proptest::prop_assert!(MetadataIdPattern::classify(&id).is_some());
                proptest::prop_assert!(MetadataIdPattern::classify(suffix).is_none());
            }
        }

        #[test]
        fn test_classify_agrees_with_matches(id in "[a-zA-Z_][a-zA-Z0-9]{0,20}") {
            let any = MetadataIdPattern::ALL.iter().any(|p| p.matches(&id));
            proptest::prop_assert_eq!(MetadataIdPattern::classify(&id).is_some(), any);
        }
    }

    #[test]
    fn test_roundtrip() {
        let el = Element::new("metadataObject")
            .attr("ID", "platform")
            .attr("classification", "DESCRIPTION")
            .attr("category", "DMD")
            .child(
                Element::new("metadataWrap")
                    .attr("mimeType", "text/xml")
                    .attr("vocabularyName", "SAFE")
                    .child(
                        Element::new("xmlData")
                            .child(Element::new("safe:platform").child(Element::new("safe:familyName").text("SENTINEL-1"))),
                    ),
            );
        let m = MetadataObject::from_element(&el).unwrap();
        assert_eq!(MetadataObject::from_element(&m.to_element()).unwrap(), m);
    }
}
