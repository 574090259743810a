//! Data objects, byte streams and the references that locate them.

use serde::{Deserialize, Serialize};

use crate::canonical::{
    at_most_one, id_list, names, non_empty_text, only_children, optional, optional_count,
    optional_id, parse_count, required, required_child,
};
use crate::error::CoreError;
use crate::transform::{transforms_of, Transform};
use crate::tree::Element;
use crate::types::{ByteOrder, CombinationMethod, Id, LocatorType};

/// Default value of a reference's `locator` attribute.
pub const DEFAULT_LOCATOR: &str = "/";

/// A reference to an external resource.
///
/// Shared by file locations, metadata references, mechanisms and interface
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: Option<Id>,
    pub href: String,
    pub locator_type: LocatorType,
    pub other_locator_type: Option<String>,
    pub locator: Option<String>,
    pub text_info: Option<String>,
}

impl Reference {
    /// A URL reference to `href`.
    pub fn url(href: impl Into<String>) -> Self {
        Self {
            id: None,
            href: href.into(),
            locator_type: LocatorType::Url,
            other_locator_type: None,
            locator: None,
            text_info: None,
        }
    }

    /// A reference using a locator scheme outside the URL vocabulary.
    pub fn other(href: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            locator_type: LocatorType::Other,
            other_locator_type: Some(scheme.into()),
            ..Self::url(href)
        }
    }

    /// The effective locator, `/` when none is declared.
    pub fn locator(&self) -> &str {
        self.locator.as_deref().unwrap_or(DEFAULT_LOCATOR)
    }

    /// Whether an `OTHER` locator names its scheme.
    pub fn has_scheme(&self) -> bool {
        match self.locator_type {
            LocatorType::Url => true,
            LocatorType::Other => self
                .other_locator_type
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty()),
        }
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        Ok(Self {
            id: optional_id(el, "ID")?,
            href: required(el, "href")?.to_string(),
            locator_type: LocatorType::parse(
                el.local_name(),
                "locatorType",
                required(el, "locatorType")?,
            )?,
            other_locator_type: optional(el, "otherLocatorType"),
            locator: optional(el, "locator"),
            text_info: optional(el, "textInfo"),
        })
    }

    /// Emit with the given element name.
    pub(crate) fn to_element(&self, name: impl Into<String>) -> Element {
        Element::new(name)
            .attr_opt("ID", self.id.as_ref().map(Id::as_str))
            .attr("locatorType", self.locator_type.as_str())
            .attr_opt("otherLocatorType", self.other_locator_type.as_deref())
            .attr_opt("locator", self.locator.as_deref())
            .attr_opt("textInfo", self.text_info.as_deref())
            .attr("href", self.href.as_str())
    }
}

/// A declared checksum: algorithm name plus digest text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// Algorithm name (`checksumName`), matched case-sensitively.
    pub algorithm: String,
    pub value: String,
}

impl Checksum {
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value: value.into(),
        }
    }

    /// Compare against a computed hex digest.
    ///
    /// Surrounding whitespace and ASCII case in the declared value are ignored.
    pub fn matches(&self, computed: &str) -> bool {
        self.value.trim().eq_ignore_ascii_case(computed.trim())
    }

    fn from_element(el: &Element) -> Result<Self, CoreError> {
        Ok(Self {
            algorithm: required(el, "checksumName")?.to_string(),
            value: non_empty_text(el)?,
        })
    }

    fn to_element(&self) -> Element {
        Element::new(names::CHECKSUM)
            .attr("checksumName", self.algorithm.as_str())
            .text(self.value.as_str())
    }
}

/// One physical file or segment of a data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteStream {
    pub id: Option<Id>,
    pub mime_type: String,
    /// Declared length in bytes.
    pub size: Option<u64>,
    pub file_location: Reference,
    pub checksum: Checksum,
    pub byte_order: Option<ByteOrder>,
    pub average_bit_rate: Option<u64>,
    /// Stream-level transform chain, in document order.
    pub transforms: Vec<Transform>,
}

const STREAM_CHILDREN: &[&str] = &[
    names::FILE_LOCATION,
    names::CHECKSUM,
    names::BYTE_ORDER,
    names::AVERAGE_BIT_RATE,
    names::TRANSFORM_OBJECT,
];

impl ByteStream {
    pub fn new(mime_type: impl Into<String>, file_location: Reference, checksum: Checksum) -> Self {
        Self {
            id: None,
            mime_type: mime_type.into(),
            size: None,
            file_location,
            checksum,
            byte_order: None,
            average_bit_rate: None,
            transforms: Vec::new(),
        }
    }

    /// Identifier or href, for diagnostics.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => self.file_location.href.clone(),
        }
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(el, STREAM_CHILDREN)?;

        let byte_order = at_most_one(el, names::BYTE_ORDER)?
            .map(|b| ByteOrder::parse(names::BYTE_ORDER, "value", &non_empty_text(b)?))
            .transpose()?;
        let average_bit_rate = at_most_one(el, names::AVERAGE_BIT_RATE)?
            .map(|r| parse_count(names::AVERAGE_BIT_RATE, "value", &non_empty_text(r)?))
            .transpose()?;

        Ok(Self {
            id: optional_id(el, "ID")?,
            mime_type: required(el, "mimeType")?.to_string(),
            size: optional_count(el, "size")?,
            file_location: Reference::from_element(required_child(el, names::FILE_LOCATION)?)?,
            checksum: Checksum::from_element(required_child(el, names::CHECKSUM)?)?,
            byte_order,
            average_bit_rate,
            transforms: transforms_of(el)?,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut el = Element::new(names::BYTE_STREAM)
            .attr_opt("ID", self.id.as_ref().map(Id::as_str))
            .attr("mimeType", self.mime_type.as_str())
            .attr_opt("size", self.size.map(|s| s.to_string()))
            .child(self.file_location.to_element(names::FILE_LOCATION))
            .child(self.checksum.to_element());
        if let Some(order) = self.byte_order {
            el = el.child(Element::new(names::BYTE_ORDER).text(order.as_str()));
        }
        if let Some(rate) = self.average_bit_rate {
            el = el.child(Element::new(names::AVERAGE_BIT_RATE).text(rate.to_string()));
        }
        el.children(self.transforms.iter().map(Transform::to_element))
    }
}

/// A logical payload backed by one or more byte streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub id: Id,
    /// Representation metadata, never empty.
    pub rep_ids: Vec<Id>,
    /// Declared total size in bytes.
    pub size: Option<u64>,
    pub combination: Option<CombinationMethod>,
    pub registration_authority: Option<String>,
    pub registered_id: Option<String>,
    /// Byte streams in document order, never empty.
    pub byte_streams: Vec<ByteStream>,
    /// Data-object-level transform chain, in document order.
    pub transforms: Vec<Transform>,
}

impl DataObject {
    /// Primary (first) representation.
    pub fn primary_representation(&self) -> Option<&Id> {
        self.rep_ids.first()
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(el, &[names::BYTE_STREAM, names::TRANSFORM_OBJECT])?;

        let id = Id::parse(names::DATA_OBJECT, required(el, "ID")?)?;
        let rep_ids = id_list(el, "repID")?;
        if rep_ids.is_empty() {
            return Err(CoreError::malformed(
                names::DATA_OBJECT,
                format!("'{id}' must name at least one representation"),
            ));
        }
        let byte_streams = el
            .find_all(names::BYTE_STREAM)
            .map(ByteStream::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        if byte_streams.is_empty() {
            return Err(CoreError::malformed(
                names::DATA_OBJECT,
                format!("'{id}' has no byte stream"),
            ));
        }
        let combination = el
            .get("combinationName")
            .map(|c| CombinationMethod::parse(names::DATA_OBJECT, "combinationName", c))
            .transpose()?;

        Ok(Self {
            rep_ids,
            size: optional_count(el, "size")?,
            combination,
            registration_authority: optional(el, "registrationAuthority"),
            registered_id: optional(el, "registeredID"),
            byte_streams,
            transforms: transforms_of(el)?,
            id,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        Element::new(names::DATA_OBJECT)
            .attr("ID", self.id.as_str())
            .attr("repID", Id::join(&self.rep_ids))
            .attr_opt("size", self.size.map(|s| s.to_string()))
            .attr_opt("combinationName", self.combination.map(CombinationMethod::as_str))
            .attr_opt("registrationAuthority", self.registration_authority.as_deref())
            .attr_opt("registeredID", self.registered_id.as_deref())
            .children(self.byte_streams.iter().map(ByteStream::to_element))
            .children(self.transforms.iter().map(Transform::to_element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(href: &str, digest: &str) -> Element {
        Element::new("byteStream")
            .attr("mimeType", "application/octet-stream")
            .attr("size", "2")
            .child(
                Element::new("fileLocation")
                    .attr("locatorType", "URL")
                    .attr("href", href),
            )
            .child(Element::new("checksum").attr("checksumName", "MD5").text(digest))
    }

    #[test]
    fn test_parse_data_object() {
        let el = Element::new("dataObject")
            .attr("ID", "D1")
            .attr("repID", "M1Schema")
            .attr("combinationName", "concat")
            .child(stream("./B1", "b86fc6b051f63d73de262d4c34e3a0a9"))
            .child(stream("./B2", "2a1c4ea1e5b1ed8b5f3e08f3e0e7b1d3"));
        let d = DataObject::from_element(&el).unwrap();
        assert_eq!(d.byte_streams.len(), 2);
        assert_eq!(d.combination, Some(CombinationMethod::Concat));
        assert_eq!(d.primary_representation().unwrap().as_str(), "M1Schema");
        assert_eq!(d.byte_streams[0].file_location.locator(), "/");
        assert_eq!(d.byte_streams[1].size, Some(2));
    }

    #[test]
    fn test_data_object_requires_representation_and_stream() {
        let no_rep = Element::new("dataObject").attr("ID", "D1").child(stream("a", "00"));
        assert!(DataObject::from_element(&no_rep).is_err());

        let no_stream = Element::new("dataObject").attr("ID", "D1").attr("repID", "xSchema");
        assert!(DataObject::from_element(&no_stream).is_err());
    }

    #[test]
    fn test_unknown_combination_rejected() {
        let el = Element::new("dataObject")
            .attr("ID", "D1")
            .attr("repID", "xSchema")
            .attr("combinationName", "interleave")
            .child(stream("a", "00"));
        assert!(matches!(
            DataObject::from_element(&el),
            Err(CoreError::MalformedEntity { .. })
        ));
    }

    #[test]
    fn test_stream_requires_checksum_and_location() {
        let no_checksum = Element::new("byteStream")
            .attr("mimeType", "text/plain")
            .child(Element::new("fileLocation").attr("locatorType", "URL").attr("href", "a"));
        assert!(ByteStream::from_element(&no_checksum).is_err());

        let bad_locator = Element::new("byteStream")
            .attr("mimeType", "text/plain")
            .child(Element::new("fileLocation").attr("locatorType", "FTP").attr("href", "a"))
            .child(Element::new("checksum").attr("checksumName", "MD5").text("00"));
        assert!(ByteStream::from_element(&bad_locator).is_err());
    }

    #[test]
    fn test_negative_size_rejected() {
        let mut el = stream("a", "00");
        el.attributes.retain(|(k, _)| k != "size");
        let el = el.attr("size", "-1");
        assert!(ByteStream::from_element(&el).is_err());
    }

    #[test]
    fn test_raw_stream_metadata() {
        let el = stream("a", "00")
            .child(Element::new("byteOrder").text("BIG_ENDIAN"))
            .child(Element::new("averageBitRate").text("9600"));
        let s = ByteStream::from_element(&el).unwrap();
        assert_eq!(s.byte_order, Some(ByteOrder::BigEndian));
        assert_eq!(s.average_bit_rate, Some(9600));
        assert_eq!(ByteStream::from_element(&s.to_element()).unwrap(), s);
    }

    #[test]
    fn test_checksum_comparison() {
        let c = Checksum::new("MD5", " B86FC6B051F63D73DE262D4C34E3A0A9\n");
        assert!(c.matches("b86fc6b051f63d73de262d4c34e3a0a9"));
        assert!(!c.matches("00"));
    }

    #[test]
    fn test_other_locator_scheme() {
        assert!(Reference::url("a").has_scheme());
        assert!(Reference::other("a", "DOI").has_scheme());
        let mut blank = Reference::other("a", " ");
        assert!(!blank.has_scheme());
        blank.other_locator_type = None;
        assert!(!blank.has_scheme());
    }

    #[test]
    fn test_xlink_href_accepted() {
        let el = Element::new("fileLocation")
            .attr("locatorType", "URL")
            .attr("xlink:href", "./measurement/s1a.tiff");
        let r = Reference::from_element(&el).unwrap();
        assert_eq!(r.href, "./measurement/s1a.tiff");
    }
}
