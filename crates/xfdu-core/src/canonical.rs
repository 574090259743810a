//! Conversion between the generic attributed tree and typed entities.
//!
//! Decoding enforces local, type-level constraints only (required
//! attributes and children, vocabularies, identifier syntax, numeric ranges).
//! Cross-entity rules belong to [`crate::resolve`] and [`crate::validation`].
//!
//! Encoding produces a tree that decodes back to an equal [`crate::Package`]:
//! global XFDU elements are emitted with the `xfdu:` prefix, local ones
//! unqualified, matching the schema's `elementFormDefault="unqualified"`.

use crate::error::CoreError;
use crate::tree::Element;
use crate::types::Id;

/// Element names used by the manifest schema.
pub(crate) mod names {
    pub const XFDU: &str = "XFDU";
    pub const INFORMATION_PACKAGE_MAP: &str = "informationPackageMap";
    pub const METADATA_SECTION: &str = "metadataSection";
    pub const DATA_OBJECT_SECTION: &str = "dataObjectSection";
    pub const BEHAVIOR_SECTION: &str = "behaviorSection";

    pub const CONTENT_UNIT: &str = "contentUnit";
    pub const ABSTRACT_CONTENT_UNIT: &str = "abstractContentUnit";
    pub const DATA_OBJECT_POINTER: &str = "dataObjectPointer";

    pub const METADATA_OBJECT: &str = "metadataObject";
    pub const METADATA_REFERENCE: &str = "metadataReference";
    pub const METADATA_WRAP: &str = "metadataWrap";
    pub const XML_DATA: &str = "xmlData";

    pub const DATA_OBJECT: &str = "dataObject";
    pub const BYTE_STREAM: &str = "byteStream";
    pub const FILE_LOCATION: &str = "fileLocation";
    pub const CHECKSUM: &str = "checksum";
    pub const BYTE_ORDER: &str = "byteOrder";
    pub const AVERAGE_BIT_RATE: &str = "averageBitRate";

    pub const TRANSFORM_OBJECT: &str = "transformObject";
    pub const ALGORITHM: &str = "algorithm";
    pub const KEY_DERIVATION: &str = "keyDerivation";
    pub const ABSTRACT_KEY_DERIVATION: &str = "abstractKeyDerivation";

    pub const BEHAVIOR_OBJECT: &str = "behaviorObject";
    pub const INTERFACE_DEFINITION: &str = "interfaceDefinition";
    pub const INPUT_PARAMETER: &str = "inputParameter";
    pub const MECHANISM: &str = "mechanism";
    pub const ABSTRACT_MECHANISM: &str = "abstractMechanism";
}

/// Prefix used when emitting global (qualified) XFDU elements.
pub(crate) const XFDU_PREFIX: &str = "xfdu";

/// Qualified name for a global XFDU element.
pub(crate) fn qualified(name: &str) -> String {
    format!("{XFDU_PREFIX}:{name}")
}

/// A required attribute.
pub(crate) fn required<'a>(el: &'a Element, attr: &str) -> Result<&'a str, CoreError> {
    el.get(attr).ok_or_else(|| {
        CoreError::malformed(el.local_name(), format!("missing required attribute '{attr}'"))
    })
}

/// An optional attribute as an owned string.
pub(crate) fn optional(el: &Element, attr: &str) -> Option<String> {
    el.get(attr).map(str::to_string)
}

/// An optional identifier attribute.
pub(crate) fn optional_id(el: &Element, attr: &str) -> Result<Option<Id>, CoreError> {
    el.get(attr)
        .map(|v| Id::parse(el.local_name(), v))
        .transpose()
}

/// A required identifier attribute.
pub(crate) fn required_id(el: &Element, attr: &str) -> Result<Id, CoreError> {
    Id::parse(el.local_name(), required(el, attr)?)
}

/// An optional `xs:IDREFS` attribute (absent means empty).
pub(crate) fn id_list(el: &Element, attr: &str) -> Result<Vec<Id>, CoreError> {
    match el.get(attr) {
        Some(v) => Id::parse_list(el.local_name(), v),
        None => Ok(Vec::new()),
    }
}

/// Parse a non-negative `xs:long`.
pub(crate) fn parse_count(element: &str, what: &str, value: &str) -> Result<u64, CoreError> {
    let n: i64 = value.trim().parse().map_err(|_| {
        CoreError::malformed(element, format!("{what} '{value}' is not an integer"))
    })?;
    u64::try_from(n)
        .map_err(|_| CoreError::malformed(element, format!("{what} {n} must not be negative")))
}

/// An optional non-negative integer attribute.
pub(crate) fn optional_count(el: &Element, attr: &str) -> Result<Option<u64>, CoreError> {
    el.get(attr)
        .map(|v| parse_count(el.local_name(), attr, v))
        .transpose()
}

/// Exactly one child with the given local name.
pub(crate) fn required_child<'a>(el: &'a Element, name: &'a str) -> Result<&'a Element, CoreError> {
    match at_most_one(el, name)? {
        Some(child) => Ok(child),
        None => Err(CoreError::malformed(
            el.local_name(),
            format!("missing required element '{name}'"),
        )),
    }
}

/// Zero or one child with the given local name.
pub(crate) fn at_most_one<'a>(el: &'a Element, name: &'a str) -> Result<Option<&'a Element>, CoreError> {
    let mut found = el.find_all(name);
    let first = found.next();
    if found.next().is_some() {
        return Err(CoreError::malformed(
            el.local_name(),
            format!("element '{name}' may appear at most once"),
        ));
    }
    Ok(first)
}

/// Reject children whose local name is not in `allowed`.
pub(crate) fn only_children(el: &Element, allowed: &[&str]) -> Result<(), CoreError> {
    match el.children.iter().find(|c| !allowed.contains(&c.local_name())) {
        Some(unexpected) => Err(CoreError::malformed(
            el.local_name(),
            format!("unexpected element '{}'", unexpected.local_name()),
        )),
        None => Ok(()),
    }
}

/// Trimmed, non-empty text content of a child element.
pub(crate) fn child_text(el: &Element, name: &str) -> Result<String, CoreError> {
    let child = required_child(el, name)?;
    non_empty_text(child)
}

/// Trimmed, non-empty text content of an element.
pub(crate) fn non_empty_text(el: &Element) -> Result<String, CoreError> {
    match el.text_content().map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(CoreError::malformed(el.local_name(), "missing text content")),
    }
}
