//! Generic attributed tree: the form a manifest takes between the external
//! XML parser and the entity model.
//!
//! Names are kept exactly as the parser produced them. Lookups match on the
//! local part, so `contentUnit`, `xfdu:contentUnit` and
//! `{urn:ccsds:schema:xfdu:1}contentUnit` are the same element to the model.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Namespace URI of XFDU manifests.
pub const XFDU_NAMESPACE: &str = "urn:ccsds:schema:xfdu:1";

/// Character or binary content carried by an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    /// Character data.
    Text(String),
    /// Binary data (already decoded by the parser, e.g. from base64).
    Binary(Bytes),
}

/// One element of a parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element name, possibly prefixed or Clark-qualified.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Optional character or binary content.
    pub content: Option<Content>,
}

/// Strip a `prefix:` or `{namespace}` qualifier from a name.
pub fn local_name(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix('{') {
        return match rest.find('}') {
            Some(end) => &rest[end + 1..],
            None => name,
        };
    }
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Whether a name carries a namespace qualifier.
pub fn is_qualified(name: &str) -> bool {
    name.starts_with('{') || name.contains(':')
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an attribute (builder style).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add an attribute only when a value is present.
    pub fn attr_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    /// Append a child element (builder style).
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child elements.
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Set text content (builder style).
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(Content::Text(text.into()));
        self
    }

    /// Set binary content (builder style).
    pub fn binary(mut self, data: impl Into<Bytes>) -> Self {
        self.content = Some(Content::Binary(data.into()));
        self
    }

    /// The local part of this element's name.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Whether this element's local name equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.local_name() == name
    }

    /// Look up an attribute by local name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_name(k) == name && !k.starts_with("xmlns"))
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given local name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name))
    }

    /// All children with the given local name.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.is(name))
    }

    /// Text content, if any.
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            Some(Content::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_forms() {
        assert_eq!(local_name("contentUnit"), "contentUnit");
        assert_eq!(local_name("xfdu:contentUnit"), "contentUnit");
        assert_eq!(local_name("{urn:ccsds:schema:xfdu:1}contentUnit"), "contentUnit");
        assert!(is_qualified("xfdu:contentUnit"));
        assert!(!is_qualified("dataObject"));
    }

    #[test]
    fn test_lookup_by_local_name() {
        let el = Element::new("xfdu:XFDU")
            .attr("version", "esa/safe/sentinel-1.0")
            .attr("xmlns:xfdu", XFDU_NAMESPACE)
            .child(Element::new("{urn:ccsds:schema:xfdu:1}informationPackageMap"))
            .child(Element::new("metadataSection"));

        assert!(el.is("XFDU"));
        assert_eq!(el.get("version"), Some("esa/safe/sentinel-1.0"));
        assert!(el.find("informationPackageMap").is_some());
        assert_eq!(el.find_all("metadataSection").count(), 1);
        assert!(el.find("dataObjectSection").is_none());
    }

    #[test]
    fn test_namespace_declarations_are_not_attributes() {
        let el = Element::new("x").attr("xmlns:xfdu", XFDU_NAMESPACE);
        assert_eq!(el.get("xfdu"), None);
    }

    #[test]
    fn test_content() {
        let el = Element::new("checksum").text("abc");
        assert_eq!(el.text_content(), Some("abc"));
        let bin = Element::new("binaryData").binary(vec![1u8, 2, 3]);
        assert_eq!(bin.text_content(), None);
    }
}
