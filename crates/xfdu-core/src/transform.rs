//! Transform steps and their key derivation parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{
    child_text, names, only_children, optional, optional_id, parse_count, qualified, required,
};
use crate::error::CoreError;
use crate::tree::Element;
use crate::types::{Id, TransformKind};

/// Length of a key derivation salt, in characters.
pub const SALT_LENGTH: usize = 16;

/// A key derivation salt: exactly [`SALT_LENGTH`] characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Salt(String);

impl Salt {
    /// Parse a salt, rejecting any other length.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let len = value.chars().count();
        if len != SALT_LENGTH {
            return Err(CoreError::malformed(
                names::KEY_DERIVATION,
                format!("salt must be exactly {SALT_LENGTH} characters, got {len}"),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.0)
    }
}

impl TryFrom<String> for Salt {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Salt::parse(&value)
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        salt.0
    }
}

/// Parameters of one key derivation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivation {
    /// Name of the derivation function in the codec registry.
    pub name: String,
    pub salt: Salt,
    pub iteration_count: u64,
}

impl KeyDerivation {
    pub fn new(name: impl Into<String>, salt: Salt, iteration_count: u64) -> Self {
        Self {
            name: name.into(),
            salt,
            iteration_count,
        }
    }
}

/// Member of the key derivation substitution group.
///
/// `keyDerivation` is the only concrete member; another substitute becomes
/// another variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDerivationSpec {
    KeyDerivation(KeyDerivation),
}

impl KeyDerivationSpec {
    /// The derivation parameters.
    pub fn params(&self) -> &KeyDerivation {
        match self {
            KeyDerivationSpec::KeyDerivation(kd) => kd,
        }
    }

    fn from_element(el: &Element) -> Result<Self, CoreError> {
        match el.local_name() {
            names::KEY_DERIVATION => {
                let name = required(el, "name")?;
                if name.trim().is_empty() {
                    return Err(CoreError::malformed(names::KEY_DERIVATION, "empty name"));
                }
                let salt = Salt::parse(required(el, "salt")?)?;
                let iteration_count =
                    parse_count(names::KEY_DERIVATION, "iterationCount", required(el, "iterationCount")?)?;
                Ok(KeyDerivationSpec::KeyDerivation(KeyDerivation::new(
                    name,
                    salt,
                    iteration_count,
                )))
            }
            other => Err(CoreError::malformed(
                other,
                "abstract key derivation cannot appear in a manifest",
            )),
        }
    }

    fn to_element(&self) -> Element {
        match self {
            KeyDerivationSpec::KeyDerivation(kd) => Element::new(qualified(names::KEY_DERIVATION))
                .attr("name", kd.name.as_str())
                .attr("salt", kd.salt.as_str())
                .attr("iterationCount", kd.iteration_count.to_string()),
        }
    }
}

impl From<KeyDerivation> for KeyDerivationSpec {
    fn from(kd: KeyDerivation) -> Self {
        KeyDerivationSpec::KeyDerivation(kd)
    }
}

/// One reversible step of a transform chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub id: Option<Id>,
    /// Ordering hint. Absent or empty means document order.
    pub order: Option<String>,
    pub kind: TransformKind,
    /// Algorithm name in the codec registry (case-sensitive).
    pub algorithm: String,
    pub key_derivations: Vec<KeyDerivationSpec>,
}

impl Transform {
    pub fn new(kind: TransformKind, algorithm: impl Into<String>) -> Self {
        Self {
            id: None,
            order: None,
            kind,
            algorithm: algorithm.into(),
            key_derivations: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_key_derivation(mut self, kd: impl Into<KeyDerivationSpec>) -> Self {
        self.key_derivations.push(kd.into());
        self
    }

    /// The ordering hint, if one is declared and non-blank.
    pub fn order_hint(&self) -> Option<&str> {
        self.order.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }

    /// Identifier or algorithm, for diagnostics.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} '{id}'", self.algorithm),
            None => self.algorithm.clone(),
        }
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(
            el,
            &[names::ALGORITHM, names::KEY_DERIVATION, names::ABSTRACT_KEY_DERIVATION],
        )?;
        let kind = TransformKind::parse(
            names::TRANSFORM_OBJECT,
            "transformType",
            required(el, "transformType")?,
        )?;
        let algorithm = child_text(el, names::ALGORITHM)?;
        let key_derivations = el
            .children
            .iter()
            .filter(|c| !c.is(names::ALGORITHM))
            .map(KeyDerivationSpec::from_element)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: optional_id(el, "ID")?,
            order: optional(el, "order"),
            kind,
            algorithm,
            key_derivations,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        Element::new(names::TRANSFORM_OBJECT)
            .attr_opt("ID", self.id.as_ref().map(Id::as_str))
            .attr_opt("order", self.order.as_deref())
            .attr("transformType", self.kind.as_str())
            .child(Element::new(names::ALGORITHM).text(self.algorithm.as_str()))
            .children(self.key_derivations.iter().map(KeyDerivationSpec::to_element))
    }
}

/// Parse every `transformObject` child of an element, in document order.
pub(crate) fn transforms_of(el: &Element) -> Result<Vec<Transform>, CoreError> {
    el.find_all(names::TRANSFORM_OBJECT)
        .map(Transform::from_element)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kd(salt: &str) -> Element {
        Element::new("xfdu:keyDerivation")
            .attr("name", "pbkdf2-hmac-sha256")
            .attr("salt", salt)
            .attr("iterationCount", "1000")
    }

    fn transform(kind: &str) -> Element {
        Element::new("transformObject")
            .attr("transformType", kind)
            .child(Element::new("algorithm").text("chacha20poly1305"))
    }

    #[test]
    fn test_salt_length() {
        assert!(Salt::parse("0123456789abcdef").is_ok());
        let err = Salt::parse("0123456789abcde").unwrap_err();
        assert!(err.to_string().contains("got 15"));
        assert!(Salt::parse("0123456789abcdefg").is_err());
        // characters, not bytes
        assert!(Salt::parse("ééééééééééééééé\u{e9}").is_ok());
    }

    #[test]
    fn test_parse_transform_with_key_derivation() {
        let el = transform("ENCRYPTION").attr("order", "2").child(kd("0123456789abcdef"));
        let t = Transform::from_element(&el).unwrap();
        assert_eq!(t.kind, TransformKind::Encryption);
        assert_eq!(t.algorithm, "chacha20poly1305");
        assert_eq!(t.order_hint(), Some("2"));
        assert_eq!(t.key_derivations.len(), 1);
        assert_eq!(t.key_derivations[0].params().iteration_count, 1000);
    }

    #[test]
    fn test_short_salt_is_malformed() {
        let el = transform("ENCRYPTION").child(kd("0123456789abcde"));
        assert!(matches!(
            Transform::from_element(&el),
            Err(CoreError::MalformedEntity { .. })
        ));
    }

    #[test]
    fn test_negative_iteration_count() {
        let bad = Element::new("keyDerivation")
            .attr("name", "pbkdf2-hmac-sha256")
            .attr("salt", "0123456789abcdef")
            .attr("iterationCount", "-5");
        assert!(Transform::from_element(&transform("ENCRYPTION").child(bad)).is_err());
    }

    #[test]
    fn test_rejects_unknown_kind_and_missing_algorithm() {
        assert!(Transform::from_element(&transform("SIGNING")).is_err());
        let no_algo = Element::new("transformObject").attr("transformType", "COMPRESSION");
        assert!(Transform::from_element(&no_algo).is_err());
    }

    #[test]
    fn test_abstract_key_derivation_rejected() {
        let el = transform("ENCRYPTION").child(Element::new("abstractKeyDerivation"));
        assert!(Transform::from_element(&el).is_err());
    }

    #[test]
    fn test_blank_order_is_no_hint() {
        let t = Transform::new(TransformKind::Compression, "deflate").with_order("  ");
        assert_eq!(t.order_hint(), None);
    }

    #[test]
    fn test_roundtrip() {
        let el = transform("ENCRYPTION")
            .attr("ID", "enc1")
            .attr("order", "1")
            .child(kd("0123456789abcdef"))
            .child(kd("fedcba9876543210"));
        let t = Transform::from_element(&el).unwrap();
        assert_eq!(Transform::from_element(&t.to_element()).unwrap(), t);
    }
}
