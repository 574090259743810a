//! Strong type definitions for XFDU packages.
//!
//! Identifiers are newtypes so that a raw string never stands in for a
//! checked `xs:ID`, and closed vocabularies are enums.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A package-unique identifier (`xs:ID`, i.e. an XML NCName).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(String);

impl Id {
    /// Parse an identifier, checking NCName syntax.
    pub fn parse(element: &str, value: &str) -> Result<Self, CoreError> {
        if is_ncname(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(CoreError::malformed(
                element,
                format!("'{value}' is not a valid identifier"),
            ))
        }
    }

    /// Parse a whitespace-separated `xs:IDREFS` list.
    pub fn parse_list(element: &str, value: &str) -> Result<Vec<Self>, CoreError> {
        value
            .split_whitespace()
            .map(|token| Self::parse(element, token))
            .collect()
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render a list back into `xs:IDREFS` form.
    pub fn join(ids: &[Id]) -> String {
        ids.iter().map(Id::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Id {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )+
        }

        impl $name {
            /// Every value of the vocabulary, in schema order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The manifest spelling.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Parse the manifest spelling (case-sensitive).
            pub fn from_str_opt(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Parse, reporting an out-of-vocabulary value as malformed.
            pub fn parse(element: &str, attribute: &str, value: &str) -> Result<Self, CoreError> {
                Self::from_str_opt(value).ok_or_else(|| {
                    CoreError::malformed(
                        element,
                        format!("{attribute} '{value}' is not one of {:?}",
                            Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>()),
                    )
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Classification of a metadata object.
    Classification {
        Ded => "DED",
        Syntax => "SYNTAX",
        Fixity => "FIXITY",
        Provenance => "PROVENANCE",
        Context => "CONTEXT",
        Reference => "REFERENCE",
        Description => "DESCRIPTION",
        Other => "OTHER",
    }
}

vocabulary! {
    /// Category of a metadata object.
    Category {
        Rep => "REP",
        Pdi => "PDI",
        Dmd => "DMD",
        Other => "OTHER",
        Any => "ANY",
    }
}

vocabulary! {
    /// Kind of a transform step.
    TransformKind {
        Compression => "COMPRESSION",
        Authentication => "AUTHENTICATION",
        Encryption => "ENCRYPTION",
    }
}

vocabulary! {
    /// How a reference locates its target.
    LocatorType {
        Url => "URL",
        Other => "OTHER",
    }
}

vocabulary! {
    /// Byte order of raw stream samples.
    ByteOrder {
        LittleEndian => "LITTLE_ENDIAN",
        BigEndian => "BIG_ENDIAN",
    }
}

vocabulary! {
    /// Rule for merging multiple byte streams.
    CombinationMethod {
        Concat => "concat",
    }
}

/// The kind of entity that declared an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    ContentUnit,
    DataObject,
    ByteStream,
    FileLocation,
    MetadataObject,
    MetadataReference,
    DataObjectPointer,
    Transform,
    BehaviorObject,
    InterfaceDefinition,
    Mechanism,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::ContentUnit => "content unit",
            EntityKind::DataObject => "data object",
            EntityKind::ByteStream => "byte stream",
            EntityKind::FileLocation => "file location",
            EntityKind::MetadataObject => "metadata object",
            EntityKind::MetadataReference => "metadata reference",
            EntityKind::DataObjectPointer => "data object pointer",
            EntityKind::Transform => "transform",
            EntityKind::BehaviorObject => "behavior object",
            EntityKind::InterfaceDefinition => "interface definition",
            EntityKind::Mechanism => "mechanism",
        };
        f.write_str(s)
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Position in the owning arena.
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

handle! {
    /// Handle of a content unit in a resolved graph (pre-order position).
    UnitIndex
}
handle! {
    /// Handle of a data object in a resolved graph.
    DataObjectIndex
}
handle! {
    /// Handle of a metadata object in a resolved graph.
    MetadataIndex
}
handle! {
    /// Handle of a behavior object in a resolved graph.
    BehaviorIndex
}
