//! Error types for the XFDU core.

use thiserror::Error;

use crate::types::EntityKind;

/// Errors raised while building entities from a generic tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed {element}: {reason}")]
    MalformedEntity { element: String, reason: String },
}

impl CoreError {
    /// Shorthand for a [`CoreError::MalformedEntity`].
    pub fn malformed(element: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedEntity {
            element: element.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving identifier references.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("duplicate identifier '{id}': declared by a {first} and a {second}")]
    DuplicateIdentifier {
        id: String,
        first: EntityKind,
        second: EntityKind,
    },

    #[error("unresolved {role} reference '{reference}' from {from}")]
    UnresolvedReference {
        reference: String,
        role: &'static str,
        from: String,
    },

    #[error("{role} reference '{reference}' from {from} must target {expected}, found {found}")]
    WrongReferenceKind {
        reference: String,
        role: &'static str,
        from: String,
        expected: &'static str,
        found: String,
    },

    #[error("cyclic structure: {}", path.join(" -> "))]
    CyclicStructure { path: Vec<String> },
}
