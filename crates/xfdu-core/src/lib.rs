//! # XFDU Core
//!
//! Pure model of an XFDU-style package: a logical tree of content units,
//! metadata objects and data objects whose bytes live in external files.
//!
//! This crate does no I/O. It turns a generic attributed tree (produced by an
//! external XML parser) into typed entities, resolves identifier references
//! into a [`ResolvedGraph`], validates cross-entity rules, and emits the tree
//! back.
//!
//! ## Pipeline
//!
//! ```text
//! Element --Package::from_element--> Package --resolve--> ResolvedGraph --validate--> ValidationReport
//! ```
//!
//! Construction and resolution fail fast; validation accumulates.

pub mod behavior;
pub mod canonical;
pub mod content;
pub mod data;
pub mod error;
pub mod metadata;
pub mod package;
pub mod resolve;
pub mod transform;
pub mod tree;
pub mod types;
pub mod validation;

pub use behavior::{BehaviorObject, InputParameter, InterfaceDefinition, Mechanism};
pub use content::{ContentNode, ContentUnit, DataObjectPointer};
pub use data::{ByteStream, Checksum, DataObject, Reference};
pub use error::{CoreError, ResolutionError};
pub use metadata::{MetadataBody, MetadataIdPattern, MetadataObject, MetadataReference, MetadataWrap};
pub use package::Package;
pub use resolve::{resolve, EntityRef, ResolvedGraph};
pub use transform::{KeyDerivation, KeyDerivationSpec, Salt, Transform};
pub use tree::{Content, Element, XFDU_NAMESPACE};
pub use types::{
    BehaviorIndex, ByteOrder, Category, Classification, CombinationMethod, DataObjectIndex,
    EntityKind, Id, LocatorType, MetadataIndex, TransformKind, UnitIndex,
};
pub use validation::{validate, Rule, Severity, ValidationReport, ValidatorConfig, Violation};
