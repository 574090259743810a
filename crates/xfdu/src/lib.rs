//! # XFDU
//!
//! Open, resolve, validate, materialize and verify XFDU-style packages.
//!
//! ## Overview
//!
//! A package is a manifest (a logical tree of content units plus metadata
//! and data objects) and the payload files its byte streams point at. This
//! crate ties the pieces together:
//!
//! - **Entities and resolution** come from [`core`]
//! - **Checksums and transform chains** come from [`codec`]
//! - **Payload access** goes through a [`store::ByteSource`]
//! - **Materialization** ([`Combinator`]) rebuilds a data object's canonical
//!   bytes from its byte streams
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfdu::{Archive, ArchiveConfig};
//! use xfdu::core::Element;
//! use xfdu::store::DirectorySource;
//!
//! async fn example(manifest: Element) {
//!     let source = DirectorySource::open("S1A_IW_SLC.SAFE").unwrap();
//!     let archive = Archive::open(&manifest, source, ArchiveConfig::default()).unwrap();
//!
//!     let bytes = archive.materialize("measurementData1").await.unwrap();
//!     println!("{} bytes", bytes.len());
//!
//!     let report = archive.verify().await.unwrap();
//!     println!("{:?}", report.verdict());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `xfdu::core` - entity model, resolver, validator
//! - `xfdu::codec` - codec registry and transform pipeline
//! - `xfdu::store` - byte sources

pub mod archive;
pub mod combinator;
pub mod error;
pub mod verify;

// Re-export component crates
pub use xfdu_codec as codec;
pub use xfdu_core as core;
pub use xfdu_store as store;

pub use archive::{Archive, ArchiveConfig};
pub use combinator::{CombineOptions, Combinator};
pub use error::{ArchiveError, MaterializationError, Result};
pub use verify::{Check, Finding, Verdict, VerificationReport};

// Commonly used core types
pub use xfdu_core::{
    DataObject, Element, Id, Package, ResolvedGraph, Severity, ValidationReport, ValidatorConfig,
};
