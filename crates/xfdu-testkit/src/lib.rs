//! # XFDU Testkit
//!
//! Testing utilities for XFDU packages.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a package builder that stores the payload it describes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Golden scenarios**: known packages with the outcome every reader must produce
//!
//! ## Test Fixtures
//!
//! ```rust
//! use xfdu_testkit::fixtures::PackageFixture;
//!
//! let fixture = PackageFixture::new()
//!     .schema("measurementSchema")
//!     .data_object("D1", "measurementSchema", &[b"AB", b"CD"]);
//! let (manifest, source, registry) = fixture.into_parts();
//! assert!(manifest.is("XFDU"));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use xfdu_testkit::generators::{fixture_from_params, PackageParams};
//!
//! proptest! {
//!     #[test]
//!     fn manifest_round_trips(params: PackageParams) {
//!         let manifest = fixture_from_params(&params).manifest();
//!         let package = xfdu_core::Package::from_element(&manifest).unwrap();
//!         prop_assert_eq!(package.to_element(), manifest);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{abcd_fixture, PackageFixture, FIXTURE_SECRET, MANIFEST_ENTRY};
pub use generators::{fixture_from_params, DataObjectParams, PackageParams};
pub use vectors::{all_scenarios, checksum_vectors, verify_checksum_vectors, Expected, Scenario};
