//! # XFDU Store
//!
//! Byte sources: where the payload files of a package live.
//!
//! The materialization engine reads payload bytes only through the
//! [`ByteSource`] trait, so a package can sit in a directory, in memory, or
//! behind any other storage a caller implements.
//!
//! ## Key Types
//!
//! - [`ByteSource`] - async trait mapping a file location to bytes
//! - [`DirectorySource`] - a package directory on disk, bounded by [`SourceConfig`]
//! - [`MemorySource`] - in-memory entries for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfdu_core::Reference;
//! use xfdu_store::{ByteSource, DirectorySource};
//!
//! async fn example() {
//!     let source = DirectorySource::open("S1A_IW_SLC.SAFE").unwrap();
//!     let bytes = source
//!         .fetch(&Reference::url("./measurement/s1a-iw1-slc.tiff"))
//!         .await
//!         .unwrap();
//!     println!("{} bytes", bytes.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Relative hrefs only**: absolute, scheme-qualified and `..` paths are rejected
//! - **Bounded reads**: sources enforce their own size and time limits
//! - **No retries**: a failed fetch is reported once, with its href

pub mod directory;
pub mod error;
pub mod memory;
pub mod traits;

pub use directory::{DirectorySource, SourceConfig};
pub use error::{Result, StoreError};
pub use memory::MemorySource;
pub use traits::{entry_path, normalize_href, ByteSource};
