//! Per-target incremental compilation caches.
//!
//! Each build target owns one cache directory holding:
//! - `attributes.json`: the cache format version, compared against the
//!   running version by [`CacheVersionManager`] before anything is read
//! - `manifest.json`: a content hash and the generated outputs of every
//!   compiled source file
//! - `links/complementary.bin`: the [`ComplementaryFiles`] table linking
//!   files that must be recompiled together
//!
//! Reads are fail-safe: missing or corrupt state results in a cache miss,
//! never an error.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod complementary;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod version;

pub use artifact::ArtifactStore;
pub use cache::TargetCache;
pub use complementary::ComplementaryFiles;
pub use error::CacheError;
pub use hasher::{ChangeSet, Fingerprints, SourceHasher};
pub use manifest::{CacheManifest, FileRecord};
pub use version::{
    CacheAttributes, CacheAttributesDiff, CacheStatus, CacheVersionManager, CACHE_FORMAT_VERSION,
};
