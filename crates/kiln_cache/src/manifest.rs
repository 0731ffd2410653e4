//! Cache manifest that tracks per-file state of one build target.
//!
//! The manifest is stored as `manifest.json` in the target's cache directory.
//! It records the content hash of every compiled source file along with the
//! outputs the compiler generated for it, so removed sources can have their
//! outputs cleaned up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the manifest file within a target's cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Per-target record of compiled sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Per-source-file state, keyed by absolute source path.
    pub files: BTreeMap<PathBuf, FileRecord>,
}

/// Cached state for a single source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content hash of the source file when it was last compiled.
    pub content_hash: ContentHash,

    /// Files the compiler generated from this source.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

impl CacheManifest {
    /// Creates a new, empty cache manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the manifest from the cache directory, returning `None` if
    /// the file doesn't exist or can't be parsed.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "discarding corrupt manifest");
                None
            }
        }
    }

    /// Saves the manifest to the cache directory.
    ///
    /// Creates the cache directory if it doesn't exist.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::io(cache_dir, e))?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }
}
