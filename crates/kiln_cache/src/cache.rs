//! High-level per-target cache.
//!
//! `TargetCache` ties together the manifest, the complementary-file table,
//! and the source hasher into a single interface for one build target:
//! detecting changed files, recording compile results, dropping removed
//! files, and persisting everything for the next build.

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;

use crate::complementary::ComplementaryFiles;
use crate::error::CacheError;
use crate::hasher::{ChangeSet, SourceHasher};
use crate::manifest::{CacheManifest, FileRecord};

/// Incremental cache of one build target.
#[derive(Debug)]
pub struct TargetCache {
    /// Directory holding this target's cache files.
    cache_dir: PathBuf,

    /// Per-file hashes and outputs.
    manifest: CacheManifest,

    /// Files that must be recompiled together.
    complementary: ComplementaryFiles,
}

impl TargetCache {
    /// Loads an existing cache, or starts empty if nothing readable is stored.
    ///
    /// Callers must consult the [`CacheVersionManager`](crate::CacheVersionManager)
    /// first; use [`fresh`](Self::fresh) when the stored format is not usable.
    pub fn load_or_create(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            manifest: CacheManifest::load(cache_dir).unwrap_or_default(),
            complementary: ComplementaryFiles::load(cache_dir),
        }
    }

    /// Creates an empty cache that ignores anything stored on disk.
    pub fn fresh(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            manifest: CacheManifest::new(),
            complementary: ComplementaryFiles::new(),
        }
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Hashes the given files and compares them against the manifest.
    pub fn detect_changes(&self, file_paths: &[PathBuf]) -> ChangeSet {
        ChangeSet::compute(&SourceHasher::fingerprint(file_paths), &self.manifest)
    }

    /// Records a successfully compiled source file.
    pub fn record(&mut self, path: &Path, content_hash: ContentHash, outputs: Vec<PathBuf>) {
        self.manifest.files.insert(
            path.to_path_buf(),
            FileRecord {
                content_hash,
                outputs,
            },
        );
    }

    /// Drops removed files from the manifest and returns the outputs that
    /// were generated from them.
    pub fn remove(&mut self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .filter_map(|path| self.manifest.files.remove(path))
            .flat_map(|record| record.outputs)
            .collect()
    }

    /// Returns the recorded outputs of a source file.
    pub fn outputs_of(&self, path: &Path) -> &[PathBuf] {
        self.manifest
            .files
            .get(path)
            .map(|record| record.outputs.as_slice())
            .unwrap_or(&[])
    }

    /// Returns a reference to the current manifest.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Returns the complementary-file table.
    pub fn complementary(&self) -> &ComplementaryFiles {
        &self.complementary
    }

    /// Returns the complementary-file table for updating.
    pub fn complementary_mut(&mut self) -> &mut ComplementaryFiles {
        &mut self.complementary
    }

    /// Persists the manifest and the complementary-file table.
    pub fn save(&self) -> Result<(), CacheError> {
        self.manifest.save(&self.cache_dir)?;
        self.complementary.save(&self.cache_dir)
    }
}
