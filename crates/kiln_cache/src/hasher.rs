//! Content fingerprints of a target's sources and their diff against the
//! manifest of the previous build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use rayon::prelude::*;

use crate::error::CacheError;
use crate::manifest::CacheManifest;

/// Content hashes of the current sources.
#[derive(Debug, Clone, Default)]
pub struct Fingerprints {
    /// Hash of every readable file.
    pub hashes: BTreeMap<PathBuf, ContentHash>,
    /// Files that exist in the source set but could not be read.
    pub unreadable: Vec<PathBuf>,
}

/// How the current sources differ from the previous build.
///
/// All lists are sorted.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Sources the manifest has never seen.
    pub new_files: Vec<PathBuf>,
    /// Sources whose hash changed, or that could not be read this time.
    pub modified_files: Vec<PathBuf>,
    /// Manifest entries that are no longer sources.
    pub deleted_files: Vec<PathBuf>,
    /// Sources identical to the last build.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Classifies `current` against `manifest`.
    ///
    /// An unreadable source is reported as modified rather than deleted: it
    /// is still part of the target, and compiling it surfaces the real error.
    pub fn compute(current: &Fingerprints, manifest: &CacheManifest) -> Self {
        let mut changes = ChangeSet::default();
        for (path, hash) in &current.hashes {
            let bucket = match manifest.files.get(path) {
                None => &mut changes.new_files,
                Some(record) if record.content_hash != *hash => &mut changes.modified_files,
                Some(_) => &mut changes.unchanged_files,
            };
            bucket.push(path.clone());
        }
        for path in &current.unreadable {
            if manifest.files.contains_key(path) {
                changes.modified_files.push(path.clone());
            } else {
                changes.new_files.push(path.clone());
            }
        }
        changes.new_files.sort();
        changes.modified_files.sort();

        changes.deleted_files = manifest
            .files
            .keys()
            .filter(|p| !current.hashes.contains_key(*p) && !current.unreadable.contains(*p))
            .cloned()
            .collect();
        changes
    }

    /// Returns `true` if nothing was added, modified or deleted.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// New and modified files, which need compiling.
    pub fn changed(&self) -> impl Iterator<Item = &PathBuf> {
        self.new_files.iter().chain(&self.modified_files)
    }
}

/// Hashes source files.
pub struct SourceHasher;

impl SourceHasher {
    /// XXH3-128 hash of one file's content.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Hashes `paths` in parallel. Read failures are collected, not fatal.
    pub fn fingerprint(paths: &[PathBuf]) -> Fingerprints {
        let results: Vec<(PathBuf, Result<ContentHash, CacheError>)> = paths
            .par_iter()
            .map(|path| (path.clone(), Self::hash_file(path)))
            .collect();

        let mut fingerprints = Fingerprints::default();
        for (path, result) in results {
            match result {
                Ok(hash) => {
                    fingerprints.hashes.insert(path, hash);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot hash source");
                    fingerprints.unreadable.push(path);
                }
            }
        }
        fingerprints
    }
}
