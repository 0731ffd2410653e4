//! Cache format versioning.
//!
//! Before a target reads anything from its cache, the format version stored
//! in `attributes.json` is compared against the version this build expects.
//! The comparison result, a [`CacheAttributesDiff`], tells the caller whether
//! the cache can be trusted, must be wiped, or does not exist yet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Current on-disk cache format version. Increment on any breaking change to
/// the manifest, the artifact header, or the complementary-file table.
pub const CACHE_FORMAT_VERSION: u32 = 3;

/// Name of the attributes file within a target's cache directory.
const ATTRIBUTES_FILE: &str = "attributes.json";

/// Attributes describing the format of a cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheAttributes {
    /// Format version that wrote the cache.
    pub format_version: u32,
}

/// Outcome of comparing stored attributes with the expected ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Stored attributes match; the cache can be used as-is.
    UpToDate,
    /// Stored attributes differ, are unreadable, or the cache exists while
    /// incremental compilation is off. The cache must be cleared before use.
    Stale,
    /// No attributes are stored: first build, or the cache was wiped.
    Absent,
}

/// Difference between the stored and expected cache attributes of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAttributesDiff {
    /// Attributes found on disk, if readable.
    pub actual: Option<CacheAttributes>,
    /// Attributes this build expects; `None` when incremental compilation is off.
    pub expected: Option<CacheAttributes>,
    /// Classification of the difference.
    pub status: CacheStatus,
    /// Whether the cache directory holds any files besides the attributes.
    pub has_data: bool,
}

impl CacheAttributesDiff {
    /// Returns `true` if cached state can be read without clearing first.
    pub fn is_usable(&self) -> bool {
        self.status == CacheStatus::UpToDate
    }

    /// Returns `true` if existing cache files must be deleted before writing,
    /// so incompatible formats are never mixed.
    pub fn must_clear(&self) -> bool {
        match self.status {
            CacheStatus::UpToDate => false,
            CacheStatus::Stale => true,
            CacheStatus::Absent => self.has_data,
        }
    }
}

/// Loads and maintains the format attributes of one target's cache directory.
#[derive(Debug, Clone)]
pub struct CacheVersionManager {
    cache_dir: PathBuf,
    expected: Option<CacheAttributes>,
}

enum StoredAttributes {
    Missing,
    Corrupt,
    Present(CacheAttributes),
}

impl CacheVersionManager {
    /// Creates a manager expecting [`CACHE_FORMAT_VERSION`].
    pub fn new(cache_dir: &Path, incremental: bool) -> Self {
        Self::with_version(cache_dir, incremental, CACHE_FORMAT_VERSION)
    }

    /// Creates a manager expecting a specific format version.
    ///
    /// When `incremental` is `false` no attributes are expected, so any
    /// existing cache is reported as stale.
    pub fn with_version(cache_dir: &Path, incremental: bool, format_version: u32) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            expected: incremental.then_some(CacheAttributes { format_version }),
        }
    }

    /// Returns the cache directory this manager maintains.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Compares the stored attributes with the expected ones.
    pub fn load_diff(&self) -> CacheAttributesDiff {
        let stored = self.load_stored();
        let has_data = self.has_data();

        let (actual, status) = match (stored, self.expected) {
            (StoredAttributes::Corrupt, _) => (None, CacheStatus::Stale),
            (StoredAttributes::Missing, _) => (None, CacheStatus::Absent),
            (StoredAttributes::Present(actual), Some(expected)) if actual == expected => {
                (Some(actual), CacheStatus::UpToDate)
            }
            (StoredAttributes::Present(actual), _) => (Some(actual), CacheStatus::Stale),
        };

        CacheAttributesDiff {
            actual,
            expected: self.expected,
            status,
            has_data,
        }
    }

    /// Persists the expected attributes, or removes the attributes file when
    /// incremental compilation is off.
    pub fn write_expected(&self) -> Result<(), CacheError> {
        let path = self.cache_dir.join(ATTRIBUTES_FILE);
        match self.expected {
            Some(attributes) => {
                std::fs::create_dir_all(&self.cache_dir)
                    .map_err(|e| CacheError::io(&self.cache_dir, e))?;
                let json = serde_json::to_string_pretty(&attributes).map_err(|e| {
                    CacheError::Serialization {
                        reason: e.to_string(),
                    }
                })?;
                std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
            }
            None => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(CacheError::io(path, e)),
            },
        }
    }

    /// Deletes the whole cache directory.
    pub fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => {
                tracing::debug!(dir = %self.cache_dir.display(), "cleared cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&self.cache_dir, e)),
        }
    }

    fn load_stored(&self) -> StoredAttributes {
        let path = self.cache_dir.join(ATTRIBUTES_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredAttributes::Missing,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read cache attributes");
                return StoredAttributes::Corrupt;
            }
        };
        match serde_json::from_str(&content) {
            Ok(attributes) => StoredAttributes::Present(attributes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable cache attributes");
                StoredAttributes::Corrupt
            }
        }
    }

    fn has_data(&self) -> bool {
        std::fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .any(|entry| entry.file_name() != ATTRIBUTES_FILE)
            })
            .unwrap_or(false)
    }
}
