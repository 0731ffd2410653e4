//! Checksummed binary artifact storage.
//!
//! Binary cache tables are stored as files in subdirectories of a target's
//! cache directory. Each file starts with a header containing magic bytes,
//! the format version, and a checksum of the payload, so that a truncated or
//! foreign file is detected and treated as missing.

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::version::CACHE_FORMAT_VERSION;

/// Magic bytes identifying a Kiln cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// File extension of binary artifacts.
const ARTIFACT_EXT: &str = "bin";

/// Header prepended to every stored artifact for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],

    /// Cache format version that wrote the artifact.
    pub format_version: u32,

    /// Content hash of the payload data (for integrity checks).
    pub checksum: ContentHash,
}

/// Store for named binary artifacts under one cache directory.
///
/// Each artifact lives at `<cache_dir>/<subdir>/<name>.bin`.
pub struct ArtifactStore {
    /// Root cache directory.
    cache_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a new artifact store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the file path for an artifact.
    pub fn artifact_path(&self, subdir: &str, name: &str) -> PathBuf {
        self.cache_dir
            .join(subdir)
            .join(format!("{name}.{ARTIFACT_EXT}"))
    }

    /// Writes an artifact, replacing any previous version.
    ///
    /// Layout: 4-byte header length (little-endian), bincode header, payload.
    pub fn write(&self, subdir: &str, name: &str, data: &[u8]) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(subdir);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: CACHE_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(data),
        };

        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.artifact_path(subdir, name);
        std::fs::write(&path, &output).map_err(|e| CacheError::io(path, e))
    }

    /// Reads an artifact, validating its header.
    ///
    /// Returns `None` if the file doesn't exist, the header is invalid,
    /// the format version doesn't match, or the checksum doesn't verify.
    pub fn read(&self, subdir: &str, name: &str) -> Option<Vec<u8>> {
        let path = self.artifact_path(subdir, name);
        let raw = std::fs::read(&path).ok()?;

        if raw.len() < 4 {
            return None;
        }

        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: ArtifactHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;

        if header.magic != ARTIFACT_MAGIC || header.format_version != CACHE_FORMAT_VERSION {
            tracing::debug!(path = %path.display(), "ignoring artifact with foreign header");
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            tracing::debug!(path = %path.display(), "ignoring artifact with bad checksum");
            return None;
        }

        Some(payload.to_vec())
    }
}
