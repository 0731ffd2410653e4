//! Error types for build orchestration.

use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_common::{Cancelled, TargetId};
use kiln_config::ConfigError;

/// Errors that can stop a build session or a single target.
///
/// [`BuildError::Cancelled`] is not a failure: it reports that the host asked
/// the build to stop and must reach the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The target is misconfigured and cannot be built.
    #[error("configuration error in target '{target}': {message}")]
    Configuration {
        /// The misconfigured target.
        target: TargetId,
        /// What is wrong.
        message: String,
    },

    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The build was canceled by the host.
    #[error("build canceled")]
    Cancelled,

    /// The compiler reported a failure for the target.
    #[error("compilation of '{target}' failed: {message}")]
    Compilation {
        /// The target being compiled.
        target: TargetId,
        /// Compiler-provided description.
        message: String,
    },

    /// A persisted argument snapshot exists but cannot be decoded.
    #[error("corrupt argument snapshot at {path}: {reason}")]
    CorruptSnapshot {
        /// Snapshot file.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// Writing incremental cache state failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A filesystem operation outside the cache failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildError::Cancelled)
    }
}

impl From<Cancelled> for BuildError {
    fn from(_: Cancelled) -> Self {
        BuildError::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::CancellationFlag;

    #[test]
    fn configuration_error_names_target() {
        let err = BuildError::Configuration {
            target: TargetId::test("core"),
            message: "no output directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "configuration error in target 'core:test': no output directory"
        );
    }

    #[test]
    fn cancellation_converts_through_question_mark() {
        fn poll(flag: &CancellationFlag) -> Result<(), BuildError> {
            flag.check()?;
            Ok(())
        }
        let flag = CancellationFlag::new();
        assert!(poll(&flag).is_ok());
        flag.cancel();
        assert!(poll(&flag).unwrap_err().is_cancelled());
    }
}
