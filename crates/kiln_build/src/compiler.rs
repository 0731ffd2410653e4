//! The seam between orchestration and an actual compiler.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use kiln_common::{CancellationFlag, TargetId};

use crate::arguments::ArgumentsSnapshot;
use crate::error::BuildError;
use crate::source_set::{SourceRoot, SourceSnapshot};
use crate::target::{OutputLocation, Platform};

/// Everything a compiler needs to build one target for one round.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    /// Target being compiled.
    pub target: &'a TargetId,
    /// Platform of the target.
    pub platform: &'a Platform,
    /// Where outputs go.
    pub output: &'a OutputLocation,
    /// Every source of the target this round.
    pub sources: &'a SourceSnapshot,
    /// Files to (re)compile, sorted.
    pub to_compile: &'a [PathBuf],
    /// Files removed since the last build, sorted.
    pub removed: &'a [PathBuf],
    /// Targets whose internal declarations are visible.
    pub friends: &'a [TargetId],
    /// Every target visible on the compile path.
    pub dependencies: &'a BTreeSet<TargetId>,
    /// Flattened compiler arguments.
    pub arguments: &'a ArgumentsSnapshot,
    /// `true` when the whole target is rebuilt.
    pub full: bool,
    /// Current round number.
    pub round: u32,
    /// Cancellation check-point.
    pub cancel: &'a CancellationFlag,
}

impl CompileRequest<'_> {
    /// Returns `Err(BuildError::Cancelled)` once the host requested it.
    ///
    /// Compilers call this between files so a canceled build stops promptly.
    pub fn check_canceled(&self) -> Result<(), BuildError> {
        self.cancel.check()?;
        Ok(())
    }
}

/// What a compiler reports back after a successful compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// Generated files per compiled source.
    pub generated: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// Pairs of files that must be recompiled together from now on.
    pub complementary: Vec<(PathBuf, PathBuf)>,
    /// Source roots registered during compilation (generated sources).
    /// New roots start another round.
    pub additional_roots: Vec<SourceRoot>,
}

/// A compiler the build session can drive.
pub trait Compiler {
    /// Compiles `request.to_compile` and reports outputs.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, BuildError>;
}

impl<F> Compiler for F
where
    F: Fn(&CompileRequest<'_>) -> Result<CompileOutput, BuildError>,
{
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, BuildError> {
        self(request)
    }
}
