//! Round-local build context supplied by the host.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use kiln_common::{CancellationFlag, TargetId};

use crate::source_set::{CompilerExcludes, SourceRoot};

/// Everything a target needs from the host to compute its sources for the
/// current round: root assignments, module exclusions, compiler-level
/// excludes, recognized extensions, and the cancellation flag.
///
/// Roots may change between rounds (a compiler can register generated
/// source roots); targets pick the change up after
/// [`ModuleBuildTarget::next_round`](crate::ModuleBuildTarget::next_round).
#[derive(Debug, Clone)]
pub struct RoundContext {
    round: u32,
    roots: BTreeMap<TargetId, Vec<SourceRoot>>,
    excluded: BTreeMap<TargetId, Vec<PathBuf>>,
    compiler_excludes: CompilerExcludes,
    extensions: BTreeSet<String>,
    cancel: CancellationFlag,
}

impl RoundContext {
    /// Creates a context for round 1 recognizing the given source extensions.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            round: 1,
            roots: BTreeMap::new(),
            excluded: BTreeMap::new(),
            compiler_excludes: CompilerExcludes::new(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Shares a cancellation flag with the host.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current round number, starting at 1.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Moves to the next round.
    pub fn advance(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    /// Replaces the roots assigned to `target`.
    pub fn set_roots(&mut self, target: TargetId, roots: Vec<SourceRoot>) {
        self.roots.insert(target, roots);
    }

    /// Appends roots to `target`, skipping ones it already has.
    ///
    /// Returns `true` if at least one root was new.
    pub fn add_roots(&mut self, target: &TargetId, roots: impl IntoIterator<Item = SourceRoot>) -> bool {
        let assigned = self.roots.entry(target.clone()).or_default();
        let mut added = false;
        for root in roots {
            if !assigned.contains(&root) {
                tracing::debug!(target_id = %target, root = %root.path.display(), "registered source root");
                assigned.push(root);
                added = true;
            }
        }
        added
    }

    /// Replaces the module exclusion roots of `target`.
    pub fn set_excluded(&mut self, target: TargetId, excluded: Vec<PathBuf>) {
        self.excluded.insert(target, excluded);
    }

    /// Replaces the compiler-level excludes.
    pub fn set_compiler_excludes(&mut self, excludes: CompilerExcludes) {
        self.compiler_excludes = excludes;
    }

    /// Roots assigned to `target` (empty if none).
    pub fn roots_of(&self, target: &TargetId) -> &[SourceRoot] {
        self.roots.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Module exclusion roots of `target` (empty if none).
    pub fn excluded_of(&self, target: &TargetId) -> &[PathBuf] {
        self.excluded.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Compiler-level excludes shared by all targets.
    pub fn compiler_excludes(&self) -> &CompilerExcludes {
        &self.compiler_excludes
    }

    /// File extensions recognized as sources.
    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// The cancellation flag of the build.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }
}
