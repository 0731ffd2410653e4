//! The per-target build driver.
//!
//! A [`ModuleBuildTarget`] is one compilation unit: the production or test
//! sources of a module. It lives for the whole build session and cycles
//! through [`RoundState`]s once per round:
//!
//! ```text
//! Uninitialized → SourcesComputed → Compiling → CachesUpdated
//!       ↑                                             │
//!       └──────────────── next_round() ───────────────┘
//! ```
//!
//! The source snapshot is computed on first access within a round and
//! dropped by [`next_round`](ModuleBuildTarget::next_round); the next access
//! recomputes it against the round's roots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use kiln_cache::{
    CacheAttributesDiff, CacheVersionManager, SourceHasher, TargetCache, CACHE_FORMAT_VERSION,
};
use kiln_common::TargetId;
use kiln_config::PlatformKind;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::Serialize;

use crate::arguments::{CompilerArguments, ConfigurationChangeDetector, ConfigurationCheck, ARGUMENTS_FILE};
use crate::compiler::CompileOutput;
use crate::dirty::DirtyFileTracker;
use crate::error::BuildError;
use crate::graph::DependencyEdge;
use crate::round::RoundContext;
use crate::session::BuildMode;
use crate::source_set::{SourceSet, SourceSnapshot};

/// Format version offset of JS caches, which store serialized IR instead of
/// class-file metadata.
const JS_CACHE_FORMAT_OFFSET: u32 = 1000;

/// Compilation platform of a target, with its platform-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// One class-file tree per target.
    Jvm {
        /// Output directory.
        output_dir: Option<PathBuf>,
    },
    /// A single JS module file per target.
    Js {
        /// Directory receiving the module file.
        output_dir: Option<PathBuf>,
    },
    /// Common-code metadata consumed by platform targets.
    Metadata {
        /// Output directory.
        output_dir: Option<PathBuf>,
    },
}

/// Where a target's outputs go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum OutputLocation {
    /// Outputs are written below a directory.
    Directory(PathBuf),
    /// Output is a single file.
    File(PathBuf),
}

impl OutputLocation {
    /// The directory or file path.
    pub fn path(&self) -> &Path {
        match self {
            OutputLocation::Directory(p) | OutputLocation::File(p) => p,
        }
    }

    /// The directory outputs are written into.
    pub fn directory(&self) -> &Path {
        match self {
            OutputLocation::Directory(p) => p,
            OutputLocation::File(p) => p.parent().unwrap_or(p),
        }
    }
}

impl Platform {
    /// Creates the platform variant for a configured kind.
    pub fn from_kind(kind: PlatformKind, output_dir: Option<PathBuf>) -> Self {
        match kind {
            PlatformKind::Jvm => Platform::Jvm { output_dir },
            PlatformKind::Js => Platform::Js { output_dir },
            PlatformKind::Metadata => Platform::Metadata { output_dir },
        }
    }

    /// The configured kind.
    pub fn kind(&self) -> PlatformKind {
        match self {
            Platform::Jvm { .. } => PlatformKind::Jvm,
            Platform::Js { .. } => PlatformKind::Js,
            Platform::Metadata { .. } => PlatformKind::Metadata,
        }
    }

    fn output_dir(&self) -> Option<&Path> {
        match self {
            Platform::Jvm { output_dir }
            | Platform::Js { output_dir }
            | Platform::Metadata { output_dir } => output_dir.as_deref(),
        }
    }

    /// Resolves the output location of `id`.
    ///
    /// A target without an output directory cannot be built.
    pub fn output_location(&self, id: &TargetId) -> Result<OutputLocation, BuildError> {
        let dir = self.output_dir().ok_or_else(|| BuildError::Configuration {
            target: id.clone(),
            message: "no output directory is configured".to_string(),
        })?;
        Ok(match self {
            Platform::Js { .. } => {
                let stem = if id.is_test() {
                    format!("{}_test", id.module)
                } else {
                    id.module.clone()
                };
                OutputLocation::File(dir.join(format!("{stem}.js")))
            }
            Platform::Jvm { .. } | Platform::Metadata { .. } => {
                OutputLocation::Directory(dir.to_path_buf())
            }
        })
    }

    /// Cache format version expected for this platform.
    pub fn cache_format_version(&self) -> u32 {
        match self {
            Platform::Js { .. } => CACHE_FORMAT_VERSION + JS_CACHE_FORMAT_OFFSET,
            Platform::Jvm { .. } | Platform::Metadata { .. } => CACHE_FORMAT_VERSION,
        }
    }

    /// Cache directory of `id` below `cache_root`.
    ///
    /// Metadata caches live in their own subtree so a module can hold both a
    /// platform and a metadata cache.
    pub fn cache_dir(&self, cache_root: &Path, id: &TargetId) -> PathBuf {
        match self {
            Platform::Metadata { .. } => cache_root.join("metadata").join(id.dir_name()),
            Platform::Jvm { .. } | Platform::Js { .. } => cache_root.join(id.dir_name()),
        }
    }
}

/// Lifecycle position of a target within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// The round started; sources were not read yet.
    Uninitialized,
    /// The source snapshot for the round exists.
    SourcesComputed,
    /// The compiler is running.
    Compiling,
    /// Caches reflect the round's compile.
    CachesUpdated,
}

/// Files handed to the compiler for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcesToCompile {
    /// Files to compile, sorted.
    pub files: Vec<PathBuf>,
    /// Files removed since the last build, sorted.
    pub removed: Vec<PathBuf>,
}

impl SourcesToCompile {
    /// Returns `true` if there is nothing to compile or remove.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.removed.is_empty()
    }
}

/// One compilation unit and its incremental state.
#[derive(Debug)]
pub struct ModuleBuildTarget {
    id: TargetId,
    platform: Platform,
    dependencies: Vec<(TargetId, DependencyEdge)>,
    incremental: bool,
    version: CacheVersionManager,
    cache_diff: CacheAttributesDiff,
    cache: TargetCache,
    snapshot: OnceLock<Arc<SourceSnapshot>>,
    state: RoundState,
}

impl ModuleBuildTarget {
    /// Creates a target and inspects its cache directory below `cache_root`.
    ///
    /// The cache attributes diff is computed here, once; stored state is
    /// only loaded when the diff says it is usable.
    pub fn new(
        id: TargetId,
        platform: Platform,
        dependencies: Vec<(TargetId, DependencyEdge)>,
        incremental: bool,
        cache_root: &Path,
    ) -> Self {
        let cache_dir = platform.cache_dir(cache_root, &id);
        let version =
            CacheVersionManager::with_version(&cache_dir, incremental, platform.cache_format_version());
        let cache_diff = version.load_diff();
        let cache = if cache_diff.is_usable() {
            TargetCache::load_or_create(&cache_dir)
        } else {
            TargetCache::fresh(&cache_dir)
        };
        tracing::debug!(target_id = %id, status = ?cache_diff.status, "opened target cache");

        Self {
            id,
            platform,
            dependencies,
            incremental,
            version,
            cache_diff,
            cache,
            snapshot: OnceLock::new(),
            state: RoundState::Uninitialized,
        }
    }

    /// Target identity.
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Target platform.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Direct dependency edges.
    pub fn dependencies(&self) -> &[(TargetId, DependencyEdge)] {
        &self.dependencies
    }

    /// Whether incremental compilation is enabled for this target.
    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// The cache attributes diff computed at construction, refreshed after
    /// every cache update.
    pub fn cache_diff(&self) -> &CacheAttributesDiff {
        &self.cache_diff
    }

    /// The incremental cache.
    pub fn cache(&self) -> &TargetCache {
        &self.cache
    }

    /// This target's cache directory.
    pub fn cache_dir(&self) -> &Path {
        self.version.cache_dir()
    }

    /// Location of the argument snapshot when this target represents a chunk.
    pub fn arguments_path(&self) -> PathBuf {
        self.cache_dir().join(ARGUMENTS_FILE)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RoundState {
        match self.state {
            RoundState::Uninitialized if self.snapshot.get().is_some() => RoundState::SourcesComputed,
            state => state,
        }
    }

    /// Resolves where outputs go.
    pub fn output_location(&self) -> Result<OutputLocation, BuildError> {
        self.platform.output_location(&self.id)
    }

    /// The sources of this round, computed on first access.
    pub fn sources(&self, round: &RoundContext) -> Arc<SourceSnapshot> {
        let snapshot = self.snapshot.get_or_init(|| self.compute_sources(round));
        if snapshot.round() == round.round() {
            return Arc::clone(snapshot);
        }
        // Left over from an earlier round that was never closed with
        // `next_round`; the stored snapshot is not replaced behind `&self`.
        self.compute_sources(round)
    }

    fn compute_sources(&self, round: &RoundContext) -> Arc<SourceSnapshot> {
        let snapshot = SourceSet::for_target(round, &self.id).compute(round.round());
        tracing::debug!(target_id = %self.id, round = round.round(), sources = snapshot.len(), "computed sources");
        Arc::new(snapshot)
    }

    /// Starts a new round: forgets the source snapshot without recomputing it.
    pub fn next_round(&mut self) {
        self.snapshot.take();
        self.state = RoundState::Uninitialized;
    }

    /// Decides what to hand to the compiler.
    ///
    /// `mode` comes from the chunk's representative. Incremental mode returns
    /// the tracker's dirty files (restricted to this round's sources) and its
    /// removed files. A full build returns every source, plus cached files
    /// that are no longer sources.
    pub fn collect_sources_to_compile(
        &self,
        mode: &BuildMode,
        tracker: &dyn DirtyFileTracker,
        round: &RoundContext,
    ) -> SourcesToCompile {
        let sources = self.sources(round);
        match mode {
            BuildMode::Incremental => {
                let dirty = tracker.dirty_files(self, round);
                SourcesToCompile {
                    files: dirty
                        .changed
                        .into_iter()
                        .filter(|p| sources.contains(p))
                        .collect(),
                    removed: dirty.removed.into_iter().collect(),
                }
            }
            BuildMode::Full { .. } => SourcesToCompile {
                files: sources.paths().cloned().collect(),
                removed: self
                    .cache
                    .manifest()
                    .files
                    .keys()
                    .filter(|p| !sources.contains(p))
                    .cloned()
                    .collect(),
            },
        }
    }

    /// Friend targets whose internal declarations this target may see.
    ///
    /// A test target is friends with its module's production target when that
    /// target exists and has sources this round. Production targets have none.
    pub fn friend_targets(
        &self,
        targets: &BTreeMap<TargetId, ModuleBuildTarget>,
        round: &RoundContext,
    ) -> Vec<TargetId> {
        if !self.id.is_test() {
            return Vec::new();
        }
        let production = self.id.production_counterpart();
        match targets.get(&production) {
            Some(target) if !target.sources(round).is_empty() => vec![production],
            _ => Vec::new(),
        }
    }

    /// Returns `true` if the compiler configuration changed since the last
    /// successful build of the chunk this target represents.
    ///
    /// An unreadable snapshot is reported and treated as unchanged.
    pub fn is_version_changed(
        &self,
        detector: &ConfigurationChangeDetector,
        arguments: &CompilerArguments,
        sink: &DiagnosticSink,
    ) -> bool {
        let path = self.arguments_path();
        match detector.check(&path, arguments) {
            ConfigurationCheck::Changed(change) => {
                tracing::info!(target_id = %self.id, %change, "compiler configuration changed");
                true
            }
            ConfigurationCheck::Unreadable(reason) => {
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::CORRUPT_ARGUMENTS,
                        "previous compiler arguments are unreadable; assuming unchanged",
                    )
                    .with_target(&self.id)
                    .with_path(&path)
                    .with_note(reason),
                );
                false
            }
            ConfigurationCheck::NoSnapshot | ConfigurationCheck::Unchanged => false,
        }
    }

    pub(crate) fn mark_compiling(&mut self) {
        self.state = RoundState::Compiling;
    }

    /// Brings the cache in line with a successful compile.
    ///
    /// Stale or foreign cache data is wiped first. Outputs of removed files
    /// are deleted. Complementary links are updated even when nothing was
    /// compiled, so entries of removed files never linger.
    pub fn update_caches(
        &mut self,
        compiled: &[PathBuf],
        removed: &[PathBuf],
        output: &CompileOutput,
    ) -> Result<(), BuildError> {
        if self.cache_diff.must_clear() {
            tracing::debug!(target_id = %self.id, status = ?self.cache_diff.status, "clearing cache");
            self.version.clear()?;
        }

        if !self.incremental {
            self.cache_diff = self.version.load_diff();
            self.state = RoundState::CachesUpdated;
            return Ok(());
        }

        for stale in self.cache.remove(removed) {
            delete_output(&stale)?;
        }

        for path in compiled {
            let generated = output.generated.get(path).cloned().unwrap_or_default();
            for old in self.cache.outputs_of(path).to_vec() {
                if !generated.contains(&old) {
                    delete_output(&old)?;
                }
            }
            match SourceHasher::hash_file(path) {
                Ok(hash) => self.cache.record(path, hash, generated),
                Err(e) => {
                    tracing::debug!(error = %e, "compiled source vanished; dropping from cache");
                    self.cache.remove(std::slice::from_ref(path));
                }
            }
        }

        let touched: BTreeSet<PathBuf> = compiled.iter().cloned().collect();
        let removed: BTreeSet<PathBuf> = removed.iter().cloned().collect();
        self.cache
            .complementary_mut()
            .update(&touched, &removed, &output.complementary);

        self.cache.save()?;
        self.version.write_expected()?;
        self.cache_diff = self.version.load_diff();
        self.state = RoundState::CachesUpdated;
        Ok(())
    }

    /// Deletes the whole cache directory and forgets loaded state.
    pub fn clean(&mut self) -> Result<(), BuildError> {
        self.version.clear()?;
        self.cache = TargetCache::fresh(self.cache_dir());
        self.cache_diff = self.version.load_diff();
        Ok(())
    }
}

fn delete_output(path: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "deleted stale output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}
