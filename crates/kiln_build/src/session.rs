//! A build session: every target of a project, built chunk by chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kiln_cache::CacheStatus;
use kiln_common::TargetId;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::Serialize;

use crate::arguments::{CompilerArguments, ConfigurationChangeDetector};
use crate::chunk::{BuildChunk, ChunkCoordinator};
use crate::compiler::{CompileOutput, CompileRequest, Compiler};
use crate::dirty::{ContentHashTracker, DirtyFileTracker};
use crate::error::BuildError;
use crate::graph::TargetGraph;
use crate::round::RoundContext;
use crate::target::{ModuleBuildTarget, SourcesToCompile};

/// Upper bound on rounds per chunk; a compiler that keeps registering new
/// roots past this is reported as a compilation failure.
const MAX_ROUNDS: u32 = 16;

/// Why a chunk is rebuilt from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    /// The representative has incremental compilation turned off.
    IncrementalDisabled,
    /// No cache exists yet.
    CacheAbsent,
    /// The cache was written in an incompatible format.
    CacheStale,
    /// Compiler arguments changed since the last successful build.
    ConfigurationChanged,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RebuildReason::IncrementalDisabled => "incremental compilation disabled",
            RebuildReason::CacheAbsent => "no previous build",
            RebuildReason::CacheStale => "cache format changed",
            RebuildReason::ConfigurationChanged => "compiler configuration changed",
        })
    }
}

/// How a chunk is compiled this round. Decided once per chunk, by its
/// representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BuildMode {
    /// Only dirty files are compiled.
    Incremental,
    /// Every source is compiled.
    Full {
        /// Why.
        reason: RebuildReason,
    },
}

impl BuildMode {
    /// Returns `true` for a full rebuild.
    pub fn is_full(&self) -> bool {
        matches!(self, BuildMode::Full { .. })
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Incremental => f.write_str("incremental"),
            BuildMode::Full { reason } => write!(f, "full ({reason})"),
        }
    }
}

/// Result of building one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    /// Circular chunk skipped with a warning; treated as up to date.
    NothingToDo,
    /// No file needed compiling.
    UpToDate,
    /// The chunk was compiled.
    Compiled {
        /// Files handed to the compiler over all rounds.
        files: usize,
        /// Removed files processed.
        removed: usize,
        /// Rounds run.
        rounds: u32,
    },
    /// A member failed; the message was reported to the sink.
    Failed {
        /// Failure description.
        message: String,
    },
    /// Not attempted because a dependency failed.
    Blocked {
        /// The failed dependency.
        by: TargetId,
    },
}

/// Outcome of [`BuildSession::build`], in build order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Each chunk's members and outcome.
    pub chunks: Vec<(Vec<TargetId>, ChunkOutcome)>,
}

impl BuildReport {
    /// Outcome of the chunk containing `id`.
    pub fn outcome_of(&self, id: &TargetId) -> Option<&ChunkOutcome> {
        self.chunks
            .iter()
            .find(|(targets, _)| targets.contains(id))
            .map(|(_, outcome)| outcome)
    }

    /// Number of files compiled across all chunks.
    pub fn compiled_files(&self) -> usize {
        self.chunks
            .iter()
            .map(|(_, outcome)| match outcome {
                ChunkOutcome::Compiled { files, .. } => *files,
                _ => 0,
            })
            .sum()
    }

    /// Returns `true` if no chunk failed or was blocked.
    pub fn is_success(&self) -> bool {
        self.chunks.iter().all(|(_, outcome)| {
            !matches!(outcome, ChunkOutcome::Failed { .. } | ChunkOutcome::Blocked { .. })
        })
    }
}

/// Dry-run view of one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPlan {
    /// Members in sorted order.
    pub targets: Vec<TargetId>,
    /// The representative.
    pub representative: TargetId,
    /// Set for circular chunks, which are skipped.
    pub circular: bool,
    /// Mode the chunk would build in; `None` when skipped.
    pub mode: Option<BuildMode>,
    /// Files each member would compile or remove.
    pub sources: BTreeMap<TargetId, SourcesToCompile>,
    /// Configuration problem that would fail the chunk.
    pub error: Option<String>,
}

impl ChunkPlan {
    /// Returns `true` if building the chunk would do nothing.
    pub fn is_up_to_date(&self) -> bool {
        self.circular || (self.error.is_none() && self.sources.values().all(SourcesToCompile::is_empty))
    }
}

/// All targets of a project and the collaborators needed to build them.
pub struct BuildSession {
    targets: BTreeMap<TargetId, ModuleBuildTarget>,
    graph: TargetGraph,
    chunks: ChunkCoordinator,
    detector: ConfigurationChangeDetector,
    arguments: CompilerArguments,
    tracker: Box<dyn DirtyFileTracker>,
}

impl BuildSession {
    /// Creates a session and groups `targets` into chunks.
    ///
    /// Dependencies on targets outside the session are ignored.
    pub fn new(
        targets: Vec<ModuleBuildTarget>,
        detector: ConfigurationChangeDetector,
        arguments: CompilerArguments,
    ) -> Self {
        let targets: BTreeMap<TargetId, ModuleBuildTarget> = targets
            .into_iter()
            .map(|t| (t.id().clone(), t))
            .collect();

        let mut graph = TargetGraph::new();
        for id in targets.keys() {
            graph.add_target(id);
        }
        for (id, target) in &targets {
            for (dep, edge) in target.dependencies() {
                if targets.contains_key(dep) {
                    graph.add_dependency(id, dep, edge.exported);
                } else {
                    tracing::warn!(target_id = %id, dependency = %dep, "ignoring dependency outside the session");
                }
            }
        }
        let chunks = ChunkCoordinator::new(&graph);

        Self {
            targets,
            graph,
            chunks,
            detector,
            arguments,
            tracker: Box::new(ContentHashTracker),
        }
    }

    /// Replaces the dirty-file tracker.
    pub fn with_tracker(mut self, tracker: impl DirtyFileTracker + 'static) -> Self {
        self.tracker = Box::new(tracker);
        self
    }

    /// Looks up a target.
    pub fn target(&self, id: &TargetId) -> Option<&ModuleBuildTarget> {
        self.targets.get(id)
    }

    /// All targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = &ModuleBuildTarget> {
        self.targets.values()
    }

    /// The dependency graph.
    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    /// The chunk coordinator.
    pub fn chunks(&self) -> &ChunkCoordinator {
        &self.chunks
    }

    /// Friend targets of `id` this round; empty for unknown targets.
    pub fn friend_targets(&self, id: &TargetId, round: &RoundContext) -> Vec<TargetId> {
        self.targets
            .get(id)
            .map(|t| t.friend_targets(&self.targets, round))
            .unwrap_or_default()
    }

    fn target_ref(&self, id: &TargetId) -> Result<&ModuleBuildTarget, BuildError> {
        self.targets.get(id).ok_or_else(|| BuildError::Configuration {
            target: id.clone(),
            message: "target is not part of the session".to_string(),
        })
    }

    fn target_mut(&mut self, id: &TargetId) -> Result<&mut ModuleBuildTarget, BuildError> {
        self.targets.get_mut(id).ok_or_else(|| BuildError::Configuration {
            target: id.clone(),
            message: "target is not part of the session".to_string(),
        })
    }

    /// Decides how `chunk` builds, asking only its representative.
    pub fn build_mode(&self, chunk: &BuildChunk, sink: &DiagnosticSink) -> Result<BuildMode, BuildError> {
        let representative = self.target_ref(chunk.representative())?;
        if !representative.is_incremental() {
            return Ok(BuildMode::Full {
                reason: RebuildReason::IncrementalDisabled,
            });
        }
        let reason = match representative.cache_diff().status {
            CacheStatus::Absent => Some(RebuildReason::CacheAbsent),
            CacheStatus::Stale => Some(RebuildReason::CacheStale),
            CacheStatus::UpToDate => representative
                .is_version_changed(&self.detector, &self.arguments, sink)
                .then_some(RebuildReason::ConfigurationChanged),
        };
        Ok(match reason {
            Some(reason) => BuildMode::Full { reason },
            None => BuildMode::Incremental,
        })
    }

    /// Computes what [`build`](Self::build) would do without compiling or
    /// touching caches.
    pub fn plan(&self, round: &RoundContext, sink: &DiagnosticSink) -> Vec<ChunkPlan> {
        self.chunks
            .chunks()
            .iter()
            .map(|chunk| {
                let mut plan = ChunkPlan {
                    targets: chunk.targets().to_vec(),
                    representative: chunk.representative().clone(),
                    circular: chunk.is_circular(),
                    mode: None,
                    sources: BTreeMap::new(),
                    error: None,
                };
                if chunk.is_circular() {
                    return plan;
                }
                let mode = match self.build_mode(chunk, sink) {
                    Ok(mode) => mode,
                    Err(e) => {
                        plan.error = Some(e.to_string());
                        return plan;
                    }
                };
                plan.mode = Some(mode);
                for id in chunk.targets() {
                    let Some(target) = self.targets.get(id) else {
                        continue;
                    };
                    if let Err(e) = target.output_location() {
                        plan.error = Some(e.to_string());
                    }
                    let sources = target.collect_sources_to_compile(&mode, self.tracker.as_ref(), round);
                    plan.sources.insert(id.clone(), sources);
                }
                plan
            })
            .collect()
    }

    /// Builds every chunk in dependency order.
    ///
    /// Circular chunks are skipped with a warning. A chunk that fails is
    /// reported to `sink`; chunks depending on it are blocked and the rest of
    /// the project still builds. Cancellation stops the session immediately
    /// with [`BuildError::Cancelled`]; caches of the interrupted chunk are left
    /// as they were before it started.
    #[tracing::instrument(skip_all, fields(targets = self.targets.len()))]
    pub fn build(
        &mut self,
        round: &mut RoundContext,
        compiler: &dyn Compiler,
        sink: &DiagnosticSink,
    ) -> Result<BuildReport, BuildError> {
        // Files may have changed since the previous build on this session.
        self.next_round();
        let mut report = BuildReport::default();
        let mut failed: BTreeSet<TargetId> = BTreeSet::new();
        let chunks = self.chunks.chunks().to_vec();

        for chunk in &chunks {
            round.cancellation().check()?;

            if chunk.is_circular() {
                let members: Vec<String> = chunk.targets().iter().map(ToString::to_string).collect();
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::CIRCULAR_DEPENDENCY,
                        format!("circular dependency between {}; skipping", members.join(", ")),
                    )
                    .with_target(chunk.representative())
                    .with_help("break the cycle so each module can be compiled on its own"),
                );
                report.chunks.push((chunk.targets().to_vec(), ChunkOutcome::NothingToDo));
                continue;
            }

            if let Some(by) = self.failed_dependency(chunk, &failed) {
                tracing::info!(representative = %chunk.representative(), blocked_by = %by, "skipping chunk");
                failed.extend(chunk.targets().iter().cloned());
                report.chunks.push((chunk.targets().to_vec(), ChunkOutcome::Blocked { by }));
                continue;
            }

            let outcome = match self.build_chunk(chunk, round, compiler, sink) {
                Ok(outcome) => outcome,
                Err(BuildError::Cancelled) => {
                    tracing::info!(representative = %chunk.representative(), "build canceled");
                    return Err(BuildError::Cancelled);
                }
                Err(e @ BuildError::Config(_)) => return Err(e),
                Err(e) => {
                    let code = match &e {
                        BuildError::Configuration { .. } => DiagnosticCode::MISSING_OUTPUT,
                        BuildError::Compilation { .. } => DiagnosticCode::COMPILATION_FAILED,
                        _ => DiagnosticCode::CACHE_WRITE,
                    };
                    sink.emit(Diagnostic::error(code, e.to_string()).with_target(chunk.representative()));
                    failed.extend(chunk.targets().iter().cloned());
                    ChunkOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };
            report.chunks.push((chunk.targets().to_vec(), outcome));
        }

        Ok(report)
    }

    fn failed_dependency(&self, chunk: &BuildChunk, failed: &BTreeSet<TargetId>) -> Option<TargetId> {
        chunk
            .targets()
            .iter()
            .flat_map(|id| self.graph.direct_dependencies(id))
            .map(|(dep, _)| dep)
            .find(|dep| failed.contains(dep))
    }

    #[tracing::instrument(skip_all, fields(representative = %chunk.representative()))]
    fn build_chunk(
        &mut self,
        chunk: &BuildChunk,
        round: &mut RoundContext,
        compiler: &dyn Compiler,
        sink: &DiagnosticSink,
    ) -> Result<ChunkOutcome, BuildError> {
        let representative = chunk.representative().clone();
        let mut mode = self.build_mode(chunk, sink)?;
        if mode == (BuildMode::Full { reason: RebuildReason::CacheStale }) {
            sink.emit(
                Diagnostic::info(DiagnosticCode::STALE_CACHE, "cache was written by an incompatible version; rebuilding")
                    .with_target(&representative),
            );
        }
        tracing::info!(%mode, "building chunk");

        let arguments = self.detector.flatten(&self.arguments);
        let mut files = 0;
        let mut removed = 0;
        let mut rounds = 0;

        loop {
            rounds += 1;
            let mut additional = Vec::new();

            for id in chunk.targets() {
                round.cancellation().check()?;

                let (to_compile, output_location) = {
                    let target = self.target_ref(id)?;
                    let output_location = target.output_location()?;
                    let to_compile = target.collect_sources_to_compile(&mode, self.tracker.as_ref(), round);
                    (to_compile, output_location)
                };

                let output = if to_compile.is_empty() {
                    tracing::debug!(target_id = %id, "nothing to compile");
                    CompileOutput::default()
                } else {
                    self.target_mut(id)?.mark_compiling();
                    let target = self.target_ref(id)?;
                    let sources = target.sources(round);
                    let friends = target.friend_targets(&self.targets, round);
                    let dependencies = self.graph.all_dependencies(id);
                    let request = CompileRequest {
                        target: id,
                        platform: target.platform(),
                        output: &output_location,
                        sources: &sources,
                        to_compile: &to_compile.files,
                        removed: &to_compile.removed,
                        friends: &friends,
                        dependencies: &dependencies,
                        arguments: &arguments,
                        full: mode.is_full(),
                        round: round.round(),
                        cancel: round.cancellation(),
                    };
                    compiler.compile(&request)?
                };

                // A compile interrupted by cancellation must not be recorded.
                round.cancellation().check()?;

                self.target_mut(id)?
                    .update_caches(&to_compile.files, &to_compile.removed, &output)?;
                files += to_compile.files.len();
                removed += to_compile.removed.len();
                if !output.additional_roots.is_empty() {
                    additional.push((id.clone(), output.additional_roots));
                }
            }

            let mut new_roots = false;
            for (id, roots) in additional {
                new_roots |= round.add_roots(&id, roots);
            }
            if !new_roots {
                break;
            }
            if rounds >= MAX_ROUNDS {
                return Err(BuildError::Compilation {
                    target: representative,
                    message: format!("still registering source roots after {MAX_ROUNDS} rounds"),
                });
            }

            let next = round.advance();
            tracing::debug!(round = next, "generated sources registered; starting next round");
            for id in chunk.targets() {
                self.target_mut(id)?.next_round();
            }
            mode = if self.target_ref(&representative)?.is_incremental() {
                BuildMode::Incremental
            } else {
                BuildMode::Full {
                    reason: RebuildReason::IncrementalDisabled,
                }
            };
        }

        let representative_target = self.target_ref(&representative)?;
        if representative_target.is_incremental() {
            arguments.save(&representative_target.arguments_path())?;
        }

        Ok(if files == 0 && removed == 0 {
            ChunkOutcome::UpToDate
        } else {
            ChunkOutcome::Compiled {
                files,
                removed,
                rounds,
            }
        })
    }

    /// Forgets every target's source snapshot; the next read walks the roots
    /// again.
    pub fn next_round(&mut self) {
        for target in self.targets.values_mut() {
            target.next_round();
        }
    }

    /// Deletes the cache of every target.
    pub fn clean(&mut self) -> Result<(), BuildError> {
        for target in self.targets.values_mut() {
            target.clean()?;
        }
        Ok(())
    }
}
