//! Incremental build orchestration for module-based compilation targets.
//!
//! Given a set of build targets (the production or test sources of a module)
//! with dependency edges, this crate decides on every build round which files
//! must be recompiled, keeps each target's incremental cache consistent, and
//! skips unnecessary work:
//!
//! - [`SourceSet`] walks a target's source roots once per round
//! - [`DirtyFileTracker`] reports changed and removed files
//! - [`ConfigurationChangeDetector`] forces a full rebuild when compiler
//!   arguments changed since the last successful build
//! - [`ModuleBuildTarget`] drives the collect → compile → update-caches cycle
//! - [`ChunkCoordinator`] groups mutually dependent targets into chunks and
//!   elects the representative asked about chunk-wide decisions
//! - [`BuildSession`] ties everything together for a whole project

#![warn(missing_docs)]

pub mod arguments;
pub mod chunk;
pub mod compiler;
pub mod dirty;
pub mod error;
pub mod graph;
pub mod project;
pub mod round;
pub mod session;
pub mod source_set;
pub mod target;

pub use arguments::{
    ArgumentsSnapshot, ARGUMENTS_FILE, CompilerArguments, ConfigurationChange, ConfigurationChangeDetector,
    ConfigurationCheck,
};
pub use chunk::{BuildChunk, ChunkCoordinator};
pub use compiler::{CompileOutput, CompileRequest, Compiler};
pub use dirty::{ContentHashTracker, DirtyFileTracker, DirtyFiles};
pub use error::BuildError;
pub use graph::{DependencyEdge, TargetGraph};
pub use project::{open_project, open_project_with, OpenProject};
pub use round::RoundContext;
pub use session::{BuildMode, BuildReport, BuildSession, ChunkOutcome, ChunkPlan, RebuildReason};
pub use source_set::{CompilerExcludes, ExcludeEntry, RootKind, Source, SourceRoot, SourceSet, SourceSnapshot};
pub use target::{ModuleBuildTarget, OutputLocation, Platform, RoundState, SourcesToCompile};
