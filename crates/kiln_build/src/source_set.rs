//! Per-round computation of the source files belonging to a target.
//!
//! Source roots are walked with `walkdir`; excluded directories are pruned
//! with `filter_entry` so their subtrees are never read. The result is a
//! [`SourceSnapshot`] keyed by file path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kiln_common::TargetId;
use walkdir::WalkDir;

use crate::round::RoundContext;

/// Ownership of a source root relative to the target it is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// The root belongs to the target.
    Owned,
    /// The root belongs to another target and is shared into this one
    /// (common code compiled again by a platform target).
    Included,
}

/// A directory (or single file) contributing sources to a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRoot {
    /// Root path.
    pub path: PathBuf,
    /// Whether the root is owned or shared in.
    pub kind: RootKind,
}

impl SourceRoot {
    /// A root owned by the target.
    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::Owned,
        }
    }

    /// A root shared into the target from elsewhere.
    pub fn included(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::Included,
        }
    }
}

/// A single compiler-level exclude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeEntry {
    /// Excluded file or directory.
    pub path: PathBuf,
    /// For directories: whole subtree (`true`) or direct children only.
    pub recursive: bool,
}

/// Compiler-level excludes shared by every target of a project.
#[derive(Debug, Clone, Default)]
pub struct CompilerExcludes {
    entries: Vec<ExcludeEntry>,
}

impl CompilerExcludes {
    /// Creates an empty exclude list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exclude entry.
    pub fn add(&mut self, entry: ExcludeEntry) {
        self.entries.push(entry);
    }

    /// Returns `true` if `file` is excluded.
    pub fn is_excluded_file(&self, file: &Path) -> bool {
        self.entries.iter().any(|entry| {
            file == entry.path
                || (entry.recursive && file.starts_with(&entry.path))
                || (!entry.recursive && file.parent() == Some(entry.path.as_path()))
        })
    }

    /// Returns `true` if every file below `dir` is excluded, so the walk can
    /// skip the directory entirely.
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.recursive && dir.starts_with(&entry.path))
    }
}

impl FromIterator<ExcludeEntry> for CompilerExcludes {
    fn from_iter<I: IntoIterator<Item = ExcludeEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A source file of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Path of the file.
    pub path: PathBuf,
    /// Whether the file came from an [`RootKind::Included`] root.
    pub is_cross_compiled: bool,
}

/// The sources of one target for one round, keyed by path.
///
/// Snapshots are immutable; a new round produces a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    round: u32,
    sources: BTreeMap<PathBuf, Source>,
}

impl SourceSnapshot {
    /// Creates a snapshot from already-collected sources.
    pub fn from_sources(round: u32, sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            round,
            sources: sources.into_iter().map(|s| (s.path.clone(), s)).collect(),
        }
    }

    /// Round the snapshot was computed in.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Looks up a source by path.
    pub fn get(&self, path: &Path) -> Option<&Source> {
        self.sources.get(path)
    }

    /// Returns `true` if `path` is a source of the target.
    pub fn contains(&self, path: &Path) -> bool {
        self.sources.contains_key(path)
    }

    /// Iterates over source paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.sources.keys()
    }

    /// Iterates over sources in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if the target has no sources this round.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Inputs for computing one target's sources.
#[derive(Debug, Clone, Copy)]
pub struct SourceSet<'a> {
    roots: &'a [SourceRoot],
    excluded: &'a [PathBuf],
    compiler_excludes: &'a CompilerExcludes,
    extensions: &'a BTreeSet<String>,
}

impl<'a> SourceSet<'a> {
    /// Creates a source set from explicit inputs.
    pub fn new(
        roots: &'a [SourceRoot],
        excluded: &'a [PathBuf],
        compiler_excludes: &'a CompilerExcludes,
        extensions: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            roots,
            excluded,
            compiler_excludes,
            extensions,
        }
    }

    /// Takes the roots and exclusions the round context assigns to `target`.
    pub fn for_target(round: &'a RoundContext, target: &TargetId) -> Self {
        Self::new(
            round.roots_of(target),
            round.excluded_of(target),
            round.compiler_excludes(),
            round.extensions(),
        )
    }

    /// Walks every root and collects the source files.
    ///
    /// When two roots yield the same path, the later root wins.
    pub fn compute(&self, round: u32) -> SourceSnapshot {
        let mut sources = BTreeMap::new();

        for root in self.roots {
            if !root.path.exists() {
                tracing::debug!(root = %root.path.display(), "source root does not exist");
                continue;
            }
            let is_cross_compiled = root.kind == RootKind::Included;

            let walker = WalkDir::new(&root.path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    !(entry.file_type().is_dir() && self.is_excluded_dir(entry.path()))
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(root = %root.path.display(), error = %e, "failed to read source root entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if self.is_module_excluded(path)
                    || self.compiler_excludes.is_excluded_file(path)
                    || !self.is_source_file(path)
                {
                    continue;
                }
                sources.insert(
                    path.to_path_buf(),
                    Source {
                        path: path.to_path_buf(),
                        is_cross_compiled,
                    },
                );
            }
        }

        SourceSnapshot { round, sources }
    }

    fn is_module_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|ex| path.starts_with(ex))
    }

    fn is_excluded_dir(&self, dir: &Path) -> bool {
        self.is_module_excluded(dir) || self.compiler_excludes.is_excluded_dir(dir)
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn kt() -> BTreeSet<String> {
        BTreeSet::from(["kt".to_string()])
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "// source").unwrap();
    }

    fn compute(
        roots: &[SourceRoot],
        excluded: &[PathBuf],
        excludes: &CompilerExcludes,
    ) -> SourceSnapshot {
        SourceSet::new(roots, excluded, excludes, &kt()).compute(1)
    }

    #[test]
    fn collects_files_with_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("A.kt"));
        touch(&src.join("pkg/B.kt"));
        touch(&src.join("README.md"));

        let snapshot = compute(&[SourceRoot::owned(&src)], &[], &CompilerExcludes::new());
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&src.join("A.kt")));
        assert!(snapshot.contains(&src.join("pkg/B.kt")));
        assert!(!snapshot.get(&src.join("A.kt")).unwrap().is_cross_compiled);
        assert_eq!(snapshot.round(), 1);
    }

    #[test]
    fn module_exclusions_prune_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("A.kt"));
        touch(&src.join("gen/Generated.kt"));
        touch(&src.join("gen/deep/More.kt"));

        let snapshot = compute(
            &[SourceRoot::owned(&src)],
            &[src.join("gen")],
            &CompilerExcludes::new(),
        );
        assert_eq!(snapshot.paths().collect::<Vec<_>>(), vec![&src.join("A.kt")]);
    }

    #[test]
    fn excluded_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("A.kt"));
        let snapshot = compute(
            &[SourceRoot::owned(&src)],
            &[dir.path().to_path_buf()],
            &CompilerExcludes::new(),
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn compiler_excludes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("Keep.kt"));
        touch(&src.join("Skip.kt"));
        touch(&src.join("flat/Direct.kt"));
        touch(&src.join("flat/nested/Kept.kt"));
        touch(&src.join("tree/nested/Gone.kt"));

        let excludes: CompilerExcludes = [
            ExcludeEntry {
                path: src.join("Skip.kt"),
                recursive: false,
            },
            ExcludeEntry {
                path: src.join("flat"),
                recursive: false,
            },
            ExcludeEntry {
                path: src.join("tree"),
                recursive: true,
            },
        ]
        .into_iter()
        .collect();

        let snapshot = compute(&[SourceRoot::owned(&src)], &[], &excludes);
        let paths: Vec<_> = snapshot.paths().cloned().collect();
        assert_eq!(
            paths,
            vec![src.join("Keep.kt"), src.join("flat/nested/Kept.kt")]
        );
    }

    #[test]
    fn included_roots_are_cross_compiled() {
        let dir = tempfile::tempdir().unwrap();
        let own = dir.path().join("jvm");
        let common = dir.path().join("common");
        touch(&own.join("Platform.kt"));
        touch(&common.join("Shared.kt"));

        let snapshot = compute(
            &[SourceRoot::owned(&own), SourceRoot::included(&common)],
            &[],
            &CompilerExcludes::new(),
        );
        assert!(!snapshot.get(&own.join("Platform.kt")).unwrap().is_cross_compiled);
        assert!(snapshot.get(&common.join("Shared.kt")).unwrap().is_cross_compiled);
    }

    #[test]
    fn overlapping_roots_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("A.kt"));

        let snapshot = compute(
            &[SourceRoot::owned(&src), SourceRoot::included(&src)],
            &[],
            &CompilerExcludes::new(),
        );
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(&src.join("A.kt")).unwrap().is_cross_compiled);
    }

    #[test]
    fn missing_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = compute(
            &[SourceRoot::owned(dir.path().join("nope"))],
            &[],
            &CompilerExcludes::new(),
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Script.kt");
        touch(&file);
        let snapshot = compute(&[SourceRoot::owned(&file)], &[], &CompilerExcludes::new());
        assert!(snapshot.contains(&file));
    }
}
