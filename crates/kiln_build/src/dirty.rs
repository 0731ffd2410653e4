//! Dirty-file tracking: which files must be recompiled this round.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::round::RoundContext;
use crate::target::ModuleBuildTarget;

/// Changed and removed files of one target for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFiles {
    /// New or modified files, plus files pulled in with them.
    pub changed: BTreeSet<PathBuf>,
    /// Files known from the previous build that no longer exist.
    pub removed: BTreeSet<PathBuf>,
}

impl DirtyFiles {
    /// Returns `true` if nothing needs recompiling.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Reports dirty files for a target.
///
/// Consulted only when the target's chunk builds incrementally.
pub trait DirtyFileTracker {
    /// Returns the files of `target` that changed since its last build.
    fn dirty_files(&self, target: &ModuleBuildTarget, round: &RoundContext) -> DirtyFiles;
}

/// Tracker comparing content hashes against the target's cache manifest.
///
/// New and modified sources are changed; manifest entries missing from the
/// source set are removed. Sources linked as complementary to any changed or
/// removed file are recompiled with them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashTracker;

impl DirtyFileTracker for ContentHashTracker {
    fn dirty_files(&self, target: &ModuleBuildTarget, round: &RoundContext) -> DirtyFiles {
        let sources = target.sources(round);
        let paths: Vec<PathBuf> = sources.paths().cloned().collect();
        let changes = target.cache().detect_changes(&paths);

        let mut changed: BTreeSet<PathBuf> = changes.changed().cloned().collect();
        let removed: BTreeSet<PathBuf> = changes.deleted_files.into_iter().collect();

        let partners = target
            .cache()
            .complementary()
            .complementary_of(changed.iter().chain(removed.iter()));
        changed.extend(partners.into_iter().filter(|p| sources.contains(p)));

        tracing::debug!(
            target_id = %target.id(),
            changed = changed.len(),
            removed = removed.len(),
            "dirty files"
        );
        DirtyFiles { changed, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOutput;
    use crate::source_set::SourceRoot;
    use crate::target::Platform;
    use kiln_common::TargetId;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        src: PathBuf,
        cache_root: PathBuf,
        ctx: RoundContext,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("A.kt"), "class A").unwrap();
        fs::write(src.join("B.kt"), "class B").unwrap();
        fs::write(src.join("C.kt"), "class C").unwrap();
        let mut ctx = RoundContext::new(["kt"]);
        ctx.set_roots(TargetId::production("core"), vec![SourceRoot::owned(&src)]);
        Fixture {
            cache_root: dir.path().join("cache"),
            src,
            ctx,
            _dir: dir,
        }
    }

    fn open(fx: &Fixture) -> ModuleBuildTarget {
        ModuleBuildTarget::new(
            TargetId::production("core"),
            Platform::Jvm {
                output_dir: Some(fx.cache_root.join("out")),
            },
            Vec::new(),
            true,
            &fx.cache_root,
        )
    }

    fn build_all(target: &mut ModuleBuildTarget, fx: &Fixture, links: Vec<(PathBuf, PathBuf)>) {
        let files: Vec<PathBuf> = target.sources(&fx.ctx).paths().cloned().collect();
        let output = CompileOutput {
            complementary: links,
            ..CompileOutput::default()
        };
        target.update_caches(&files, &[], &output).unwrap();
    }

    #[test]
    fn first_build_reports_everything() {
        let fx = fixture();
        let target = open(&fx);
        let dirty = ContentHashTracker.dirty_files(&target, &fx.ctx);
        assert_eq!(dirty.changed.len(), 3);
        assert!(dirty.removed.is_empty());
    }

    #[test]
    fn reports_modified_and_removed() {
        let fx = fixture();
        let mut target = open(&fx);
        build_all(&mut target, &fx, Vec::new());

        fs::write(fx.src.join("A.kt"), "class A { fun f() = 1 }").unwrap();
        fs::remove_file(fx.src.join("C.kt")).unwrap();

        let target = open(&fx);
        let dirty = ContentHashTracker.dirty_files(&target, &fx.ctx);
        assert_eq!(dirty.changed, BTreeSet::from([fx.src.join("A.kt")]));
        assert_eq!(dirty.removed, BTreeSet::from([fx.src.join("C.kt")]));
    }

    #[test]
    fn complementary_files_are_pulled_in() {
        let fx = fixture();
        let mut target = open(&fx);
        build_all(&mut target, &fx, vec![(fx.src.join("A.kt"), fx.src.join("B.kt"))]);

        fs::write(fx.src.join("A.kt"), "expect class A").unwrap();

        let target = open(&fx);
        let dirty = ContentHashTracker.dirty_files(&target, &fx.ctx);
        assert_eq!(
            dirty.changed,
            BTreeSet::from([fx.src.join("A.kt"), fx.src.join("B.kt")])
        );
    }

    #[test]
    fn unchanged_tree_is_clean() {
        let fx = fixture();
        let mut target = open(&fx);
        build_all(&mut target, &fx, Vec::new());
        let target = open(&fx);
        assert!(ContentHashTracker.dirty_files(&target, &fx.ctx).is_empty());
    }
}
