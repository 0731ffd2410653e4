//! Links between source files that must be recompiled together.
//!
//! A declaration split across files (an `expect` declaration and its `actual`
//! implementations, for instance) is compiled correctly only if all parts are
//! seen in the same compilation. The compiler reports such pairs after each
//! compile and they are stored here; the dirty tracker pulls the partners of
//! every changed file into the next compile set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactStore;
use crate::error::CacheError;

const LINKS_SUBDIR: &str = "links";
const LINKS_NAME: &str = "complementary";

/// Symmetric file-to-file link table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplementaryFiles {
    links: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl ComplementaryFiles {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the table from a cache directory; missing or corrupt → empty.
    pub fn load(cache_dir: &Path) -> Self {
        ArtifactStore::new(cache_dir)
            .read(LINKS_SUBDIR, LINKS_NAME)
            .and_then(|bytes| {
                bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                    .ok()
                    .map(|(table, _)| table)
            })
            .unwrap_or_default()
    }

    /// Persists the table into a cache directory.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(
            |e| CacheError::Serialization {
                reason: e.to_string(),
            },
        )?;
        ArtifactStore::new(cache_dir).write(LINKS_SUBDIR, LINKS_NAME, &bytes)
    }

    /// Returns `true` if no links are recorded.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Returns the files linked to `path`.
    pub fn partners(&self, path: &Path) -> impl Iterator<Item = &PathBuf> {
        self.links.get(path).into_iter().flatten()
    }

    /// Returns every file linked to any of `paths` that is not itself in `paths`.
    pub fn complementary_of<'a, I>(&self, paths: I) -> BTreeSet<PathBuf>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let seeds: BTreeSet<&PathBuf> = paths.into_iter().collect();
        seeds
            .iter()
            .flat_map(|p| self.partners(p))
            .filter(|p| !seeds.contains(p))
            .cloned()
            .collect()
    }

    /// Replaces the links of every file in `touched` with `new_links`.
    ///
    /// All links involving a touched file are dropped first; then every pair in
    /// `new_links` is recorded in both directions, except pairs involving a file
    /// in `removed`. Untouched files keep their links.
    pub fn update(
        &mut self,
        touched: &BTreeSet<PathBuf>,
        removed: &BTreeSet<PathBuf>,
        new_links: &[(PathBuf, PathBuf)],
    ) {
        for path in touched.iter().chain(removed.iter()) {
            if let Some(partners) = self.links.remove(path) {
                for partner in partners {
                    self.unlink_one_side(&partner, path);
                }
            }
        }

        for (a, b) in new_links {
            if a == b || removed.contains(a) || removed.contains(b) {
                continue;
            }
            self.links.entry(a.clone()).or_default().insert(b.clone());
            self.links.entry(b.clone()).or_default().insert(a.clone());
        }
    }

    fn unlink_one_side(&mut self, from: &Path, to: &Path) {
        if let Some(set) = self.links.get_mut(from) {
            set.remove(to);
            if set.is_empty() {
                self.links.remove(from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn set(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(|s| p(s)).collect()
    }

    #[test]
    fn links_are_symmetric() {
        let mut table = ComplementaryFiles::new();
        table.update(&set(&[]), &set(&[]), &[(p("Expect.kt"), p("Actual.kt"))]);
        assert_eq!(table.partners(&p("Expect.kt")).collect::<Vec<_>>(), vec![&p("Actual.kt")]);
        assert_eq!(table.partners(&p("Actual.kt")).collect::<Vec<_>>(), vec![&p("Expect.kt")]);
    }

    #[test]
    fn complementary_excludes_seeds() {
        let mut table = ComplementaryFiles::new();
        table.update(
            &set(&[]),
            &set(&[]),
            &[(p("E.kt"), p("A1.kt")), (p("E.kt"), p("A2.kt"))],
        );
        let seeds = vec![p("E.kt"), p("A1.kt")];
        assert_eq!(table.complementary_of(&seeds), set(&["A2.kt"]));
    }

    #[test]
    fn touched_files_lose_old_links() {
        let mut table = ComplementaryFiles::new();
        table.update(&set(&[]), &set(&[]), &[(p("E.kt"), p("A.kt"))]);
        // E.kt recompiled and no longer declares anything expect-ish
        table.update(&set(&["E.kt"]), &set(&[]), &[]);
        assert!(table.is_empty());
    }

    #[test]
    fn removed_files_are_purged_even_without_new_links() {
        let mut table = ComplementaryFiles::new();
        table.update(
            &set(&[]),
            &set(&[]),
            &[(p("E.kt"), p("A.kt")), (p("X.kt"), p("Y.kt"))],
        );
        table.update(&set(&[]), &set(&["A.kt"]), &[(p("E.kt"), p("A.kt"))]);
        assert_eq!(table.partners(&p("E.kt")).count(), 0);
        assert_eq!(table.partners(&p("X.kt")).count(), 1);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = ComplementaryFiles::new();
        table.update(&set(&[]), &set(&[]), &[(p("E.kt"), p("A.kt"))]);
        table.save(dir.path()).unwrap();
        assert_eq!(ComplementaryFiles::load(dir.path()), table);
    }

    #[test]
    fn load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ComplementaryFiles::load(dir.path()).is_empty());
    }
}
