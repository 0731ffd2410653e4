//! Diagnostic codes with category prefixes for structured message identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
///
/// Each category maps to a single-character prefix used in diagnostic code
/// display (e.g., `C001` for a configuration problem, `G001` for a graph one).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Project or target configuration, prefixed with `C`.
    Config,
    /// Incremental cache state, prefixed with `K`.
    Cache,
    /// Module dependency graph structure, prefixed with `G`.
    Graph,
    /// Compilation itself, prefixed with `B`.
    Build,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Config => 'C',
            Category::Cache => 'K',
            Category::Graph => 'G',
            Category::Build => 'B',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `C001`, `K002`, `G001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    /// A target has no resolvable output directory.
    pub const MISSING_OUTPUT: Self = Self::new(Category::Config, 1);
    /// A dependency names a module that does not exist.
    pub const UNKNOWN_DEPENDENCY: Self = Self::new(Category::Config, 2);
    /// The persisted compiler-argument snapshot could not be read.
    pub const CORRUPT_ARGUMENTS: Self = Self::new(Category::Cache, 1);
    /// The cache was written by an incompatible format version and was cleared.
    pub const STALE_CACHE: Self = Self::new(Category::Cache, 2);
    /// Cache state could not be written after a successful compile.
    pub const CACHE_WRITE: Self = Self::new(Category::Cache, 3);
    /// Modules form a dependency cycle.
    pub const CIRCULAR_DEPENDENCY: Self = Self::new(Category::Graph, 1);
    /// The compiler reported a failure.
    pub const COMPILATION_FAILED: Self = Self::new(Category::Build, 1);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Config.prefix(), 'C');
        assert_eq!(Category::Cache.prefix(), 'K');
        assert_eq!(Category::Graph.prefix(), 'G');
        assert_eq!(Category::Build.prefix(), 'B');
    }

    #[test]
    fn display_format() {
        assert_eq!(DiagnosticCode::MISSING_OUTPUT.to_string(), "C001");
        assert_eq!(DiagnosticCode::CIRCULAR_DEPENDENCY.to_string(), "G001");
        assert_eq!(DiagnosticCode::new(Category::Build, 42).to_string(), "B042");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::STALE_CACHE;
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
