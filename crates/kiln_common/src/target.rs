//! Build target identity: a module name paired with a source kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which half of a module a target compiles.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Main (production) sources.
    Production,
    /// Test sources, which may see internal declarations of the production target.
    Test,
}

impl TargetKind {
    /// Returns `true` for [`TargetKind::Test`].
    pub fn is_test(self) -> bool {
        self == TargetKind::Test
    }

    fn suffix(self) -> &'static str {
        match self {
            TargetKind::Production => "production",
            TargetKind::Test => "test",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Identifies one compilation unit: the production or test sources of a module.
///
/// Displayed as `module` for production targets and `module:test` for test
/// targets. Ordering is by module name first so that a module's production
/// target sorts immediately before its test target.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TargetId {
    /// Name of the owning module.
    pub module: String,
    /// Production or test.
    pub kind: TargetKind,
}

impl TargetId {
    /// Creates the production target id for a module.
    pub fn production(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            kind: TargetKind::Production,
        }
    }

    /// Creates the test target id for a module.
    pub fn test(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            kind: TargetKind::Test,
        }
    }

    /// Returns `true` if this is a test target.
    pub fn is_test(&self) -> bool {
        self.kind.is_test()
    }

    /// Returns the production target of the same module.
    pub fn production_counterpart(&self) -> TargetId {
        TargetId::production(self.module.clone())
    }

    /// Directory name used for this target's cache and argument snapshot.
    ///
    /// Stable across runs and unique per target: `core-production`, `core-test`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.module, self.kind.suffix())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Production => write!(f, "{}", self.module),
            TargetKind::Test => write!(f, "{}:test", self.module),
        }
    }
}

/// Error returned when a string is not a valid target id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target '{0}': expected `module` or `module:test`")]
pub struct ParseTargetIdError(pub String);

impl FromStr for TargetId {
    type Err = ParseTargetIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, kind) = match s.split_once(':') {
            None => (s, TargetKind::Production),
            Some((module, "test")) => (module, TargetKind::Test),
            Some((module, "production")) => (module, TargetKind::Production),
            Some(_) => return Err(ParseTargetIdError(s.to_string())),
        };
        if module.is_empty() {
            return Err(ParseTargetIdError(s.to_string()));
        }
        Ok(TargetId {
            module: module.to_string(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(TargetId::production("core").to_string(), "core");
        assert_eq!(TargetId::test("core").to_string(), "core:test");
    }

    #[test]
    fn parse() {
        assert_eq!("app".parse::<TargetId>().unwrap(), TargetId::production("app"));
        assert_eq!("app:test".parse::<TargetId>().unwrap(), TargetId::test("app"));
        assert_eq!(
            "app:production".parse::<TargetId>().unwrap(),
            TargetId::production("app")
        );
        assert!("app:bench".parse::<TargetId>().is_err());
        assert!(":test".parse::<TargetId>().is_err());
    }

    #[test]
    fn production_sorts_before_test() {
        let mut ids = vec![
            TargetId::test("b"),
            TargetId::production("b"),
            TargetId::test("a"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                TargetId::test("a"),
                TargetId::production("b"),
                TargetId::test("b"),
            ]
        );
    }

    #[test]
    fn counterpart_and_dir_name() {
        let t = TargetId::test("core");
        assert!(t.is_test());
        assert_eq!(t.production_counterpart(), TargetId::production("core"));
        assert_eq!(t.dir_name(), "core-test");
        assert_eq!(TargetId::production("core").dir_name(), "core-production");
    }

    #[test]
    fn serde_roundtrip() {
        let t = TargetId::test("core");
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"test\""));
        let back: TargetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
