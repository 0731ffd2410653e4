//! Configuration types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata (name, cache location, source extensions).
    pub project: ProjectMeta,
    /// Compiler arguments and incremental-compilation settings.
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Named modules, each contributing a production and optionally a test target.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
    /// Compiler-level excludes applied to every target.
    #[serde(default)]
    pub excludes: Vec<ExcludeConfig>,
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Directory holding per-target incremental caches, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Root under which `production/<module>` and `test/<module>` output
    /// directories are placed for modules without an explicit output.
    #[serde(default)]
    pub output_root: Option<String>,
    /// File extensions recognized as source files (without the leading dot).
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

fn default_cache_dir() -> String {
    ".kiln/cache".to_string()
}

fn default_source_extensions() -> Vec<String> {
    vec!["kt".to_string()]
}

/// Compiler settings shared by every target.
#[derive(Debug, Deserialize)]
pub struct CompilerConfig {
    /// Whether incremental compilation is enabled project-wide.
    #[serde(default = "default_true")]
    pub incremental: bool,
    /// Compiler arguments; flattened and persisted after each successful build.
    #[serde(default)]
    pub arguments: BTreeMap<String, ArgValue>,
    /// Arguments that never affect output (informational flags); ignored when
    /// comparing against the previous build.
    #[serde(default = "default_ignored_arguments")]
    pub ignored_arguments: Vec<String>,
    /// Boolean arguments whose `true` → not-`true` transition forces a rebuild,
    /// while turning them on does not.
    #[serde(default = "default_tracked_flags")]
    pub tracked_flags: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            arguments: BTreeMap::new(),
            ignored_arguments: default_ignored_arguments(),
            tracked_flags: default_tracked_flags(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ignored_arguments() -> Vec<String> {
    ["verbose", "suppress_warnings", "report_perf", "color"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_tracked_flags() -> Vec<String> {
    ["multiplatform", "source_map"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A single compiler argument value as written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// `flag = true`
    Bool(bool),
    /// `jobs = 4`
    Integer(i64),
    /// `ratio = 0.5`
    Float(f64),
    /// `language_version = "2.0"`
    Text(String),
    /// `plugins = ["a", "b"]`
    List(Vec<String>),
}

impl fmt::Display for ArgValue {
    /// Formats the value for messages; lists are comma-separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Integer(i) => write!(f, "{i}"),
            ArgValue::Float(x) => write!(f, "{x}"),
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// One module: its source roots, outputs, and dependencies.
#[derive(Debug, Default, Deserialize)]
pub struct ModuleConfig {
    /// Production source roots.
    #[serde(default)]
    pub sources: Vec<RootConfig>,
    /// Test source roots. A test target exists only when this is non-empty.
    #[serde(default)]
    pub tests: Vec<RootConfig>,
    /// Directories excluded from this module's roots; never descended into.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Output directory for production classes.
    #[serde(default)]
    pub output: Option<String>,
    /// Output directory for test classes.
    #[serde(default)]
    pub test_output: Option<String>,
    /// Compilation platform.
    #[serde(default)]
    pub platform: PlatformKind,
    /// Modules this module depends on.
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
    /// Per-module override of `compiler.incremental`.
    #[serde(default)]
    pub incremental: Option<bool>,
}

/// A source root, either a bare path or a table with the shared flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RootConfig {
    /// `"src/main"`
    Path(String),
    /// `{ path = "../common/src", shared = true }`
    Detailed {
        /// Root directory.
        path: String,
        /// Whether the root is owned by another target and only shared into this one.
        #[serde(default)]
        shared: bool,
    },
}

impl RootConfig {
    /// Returns the configured root path.
    pub fn path(&self) -> &str {
        match self {
            RootConfig::Path(path) | RootConfig::Detailed { path, .. } => path,
        }
    }

    /// Returns `true` if the root is shared into this module from elsewhere.
    pub fn is_shared(&self) -> bool {
        matches!(self, RootConfig::Detailed { shared: true, .. })
    }
}

/// A dependency on another module, either a bare name or a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencyConfig {
    /// `"core"`
    Name(String),
    /// `{ module = "core", exported = true }`
    Detailed {
        /// The module depended upon.
        module: String,
        /// Whether dependents of this module also see `module`.
        #[serde(default)]
        exported: bool,
    },
}

impl DependencyConfig {
    /// Returns the name of the module depended upon.
    pub fn module(&self) -> &str {
        match self {
            DependencyConfig::Name(module) | DependencyConfig::Detailed { module, .. } => module,
        }
    }

    /// Returns `true` if the dependency is re-exported to dependents.
    pub fn is_exported(&self) -> bool {
        matches!(self, DependencyConfig::Detailed { exported: true, .. })
    }
}

/// Compilation platform of a module.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Class files written into an output directory (default).
    #[default]
    Jvm,
    /// A single JavaScript module file per target.
    Js,
    /// Platform-independent metadata for shared (common) code.
    Metadata,
}

/// A compiler-level exclude entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ExcludeConfig {
    /// File or directory to exclude, relative to the project root.
    pub path: String,
    /// For directories: exclude the whole subtree (`true`) or only direct children.
    #[serde(default = "default_true")]
    pub recursive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const HEADER: &str = r#"
[project]
name = "demo"
"#;

    #[test]
    fn defaults_apply() {
        let config = load_config_from_str(HEADER).unwrap();
        assert_eq!(config.project.cache_dir, ".kiln/cache");
        assert_eq!(config.project.source_extensions, vec!["kt"]);
        assert!(config.compiler.incremental);
        assert!(config.compiler.ignored_arguments.contains(&"verbose".to_string()));
        assert!(config.compiler.tracked_flags.contains(&"multiplatform".to_string()));
    }

    #[test]
    fn argument_value_variants() {
        let toml = format!(
            r#"{HEADER}
[compiler.arguments]
multiplatform = true
jobs = 4
ratio = 0.5
language_version = "2.0"
plugins = ["serialization", "parcelize"]
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        let args = &config.compiler.arguments;
        assert_eq!(args["multiplatform"], ArgValue::Bool(true));
        assert_eq!(args["jobs"], ArgValue::Integer(4));
        assert_eq!(args["ratio"], ArgValue::Float(0.5));
        assert_eq!(args["language_version"], ArgValue::Text("2.0".into()));
        assert_eq!(args["plugins"].to_string(), "serialization,parcelize");
    }

    #[test]
    fn roots_and_dependencies_both_forms() {
        let toml = format!(
            r#"{HEADER}
[modules.common]
sources = ["common/src"]

[modules.jvm]
sources = ["jvm/src", {{ path = "common/src", shared = true }}]
dependencies = ["util", {{ module = "common", exported = true }}]

[modules.util]
sources = ["util/src"]
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        let jvm = &config.modules["jvm"];
        assert_eq!(jvm.sources[0].path(), "jvm/src");
        assert!(!jvm.sources[0].is_shared());
        assert!(jvm.sources[1].is_shared());
        assert_eq!(jvm.dependencies[0].module(), "util");
        assert!(!jvm.dependencies[0].is_exported());
        assert!(jvm.dependencies[1].is_exported());
    }

    #[test]
    fn platform_variants() {
        for (input, expected) in [
            ("jvm", PlatformKind::Jvm),
            ("js", PlatformKind::Js),
            ("metadata", PlatformKind::Metadata),
        ] {
            let toml = format!(
                r#"{HEADER}
[modules.m]
sources = ["src"]
platform = "{input}"
"#
            );
            let config = load_config_from_str(&toml).unwrap();
            assert_eq!(config.modules["m"].platform, expected);
        }
    }

    #[test]
    fn excludes_default_recursive() {
        let toml = format!(
            r#"{HEADER}
[[excludes]]
path = "src/generated"

[[excludes]]
path = "src/flat"
recursive = false
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        assert!(config.excludes[0].recursive);
        assert!(!config.excludes[1].recursive);
    }
}
