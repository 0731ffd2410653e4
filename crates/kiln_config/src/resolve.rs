//! Target resolution: turning module declarations into build targets.

use crate::error::ConfigError;
use crate::types::{ModuleConfig, PlatformKind, ProjectConfig, RootConfig};
use kiln_common::{TargetId, TargetKind};
use std::path::{Path, PathBuf};

/// A source root with its path made absolute against the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    /// Absolute root directory.
    pub path: PathBuf,
    /// Whether the root is logically owned by another target.
    pub shared: bool,
}

/// A dependency edge from one target to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// The target depended upon.
    pub target: TargetId,
    /// Whether dependents of the depending target also see `target`.
    pub exported: bool,
}

/// A fully resolved build target.
///
/// Each module yields a production target, and a test target when it declares
/// test roots. Test targets implicitly depend on their module's production target.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Target identity.
    pub id: TargetId,
    /// Compilation platform inherited from the module.
    pub platform: PlatformKind,
    /// Source roots assigned to the target.
    pub roots: Vec<ResolvedRoot>,
    /// Module exclusion roots (absolute).
    pub excluded: Vec<PathBuf>,
    /// Output directory, if one could be determined.
    pub output_dir: Option<PathBuf>,
    /// Direct dependency edges.
    pub dependencies: Vec<ResolvedDependency>,
    /// Whether incremental compilation is enabled for the target.
    pub incremental: bool,
}

/// Resolves every module of the project into its build targets.
///
/// Targets are returned sorted by id. Output directories come from the module's
/// explicit `output`/`test_output`, falling back to
/// `<output_root>/<production|test>/<module>`; a target with neither is still
/// returned, with `output_dir: None`, and fails when it is built.
pub fn resolve_targets(
    config: &ProjectConfig,
    project_dir: &Path,
) -> Result<Vec<ResolvedTarget>, ConfigError> {
    let mut targets = Vec::new();

    for (name, module) in &config.modules {
        let incremental = module.incremental.unwrap_or(config.compiler.incremental);
        let excluded: Vec<PathBuf> = module
            .excluded
            .iter()
            .map(|p| project_dir.join(p))
            .collect();

        let mut production_deps = Vec::with_capacity(module.dependencies.len());
        for dep in &module.dependencies {
            if !config.modules.contains_key(dep.module()) {
                return Err(ConfigError::UnknownModule {
                    module: name.clone(),
                    dependency: dep.module().to_string(),
                });
            }
            production_deps.push(ResolvedDependency {
                target: TargetId::production(dep.module()),
                exported: dep.is_exported(),
            });
        }

        targets.push(ResolvedTarget {
            id: TargetId::production(name.as_str()),
            platform: module.platform,
            roots: resolve_roots(&module.sources, project_dir),
            excluded: excluded.clone(),
            output_dir: output_dir(config, module, name, TargetKind::Production, project_dir),
            dependencies: production_deps.clone(),
            incremental,
        });

        if !module.tests.is_empty() {
            let mut test_deps = vec![ResolvedDependency {
                target: TargetId::production(name.as_str()),
                exported: false,
            }];
            test_deps.extend(production_deps);

            targets.push(ResolvedTarget {
                id: TargetId::test(name.as_str()),
                platform: module.platform,
                roots: resolve_roots(&module.tests, project_dir),
                excluded,
                output_dir: output_dir(config, module, name, TargetKind::Test, project_dir),
                dependencies: test_deps,
                incremental,
            });
        }
    }

    targets.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(targets)
}

fn resolve_roots(roots: &[RootConfig], project_dir: &Path) -> Vec<ResolvedRoot> {
    roots
        .iter()
        .map(|root| ResolvedRoot {
            path: project_dir.join(root.path()),
            shared: root.is_shared(),
        })
        .collect()
}

fn output_dir(
    config: &ProjectConfig,
    module: &ModuleConfig,
    name: &str,
    kind: TargetKind,
    project_dir: &Path,
) -> Option<PathBuf> {
    let explicit = match kind {
        TargetKind::Production => module.output.as_ref(),
        TargetKind::Test => module.test_output.as_ref(),
    };
    if let Some(dir) = explicit {
        return Some(project_dir.join(dir));
    }
    config
        .project
        .output_root
        .as_ref()
        .map(|root| project_dir.join(root).join(kind.to_string()).join(name))
}
