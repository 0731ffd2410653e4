//! Opening a project from its `kiln.toml`.

use std::path::Path;

use kiln_config::{load_config, resolve_targets, ProjectConfig};

use crate::arguments::{CompilerArguments, ConfigurationChangeDetector};
use crate::error::BuildError;
use crate::graph::DependencyEdge;
use crate::round::RoundContext;
use crate::session::BuildSession;
use crate::source_set::{CompilerExcludes, ExcludeEntry, SourceRoot};
use crate::target::{ModuleBuildTarget, Platform};

/// A project ready to build: the session and the first round's context.
pub struct OpenProject {
    /// Name from `[project]`.
    pub name: String,
    /// Targets, graph, and chunks.
    pub session: BuildSession,
    /// Root assignments and excludes for round 1.
    pub context: RoundContext,
}

/// Loads `kiln.toml` from `project_dir` and sets up a build session.
pub fn open_project(project_dir: &Path) -> Result<OpenProject, BuildError> {
    let config = load_config(project_dir)?;
    open_project_with(&config, project_dir)
}

/// Sets up a build session from an already loaded configuration.
///
/// Relative paths in `config` are resolved against `project_dir`.
pub fn open_project_with(config: &ProjectConfig, project_dir: &Path) -> Result<OpenProject, BuildError> {
    let resolved = resolve_targets(config, project_dir)?;
    let cache_root = project_dir.join(&config.project.cache_dir);

    let mut context = RoundContext::new(config.project.source_extensions.iter().cloned());
    context.set_compiler_excludes(
        config
            .excludes
            .iter()
            .map(|e| ExcludeEntry {
                path: project_dir.join(&e.path),
                recursive: e.recursive,
            })
            .collect::<CompilerExcludes>(),
    );

    let mut targets = Vec::with_capacity(resolved.len());
    for target in resolved {
        context.set_roots(
            target.id.clone(),
            target
                .roots
                .iter()
                .map(|root| {
                    if root.shared {
                        SourceRoot::included(&root.path)
                    } else {
                        SourceRoot::owned(&root.path)
                    }
                })
                .collect(),
        );
        context.set_excluded(target.id.clone(), target.excluded.clone());

        let dependencies = target
            .dependencies
            .iter()
            .map(|dep| {
                (
                    dep.target.clone(),
                    DependencyEdge {
                        exported: dep.exported,
                    },
                )
            })
            .collect();
        targets.push(ModuleBuildTarget::new(
            target.id,
            Platform::from_kind(target.platform, target.output_dir),
            dependencies,
            target.incremental,
            &cache_root,
        ));
    }

    tracing::debug!(project = %config.project.name, targets = targets.len(), "opened project");

    let session = BuildSession::new(
        targets,
        ConfigurationChangeDetector::from_config(&config.compiler),
        CompilerArguments::from(config.compiler.arguments.clone()),
    );
    Ok(OpenProject {
        name: config.project.name.clone(),
        session,
        context,
    })
}
