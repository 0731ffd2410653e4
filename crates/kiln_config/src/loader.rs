//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-module references.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.source_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "project.source_extensions must list at least one extension".to_string(),
        ));
    }
    for (name, module) in &config.modules {
        if name.is_empty() || name.contains(':') {
            return Err(ConfigError::ValidationError(format!(
                "invalid module name '{name}'"
            )));
        }
        for dep in &module.dependencies {
            if !config.modules.contains_key(dep.module()) {
                return Err(ConfigError::UnknownModule {
                    module: name.clone(),
                    dependency: dep.module().to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "app"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "app");
        assert!(config.modules.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "app"
cache_dir = "build/cache"
output_root = "out"
source_extensions = ["kt", "kts"]

[compiler]
incremental = false
ignored_arguments = ["verbose"]
tracked_flags = ["multiplatform"]

[compiler.arguments]
language_version = "2.0"
multiplatform = true

[modules.core]
sources = ["core/src"]
tests = ["core/test"]
excluded = ["core/src/gen"]
output = "out/core"

[modules.app]
sources = ["app/src"]
dependencies = [{ module = "core", exported = true }]
incremental = true

[[excludes]]
path = "core/src/Skip.kt"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.cache_dir, "build/cache");
        assert_eq!(config.project.output_root.as_deref(), Some("out"));
        assert!(!config.compiler.incremental);
        assert_eq!(config.compiler.arguments.len(), 2);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules["core"].excluded, vec!["core/src/gen"]);
        assert_eq!(config.modules["app"].incremental, Some(true));
        assert_eq!(config.excludes.len(), 1);
    }

    #[test]
    fn missing_project_name_errors() {
        let toml = r#"
[project]
name = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn unknown_dependency_errors() {
        let toml = r#"
[project]
name = "app"

[modules.app]
dependencies = ["ghost"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModule { ref dependency, .. } if dependency == "ghost"));
    }

    #[test]
    fn invalid_module_name_errors() {
        let toml = r#"
[project]
name = "app"

[modules."a:b"]
sources = ["src"]
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn malformed_toml_errors() {
        assert!(matches!(
            load_config_from_str("[project"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"disk\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "disk");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_config(dir.path()), Err(ConfigError::IoError(_))));
    }
}
