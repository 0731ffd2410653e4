//! Shared helpers for CLI commands: project root resolution, opening the
//! project, logging setup, and diagnostic rendering.

use std::path::{Path, PathBuf};

use kiln_build::{open_project, BuildError, OpenProject};
use kiln_config::{ConfigError, CONFIG_FILE};
use kiln_diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticRenderer, DiagnosticSink, JsonRenderer, TerminalRenderer,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{GlobalArgs, ReportFormat};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "KILN_LOG";

/// Installs the global `tracing` subscriber writing to stderr.
///
/// `KILN_LOG` takes precedence; otherwise `--verbose` selects debug and
/// `--quiet` errors only.
pub fn init_tracing(global: &GlobalArgs) {
    let default = if global.verbose {
        "kiln=debug"
    } else if global.quiet {
        "kiln=error"
    } else {
        "kiln=info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(global.verbose)
                .with_ansi(global.color),
        )
        .with(filter)
        .try_init();
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `kiln.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Opens the project selected by the global args.
///
/// Unknown module dependencies are rendered as a diagnostic before the
/// error is returned.
pub fn open(global: &GlobalArgs) -> Result<OpenProject, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    match open_project(&project_dir) {
        Ok(project) => Ok(project),
        Err(BuildError::Config(ConfigError::UnknownModule { module, dependency })) => {
            let diag = Diagnostic::error(
                DiagnosticCode::UNKNOWN_DEPENDENCY,
                format!("module '{module}' depends on unknown module '{dependency}'"),
            )
            .with_path(project_dir.join(CONFIG_FILE))
            .with_help(format!("declare [modules.{dependency}] or remove the dependency"));
            eprint!("{}", TerminalRenderer::new(global.color).render(&diag));
            Err("invalid project configuration".into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Renders every diagnostic in `sink` to stderr. Returns how many were rendered.
pub fn render_diagnostics(sink: &DiagnosticSink, format: ReportFormat, color: bool) -> usize {
    let diagnostics = sink.diagnostics();
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(color);
            for diag in &diagnostics {
                eprint!("{}", renderer.render(diag));
            }
        }
        ReportFormat::Json => {
            for diag in &diagnostics {
                eprintln!("{}", JsonRenderer.render(diag));
            }
        }
    }
    diagnostics.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config,
        }
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[project]\nname=\"t\"").unwrap();
        let sub = tmp.path().join("core/src");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_project_root(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn find_project_root_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = find_project_root(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("could not find kiln.toml"));
    }

    #[test]
    fn config_flag_accepts_file_or_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(CONFIG_FILE);
        fs::write(&file, "[project]\nname=\"t\"").unwrap();

        let from_file = resolve_project_root(&global(Some(file.display().to_string()))).unwrap();
        assert_eq!(from_file, tmp.path());
        let from_dir =
            resolve_project_root(&global(Some(tmp.path().display().to_string()))).unwrap();
        assert_eq!(from_dir, tmp.path());
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[project]\nname=\"t\"\n[modules.app]\ndependencies=[\"nope\"]\n",
        )
        .unwrap();
        let err = open(&global(Some(tmp.path().display().to_string())))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "invalid project configuration");
    }
}
