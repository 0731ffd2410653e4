//! The built-in compiler used by `kiln build`.
//!
//! It does not translate anything: each source is copied into the target's
//! output location under a platform-specific name. That is enough to
//! exercise incremental builds end to end, including output cleanup.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_build::{BuildError, CompileOutput, CompileRequest, Compiler, OutputLocation, Platform};

/// Copies sources to the output location.
#[derive(Debug, Default)]
pub struct CopyCompiler;

impl CopyCompiler {
    fn output_name(platform: &Platform, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match platform {
            Platform::Jvm { .. } => format!("{stem}.class"),
            Platform::Js { .. } => format!("{stem}.js"),
            Platform::Metadata { .. } => format!("{stem}.kmeta"),
        }
    }

    /// Directory receiving per-source fragments.
    ///
    /// JS targets link all fragments into one module file, so fragments live
    /// next to it in `<module file>.d/`.
    fn fragment_dir(output: &OutputLocation) -> PathBuf {
        match output {
            OutputLocation::Directory(dir) => dir.clone(),
            OutputLocation::File(file) => {
                let mut name = file.as_os_str().to_owned();
                name.push(".d");
                PathBuf::from(name)
            }
        }
    }

    fn link_module(request: &CompileRequest<'_>, module: &Path, fragments: &Path) -> Result<(), BuildError> {
        let mut linked = String::new();
        for source in request.sources.paths() {
            let fragment = fragments.join(Self::output_name(request.platform, source));
            match fs::read_to_string(&fragment) {
                Ok(text) => {
                    linked.push_str(&text);
                    linked.push('\n');
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&fragment, e)),
            }
        }
        fs::write(module, linked).map_err(|e| io_error(module, e))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Compiler for CopyCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, BuildError> {
        let fragments = Self::fragment_dir(request.output);
        fs::create_dir_all(&fragments).map_err(|e| io_error(&fragments, e))?;

        let mut output = CompileOutput::default();
        for source in request.to_compile {
            request.check_canceled()?;
            let dest = fragments.join(Self::output_name(request.platform, source));
            fs::copy(source, &dest).map_err(|e| BuildError::Compilation {
                target: request.target.clone(),
                message: format!("cannot compile {}: {e}", source.display()),
            })?;
            tracing::debug!(source = %source.display(), output = %dest.display(), "compiled");
            output.generated.insert(source.clone(), vec![dest]);
        }

        if let OutputLocation::File(module) = request.output {
            // Removed sources' fragments are deleted only after this returns.
            Self::link_module(request, module, &fragments)?;
        }
        Ok(output)
    }
}
