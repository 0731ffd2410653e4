//! Integration tests for multi-build and multi-round sessions on real
//! project directories.
//!
//! Each test writes a `kiln.toml` and sources into a temp dir, opens the
//! project, and drives it with a recording compiler that copies every source
//! into the output directory.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_build::{
    open_project, BuildError, BuildMode, ChunkOutcome, CompileOutput, CompileRequest, Compiler,
    RebuildReason, SourceRoot,
};
use kiln_common::{CancellationFlag, TargetId};
use kiln_diagnostics::{DiagnosticCode, DiagnosticSink};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Copies each compiled source to `<output>/<stem>.class` and records the
/// file names it was asked to compile, per call.
#[derive(Default)]
struct RecordingCompiler {
    calls: RefCell<Vec<(TargetId, Vec<String>, bool)>>,
    links: Vec<(PathBuf, PathBuf)>,
}

impl RecordingCompiler {
    fn names(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(|(_, n, _)| n.clone()).collect()
    }

    fn last_full(&self) -> Option<bool> {
        self.calls.borrow().last().map(|(_, _, full)| *full)
    }
}

fn copy_outputs(request: &CompileRequest<'_>) -> Result<CompileOutput, BuildError> {
    let out_dir = request.output.directory();
    fs::create_dir_all(out_dir).unwrap();
    let mut output = CompileOutput::default();
    for file in request.to_compile {
        request.check_canceled()?;
        let stem = file.file_stem().unwrap().to_string_lossy();
        let class = out_dir.join(format!("{stem}.class"));
        fs::copy(file, &class).unwrap();
        output.generated.insert(file.clone(), vec![class]);
    }
    Ok(output)
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

impl Compiler for RecordingCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, BuildError> {
        self.calls.borrow_mut().push((
            request.target.clone(),
            file_names(request.to_compile),
            request.full,
        ));
        let mut output = copy_outputs(request)?;
        output.complementary = self.links.clone();
        Ok(output)
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A single-module project with `A.kt` and `B.kt`.
fn two_file_project(extra_toml: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "kiln.toml",
        &format!(
            r#"
[project]
name = "demo"
output_root = "build"

{extra_toml}

[modules.core]
sources = ["core/src"]
"#
        ),
    );
    write(dir.path(), "core/src/A.kt", "class A");
    write(dir.path(), "core/src/B.kt", "class B");
    dir
}

fn build_once(root: &Path, compiler: &dyn Compiler) -> (kiln_build::BuildReport, DiagnosticSink) {
    let mut project = open_project(root).unwrap();
    let sink = DiagnosticSink::new();
    let report = project
        .session
        .build(&mut project.context, compiler, &sink)
        .unwrap();
    (report, sink)
}

fn core() -> TargetId {
    TargetId::production("core")
}

// ===========================================================================
// Incremental vs full
// ===========================================================================

#[test]
fn only_changed_file_is_recompiled() {
    let dir = two_file_project("");
    let compiler = RecordingCompiler::default();

    let (report, _) = build_once(dir.path(), &compiler);
    assert!(report.is_success());
    assert_eq!(compiler.names(), vec![vec!["A.kt", "B.kt"]]);
    assert_eq!(compiler.last_full(), Some(true));

    write(dir.path(), "core/src/A.kt", "class A { val x = 1 }");
    let (report, _) = build_once(dir.path(), &compiler);
    assert_eq!(compiler.names()[1], vec!["A.kt"]);
    assert_eq!(compiler.last_full(), Some(false));
    assert_eq!(report.compiled_files(), 1);

    let (report, _) = build_once(dir.path(), &compiler);
    assert_eq!(report.outcome_of(&core()), Some(&ChunkOutcome::UpToDate));
    assert_eq!(compiler.names().len(), 2);
}

#[test]
fn disabled_incremental_compiles_everything() {
    let dir = two_file_project("[compiler]\nincremental = false");
    let compiler = RecordingCompiler::default();

    build_once(dir.path(), &compiler);
    write(dir.path(), "core/src/A.kt", "class A { val x = 1 }");
    build_once(dir.path(), &compiler);

    assert_eq!(compiler.names(), vec![vec!["A.kt", "B.kt"], vec!["A.kt", "B.kt"]]);
    assert!(!dir.path().join(".kiln/cache/core-production").exists());
}

#[test]
fn removed_source_deletes_its_output() {
    let dir = two_file_project("");
    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);
    let b_class = dir.path().join("build/production/core/B.class");
    assert!(b_class.exists());

    fs::remove_file(dir.path().join("core/src/B.kt")).unwrap();
    let (report, _) = build_once(dir.path(), &compiler);

    assert!(!b_class.exists());
    assert!(dir.path().join("build/production/core/A.class").exists());
    assert_eq!(
        report.outcome_of(&core()),
        Some(&ChunkOutcome::Compiled {
            files: 0,
            removed: 1,
            rounds: 1
        })
    );
}

#[test]
fn complementary_partner_is_recompiled() {
    let dir = two_file_project("");
    let compiler = RecordingCompiler {
        links: vec![(
            dir.path().join("core/src/A.kt"),
            dir.path().join("core/src/B.kt"),
        )],
        ..RecordingCompiler::default()
    };
    build_once(dir.path(), &compiler);

    write(dir.path(), "core/src/B.kt", "actual class B");
    build_once(dir.path(), &compiler);
    assert_eq!(compiler.names()[1], vec!["A.kt", "B.kt"]);
}

// ===========================================================================
// Configuration changes
// ===========================================================================

fn project_with_arguments(root: &Path, arguments: &str) {
    write(
        root,
        "kiln.toml",
        &format!(
            r#"
[project]
name = "demo"
output_root = "build"

[compiler.arguments]
{arguments}

[modules.core]
sources = ["core/src"]
"#
        ),
    );
}

#[test]
fn changed_argument_forces_full_rebuild() {
    let dir = two_file_project("");
    project_with_arguments(dir.path(), "language_version = \"1.9\"");
    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);

    project_with_arguments(dir.path(), "language_version = \"2.0\"");
    let project = open_project(dir.path()).unwrap();
    let plans = project.session.plan(&project.context, &DiagnosticSink::new());
    assert_eq!(
        plans[0].mode,
        Some(BuildMode::Full {
            reason: RebuildReason::ConfigurationChanged
        })
    );

    build_once(dir.path(), &compiler);
    assert_eq!(compiler.names()[1], vec!["A.kt", "B.kt"]);
}

#[test]
fn tracked_flag_only_counts_when_disabled() {
    let dir = two_file_project("");
    project_with_arguments(dir.path(), "multiplatform = false\nverbose = true");
    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);

    // Enabling a tracked flag and toggling an ignored one is harmless.
    project_with_arguments(dir.path(), "multiplatform = true\nverbose = false");
    let (report, _) = build_once(dir.path(), &compiler);
    assert_eq!(report.outcome_of(&core()), Some(&ChunkOutcome::UpToDate));

    project_with_arguments(dir.path(), "multiplatform = false");
    build_once(dir.path(), &compiler);
    assert_eq!(compiler.names().len(), 2);
    assert_eq!(compiler.last_full(), Some(true));
}

#[test]
fn corrupt_argument_snapshot_falls_back_to_incremental() {
    let dir = two_file_project("");
    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);

    fs::write(
        dir.path().join(".kiln/cache/core-production/arguments.json"),
        "][",
    )
    .unwrap();
    write(dir.path(), "core/src/A.kt", "class A { val y = 2 }");
    let (_, sink) = build_once(dir.path(), &compiler);

    assert_eq!(compiler.names()[1], vec!["A.kt"]);
    assert!(sink
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::CORRUPT_ARGUMENTS));
    assert!(!sink.has_errors());
}

#[test]
fn stale_cache_format_forces_full_rebuild() {
    let dir = two_file_project("");
    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);

    fs::write(
        dir.path().join(".kiln/cache/core-production/attributes.json"),
        r#"{"format_version":0}"#,
    )
    .unwrap();
    let (_, sink) = build_once(dir.path(), &compiler);
    assert_eq!(compiler.names()[1], vec!["A.kt", "B.kt"]);
    assert!(sink
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::STALE_CACHE));
}

// ===========================================================================
// Graph structure
// ===========================================================================

#[test]
fn circular_modules_are_skipped_not_failed() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "kiln.toml",
        r#"
[project]
name = "cyclic"
output_root = "build"

[modules.a]
sources = ["a"]
dependencies = ["b"]

[modules.b]
sources = ["b"]
dependencies = ["a"]

[modules.app]
sources = ["app"]
dependencies = ["a"]
"#,
    );
    write(dir.path(), "a/A.kt", "class A");
    write(dir.path(), "b/B.kt", "class B");
    write(dir.path(), "app/App.kt", "class App");

    let compiler = RecordingCompiler::default();
    let (report, sink) = build_once(dir.path(), &compiler);

    assert_eq!(
        report.outcome_of(&TargetId::production("a")),
        Some(&ChunkOutcome::NothingToDo)
    );
    assert!(report.is_success());
    assert_eq!(compiler.names(), vec![vec!["App.kt"]]);
    assert!(sink
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::CIRCULAR_DEPENDENCY));
}

#[test]
fn test_target_gets_friend_and_exported_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "kiln.toml",
        r#"
[project]
name = "layered"
output_root = "build"

[modules.api]
sources = ["api"]

[modules.core]
sources = ["core/src"]
tests = ["core/test"]
dependencies = [{ module = "api", exported = true }]
"#,
    );
    write(dir.path(), "api/Api.kt", "interface Api");
    write(dir.path(), "core/src/Core.kt", "class Core");
    write(dir.path(), "core/test/CoreTest.kt", "class CoreTest");

    let seen = RefCell::new(BTreeMap::new());
    let compiler = |request: &CompileRequest<'_>| -> Result<CompileOutput, BuildError> {
        seen.borrow_mut().insert(
            request.target.clone(),
            (request.friends.to_vec(), request.dependencies.clone()),
        );
        copy_outputs(request)
    };
    let (report, _) = build_once(dir.path(), &compiler);
    assert!(report.is_success());

    let seen = seen.borrow();
    let (friends, deps) = &seen[&TargetId::test("core")];
    assert_eq!(friends, &vec![TargetId::production("core")]);
    assert!(deps.contains(&TargetId::production("api")));
    assert!(seen[&TargetId::production("api")].0.is_empty());
}

// ===========================================================================
// Rounds and cancellation
// ===========================================================================

#[test]
fn generated_sources_trigger_another_round() {
    let dir = two_file_project("");
    let generated = dir.path().join("build/generated");
    let calls = RefCell::new(Vec::new());
    let compiler = |request: &CompileRequest<'_>| -> Result<CompileOutput, BuildError> {
        calls
            .borrow_mut()
            .push((request.round, file_names(request.to_compile)));
        let mut output = copy_outputs(request)?;
        fs::create_dir_all(&generated).unwrap();
        fs::write(generated.join("Gen.kt"), "class Gen").unwrap();
        output.additional_roots.push(SourceRoot::owned(&generated));
        Ok(output)
    };

    let (report, _) = build_once(dir.path(), &compiler);

    let calls = calls.into_inner();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, vec!["A.kt", "B.kt"]);
    assert_eq!(calls[1], (2, vec!["Gen.kt".to_string()]));
    assert_eq!(
        report.outcome_of(&core()),
        Some(&ChunkOutcome::Compiled {
            files: 3,
            removed: 0,
            rounds: 2
        })
    );
}

#[test]
fn cancellation_propagates_and_keeps_caches_untouched() {
    let dir = two_file_project("");
    let flag = CancellationFlag::new();
    let compiler = |request: &CompileRequest<'_>| -> Result<CompileOutput, BuildError> {
        flag.cancel();
        copy_outputs(request)
    };

    let mut project = open_project(dir.path()).unwrap();
    project.context = project.context.with_cancellation(flag.clone());
    let result = project
        .session
        .build(&mut project.context, &compiler, &DiagnosticSink::new());
    assert!(matches!(result, Err(BuildError::Cancelled)));
    assert!(!dir
        .path()
        .join(".kiln/cache/core-production/manifest.json")
        .exists());

    // The next build starts from scratch.
    let recording = RecordingCompiler::default();
    build_once(dir.path(), &recording);
    assert_eq!(recording.names(), vec![vec!["A.kt", "B.kt"]]);
}

#[test]
fn excluded_directories_never_reach_the_compiler() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "kiln.toml",
        r#"
[project]
name = "excl"
output_root = "build"

[modules.core]
sources = ["src"]
excluded = ["src/fixtures"]

[[excludes]]
path = "src/flat"
recursive = false
"#,
    );
    write(dir.path(), "src/Main.kt", "class Main");
    write(dir.path(), "src/fixtures/Fixture.kt", "class Fixture");
    write(dir.path(), "src/flat/Flat.kt", "class Flat");
    write(dir.path(), "src/flat/deep/Deep.kt", "class Deep");

    let compiler = RecordingCompiler::default();
    build_once(dir.path(), &compiler);
    assert_eq!(compiler.names(), vec![vec!["Main.kt", "Deep.kt"]]);
}
