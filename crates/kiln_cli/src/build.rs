//! The `kiln build` command: compiles every out-of-date chunk.

use kiln_build::{BuildReport, ChunkOutcome};
use kiln_common::TargetId;
use kiln_diagnostics::DiagnosticSink;

use crate::compiler::CopyCompiler;
use crate::pipeline::{open, render_diagnostics};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 if every chunk built, 1 if any chunk failed or was
/// blocked by a failed dependency.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut project = open(global)?;
    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "   Building {} ({} chunks)",
            project.name,
            project.session.chunks().chunks().len()
        );
    }

    let sink = DiagnosticSink::new();
    let report = project
        .session
        .build(&mut project.context, &CopyCompiler, &sink)?;

    render_diagnostics(&sink, args.format, global.color);
    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                for (targets, outcome) in &report.chunks {
                    if let Some(line) = describe(targets, outcome) {
                        eprintln!("{line}");
                    }
                }
                eprintln!("{}", summary(&report, &sink));
            }
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.is_success() && !sink.has_errors() { 0 } else { 1 })
}

/// Status line for one chunk; `None` for chunks with nothing to report.
fn describe(targets: &[TargetId], outcome: &ChunkOutcome) -> Option<String> {
    let names = targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match outcome {
        ChunkOutcome::NothingToDo | ChunkOutcome::UpToDate => None,
        ChunkOutcome::Compiled { files, removed, rounds } => {
            let mut line = format!("   Compiled {names}: {files} file(s)");
            if *removed > 0 {
                line.push_str(&format!(", {removed} removed"));
            }
            if *rounds > 1 {
                line.push_str(&format!(" in {rounds} rounds"));
            }
            Some(line)
        }
        ChunkOutcome::Failed { .. } => Some(format!("     Failed {names}")),
        ChunkOutcome::Blocked { by } => Some(format!("    Skipped {names} (blocked by {by})")),
    }
}

fn summary(report: &BuildReport, sink: &DiagnosticSink) -> String {
    let verdict = if report.is_success() && !sink.has_errors() {
        "Build complete"
    } else {
        "Build failed"
    };
    format!(
        "   {verdict}: {} file(s) compiled, {} error(s), {} warning(s)",
        report.compiled_files(),
        sink.error_count(),
        sink.warning_count()
    )
}
