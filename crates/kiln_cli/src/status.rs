//! The `kiln status` command: shows what the next build would do.

use kiln_build::{BuildMode, ChunkPlan};
use kiln_diagnostics::DiagnosticSink;

use crate::pipeline::{open, render_diagnostics};
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Runs the `kiln status` command.
///
/// Nothing is compiled and no cache is written. Returns exit code 0 when
/// every chunk is up to date, 1 otherwise.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = open(global)?;
    let sink = DiagnosticSink::new();
    let plans = project.session.plan(&project.context, &sink);

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!("   Checking {} ({} chunks)", project.name, plans.len());
            }
            for plan in &plans {
                println!("{}", describe(plan));
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plans)?);
        }
    }
    render_diagnostics(&sink, args.format, global.color);

    Ok(if plans.iter().all(ChunkPlan::is_up_to_date) { 0 } else { 1 })
}

/// One line per chunk: its members, the build mode, and the pending work.
fn describe(plan: &ChunkPlan) -> String {
    let names = plan
        .targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if plan.circular {
        return format!("{names}: skipped (circular dependency)");
    }
    if let Some(error) = &plan.error {
        return format!("{names}: error: {error}");
    }
    let files: usize = plan.sources.values().map(|s| s.files.len()).sum();
    let removed: usize = plan.sources.values().map(|s| s.removed.len()).sum();
    match plan.mode {
        _ if files == 0 && removed == 0 => format!("{names}: up to date"),
        Some(BuildMode::Full { reason }) => {
            format!("{names}: full rebuild ({reason}), {files} file(s)")
        }
        _ => format!("{names}: {files} changed, {removed} removed"),
    }
}
