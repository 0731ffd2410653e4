//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[G001]: circular dependency between modules a, b
///   --> target: a
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint_severity(&self, diag: &Diagnostic) -> String {
        if !self.color {
            return diag.severity.to_string();
        }
        let ansi = match diag.severity {
            crate::Severity::Error => "31",
            crate::Severity::Warning => "33",
            crate::Severity::Info => "36",
        };
        format!("\x1b[1;{ansi}m{}\x1b[0m", diag.severity)
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}[{}]: {}\n",
            self.paint_severity(diag),
            diag.code,
            diag.message
        ));

        if let Some(target) = &diag.target {
            out.push_str(&format!("  --> target: {target}\n"));
        }
        if let Some(path) = &diag.path {
            out.push_str(&format!("  --> {}\n", path.display()));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as a single line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        // Diagnostic only holds strings, paths and enums; serialization cannot fail.
        serde_json::to_string(diag).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DiagnosticCode;
    use kiln_common::TargetId;

    #[test]
    fn render_warning_with_target_and_notes() {
        let diag = Diagnostic::warning(
            DiagnosticCode::CIRCULAR_DEPENDENCY,
            "circular dependency between modules a, b",
        )
        .with_target(&TargetId::production("a"))
        .with_note("chunk skipped")
        .with_help("break the cycle");

        let output = TerminalRenderer::new(false).render(&diag);

        assert!(output.contains("warning[G001]: circular dependency between modules a, b"));
        assert!(output.contains("--> target: a"));
        assert!(output.contains("= note: chunk skipped"));
        assert!(output.contains("= help: break the cycle"));
    }

    #[test]
    fn render_without_location() {
        let diag = Diagnostic::error(DiagnosticCode::COMPILATION_FAILED, "general error");
        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("error[B001]: general error"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn render_colored_severity() {
        let diag = Diagnostic::error(DiagnosticCode::COMPILATION_FAILED, "boom");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.contains("\x1b[1;31merror\x1b[0m"));
    }

    #[test]
    fn render_json_line() {
        let diag = Diagnostic::warning(DiagnosticCode::STALE_CACHE, "cache cleared")
            .with_path("cache/core-production");
        let output = JsonRenderer.render(&diag);
        assert!(!output.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["message"], "cache cleared");
    }
}
