//! Structured build messages with severity, code, and the target they concern.

use std::path::PathBuf;

use kiln_common::TargetId;
use serde::{Deserialize, Serialize};

use crate::code::DiagnosticCode;
use crate::severity::Severity;

/// A structured message reported to the host during a build.
///
/// Each diagnostic carries a severity level and code, a primary message, and
/// optionally the target and file it concerns plus free-form notes and help.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The build target the message concerns, if any.
    pub target: Option<TargetId>,
    /// The file the message concerns, if any.
    pub path: Option<PathBuf>,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            target: None,
            path: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    /// Creates a new informational diagnostic.
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, code, message)
    }

    /// Attaches the target this diagnostic concerns.
    pub fn with_target(mut self, target: &TargetId) -> Self {
        self.target = Some(target.clone());
        self
    }

    /// Attaches the file this diagnostic concerns.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(DiagnosticCode::MISSING_OUTPUT, "no output directory");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "no output directory");
        assert_eq!(format!("{}", diag.code), "C001");
        assert!(diag.target.is_none());
    }

    #[test]
    fn create_warning() {
        let diag = Diagnostic::warning(DiagnosticCode::CIRCULAR_DEPENDENCY, "cycle");
        assert_eq!(diag.severity, Severity::Warning);
    }

    #[test]
    fn builder_methods() {
        let diag = Diagnostic::warning(DiagnosticCode::CORRUPT_ARGUMENTS, "unreadable snapshot")
            .with_target(&TargetId::test("core"))
            .with_path("cache/core-test/arguments.json")
            .with_note("treated as unchanged")
            .with_help("run `kiln clean` to reset caches");
        assert_eq!(diag.target, Some(TargetId::test("core")));
        assert_eq!(
            diag.path,
            Some(PathBuf::from("cache/core-test/arguments.json"))
        );
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }
}
