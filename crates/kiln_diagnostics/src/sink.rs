//! Collects diagnostics from every chunk of a build.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use kiln_common::TargetId;

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;

/// Shared, append-only diagnostic store with per-severity counters.
///
/// Each emitted diagnostic is also logged through `tracing` so that
/// `KILN_LOG` output and rendered diagnostics never disagree.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    counts: [AtomicUsize; 3],
}

fn slot(severity: Severity) -> usize {
    match severity {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Info => 2,
    }
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            counts: Default::default(),
        }
    }

    /// Records `diag`.
    pub fn emit(&self, diag: Diagnostic) {
        log(&diag);
        self.counts[slot(diag.severity)].fetch_add(1, Ordering::Relaxed);
        self.store().push(diag);
    }

    /// Number of diagnostics emitted with `severity`, including drained ones.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[slot(severity)].load(Ordering::Relaxed)
    }

    /// Returns `true` once any error was emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Warnings emitted so far.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Diagnostics attached to `target`, in emission order.
    pub fn for_target(&self, target: &TargetId) -> Vec<Diagnostic> {
        self.store()
            .iter()
            .filter(|d| d.target.as_ref() == Some(target))
            .cloned()
            .collect()
    }

    /// Drains the stored diagnostics. Counters keep their values.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.store())
    }

    /// Copies the stored diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.store().clone()
    }

    // A panic while pushing cannot leave the Vec half-written.
    fn store(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log(diag: &Diagnostic) {
    let target = diag.target.as_ref().map(ToString::to_string);
    let code = diag.code.to_string();
    match diag.severity {
        Severity::Error => tracing::error!(%code, build_target = ?target, "{}", diag.message),
        Severity::Warning => tracing::warn!(%code, build_target = ?target, "{}", diag.message),
        Severity::Info => tracing::info!(%code, build_target = ?target, "{}", diag.message),
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
