//! Build messages reported back to the host orchestrator.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! codes, and the target/file they concern. The thread-safe [`DiagnosticSink`]
//! accumulates messages while chunks are built (possibly in parallel), and
//! [`DiagnosticRenderer`] implementations format them for a terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
