//! Diagnostics for formdoc
//!
//! Every component reports problems through an injected [`Diagnostics`]
//! handle instead of a process-wide logger. The handle wraps a
//! [`DiagnosticSink`]; the default sink forwards to `tracing`, and
//! [`CollectingSink`] keeps the records for tests and for `formdoc check`.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Diagnostic codes emitted by the workspace
pub mod codes {
    /// Expression could not be parsed
    pub const EXPR_SYNTAX: &str = "E001";
    /// Expression failed during evaluation
    pub const EXPR_EVAL: &str = "E002";
    /// Template failed to render
    pub const TEMPLATE_RENDER: &str = "E003";
    /// Variable referenced by an expression is not in the context
    pub const UNDEFINED_VARIABLE: &str = "W001";
    /// Structured condition had an unrecognized shape
    pub const UNKNOWN_CONDITION: &str = "W002";
    /// Marker not present in the document
    pub const MARKER_NOT_FOUND: &str = "W010";
    /// Fragment file missing or unreadable
    pub const FRAGMENT_MISSING: &str = "W011";
    /// Drawings or section properties were lost between load and save
    pub const STRUCTURE_LOSS: &str = "W012";
    /// Configuration entry could not be deserialized and was skipped
    pub const CONFIG_ENTRY_SKIPPED: &str = "W020";
    /// Table row of the wrong shape was dropped
    pub const TABLE_ROW_SKIPPED: &str = "W021";
}

/// A diagnostic message
///
/// # Example
///
/// ```
/// use formdoc_core::diagnostics::{Diagnostic, Severity};
///
/// let diag = Diagnostic::warning("Variable 'x' not defined")
///     .with_code("W001")
///     .with_help("Add 'x' to the form answers");
/// assert_eq!(diag.severity, Severity::Warning);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level of the diagnostic
    pub severity: Severity,

    /// The diagnostic message
    pub message: String,

    /// Optional code (e.g., "E001", "W010")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Additional help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// Related notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Trace of a decision, not a problem
    Debug,

    /// Informational message
    Info,

    /// Something was skipped or defaulted
    Warning,

    /// An operation failed and was contained
    Error,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            code: None,
            help: None,
            notes: Vec::new(),
        }
    }

    /// Create an error diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create an info diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Create a debug diagnostic
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, message)
    }

    /// Set the diagnostic code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Check if this is an error-level diagnostic
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning-level diagnostic
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: severity[code]: message
        write!(f, "{}", self.severity)?;
        if let Some(ref code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)?;

        if let Some(ref help) = self.help {
            write!(f, "\n  = help: {}", help)?;
        }
        for note in &self.notes {
            write!(f, "\n  = note: {}", note)?;
        }

        Ok(())
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for diagnostics
pub trait DiagnosticSink: Send + Sync {
    /// Receive one diagnostic
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let code = diagnostic.code.as_deref().unwrap_or("-");
        match diagnostic.severity {
            Severity::Debug => tracing::debug!(code, "{}", diagnostic.message),
            Severity::Info => tracing::info!(code, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(code, "{}", diagnostic.message),
            Severity::Error => tracing::error!(code, "{}", diagnostic.message),
        }
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything collected so far
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Drain everything collected so far
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of diagnostics carrying `code`
    pub fn count_code(&self, code: &str) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.code.as_deref() == Some(code))
            .count()
    }

    /// Check if any error was collected
    pub fn has_errors(&self) -> bool {
        self.lock().iter().any(|d| d.is_error())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle passed to every component at construction
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
}

impl Diagnostics {
    /// Wrap an arbitrary sink
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Handle that forwards to `tracing`
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Handle backed by a fresh [`CollectingSink`], returned alongside it
    pub fn collecting() -> (Self, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (Self::new(sink.clone()), sink)
    }

    /// Emit a diagnostic
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.sink.emit(diagnostic);
    }

    /// Emit a debug trace
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Diagnostic::debug(message));
    }

    /// Emit an informational message
    pub fn info(&self, message: impl Into<String>) {
        self.emit(Diagnostic::info(message));
    }

    /// Emit a coded warning
    pub fn warning(&self, code: &str, message: impl Into<String>) {
        self.emit(Diagnostic::warning(message).with_code(code));
    }

    /// Emit a coded error
    pub fn error(&self, code: &str, message: impl Into<String>) {
        self.emit(Diagnostic::error(message).with_code(code));
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_builder() {
        let diag = Diagnostic::error("Unexpected token")
            .with_code(codes::EXPR_SYNTAX)
            .with_help("Check the quotes")
            .with_note("in rule 2");

        assert!(diag.is_error());
        assert_eq!(diag.code.as_deref(), Some("E001"));
        assert_eq!(diag.notes.len(), 1);
    }

    #[test]
    fn test_display_format() {
        let diag = Diagnostic::warning("Marker not found").with_code("W010");
        assert_eq!(diag.to_string(), "warning[W010]: Marker not found");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_collecting_sink() {
        let (diags, sink) = Diagnostics::collecting();
        diags.warning(codes::UNDEFINED_VARIABLE, "x undefined");
        diags.error(codes::EXPR_EVAL, "boom");
        diags.debug("trace");

        assert_eq!(sink.snapshot().len(), 3);
        assert_eq!(sink.count_code("W001"), 1);
        assert!(sink.has_errors());

        let drained = sink.take();
        assert_eq!(drained.len(), 3);
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_clones_share_sink() {
        let (diags, sink) = Diagnostics::collecting();
        let clone = diags.clone();
        clone.info("from clone");
        diags.info("from original");
        assert_eq!(sink.snapshot().len(), 2);
    }

    #[test]
    fn test_serialize_skips_empty() {
        let json = serde_json::to_string(&Diagnostic::info("hello")).unwrap();
        assert_eq!(json, r#"{"severity":"info","message":"hello"}"#);
    }
}
