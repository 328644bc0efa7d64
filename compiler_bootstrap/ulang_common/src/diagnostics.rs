//! Diagnostic records, shared between the compile-time and runtime channels.
//!
//! Spec shape: `(severity, code, message, source_location)`, rendering in two
//! shapes — human-readable and machine (JSON) — per the original's
//! `CompilerSyntaxException::fmt`/`fmt_json`.

use crate::span::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error  "),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// A single diagnostic: a warning or a fatal error raised while compiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub loc: SourceLocation,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>, loc: SourceLocation) -> Self {
        Self { severity: Severity::Error, code: code.into(), message: message.into(), loc }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, loc: SourceLocation) -> Self {
        Self { severity: Severity::Warning, code: code.into(), message: message.into(), loc }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `Severity | file@line:col msg (code) : source_line\n          ^^^`
    pub fn render_human(&self, source_line: Option<&str>) -> String {
        let mut out = format!("{} | {} {} ({})", self.severity, self.loc, self.message, self.code);

        if let Some(line) = source_line {
            out.push_str(" :\n          ");
            out.push_str(line);

            let col = (self.loc.column as usize).min(line.len());
            out.push('\n');
            out.push_str(&" ".repeat(col + 10));
            out.push_str("^^^");
        }

        out
    }

    /// `{file, line, column, severity, message, errno}` shape.
    pub fn render_json(&self) -> String {
        serde_json::to_string(self).expect("Diagnostic serializes")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_human(None))
    }
}

/// Diagnostics queued during a single compilation, in source order.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_fatal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_rendering_includes_code_and_location() {
        let d = Diagnostic::warning("TypesSizeDiff", "widths differ", SourceLocation::new("a.ul", 3, 7));
        let rendered = d.render_human(None);
        assert!(rendered.contains("TypesSizeDiff"));
        assert!(rendered.contains("a.ul@3:7"));
    }

    #[test]
    fn bag_reports_errors_present() {
        let mut bag = DiagnosticBag::new();
        assert!(!bag.has_errors());
        bag.push(Diagnostic::warning("FnNoBody", "no body", SourceLocation::unknown()));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error("VarUndefined", "undeclared", SourceLocation::unknown()));
        assert!(bag.has_errors());
    }
}
