//! Diagnostic accumulation for the Blueprint compiler

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic tagged with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line, self.column, self.severity, self.message
        )
    }
}

/// Collects diagnostics for a single compilation.
///
/// Diagnostics are only ever appended; reporting a new problem never
/// discards earlier ones. Each compilation owns exactly one reporter.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error at the given position.
    pub fn error(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            line,
            column,
        });
    }

    /// Record a warning at the given position.
    pub fn warning(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            line,
            column,
        });
    }

    /// True if any error-severity diagnostic has been recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_keeps_earlier_diagnostics() {
        let mut reporter = ErrorReporter::new();
        reporter.warning("first", 1, 1);
        reporter.error("second", 2, 3);
        reporter.error("third", 4, 1);

        assert!(reporter.has_errors());
        assert_eq!(reporter.diagnostics().len(), 3);
        assert_eq!(reporter.diagnostics()[0].message, "first");
        assert_eq!(
            reporter.diagnostics()[0].severity,
            DiagnosticSeverity::Warning
        );
    }

    #[test]
    fn diagnostic_display_format() {
        let diag = Diagnostic {
            severity: DiagnosticSeverity::Error,
            message: "unexpected token".to_string(),
            line: 7,
            column: 12,
        };
        assert_eq!(diag.to_string(), "7:12: error: unexpected token");
    }
}
