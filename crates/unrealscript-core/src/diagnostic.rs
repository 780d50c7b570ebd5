//! Reported diagnostics.

use std::fmt;

use crate::error::{CompilationError, Severity};

/// Whether a diagnostic is an error or a leveled warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error(Severity),
    /// Level 1 is the most important, 4 the most pedantic.
    Warning(u8),
}

/// One error or warning attributed to a class and line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub class: String,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(class: impl Into<String>, err: &CompilationError) -> Self {
        Self {
            kind: DiagnosticKind::Error(err.severity()),
            class: class.into(),
            line: err.span().line,
            message: err.message(),
        }
    }

    pub fn warning(class: impl Into<String>, level: u8, line: u32, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Warning(level),
            class: class.into(),
            line,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Error(_))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            DiagnosticKind::Error(_) => "Error",
            DiagnosticKind::Warning(_) => "Warning",
        };
        write!(f, "{}({}) : {}, {}", self.class, self.line, label, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    #[test]
    fn display_format() {
        let err = CompilationError::nest(Span::at_line(40), "Unexpected 'break'");
        let diag = Diagnostic::error("Pawn", &err);
        assert_eq!(diag.to_string(), "Pawn(40) : Error, Unexpected 'break'");
        assert!(diag.is_error());

        let warn = Diagnostic::warning("Pawn", 2, 7, "'i' : unreferenced local variable");
        assert_eq!(warn.to_string(), "Pawn(7) : Warning, 'i' : unreferenced local variable");
    }
}
