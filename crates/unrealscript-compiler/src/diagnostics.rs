//! Collected errors and warnings.
//!
//! Every diagnostic goes to the `log` facade as it is reported and is kept
//! for the caller. Warnings above the configured level are dropped before
//! either happens.

use unrealscript_core::{CompilationError, Diagnostic};

/// Diagnostics gathered over a compile run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    warning_level: u8,
    errors: usize,
}

impl Diagnostics {
    pub fn new(warning_level: u8) -> Self {
        Self {
            items: Vec::new(),
            warning_level,
            errors: 0,
        }
    }

    /// Record an error against `class`.
    pub fn error(&mut self, class: &str, err: &CompilationError) {
        let diagnostic = Diagnostic::error(class, err);
        log::error!("{diagnostic}");
        self.errors += 1;
        self.items.push(diagnostic);
    }

    /// Record a warning of `level` at `line`, if the level is enabled.
    pub fn warning(&mut self, class: &str, level: u8, line: u32, message: impl Into<String>) {
        if level > self.warning_level {
            return;
        }
        let diagnostic = Diagnostic::warning(class, level, line, message);
        log::warn!("{diagnostic}");
        self.items.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any diagnostic's message contains `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.items.iter().any(|d| d.message.contains(text))
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unrealscript_core::Span;

    #[test]
    fn warnings_are_gated_by_level() {
        let mut diagnostics = Diagnostics::new(2);
        diagnostics.warning("Pawn", 1, 3, "kept");
        diagnostics.warning("Pawn", 3, 4, "dropped");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.contains("kept"));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn errors_are_counted() {
        let mut diagnostics = Diagnostics::new(1);
        diagnostics.error("Pawn", &CompilationError::syntax(Span::at_line(9), "Missing ';'"));
        assert_eq!(diagnostics.error_count(), 1);
        let first = diagnostics.errors().next().unwrap();
        assert_eq!(first.to_string(), "Pawn(9) : Error, Missing ';'");
    }
}
