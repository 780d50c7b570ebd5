//! Error types for the UnrealScript compiler.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilationError
//! ├── Syntax            - token-local (malformed constant, missing symbol)
//! ├── Declaration       - declaration-local (duplicate name, bad modifier mix)
//! ├── Nest              - nest-fatal (unmatched brace, bad break target)
//! ├── Class             - class-fatal (parent has errors, size mismatch)
//! ├── AmbiguousOverload - operator resolution tie
//! ├── Directive         - `#error`
//! ├── Lex(LexError)     - tokenizer failures
//! └── Internal          - broken compiler invariant
//! ```
//!
//! Each variant maps to a [`Severity`], which the pass runner uses to decide
//! whether to resynchronize or abandon the class.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Severity
// ============================================================================

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// A single malformed token.
    TokenLocal,
    /// One declaration statement.
    DeclarationLocal,
    /// The enclosing block.
    NestFatal,
    /// The whole class.
    ClassFatal,
    /// The whole run.
    ProcessFatal,
}

impl Severity {
    /// Whether pass 1 may skip the offending declaration and keep parsing.
    pub fn is_recoverable_in_parse(self) -> bool {
        matches!(self, Severity::TokenLocal | Severity::DeclarationLocal)
    }
}

// ============================================================================
// Lexer Errors
// ============================================================================

/// Errors produced while tokenizing class source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character that starts no token.
    #[error("at {span}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    /// End of input inside a string literal.
    #[error("at {span}: Unterminated string constant")]
    UnterminatedString { span: Span },

    /// End of input inside a `/* */` comment.
    #[error("at {span}: End of script encountered inside comment")]
    UnterminatedComment { span: Span },

    /// A `*/` closing a comment that was never opened.
    #[error("at {span}: Unexpected '*/' outside of comment")]
    UnbalancedComment { span: Span },

    /// End of input inside a captured `{ }` block.
    #[error("at {span}: Unexpected end of file inside braced block")]
    UnterminatedBlock { span: Span },

    /// A name constant with no closing quote.
    #[error("at {span}: Unterminated name constant")]
    UnterminatedName { span: Span },

    /// A name constant containing a character names can't hold.
    #[error("at {span}: Illegal character in name")]
    IllegalNameCharacter { span: Span },

    #[error("at {span}: String constant exceeds maximum of {max} characters")]
    StringTooLong { max: usize, span: Span },

    #[error("at {span}: Identifer length exceeds maximum of {max}")]
    IdentifierTooLong { max: usize, span: Span },

    #[error("at {span}: Number length exceeds maximum of {max}")]
    NumberTooLong { max: usize, span: Span },

    /// Digits that don't form a number.
    #[error("at {span}: invalid number '{text}'")]
    InvalidNumber { text: String, span: Span },
}

impl LexError {
    /// Where the error occurred.
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::UnbalancedComment { span }
            | LexError::UnterminatedBlock { span }
            | LexError::UnterminatedName { span }
            | LexError::IllegalNameCharacter { span }
            | LexError::StringTooLong { span, .. }
            | LexError::IdentifierTooLong { span, .. }
            | LexError::NumberTooLong { span, .. }
            | LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors raised while parsing declarations or compiling code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// A malformed or missing token.
    #[error("at {span}: {message}")]
    Syntax { message: String, span: Span },

    /// An invalid declaration.
    #[error("at {span}: {message}")]
    Declaration { message: String, span: Span },

    /// A broken block structure.
    #[error("at {span}: {message}")]
    Nest { message: String, span: Span },

    /// The class as a whole can't be built.
    #[error("at {span}: {message}")]
    Class { message: String, span: Span },

    /// Two or more operator candidates share the lowest cost.
    #[error("at {span}: Operator '{operator}': Can't resolve overload ({matches} matches of quality {cost})")]
    AmbiguousOverload {
        operator: String,
        matches: usize,
        cost: u32,
        span: Span,
    },

    /// `#error` in source.
    #[error("at {span}: #Error directive encountered")]
    Directive { span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),

    /// A compiler invariant was violated.
    #[error("at {span}: internal error: {message}")]
    Internal { message: String, span: Span },
}

impl CompilationError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        CompilationError::Syntax { message: message.into(), span }
    }

    pub fn declaration(span: Span, message: impl Into<String>) -> Self {
        CompilationError::Declaration { message: message.into(), span }
    }

    pub fn nest(span: Span, message: impl Into<String>) -> Self {
        CompilationError::Nest { message: message.into(), span }
    }

    pub fn class(span: Span, message: impl Into<String>) -> Self {
        CompilationError::Class { message: message.into(), span }
    }

    pub fn internal(span: Span, message: impl Into<String>) -> Self {
        CompilationError::Internal { message: message.into(), span }
    }

    /// Where the error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompilationError::Syntax { span, .. }
            | CompilationError::Declaration { span, .. }
            | CompilationError::Nest { span, .. }
            | CompilationError::Class { span, .. }
            | CompilationError::AmbiguousOverload { span, .. }
            | CompilationError::Directive { span }
            | CompilationError::Internal { span, .. } => *span,
            CompilationError::Lex(err) => err.span(),
        }
    }

    /// Propagation scope of this error.
    pub fn severity(&self) -> Severity {
        match self {
            CompilationError::Syntax { .. } | CompilationError::Lex(_) => Severity::TokenLocal,
            CompilationError::Declaration { .. } | CompilationError::AmbiguousOverload { .. } => {
                Severity::DeclarationLocal
            }
            CompilationError::Nest { .. } => Severity::NestFatal,
            CompilationError::Class { .. }
            | CompilationError::Directive { .. }
            | CompilationError::Internal { .. } => Severity::ClassFatal,
        }
    }

    /// The message without the location prefix.
    pub fn message(&self) -> String {
        let full = self.to_string();
        let prefix = format!("at {}: ", self.span());
        match full.strip_prefix(&prefix) {
            Some(rest) => rest.to_string(),
            None => full,
        }
    }
}
