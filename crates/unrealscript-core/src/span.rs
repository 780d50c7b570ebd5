//! Source location tracking for error reporting.
//!
//! Provides [`Span`] to track where tokens and errors occur in class source.

use std::fmt;

/// A span of source code, represented by its starting position.
///
/// The byte offset lets the compiler rewind the lexer to the start of a
/// token; line and column are what diagnostics print.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first character.
    pub offset: u32,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub fn new(offset: u32, line: u32, col: u32, len: u32) -> Self {
        Self { offset, line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(offset: u32, line: u32, col: u32) -> Self {
        Self { offset, line, col, len: 0 }
    }

    /// A span that only knows its line, used for diagnostics raised outside the lexer.
    #[inline]
    pub fn at_line(line: u32) -> Self {
        Self { offset: 0, line, col: 1, len: 0 }
    }

    /// Whether this span is empty (zero length).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The length of this span in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Byte offset one past the end of the span.
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.len
    }

    /// Merge two spans into one that starts at `self` and covers `other`.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        let end = self.end().max(other.end());
        Span {
            offset: self.offset,
            line: self.line,
            col: self.col,
            len: end.saturating_sub(self.offset),
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
