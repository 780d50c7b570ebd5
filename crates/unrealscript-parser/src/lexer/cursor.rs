/// A saved cursor position.
///
/// Produced by [`Cursor::mark`] and consumed by [`Cursor::reset`]; this is the
/// only way to move the cursor backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mark {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

/// A cursor over source text that tracks position.
///
/// Provides low-level character access with peek/advance semantics.
/// Tracks byte offset, line number, and column number as it advances.
pub struct Cursor<'src> {
    /// The source text being scanned.
    source: &'src str,
    /// Current byte offset from start of source.
    offset: u32,
    /// Current line number (1-indexed).
    line: u32,
    /// Current column number (1-indexed, byte-based).
    column: u32,
}

impl<'src> Cursor<'src> {
    /// Create a new cursor at the start of the source.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Get the full source text.
    #[inline]
    pub fn source(&self) -> &'src str {
        self.source
    }

    #[inline]
    fn rest(&self) -> &'src str {
        &self.source[self.offset as usize..]
    }

    /// Current byte offset from start of source.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Current line number (1-indexed).
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current column number (1-indexed, byte-based).
    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Override the line counter (`#linenumber`).
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// Save the current position.
    #[inline]
    pub fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Return to a saved position.
    #[inline]
    pub fn reset(&mut self, mark: Mark) {
        debug_assert!(self.source.is_char_boundary(mark.offset as usize));
        self.offset = mark.offset;
        self.line = mark.line;
        self.column = mark.column;
    }

    /// Peek at the current character without consuming it.
    ///
    /// ASCII fast path avoids creating a char iterator.
    #[inline]
    pub fn peek(&self) -> Option<char> {
        let bytes = self.rest().as_bytes();
        let first = *bytes.first()?;
        if first < 128 {
            Some(first as char)
        } else {
            self.rest().chars().next()
        }
    }

    /// Peek at the nth character ahead (0 = current).
    #[inline]
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// Check if the current character satisfies a predicate.
    #[inline]
    pub fn check(&self, f: impl Fn(char) -> bool) -> bool {
        self.peek().is_some_and(f)
    }

    /// Check if the upcoming bytes match the given string.
    #[inline]
    pub fn check_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Consume the current character and advance.
    ///
    /// Returns the consumed character, or `None` if at EOF.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8() as u32;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += ch.len_utf8() as u32;
        }
        Some(ch)
    }

    /// Consume if the current character matches.
    #[inline]
    pub fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume characters while the predicate matches.
    ///
    /// Returns the consumed slice.
    pub fn eat_while(&mut self, f: impl Fn(char) -> bool) -> &'src str {
        let start = self.offset as usize;
        while self.check(&f) {
            self.advance();
        }
        &self.source[start..self.offset as usize]
    }

    /// Get the slice from a starting offset to the current position.
    #[inline]
    pub fn slice_from(&self, start: u32) -> &'src str {
        &self.source[start as usize..self.offset as usize]
    }

    /// Get the slice between two offsets.
    #[inline]
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}

/// First character of an identifier.
#[inline]
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Subsequent identifier character.
#[inline]
pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines() {
        let mut cursor = Cursor::new("ab\ncd");
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!(cursor.advance(), Some('b'));
        assert_eq!(cursor.column(), 3);
        assert_eq!(cursor.advance(), Some('\n'));
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn mark_and_reset() {
        let mut cursor = Cursor::new("hello\nworld");
        cursor.eat_while(is_ident_continue);
        let mark = cursor.mark();
        cursor.advance();
        cursor.eat_while(is_ident_continue);
        assert_eq!(cursor.peek(), None);
        cursor.reset(mark);
        assert_eq!(cursor.offset(), 5);
        assert_eq!(cursor.line(), 1);
        assert_eq!(cursor.peek(), Some('\n'));
    }

    #[test]
    fn eat_while_returns_slice() {
        let mut cursor = Cursor::new("Foo_1 bar");
        assert_eq!(cursor.eat_while(is_ident_continue), "Foo_1");
        assert!(cursor.eat(' '));
        assert_eq!(cursor.slice_from(6), "");
        assert_eq!(cursor.peek_nth(2), Some('r'));
    }

    #[test]
    fn multibyte_characters() {
        let mut cursor = Cursor::new("é!");
        assert_eq!(cursor.advance(), Some('é'));
        assert_eq!(cursor.offset(), 2);
        assert_eq!(cursor.peek(), Some('!'));
    }
}
