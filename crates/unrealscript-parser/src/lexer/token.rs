//! Raw tokens produced by the lexer.
//!
//! A [`Token`] records what was scanned and where. Literal values are decoded
//! on demand from the lexeme; the lexer has already validated them, so the
//! accessors are infallible.

use unrealscript_core::Span;

use super::cursor::Mark;

/// The lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*`
    Identifier,
    /// Single character or compound operator.
    Symbol,
    /// Decimal or `0x` hex integer, optionally signed.
    IntLiteral,
    /// Number with a `.`, exponent or trailing `f`.
    FloatLiteral,
    /// `"..."`
    StringLiteral,
    /// `'Name'`
    NameLiteral,
    /// End of input.
    Eof,
}

/// A lexical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// Raw source text, including quotes for string and name literals.
    pub lexeme: &'src str,
    pub span: Span,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, lexeme: &'src str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    /// Position to rewind to in order to re-read this token.
    pub fn start(&self) -> Mark {
        Mark {
            offset: self.span.offset,
            line: self.span.line,
            column: self.span.col,
        }
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Whether this is the given symbol.
    #[inline]
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.lexeme == symbol
    }

    /// Whether this is the given identifier, ignoring case.
    #[inline]
    pub fn is_identifier(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme.eq_ignore_ascii_case(word)
    }

    /// Value of an integer literal, wrapping to 32 bits.
    pub fn int_value(&self) -> i32 {
        parse_int(self.lexeme).unwrap_or(0) as i32
    }

    /// Value of a float literal (or an integer literal read as float).
    pub fn float_value(&self) -> f32 {
        match self.kind {
            TokenKind::IntLiteral => self.int_value() as f32,
            _ => self
                .lexeme
                .trim_end_matches(['f', 'F'])
                .parse::<f32>()
                .unwrap_or(0.0),
        }
    }

    /// Unescaped contents of a string literal.
    pub fn string_value(&self) -> String {
        let inner = self
            .lexeme
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(self.lexeme);
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(other) => out.push(other),
                    None => {}
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Contents of a name literal.
    pub fn name_value(&self) -> &'src str {
        self.lexeme
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(self.lexeme)
    }
}

/// Parse decimal or `0x` hex integer text with an optional sign.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { magnitude.wrapping_neg() } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, lexeme: &str) -> Token<'_> {
        Token::new(kind, lexeme, Span::default())
    }

    #[test]
    fn int_values() {
        assert_eq!(token(TokenKind::IntLiteral, "42").int_value(), 42);
        assert_eq!(token(TokenKind::IntLiteral, "-7").int_value(), -7);
        assert_eq!(token(TokenKind::IntLiteral, "0xFF").int_value(), 255);
        assert_eq!(token(TokenKind::IntLiteral, "0xFFFFFFFF").int_value(), -1);
    }

    #[test]
    fn float_values() {
        assert_eq!(token(TokenKind::FloatLiteral, "1.5").float_value(), 1.5);
        assert_eq!(token(TokenKind::FloatLiteral, "2.0f").float_value(), 2.0);
        assert_eq!(token(TokenKind::IntLiteral, "3").float_value(), 3.0);
    }

    #[test]
    fn string_unescape() {
        let t = token(TokenKind::StringLiteral, r#""a\"b\\c\nd""#);
        assert_eq!(t.string_value(), "a\"b\\c\nd");
    }

    #[test]
    fn name_value_strips_quotes() {
        assert_eq!(token(TokenKind::NameLiteral, "'Idle'").name_value(), "Idle");
    }

    #[test]
    fn identifier_match_ignores_case() {
        let t = token(TokenKind::Identifier, "Function");
        assert!(t.is_identifier("function"));
        assert!(!t.is_symbol("function"));
    }
}
