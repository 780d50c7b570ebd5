//! Main lexer implementation for UnrealScript.
//!
//! The [`Lexer`] turns class source into raw [`Token`]s on demand. The
//! compiler pulls one token at a time and rewinds freely, so the lexer
//! keeps no lookahead buffer: speculative reads go through
//! [`mark`](Lexer::mark)/[`reset`](Lexer::reset) or
//! [`rewind`](Lexer::rewind).
//!
//! Constant forms that need symbol knowledge (`vect(...)`, enum tags,
//! object literals) are recognized one level up, in the compiler's token
//! stream. This layer only classifies characters.

use unrealscript_core::{LexError, NAME_SIZE, Span};

use super::cursor::{Cursor, Mark, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, parse_int};

/// Longest string constant, in characters.
pub const MAX_STRING_CONST_SIZE: usize = 1023;

/// Lexer for UnrealScript source code.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// The full source text.
    pub fn source(&self) -> &'src str {
        self.cursor.source()
    }

    /// Current line number.
    pub fn line(&self) -> u32 {
        self.cursor.line()
    }

    /// Override the line counter without moving.
    pub fn set_line(&mut self, line: u32) {
        self.cursor.set_line(line);
    }

    /// Current byte offset.
    pub fn offset(&self) -> u32 {
        self.cursor.offset()
    }

    /// Zero-length span at the current position.
    pub fn here(&self) -> Span {
        Span::point(self.cursor.offset(), self.cursor.line(), self.cursor.column())
    }

    /// Save the current position.
    pub fn mark(&self) -> Mark {
        self.cursor.mark()
    }

    /// Return to a saved position.
    pub fn reset(&mut self, mark: Mark) {
        self.cursor.reset(mark);
    }

    /// Rewind so that `token` is read again.
    pub fn rewind(&mut self, token: &Token<'src>) {
        self.cursor.reset(token.start());
    }

    /// Source text between two offsets.
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        self.cursor.slice(start, end)
    }

    /// Consume and return the next token.
    ///
    /// With `no_consts` set, a leading sign never starts a number and a
    /// single quote is returned as a symbol.
    pub fn next_token(&mut self, no_consts: bool) -> Result<Token<'src>, LexError> {
        self.skip_whitespace()?;

        let start = self.cursor.mark();
        let Some(c) = self.cursor.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", self.here()));
        };
        let next = self.cursor.peek_nth(1);

        match c {
            c if is_ident_start(c) => self.scan_identifier(start),
            c if c.is_ascii_digit() => self.scan_number(start),
            '+' | '-' if !no_consts && next.is_some_and(|n| n.is_ascii_digit()) => {
                self.scan_number(start)
            }
            '\'' if !no_consts => self.scan_name(start),
            '"' => self.scan_string(start),
            _ => self.scan_symbol(start),
        }
    }

    /// Read the next token and rewind.
    pub fn peek_token(&mut self, no_consts: bool) -> Result<Token<'src>, LexError> {
        let mark = self.mark();
        let token = self.next_token(no_consts);
        self.reset(mark);
        token
    }

    /// Consume only the first `>` of a compound `>>` or `>>>` token.
    ///
    /// Closing nested type parameters like `array<class<Actor>>` relies on
    /// this.
    pub fn split_first_char(&mut self, token: &Token<'src>) {
        self.rewind(token);
        self.cursor.advance();
    }

    /// The rest of the current line, trimmed, stopping at a comment.
    pub fn raw_line(&mut self) -> &'src str {
        while self.cursor.check(|c| c == ' ' || c == '\t') {
            self.cursor.advance();
        }
        let start = self.cursor.offset();
        while let Some(c) = self.cursor.peek() {
            if c == '\r' || c == '\n' || self.cursor.check_str("//") || self.cursor.check_str("/*") {
                break;
            }
            self.cursor.advance();
        }
        self.cursor.slice_from(start).trim_end()
    }

    /// Skip everything up to and including the next line break.
    pub fn skip_line(&mut self) {
        while let Some(c) = self.cursor.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Capture the text of a brace block whose `{` was just consumed.
    ///
    /// Returns the text between the braces and leaves the cursor after the
    /// matching `}`. Braces inside comments and string literals don't count.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn capture_braced(&mut self) -> Result<&'src str, LexError> {
        let open = self.here();
        let start = self.cursor.offset();
        let mut depth = 1u32;
        loop {
            let before = self.cursor.offset();
            let Some(c) = self.cursor.advance() else {
                return Err(LexError::UnterminatedBlock { span: open });
            };
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.cursor.slice(start, before));
                    }
                }
                '"' => {
                    while let Some(s) = self.cursor.advance() {
                        if s == '\\' {
                            self.cursor.advance();
                        } else if s == '"' || s == '\n' {
                            break;
                        }
                    }
                }
                '/' if self.cursor.peek() == Some('/') => self.skip_line(),
                '/' if self.cursor.peek() == Some('*') => {
                    self.cursor.advance();
                    self.skip_block_comment(open)?;
                }
                _ => {}
            }
        }
    }

    // =========================================
    // Internal: Whitespace and comments
    // =========================================

    fn skip_whitespace(&mut self) -> Result<(), LexError> {
        if self.cursor.check_str("\u{FEFF}") {
            self.cursor.advance();
        }

        loop {
            match self.cursor.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.cursor.advance();
                }
                Some('/') if self.cursor.peek_nth(1) == Some('/') => self.skip_line(),
                Some('/') if self.cursor.peek_nth(1) == Some('*') => {
                    let span = self.here();
                    self.cursor.advance();
                    self.cursor.advance();
                    self.skip_block_comment(span)?;
                }
                Some('*') if self.cursor.peek_nth(1) == Some('/') => {
                    return Err(LexError::UnbalancedComment { span: self.here() });
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skip a block comment whose opener was consumed. Comments nest.
    fn skip_block_comment(&mut self, open: Span) -> Result<(), LexError> {
        let mut depth = 1u32;
        while depth > 0 {
            match self.cursor.advance() {
                None => return Err(LexError::UnterminatedComment { span: open }),
                Some('/') if self.cursor.eat('*') => depth += 1,
                Some('*') if self.cursor.eat('/') => depth -= 1,
                Some(_) => {}
            }
        }
        Ok(())
    }

    // =========================================
    // Scanning
    // =========================================

    fn make_token(&self, kind: TokenKind, start: Mark) -> Token<'src> {
        let lexeme = self.cursor.slice_from(start.offset);
        let span = Span::new(start.offset, start.line, start.column, lexeme.len() as u32);
        Token::new(kind, lexeme, span)
    }

    fn span_from(&self, start: Mark) -> Span {
        Span::new(
            start.offset,
            start.line,
            start.column,
            self.cursor.offset() - start.offset,
        )
    }

    fn scan_identifier(&mut self, start: Mark) -> Result<Token<'src>, LexError> {
        let text = self.cursor.eat_while(is_ident_continue);
        if text.len() >= NAME_SIZE {
            return Err(LexError::IdentifierTooLong {
                max: NAME_SIZE - 1,
                span: self.span_from(start),
            });
        }
        Ok(self.make_token(TokenKind::Identifier, start))
    }

    fn scan_number(&mut self, start: Mark) -> Result<Token<'src>, LexError> {
        if matches!(self.cursor.peek(), Some('+' | '-')) {
            self.cursor.advance();
        }

        let mut is_float = false;
        if self.cursor.check_str("0x") || self.cursor.check_str("0X") {
            self.cursor.advance();
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_hexdigit());
        } else {
            self.cursor.eat_while(|c| c.is_ascii_digit());
            let fraction = self.cursor.peek() == Some('.')
                && !self
                    .cursor
                    .peek_nth(1)
                    .is_some_and(|c| is_ident_start(c) && !matches!(c, 'f' | 'F'));
            if fraction {
                self.cursor.advance();
                self.cursor.eat_while(|c| c.is_ascii_digit());
                is_float = true;
            }
            if matches!(self.cursor.peek(), Some('e' | 'E'))
                && self
                    .cursor
                    .peek_nth(1)
                    .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
            {
                self.cursor.advance();
                if matches!(self.cursor.peek(), Some('+' | '-')) {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
                is_float = true;
            }
            if matches!(self.cursor.peek(), Some('f' | 'F')) {
                self.cursor.advance();
                is_float = true;
            }
        }

        let text = self.cursor.slice_from(start.offset);
        if text.len() >= NAME_SIZE {
            return Err(LexError::NumberTooLong {
                max: NAME_SIZE,
                span: self.span_from(start),
            });
        }
        if is_float {
            let valid = text
                .trim_end_matches(['f', 'F'])
                .parse::<f32>()
                .is_ok();
            if !valid {
                return Err(LexError::InvalidNumber {
                    text: text.to_string(),
                    span: self.span_from(start),
                });
            }
            Ok(self.make_token(TokenKind::FloatLiteral, start))
        } else {
            if parse_int(text).is_none() {
                return Err(LexError::InvalidNumber {
                    text: text.to_string(),
                    span: self.span_from(start),
                });
            }
            Ok(self.make_token(TokenKind::IntLiteral, start))
        }
    }

    fn scan_name(&mut self, start: Mark) -> Result<Token<'src>, LexError> {
        self.cursor.advance(); // opening quote
        let text = self
            .cursor
            .eat_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');
        if text.len() >= NAME_SIZE {
            return Err(LexError::IdentifierTooLong {
                max: NAME_SIZE - 1,
                span: self.span_from(start),
            });
        }
        match self.cursor.peek() {
            Some('\'') => {
                self.cursor.advance();
                Ok(self.make_token(TokenKind::NameLiteral, start))
            }
            None => Err(LexError::UnterminatedName { span: self.span_from(start) }),
            Some(_) => Err(LexError::IllegalNameCharacter { span: self.span_from(start) }),
        }
    }

    fn scan_string(&mut self, start: Mark) -> Result<Token<'src>, LexError> {
        self.cursor.advance(); // opening quote
        let mut length = 0usize;
        loop {
            match self.cursor.peek() {
                None | Some('\r') | Some('\n') => {
                    return Err(LexError::UnterminatedString { span: self.span_from(start) });
                }
                Some('"') => {
                    self.cursor.advance();
                    return Ok(self.make_token(TokenKind::StringLiteral, start));
                }
                Some('\\') => {
                    self.cursor.advance();
                    if matches!(self.cursor.peek(), None | Some('\r') | Some('\n')) {
                        return Err(LexError::UnterminatedString { span: self.span_from(start) });
                    }
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
            length += 1;
            if length > MAX_STRING_CONST_SIZE {
                return Err(LexError::StringTooLong {
                    max: MAX_STRING_CONST_SIZE,
                    span: self.span_from(start),
                });
            }
        }
    }

    /// Scan an operator or punctuation token.
    ///
    /// Uses tuple matching on (first_char, peek) to recognize compound symbols.
    fn scan_symbol(&mut self, start: Mark) -> Result<Token<'src>, LexError> {
        let Some(c) = self.cursor.advance() else {
            return Ok(Token::new(TokenKind::Eof, "", self.here()));
        };
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(LexError::UnexpectedChar { ch: c, span: self.span_from(start) });
        }
        let next = self.cursor.peek();

        let compound = matches!(
            (c, next),
            ('<', Some('<'))
                | ('>', Some('>'))
                | ('!', Some('='))
                | ('<', Some('='))
                | ('>', Some('='))
                | ('+', Some('+'))
                | ('-', Some('-'))
                | ('+', Some('='))
                | ('-', Some('='))
                | ('*', Some('='))
                | ('/', Some('='))
                | ('&', Some('&'))
                | ('|', Some('|'))
                | ('^', Some('^'))
                | ('=', Some('='))
                | ('*', Some('*'))
                | ('~', Some('='))
                | ('@', Some('='))
                | ('$', Some('='))
        );
        if compound {
            self.cursor.advance();
            if c == '>' && next == Some('>') {
                self.cursor.eat('>');
            }
        }

        Ok(self.make_token(TokenKind::Symbol, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token(false).expect("lex error");
            if token.is_eof() {
                break;
            }
            tokens.push((token.kind, token.lexeme.to_string()));
        }
        tokens
    }

    fn symbols(source: &str) -> Vec<String> {
        lex_all(source).into_iter().map(|(_, text)| text).collect()
    }

    // =========================================
    // Identifiers and numbers
    // =========================================

    #[test]
    fn identifiers_and_keywords_are_identifiers() {
        let tokens = lex_all("class Foo_1 extends Object;");
        assert_eq!(tokens[0], (TokenKind::Identifier, "class".into()));
        assert_eq!(tokens[1], (TokenKind::Identifier, "Foo_1".into()));
        assert_eq!(tokens[4], (TokenKind::Symbol, ";".into()));
    }

    #[test]
    fn numbers() {
        let tokens = lex_all("42 0x1F 1.5 2.0f 3f 1e3");
        assert_eq!(tokens[0].0, TokenKind::IntLiteral);
        assert_eq!(tokens[1].0, TokenKind::IntLiteral);
        assert_eq!(tokens[2].0, TokenKind::FloatLiteral);
        assert_eq!(tokens[3].0, TokenKind::FloatLiteral);
        assert_eq!(tokens[4].0, TokenKind::FloatLiteral);
        assert_eq!(tokens[5].0, TokenKind::FloatLiteral);
    }

    #[test]
    fn sign_only_starts_number_when_constants_allowed() {
        let mut lexer = Lexer::new("-1");
        let token = lexer.next_token(false).unwrap();
        assert_eq!(token.kind, TokenKind::IntLiteral);
        assert_eq!(token.int_value(), -1);

        let mut lexer = Lexer::new("-1");
        let token = lexer.next_token(true).unwrap();
        assert!(token.is_symbol("-"));
    }

    // =========================================
    // Strings and names
    // =========================================

    #[test]
    fn string_literal() {
        let mut lexer = Lexer::new(r#""say \"hi\"" x"#);
        let token = lexer.next_token(false).unwrap();
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(token.string_value(), "say \"hi\"");
    }

    #[test]
    fn unterminated_string() {
        let mut lexer = Lexer::new("\"abc\nx");
        assert!(matches!(lexer.next_token(false), Err(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn name_literal() {
        let mut lexer = Lexer::new("'Idle State'");
        let token = lexer.next_token(false).unwrap();
        assert_eq!(token.kind, TokenKind::NameLiteral);
        assert_eq!(token.name_value(), "Idle State");
    }

    #[test]
    fn name_literal_rejects_punctuation() {
        let mut lexer = Lexer::new("'a.b'");
        assert!(matches!(lexer.next_token(false), Err(LexError::IllegalNameCharacter { .. })));
    }

    #[test]
    fn quote_is_symbol_without_constants() {
        let mut lexer = Lexer::new("'Pkg'");
        assert!(lexer.next_token(true).unwrap().is_symbol("'"));
    }

    // =========================================
    // Comments
    // =========================================

    #[test]
    fn nested_block_comments() {
        assert_eq!(symbols("a /* one /* two */ still */ b // tail\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn unterminated_comment() {
        let mut lexer = Lexer::new("a /* /* */");
        lexer.next_token(false).unwrap();
        assert!(matches!(lexer.next_token(false), Err(LexError::UnterminatedComment { .. })));
    }

    #[test]
    fn unbalanced_comment() {
        let mut lexer = Lexer::new("x */");
        lexer.next_token(false).unwrap();
        assert!(matches!(lexer.next_token(false), Err(LexError::UnbalancedComment { .. })));
    }

    // =========================================
    // Symbols
    // =========================================

    #[test]
    fn compound_symbols() {
        assert_eq!(
            symbols("a<=b >= == != && || ++ -- += -= *= /= << >> >>> ~= @= $= ** ^^"),
            vec![
                "a", "<=", "b", ">=", "==", "!=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
                "<<", ">>", ">>>", "~=", "@=", "$=", "**", "^^"
            ]
        );
    }

    #[test]
    fn split_closing_angles() {
        let mut lexer = Lexer::new(">>;");
        let token = lexer.next_token(true).unwrap();
        assert!(token.is_symbol(">>"));
        lexer.split_first_char(&token);
        assert!(lexer.next_token(true).unwrap().is_symbol(">"));
        assert!(lexer.next_token(true).unwrap().is_symbol(";"));
    }

    // =========================================
    // Positioning
    // =========================================

    #[test]
    fn rewind_rereads_token() {
        let mut lexer = Lexer::new("foo bar");
        let first = lexer.next_token(false).unwrap();
        lexer.rewind(&first);
        assert_eq!(lexer.next_token(false).unwrap().lexeme, "foo");
        assert_eq!(lexer.peek_token(false).unwrap().lexeme, "bar");
        assert_eq!(lexer.next_token(false).unwrap().lexeme, "bar");
    }

    #[test]
    fn lines_are_tracked() {
        let mut lexer = Lexer::new("a\n\n  b");
        lexer.next_token(false).unwrap();
        let b = lexer.next_token(false).unwrap();
        assert_eq!(b.span.line, 3);
        assert_eq!(b.span.col, 3);
    }

    #[test]
    fn raw_line_stops_at_comment() {
        let mut lexer = Lexer::new("  obj load file=x.u  // note\nnext");
        assert_eq!(lexer.raw_line(), "obj load file=x.u");
        lexer.skip_line();
        assert_eq!(lexer.next_token(false).unwrap().lexeme, "next");
    }

    #[test]
    fn capture_braced_block() {
        let mut lexer = Lexer::new("{ A=1 { B=\"}\" } /* } */ } after");
        assert!(lexer.next_token(false).unwrap().is_symbol("{"));
        let text = lexer.capture_braced().unwrap();
        assert_eq!(text, " A=1 { B=\"}\" } /* } */ ");
        assert_eq!(lexer.next_token(false).unwrap().lexeme, "after");
    }
}
