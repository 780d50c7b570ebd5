//! UnrealScript lexer crate.
//!
//! This crate provides the raw tokenizer for UnrealScript class source:
//! - Whitespace, `//` and nested `/* */` comment skipping
//! - Identifiers, numbers, string and name constants, compound symbols
//! - Save/restore marks for speculative lookahead
//! - Raw line and braced-block capture for directives, `cpptext` and
//!   `defaultproperties`
//!
//! # Example
//!
//! ```
//! use unrealscript_parser::{Lexer, TokenKind};
//!
//! let mut lexer = Lexer::new("var int Health; // hit points");
//! let mut kinds = Vec::new();
//! loop {
//!     let token = lexer.next_token(false).expect("valid source");
//!     if token.is_eof() {
//!         break;
//!     }
//!     kinds.push(token.kind);
//! }
//! assert_eq!(kinds.len(), 4);
//! assert_eq!(kinds[3], TokenKind::Symbol);
//! ```

pub mod lexer;

pub use lexer::{Lexer, Mark, Token, TokenKind};
pub use unrealscript_core::{LexError, Span};
