//! Lexical analysis for UnrealScript.

mod cursor;
mod lexer;
mod token;

pub use cursor::{Mark, is_ident_continue, is_ident_start};
pub use lexer::{Lexer, MAX_STRING_CONST_SIZE};
pub use token::{Token, TokenKind};
