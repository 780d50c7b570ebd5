//! Per-class compilation state.
//!
//! A [`CompilerContext`] is created for every pass over one class. It owns
//! the lexer over the class source and the nest stack, and borrows
//! everything that outlives the class: the registry, the metadata tables,
//! the options and the diagnostics sink.

use unrealscript_core::{CompilationError, FieldRef, Name, ObjectId, Span, StructId};
use unrealscript_parser::{Lexer, Mark, Token, TokenKind};
use unrealscript_registry::{MetadataRegistry, SymbolRegistry};

use crate::bytecode::ScriptBuffer;
use crate::diagnostics::Diagnostics;
use crate::emit::ScriptWriter;
use crate::ir::Expr;
use crate::nest::{Allow, FixupError, Nest, NestKind, NestStack};
use crate::options::CompilerOptions;

pub type Result<T> = std::result::Result<T, CompilationError>;

/// Which pass a context runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Declarations only; bodies are skipped and their positions recorded.
    Parse,
    /// Bodies are compiled to bytecode.
    Compile,
}

/// Host hook that materializes `Class'Path'` literals the registry doesn't know.
pub trait ObjectLoader {
    fn load(&mut self, registry: &mut SymbolRegistry, class: StructId, path: &str) -> Option<ObjectId>;
}

/// State of one pass over one class.
pub struct CompilerContext<'a> {
    pub registry: &'a mut SymbolRegistry,
    pub metadata: &'a mut MetadataRegistry,
    pub options: &'a CompilerOptions,
    pub diagnostics: &'a mut Diagnostics,
    pub loader: Option<&'a mut dyn ObjectLoader>,
    pub class: StructId,
    pub class_name: String,
    pub lexer: Lexer<'a>,
    pub nests: NestStack,
    pub pass: Pass,
    /// The expression just compiled has a side effect.
    pub got_affector: bool,
    /// Statements compiled so far.
    pub statements: usize,
    /// Source lines covered by this pass.
    pub lines: usize,
}

impl<'a> CompilerContext<'a> {
    pub fn new(
        registry: &'a mut SymbolRegistry,
        metadata: &'a mut MetadataRegistry,
        options: &'a CompilerOptions,
        diagnostics: &'a mut Diagnostics,
        class: StructId,
        source: &'a str,
        pass: Pass,
    ) -> Self {
        let class_name = registry.struct_def(class).name.to_string();
        Self {
            registry,
            metadata,
            options,
            diagnostics,
            loader: None,
            class,
            class_name,
            lexer: Lexer::new(source),
            nests: NestStack::new(),
            pass,
            got_affector: false,
            statements: 0,
            lines: 0,
        }
    }

    pub fn with_loader(mut self, loader: Option<&'a mut dyn ObjectLoader>) -> Self {
        self.loader = loader;
        self
    }

    // ==========================================================================
    // Diagnostics
    // ==========================================================================

    pub fn syntax_error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::syntax(self.lexer.here(), message)
    }

    pub fn decl_error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::declaration(self.lexer.here(), message)
    }

    pub fn nest_error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::nest(self.lexer.here(), message)
    }

    pub fn class_error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::class(self.lexer.here(), message)
    }

    pub fn internal_error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::internal(self.lexer.here(), message)
    }

    /// Report a warning at the current line.
    pub fn warn(&mut self, level: u8, message: impl Into<String>) {
        let line = self.lexer.line();
        self.warn_at(level, line, message);
    }

    pub fn warn_at(&mut self, level: u8, line: u32, message: impl Into<String>) {
        self.diagnostics.warning(&self.class_name, level, line, message);
    }

    /// Fail unless the innermost nest allows `what`.
    pub fn check_allow(&self, thing: &str, what: Allow) -> Result<()> {
        if self.nests.top_allow().contains(what) {
            return Ok(());
        }
        if self.nests.top_kind() == NestKind::None {
            Err(self.decl_error(format!("{thing} is not allowed before the Class definition")))
        } else {
            Err(self.decl_error(format!("{thing} is not allowed here")))
        }
    }

    // ==========================================================================
    // Tokens
    // ==========================================================================

    /// Next raw token; `None` at end of input.
    pub fn next_raw(&mut self, no_consts: bool) -> Result<Option<Token<'a>>> {
        let token = self.lexer.next_token(no_consts)?;
        Ok((!token.is_eof()).then_some(token))
    }

    pub fn peek_raw(&mut self) -> Result<Token<'a>> {
        Ok(self.lexer.peek_token(true)?)
    }

    pub fn peek_symbol(&mut self, symbol: &str) -> Result<bool> {
        Ok(self.peek_raw()?.is_symbol(symbol))
    }

    pub fn peek_identifier(&mut self, word: &str) -> Result<bool> {
        Ok(self.peek_raw()?.is_identifier(word))
    }

    /// Consume `symbol` if it comes next.
    pub fn match_symbol(&mut self, symbol: &str) -> Result<bool> {
        let token = self.lexer.next_token(true)?;
        if token.is_symbol(symbol) {
            return Ok(true);
        }
        self.lexer.rewind(&token);
        Ok(false)
    }

    /// Consume the identifier `word` if it comes next.
    pub fn match_identifier(&mut self, word: &str) -> Result<bool> {
        let token = self.lexer.next_token(true)?;
        if token.is_identifier(word) {
            return Ok(true);
        }
        self.lexer.rewind(&token);
        Ok(false)
    }

    pub fn require_symbol(&mut self, symbol: &str, tag: &str) -> Result<()> {
        if self.match_symbol(symbol)? {
            Ok(())
        } else {
            Err(self.syntax_error(format!("Missing '{symbol}' in {tag}")))
        }
    }

    pub fn require_identifier(&mut self, word: &str, tag: &str) -> Result<()> {
        if self.match_identifier(word)? {
            Ok(())
        } else {
            Err(self.syntax_error(format!("Missing '{word}' in {tag}")))
        }
    }

    /// The next token if it is an identifier.
    pub fn get_identifier(&mut self) -> Result<Option<Token<'a>>> {
        let token = self.lexer.next_token(true)?;
        if token.kind == TokenKind::Identifier {
            return Ok(Some(token));
        }
        self.lexer.rewind(&token);
        Ok(None)
    }

    /// An identifier naming a `thing`, or "Missing %s name".
    pub fn require_name(&mut self, thing: &str) -> Result<Token<'a>> {
        match self.get_identifier()? {
            Some(token) => Ok(token),
            None => Err(self.syntax_error(format!("Missing {thing} name"))),
        }
    }

    /// An integer literal or the name of an integer const.
    pub fn get_const_int(&mut self, tag: &str) -> Result<i32> {
        let token = self.lexer.next_token(false)?;
        match token.kind {
            TokenKind::IntLiteral => return Ok(token.int_value()),
            TokenKind::Identifier => {
                let scope = self.scope();
                if let Some(value) = self.find_const_text(scope, token.lexeme) {
                    let mut lexer = Lexer::new(&value);
                    let inner = lexer.next_token(false)?;
                    if inner.kind == TokenKind::IntLiteral {
                        return Ok(inner.int_value());
                    }
                    return Err(self.syntax_error("Error in constant"));
                }
            }
            _ => {}
        }
        self.lexer.rewind(&token);
        Err(self.syntax_error(format!("{tag}: Missing constant integer")))
    }

    fn find_const_text(&self, scope: StructId, text: &str) -> Option<String> {
        let name = self.registry.find_name(text)?;
        match self.registry.find_field(scope, &name)? {
            FieldRef::Const(id) => Some(self.registry.const_def(id).value.clone()),
            _ => None,
        }
    }

    pub fn intern(&mut self, text: &str) -> Name {
        self.registry.intern(text)
    }

    /// Jump the lexer to a recorded span.
    pub fn seek(&mut self, span: Span) {
        self.lexer.reset(Mark {
            offset: span.offset,
            line: span.line,
            column: span.col,
        });
    }

    // ==========================================================================
    // Nests
    // ==========================================================================

    /// The struct the innermost nest belongs to; the class before any nest opens.
    pub fn scope(&self) -> StructId {
        self.nests.top().map(|nest| nest.node).unwrap_or(self.class)
    }

    /// Instance members are reachable here.
    pub fn is_concrete(&self) -> bool {
        self.nests.top_allow().contains(Allow::INSTANCE)
    }

    pub fn push_nest(&mut self, kind: NestKind, node: StructId, is_static: bool) -> Result<()> {
        if self.nests.push(kind, node, is_static) {
            Ok(())
        } else {
            Err(self.nest_error("Maximum nesting limit exceeded"))
        }
    }

    /// Pop the innermost nest, turning fixup failures into compile errors.
    pub fn pop_nest(&mut self) -> Result<Nest> {
        match self.nests.pop() {
            None => Err(self.nest_error("Unexpected '}' at global scope")),
            Some(Ok(nest)) => Ok(nest),
            Some(Err(err @ FixupError::MissingLabel(_))) => Err(self.nest_error(err.to_string())),
            Some(Err(err @ FixupError::Unresolved(_))) => Err(self.internal_error(err.to_string())),
        }
    }

    pub fn top_nest(&mut self) -> Result<&mut Nest> {
        let span = self.lexer.here();
        self.nests
            .top_mut()
            .ok_or_else(|| CompilationError::internal(span, "no open nest"))
    }

    // ==========================================================================
    // Emission
    // ==========================================================================

    /// The script being written.
    pub fn script(&mut self) -> Result<&mut ScriptBuffer> {
        let span = self.lexer.here();
        self.nests
            .script_mut()
            .ok_or_else(|| CompilationError::internal(span, "no script to write to"))
    }

    pub fn code_len(&self) -> usize {
        self.nests.code_len()
    }

    /// Write one expression tree at the end of the script.
    pub fn emit(&mut self, expr: &Expr) -> Result<()> {
        let script = self.script()?;
        ScriptWriter::new(script).write(expr);
        Ok(())
    }
}
