//! Parse Pass (Pass 1) - declarations and body positions.
//!
//! Reads the class source statement by statement. Declarations build the
//! class's fields in the registry; the first command of every function or
//! state body closes its nest, records where the code starts and skips to
//! the closing brace. Pass 2 comes back to those positions.
//!
//! Token-local and declaration-local errors don't stop the pass. The error
//! is kept, the nests opened by the failed statement are dropped and the
//! lexer skips to the end of the declaration. Anything worse ends the pass.
//! A class with any error is not marked parsed.

use unrealscript_core::{ClassFlags, CompilationError};

use crate::context::{CompilerContext, Result};
use crate::nest::NestKind;

use super::PassOutput;

/// Pass 1 over one class.
pub struct ParsePass<'a, 'c> {
    ctx: &'a mut CompilerContext<'c>,
    errors: Vec<CompilationError>,
}

impl<'a, 'c> ParsePass<'a, 'c> {
    pub fn new(ctx: &'a mut CompilerContext<'c>) -> Self {
        Self { ctx, errors: Vec::new() }
    }

    /// Run the pass. The class is flagged parsed only if no error was found.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        if let Err(err) = self.parse() {
            self.errors.push(err);
        }
        if self.errors.is_empty() {
            let class = self.ctx.class;
            self.ctx.set_class_flags(class, ClassFlags::PARSED);
        }
        PassOutput {
            errors: self.errors,
            lines: self.ctx.lines,
            statements: self.ctx.statements,
        }
    }

    fn parse(&mut self) -> Result<()> {
        self.ctx.check_parents(ClassFlags::PARSED)?;
        let class = self.ctx.class;
        self.ctx.push_nest(NestKind::None, class, false)?;

        loop {
            let level = self.ctx.nests.level();
            let first = self.ctx.peek_raw().ok().map(|token| token.span.offset);
            match self.ctx.compile_statement() {
                Ok(true) => self.ctx.statements += 1,
                Ok(false) => break,
                Err(err) if err.severity().is_recoverable_in_parse() => {
                    log::debug!("{}: recovering from '{}'", self.ctx.class_name, err.message());
                    self.errors.push(err);
                    self.ctx.nests.truncate(level);
                    self.resync(first)?;
                }
                Err(err) => return Err(err),
            }
        }
        self.ctx.lines = self.ctx.lexer.line() as usize;

        self.ctx.finish_nesting()?;
        if !self.errors.is_empty() {
            return Ok(());
        }
        self.ctx.post_parse()
    }

    /// Skip to a `;` at the depth the failed statement started at, or past
    /// the `}` that closes a block it opened.
    ///
    /// A `}` closing an enclosing block is left for the next statement,
    /// unless the failed statement started on it.
    fn resync(&mut self, first: Option<u32>) -> Result<()> {
        let mut depth = 0usize;
        while let Some(token) = self.ctx.next_raw(true)? {
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                if depth == 0 {
                    if first != Some(token.span.offset) {
                        self.ctx.lexer.rewind(&token);
                    }
                    return Ok(());
                }
                depth -= 1;
                if depth == 0 {
                    self.ctx.match_symbol(";")?;
                    return Ok(());
                }
            } else if token.is_symbol(";") && depth == 0 {
                return Ok(());
            }
        }
        Ok(())
    }
}
