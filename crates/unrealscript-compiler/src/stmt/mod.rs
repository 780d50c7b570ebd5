//! Statement compiler.
//!
//! [`CompilerContext::compile_statement`] reads one statement and either
//! hands it to the declaration parser or, in the compile pass, to the
//! command compiler. In the parse pass the first command of a body closes
//! the body's nest, records where it started and skips to its end.
//!
//! Control flow is laid out with the nest fixups: a jump is written with a
//! placeholder operand, its fixup is filed on the nest that owns the
//! target, and the placeholder is patched when that nest pops.

mod close;
mod control;

use unrealscript_core::{PropertyFlags, PropertyKind, PropertyType};

use crate::bytecode::OpCode;
use crate::context::{CompilerContext, Pass, Result};
use crate::expr::{Outcome, Typed};
use crate::ir::Expr;
use crate::nest::FixupKind;

impl<'a> CompilerContext<'a> {
    /// Compile one statement. Returns `false` at end of input.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_statement(&mut self) -> Result<bool> {
        let Some(token) = self.get_token(None, true)? else {
            return Ok(false);
        };

        let need_semicolon = match self.compile_declaration(&token)? {
            Some(need_semicolon) => need_semicolon,
            None if self.pass == Pass::Parse => {
                if self.nests.level() < 3 {
                    return Err(self.syntax_error(format!("Unexpected '{}'", token.lexeme())));
                }
                // The body starts here; pass 2 comes back for it.
                self.unget_token(&token);
                let kind = self.nests.top_kind();
                self.close_nest(None, kind.name())?;
                self.skip_statements(1, kind.name())?;
                false
            }
            None => self.compile_command(&token)?,
        };

        if need_semicolon && !self.match_symbol(";")? {
            return Err(match self.get_token(None, true)? {
                Some(next) => self.syntax_error(format!("Missing ';' before '{}'", next.lexeme())),
                None => self.syntax_error("Missing ';'"),
            });
        }
        Ok(true)
    }

    /// Compile statements until the nest that is open now closes.
    ///
    /// Used for single-statement bodies: `if (a) b();` leaves the level
    /// unchanged after one statement, a braced body runs to its `}`.
    pub fn compile_statements(&mut self) -> Result<()> {
        let level = self.nests.level();
        loop {
            if !self.compile_statement()? {
                let kind = self.nests.top_kind();
                return Err(self.nest_error(format!("Unexpected end of script in '{}' block", kind.name())));
            }
            if self.nests.level() <= level {
                return Ok(());
            }
        }
    }

    /// Skip tokens until `depth` more braces have closed.
    pub fn skip_statements(&mut self, mut depth: usize, tag: &str) -> Result<()> {
        while depth > 0 {
            let Some(token) = self.get_token(None, true)? else {
                return Err(self.syntax_error(format!("Unexpected end of file at end of {tag}")));
            };
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth -= 1;
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Expression statements
    // ==========================================================================

    /// An expression statement: an assignment or an expression with a side effect.
    pub(crate) fn compile_affector(&mut self) -> Result<Expr> {
        self.got_affector = false;
        let typed = match self.compile_expr(&PropertyType::none(), None)? {
            Outcome::Empty => None,
            Outcome::Value(typed) | Outcome::Mismatch(typed) => Some(typed),
        };

        if self.match_symbol("=")? {
            let lvalue = match typed {
                Some(lvalue) if lvalue.is_lvalue() => lvalue,
                _ => return Err(self.syntax_error("'=': Left value is not a variable")),
            };
            let mut required = lvalue.ty.clone();
            required.flags.remove(PropertyFlags::OUT_PARM);
            let rvalue = self.expect_expr(&required, "'='")?;
            return self.build_let(lvalue, rvalue.expr);
        }

        match typed {
            Some(typed) if self.got_affector => Ok(discard_result(typed)),
            Some(_) => {
                let next = self.next_lexeme()?;
                Err(self.syntax_error(format!("'{next}': Expression has no effect")))
            }
            None => {
                let next = self.next_lexeme()?;
                Err(self.syntax_error(format!("'{next}': Bad command or expression")))
            }
        }
    }

    /// `lvalue = rvalue`, choosing the assignment flavor by the target type.
    pub(crate) fn build_let(&mut self, mut lvalue: Typed, rvalue: Expr) -> Result<Expr> {
        if lvalue.ty.is_const() {
            return Err(self.syntax_error("Can't assign Const variables"));
        }
        if lvalue.ty.is_static_array() {
            return Err(self.syntax_error("Can only assign individual elements, not arrays"));
        }
        let op = match lvalue.ty.kind {
            PropertyKind::Bool if lvalue.ty.is_scalar() => OpCode::LetBool,
            PropertyKind::Delegate if lvalue.ty.is_scalar() => OpCode::LetDelegate,
            _ => OpCode::Let,
        };
        lvalue.expr.mark_modified();
        Ok(Expr::Let {
            op,
            lvalue: lvalue.expr.boxed(),
            rvalue: rvalue.boxed(),
        })
    }

    fn next_lexeme(&mut self) -> Result<String> {
        Ok(match self.get_token(None, true)? {
            Some(token) => token.lexeme().to_string(),
            None => String::new(),
        })
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Write `op` with a placeholder that `kind` of the nest at `index` resolves.
    pub(crate) fn emit_jump(&mut self, op: OpCode, kind: FixupKind, index: usize) -> Result<()> {
        let script = self.script()?;
        script.write_op(op);
        let at = script.write_placeholder();
        self.nest_at(index)?.add_fixup(kind, at);
        Ok(())
    }

    /// Write `op` with a placeholder that becomes the top nest's chain link.
    pub(crate) fn emit_chain(&mut self, op: OpCode) -> Result<()> {
        let script = self.script()?;
        script.write_op(op);
        let at = script.write_placeholder();
        self.top_nest()?.chain = Some(at);
        Ok(())
    }

    /// Point the pending chain link, if any, at the current end of the script.
    pub(crate) fn update_chain(&mut self) -> Result<()> {
        let here = self.code_len() as u32;
        if let Some(at) = self.top_nest()?.chain.take() {
            self.script()?.patch_offset(at, here);
        }
        Ok(())
    }

    /// Resolve `kind` of the top nest to the current end of the script.
    pub(crate) fn set_target(&mut self, kind: FixupKind) -> Result<()> {
        let here = self.code_len();
        self.top_nest()?.set_target(kind, here);
        Ok(())
    }

    pub(crate) fn nest_at(&mut self, index: usize) -> Result<&mut crate::nest::Nest> {
        let span = self.lexer.here();
        self.nests
            .get_mut(index)
            .ok_or_else(|| unrealscript_core::CompilationError::internal(span, "no such nest"))
    }

    /// A parenthesized bool condition.
    pub(crate) fn compile_condition(&mut self, tag: &str) -> Result<Expr> {
        self.require_symbol("(", tag)?;
        let condition = self.expect_expr(&PropertyType::new(PropertyKind::Bool), tag)?;
        self.require_symbol(")", tag)?;
        Ok(condition.expr)
    }
}

/// Wrap a call whose returned value needs destruction.
fn discard_result(typed: Typed) -> Expr {
    let needs_cleanup = typed.ty.kind == PropertyKind::String || typed.ty.is_dynamic_array();
    match typed.return_property {
        Some(property) if needs_cleanup => Expr::EatReturnValue {
            property,
            expr: typed.expr.boxed(),
        },
        _ => typed.expr,
    }
}
