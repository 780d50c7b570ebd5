//! Commands: control flow, labels and expression statements.

use unrealscript_core::{PropertyFlags, PropertyKind, PropertyType};
use unrealscript_parser::TokenKind;

use crate::bytecode::OpCode;
use crate::context::{CompilerContext, Result};
use crate::expr::Outcome;
use crate::ir::Expr;
use crate::nest::{Allow, FixupKind, NestKind};
use crate::tokens::ScriptToken;

const BREAK_TARGETS: [NestKind; 4] = [NestKind::Loop, NestKind::For, NestKind::ForEach, NestKind::Switch];
const CONTINUE_TARGETS: [NestKind; 3] = [NestKind::Loop, NestKind::For, NestKind::ForEach];
const LABEL_SCOPES: [NestKind; 3] = [NestKind::State, NestKind::Function, NestKind::ForEach];

impl<'a> CompilerContext<'a> {
    /// Compile a command starting at `token`. Returns whether a `;` must follow.
    pub(crate) fn compile_command(&mut self, token: &ScriptToken<'a>) -> Result<bool> {
        if token.is_symbol(";") {
            return Ok(false);
        }
        if token.is_symbol("}") {
            return match self.nests.top_kind() {
                NestKind::Class => Err(self.nest_error("Unexpected '}' at class scope")),
                NestKind::None => Err(self.nest_error("Unexpected '}' at global scope")),
                _ => self.close_nest(None, "'}'").map(|()| false),
            };
        }

        // Locals come before the first command of a function.
        if self.nests.top_kind() == NestKind::Function {
            self.top_nest()?.allow.remove(Allow::VAR_DECL);
        }
        self.statements += 1;

        if token.is_identifier("switch") {
            self.compile_switch()
        } else if token.is_identifier("case") {
            self.compile_case()
        } else if token.is_identifier("default") && self.nests.top_allow().contains(Allow::CASE) {
            self.compile_default()
        } else if token.is_identifier("return") {
            self.compile_return().map(|()| true)
        } else if token.is_identifier("if") {
            self.compile_if()
        } else if token.is_identifier("while") {
            self.compile_while()
        } else if token.is_identifier("do") {
            self.compile_do()
        } else if token.is_identifier("break") {
            self.compile_break().map(|()| true)
        } else if token.is_identifier("continue") {
            self.compile_continue().map(|()| true)
        } else if token.is_identifier("for") {
            self.compile_for()
        } else if token.is_identifier("foreach") {
            self.compile_foreach()
        } else if token.is_identifier("assert") {
            self.compile_assert(token.raw.span.line).map(|()| true)
        } else if token.is_identifier("goto") {
            self.compile_goto().map(|()| true)
        } else if token.is_identifier("stop") {
            self.check_allow("'Stop'", Allow::STATE_CMD)?;
            self.script()?.write_op(OpCode::Stop);
            Ok(true)
        } else if token.kind() == TokenKind::Identifier
            && !token.is_constant()
            && self.match_symbol(":")?
        {
            self.compile_label(token.lexeme()).map(|()| false)
        } else {
            self.check_allow("Expression", Allow::CMD)?;
            self.unget_token(token);
            let statement = self.compile_affector()?;
            self.emit(&statement)?;
            Ok(true)
        }
    }

    fn push_block(&mut self, kind: NestKind) -> Result<()> {
        let node = self.scope();
        self.push_nest(kind, node, false)
    }

    /// Index of the innermost nest.
    pub(crate) fn top_index(&self) -> usize {
        self.nests.level().saturating_sub(1)
    }

    /// A braced body, or a single statement closed right away.
    fn compile_nested_body(&mut self, kind: NestKind, tag: &str) -> Result<()> {
        if self.match_symbol("{")? {
            return Ok(());
        }
        self.compile_statements()?;
        self.close_nest(Some(kind), tag)
    }

    // ==========================================================================
    // switch
    // ==========================================================================

    fn compile_switch(&mut self) -> Result<bool> {
        self.check_allow("'Switch'", Allow::CMD)?;
        self.push_block(NestKind::Switch)?;

        let subject = match self.compile_expr(&PropertyType::none(), Some("'Switch'"))? {
            Outcome::Value(typed) | Outcome::Mismatch(typed) => typed,
            Outcome::Empty => return Err(self.syntax_error("Bad or missing expression in 'Switch'")),
        };
        if !subject.ty.is_scalar() {
            return Err(self.syntax_error("Can't switch on arrays"));
        }
        let size = self.context_size(&subject.ty, "'Switch'")?;
        let script = self.script()?;
        script.write_op(OpCode::Switch);
        script.write_byte(size);
        self.emit(&subject.expr)?;

        let mut switch_type = subject.ty;
        switch_type.flags.remove(PropertyFlags::OUT_PARM);
        self.top_nest()?.switch_type = Some(switch_type);
        self.require_symbol("{", "'Switch'")?;
        Ok(false)
    }

    fn compile_case(&mut self) -> Result<bool> {
        self.check_allow("'Case'", Allow::CASE)?;
        self.update_chain()?;
        self.emit_chain(OpCode::Case)?;

        let required = self.top_nest()?.switch_type.clone().unwrap_or_else(PropertyType::none);
        let value = self.expect_expr(&required, "'Case'")?;
        self.emit(&value.expr)?;
        self.require_symbol(":", "'Case'")?;
        self.top_nest()?.allow |= Allow::CMD | Allow::LABEL | Allow::BREAK;
        Ok(false)
    }

    fn compile_default(&mut self) -> Result<bool> {
        self.update_chain()?;
        let script = self.script()?;
        script.write_op(OpCode::Case);
        script.write_sentinel();
        self.require_symbol(":", "'Default'")?;

        let nest = self.top_nest()?;
        nest.allow.remove(Allow::CASE | Allow::DEFAULT);
        nest.allow |= Allow::CMD | Allow::LABEL | Allow::BREAK;
        Ok(false)
    }

    // ==========================================================================
    // return
    // ==========================================================================

    fn compile_return(&mut self) -> Result<()> {
        self.check_allow("'Return'", Allow::RETURN)?;

        // Iterators opened inside the function are popped on the way out.
        let mut function = None;
        let mut iterators = 0;
        for index in (1..self.nests.level()).rev() {
            match self.nests.get(index).map(|nest| nest.kind) {
                Some(NestKind::ForEach) => iterators += 1,
                Some(NestKind::Function) => {
                    function = Some(index);
                    break;
                }
                _ => {}
            }
        }
        let Some(function) = function else {
            return Err(self.internal_error("Internal consistency error on 'Return'"));
        };
        for _ in 0..iterators {
            self.script()?.write_op(OpCode::IteratorPop);
        }

        let node = self.nest_at(function)?.node;
        match self.registry.return_property(node) {
            Some(property) => {
                let mut required = self.registry.property(property).ty.clone();
                required.flags.remove(PropertyFlags::OUT_PARM);
                let value = self.expect_expr(&required, "'Return'")?;
                self.script()?.write_op(OpCode::Return);
                self.emit(&value.expr)?;
                self.nest_at(function)?.return_found = true;
            }
            None => {
                let script = self.script()?;
                script.write_op(OpCode::Return);
                script.write_op(OpCode::Nothing);
            }
        }
        Ok(())
    }

    // ==========================================================================
    // if / loops
    // ==========================================================================

    fn compile_if(&mut self) -> Result<bool> {
        self.check_allow("'If'", Allow::CMD)?;
        self.push_block(NestKind::If)?;
        let condition = self.compile_condition("'If'")?;
        self.emit_chain(OpCode::JumpIfNot)?;
        self.emit(&condition)?;
        self.compile_nested_body(NestKind::If, "'If'")?;
        Ok(false)
    }

    fn compile_while(&mut self) -> Result<bool> {
        self.check_allow("'While'", Allow::CMD)?;
        self.push_block(NestKind::Loop)?;
        self.top_nest()?.allow |= Allow::IN_WHILE;
        self.set_target(FixupKind::LoopStart)?;

        let condition = self.compile_condition("'While'")?;
        let top = self.top_index();
        self.emit_jump(OpCode::JumpIfNot, FixupKind::LoopEnd, top)?;
        self.emit(&condition)?;
        self.compile_nested_body(NestKind::Loop, "'While'")?;
        Ok(false)
    }

    fn compile_do(&mut self) -> Result<bool> {
        self.check_allow("'Do'", Allow::CMD)?;
        self.push_block(NestKind::Loop)?;
        self.set_target(FixupKind::LoopStart)?;
        self.compile_nested_body(NestKind::Loop, "'Do'")?;
        Ok(false)
    }

    fn compile_for(&mut self) -> Result<bool> {
        self.check_allow("'For'", Allow::CMD)?;
        self.push_block(NestKind::For)?;
        self.require_symbol("(", "'For'")?;

        let init = self.compile_affector()?;
        self.emit(&init)?;
        self.require_symbol(";", "'For'")?;

        self.set_target(FixupKind::ForStart)?;
        let condition = self.expect_expr(&PropertyType::new(PropertyKind::Bool), "'For'")?;
        let top = self.top_index();
        self.emit_jump(OpCode::JumpIfNot, FixupKind::ForEnd, top)?;
        self.emit(&condition.expr)?;
        self.require_symbol(";", "'For'")?;

        // Written when the loop closes, ahead of the back-edge.
        let increment = self.compile_affector()?;
        self.top_nest()?.for_increment = Some(increment);
        self.require_symbol(")", "'For'")?;

        self.compile_nested_body(NestKind::For, "'For'")?;
        Ok(false)
    }

    fn compile_foreach(&mut self) -> Result<bool> {
        self.check_allow("'ForEach'", Allow::CMD)?;
        self.push_block(NestKind::ForEach)?;

        let iterated = match self.compile_expr(&PropertyType::none(), Some("'ForEach'"))? {
            Outcome::Value(typed) | Outcome::Mismatch(typed) => typed,
            Outcome::Empty => return Err(self.syntax_error("Bad or missing expression in 'ForEach'")),
        };

        if iterated.ty.is_dynamic_array() && self.match_symbol("(")? {
            let mut element = iterated.ty.element();
            element.flags.insert(PropertyFlags::OUT_PARM);
            let item = self.expect_expr(&element, "'ForEach'")?;
            let index = if self.match_symbol(",")? {
                let int = PropertyType::new(PropertyKind::Int).with_flags(PropertyFlags::OUT_PARM);
                Some(self.expect_expr(&int, "'ForEach'")?.expr)
            } else {
                None
            };
            self.require_symbol(")", "'ForEach'")?;
            self.top_nest()?.allow.remove(Allow::ITERATOR);

            let mut array = iterated.expr;
            array.mark_modified();
            let mut item = item.expr;
            item.mark_modified();
            self.script()?.write_op(OpCode::DynArrayIterator);
            self.emit(&array)?;
            self.emit(&item)?;
            self.script()?.write_byte(u8::from(index.is_some()));
            self.emit(index.as_ref().unwrap_or(&Expr::Nothing))?;
        } else {
            if self.nests.top_allow().contains(Allow::ITERATOR) {
                return Err(self.syntax_error("'ForEach': An iterator expression is required"));
            }
            self.script()?.write_op(OpCode::Iterator);
            self.emit(&iterated.expr)?;
        }

        let at = self.script()?.write_placeholder();
        self.top_nest()?.add_fixup(FixupKind::IteratorEnd, at);
        self.compile_nested_body(NestKind::ForEach, "'ForEach'")?;
        Ok(false)
    }

    fn compile_break(&mut self) -> Result<()> {
        self.check_allow("'Break'", Allow::BREAK)?;
        let Some(index) = self.nests.find_any(&BREAK_TARGETS, 1) else {
            return Err(self.internal_error("Internal consistency error on 'Break'"));
        };
        let fixup = match self.nest_at(index)?.kind {
            NestKind::Loop => FixupKind::LoopEnd,
            NestKind::For => FixupKind::ForEnd,
            NestKind::ForEach => FixupKind::IteratorEnd,
            _ => FixupKind::SwitchEnd,
        };
        self.emit_jump(OpCode::Jump, fixup, index)
    }

    fn compile_continue(&mut self) -> Result<()> {
        self.check_allow("'Continue'", Allow::CONTINUE)?;
        let Some(index) = self.nests.find_any(&CONTINUE_TARGETS, 1) else {
            return Err(self.internal_error("Internal consistency error on 'Continue'"));
        };
        match self.nest_at(index)?.kind {
            NestKind::Loop => self.emit_jump(OpCode::Jump, FixupKind::LoopPostCond, index),
            NestKind::For => self.emit_jump(OpCode::Jump, FixupKind::ForInc, index),
            _ => {
                self.script()?.write_op(OpCode::IteratorNext);
                self.emit_jump(OpCode::Jump, FixupKind::IteratorEnd, index)
            }
        }
    }

    // ==========================================================================
    // assert / goto / labels
    // ==========================================================================

    fn compile_assert(&mut self, line: u32) -> Result<()> {
        self.check_allow("'Assert'", Allow::CMD)?;
        let condition = self.compile_condition("'Assert'")?;
        let debug = self.options.debug_info;
        let script = self.script()?;
        script.write_op(OpCode::Assert);
        script.write_u16(line as u16);
        script.write_byte(u8::from(debug));
        self.emit(&condition)
    }

    fn compile_goto(&mut self) -> Result<()> {
        self.check_allow("'Goto'", Allow::LABEL)?;

        if self.nests.top_allow().contains(Allow::STATE_CMD) {
            let label = self.expect_expr(&PropertyType::new(PropertyKind::Name), "'Goto'")?;
            self.script()?.write_op(OpCode::GotoLabel);
            return self.emit(&label.expr);
        }

        let Some(index) = self.nests.find_any(&LABEL_SCOPES, 2) else {
            return Err(self.syntax_error("Goto is not allowed here"));
        };
        let Some(label) = self.get_identifier()? else {
            return Err(self.syntax_error("Goto: Missing label"));
        };
        let label = self.intern(label.lexeme);
        let script = self.script()?;
        script.write_op(OpCode::Jump);
        let at = script.write_placeholder();
        self.nest_at(index)?.add_label_fixup(label, at);
        Ok(())
    }

    fn compile_label(&mut self, word: &str) -> Result<()> {
        self.check_allow("Label", Allow::LABEL)?;

        // The first label of a state starts its code.
        let nest = self.top_nest()?;
        if !nest.allow.contains(Allow::CMD) {
            nest.allow |= Allow::CMD;
            nest.allow.remove(Allow::FUNCTION | Allow::VAR_DECL);
        }

        let Some(index) = self.nests.find_any(&LABEL_SCOPES, 2) else {
            return Err(self.syntax_error("Labels are not allowed here"));
        };
        let name = self.intern(word);
        let offset = self.code_len();
        if !self.nest_at(index)?.add_label(name, offset) {
            return Err(self.decl_error(format!("Duplicate label '{word}'")));
        }
        Ok(())
    }
}
