//! Opening node nests and closing any nest.

use unrealscript_core::{FunctionFlags, StructId};
use unrealscript_registry::layout;

use crate::bytecode::{OpCode, ScriptBuffer};
use crate::context::{CompilerContext, Pass, Result};
use crate::nest::{Allow, FixupKind, NestKind};

impl<'a> CompilerContext<'a> {
    /// Open the nest of a class, state or function whose code is written now.
    ///
    /// The nest gets its own script. A function nest also starts out with
    /// all of its locals marked unreferenced.
    pub(crate) fn open_node(&mut self, kind: NestKind, node: StructId) -> Result<()> {
        let def = self.registry.struct_def(node);
        let is_static = def.function_flags().contains(FunctionFlags::STATIC);
        let unreferenced = if kind == NestKind::Function {
            def.own_properties()
                .filter(|&id| !self.registry.property(id).is_parameter())
                .map(|id| (id, self.registry.property(id).line))
                .collect()
        } else {
            Vec::new()
        };

        self.push_nest(kind, node, is_static)?;
        let width = self.options.offset_width;
        let nest = self.top_nest()?;
        nest.script = Some(ScriptBuffer::new(width));
        nest.unreferenced = unreferenced;
        Ok(())
    }

    /// Finish the innermost nest and pop it.
    ///
    /// `expected` is the kind a keyword-terminated body must be closing;
    /// `None` accepts any (a `}`). An `if` followed by `else` stays open
    /// for the else branch.
    pub(crate) fn close_nest(&mut self, expected: Option<NestKind>, descr: &str) -> Result<()> {
        let kind = self.nests.top_kind();
        if self.pass == Pass::Compile {
            self.check_code_size()?;
        }
        if kind == NestKind::None {
            return Err(self.nest_error(format!("Unexpected {descr} at global scope")));
        }
        if let Some(expected) = expected {
            if expected != kind {
                return Err(self.nest_error(format!("Unexpected end of {descr} in '{}' block", kind.name())));
            }
        }

        match self.pass {
            Pass::Parse => self.record_body(kind)?,
            Pass::Compile => {
                if !self.finish_code(kind)? {
                    return Ok(());
                }
            }
        }

        let nest = self.pop_nest()?;
        if self.pass == Pass::Compile && kind.is_node() {
            if let Some(script) = nest.script {
                self.registry.struct_mut(nest.node).script = script.into_code();
            }
        }
        Ok(())
    }

    fn check_code_size(&self) -> Result<()> {
        let len = self.code_len();
        let max = self.options.max_code_size;
        if len <= max {
            return Ok(());
        }
        let node = self.nests.code_node().map(|nest| nest.node).unwrap_or(self.class);
        let name = self.registry.struct_def(node).name.to_string();
        Err(self.nest_error(format!("Code space for {name} overflowed by {} bytes", len - max)))
    }

    /// Parse pass: remember where the body's code starts.
    fn record_body(&mut self, kind: NestKind) -> Result<()> {
        let here = self.lexer.here();
        let node = self.top_nest()?.node;
        match kind {
            NestKind::Function => self.metadata.entry(self.class).function_mut(node).body = Some(here),
            NestKind::State => {
                self.metadata.entry(self.class).states.insert(node, here);
            }
            NestKind::Class => return Ok(()),
            _ => return Err(self.internal_error(format!("Bad first pass nest type '{}'", kind.name()))),
        }
        layout::link(self.registry, node);
        Ok(())
    }

    /// Compile pass: write the nest's closing code. Returns `false` when
    /// the nest stays open.
    fn finish_code(&mut self, kind: NestKind) -> Result<bool> {
        let top = self.top_index();
        match kind {
            NestKind::State => self.finish_state()?,
            NestKind::Function => self.finish_function()?,
            NestKind::Switch => {
                if self.nests.top_allow().contains(Allow::CASE) {
                    self.update_chain()?;
                    let script = self.script()?;
                    script.write_op(OpCode::Case);
                    script.write_sentinel();
                }
                self.set_target(FixupKind::SwitchEnd)?;
            }
            NestKind::If => {
                if self.match_identifier("else")? {
                    self.compile_else()?;
                    return Ok(false);
                }
                self.update_chain()?;
                self.set_target(FixupKind::IfEnd)?;
            }
            NestKind::For => {
                self.set_target(FixupKind::ForInc)?;
                if let Some(increment) = self.top_nest()?.for_increment.take() {
                    self.emit(&increment)?;
                }
                self.emit_jump(OpCode::Jump, FixupKind::ForStart, top)?;
                self.set_target(FixupKind::ForEnd)?;
            }
            NestKind::ForEach => {
                self.script()?.write_op(OpCode::IteratorNext);
                self.set_target(FixupKind::IteratorEnd)?;
                self.script()?.write_op(OpCode::IteratorPop);
            }
            NestKind::Loop => {
                self.set_target(FixupKind::LoopPostCond)?;
                if self.match_identifier("until")? {
                    let condition = self.compile_condition("'Until'")?;
                    self.emit_jump(OpCode::JumpIfNot, FixupKind::LoopStart, top)?;
                    self.emit(&condition)?;
                } else if self.peek_identifier("while")? && !self.nests.top_allow().contains(Allow::IN_WHILE) {
                    return Err(self.syntax_error("The loop syntax is do...until, not do...while"));
                } else {
                    self.emit_jump(OpCode::Jump, FixupKind::LoopStart, top)?;
                }
                self.set_target(FixupKind::LoopEnd)?;
            }
            NestKind::Class | NestKind::None => {}
        }
        Ok(true)
    }

    /// The `else` or `else if` of the open `if`.
    fn compile_else(&mut self) -> Result<()> {
        let else_if = self.match_identifier("if")?;
        self.check_allow(if else_if { "'Else If'" } else { "'Else'" }, Allow::ELSE_IF)?;

        let top = self.top_index();
        self.emit_jump(OpCode::Jump, FixupKind::IfEnd, top)?;
        self.update_chain()?;

        let tag = if else_if {
            let condition = self.compile_condition("'Else If'")?;
            self.emit_chain(OpCode::JumpIfNot)?;
            self.emit(&condition)?;
            "'ElseIf'"
        } else {
            self.top_nest()?.allow.remove(Allow::ELSE_IF);
            "'Else'"
        };

        if !self.match_symbol("{")? {
            self.compile_statements()?;
            self.close_nest(Some(NestKind::If), tag)?;
        }
        Ok(())
    }

    /// `Stop`, then the label table if the state defined labels.
    fn finish_state(&mut self) -> Result<()> {
        let labels = self.top_nest()?.labels().to_vec();
        let node = self.top_nest()?.node;
        let script = self.script()?;
        script.write_op(OpCode::Stop);
        if labels.is_empty() {
            return Ok(());
        }

        while script.len() & 3 != 3 {
            script.write_op(OpCode::Nothing);
        }
        script.write_op(OpCode::LabelTable);
        let offset = script.len();
        for label in &labels {
            script.write_name(&label.name);
            script.write_u32(label.offset);
        }
        script.write_name(&unrealscript_core::Name::none());
        script.write_u32(u32::MAX);

        if let Some(state) = self.registry.struct_mut(node).as_state_mut() {
            state.label_table_offset = Some(offset as u16);
        }
        Ok(())
    }

    /// The implicit return, then the local and return-value warnings.
    fn finish_function(&mut self) -> Result<()> {
        let node = self.top_nest()?.node;
        let flags = self.registry.struct_def(node).function_flags();
        if flags.contains(FunctionFlags::NATIVE) {
            return Ok(());
        }

        let script = self.script()?;
        script.write_op(OpCode::Return);
        script.write_op(OpCode::Nothing);

        let unreferenced = std::mem::take(&mut self.top_nest()?.unreferenced);
        for (local, line) in unreferenced {
            let name = self.registry.property(local).name.to_string();
            self.warn_at(2, line, format!("'{name}' : unreferenced local variable"));
        }

        let return_found = self.top_nest()?.return_found;
        if flags.contains(FunctionFlags::DEFINED) && self.registry.return_property(node).is_some() && !return_found {
            let name = self.registry.struct_def(node).name.to_string();
            self.warn(1, format!("{name}: Missing return value"));
        }
        Ok(())
    }
}
