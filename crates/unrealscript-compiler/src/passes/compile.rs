//! Compile Pass (Pass 2) - bytecode.
//!
//! Walks the class's node tree depth first: the class, then each of its
//! functions and states, then the functions inside those states. Every
//! node gets a fresh script. The class script holds the replication
//! conditions; a native function's script lists its parameters; a
//! defined function or a state compiles the body pass 1 recorded.
//!
//! Pass 2 assumes pass-1-clean input, so its first error ends the pass.

use unrealscript_core::{ClassFlags, FunctionFlags, PropertyFlags, PropertyKind, StructId};

use crate::bytecode::OpCode;
use crate::context::{CompilerContext, Result};
use crate::expr::Typed;
use crate::ir::{Expr, VariableAccess};
use crate::nest::NestKind;

use super::post_parse::has_script_body;
use super::PassOutput;

/// Pass 2 over one class.
pub struct CompilePass<'a, 'c> {
    ctx: &'a mut CompilerContext<'c>,
}

impl<'a, 'c> CompilePass<'a, 'c> {
    pub fn new(ctx: &'a mut CompilerContext<'c>) -> Self {
        Self { ctx }
    }

    /// Run the pass. On success the class is flagged compiled and queued
    /// for its defaults.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(self) -> PassOutput {
        let errors = match self.ctx.compile_class() {
            Ok(()) => {
                let class = self.ctx.class;
                self.ctx
                    .set_class_flags(class, ClassFlags::COMPILED | ClassFlags::NEEDS_DEF_PROPS);
                Vec::new()
            }
            Err(err) => vec![err],
        };
        PassOutput {
            errors,
            lines: self.ctx.lines,
            statements: self.ctx.statements,
        }
    }
}

impl<'a> CompilerContext<'a> {
    fn compile_class(&mut self) -> Result<()> {
        self.check_parents(ClassFlags::COMPILED)?;
        let class = self.class;
        self.reset_replication(class);
        self.push_nest(NestKind::None, class, false)?;
        self.compile_node(NestKind::Class, class)?;
        self.finish_nesting()
    }

    /// Open `node`, compile its children, then its own code.
    fn compile_node(&mut self, kind: NestKind, node: StructId) -> Result<()> {
        self.open_node(kind, node)?;
        let level = self.nests.level();

        let super_flags = self
            .registry
            .struct_def(node)
            .super_struct
            .filter(|_| kind == NestKind::Function)
            .map(|parent| self.registry.struct_def(parent).function_flags() & FunctionFlags::NET_FUNC_FLAGS);
        if let Some(inherited) = super_flags {
            if let Some(function) = self.registry.struct_mut(node).as_function_mut() {
                function.flags |= inherited;
            }
        }

        if kind == NestKind::Class {
            let replication = self.metadata.get(node).and_then(|meta| meta.replication);
            if let Some(start) = replication {
                self.compile_replication(start)?;
            }
        }

        let children: Vec<(NestKind, StructId)> = self
            .registry
            .struct_def(node)
            .own_structs()
            .filter_map(|child| {
                let def = self.registry.struct_def(child);
                if def.is_function() {
                    Some((NestKind::Function, child))
                } else if def.is_state() {
                    Some((NestKind::State, child))
                } else {
                    None
                }
            })
            .collect();
        for (child_kind, child) in children {
            self.compile_node(child_kind, child)?;
        }

        let flags = self.registry.struct_def(node).function_flags();
        match kind {
            NestKind::Class => Ok(()),
            NestKind::Function if flags.contains(FunctionFlags::NATIVE) => {
                self.write_native_body(node)?;
                self.close_nest(Some(kind), "'Function'")
            }
            NestKind::Function if !has_script_body(flags) => self.close_nest(Some(kind), "'Function'"),
            _ => self.compile_body(kind, node, level),
        }
    }

    /// `NativeParm` per parameter, then `Nothing`.
    fn write_native_body(&mut self, function: StructId) -> Result<()> {
        let parameters = self.registry.parameters(function);
        let script = self.script()?;
        for parameter in parameters {
            script.write_op(OpCode::NativeParm);
            script.write_u32(parameter.0);
        }
        script.write_op(OpCode::Nothing);
        Ok(())
    }

    /// Compile the recorded body of a function or state until its nest closes.
    fn compile_body(&mut self, kind: NestKind, node: StructId, level: usize) -> Result<()> {
        let body = self.metadata.get(self.class).and_then(|meta| meta.body_of(node));
        let Some(body) = body else {
            let name = self.registry.struct_def(node).name.to_string();
            return Err(self.internal_error(format!("No code recorded for {name}")));
        };
        self.seek(body);
        let first_line = self.lexer.line();
        if kind == NestKind::Function {
            self.write_default_parameters(node)?;
        }

        while self.nests.level() >= level {
            if !self.compile_statement()? {
                return Err(self.nest_error(format!("Unexpected end of code in {}", kind.name())));
            }
        }
        self.lines += self.lexer.line().saturating_sub(first_line) as usize + 1;
        Ok(())
    }

    /// The preamble that fills in omitted optional arguments: per optional
    /// parameter, its default assignment or `Nothing` when it has none.
    fn write_default_parameters(&mut self, function: StructId) -> Result<()> {
        let flags = self.registry.struct_def(function).function_flags();
        if !flags.contains(FunctionFlags::HAS_OPTIONAL_PARMS) {
            return Ok(());
        }
        let defaults = self
            .metadata
            .get(self.class)
            .and_then(|meta| meta.function(function))
            .map(|meta| meta.defaults.clone())
            .unwrap_or_default();

        for parameter in self.registry.parameters(function) {
            let declared = self.registry.property(parameter).ty.clone();
            if !declared.flags.contains(PropertyFlags::OPTIONAL_PARM) {
                continue;
            }
            let Some(default) = defaults.iter().find(|default| default.parameter == parameter) else {
                self.script()?.write_op(OpCode::Nothing);
                continue;
            };

            let resume = self.lexer.mark();
            self.seek(default.span);
            let mut required = declared.clone();
            required.flags.remove(PropertyFlags::PARM_FLAGS);
            let value = self.expect_expr(&required, "default parameter")?;
            self.lexer.reset(resume);

            let access = if declared.is_out() {
                VariableAccess::LocalOut
            } else {
                VariableAccess::Local
            };
            let mut expr = Expr::Variable { access, property: parameter };
            if declared.kind == PropertyKind::Bool {
                expr = Expr::BoolVariable(expr.boxed());
            }
            let mut target = Typed::new(expr, required);
            target.property = Some(parameter);
            let assign = self.build_let(target, value.expr)?;
            self.emit(&Expr::DefaultParmValue(assign.boxed()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::PassFixture;
    use super::*;

    fn op(code: OpCode) -> u8 {
        code.into()
    }

    fn script(fixture: &PassFixture, node: StructId) -> Vec<u8> {
        fixture.registry.struct_def(node).script.clone()
    }

    // ==========================================================================
    // Nodes
    // ==========================================================================

    #[test]
    fn class_is_flagged_compiled() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; var int X; function F() { X = 1; }");
        let flags = fixture.flags(class);
        assert!(flags.contains(ClassFlags::PARSED | ClassFlags::COMPILED | ClassFlags::NEEDS_DEF_PROPS));
    }

    #[test]
    fn defined_function_gets_its_body() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; var int X; function F() { local int L; L = 2; X = L; }");
        let f = fixture.struct_field(class, "F");
        let code = script(&fixture, f);
        assert_eq!(code[0], op(OpCode::Let));
        assert_eq!(code[1], op(OpCode::LocalVariable));
        assert_eq!(&code[code.len() - 2..], &[op(OpCode::Return), op(OpCode::Nothing)]);
    }

    #[test]
    fn declared_function_returns_at_once() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; function F();");
        let f = fixture.struct_field(class, "F");
        assert_eq!(script(&fixture, f), vec![op(OpCode::Return), op(OpCode::Nothing)]);
    }

    #[test]
    fn native_function_lists_its_parameters() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test native; native function int F(int A, float B);");
        let f = fixture.struct_field(class, "F");
        let parameters = fixture.registry.parameters(f);
        let mut expected = Vec::new();
        for parameter in parameters {
            expected.push(op(OpCode::NativeParm));
            expected.extend_from_slice(&parameter.0.to_le_bytes());
        }
        expected.push(op(OpCode::Nothing));
        assert_eq!(script(&fixture, f), expected);
    }

    #[test]
    fn state_code_is_followed_by_its_label_table() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; var int X; state Idle { function F() { X = 1; } Begin: X = 2; }");
        let idle = fixture.struct_field(class, "Idle");
        let f = fixture.struct_field(idle, "F");
        assert_eq!(script(&fixture, f)[0], op(OpCode::Let));

        let code = script(&fixture, idle);
        assert_eq!(code[0], op(OpCode::Let));
        let offset = fixture.registry.struct_def(idle).as_state().unwrap().label_table_offset;
        let offset = offset.unwrap() as usize;
        assert_eq!(code[offset - 1], op(OpCode::LabelTable));
        assert!(code[..offset - 1].contains(&op(OpCode::Stop)));
    }

    #[test]
    fn empty_state_is_just_stop() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; state Idle { }");
        let idle = fixture.struct_field(class, "Idle");
        assert_eq!(script(&fixture, idle), vec![op(OpCode::Stop)]);
    }

    #[test]
    fn net_flags_come_from_the_overridden_function() {
        let mut fixture = PassFixture::new();
        let base = fixture.class("Base", None, "class Base; reliable server function Fire();");
        assert!(fixture.parse(base).is_success());
        assert!(fixture.compile(base).is_success());
        let test = fixture.class("Test", Some("Base"), "class Test extends Base; function Fire();");
        assert!(fixture.parse(test).is_success());
        assert!(fixture.compile(test).is_success());
        let fire = fixture.struct_field(test, "Fire");
        let flags = fixture.registry.struct_def(fire).function_flags();
        assert!(flags.contains(FunctionFlags::NET | FunctionFlags::NET_RELIABLE | FunctionFlags::NET_SERVER));
    }

    #[test]
    fn recompiling_is_idempotent() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; var int X; function F() { X = 1; }");
        let f = fixture.struct_field(class, "F");
        let first = script(&fixture, f);
        assert!(fixture.compile(class).is_success());
        assert_eq!(script(&fixture, f), first);
    }

    #[test]
    fn uncompiled_parent_blocks_child() {
        let mut fixture = PassFixture::new();
        let base = fixture.class("Base", None, "class Base;");
        assert!(fixture.parse(base).is_success());
        let test = fixture.class("Test", Some("Base"), "class Test extends Base;");
        assert!(fixture.parse(test).is_success());
        let output = fixture.compile(test);
        assert_eq!(
            output.errors[0].message(),
            "'Test' can't be compiled: Parent class 'Base' has errors"
        );
    }

    #[test]
    fn body_errors_end_the_pass() {
        let mut fixture = PassFixture::new();
        let class = fixture.class("Test", None, "class Test; function F() { Missing(); }");
        assert!(fixture.parse(class).is_success());
        let output = fixture.compile(class);
        assert_eq!(output.errors.len(), 1);
        assert!(!fixture.flags(class).contains(ClassFlags::COMPILED));
    }

    // ==========================================================================
    // Default parameters
    // ==========================================================================

    #[test]
    fn optional_parameters_get_a_preamble() {
        let mut fixture = PassFixture::new();
        let class = fixture.build("class Test; function F(int A, optional int B = 7, optional int C) { A = B; }");
        let f = fixture.struct_field(class, "F");
        let code = script(&fixture, f);
        assert_eq!(code[0], op(OpCode::DefaultParmValue));
        // Opcode, skip, Let, LocalVariable + index, IntConstByte 7, EndParmValue.
        assert_eq!(code[3], op(OpCode::Let));
        assert_eq!(code[4], op(OpCode::LocalVariable));
        assert_eq!(&code[9..11], &[op(OpCode::IntConstByte), 7]);
        assert_eq!(code[11], op(OpCode::EndParmValue));
        assert_eq!(code[12], op(OpCode::Nothing));
        assert_eq!(code[13], op(OpCode::Let));
    }

    #[test]
    fn bad_default_is_reported_in_pass_two() {
        let mut fixture = PassFixture::new();
        let class = fixture.class("Test", None, "class Test; function F(optional int B = Missing) { }");
        assert!(fixture.parse(class).is_success());
        assert!(!fixture.compile(class).is_success());
    }
}
