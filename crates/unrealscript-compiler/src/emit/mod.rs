//! Post-order script writer.
//!
//! [`ScriptWriter`] serializes an [`Expr`] tree into a [`ScriptBuffer`].
//! Skip offsets are written as placeholders, the guarded operand follows,
//! and the placeholder is patched with the operand's byte length.

use crate::bytecode::{OpCode, ScriptBuffer};
use crate::ir::{CallTarget, Constant, ContextKind, Expr};

/// Writes expression trees into a script.
pub struct ScriptWriter<'a> {
    script: &'a mut ScriptBuffer,
}

impl<'a> ScriptWriter<'a> {
    pub fn new(script: &'a mut ScriptBuffer) -> Self {
        Self { script }
    }

    /// Write one expression.
    pub fn write(&mut self, expr: &Expr) {
        match expr {
            Expr::Nothing => self.script.write_op(OpCode::Nothing),
            Expr::Constant(constant) => self.write_constant(constant),
            Expr::SelfObject => self.script.write_op(OpCode::SelfObject),
            Expr::Variable { access, property } => {
                self.script.write_op(access.opcode());
                self.script.write_u32(property.0);
            }
            Expr::BoolVariable(inner) => {
                self.script.write_op(OpCode::BoolVariable);
                self.write(inner);
            }

            Expr::Context {
                kind,
                object,
                size,
                member,
            } => {
                self.script.write_op(match kind {
                    ContextKind::Object => OpCode::Context,
                    ContextKind::Class => OpCode::ClassContext,
                });
                self.write(object);
                let skip = self.script.write_placeholder();
                self.script.write_byte(*size);
                let start = self.script.len();
                self.write(member);
                self.patch_length(skip, start);
            }
            Expr::InterfaceContext(inner) => {
                self.script.write_op(OpCode::InterfaceContext);
                self.write(inner);
            }
            Expr::StructMember {
                member,
                struct_def,
                modified,
                base,
            } => {
                self.script.write_op(OpCode::StructMember);
                self.script.write_u32(member.0);
                self.script.write_u32(struct_def.0);
                self.script.write_byte(u8::from(*modified));
                self.write(base);
            }
            Expr::ArrayElement { index, array } => {
                self.script.write_op(OpCode::ArrayElement);
                self.write(index);
                self.write(array);
            }
            Expr::DynArrayElement { index, array } => {
                self.script.write_op(OpCode::DynArrayElement);
                self.write(index);
                self.write(array);
            }

            Expr::PrimitiveCast { cast, expr } => {
                self.script.write_op(OpCode::PrimitiveCast);
                self.script.write_byte((*cast).into());
                self.write(expr);
            }
            Expr::ClassCast { op, class, expr } => {
                self.script.write_op(*op);
                self.script.write_u32(class.0);
                self.write(expr);
            }

            Expr::Call { target, args } => {
                self.write_call_target(target);
                for arg in args {
                    self.write(arg);
                }
                self.script.write_op(OpCode::EndFunctionParms);
            }
            Expr::DelegateProperty(name) => {
                self.script.write_op(OpCode::DelegateProperty);
                self.script.write_name(name);
            }
            Expr::InstanceDelegate(name) => {
                self.script.write_op(OpCode::InstanceDelegate);
                self.script.write_name(name);
            }
            Expr::EmptyParmValue => self.script.write_op(OpCode::EmptyParmValue),
            Expr::Skip(inner) => {
                self.script.write_op(OpCode::Skip);
                let skip = self.script.write_placeholder();
                let start = self.script.len();
                self.write(inner);
                // The trailing EndFunctionParms is skipped too.
                let length = self.script.len() - start + 1;
                self.script.patch_offset(skip, length as u32);
            }
            Expr::New {
                outer,
                name,
                flags,
                class,
                template,
            } => {
                self.script.write_op(OpCode::New);
                for part in [outer, name, flags, class, template] {
                    self.write(part);
                }
            }

            Expr::StructCompare {
                equal,
                struct_def,
                lhs,
                rhs,
            } => {
                self.script.write_op(if *equal { OpCode::StructCmpEq } else { OpCode::StructCmpNe });
                self.script.write_u32(struct_def.0);
                self.write(lhs);
                self.write(rhs);
            }
            Expr::DelegateCompare { equal, lhs, rhs } => {
                self.script
                    .write_op(if *equal { OpCode::EqualEqualDelDel } else { OpCode::NotEqualDelDel });
                self.write(lhs);
                self.write(rhs);
                self.script.write_op(OpCode::EndFunctionParms);
            }
            Expr::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                self.script.write_op(OpCode::Conditional);
                self.write(condition);
                let skip_true = self.script.write_placeholder();
                let start = self.script.len();
                self.write(when_true);
                let skip_false = self.script.write_placeholder();
                self.patch_length(skip_true, start);
                let start = self.script.len();
                self.write(when_false);
                self.patch_length(skip_false, start);
            }

            Expr::DynArrayLength(array) => {
                self.script.write_op(OpCode::DynArrayLength);
                self.write(array);
            }
            Expr::DynArrayAdd { array, count } => {
                self.script.write_op(OpCode::DynArrayAdd);
                self.write(array);
                self.write(count);
                self.script.write_op(OpCode::EndFunctionParms);
            }
            Expr::DynArrayInsert { array, index, count } => {
                self.script.write_op(OpCode::DynArrayInsert);
                self.write(array);
                self.write(index);
                self.write(count);
                self.script.write_op(OpCode::EndFunctionParms);
            }
            Expr::DynArrayRemove { array, index, count } => {
                self.script.write_op(OpCode::DynArrayRemove);
                self.write(array);
                self.write(index);
                self.write(count);
                self.script.write_op(OpCode::EndFunctionParms);
            }
            Expr::DynArrayItem { op, array, item } => {
                self.script.write_op(op.opcode());
                self.write(array);
                self.write_guarded(&[item]);
            }
            Expr::DynArrayInsertItem { array, index, item } => {
                self.script.write_op(OpCode::DynArrayInsertItem);
                self.write(array);
                self.write_guarded(&[index, item]);
            }
            Expr::DynArrayFindStruct { array, member, value } => {
                self.script.write_op(OpCode::DynArrayFindStruct);
                self.write(array);
                self.write_guarded(&[member, value]);
            }
            Expr::DynArraySort { array, delegate } => {
                self.script.write_op(OpCode::DynArraySort);
                self.write(array);
                self.write_guarded(&[delegate]);
            }

            Expr::Let { op, lvalue, rvalue } => {
                self.script.write_op(*op);
                self.write(lvalue);
                self.write(rvalue);
            }
            Expr::EatReturnValue { property, expr } => {
                self.script.write_op(OpCode::EatReturnValue);
                self.script.write_u32(property.0);
                self.write(expr);
            }
            Expr::DefaultParmValue(inner) => {
                self.script.write_op(OpCode::DefaultParmValue);
                let skip = self.script.write_placeholder();
                let start = self.script.len();
                self.write(inner);
                self.script.write_op(OpCode::EndParmValue);
                self.patch_length(skip, start);
            }
        }
    }

    fn write_constant(&mut self, constant: &Constant) {
        match constant {
            Constant::Int(0) => self.script.write_op(OpCode::IntZero),
            Constant::Int(1) => self.script.write_op(OpCode::IntOne),
            Constant::Int(value @ 0..=255) => {
                self.script.write_op(OpCode::IntConstByte);
                self.script.write_byte(*value as u8);
            }
            Constant::Int(value) => {
                self.script.write_op(OpCode::IntConst);
                self.script.write_i32(*value);
            }
            Constant::Byte(value) => {
                self.script.write_op(OpCode::ByteConst);
                self.script.write_byte(*value);
            }
            Constant::Bool(true) => self.script.write_op(OpCode::True),
            Constant::Bool(false) => self.script.write_op(OpCode::False),
            Constant::Float(value) => {
                self.script.write_op(OpCode::FloatConst);
                self.script.write_f32(*value);
            }
            Constant::String(text) => {
                if text.chars().all(|c| (c as u32) < 256) {
                    self.script.write_op(OpCode::StringConst);
                    for c in text.chars() {
                        self.script.write_byte(c as u32 as u8);
                    }
                    self.script.write_byte(0);
                } else {
                    self.script.write_op(OpCode::UnicodeStringConst);
                    for unit in text.encode_utf16() {
                        self.script.write_u16(unit);
                    }
                    self.script.write_u16(0);
                }
            }
            Constant::Name(name) => {
                self.script.write_op(OpCode::NameConst);
                self.script.write_name(name);
            }
            Constant::Object(None) => self.script.write_op(OpCode::NoObject),
            Constant::Object(Some(object)) => {
                self.script.write_op(OpCode::ObjectConst);
                self.script.write_u32(object.0);
            }
            Constant::Vector(components) => {
                self.script.write_op(OpCode::VectorConst);
                for value in components {
                    self.script.write_f32(*value);
                }
            }
            Constant::Rotator(components) => {
                self.script.write_op(OpCode::RotationConst);
                for value in components {
                    self.script.write_i32(*value);
                }
            }
            Constant::EmptyDelegate => self.script.write_op(OpCode::EmptyDelegate),
        }
    }

    fn write_call_target(&mut self, target: &CallTarget) {
        match target {
            CallTarget::Native(id) if *id < 256 => self.script.write_byte(*id as u8),
            CallTarget::Native(id) => {
                self.script.write_byte(u8::from(OpCode::ExtendedNative) + (*id / 256) as u8);
                self.script.write_byte((*id % 256) as u8);
            }
            CallTarget::Final(function) => {
                self.script.write_op(OpCode::FinalFunction);
                self.script.write_u32(function.0);
            }
            CallTarget::Global(name) => {
                self.script.write_op(OpCode::GlobalFunction);
                self.script.write_name(name);
            }
            CallTarget::Virtual { super_call, name } => {
                self.script.write_op(OpCode::VirtualFunction);
                self.script.write_byte(u8::from(*super_call));
                self.script.write_name(name);
            }
            CallTarget::Delegate { local, property, name } => {
                self.script.write_op(OpCode::DelegateFunction);
                self.script.write_byte(u8::from(*local));
                self.script.write_u32(property.0);
                self.script.write_name(name);
            }
        }
    }

    /// Skip offset over `parts` and the closing `EndFunctionParms`.
    fn write_guarded(&mut self, parts: &[&Expr]) {
        let skip = self.script.write_placeholder();
        let start = self.script.len();
        for part in parts {
            self.write(part);
        }
        self.script.write_op(OpCode::EndFunctionParms);
        self.patch_length(skip, start);
    }

    fn patch_length(&mut self, skip: usize, start: usize) {
        let length = self.script.len() - start;
        self.script.patch_offset(skip, length as u32);
    }
}
