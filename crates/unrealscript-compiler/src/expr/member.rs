//! Postfix context operators: `.member`, `[index]` and dynamic array methods.

use unrealscript_core::{FieldRef, PropertyFlags, PropertyKind, PropertyType, StructId};
use unrealscript_parser::TokenKind;

use super::{FieldScope, Typed};
use crate::context::{CompilerContext, Result};
use crate::ir::{Constant, ContextKind, Expr, ItemOp};

impl<'a> CompilerContext<'a> {
    /// Apply member selections and subscripts until none follow.
    pub(crate) fn compile_postfix(&mut self, mut typed: Typed, required: &PropertyType) -> Result<Typed> {
        loop {
            if typed.ty.is_dynamic_array() && self.match_symbol(".")? {
                let (next, done) = self.compile_array_method(typed)?;
                typed = next;
                if done {
                    return Ok(typed);
                }
            } else if typed.ty.is_static_array() || typed.ty.is_dynamic_array() {
                if !self.match_symbol("[")? {
                    return Ok(typed);
                }
                typed = self.compile_subscript(typed)?;
            } else if typed.ty.kind == PropertyKind::Struct && typed.ty.is_scalar() && self.match_symbol(".")? {
                typed = self.compile_struct_member(typed)?;
            } else if typed.ty.is_object() && typed.ty.is_scalar() && self.match_symbol(".")? {
                typed = self.compile_object_context(typed, required)?;
            } else {
                return Ok(typed);
            }
        }
    }

    fn compile_subscript(&mut self, mut typed: Typed) -> Result<Typed> {
        let dynamic = typed.ty.is_dynamic_array();
        let index = self.expect_expr(&PropertyType::new(PropertyKind::Int), "array index")?;
        if !self.match_symbol("]")? {
            let name = typed
                .property
                .map(|id| self.registry.property(id).name.to_string())
                .unwrap_or_else(|| "Expression".to_string());
            return Err(self.syntax_error(format!("{name} is an array; expecting ']'")));
        }
        let array = typed.expr.boxed();
        typed.expr = if dynamic {
            Expr::DynArrayElement {
                index: index.expr.boxed(),
                array,
            }
        } else {
            Expr::ArrayElement {
                index: index.expr.boxed(),
                array,
            }
        };
        typed.ty = typed.ty.element();
        Ok(typed)
    }

    fn compile_struct_member(&mut self, typed: Typed) -> Result<Typed> {
        let Some(struct_def) = typed.ty.struct_def else {
            return Err(self.internal_error("Struct value without a struct"));
        };
        let tag = self.lexer.next_token(true)?;
        let member = self
            .registry
            .find_name(tag.lexeme)
            .and_then(|name| self.registry.find_field_in(struct_def, &name));
        let Some(FieldRef::Property(member)) = member else {
            return Err(self.syntax_error(format!(
                "Unknown member '{}' in struct '{}'",
                tag.lexeme,
                self.registry.struct_def(struct_def).name
            )));
        };

        let mut ty = self.registry.property(member).ty.clone();
        let inherited = typed.ty.flags & (PropertyFlags::OUT_PARM | PropertyFlags::CONST);
        ty.flags = (ty.flags & PropertyFlags::CONST) | inherited;
        let mut expr = Expr::StructMember {
            member,
            struct_def,
            modified: false,
            base: typed.expr.boxed(),
        };
        if ty.kind == PropertyKind::Bool {
            expr = Expr::BoolVariable(expr.boxed());
        }
        let mut result = Typed::new(expr, ty);
        result.property = Some(member);
        Ok(result)
    }

    /// `Obj.Member`, plus `Class.default.X`, `Class.static.F()` and `Class.const.C`.
    fn compile_object_context(&mut self, typed: Typed, required: &PropertyType) -> Result<Typed> {
        let object_class = self.registry.object_class();
        let class_class = self.registry.class_class();
        let class = typed.ty.class.unwrap_or(object_class);

        if typed.ty.kind == PropertyKind::Object && class == class_class {
            let meta = typed.ty.meta_class.unwrap_or(object_class);
            if self.peek_identifier("const")? {
                // The class expression itself is never evaluated.
                let token = self.get_token(None, true)?;
                let field = match token {
                    Some(token) => self.compile_field_expr(Self::context_scope(meta, false), required, &token)?,
                    None => None,
                };
                let meta_name = self.registry.struct_def(meta).name.to_string();
                return field.ok_or_else(|| self.syntax_error(format!("'{meta_name}': Bad const context expression")));
            }
            if self.peek_identifier("default")? || self.peek_identifier("static")? {
                let token = self.get_token(None, true)?;
                let member = match token {
                    Some(token) => self.compile_field_expr(Self::context_scope(meta, false), required, &token)?,
                    None => None,
                };
                let Some(member) = member else {
                    let meta_name = self.registry.struct_def(meta).name.to_string();
                    return Err(self.syntax_error(format!("'{meta_name}': Bad context expression")));
                };
                return self.wrap_context(ContextKind::Class, typed.expr, member);
            }
        }

        let object = match typed.ty.kind {
            PropertyKind::Interface => Expr::InterfaceContext(typed.expr.boxed()),
            _ => typed.expr,
        };
        let token = self.get_token(None, true)?;
        let member = match &token {
            Some(token) => self.compile_field_expr(Self::context_scope(class, true), required, token)?,
            None => None,
        };
        let Some(member) = member else {
            let word = token.map(|token| token.lexeme()).unwrap_or_default();
            return Err(self.syntax_error(format!(
                "Unrecognized member '{word}' in class '{}'",
                self.registry.struct_def(class).name
            )));
        };
        self.wrap_context(ContextKind::Object, object, member)
    }

    fn context_scope(scope: StructId, concrete: bool) -> FieldScope {
        FieldScope {
            scope,
            is_self: false,
            concrete,
        }
    }

    fn wrap_context(&mut self, kind: ContextKind, object: Expr, mut member: Typed) -> Result<Typed> {
        let size = self.context_size(&member.ty, "Context expression")?;
        member.expr = Expr::Context {
            kind,
            object: object.boxed(),
            size,
            member: member.expr.boxed(),
        };
        Ok(member)
    }

    // ==========================================================================
    // Dynamic arrays
    // ==========================================================================

    /// A pseudo-method after `Array.`; the flag is set when nothing may follow.
    fn compile_array_method(&mut self, typed: Typed) -> Result<(Typed, bool)> {
        let int = PropertyType::new(PropertyKind::Int);
        let element = typed.ty.element().bare();
        let array = typed.expr.boxed();
        let method = self.lexer.next_token(true)?;
        let word = method.lexeme.to_ascii_lowercase();

        let (expr, ty) = match word.as_str() {
            "length" => {
                // Still an lvalue so `Array.Length = N` resizes.
                let ty = int.with_flags(PropertyFlags::OUT_PARM);
                return Ok((Typed::new(Expr::DynArrayLength(array), ty), false));
            }
            "add" => {
                let tag = "'add(...)'";
                self.require_symbol("(", tag)?;
                let count = self.expect_expr(&int, tag)?;
                self.require_symbol(")", tag)?;
                let expr = Expr::DynArrayAdd {
                    array,
                    count: count.expr.boxed(),
                };
                (expr, int)
            }
            "insert" | "remove" => {
                let tag = if word == "insert" { "'insert(...)'" } else { "'remove(...)'" };
                self.require_symbol("(", tag)?;
                let index = self.expect_expr(&int, tag)?.expr.boxed();
                self.require_symbol(",", tag)?;
                let count = self.expect_expr(&int, tag)?.expr.boxed();
                self.require_symbol(")", tag)?;
                let expr = if word == "insert" {
                    Expr::DynArrayInsert { array, index, count }
                } else {
                    Expr::DynArrayRemove { array, index, count }
                };
                (expr, PropertyType::none())
            }
            "additem" | "removeitem" => {
                let (op, tag) = if word == "additem" {
                    (ItemOp::AddItem, "'additem(...)'")
                } else {
                    (ItemOp::RemoveItem, "'removeitem(...)'")
                };
                self.require_symbol("(", tag)?;
                let item = self.expect_expr(&element, tag)?.expr.boxed();
                self.require_symbol(")", tag)?;
                (Expr::DynArrayItem { op, array, item }, int)
            }
            "insertitem" => {
                let tag = "'insertitem(...)'";
                self.require_symbol("(", tag)?;
                let index = self.expect_expr(&int, tag)?.expr.boxed();
                self.require_symbol(",", tag)?;
                let item = self.expect_expr(&element, tag)?.expr.boxed();
                self.require_symbol(")", tag)?;
                (Expr::DynArrayInsertItem { array, index, item }, int)
            }
            "find" => {
                let tag = "'find(...)'";
                self.require_symbol("(", tag)?;
                let expr = match element.struct_def {
                    Some(struct_def) if self.peek_raw()?.kind == TokenKind::NameLiteral => {
                        self.compile_find_struct(array, struct_def, tag)?
                    }
                    _ => {
                        let item = self.expect_expr(&element, tag)?.expr.boxed();
                        Expr::DynArrayItem {
                            op: ItemOp::Find,
                            array,
                            item,
                        }
                    }
                };
                self.require_symbol(")", tag)?;
                // Searching has no side effect.
                return Ok((Typed::new(expr, int), true));
            }
            "sort" => {
                let tag = "'sort(...)'";
                self.require_symbol("(", tag)?;
                let delegate = self.expect_expr(&PropertyType::delegate(None), tag)?.expr.boxed();
                self.require_symbol(")", tag)?;
                (Expr::DynArraySort { array, delegate }, PropertyType::none())
            }
            _ => return Err(self.syntax_error("Invalid property or function call on a dynamic array")),
        };

        self.got_affector = true;
        Ok((Typed::new(expr, ty), true))
    }

    /// `StructArray.Find('Member', Value)`.
    fn compile_find_struct(&mut self, array: Box<Expr>, struct_def: StructId, tag: &str) -> Result<Expr> {
        let token = self.lexer.next_token(false)?;
        let member_name = self.intern(token.name_value());
        let member = match self.registry.find_field_in(struct_def, &member_name) {
            Some(FieldRef::Property(member)) => member,
            _ => {
                return Err(self.syntax_error(format!(
                    "Unknown member '{member_name}' in struct '{}'",
                    self.registry.struct_def(struct_def).name
                )));
            }
        };
        self.require_symbol(",", tag)?;
        let value_type = self.registry.property(member).ty.bare();
        let value = self.expect_expr(&value_type, tag)?;
        Ok(Expr::DynArrayFindStruct {
            array,
            member: Expr::Constant(Constant::Name(member_name)).boxed(),
            value: value.expr.boxed(),
        })
    }
}
