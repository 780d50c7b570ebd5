//! Explicit conversions: `int(X)`, `Actor(X)`, `class<Pawn>(X)`, and `new`.

use unrealscript_core::{FieldRef, PropertyKind, PropertyType, StructId};
use unrealscript_parser::TokenKind;

use super::{Outcome, Typed};
use crate::bytecode::OpCode;
use crate::context::{CompilerContext, Result};
use crate::conversion::{Row, lookup};
use crate::ir::Expr;
use crate::tokens::ScriptToken;

impl<'a> CompilerContext<'a> {
    /// The target type of a primitive cast keyword.
    pub(crate) fn cast_keyword(&self, word: &str) -> Option<PropertyType> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "byte" => PropertyKind::Byte,
            "int" => PropertyKind::Int,
            "bool" => PropertyKind::Bool,
            "float" => PropertyKind::Float,
            "name" => PropertyKind::Name,
            "string" | "button" => PropertyKind::String,
            "struct" => PropertyKind::Struct,
            "vector" => return Some(self.core_struct("Vector")),
            "rotator" => return Some(self.core_struct("Rotator")),
            _ => return None,
        };
        Some(PropertyType::new(kind))
    }

    /// `keyword(expr)`, the opening parenthesis already read.
    pub(crate) fn compile_primitive_cast(&mut self, keyword: &str, target: PropertyType) -> Result<Typed> {
        let source = self.compile_expr(&PropertyType::none(), Some(keyword))?.into_typed();
        let Some(source) = source else {
            return Err(self.syntax_error(format!("'{keyword}' conversion: Bad or missing expression")));
        };

        let cast = source
            .ty
            .is_scalar()
            .then(|| lookup(Row::of(self.registry, &target), Row::of(self.registry, &source.ty)))
            .flatten();
        let Some(cast) = cast else {
            if target.kind == source.ty.kind {
                return Err(self.syntax_error(format!("No need to cast '{}' to itself", target.kind)));
            }
            return Err(self.syntax_error(format!(
                "Can't convert '{}' to '{}'",
                source.ty.kind, target.kind
            )));
        };

        if !self.match_symbol(")")? {
            return Err(self.syntax_error("Missing ')' in type conversion"));
        }
        let expr = Expr::PrimitiveCast {
            cast: cast.token,
            expr: source.expr.boxed(),
        };
        Ok(Typed::new(expr, target))
    }

    /// `new [(outer [, name [, flags]])] ClassExpr [()]`.
    pub(crate) fn compile_new(&mut self) -> Result<Typed> {
        let object_class = self.registry.object_class();
        let paren = self.match_symbol("(")? && !self.match_symbol(")")?;
        let mut going = paren;
        let mut parent_class = self.class;

        let outer = if going {
            let required = PropertyType::object(Some(object_class));
            let parent = self.expect_expr(&required, "'new' parent object")?;
            parent_class = parent.ty.class.unwrap_or(object_class);
            going = self.match_symbol(",")?;
            parent.expr
        } else {
            Expr::Nothing
        };

        let name = if going {
            let name = self.expect_expr(&PropertyType::new(PropertyKind::String), "'new' name")?;
            going = self.match_symbol(",")?;
            name.expr
        } else {
            Expr::Nothing
        };

        let flags = if going {
            self.expect_expr(&PropertyType::new(PropertyKind::Int), "'new' flags")?.expr
        } else {
            Expr::Nothing
        };
        if paren {
            self.require_symbol(")", "'new'")?;
        }

        let class_class = self.registry.class_class();
        let required = PropertyType::class_ref(class_class, object_class);
        let class = self.expect_expr(&required, "'new'")?;
        let Some(meta) = class.ty.meta_class else {
            return Err(self.syntax_error("'new': Invalid class"));
        };

        let within = self.class_within(meta);
        if !self.registry.is_child_of(parent_class, within) {
            return Err(self.syntax_error(format!(
                "'new': {} objects must reside in {} objects, not {} objects",
                self.registry.struct_def(meta).name,
                self.registry.struct_def(within).name,
                self.registry.struct_def(parent_class).name,
            )));
        }

        if self.match_symbol("(")? {
            self.require_symbol(")", "'new' constructor parameters")?;
        }

        let expr = Expr::New {
            outer: outer.boxed(),
            name: name.boxed(),
            flags: flags.boxed(),
            class: class.expr.boxed(),
            template: Expr::Nothing.boxed(),
        };
        Ok(Typed::new(expr, PropertyType::object(Some(meta))))
    }

    /// Class instances must live inside; `Object` unless declared.
    pub(crate) fn class_within(&self, class: StructId) -> StructId {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(within) = self.registry.class_data(id).and_then(|data| data.within) {
                return within;
            }
            current = self.registry.super_class(id);
        }
        self.registry.object_class()
    }

    /// `Class(expr)`, `class<Meta>(expr)` or `Enum(expr)`.
    ///
    /// Returns `None` with the stream untouched when the token doesn't start
    /// a cast, which includes a class name used as a function call.
    pub(crate) fn compile_dynamic_cast(&mut self, token: &ScriptToken<'a>) -> Result<Option<Typed>> {
        if token.is_constant() || token.kind() != TokenKind::Identifier {
            return Ok(None);
        }
        let start = self.lexer.mark();
        let paren = self.match_symbol("(")?;
        if !paren && !self.peek_symbol("<")? {
            return Ok(None);
        }

        let Some(dest) = self.registry.find_class(token.lexeme()) else {
            let destination_enum = self
                .registry
                .find_name(token.lexeme())
                .and_then(|name| self.registry.find_global_type(&name));
            if let (Some(FieldRef::Enum(dest_enum)), true) = (destination_enum, paren) {
                let value = self.compile_expr(&PropertyType::byte(None), None)?;
                if let Outcome::Value(value) = value {
                    if self.match_symbol(")")? {
                        return Ok(Some(Typed::new(value.expr, PropertyType::byte(Some(dest_enum)))));
                    }
                }
            }
            self.lexer.reset(start);
            return Ok(None);
        };

        let class_class = self.registry.class_class();
        let object_class = self.registry.object_class();
        let mut meta = object_class;
        if !paren {
            let bound = match dest == class_class && self.match_symbol("<")? {
                true => self.get_identifier()?.and_then(|name| self.registry.find_class(name.lexeme)),
                false => None,
            };
            match bound {
                Some(bound) if self.match_symbol(">")? && self.match_symbol("(")? => meta = bound,
                _ => {
                    self.lexer.reset(start);
                    return Ok(None);
                }
            }
        }

        let value = self.compile_expr(&PropertyType::object(Some(object_class)), None)?;
        let value = match value {
            Outcome::Value(value) if self.match_symbol(")")? => value,
            _ => {
                self.lexer.reset(start);
                return Ok(None);
            }
        };

        let dest_name = self.registry.struct_def(dest).name.to_string();
        let source = value.ty.class;
        let source_name = source
            .map(|class| self.registry.struct_def(class).name.to_string())
            .unwrap_or_else(|| "None".to_string());
        let source_meta = value.ty.meta_class.unwrap_or(object_class);

        if self.registry.is_interface(dest) {
            let implemented = source.is_some_and(|class| {
                self.registry.is_child_of(class, dest) || self.registry.implements_interface(class, dest)
            });
            if implemented || source.is_none() {
                return Err(self.syntax_error(format!("Cast from '{source_name}' to '{dest_name}' is unnecessary")));
            }
            let expr = Expr::ClassCast {
                op: OpCode::InterfaceCast,
                class: dest,
                expr: value.expr.boxed(),
            };
            return Ok(Some(Typed::new(expr, PropertyType::interface(dest))));
        }

        let redundant = source.is_none_or(|class| self.registry.is_child_of(class, dest))
            && (source != Some(class_class) || dest != class_class || self.registry.is_child_of(source_meta, meta));
        if redundant {
            return Err(self.syntax_error(format!("Cast from '{source_name}' to '{dest_name}' is unnecessary")));
        }

        let runtime = source.is_some_and(|class| self.registry.is_child_of(dest, class))
            && (dest != class_class
                || value.ty.meta_class.is_none()
                || self.registry.is_child_of(meta, source_meta));
        if !runtime {
            return Err(self.syntax_error(format!("Cast from '{source_name}' to '{dest_name}' will always fail")));
        }

        let (op, class, ty) = if dest == class_class {
            (OpCode::MetaCast, meta, PropertyType::class_ref(class_class, meta))
        } else {
            (OpCode::DynamicCast, dest, PropertyType::object(Some(dest)))
        };
        let expr = Expr::ClassCast {
            op,
            class,
            expr: value.expr.boxed(),
        };
        Ok(Some(Typed::new(expr, ty)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;

    fn cast_fixture() -> (Fixture, StructId, StructId, StructId) {
        let mut fixture = Fixture::new();
        let object = fixture.registry.object_class();
        let base = fixture.registry.register_class("Base", Some(object), None).unwrap();
        let derived = fixture.registry.register_class("Derived", Some(base), None).unwrap();
        let other = fixture.registry.register_class("Other", Some(object), None).unwrap();
        (fixture, base, derived, other)
    }

    // ==========================================================================
    // Primitive casts
    // ==========================================================================

    #[test]
    fn int_to_float_cast() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", PropertyType::new(PropertyKind::Int));
        let typed = fixture.compile("float(X)", &PropertyType::none()).unwrap().into_typed().unwrap();
        assert_eq!(typed.ty.kind, PropertyKind::Float);
        assert!(!typed.is_lvalue());
    }

    #[test]
    fn cast_to_itself() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", PropertyType::new(PropertyKind::Int));
        let err = fixture.compile("int(X)", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "No need to cast 'int' to itself");
    }

    #[test]
    fn missing_cast_operand() {
        let mut fixture = Fixture::new();
        let err = fixture.compile("int()", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "'int' conversion: Bad or missing expression");
    }

    // ==========================================================================
    // Class casts
    // ==========================================================================

    #[test]
    fn downcast_is_dynamic() {
        let (mut fixture, base, derived, _) = cast_fixture();
        fixture.add_var(fixture.class, "B", PropertyType::object(Some(base)));
        let typed = fixture.compile("Derived(B)", &PropertyType::none()).unwrap().into_typed().unwrap();
        assert!(matches!(
            typed.expr,
            Expr::ClassCast {
                op: OpCode::DynamicCast,
                class,
                ..
            } if class == derived
        ));
        assert_eq!(typed.ty.class, Some(derived));
    }

    #[test]
    fn upcast_is_unnecessary() {
        let (mut fixture, _, derived, _) = cast_fixture();
        fixture.add_var(fixture.class, "D", PropertyType::object(Some(derived)));
        let err = fixture.compile("Base(D)", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Cast from 'Derived' to 'Base' is unnecessary");
    }

    #[test]
    fn unrelated_cast_always_fails() {
        let (mut fixture, base, _, _) = cast_fixture();
        fixture.add_var(fixture.class, "B", PropertyType::object(Some(base)));
        let err = fixture.compile("Other(B)", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Cast from 'Base' to 'Other' will always fail");
    }

    #[test]
    fn meta_cast() {
        let (mut fixture, base, derived, _) = cast_fixture();
        let class_class = fixture.registry.class_class();
        fixture.add_var(fixture.class, "C", PropertyType::class_ref(class_class, base));
        let typed = fixture
            .compile("class<Derived>(C)", &PropertyType::none())
            .unwrap()
            .into_typed()
            .unwrap();
        assert!(matches!(typed.expr, Expr::ClassCast { op: OpCode::MetaCast, .. }));
        assert_eq!(typed.ty.meta_class, Some(derived));
    }
}
