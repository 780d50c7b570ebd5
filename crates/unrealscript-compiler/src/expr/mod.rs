//! Expression compiler.
//!
//! [`CompilerContext::compile_expr`] reads one expression from the token
//! stream and returns it as an [`Expr`] tree together with its type. Nothing
//! is written to the script here; statements emit the finished tree, so a
//! conversion or operator found after its operands simply wraps them.
//!
//! The grammar is evaluated in four steps:
//!
//! 1. one primary term: a constant, `(...)`, a type cast, `self`, `new`, a
//!    dynamic class cast or a field/function reference
//! 2. postfix context operators: `.member`, `[index]` and the dynamic array
//!    pseudo-methods
//! 3. operator functions, resolved by conversion cost
//! 4. coercion to the required type
//!
//! An lvalue is marked by `OUT_PARM` on the result type.

mod binary;
mod calls;
mod cast;
mod identifiers;
mod literals;
mod member;
mod ternary;

use unrealscript_core::{PropertyFlags, PropertyId, PropertyKind, PropertyType};
use unrealscript_registry::layout;

use crate::context::{CompilerContext, Result};
use crate::conversion;
use crate::ir::{Constant, Expr};

pub(crate) use identifiers::FieldScope;

/// A compiled expression and what it evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub struct Typed {
    pub expr: Expr,
    pub ty: PropertyType,
    /// The variable the expression names, if it is one.
    pub property: Option<PropertyId>,
    /// Return value of the call the expression ends in.
    pub return_property: Option<PropertyId>,
}

impl Typed {
    pub fn new(expr: Expr, ty: PropertyType) -> Self {
        Self {
            expr,
            ty,
            property: None,
            return_property: None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.expr, Expr::Constant(_))
    }

    pub fn is_lvalue(&self) -> bool {
        self.ty.is_out()
    }

    /// The value is no longer assignable.
    pub fn rvalue(mut self) -> Self {
        self.ty.flags.remove(PropertyFlags::OUT_PARM);
        self
    }
}

/// Result of compiling an expression against a required type.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No expression starts here.
    Empty,
    Value(Typed),
    /// An expression of the wrong type; only returned when no error tag was given.
    Mismatch(Typed),
}

impl Outcome {
    /// The expression, whether or not it matched.
    pub fn into_typed(self) -> Option<Typed> {
        match self {
            Outcome::Empty => None,
            Outcome::Value(typed) | Outcome::Mismatch(typed) => Some(typed),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }
}

/// Operators bind only while their precedence stays below this.
pub const ANY_PRECEDENCE: u32 = u32::MAX;

impl<'a> CompilerContext<'a> {
    /// Compile an expression; `required` of kind `None` accepts any type.
    pub fn compile_expr(&mut self, required: &PropertyType, tag: Option<&str>) -> Result<Outcome> {
        self.compile_expr_with(required, tag, ANY_PRECEDENCE, None)
    }

    /// Compile an expression that must be present and match `required`.
    pub fn expect_expr(&mut self, required: &PropertyType, tag: &str) -> Result<Typed> {
        match self.compile_expr(required, Some(tag))? {
            Outcome::Value(typed) => Ok(typed),
            Outcome::Mismatch(_) => Err(self.syntax_error(format!("Type mismatch in {tag}"))),
            Outcome::Empty => Err(self.syntax_error(format!("Bad or missing expression in {tag}"))),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_expr_with(
        &mut self,
        required: &PropertyType,
        tag: Option<&str>,
        max_precedence: u32,
        hint: Option<&PropertyType>,
    ) -> Result<Outcome> {
        let mut operand = self.compile_primary(required, hint)?;
        if let Some(typed) = operand.take() {
            operand = Some(self.compile_postfix(typed, required)?);
        }
        let mut operand = self.compile_operators(operand, max_precedence)?;
        if max_precedence == ANY_PRECEDENCE {
            if let Some(typed) = operand.take() {
                operand = Some(self.compile_ternary(typed)?);
            }
        }
        self.coerce(operand, required, tag)
    }

    fn compile_primary(&mut self, required: &PropertyType, hint: Option<&PropertyType>) -> Result<Option<Typed>> {
        let Some(token) = self.get_token(Some(hint.unwrap_or(required)), false)? else {
            return Ok(None);
        };

        if let Some(constant) = token.constant.clone() {
            if constant == Constant::Object(None) && required.kind == PropertyKind::Delegate {
                let ty = PropertyType::delegate(required.function);
                return Ok(Some(Typed::new(Expr::Constant(Constant::EmptyDelegate), ty)));
            }
            let (constant, ty) = self.attempt_to_convert(constant, token.ty.clone(), required);
            return Ok(Some(Typed::new(Expr::Constant(constant), ty).rvalue()));
        }

        if token.is_symbol("(") {
            let inner = self.compile_expr(required, None)?.into_typed();
            let Some(inner) = inner else {
                return Err(self.syntax_error("Bad or missing expression in parenthesis"));
            };
            self.require_symbol(")", "expression")?;
            return Ok(Some(inner));
        }

        if let Some(target) = self.cast_keyword(token.lexeme()) {
            if self.match_symbol("(")? {
                return self.compile_primitive_cast(token.lexeme(), target).map(Some);
            }
        }

        if token.is_identifier("self") {
            self.check_allow("'self'", crate::nest::Allow::INSTANCE)?;
            let ty = PropertyType::object(Some(self.class));
            return Ok(Some(Typed::new(Expr::SelfObject, ty)));
        }

        if token.is_identifier("new") {
            return self.compile_new().map(Some);
        }

        if let Some(cast) = self.compile_dynamic_cast(&token)? {
            return Ok(Some(cast));
        }

        let scope = FieldScope {
            scope: self.scope(),
            is_self: true,
            concrete: self.is_concrete(),
        };
        if let Some(field) = self.compile_field_expr(scope, required, &token)? {
            return Ok(Some(field));
        }

        self.unget_token(&token);
        Ok(None)
    }

    /// Apply the required-type check and any automatic conversion.
    fn coerce(&mut self, operand: Option<Typed>, required: &PropertyType, tag: Option<&str>) -> Result<Outcome> {
        let Some(mut typed) = operand else {
            if !required.is_none() {
                if let Some(tag) = tag {
                    return Err(self.syntax_error(format!("Bad or missing expression in {tag}")));
                }
            }
            return Ok(Outcome::Empty);
        };

        if conversion::matches_type(self.registry, required, &typed.ty, false) {
            return Ok(Outcome::Value(typed));
        }

        if required.is_out() {
            return match tag {
                Some(_) if typed.is_constant() => Err(self.syntax_error("Expecting a variable, not a constant")),
                Some(tag) if typed.ty.is_const() => {
                    Err(self.syntax_error(format!("Const mismatch in Out variable {tag}")))
                }
                Some(tag) => Err(self.syntax_error(format!("Type mismatch in Out variable {tag}"))),
                None => Ok(Outcome::Mismatch(typed)),
            };
        }

        if !required.is_scalar() || !typed.ty.is_scalar() {
            return match tag {
                Some(tag) => Err(self.syntax_error(format!("Array mismatch in {tag}"))),
                None => Ok(Outcome::Mismatch(typed)),
            };
        }

        if let Some(cast) = conversion::implicit_cast(self.registry, required, &typed.ty) {
            typed.expr = Expr::PrimitiveCast {
                cast: cast.token,
                expr: typed.expr.boxed(),
            };
            typed.ty = PropertyType::new(required.kind);
            if required.kind == PropertyKind::Struct {
                typed.ty.struct_def = required.struct_def;
            }
            typed.property = None;
            return Ok(Outcome::Value(typed));
        }

        match tag {
            Some(tag) => Err(self.syntax_error(format!("Type mismatch in {tag}"))),
            None => Ok(Outcome::Mismatch(typed)),
        }
    }

    /// Byte size of a context result, as written after `Context`.
    pub(crate) fn context_size(&self, ty: &PropertyType, tag: &str) -> Result<u8> {
        let size = if ty.is_none() {
            0
        } else {
            layout::property_size(self.registry, ty)
        };
        u8::try_from(size)
            .map_err(|_| self.syntax_error(format!("{tag}: Variable is too large ({size} bytes, 255 max)")))
    }
}
