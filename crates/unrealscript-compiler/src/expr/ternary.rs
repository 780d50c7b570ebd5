//! `cond ? a : b`.

use unrealscript_core::{PropertyKind, PropertyType};

use super::Typed;
use crate::context::{CompilerContext, Result};
use crate::conversion;
use crate::ir::Expr;

impl<'a> CompilerContext<'a> {
    /// Wrap `condition` in a conditional if `?` follows it.
    pub(crate) fn compile_ternary(&mut self, condition: Typed) -> Result<Typed> {
        if !self.match_symbol("?")? {
            return Ok(condition);
        }

        let boolean = PropertyType::new(PropertyKind::Bool);
        let condition = if condition.ty.kind == PropertyKind::Bool && condition.ty.is_scalar() {
            condition.expr
        } else {
            match conversion::implicit_cast(self.registry, &boolean, &condition.ty) {
                Some(cast) => Expr::PrimitiveCast {
                    cast: cast.token,
                    expr: condition.expr.boxed(),
                },
                None => return Err(self.syntax_error("Type mismatch in ternary condition")),
            }
        };

        let when_true = self.expect_expr(&PropertyType::none(), "ternary operator")?;
        self.require_symbol(":", "ternary operator")?;
        let required = when_true.ty.bare();
        let when_false = self.expect_expr(&PropertyType::none(), "ternary operator")?;

        let ty = if conversion::matches_type(self.registry, &required, &when_false.ty, false) {
            required
        } else if conversion::matches_type(self.registry, &when_false.ty.bare(), &when_true.ty, false) {
            when_false.ty.bare()
        } else {
            return Err(self.syntax_error(format!(
                "Ternary operator branches mismatch: '{}' and '{}'",
                conversion::describe(self.registry, &when_true.ty),
                conversion::describe(self.registry, &when_false.ty)
            )));
        };

        let expr = Expr::Conditional {
            condition: condition.boxed(),
            when_true: when_true.expr.boxed(),
            when_false: when_false.expr.boxed(),
        };
        Ok(Typed::new(expr, ty))
    }
}
