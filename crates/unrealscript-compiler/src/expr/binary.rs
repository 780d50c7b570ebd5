//! Operator resolution.
//!
//! Operators are ordinary functions flagged `OPERATOR`, found by their
//! friendly name in every enclosing scope. Each candidate is scored by the
//! worse of its two parameter conversion costs and the unique cheapest one
//! wins.

use rustc_hash::FxHashSet;
use unrealscript_core::{CompilationError, FunctionFlags, PropertyFlags, PropertyKind, PropertyType, StructId};

use super::Typed;
use crate::context::{CompilerContext, Result};
use crate::conversion::{self, NO_CONVERSION, Row, lookup};
use crate::ir::{CallTarget, Constant, Expr};

/// One overload considered for an operator token.
struct Candidate {
    function: StructId,
    num_parms: u8,
    precedence: u8,
}

impl<'a> CompilerContext<'a> {
    /// Fold operators onto `left` while their precedence is below `max_precedence`.
    ///
    /// With no left operand only pre-operators are considered.
    pub(crate) fn compile_operators(&mut self, mut left: Option<Typed>, max_precedence: u32) -> Result<Option<Typed>> {
        loop {
            let Some(token) = self.get_token(None, true)? else {
                return Ok(left);
            };
            let is_pre = left.is_none();
            let op = token.lexeme();
            let candidates = self.operator_candidates(op, is_pre);
            let precedence = candidates.last().map_or(0, |c| u32::from(c.precedence));
            if candidates.is_empty() || precedence >= max_precedence {
                self.unget_token(&token);
                return Ok(left);
            }
            let num_parms = candidates.iter().map(|c| c.num_parms).min().unwrap_or(3);
            let mut right = if num_parms == 3 || is_pre {
                let tag = format!("Following '{op}'");
                let hint = left.as_ref().map(|typed| typed.ty.clone());
                let right = self
                    .compile_expr_with(&PropertyType::none(), Some(&tag), precedence, hint.as_ref())?
                    .into_typed();
                match right {
                    Some(right) => Some(right),
                    None => return Err(self.syntax_error(format!("Bad or missing expression after '{op}'"))),
                }
            } else {
                None
            };

            let (best, cost, matches, any_left, any_right) =
                self.best_operator(&candidates, num_parms, left.as_ref(), right.as_ref());

            if cost == NO_CONVERSION {
                let compare = self
                    .struct_compare(op, &mut left, &mut right)
                    .or_else(|| delegate_compare(op, &mut left, &mut right));
                if let Some(compare) = compare {
                    left = Some(compare);
                    continue;
                }
                let message = if any_left && !any_right {
                    format!("Right type is incompatible with '{op}'")
                } else if any_right && !any_left {
                    format!("Left type is incompatible with '{op}'")
                } else {
                    format!("Types are incompatible with '{op}'")
                };
                return Err(self.syntax_error(message));
            }
            if matches > 1 {
                return Err(CompilationError::AmbiguousOverload {
                    operator: op.to_string(),
                    matches,
                    cost,
                    span: self.lexer.here(),
                });
            }
            let Some(best) = best else {
                return Err(self.internal_error(format!("No overload chosen for '{op}'")));
            };
            left = Some(self.emit_operator(op, best, left, right)?);
        }
    }

    /// Operator functions named `op` visible from the innermost nest outward.
    fn operator_candidates(&self, op: &str, is_pre: bool) -> Vec<Candidate> {
        let Some(name) = self.registry.find_name(op) else {
            return Vec::new();
        };
        let required = if is_pre {
            FunctionFlags::OPERATOR | FunctionFlags::PRE_OPERATOR
        } else {
            FunctionFlags::OPERATOR
        };

        let mut seen = FxHashSet::default();
        let mut candidates = Vec::new();
        for nest in self.nests.iter_rev().filter(|nest| nest.kind.is_node()) {
            for function in self.registry.functions(nest.node) {
                let def = self.registry.struct_def(function);
                let Some(data) = def.as_function() else {
                    continue;
                };
                let fixity = data.flags & (FunctionFlags::OPERATOR | FunctionFlags::PRE_OPERATOR);
                if data.friendly_name == name && fixity == required && seen.insert(function) {
                    candidates.push(Candidate {
                        function,
                        num_parms: data.num_parms,
                        precedence: data.oper_precedence,
                    });
                }
            }
        }
        candidates
    }

    /// The cheapest candidate, its cost, how many candidates share that cost,
    /// and whether either operand fit any candidate at all.
    fn best_operator(
        &self,
        candidates: &[Candidate],
        num_parms: u8,
        left: Option<&Typed>,
        right: Option<&Typed>,
    ) -> (Option<StructId>, u32, usize, bool, bool) {
        let mut best = None;
        let mut best_cost = NO_CONVERSION;
        let mut matches = 0;
        let (mut any_left, mut any_right) = (false, false);

        for candidate in candidates.iter().filter(|c| c.num_parms == num_parms) {
            let params = self.registry.parameters(candidate.function);
            let mut params = params.iter().map(|&id| &self.registry.property(id).ty);
            let mut cost = 0;
            if let Some(left) = left {
                let param_cost = params
                    .next()
                    .map_or(NO_CONVERSION, |param| conversion::conversion_cost(self.registry, param, &left.ty));
                any_left |= param_cost != NO_CONVERSION;
                cost = param_cost;
            }
            if let Some(right) = right {
                let param_cost = params
                    .next()
                    .map_or(NO_CONVERSION, |param| conversion::conversion_cost(self.registry, param, &right.ty));
                any_right |= param_cost != NO_CONVERSION;
                cost = cost.max(param_cost);
            }

            if best.is_none() || cost < best_cost {
                best = Some(candidate.function);
                best_cost = cost;
                matches = 1;
            } else if cost == best_cost {
                matches += 1;
            }
        }
        (best, best_cost, matches, any_left, any_right)
    }

    /// `==` and `!=` between two values of the same struct compare memberwise.
    fn struct_compare(&self, op: &str, left: &mut Option<Typed>, right: &mut Option<Typed>) -> Option<Typed> {
        let equal = match op {
            "==" => true,
            "!=" => false,
            _ => return None,
        };
        let (lhs, rhs) = (left.as_ref()?, right.as_ref()?);
        if lhs.ty.kind != PropertyKind::Struct || rhs.ty.kind != PropertyKind::Struct {
            return None;
        }
        let struct_def = lhs.ty.struct_def.filter(|&id| rhs.ty.struct_def == Some(id))?;
        let (lhs, rhs) = (left.take()?, right.take()?);
        let expr = Expr::StructCompare {
            equal,
            struct_def,
            lhs: lhs.expr.boxed(),
            rhs: rhs.expr.boxed(),
        };
        Some(Typed::new(expr, PropertyType::new(PropertyKind::Bool)))
    }

    /// Build the call to the chosen overload, converting each operand to its parameter.
    fn emit_operator(
        &mut self,
        op: &str,
        function: StructId,
        left: Option<Typed>,
        right: Option<Typed>,
    ) -> Result<Typed> {
        let params = self.registry.parameters(function);
        let mut params = params.into_iter();
        let mut args = Vec::with_capacity(2);

        for (position, operand) in [left, right].into_iter().enumerate() {
            let Some(operand) = operand else {
                continue;
            };
            let Some(param) = params.next() else {
                return Err(self.internal_error(format!("Operator '{op}' has too few parameters")));
            };
            let param_ty = self.registry.property(param).ty.clone();
            let mut expr = operand.expr;

            if param_ty.is_out() {
                if expr.is_array_length() {
                    return Err(self.syntax_error(format!(
                        "Illegal to use operator {op} to modify the length of a dynamic array"
                    )));
                }
                self.got_affector = true;
                expr.mark_modified();
            }
            if operand.ty.kind != param_ty.kind {
                let Some(cast) = lookup(Row::of(self.registry, &param_ty), Row::of(self.registry, &operand.ty)) else {
                    return Err(self.internal_error(format!("No conversion for operand of '{op}'")));
                };
                expr = Expr::PrimitiveCast {
                    cast: cast.token,
                    expr: expr.boxed(),
                };
            }
            // Short-circuit operators may skip their second operand.
            if position == 1 && param_ty.flags.contains(PropertyFlags::SKIP_PARM) {
                expr = Expr::Skip(expr.boxed());
            }
            args.push((expr, operand.ty));
        }

        self.check_object_comparison(function, &args);

        let native_index = self
            .registry
            .struct_def(function)
            .as_function()
            .map_or(0, |data| data.native_index);
        let target = if native_index != 0 {
            CallTarget::Native(native_index)
        } else {
            CallTarget::Final(function)
        };

        let return_property = self.registry.return_property(function);
        let Some(return_property) = return_property else {
            return Err(self.internal_error(format!("Operator '{op}' has no return value")));
        };
        let mut ty = self.registry.property(return_property).ty.clone();
        ty.flags
            .remove(PropertyFlags::OUT_PARM | PropertyFlags::PARM | PropertyFlags::RETURN_PARM);

        let args = args.into_iter().map(|(expr, _)| expr).collect();
        let mut typed = Typed::new(Expr::Call { target, args }, ty);
        typed.return_property = Some(return_property);
        Ok(typed)
    }

    /// Comparing objects of unrelated classes can never be true.
    fn check_object_comparison(&mut self, function: StructId, args: &[(Expr, PropertyType)]) {
        let name = &self.registry.struct_def(function).name;
        let is_compare = name.matches("EqualEqual_ObjectObject") || name.matches("NotEqual_ObjectObject");
        let [(_, a), (_, b)] = args else {
            return;
        };
        if is_compare && a.is_object() && b.is_object() && !conversion::objects_related(self.registry, a, b) {
            let message = format!(
                "Comparison of '{}' with '{}' will always fail",
                conversion::describe(self.registry, a),
                conversion::describe(self.registry, b)
            );
            self.warn(1, message);
        }
    }
}

/// `==` and `!=` between two delegates, or a delegate and `None`.
fn delegate_compare(op: &str, left: &mut Option<Typed>, right: &mut Option<Typed>) -> Option<Typed> {
    let equal = match op {
        "==" => true,
        "!=" => false,
        _ => return None,
    };
    let (lhs, rhs) = (left.as_ref()?, right.as_ref()?);
    let is_delegate = |typed: &Typed| typed.ty.kind == PropertyKind::Delegate;
    let is_none = |typed: &Typed| matches!(typed.expr, Expr::Constant(Constant::Object(None) | Constant::EmptyDelegate));
    let fits = (is_delegate(lhs) || is_none(lhs)) && (is_delegate(rhs) || is_none(rhs));
    if !fits || !(is_delegate(lhs) || is_delegate(rhs)) {
        return None;
    }
    let operand = |typed: Typed| match typed.expr {
        Expr::Constant(Constant::Object(None)) => Expr::Constant(Constant::EmptyDelegate).boxed(),
        expr => expr.boxed(),
    };
    let (lhs, rhs) = (operand(left.take()?), operand(right.take()?));
    Some(Typed::new(
        Expr::DelegateCompare { equal, lhs, rhs },
        PropertyType::new(PropertyKind::Bool),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;
    use crate::bytecode::CastToken;

    fn int() -> PropertyType {
        PropertyType::new(PropertyKind::Int)
    }

    fn call_of(typed: &Typed) -> (&CallTarget, &[Expr]) {
        match &typed.expr {
            Expr::Call { target, args } => (target, args),
            other => panic!("not a call: {other:?}"),
        }
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    #[test]
    fn int_addition_binds_native() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        let typed = fixture.compile("X + 1", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (target, args) = call_of(&typed);
        assert_eq!(*target, CallTarget::Native(146));
        assert_eq!(args.len(), 2);
        assert_eq!(args[1], Expr::int(1));
        assert_eq!(typed.ty.kind, PropertyKind::Int);
        assert!(!typed.is_lvalue());
    }

    #[test]
    fn float_operand_picks_float_overload() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        fixture.add_var(fixture.class, "Scale", PropertyType::new(PropertyKind::Float));
        let typed = fixture.compile("X + Scale", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (target, args) = call_of(&typed);
        assert_eq!(*target, CallTarget::Native(174));
        assert!(matches!(
            args[0],
            Expr::PrimitiveCast {
                cast: CastToken::IntToFloat,
                ..
            }
        ));
    }

    #[test]
    fn precedence_groups_multiplication_first() {
        let mut fixture = Fixture::new();
        let typed = fixture.compile("1 + 2 * 3", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (target, args) = call_of(&typed);
        assert_eq!(*target, CallTarget::Native(146));
        let Expr::Call { target: inner, .. } = &args[1] else {
            panic!("right operand is not the product");
        };
        assert_eq!(*inner, CallTarget::Native(144));
    }

    #[test]
    fn pre_operator() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        let typed = fixture.compile("-X", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (target, args) = call_of(&typed);
        assert_eq!(*target, CallTarget::Native(143));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn incompatible_right_operand() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        let err = fixture.compile("X + 'Name'", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Right type is incompatible with '+'");
    }

    #[test]
    fn missing_right_operand() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        let err = fixture.compile("X + ;", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Bad or missing expression after '+'");
    }

    #[test]
    fn equal_cost_overloads_are_ambiguous() {
        let mut fixture = Fixture::new();
        let object = fixture.registry.object_class();
        let name = fixture.registry.intern("Plus_IntInt");
        let plus = fixture.registry.intern("+");
        let mut data = unrealscript_registry::FunctionData::new(plus);
        data.flags = FunctionFlags::OPERATOR | FunctionFlags::FINAL;
        data.oper_precedence = 20;
        data.num_parms = 3;
        let function = fixture.registry.add_struct(
            object,
            name,
            unrealscript_registry::StructData::Function(data),
            1,
        );
        fixture.add_var(function, "A", int().with_flags(PropertyFlags::PARM));
        fixture.add_var(function, "B", int().with_flags(PropertyFlags::PARM));
        fixture.add_var(
            function,
            "ReturnValue",
            int().with_flags(PropertyFlags::PARM | PropertyFlags::OUT_PARM | PropertyFlags::RETURN_PARM),
        );
        fixture.add_var(fixture.class, "X", int());

        let err = fixture.compile("X + 1", &PropertyType::none()).unwrap_err();
        assert_eq!(
            err,
            CompilationError::AmbiguousOverload {
                operator: "+".into(),
                matches: 2,
                cost: 0,
                span: err.span(),
            }
        );
    }

    // ==========================================================================
    // Side effects
    // ==========================================================================

    #[test]
    fn increment_is_an_affector() {
        let mut fixture = Fixture::new();
        fixture.add_var(fixture.class, "X", int());
        let typed = fixture.compile("++X", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (target, _) = call_of(&typed);
        assert_eq!(*target, CallTarget::Native(163));
    }

    #[test]
    fn increment_rejects_constant() {
        let mut fixture = Fixture::new();
        let err = fixture.compile("++1", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Types are incompatible with '++'");
    }

    #[test]
    fn array_length_cannot_be_incremented() {
        let mut fixture = Fixture::new();
        let mut ty = int();
        ty.array_dim = 0;
        fixture.add_var(fixture.function, "Arr", ty);
        let err = fixture.compile("++Arr.Length", &PropertyType::none()).unwrap_err();
        assert_eq!(
            err.message(),
            "Illegal to use operator ++ to modify the length of a dynamic array"
        );
    }

    /// Registers `native(154) operator(24) bool == (int A, int B)` on Object.
    fn add_int_equality(fixture: &mut Fixture) {
        let object = fixture.registry.object_class();
        let bool_ty = PropertyType::new(PropertyKind::Bool);
        let eq = fixture.registry.intern("EqualEqual_IntInt");
        let symbol = fixture.registry.intern("==");
        let mut data = unrealscript_registry::FunctionData::new(symbol);
        data.flags = FunctionFlags::OPERATOR | FunctionFlags::FINAL | FunctionFlags::NATIVE;
        data.oper_precedence = 24;
        data.native_index = 154;
        data.num_parms = 3;
        let function = fixture
            .registry
            .add_struct(object, eq, unrealscript_registry::StructData::Function(data), 1);
        fixture.add_var(function, "A", int().with_flags(PropertyFlags::PARM));
        fixture.add_var(function, "B", int().with_flags(PropertyFlags::PARM));
        fixture.add_var(
            function,
            "ReturnValue",
            bool_ty.with_flags(PropertyFlags::PARM | PropertyFlags::OUT_PARM | PropertyFlags::RETURN_PARM),
        );
    }

    #[test]
    fn struct_equality_falls_back_to_memberwise_compare() {
        let mut fixture = Fixture::new();
        add_int_equality(&mut fixture);
        let object = fixture.registry.object_class();

        let point_name = fixture.registry.intern("Point");
        let point = fixture.registry.add_struct(
            object,
            point_name,
            unrealscript_registry::StructData::ScriptStruct(Default::default()),
            1,
        );
        fixture.add_var(point, "X", int());
        fixture.add_var(fixture.class, "P", PropertyType::structure(point));
        fixture.add_var(fixture.class, "Q", PropertyType::structure(point));

        let typed = fixture.compile("P == Q", &PropertyType::none()).unwrap().into_typed().unwrap();
        assert!(matches!(typed.expr, Expr::StructCompare { equal: true, struct_def, .. } if struct_def == point));
        assert_eq!(typed.ty.kind, PropertyKind::Bool);
    }

    #[test]
    fn delegate_equality_against_none() {
        let mut fixture = Fixture::new();
        add_int_equality(&mut fixture);
        fixture.add_var(fixture.class, "OnTouch", PropertyType::delegate(None));

        let typed = fixture.compile("OnTouch == None", &PropertyType::none()).unwrap().into_typed().unwrap();
        assert_eq!(typed.ty.kind, PropertyKind::Bool);
        let Expr::DelegateCompare { equal: true, rhs, .. } = &typed.expr else {
            panic!("expected a delegate compare, got {:?}", typed.expr);
        };
        assert_eq!(**rhs, Expr::Constant(Constant::EmptyDelegate));

        // `None` on the left is an empty delegate too
        let typed = fixture.compile("None == OnTouch", &PropertyType::none()).unwrap().into_typed().unwrap();
        let Expr::DelegateCompare { equal: true, lhs, .. } = &typed.expr else {
            panic!("expected a delegate compare, got {:?}", typed.expr);
        };
        assert_eq!(**lhs, Expr::Constant(Constant::EmptyDelegate));
    }

    #[test]
    fn delegates_compare_with_each_other_only() {
        let mut fixture = Fixture::new();
        add_int_equality(&mut fixture);
        fixture.add_var(fixture.class, "OnTouch", PropertyType::delegate(None));
        fixture.add_var(fixture.class, "OnUntouch", PropertyType::delegate(None));
        fixture.add_var(fixture.class, "Count", int());

        let typed = fixture.compile("OnTouch == OnUntouch", &PropertyType::none()).unwrap().into_typed().unwrap();
        assert!(matches!(typed.expr, Expr::DelegateCompare { equal: true, .. }));

        let err = fixture.compile("OnTouch == Count", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Left type is incompatible with '=='");
        let err = fixture.compile("OnTouch < OnUntouch", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Types are incompatible with '<'");
    }

    #[test]
    fn constant_operand_is_kept() {
        let mut fixture = Fixture::new();
        let typed = fixture.compile("2 < 3", &PropertyType::none()).unwrap().into_typed().unwrap();
        let (_, args) = call_of(&typed);
        assert_eq!(args[0], Expr::Constant(Constant::Int(2)));
        assert_eq!(typed.ty.kind, PropertyKind::Bool);
    }
}
