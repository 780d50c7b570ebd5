//! Function calls: access checks, call binding and argument lists.

use unrealscript_core::{FunctionFlags, PropertyFlags, PropertyKind, PropertyType, StructId};

use super::{FieldScope, Outcome, Typed};
use super::identifiers::CallStyle;
use crate::context::{CompilerContext, Result};
use crate::ir::{CallTarget, Constant, Expr};
use crate::nest::Allow;

impl<'a> CompilerContext<'a> {
    /// Compile a call to `function`; the opening parenthesis has been read.
    pub(crate) fn compile_call(
        &mut self,
        function: StructId,
        word: &str,
        at: FieldScope,
        style: CallStyle,
    ) -> Result<Typed> {
        self.got_affector = true;
        let flags = self.registry.struct_def(function).function_flags();
        let function_name = self.registry.struct_def(function).name.to_string();

        self.check_function_access(function)?;
        if flags.contains(FunctionFlags::LATENT) {
            self.check_allow(&function_name, Allow::STATE_CMD)?;
        }
        if !flags.contains(FunctionFlags::STATIC) && !at.concrete {
            return Err(self.syntax_error("Can't call instance functions from within static functions"));
        }
        if style.is_static && !flags.contains(FunctionFlags::STATIC) {
            return Err(self.syntax_error(format!("Function '{function_name}' is not static")));
        }
        if flags.contains(FunctionFlags::ITERATOR) {
            self.check_allow(&function_name, Allow::ITERATOR)?;
            self.top_nest()?.allow.remove(Allow::ITERATOR);
        }

        let target = self.call_target(function, style)?;
        let (args, first_meta) = self.compile_call_args(function, word)?;

        let token = self.lexer.next_token(true)?;
        if token.is_eof() {
            return Err(self.syntax_error(format!("Call to '{word}': Bad expression or missing ')'")));
        }
        if !token.is_symbol(")") {
            return Err(self.syntax_error(format!("Call to '{word}': Bad '{}' or missing ')'", token.lexeme)));
        }

        let return_property = self.registry.return_property(function);
        let ty = match return_property {
            Some(property) => {
                let mut ty = self.registry.property(property).ty.clone();
                ty.flags.remove(PropertyFlags::PARM | PropertyFlags::OUT_PARM | PropertyFlags::RETURN_PARM);
                // `Spawn(class<T>)` returns a `T`.
                if word.eq_ignore_ascii_case("Spawn") {
                    if let Some(meta) = first_meta {
                        ty.class = Some(meta);
                    }
                }
                ty
            }
            None => PropertyType::none(),
        };

        let mut typed = Typed::new(Expr::Call { target, args }, ty);
        typed.return_property = return_property;
        Ok(typed)
    }

    /// Private and protected functions are only callable from related classes.
    fn check_function_access(&self, function: StructId) -> Result<()> {
        let flags = self.registry.struct_def(function).function_flags();
        let name = self.registry.struct_def(function).name.clone();
        let owner = self.registry.class_of(function);
        let owner_name = self.registry.struct_def(owner).name.to_string();

        if flags.contains(FunctionFlags::PRIVATE) && owner != self.class {
            return Err(self.syntax_error(format!("Can't access private function '{name}' in '{owner_name}'")));
        }
        if !flags.contains(FunctionFlags::PROTECTED) || self.registry.is_child_of(self.class, owner) {
            return Ok(());
        }
        if !self.registry.is_child_of(owner, self.class) {
            return Err(self.syntax_error(format!("Can't access protected function '{name}' in '{owner_name}'")));
        }
        // A subclass function is reachable if the same name is visible here.
        let scoped = self
            .registry
            .functions(self.class)
            .into_iter()
            .find(|&id| self.registry.struct_def(id).name == name);
        match scoped {
            None => Err(self.syntax_error(format!(
                "Can't access protected function '{name}' in '{owner_name}' (not in scope)"
            ))),
            Some(scoped) => {
                let scoped_owner = self.registry.class_of(scoped);
                let private = self.registry.struct_def(scoped).function_flags().contains(FunctionFlags::PRIVATE);
                if private && scoped_owner != self.class {
                    let scoped_owner_name = self.registry.struct_def(scoped_owner).name.to_string();
                    return Err(self.syntax_error(format!(
                        "Can't access private function '{name}' in '{scoped_owner_name}' ({owner_name}::{name} is not in scope)"
                    )));
                }
                Ok(())
            }
        }
    }

    /// How the call binds: by native id, directly, globally, through a delegate or by name.
    fn call_target(&self, function: StructId, style: CallStyle) -> Result<CallTarget> {
        let def = self.registry.struct_def(function);
        let flags = def.function_flags();
        let native_index = def.as_function().map(|data| data.native_index).unwrap_or(0);
        let is_final = flags.contains(FunctionFlags::FINAL) || style.force_final;

        if is_final && native_index != 0 {
            return Ok(CallTarget::Native(native_index));
        }
        if is_final {
            return Ok(CallTarget::Final(function));
        }
        if style.global {
            return Ok(CallTarget::Global(def.name.clone()));
        }
        if flags.contains(FunctionFlags::DELEGATE) {
            let property = match style.delegate {
                Some(property) => property,
                None => self
                    .delegate_property_of(function)
                    .ok_or_else(|| self.internal_error(format!("Delegate '{}' has no property", def.name)))?,
            };
            let local = self.registry.struct_def(self.registry.property(property).outer).is_function();
            return Ok(CallTarget::Delegate {
                local,
                property,
                name: def.name.clone(),
            });
        }
        Ok(CallTarget::Virtual {
            super_call: style.super_call,
            name: def.name.clone(),
        })
    }

    /// Parse the arguments up to (not including) `)`.
    ///
    /// Also returns the metaclass of a constant class passed first, which
    /// retypes the second argument of `class, out object` iterators and the
    /// result of `Spawn`.
    fn compile_call_args(&mut self, function: StructId, word: &str) -> Result<(Vec<Expr>, Option<StructId>)> {
        let params = self.registry.parameters(function);
        let flags = self.registry.struct_def(function).function_flags();
        let class_class = self.registry.class_class();

        let iterator_cast = flags.contains(FunctionFlags::ITERATOR)
            && params.len() >= 2
            && {
                let first = &self.registry.property(params[0]).ty;
                let second = &self.registry.property(params[1]).ty;
                first.kind == PropertyKind::Object
                    && first.class == Some(class_class)
                    && second.kind == PropertyKind::Object
            };

        let mut args = Vec::with_capacity(params.len());
        let mut first_meta = None;
        for (index, &param) in params.iter().enumerate() {
            let mut required = self.registry.property(param).ty.clone();
            let optional = required.flags.contains(PropertyFlags::OPTIONAL_PARM);
            if index == 1 && iterator_cast {
                if let Some(meta) = first_meta {
                    required.class = Some(meta);
                }
            }

            if index != 0 && !self.match_symbol(",")? {
                if !optional {
                    return Err(self.syntax_error(format!(
                        "Call to '{word}': missing or bad parameter {}",
                        index + 1
                    )));
                }
                break;
            }

            match self.compile_expr(&required, None)? {
                Outcome::Mismatch(_) => {
                    return Err(self.syntax_error(format!("Call to '{word}': type mismatch in parameter {}", index + 1)));
                }
                Outcome::Empty => {
                    if !optional {
                        return Err(self.syntax_error(format!(
                            "Call to '{word}': bad or missing parameter {}",
                            index + 1
                        )));
                    }
                    args.push(Expr::EmptyParmValue);
                    if self.peek_symbol(")")? {
                        break;
                    }
                }
                Outcome::Value(mut value) => {
                    if required.is_out() {
                        value.expr.mark_modified();
                    }
                    if index == 0 {
                        if let Expr::Constant(Constant::Object(Some(_))) = value.expr {
                            first_meta = value.ty.meta_class;
                        }
                    }
                    args.push(value.expr);
                }
            }
        }

        // Omitted trailing optional parameters.
        while args.len() < params.len() {
            args.push(Expr::EmptyParmValue);
        }
        Ok((args, first_meta))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;
    use unrealscript_registry::{FunctionData, StructData};

    /// Add `function int Name(int A, optional int B)` to the test class.
    fn add_function(fixture: &mut Fixture, name: &str, flags: FunctionFlags) -> StructId {
        let interned = fixture.registry.intern(name);
        let mut data = FunctionData::new(interned.clone());
        data.flags = flags;
        data.num_parms = 3;
        let function = fixture
            .registry
            .add_struct(fixture.class, interned, StructData::Function(data), 1);
        let int = PropertyType::new(PropertyKind::Int);
        fixture.add_var(function, "A", int.clone().with_flags(PropertyFlags::PARM));
        fixture.add_var(
            function,
            "B",
            int.clone().with_flags(PropertyFlags::PARM | PropertyFlags::OPTIONAL_PARM),
        );
        fixture.add_var(
            function,
            "ReturnValue",
            int.with_flags(PropertyFlags::PARM | PropertyFlags::OUT_PARM | PropertyFlags::RETURN_PARM),
        );
        function
    }

    // ==========================================================================
    // Binding
    // ==========================================================================

    #[test]
    fn virtual_call_with_omitted_optional() {
        let mut fixture = Fixture::new();
        add_function(&mut fixture, "G", FunctionFlags::empty());
        let typed = fixture
            .compile("G(5)", &PropertyType::none())
            .unwrap()
            .into_typed()
            .unwrap();
        let Expr::Call { target, args } = &typed.expr else {
            panic!("not a call");
        };
        assert!(matches!(target, CallTarget::Virtual { super_call: false, .. }));
        assert_eq!(args, &vec![Expr::int(5), Expr::EmptyParmValue]);
        assert_eq!(typed.ty.kind, PropertyKind::Int);
        assert!(!typed.is_lvalue());
    }

    #[test]
    fn final_call_binds_directly() {
        let mut fixture = Fixture::new();
        let g = add_function(&mut fixture, "G", FunctionFlags::FINAL);
        let typed = fixture
            .compile("G(1, 2)", &PropertyType::none())
            .unwrap()
            .into_typed()
            .unwrap();
        assert!(matches!(typed.expr, Expr::Call { target: CallTarget::Final(id), .. } if id == g));
    }

    #[test]
    fn missing_required_argument() {
        let mut fixture = Fixture::new();
        add_function(&mut fixture, "G", FunctionFlags::empty());
        let err = fixture.compile("G()", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Call to 'G': bad or missing parameter 1");
    }

    #[test]
    fn argument_type_mismatch() {
        let mut fixture = Fixture::new();
        add_function(&mut fixture, "G", FunctionFlags::empty());
        let err = fixture.compile("G('Name')", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Call to 'G': type mismatch in parameter 1");
    }

    #[test]
    fn missing_close_paren() {
        let mut fixture = Fixture::new();
        add_function(&mut fixture, "G", FunctionFlags::empty());
        let err = fixture.compile("G(1, 2, 3)", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Call to 'G': Bad ',' or missing ')'");
    }

    // ==========================================================================
    // Access
    // ==========================================================================

    #[test]
    fn static_modifier_requires_static_function() {
        let mut fixture = Fixture::new();
        add_function(&mut fixture, "G", FunctionFlags::empty());
        let err = fixture.compile("static.G(1)", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Function 'G' is not static");
    }

    #[test]
    fn private_function_of_parent() {
        let mut fixture = Fixture::new();
        let object = fixture.registry.object_class();
        let base = fixture.registry.register_class("Base", Some(object), None).unwrap();
        fixture.registry.struct_mut(fixture.class).super_struct = Some(base);
        let name = fixture.registry.intern("Hidden");
        let mut data = FunctionData::new(name.clone());
        data.flags = FunctionFlags::PRIVATE;
        fixture.registry.add_struct(base, name, StructData::Function(data), 1);
        let err = fixture.compile("Hidden()", &PropertyType::none()).unwrap_err();
        assert_eq!(err.message(), "Can't access private function 'Hidden' in 'Base'");
    }
}
