//! Identifier resolution: variables, enum tags, named consts, delegates and
//! function calls, with the `default.`, `static.`, `const.`, `global.` and
//! `super.` modifiers.

use unrealscript_core::{FieldRef, FunctionFlags, Name, PropertyFlags, PropertyId, PropertyKind, PropertyType, StructId};
use unrealscript_parser::TokenKind;

use super::Typed;
use crate::context::{CompilerContext, Result};
use crate::ir::{Constant, ContextKind, Expr, VariableAccess};
use crate::tokens::ScriptToken;

/// Where an identifier is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldScope {
    pub scope: StructId,
    /// Members of the running object, not of a context expression.
    pub is_self: bool,
    /// Instance members are reachable, not only defaults and statics.
    pub concrete: bool,
}

/// Prefix keyword before a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Plain,
    Default,
    Static,
    Const,
    Global,
    /// `super.` binds virtually from the parent scope; `super(Class).` binds final.
    Super { force_final: bool },
}

impl Modifier {
    /// The kind of field the modifier demands, as named in diagnostics.
    fn wanted(self) -> Option<&'static str> {
        match self {
            Modifier::Plain => None,
            Modifier::Default => Some("Property"),
            Modifier::Const => Some("Const"),
            Modifier::Static | Modifier::Global | Modifier::Super { .. } => Some("Function"),
        }
    }
}

/// How a resolved function is being called.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CallStyle {
    pub force_final: bool,
    pub global: bool,
    pub super_call: bool,
    pub is_static: bool,
    /// Called through this delegate property rather than the function's own.
    pub delegate: Option<PropertyId>,
}

impl<'a> CompilerContext<'a> {
    /// Resolve `token` (and any modifier it starts) as a field of `at.scope`.
    ///
    /// Returns `None` with nothing consumed when the identifier names no
    /// usable field and carries no modifier.
    pub(crate) fn compile_field_expr(
        &mut self,
        mut at: FieldScope,
        required: &PropertyType,
        token: &ScriptToken<'a>,
    ) -> Result<Option<Typed>> {
        if token.is_constant() || token.kind() != TokenKind::Identifier {
            return Ok(None);
        }
        let retry = self.lexer.mark();
        let mut modifier = Modifier::Plain;
        let mut word = token.lexeme();

        if token.is_identifier("default") {
            modifier = Modifier::Default;
            self.require_symbol(".", "'default'")?;
        } else if token.is_identifier("static") {
            modifier = Modifier::Static;
            self.require_symbol(".", "'static'")?;
        } else if token.is_identifier("const") {
            modifier = Modifier::Const;
            self.require_symbol(".", "'const'")?;
        } else if token.is_identifier("global") {
            if !at.is_self {
                return Err(self.syntax_error("Can only use 'global' with self"));
            }
            if !at.concrete {
                return Err(self.syntax_error("Can only use 'global' with concrete objects"));
            }
            modifier = Modifier::Global;
            at.scope = self.registry.class_of(at.scope);
            at.is_self = false;
            self.require_symbol(".", "'global'")?;
        } else if token.is_identifier("super") && !self.peek_symbol("(")? {
            if !at.is_self {
                return Err(self.syntax_error("Can only use 'super' with self"));
            }
            at.scope = self.super_scope(at.scope)?;
            modifier = Modifier::Super { force_final: false };
            at.is_self = false;
            self.require_symbol(".", "'super'")?;
        } else if token.is_identifier("super") {
            if !at.is_self {
                return Err(self.syntax_error("Can only use 'super(classname)' with self"));
            }
            self.require_symbol("(", "'super'")?;
            let Some(class_token) = self.get_identifier()? else {
                return Err(self.syntax_error("Missing class name"));
            };
            let Some(named) = self.registry.find_class(class_token.lexeme) else {
                return Err(self.syntax_error(format!("Bad class name '{}'", class_token.lexeme)));
            };
            if !self.registry.is_child_of(self.class, named) {
                return Err(self.syntax_error(format!(
                    "'Super(classname)': class '{}' does not expand '{}'",
                    self.class_name, class_token.lexeme
                )));
            }
            self.require_symbol(")", "'super(classname)'")?;
            self.require_symbol(".", "'super(classname)'")?;
            at.scope = named;
            modifier = Modifier::Super { force_final: true };
            at.is_self = false;
        }

        if modifier != Modifier::Plain {
            let next = self.lexer.next_token(true)?;
            if next.kind != TokenKind::Identifier {
                return Err(self.unknown_field(modifier, next.lexeme, at.scope));
            }
            word = next.lexeme;
        }

        let (mut field, use_outer) = self.find_scoped_field(at.scope, word, modifier);
        if let Some(FieldRef::Property(id)) = field {
            self.mark_local_referenced(id);
        }

        // A delegate property followed by `(` calls through the property.
        let mut delegate = None;
        if let Some(FieldRef::Property(id)) = field {
            let ty = &self.registry.property(id).ty;
            let (kind, target) = (ty.kind, ty.function);
            if kind == PropertyKind::Delegate && self.peek_symbol("(")? {
                if let Some(function) = target {
                    delegate = Some(id);
                    field = Some(FieldRef::Struct(function));
                }
            }
        }
        // A delegate function not being called names its property.
        if let Some(FieldRef::Struct(id)) = field {
            let is_delegate = self.registry.struct_def(id).function_flags().contains(FunctionFlags::DELEGATE);
            if is_delegate && !self.peek_symbol("(")? {
                field = self.delegate_property_of(id).map(FieldRef::Property);
            }
        }

        match field {
            Some(FieldRef::Enum(id)) if self.match_symbol(".")? => self.compile_enum_tag(id).map(Some),
            Some(FieldRef::Property(id)) => {
                let typed = self.compile_variable(id, at, modifier)?;
                self.wrap_outer(typed, use_outer).map(Some)
            }
            Some(FieldRef::Struct(id))
                if self.registry.struct_def(id).is_function() && required.kind == PropertyKind::Delegate =>
            {
                let typed = self.compile_delegate_value(id, required)?;
                self.wrap_outer(typed, use_outer).map(Some)
            }
            Some(FieldRef::Struct(id)) if self.registry.struct_def(id).is_function() && self.match_symbol("(")? => {
                let style = CallStyle {
                    force_final: matches!(modifier, Modifier::Super { force_final: true }),
                    global: modifier == Modifier::Global,
                    super_call: matches!(modifier, Modifier::Super { .. }),
                    is_static: modifier == Modifier::Static,
                    delegate,
                };
                let typed = self.compile_call(id, word, at, style)?;
                self.wrap_outer(typed, use_outer).map(Some)
            }
            Some(FieldRef::Const(id)) => {
                let (constant, ty) = self.resolve_const(id, Some(required))?;
                let (constant, ty) = self.attempt_to_convert(constant, ty, required);
                Ok(Some(Typed::new(Expr::Constant(constant), ty).rvalue()))
            }
            _ => {
                if modifier != Modifier::Plain {
                    return Err(self.unknown_field(modifier, word, at.scope));
                }
                self.lexer.reset(retry);
                Ok(None)
            }
        }
    }

    fn unknown_field(&self, modifier: Modifier, word: &str, scope: StructId) -> unrealscript_core::CompilationError {
        let thing = modifier.wanted().unwrap_or("field");
        let kind = self.registry.struct_def(scope).kind().describe();
        self.syntax_error(format!(
            "Unknown {thing} '{word}' in '{kind} {}'",
            self.registry.path_name(scope)
        ))
    }

    /// The class or state a `super.` call binds from.
    fn super_scope(&self, scope: StructId) -> Result<StructId> {
        let mut owner = scope;
        while self.registry.struct_def(owner).is_function() {
            match self.registry.struct_def(owner).outer {
                Some(outer) => owner = outer,
                None => break,
            }
        }
        let def = self.registry.struct_def(owner);
        match (def.super_struct, def.outer) {
            (Some(parent), _) => Ok(parent),
            (None, Some(outer)) => Ok(outer),
            (None, None) => Err(self.syntax_error("Can't use 'super': no superclass")),
        }
    }

    /// Look `word` up in `scope`, then in the class the owner must live within.
    fn find_scoped_field(&self, scope: StructId, word: &str, modifier: Modifier) -> (Option<FieldRef>, bool) {
        let Some(name) = self.registry.find_name(word) else {
            return (None, false);
        };
        let wanted = |field: FieldRef| match modifier.wanted() {
            None => true,
            Some("Property") => matches!(field, FieldRef::Property(_)),
            Some("Const") => matches!(field, FieldRef::Const(_)),
            Some(_) => matches!(field, FieldRef::Struct(id) if self.registry.struct_def(id).is_function()),
        };

        let found = self.registry.find_field(scope, &name);
        if let Some(field) = found {
            return (wanted(field).then_some(field), false);
        }
        if modifier == Modifier::Plain {
            if let Some(FieldRef::Enum(id)) = self.registry.find_global_type(&name) {
                return (Some(FieldRef::Enum(id)), false);
            }
        }

        let owner = self.registry.class_of(scope);
        let within = self.registry.class_data(owner).and_then(|data| data.within);
        match within {
            Some(outer) if outer != self.registry.object_class() => {
                let found = self.registry.find_field(outer, &name).filter(|&field| wanted(field));
                (found, found.is_some())
            }
            _ => (None, false),
        }
    }

    /// Drop a local from every nest's unreferenced list.
    pub(crate) fn mark_local_referenced(&mut self, property: PropertyId) {
        for index in 0..self.nests.level() {
            if let Some(nest) = self.nests.get_mut(index) {
                nest.mark_referenced(property);
            }
        }
    }

    pub(crate) fn delegate_property_of(&self, function: StructId) -> Option<PropertyId> {
        let def = self.registry.struct_def(function);
        let outer = def.outer?;
        let name = self.registry.find_name(&format!("__{}__Delegate", def.name))?;
        match self.registry.find_own_field(outer, &name)? {
            FieldRef::Property(id) => Some(id),
            _ => None,
        }
    }

    fn compile_enum_tag(&mut self, id: unrealscript_core::EnumId) -> Result<Typed> {
        let enum_name = self.registry.enum_def(id).name.to_string();
        let Some(tag) = self.get_identifier()? else {
            return Err(self.syntax_error(format!("Missing enum tag after '{enum_name}'")));
        };
        let def = self.registry.enum_def(id);
        let index = if tag.is_identifier("EnumCount") {
            Some(def.count())
        } else {
            def.find_tag(tag.lexeme)
        };
        let Some(index) = index.and_then(|index| u8::try_from(index).ok()) else {
            return Err(self.syntax_error(format!("Missing enum tag after '{enum_name}'")));
        };
        Ok(Typed::new(Expr::Constant(Constant::Byte(index)), PropertyType::byte(Some(id))))
    }

    fn compile_variable(&mut self, id: PropertyId, at: FieldScope, modifier: Modifier) -> Result<Typed> {
        let property = self.registry.property(id);
        let owner = self.registry.class_of(property.outer);
        let owner_name = self.registry.struct_def(owner).name.to_string();
        let flags = property.flags();
        let name = property.name.clone();
        let outer_def = self.registry.struct_def(property.outer);
        let in_class = outer_def.is_class();
        let is_local = outer_def.is_function();

        let hidden = if flags.contains(PropertyFlags::PRIVATE) {
            owner != self.class
        } else if flags.contains(PropertyFlags::PROTECTED) {
            !self.registry.is_child_of(self.class, owner)
        } else {
            false
        };
        if hidden {
            return Err(self.syntax_error(format!("Can't access private variable '{name}' in '{owner_name}'")));
        }
        if modifier == Modifier::Default && !in_class {
            return Err(self.syntax_error("You can't access the default value of static and local variables"));
        }
        if !at.concrete && modifier != Modifier::Default && !is_local {
            return Err(self.syntax_error("You can only access default values of variables here"));
        }
        if flags.contains(PropertyFlags::DEPRECATED) {
            self.warn(1, format!("Reference to deprecated property '{name}'"));
        }

        let access = if modifier == Modifier::Default {
            VariableAccess::Default
        } else if is_local && flags.contains(PropertyFlags::OUT_PARM) && !flags.contains(PropertyFlags::RETURN_PARM) {
            VariableAccess::LocalOut
        } else if is_local {
            VariableAccess::Local
        } else {
            VariableAccess::Instance
        };
        let mut expr = Expr::Variable { access, property: id };
        let mut ty = self.registry.property(id).ty.clone().with_flags(PropertyFlags::OUT_PARM);
        ty.flags.remove(PropertyFlags::PARM | PropertyFlags::RETURN_PARM | PropertyFlags::OPTIONAL_PARM);
        if ty.kind == PropertyKind::Bool {
            expr = Expr::BoolVariable(expr.boxed());
        }

        let object_class = self.registry.object_class();
        if self.registry.property(id).outer == object_class {
            let scope_class = self.registry.class_of(at.scope);
            if name.matches("Class") {
                ty.meta_class = Some(scope_class);
            } else if name.matches("Outer") {
                ty.class = Some(self.class_within(scope_class));
            }
        }

        let mut typed = Typed::new(expr, ty);
        typed.property = Some(id);
        Ok(typed)
    }

    /// A function named where a delegate value is required.
    fn compile_delegate_value(&mut self, function: StructId, required: &PropertyType) -> Result<Typed> {
        if let Some(signature) = required.function {
            let matches = crate::conversion::delegate_signatures_match(self.registry, signature, function);
            if !matches {
                let name = self.friendly_name(function);
                let wanted = self.friendly_name(signature);
                return Err(self.syntax_error(format!("'{name}' mismatches delegate '{wanted}'")));
            }
        }
        let name = self.friendly_name(function);
        let expr = Expr::DelegateProperty(name);
        Ok(Typed::new(expr, PropertyType::delegate(required.function)))
    }

    pub(crate) fn friendly_name(&self, function: StructId) -> Name {
        let def = self.registry.struct_def(function);
        def.as_function()
            .map(|data| data.friendly_name.clone())
            .unwrap_or_else(|| def.name.clone())
    }

    /// Reach a member of the object this class lives within through `Outer`.
    fn wrap_outer(&mut self, mut typed: Typed, use_outer: bool) -> Result<Typed> {
        if !use_outer {
            return Ok(typed);
        }
        let object_class = self.registry.object_class();
        let outer_property = self
            .registry
            .find_name("Outer")
            .and_then(|name| self.registry.find_own_field(object_class, &name));
        let Some(FieldRef::Property(outer_property)) = outer_property else {
            return Err(self.internal_error("Object has no 'Outer' property"));
        };
        let size = self.context_size(&typed.ty, "Context expression")?;
        typed.expr = Expr::Context {
            kind: ContextKind::Object,
            object: Expr::Variable {
                access: VariableAccess::Instance,
                property: outer_property,
            }
            .boxed(),
            size,
            member: typed.expr.boxed(),
        };
        Ok(typed)
    }
}
