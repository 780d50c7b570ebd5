//! Function, event, delegate and operator declarations.
//!
//! A declaration creates the function node under the current class or
//! state, reads its parameters into the node and, when a body follows,
//! leaves the function nest open for the body's statements.
//!
//! Operators are named by their signature (`Add_IntInt`) so overloads of
//! one symbol can live side by side; the symbol itself is the friendly name.

use unrealscript_core::{
    ClassFlags, CompilationError, FieldRef, FunctionFlags, PropertyFlags, PropertyId, PropertyKind, PropertyType, Span,
    StructId,
};
use unrealscript_parser::{Token, TokenKind};
use unrealscript_registry::{FunctionData, ParamDefault, StructData};

use super::VarSite;
use crate::bytecode::{FIRST_NATIVE, MAX_NATIVE};
use crate::context::{CompilerContext, Result};
use crate::conversion::matches_type;
use crate::nest::{Allow, NestKind};

/// Parameters plus return value.
pub(crate) const MAX_FUNC_PARMS: u8 = 16;

/// Signature fragment for each character from `' '` onward.
const CPP_TAGS: [&str; 96] = [
    "Spc", "Not", "DoubleQuote", "Pound", "Concat", "Percent", "And", "SingleQuote", "OpenParen", "CloseParen",
    "Multiply", "Add", "Comma", "Subtract", "Dot", "Divide", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "Colon",
    "Semicolon", "Less", "Equal", "Greater", "Question", "At", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K",
    "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "OpenBracket", "Backslash",
    "CloseBracket", "Xor", "_", "Not", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "OpenBrace", "Or", "CloseBrace", "Complement", "Or",
];

/// Specifiers read before the function name.
struct FunctionHeader {
    flags: FunctionFlags,
    nest_name: Option<&'static str>,
    /// `reliable` or `unreliable`, as written.
    reliability: Option<&'static str>,
    precedence: u8,
    native_index: u16,
    /// Parameters an operator must have, return value included.
    expect_parms: u8,
}

impl FunctionHeader {
    fn new() -> Self {
        Self {
            flags: FunctionFlags::PUBLIC,
            nest_name: None,
            reliability: None,
            precedence: 0,
            native_index: 0,
            expect_parms: 0,
        }
    }

    fn is_operator(&self) -> bool {
        self.flags.contains(FunctionFlags::OPERATOR)
    }
}

impl<'a> CompilerContext<'a> {
    /// Compile a function declaration. Returns whether a `;` must follow.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(super) fn compile_function(&mut self) -> Result<bool> {
        let scope = self.scope();
        let header = self.function_specifiers()?;
        let Some(nest_name) = header.nest_name else {
            return Err(self.syntax_error("Missing 'function'"));
        };

        // A return type is any type word not directly followed by `(`.
        let start = self.lexer.mark();
        let mut return_type = None;
        if self.get_identifier()?.is_some() {
            let names_function = self.peek_symbol("(")?;
            self.lexer.reset(start);
            if !names_function {
                return_type = self.get_var_type(scope, PropertyFlags::all(), None)?;
            }
        }

        let Some(name_token) = self.function_name(&header)? else {
            return Err(self.syntax_error(format!("Missing {nest_name} name")));
        };
        let friendly = name_token.lexeme.to_string();
        if !self.match_symbol("(")? {
            return Err(self.syntax_error(format!("Bad {nest_name} definition")));
        }

        if header.flags.contains(FunctionFlags::NATIVE) {
            if header.native_index != 0 && !header.flags.contains(FunctionFlags::FINAL) {
                return Err(self.decl_error("Numbered native functions must be final"));
            }
        } else if header.flags.contains(FunctionFlags::LATENT) {
            return Err(self.decl_error("Only native functions may use 'Latent'"));
        } else if header.flags.contains(FunctionFlags::ITERATOR) {
            return Err(self.decl_error("Only native functions may use 'Iterator'"));
        }

        let signature = if header.is_operator() {
            self.operator_signature(scope, &friendly, header.flags)?
        } else {
            friendly.clone()
        };
        let function = self.declare_function(scope, &signature, &friendly, &header, name_token.span.line)?;
        let is_static = header.flags.contains(FunctionFlags::STATIC);
        self.push_nest(NestKind::Function, function, is_static)?;

        self.function_parameters(function, &header)?;
        if let Some(return_type) = return_type {
            let mut declared = return_type;
            declared.ty.flags |= PropertyFlags::PARM | PropertyFlags::OUT_PARM | PropertyFlags::RETURN_PARM;
            let site = VarSite::new("Function return type").named("ReturnValue").no_arrays();
            self.get_var_name_and_dim(function, &declared, site)?;
            self.function_data_mut(function)?.num_parms += 1;
        }
        if self.match_identifier("const")? {
            if !header.flags.contains(FunctionFlags::NATIVE) {
                return Err(self.decl_error("'const' is only valid for native functions"));
            }
            self.function_data_mut(function)?.flags |= FunctionFlags::CONST;
        }

        let num_parms = self.function_data(function)?.num_parms;
        if num_parms > MAX_FUNC_PARMS {
            return Err(self.decl_error(format!("'{signature}': too many parameters")));
        }
        if header.is_operator() {
            if num_parms != header.expect_parms {
                return Err(self.decl_error(format!(
                    "{nest_name} must have {} parameters",
                    header.expect_parms - 1
                )));
            }
            if self.registry.return_property(function).is_none() {
                return Err(self.decl_error("Operator must have a return value"));
            }
            if !header.flags.contains(FunctionFlags::FINAL) {
                return Err(self.decl_error("Operators must be declared as 'Final'"));
            }
        }

        if header.flags.contains(FunctionFlags::DELEGATE) {
            self.declare_delegate_property(scope, function, &friendly);
        }

        let mut need_semicolon = true;
        if !self.peek_symbol(";")? {
            let native = header.flags.contains(FunctionFlags::NATIVE);
            self.function_data_mut(function)?.flags |= FunctionFlags::DEFINED;
            if native {
                return Err(self.decl_error("Native functions may only be declared, not defined"));
            }
            self.require_symbol("{", nest_name)?;
            need_semicolon = false;
        }

        self.bind_override(function, nest_name, &friendly)?;
        if header.native_index != 0 {
            if let Err(err) = self.registry.claim_native_id(header.native_index, function) {
                let path = self.registry.path_name(function);
                return Err(self.decl_error(format!("{path}: {err}")));
            }
        }

        if !self.function_data(function)?.flags.contains(FunctionFlags::DEFINED) {
            self.close_nest(Some(NestKind::Function), nest_name)?;
        }
        Ok(need_semicolon)
    }

    fn function_specifiers(&mut self) -> Result<FunctionHeader> {
        let mut header = FunctionHeader::new();
        while let Some(token) = self.get_identifier()? {
            match token.lexeme.to_ascii_lowercase().as_str() {
                "function" => {
                    self.check_allow("'Function'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "function")?;
                }
                "event" => {
                    self.check_allow("'Function'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "event")?;
                    header.flags |= FunctionFlags::EVENT;
                }
                "delegate" => {
                    self.check_allow("'Function'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "delegate")?;
                    header.flags |= FunctionFlags::DELEGATE;
                }
                "operator" => {
                    self.check_allow("'Operator'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "operator")?;
                    header.flags |= FunctionFlags::OPERATOR;
                    header.expect_parms = 3;
                    header.precedence = self.operator_precedence()?;
                }
                "preoperator" => {
                    self.check_allow("'PreOperator'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "preoperator")?;
                    header.flags |= FunctionFlags::OPERATOR | FunctionFlags::PRE_OPERATOR;
                    header.expect_parms = 2;
                }
                "postoperator" => {
                    self.check_allow("'PostOperator'", Allow::FUNCTION)?;
                    self.set_nest_name(&mut header, "postoperator")?;
                    header.flags |= FunctionFlags::OPERATOR;
                    header.expect_parms = 2;
                }
                "native" | "intrinsic" => {
                    header.flags |= FunctionFlags::NATIVE;
                    if self.match_symbol("(")? {
                        let id = self
                            .get_const_int("native")
                            .map_err(|_| self.syntax_error("Missing native id"))?;
                        header.native_index = u16::try_from(id)
                            .ok()
                            .filter(|&id| id >= u16::from(FIRST_NATIVE) && id < MAX_NATIVE)
                            .ok_or_else(|| self.decl_error(format!("Bad native function id {id}")))?;
                        if !self.match_symbol(")")? {
                            return Err(self.syntax_error("Missing ')' after internal id"));
                        }
                    }
                }
                "static" => {
                    if self.nests.top_kind() == NestKind::State {
                        return Err(self.decl_error("Static functions cannot exist in a state"));
                    }
                    header.flags |= FunctionFlags::STATIC;
                }
                "simulated" => header.flags |= FunctionFlags::SIMULATED,
                "iterator" => header.flags |= FunctionFlags::ITERATOR,
                "singular" => header.flags |= FunctionFlags::SINGULAR,
                "latent" => header.flags |= FunctionFlags::LATENT,
                "exec" => header.flags |= FunctionFlags::EXEC,
                "final" => header.flags |= FunctionFlags::FINAL,
                "server" => header.flags |= FunctionFlags::NET | FunctionFlags::NET_SERVER,
                "client" => header.flags |= FunctionFlags::NET | FunctionFlags::NET_CLIENT | FunctionFlags::SIMULATED,
                "reliable" => {
                    self.set_reliability(&mut header, "reliable")?;
                    header.flags |= FunctionFlags::NET_RELIABLE;
                }
                "unreliable" => {
                    self.set_reliability(&mut header, "unreliable")?;
                    header.flags.remove(FunctionFlags::NET_RELIABLE);
                }
                "private" => {
                    header.flags.remove(FunctionFlags::PUBLIC);
                    header.flags |= FunctionFlags::PRIVATE;
                }
                "protected" => {
                    header.flags.remove(FunctionFlags::PUBLIC);
                    header.flags |= FunctionFlags::PROTECTED;
                }
                "public" => header.flags |= FunctionFlags::PUBLIC,
                _ => {
                    self.lexer.rewind(&token);
                    break;
                }
            }
        }

        let networked = header.flags.intersects(FunctionFlags::NET_SERVER | FunctionFlags::NET_CLIENT);
        match header.reliability {
            None if networked => {
                return Err(self.decl_error("'server' and 'client' functions must be 'reliable' or 'unreliable'"));
            }
            Some(word) if !networked => {
                return Err(self.decl_error(format!("'{word}' is only valid for 'server' and 'client' functions")));
            }
            _ => {}
        }
        if header.flags.contains(FunctionFlags::NATIVE)
            && !self.registry.struct_def(self.class).class_flags().contains(ClassFlags::NATIVE)
        {
            return Err(self.decl_error("Native functions are only allowed in native classes"));
        }
        Ok(header)
    }

    /// Record the one `function`/`event`/`delegate`/operator keyword.
    fn set_nest_name(&self, header: &mut FunctionHeader, name: &'static str) -> Result<()> {
        if let Some(previous) = header.nest_name {
            return Err(self.decl_error(format!("'{name}': function type already given as '{previous}'")));
        }
        header.nest_name = Some(name);
        Ok(())
    }

    fn set_reliability(&self, header: &mut FunctionHeader, word: &'static str) -> Result<()> {
        match header.reliability {
            Some(previous) if previous != word => {
                Err(self.decl_error("Function can't be both 'reliable' and 'unreliable'"))
            }
            _ => {
                header.reliability = Some(word);
                Ok(())
            }
        }
    }

    /// `(N)` after `operator`.
    fn operator_precedence(&mut self) -> Result<u8> {
        if !self.match_symbol("(")? {
            return Err(self.syntax_error("Missing '(' and precedence after 'Operator'"));
        }
        let precedence = self
            .get_const_int("operator")
            .map_err(|_| self.syntax_error("Missing precedence value"))?;
        let precedence = u8::try_from(precedence).map_err(|_| self.decl_error("Bad precedence value"))?;
        if !self.match_symbol(")")? {
            return Err(self.syntax_error("Missing ')' after operator precedence"));
        }
        Ok(precedence)
    }

    /// The function's name; operators may also be named by a symbol.
    fn function_name(&mut self, header: &FunctionHeader) -> Result<Option<Token<'a>>> {
        if let Some(token) = self.get_identifier()? {
            return Ok(Some(token));
        }
        if header.is_operator() {
            let token = self.lexer.next_token(true)?;
            if token.kind == TokenKind::Symbol && !token.is_symbol("(") {
                return Ok(Some(token));
            }
            self.lexer.rewind(&token);
        }
        Ok(None)
    }

    /// `Add_IntInt` for `int + (int A, int B)`. Reads the parameter types
    /// ahead and rewinds, so the parameters are read again for real.
    fn operator_signature(&mut self, scope: StructId, symbol: &str, flags: FunctionFlags) -> Result<String> {
        let mut signature: String = symbol
            .chars()
            .map(|c| {
                let index = (c as usize).wrapping_sub(32);
                CPP_TAGS.get(index).copied().unwrap_or("_")
            })
            .collect();

        let start = self.lexer.mark();
        if !self.match_symbol(")")? {
            signature.push('_');
            if flags.contains(FunctionFlags::PRE_OPERATOR) {
                signature.push_str("Pre");
            }
            loop {
                let Some(declared) = self.get_var_type(scope, !PropertyFlags::PARM_FLAGS, Some("Function parameter"))? else {
                    return Err(self.syntax_error("Function parameter: Missing variable type"));
                };
                self.get_var_name_and_dim(scope, &declared, VarSite::new("Function parameter").skip(true))?;
                if self.match_symbol("=")? {
                    self.capture_parameter_default()?;
                }
                signature.push_str(&self.signature_type_name(&declared.ty));
                if !self.match_symbol(",")? {
                    break;
                }
            }
            self.require_symbol(")", "parameter list")?;
        }
        self.lexer.reset(start);
        Ok(signature)
    }

    fn signature_type_name(&self, ty: &PropertyType) -> String {
        let named = match ty.kind {
            PropertyKind::Object => ty.class,
            PropertyKind::Struct => ty.struct_def,
            _ => None,
        };
        if let Some(id) = named {
            return self.registry.struct_def(id).name.to_string();
        }
        match ty.kind {
            PropertyKind::Byte => "Byte",
            PropertyKind::Int => "Int",
            PropertyKind::Bool => "Bool",
            PropertyKind::Float => "Float",
            PropertyKind::Name => "Name",
            PropertyKind::String => "Str",
            PropertyKind::Delegate => "Delegate",
            PropertyKind::Interface => "Interface",
            PropertyKind::Map => "Map",
            PropertyKind::Object => "Object",
            PropertyKind::Struct => "Struct",
            PropertyKind::None => "None",
        }
        .to_string()
    }

    /// Create the function node, rejecting a clash with a non-function field.
    fn declare_function(
        &mut self,
        scope: StructId,
        signature: &str,
        friendly: &str,
        header: &FunctionHeader,
        line: u32,
    ) -> Result<StructId> {
        let name = self.intern(signature);
        if let Some(existing) = self.registry.find_own_field(scope, &name) {
            let is_function = matches!(existing, FieldRef::Struct(id) if self.registry.struct_def(id).is_function());
            if !is_function {
                let path = self.field_path(existing);
                return Err(self.decl_error(format!("'{signature}' conflicts with '{path}'")));
            }
        }

        let mut data = FunctionData::new(self.intern(friendly));
        data.flags = header.flags;
        data.oper_precedence = header.precedence;
        data.native_index = header.native_index;
        Ok(self.registry.add_struct(scope, name, StructData::Function(data), line))
    }

    /// `(Type Name [= default], ...)`.
    fn function_parameters(&mut self, function: StructId, header: &FunctionHeader) -> Result<()> {
        if self.match_symbol(")")? {
            return Ok(());
        }
        let native = header.flags.contains(FunctionFlags::NATIVE);
        let mut optional = false;
        loop {
            let Some(mut declared) = self.get_var_type(function, !PropertyFlags::PARM_FLAGS, Some("Function parameter"))?
            else {
                return Err(self.syntax_error("Function parameter: Missing variable type"));
            };
            declared.ty.flags |= PropertyFlags::PARM;
            let Some(parameter) = self.get_var_name_and_dim(function, &declared, VarSite::new("Function parameter"))? else {
                return Err(self.internal_error("Parameter was not declared"));
            };
            let num_parms = {
                let data = self.function_data_mut(function)?;
                data.num_parms += 1;
                data.num_parms
            };

            let flags = declared.ty.flags;
            if header.is_operator() && flags.intersects(!PropertyFlags::PARM_FLAGS) {
                return Err(self.decl_error("Operator parameters may not have modifiers"));
            }
            if declared.ty.kind == PropertyKind::Bool && flags.contains(PropertyFlags::OUT_PARM) {
                return Err(self.decl_error("Booleans may not be out parameters"));
            }
            if flags.contains(PropertyFlags::SKIP_PARM) && !(native && header.is_operator() && num_parms == 2) {
                return Err(self.decl_error("Only parameter 2 of native operators may be 'Skip'"));
            }

            if self.match_symbol("=")? {
                if header.is_operator() {
                    return Err(self.decl_error("Operator parameters may not have modifiers"));
                }
                let default = self.capture_parameter_default()?;
                self.registry.property_mut(parameter).ty.flags |= PropertyFlags::OPTIONAL_PARM;
                self.function_data_mut(function)?.flags |= FunctionFlags::HAS_DEFAULTS;
                self.metadata.entry(self.class).function_mut(function).defaults.push(ParamDefault {
                    parameter,
                    text: default.0,
                    span: default.1,
                });
            }

            let flags = self.registry.property(parameter).flags();
            if flags.contains(PropertyFlags::OPTIONAL_PARM) {
                optional = true;
                self.function_data_mut(function)?.flags |= FunctionFlags::HAS_OPTIONAL_PARMS;
            } else if optional {
                return Err(self.decl_error("After an optional parameters, all other parmeters must be optional"));
            }
            if flags.contains(PropertyFlags::OUT_PARM) {
                self.function_data_mut(function)?.flags |= FunctionFlags::HAS_OUT_PARMS;
            }

            if !self.match_symbol(",")? {
                break;
            }
        }
        self.require_symbol(")", "parameter list")
    }

    /// Text of a default value up to the `,` or `)` that ends it.
    fn capture_parameter_default(&mut self) -> Result<(String, Span)> {
        let first = self.lexer.peek_token(true)?;
        let mut end = first.span.offset;
        let mut depth = 0u32;
        loop {
            let token = self.lexer.next_token(true)?;
            if token.is_eof() {
                return Err(self.syntax_error("Missing ')' in parameter list"));
            }
            if depth == 0 && (token.is_symbol(",") || token.is_symbol(")")) {
                self.lexer.rewind(&token);
                break;
            }
            if token.is_symbol("(") {
                depth += 1;
            } else if token.is_symbol(")") {
                depth -= 1;
            }
            end = token.span.offset + token.span.len;
        }
        if end == first.span.offset {
            return Err(self.syntax_error("Missing default value for optional parameter"));
        }
        let text = self.lexer.slice(first.span.offset, end).to_string();
        let span = Span {
            len: end - first.span.offset,
            ..first.span
        };
        Ok((text, span))
    }

    /// The `__Name__Delegate` property that holds a delegate's current target.
    fn declare_delegate_property(&mut self, scope: StructId, function: StructId, friendly: &str) {
        let friendly_name = self.intern(friendly);
        for property in self.pending_delegates(self.class) {
            if self.registry.property(property).delegate_name.as_ref() == Some(&friendly_name) {
                let property = self.registry.property_mut(property);
                property.ty.function = Some(function);
                property.delegate_name = None;
                log::debug!("Fixed up delegate reference {} to {friendly}", property.name);
            }
        }

        let name = self.intern(&format!("__{friendly}__Delegate"));
        if self.registry.find_own_field(scope, &name).is_some() {
            return;
        }
        let children = &self.registry.struct_def(scope).children;
        let index = children
            .iter()
            .rposition(|field| matches!(field, FieldRef::Property(_)))
            .map_or(0, |last| last + 1);
        let line = self.lexer.line();
        self.registry
            .insert_property(scope, index, name, PropertyType::delegate(Some(function)), line);
    }

    /// Delegate properties in `root` and everything inside it still waiting
    /// for their function.
    fn pending_delegates(&self, root: StructId) -> Vec<PropertyId> {
        let mut pending = Vec::new();
        let mut scopes = vec![root];
        while let Some(scope) = scopes.pop() {
            for &field in &self.registry.struct_def(scope).children {
                match field {
                    FieldRef::Property(id) => {
                        let property = self.registry.property(id);
                        if property.ty.kind == PropertyKind::Delegate && property.delegate_name.is_some() {
                            pending.push(id);
                        }
                    }
                    FieldRef::Struct(id) => scopes.push(id),
                    FieldRef::Enum(_) | FieldRef::Const(_) => {}
                }
            }
        }
        pending
    }

    /// Find the function this one overrides, checking that it's compatible.
    fn bind_override(&mut self, function: StructId, nest_name: &str, friendly: &str) -> Result<()> {
        let level = self.nests.level();
        let scopes: Vec<StructId> = (1..level.saturating_sub(1))
            .rev()
            .filter_map(|index| self.nests.get(index))
            .filter(|nest| nest.kind.is_node())
            .map(|nest| nest.node)
            .collect();
        let name = self.registry.struct_def(function).name.clone();
        let own_scope = self.registry.struct_def(function).outer;

        for scope in scopes {
            for overridden in self.registry.functions(scope) {
                if overridden == function || self.registry.struct_def(overridden).name != name {
                    continue;
                }
                let theirs = self.function_data(overridden)?.clone();
                let ours = self.function_data(function)?.clone();
                if theirs.flags.contains(FunctionFlags::PRIVATE) {
                    self.registry.struct_mut(function).super_struct = None;
                    return Ok(());
                }
                let fixity = FunctionFlags::OPERATOR | FunctionFlags::PRE_OPERATOR;
                if (theirs.flags ^ ours.flags).intersects(fixity) {
                    continue;
                }

                if theirs.oper_precedence != ours.oper_precedence && theirs.num_parms == ours.num_parms {
                    return Err(self.decl_error("Overloaded operator differs in precedence"));
                }
                let their_return = self.registry.return_property(overridden).is_some();
                let our_return = self.registry.return_property(function).is_some();
                if theirs.num_parms != ours.num_parms || their_return != our_return {
                    return Err(self.decl_error(format!("Redefinition of '{nest_name} {friendly}' differs from original")));
                }
                if !self.parameters_match(function, overridden, nest_name, friendly, ours.flags)? {
                    continue;
                }

                let flags = ours.flags | (theirs.flags & FunctionFlags::FUNC_INHERIT);
                if (theirs.flags & FunctionFlags::OVERRIDE_MATCH) != (flags & FunctionFlags::OVERRIDE_MATCH) {
                    return Err(self.decl_error(format!("Function '{name}' specifiers differ from original")));
                }
                if self.registry.struct_def(overridden).outer == own_scope {
                    return Err(self.decl_error(format!("Duplicate function '{name}'")));
                }
                if theirs.flags.contains(FunctionFlags::FINAL) {
                    return Err(self.decl_error(format!("{name}: Can't override a 'final' function")));
                }

                self.function_data_mut(function)?.flags = flags;
                self.registry.struct_mut(function).super_struct = Some(overridden);
                return Ok(());
            }
        }
        Ok(())
    }

    /// Compare parameters and return value pairwise. `false` means the two
    /// are different operator overloads.
    fn parameters_match(
        &self,
        function: StructId,
        overridden: StructId,
        nest_name: &str,
        friendly: &str,
        flags: FunctionFlags,
    ) -> Result<bool> {
        let ours: Vec<_> = self.registry.struct_def(function).own_properties().collect();
        let theirs: Vec<_> = self.registry.struct_def(overridden).own_properties().collect();
        let count = usize::from(self.function_data(overridden)?.num_parms);
        for (&mine, &other) in ours.iter().zip(theirs.iter()).take(count) {
            let mine = self.registry.property(mine);
            let other = &self.registry.property(other).ty;
            if matches_type(self.registry, &mine.ty, other, true) {
                continue;
            }
            if mine.is_return_value() {
                return Err(self.decl_error(format!("Redefinition of {nest_name} {friendly} differs only by return type")));
            }
            if !flags.contains(FunctionFlags::OPERATOR) {
                return Err(self.decl_error(format!("Redefinition of '{nest_name} {friendly}' differs from original")));
            }
            return Ok(false);
        }
        Ok(true)
    }

    pub(crate) fn function_data(&self, function: StructId) -> Result<&FunctionData> {
        let span = self.lexer.here();
        self.registry
            .struct_def(function)
            .as_function()
            .ok_or_else(|| CompilationError::internal(span, "Expected a function node"))
    }

    pub(crate) fn function_data_mut(&mut self, function: StructId) -> Result<&mut FunctionData> {
        let span = self.lexer.here();
        self.registry
            .struct_mut(function)
            .as_function_mut()
            .ok_or_else(|| CompilationError::internal(span, "Expected a function node"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ParseFixture;
    use super::*;

    fn parse(source: &str) -> (ParseFixture, StructId) {
        let mut fixture = ParseFixture::new();
        let class = fixture.parse_test(source).unwrap();
        (fixture, class)
    }

    fn parse_err(source: &str) -> String {
        let mut fixture = ParseFixture::new();
        fixture.parse_test(source).unwrap_err().message()
    }

    fn data(fixture: &ParseFixture, function: StructId) -> &FunctionData {
        fixture.registry.struct_def(function).as_function().unwrap()
    }

    /// `Base` with `base`, then `Test extends Base` with `source`.
    fn parse_derived(base: &str, source: &str) -> (ParseFixture, std::result::Result<StructId, CompilationError>) {
        let mut fixture = ParseFixture::new();
        let base_class = fixture.class("Base", None);
        fixture.parse(base_class, base).unwrap();
        let class = fixture.class("Test", Some("Base"));
        let result = fixture.parse(class, source).map(|()| class);
        (fixture, result)
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    #[test]
    fn declared_function() {
        let (fixture, class) = parse("class Test; function int Add(int A, int B);");
        let add = fixture.function(class, "Add");
        let data = data(&fixture, add);
        assert_eq!(data.num_parms, 3);
        assert!(!data.flags.contains(FunctionFlags::DEFINED));
        assert!(fixture.registry.return_property(add).is_some());
        assert_eq!(fixture.registry.parameters(add).len(), 2);
        assert!(fixture.metadata.get(class).unwrap().function(add).unwrap().body.is_some());
    }

    #[test]
    fn defined_function_records_body_after_locals() {
        let source = "class Test; var int Before; function F() { local int X; X = 1; }";
        let (fixture, class) = parse(source);
        let f = fixture.function(class, "F");
        assert!(data(&fixture, f).flags.contains(FunctionFlags::DEFINED));
        assert!(fixture.field(f, "X").is_some());
        assert!(fixture.field(class, "Before").is_some());
        let body = fixture.metadata.get(class).unwrap().function(f).unwrap().body.unwrap();
        assert_eq!(body.offset as usize, source.find("X = 1").unwrap());
    }

    #[test]
    fn variables_must_precede_function_bodies() {
        assert_eq!(
            parse_err("class Test; function F() { } var int After;"),
            "'Var' is not allowed here"
        );
    }

    #[test]
    fn specifiers() {
        let (fixture, class) = parse("class Test; simulated final event Touched(); static private function Helper();");
        let touched = data(&fixture, fixture.function(class, "Touched")).flags;
        assert!(touched.contains(FunctionFlags::SIMULATED | FunctionFlags::FINAL | FunctionFlags::EVENT));
        let helper = data(&fixture, fixture.function(class, "Helper")).flags;
        assert!(helper.contains(FunctionFlags::STATIC | FunctionFlags::PRIVATE));
        assert!(!helper.contains(FunctionFlags::PUBLIC));
    }

    #[test]
    fn declaration_errors() {
        assert_eq!(parse_err("class Test; function ();"), "Missing function name");
        assert_eq!(parse_err("class Test; function F;"), "Bad function definition");
        assert_eq!(parse_err("class Test; final F();"), "Missing 'function'");
        assert_eq!(
            parse_err("class Test native; native(300) function F();"),
            "Numbered native functions must be final"
        );
        assert_eq!(parse_err("class Test; latent function F();"), "Only native functions may use 'Latent'");
        assert_eq!(parse_err("class Test; iterator function F();"), "Only native functions may use 'Iterator'");
        assert_eq!(
            parse_err("class Test native; native function F() { }"),
            "Native functions may only be declared, not defined"
        );
        assert_eq!(parse_err("class Test; var int F; function F();"), "'F' conflicts with 'Test.F'");
        assert_eq!(parse_err("class Test; function F(); function F();"), "Duplicate function 'F'");
    }

    #[test]
    fn one_function_kind_per_declaration() {
        assert_eq!(
            parse_err("class Test; event function F();"),
            "'function': function type already given as 'event'"
        );
        assert_eq!(
            parse_err("class Test; delegate event F();"),
            "'event': function type already given as 'delegate'"
        );
    }

    #[test]
    fn network_specifiers() {
        let (fixture, class) = parse("class Test; reliable server function Fire(); unreliable client function Hit();");
        let fire = data(&fixture, fixture.function(class, "Fire")).flags;
        assert!(fire.contains(FunctionFlags::NET | FunctionFlags::NET_SERVER | FunctionFlags::NET_RELIABLE));
        let hit = data(&fixture, fixture.function(class, "Hit")).flags;
        assert!(hit.contains(FunctionFlags::NET_CLIENT));
        assert!(!hit.contains(FunctionFlags::NET_RELIABLE));

        assert_eq!(
            parse_err("class Test; server function Fire();"),
            "'server' and 'client' functions must be 'reliable' or 'unreliable'"
        );
        assert_eq!(
            parse_err("class Test; reliable function Fire();"),
            "'reliable' is only valid for 'server' and 'client' functions"
        );
        assert_eq!(
            parse_err("class Test; reliable unreliable server function Fire();"),
            "Function can't be both 'reliable' and 'unreliable'"
        );
    }

    #[test]
    fn native_functions_need_a_native_class() {
        assert_eq!(
            parse_err("class Test; native function F();"),
            "Native functions are only allowed in native classes"
        );
        let (fixture, class) = parse("class Test native; native function F() const;");
        let flags = data(&fixture, fixture.function(class, "F")).flags;
        assert!(flags.contains(FunctionFlags::NATIVE | FunctionFlags::CONST));
        assert_eq!(
            parse_err("class Test; function F() const;"),
            "'const' is only valid for native functions"
        );
    }

    #[test]
    fn native_ids_must_be_in_range() {
        for id in [5, 111, 4096, 40000, 65000, 70000] {
            let source = format!("class Test native; native({id}) final function F();");
            assert_eq!(parse_err(&source), format!("Bad native function id {id}"), "{id}");
        }
        let (fixture, class) = parse("class Test native; native(112) final function Low(); native(4095) final function High();");
        assert_eq!(data(&fixture, fixture.function(class, "Low")).native_index, 112);
        assert_eq!(data(&fixture, fixture.function(class, "High")).native_index, 4095);
    }

    #[test]
    fn too_many_parameters() {
        let params: Vec<String> = (0..17).map(|i| format!("int P{i}")).collect();
        let source = format!("class Test; function F({});", params.join(", "));
        assert_eq!(parse_err(&source), "'F': too many parameters");
    }

    // ==========================================================================
    // Parameters
    // ==========================================================================

    #[test]
    fn parameter_checks() {
        assert_eq!(parse_err("class Test; function F(out bool B);"), "Booleans may not be out parameters");
        assert_eq!(
            parse_err("class Test; function F(skip int A);"),
            "Only parameter 2 of native operators may be 'Skip'"
        );
        assert_eq!(
            parse_err("class Test; function F(optional int A, int B);"),
            "After an optional parameters, all other parmeters must be optional"
        );
        assert_eq!(parse_err("class Test; function F(int A;"), "Missing ')' in parameter list");
    }

    #[test]
    fn parameter_defaults_are_captured() {
        let (fixture, class) = parse("class Test; function F(int A, optional int B = 5 + 2, optional int C);");
        let f = fixture.function(class, "F");
        let flags = data(&fixture, f).flags;
        assert!(flags.contains(FunctionFlags::HAS_DEFAULTS | FunctionFlags::HAS_OPTIONAL_PARMS));
        assert!(fixture.property_type(f, "B").flags.contains(PropertyFlags::OPTIONAL_PARM));
        let defaults = &fixture.metadata.get(class).unwrap().function(f).unwrap().defaults;
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].text, "5 + 2");
    }

    #[test]
    fn out_parameters_flag_the_function() {
        let (fixture, class) = parse("class Test; function F(out int A);");
        let f = fixture.function(class, "F");
        assert!(data(&fixture, f).flags.contains(FunctionFlags::HAS_OUT_PARMS));
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    #[test]
    fn operators_are_named_by_signature() {
        let (fixture, class) = parse(
            "class Test native; native(500) static final operator(20) int + (int A, int B); native(501) static final preoperator int - (int A);",
        );
        let add = fixture.function(class, "Add_IntInt");
        let data_add = data(&fixture, add);
        assert_eq!(data_add.friendly_name.as_str(), "+");
        assert_eq!(data_add.oper_precedence, 20);
        assert_eq!(data_add.native_index, 500);
        assert_eq!(fixture.registry.native_function(500), Some(add));
        let negate = fixture.function(class, "Subtract_PreInt");
        assert!(data(&fixture, negate).flags.contains(FunctionFlags::PRE_OPERATOR));
    }

    #[test]
    fn operator_signature_uses_struct_and_class_names() {
        let (fixture, class) = parse(
            "class Test; struct Vector { var float X, Y, Z; }; final operator(16) float Dot(Vector A, Vector B); final operator(24) bool == (Object A, Object B);",
        );
        assert!(fixture.field(class, "Dot_VectorVector").is_some());
        assert!(fixture.field(class, "EqualEqual_ObjectObject").is_some());
    }

    #[test]
    fn operator_errors() {
        assert_eq!(parse_err("class Test; operator(20) int + (int A, int B);"), "Operators must be declared as 'Final'");
        assert_eq!(parse_err("class Test; final operator(20) int + (int A);"), "operator must have 2 parameters");
        assert_eq!(parse_err("class Test; final operator(20) + (int A, int B, int C);"), "Operator must have a return value");
        assert_eq!(parse_err("class Test; final operator int + (int A, int B);"), "Missing '(' and precedence after 'Operator'");
        assert_eq!(parse_err("class Test; final operator(300) int + (int A, int B);"), "Bad precedence value");
        assert_eq!(
            parse_err("class Test; final operator(20) int + (int A, optional int B = 1);"),
            "Operator parameters may not have modifiers"
        );
    }

    #[test]
    fn native_ids_name_both_functions() {
        assert_eq!(
            parse_err("class Test native; native(300) final function One(); native(300) final function Two();"),
            "Test.Two: Native function id 300 is already in use by 'Test.One'"
        );
    }

    // ==========================================================================
    // Overrides
    // ==========================================================================

    #[test]
    fn override_links_to_parent_function() {
        let (fixture, result) = parse_derived(
            "class Base; exec function int Get(int A);",
            "class Test extends Base; function int Get(int A);",
        );
        let class = result.unwrap();
        let base = fixture.registry.find_class("Base").unwrap();
        let ours = fixture.function(class, "Get");
        assert_eq!(fixture.registry.struct_def(ours).super_struct, Some(fixture.function(base, "Get")));
        assert!(data(&fixture, ours).flags.contains(FunctionFlags::EXEC));
    }

    #[test]
    fn override_errors() {
        let cases = [
            ("class Base; function Get(int A);", "function Get();", "Redefinition of 'function Get' differs from original"),
            ("class Base; function int Get();", "function float Get();", "Redefinition of function Get differs only by return type"),
            ("class Base; final function Get();", "final function Get();", "Get: Can't override a 'final' function"),
            ("class Base; final function Get();", "function Get();", "Function 'Get' specifiers differ from original"),
            ("class Base; static function Get();", "function Get();", "Function 'Get' specifiers differ from original"),
        ];
        for (base, derived, expected) in cases {
            let (_, result) = parse_derived(base, &format!("class Test extends Base; {derived}"));
            assert_eq!(result.unwrap_err().message(), expected, "{derived}");
        }
    }

    #[test]
    fn private_functions_can_be_redefined() {
        let (fixture, result) = parse_derived(
            "class Base; private function Get(int A);",
            "class Test extends Base; function Get();",
        );
        let class = result.unwrap();
        assert_eq!(fixture.registry.struct_def(fixture.function(class, "Get")).super_struct, None);
    }

    // ==========================================================================
    // Delegates
    // ==========================================================================

    #[test]
    fn delegate_gets_a_companion_property() {
        let (fixture, class) = parse("class Test; var int A; delegate OnDone(int Code); function F();");
        let on_done = fixture.function(class, "OnDone");
        assert!(data(&fixture, on_done).flags.contains(FunctionFlags::DELEGATE));
        let ty = fixture.property_type(class, "__OnDone__Delegate");
        assert_eq!(ty.kind, PropertyKind::Delegate);
        assert_eq!(ty.function, Some(on_done));
    }
}
