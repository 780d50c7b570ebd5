//! State declarations and `ignores`.

use unrealscript_core::{FieldRef, FunctionFlags, StateFlags, StructId};
use unrealscript_registry::{layout, FunctionData, StateData, StructData};

use crate::context::{CompilerContext, Result};
use crate::nest::{Allow, NestKind};

impl<'a> CompilerContext<'a> {
    /// `[simulated] [auto] state[()] Name [extends Parent] {`.
    ///
    /// A state with the name of one in a base class overrides it and takes
    /// it as its super state.
    pub(super) fn compile_state(&mut self) -> Result<()> {
        self.check_allow("'State'", Allow::STATE)?;
        let mut flags = StateFlags::empty();
        let mut got_state = false;
        while let Some(token) = self.get_identifier()? {
            match token.lexeme.to_ascii_lowercase().as_str() {
                "state" if !got_state => {
                    got_state = true;
                    if self.match_symbol("(")? {
                        self.require_symbol(")", "'State'")?;
                        flags |= StateFlags::EDITABLE;
                    }
                }
                "simulated" if !got_state => flags |= StateFlags::SIMULATED,
                "auto" if !got_state => flags |= StateFlags::AUTO,
                _ => {
                    self.lexer.rewind(&token);
                    break;
                }
            }
        }
        if !got_state {
            return Err(self.syntax_error("Missing 'State'"));
        }

        let name_token = self.require_name("state")?;
        let name = self.intern(name_token.lexeme);
        let mut parent = self.find_state(&name);
        if let Some(existing) = parent {
            if self.registry.class_of(existing) == self.class {
                return Err(self.decl_error(format!("Duplicate state '{name}'")));
            }
        }
        if let Some(field) = self.registry.find_own_field(self.class, &name) {
            let path = self.field_path(field);
            return Err(self.decl_error(format!("'{name}' conflicts with '{path}'")));
        }

        if self.match_identifier("extends")? {
            if parent.is_some() {
                return Err(self.decl_error(format!(
                    "'Extends' not allowed here: state '{name}' overrides version in parent class"
                )));
            }
            let Some(parent_token) = self.get_identifier()? else {
                return Err(self.syntax_error("Missing parent state name"));
            };
            let parent_name = self.intern(parent_token.lexeme);
            parent = self.find_state(&parent_name);
            if parent.is_none() {
                return Err(self.decl_error(format!("'extends': Parent state '{parent_name}' not found")));
            }
        }

        let data = StateData {
            flags,
            label_table_offset: None,
        };
        let state = self
            .registry
            .add_struct(self.class, name, StructData::State(data), name_token.span.line);
        self.registry.struct_mut(state).super_struct = parent;
        self.push_nest(NestKind::State, state, false)?;
        self.require_symbol("{", "'State'")
    }

    /// A state visible from the class, its own or inherited.
    fn find_state(&self, name: &unrealscript_core::Name) -> Option<StructId> {
        match self.registry.find_field(self.class, name)? {
            FieldRef::Struct(id) if self.registry.struct_def(id).is_state() => Some(id),
            _ => None,
        }
    }

    /// `ignores A, B;` inside a state. Each function gets an empty stub in
    /// the state that overrides it.
    pub(super) fn compile_ignores(&mut self) -> Result<()> {
        self.check_allow("'Ignores'", Allow::IGNORES)?;
        let state = self.scope();
        loop {
            let Some(token) = self.get_identifier()? else {
                return Err(self.syntax_error("'Ignores': Missing function name"));
            };
            let Some(overridden) = self.find_ignorable(token.lexeme) else {
                return Err(self.decl_error(format!("'Ignores': '{}' is not a function", token.lexeme)));
            };
            let theirs = self.function_data(overridden)?.clone();
            if theirs.flags.contains(FunctionFlags::FINAL) {
                let name = &self.registry.struct_def(overridden).name;
                return Err(self.decl_error(format!("'{name}': Cannot ignore final functions")));
            }
            self.ignore_function(state, overridden, &theirs, token.span.line);

            if !self.match_symbol(",")? {
                return Ok(());
            }
        }
    }

    /// The function named `text` in the scopes enclosing the current one.
    fn find_ignorable(&self, text: &str) -> Option<StructId> {
        let name = self.registry.find_name(text)?;
        let level = self.nests.level();
        (1..level.saturating_sub(1))
            .rev()
            .filter_map(|index| self.nests.get(index))
            .filter(|nest| nest.kind.is_node())
            .flat_map(|nest| self.registry.functions(nest.node))
            .find(|&function| self.registry.struct_def(function).name == name)
    }

    fn ignore_function(&mut self, state: StructId, overridden: StructId, theirs: &FunctionData, line: u32) {
        let name = self.registry.struct_def(overridden).name.clone();
        let mut data = FunctionData::new(theirs.friendly_name.clone());
        data.flags = theirs.flags & FunctionFlags::OVERRIDE_MATCH;
        data.num_parms = theirs.num_parms;
        let stub = self.registry.add_struct(state, name, StructData::Function(data), line);
        self.registry.struct_mut(stub).super_struct = Some(overridden);

        let parameters: Vec<_> = self
            .registry
            .struct_def(overridden)
            .own_properties()
            .filter(|&id| self.registry.property(id).is_parameter())
            .collect();
        for parameter in parameters {
            let property = self.registry.property(parameter);
            let (name, ty) = (property.name.clone(), property.ty.clone());
            self.registry.add_property(stub, name, ty, line);
        }
        layout::link(self.registry, stub);
        log::trace!("Ignoring {} in {}", self.registry.path_name(overridden), self.registry.path_name(state));
    }
}
