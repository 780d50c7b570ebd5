//! The class replication block.
//!
//! ```text
//! replication
//! {
//!     reliable if (Role == ROLE_Authority)
//!         Health, ClientNotify;
//! }
//! ```
//!
//! Each condition is compiled into the class script. Every variable and
//! function it lists is flagged for the network and remembers the offset
//! of its condition.

use unrealscript_core::{FieldRef, FunctionFlags, PropertyFlags, PropertyKind, PropertyType, Span, StructId};

use crate::context::{CompilerContext, Result};

/// Function flags the replication block sets.
const REPLICATED: FunctionFlags = FunctionFlags::NET.union(FunctionFlags::NET_RELIABLE);

impl<'a> CompilerContext<'a> {
    /// Undo what an earlier compile of `class` set from its replication block.
    pub(crate) fn reset_replication(&mut self, class: StructId) {
        let properties: Vec<_> = self.registry.struct_def(class).own_properties().collect();
        for id in properties {
            let property = self.registry.property_mut(id);
            property.ty.flags.remove(PropertyFlags::NET);
            property.rep_offset = None;
        }

        let mut pending: Vec<StructId> = self.registry.struct_def(class).own_structs().collect();
        while let Some(node) = pending.pop() {
            if self.registry.struct_def(node).is_state() {
                pending.extend(self.registry.struct_def(node).own_structs());
                continue;
            }
            if let Some(function) = self.registry.struct_mut(node).as_function_mut() {
                if function.rep_offset.take().is_some() {
                    function.flags.remove(REPLICATED);
                }
            }
        }
    }

    /// Compile the block whose body starts at `start`.
    pub(crate) fn compile_replication(&mut self, start: Span) -> Result<()> {
        let resume = self.lexer.mark();
        self.seek(start);
        while !self.match_symbol("}")? {
            self.compile_replication_statement()?;
        }
        self.lexer.reset(resume);
        Ok(())
    }

    /// `reliable|unreliable if (condition) name, name;`
    fn compile_replication_statement(&mut self) -> Result<()> {
        let reliable = if self.match_identifier("reliable")? {
            true
        } else if self.match_identifier("unreliable")? {
            false
        } else {
            return Err(self.syntax_error("Missing 'Reliable' or 'Unreliable'"));
        };
        self.require_identifier("if", "Replication statement")?;
        self.require_symbol("(", "Replication condition")?;

        let Ok(offset) = u16::try_from(self.code_len()) else {
            return Err(self.nest_error("Replication script is too large"));
        };
        let condition = self.expect_expr(&PropertyType::new(PropertyKind::Bool), "Replication condition")?;
        self.emit(&condition.expr)?;
        self.require_symbol(")", "Replication condition")?;

        loop {
            let Some(token) = self.get_identifier()? else {
                return Err(self.syntax_error("Missing variable name in replication definition"));
            };
            let Some(name) = self.registry.find_name(token.lexeme) else {
                return Err(self.syntax_error(format!(
                    "Unrecognized variable '{}' name in replication definition",
                    token.lexeme
                )));
            };

            match self.registry.find_field(self.class, &name) {
                Some(FieldRef::Property(id)) if self.registry.property(id).outer == self.class => {
                    self.replicate_property(id, offset)?;
                }
                Some(FieldRef::Struct(id)) if self.registry.struct_def(id).is_function() => {
                    self.replicate_function(id, reliable, offset)?;
                }
                _ => {
                    return Err(self.decl_error(format!(
                        "Bad variable or function '{name}' in replication definition"
                    )));
                }
            }

            if !self.match_symbol(",")? {
                break;
            }
        }
        self.require_symbol(";", "Replication definition")
    }

    fn replicate_property(&mut self, id: unrealscript_core::PropertyId, offset: u16) -> Result<()> {
        let property = self.registry.property(id);
        if property.rep_offset.is_some() {
            return Err(self.decl_error(format!(
                "Variable '{}' already has a replication definition",
                property.name
            )));
        }
        let property = self.registry.property_mut(id);
        property.ty.flags |= PropertyFlags::NET;
        property.rep_offset = Some(offset);
        Ok(())
    }

    fn replicate_function(&mut self, id: StructId, reliable: bool, offset: u16) -> Result<()> {
        let def = self.registry.struct_def(id);
        let name = def.name.to_string();
        let owner = self.registry.class_of(id);
        let base = if owner != self.class {
            Some(owner)
        } else {
            def.super_struct.map(|parent| self.registry.class_of(parent))
        };
        if let Some(base) = base {
            let base = self.registry.struct_def(base).name.to_string();
            return Err(self.decl_error(format!("Function '{name}' is defined in base class '{base}'")));
        }

        let function = self.function_data(id)?;
        if function.rep_offset.is_some() || function.flags.contains(FunctionFlags::NET) {
            return Err(self.decl_error(format!("Function '{name}' already has a replication definition")));
        }
        if function.flags.contains(FunctionFlags::NATIVE | FunctionFlags::FINAL) {
            return Err(self.decl_error("Native final functions may not be replicated"));
        }

        if let Some(function) = self.registry.struct_mut(id).as_function_mut() {
            function.flags |= FunctionFlags::NET;
            if reliable {
                function.flags |= FunctionFlags::NET_RELIABLE;
            }
            function.rep_offset = Some(offset);
        }
        Ok(())
    }
}
