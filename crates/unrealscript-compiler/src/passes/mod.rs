//! Compiler passes.
//!
//! - [`parse`]: Pass 1 - declarations, layout and the positions of every body
//! - [`compile`]: Pass 2 - bytecode for every function, state and the replication block
//!
//! Both passes run over one class through a [`CompilerContext`] the caller
//! builds for them, and both report through a [`PassOutput`]. The driver
//! decides what a failed pass means for the rest of the build.

pub mod compile;
pub mod parse;
mod post_parse;
mod replication;

pub use compile::CompilePass;
pub use parse::ParsePass;

use unrealscript_core::{ClassFlags, CompilationError, StructId};

use crate::context::{CompilerContext, Result};
use crate::nest::NestKind;

/// What one pass over one class produced.
#[derive(Debug, Default)]
pub struct PassOutput {
    /// Errors in the order they were found. Pass 2 stops at its first.
    pub errors: Vec<CompilationError>,
    /// Source lines the pass covered.
    pub lines: usize,
    /// Statements the pass read.
    pub statements: usize,
}

impl PassOutput {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<'a> CompilerContext<'a> {
    /// Fail when a base class with source has not reached `flag`.
    pub(crate) fn check_parents(&self, flag: ClassFlags) -> Result<()> {
        let mut current = self.registry.super_class(self.class);
        while let Some(parent) = current {
            let def = self.registry.struct_def(parent);
            let has_source = def.as_class().is_some_and(|data| data.source.is_some());
            if has_source && !def.class_flags().contains(flag) {
                return Err(self.class_error(format!(
                    "'{}' can't be compiled: Parent class '{}' has errors",
                    self.class_name, def.name
                )));
            }
            current = self.registry.super_class(parent);
        }
        Ok(())
    }

    /// End of input: the class nest must be the only one left open.
    pub(crate) fn finish_nesting(&mut self) -> Result<()> {
        match self.nests.level() {
            0 => Err(self.internal_error("Internal nest inconsistency")),
            1 => Err(self.class_error("Missing 'Class' definition")),
            2 => self.close_nest(Some(NestKind::Class), "'Class'"),
            _ => {
                let kind = self.nests.top_kind();
                Err(self.nest_error(format!("Unexpected end of script in '{}' block", kind.name())))
            }
        }
    }

    pub(crate) fn set_class_flags(&mut self, class: StructId, flags: ClassFlags) {
        if let Some(data) = self.registry.class_data_mut(class) {
            data.flags |= flags;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::Pass;
    use crate::diagnostics::Diagnostics;
    use crate::options::CompilerOptions;
    use std::sync::Arc;
    use unrealscript_core::FieldRef;
    use unrealscript_registry::{MetadataRegistry, SymbolRegistry};

    /// Runs whole passes over registered classes.
    pub(crate) struct PassFixture {
        pub registry: SymbolRegistry,
        pub metadata: MetadataRegistry,
        pub options: CompilerOptions,
        pub diagnostics: Diagnostics,
    }

    impl PassFixture {
        pub(crate) fn new() -> Self {
            Self::with_options(CompilerOptions::default())
        }

        pub(crate) fn with_options(options: CompilerOptions) -> Self {
            Self {
                registry: SymbolRegistry::new(),
                metadata: MetadataRegistry::new(),
                options,
                diagnostics: Diagnostics::new(2),
            }
        }

        /// Register `name` under `parent` (`Object` when `None`) with `source`.
        pub(crate) fn class(&mut self, name: &str, parent: Option<&str>, source: &str) -> StructId {
            let parent = match parent {
                Some(parent) => self.registry.find_class(parent),
                None => Some(self.registry.object_class()),
            };
            let source: Arc<str> = Arc::from(source);
            self.registry.register_class(name, parent, Some(source)).unwrap()
        }

        pub(crate) fn parse(&mut self, class: StructId) -> PassOutput {
            let source = self.registry.class_source(class).unwrap();
            self.metadata.begin(class);
            let mut context = CompilerContext::new(
                &mut self.registry,
                &mut self.metadata,
                &self.options,
                &mut self.diagnostics,
                class,
                &source,
                Pass::Parse,
            );
            ParsePass::new(&mut context).run()
        }

        pub(crate) fn compile(&mut self, class: StructId) -> PassOutput {
            let source = self.registry.class_source(class).unwrap();
            let mut context = CompilerContext::new(
                &mut self.registry,
                &mut self.metadata,
                &self.options,
                &mut self.diagnostics,
                class,
                &source,
                Pass::Compile,
            );
            CompilePass::new(&mut context).run()
        }

        /// Register, parse and compile `Test`, asserting both passes succeed.
        pub(crate) fn build(&mut self, source: &str) -> StructId {
            let class = self.class("Test", None, source);
            let parsed = self.parse(class);
            assert!(parsed.is_success(), "parse failed: {:?}", parsed.errors);
            let compiled = self.compile(class);
            assert!(compiled.is_success(), "compile failed: {:?}", compiled.errors);
            class
        }

        pub(crate) fn field(&self, scope: StructId, name: &str) -> Option<FieldRef> {
            let name = self.registry.find_name(name)?;
            self.registry.find_own_field(scope, &name)
        }

        pub(crate) fn struct_field(&self, scope: StructId, name: &str) -> StructId {
            match self.field(scope, name) {
                Some(FieldRef::Struct(id)) => id,
                other => panic!("no struct {name}: {other:?}"),
            }
        }

        pub(crate) fn property_field(&self, scope: StructId, name: &str) -> unrealscript_core::PropertyId {
            match self.field(scope, name) {
                Some(FieldRef::Property(id)) => id,
                other => panic!("no property {name}: {other:?}"),
            }
        }

        pub(crate) fn flags(&self, class: StructId) -> ClassFlags {
            self.registry.struct_def(class).class_flags()
        }
    }

    #[test]
    fn parent_with_errors_blocks_child() {
        let mut fixture = PassFixture::new();
        let base = fixture.class("Base", None, "class Base; var int ;");
        let test = fixture.class("Test", Some("Base"), "class Test extends Base;");
        assert!(!fixture.parse(base).is_success());
        let output = fixture.parse(test);
        assert_eq!(
            output.errors[0].message(),
            "'Test' can't be compiled: Parent class 'Base' has errors"
        );
    }

    #[test]
    fn sourceless_parents_count_as_parsed() {
        let mut fixture = PassFixture::new();
        let class = fixture.class("Test", None, "class Test;");
        assert!(fixture.parse(class).is_success());
        assert!(fixture.flags(class).contains(ClassFlags::PARSED));
    }
}
