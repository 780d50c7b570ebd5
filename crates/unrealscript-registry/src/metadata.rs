//! Per-class compile metadata.
//!
//! Pass 1 records where every body starts and what text was deferred;
//! pass 2 and the defaults phase read it back. The whole table for a class
//! is dropped once its defaults are imported.

use rustc_hash::FxHashMap;

use unrealscript_core::{PropertyId, Span, StructId};

/// A default value for an optional parameter, as written in the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDefault {
    pub parameter: PropertyId,
    pub text: String,
    /// Location of `text` in the class source.
    pub span: Span,
}

/// What pass 1 learned about one function.
#[derive(Debug, Clone, Default)]
pub struct FunctionMetadata {
    /// First token of the body after its local declarations.
    pub body: Option<Span>,
    pub defaults: Vec<ParamDefault>,
}

/// Tags written after a property name, `var int X<ToolTip=Health>;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMetadata {
    pub tags: Vec<(String, String)>,
}

/// Side tables for one class.
#[derive(Debug, Clone, Default)]
pub struct ClassMetadata {
    pub functions: FxHashMap<StructId, FunctionMetadata>,
    /// First token of each state's code.
    pub states: FxHashMap<StructId, Span>,
    pub properties: FxHashMap<PropertyId, PropertyMetadata>,
    /// Native base classes named with `inherits(...)`.
    pub mi_bases: Vec<String>,
    /// First token inside the `replication {` block.
    pub replication: Option<Span>,
}

impl ClassMetadata {
    pub fn function(&self, function: StructId) -> Option<&FunctionMetadata> {
        self.functions.get(&function)
    }

    pub fn function_mut(&mut self, function: StructId) -> &mut FunctionMetadata {
        self.functions.entry(function).or_default()
    }

    /// Body start of a function or state.
    pub fn body_of(&self, node: StructId) -> Option<Span> {
        self.functions
            .get(&node)
            .and_then(|meta| meta.body)
            .or_else(|| self.states.get(&node).copied())
    }
}

/// Metadata for every class currently between pass 1 and defaults import.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    classes: FxHashMap<StructId, ClassMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: StructId) -> Option<&ClassMetadata> {
        self.classes.get(&class)
    }

    pub fn get_mut(&mut self, class: StructId) -> Option<&mut ClassMetadata> {
        self.classes.get_mut(&class)
    }

    /// Fresh metadata for a class entering pass 1; any earlier table is dropped.
    pub fn begin(&mut self, class: StructId) -> &mut ClassMetadata {
        let slot = self.classes.entry(class).or_default();
        *slot = ClassMetadata::default();
        slot
    }

    pub fn entry(&mut self, class: StructId) -> &mut ClassMetadata {
        self.classes.entry(class).or_default()
    }

    /// Tear down a class's metadata.
    pub fn remove(&mut self, class: StructId) -> Option<ClassMetadata> {
        self.classes.remove(&class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
