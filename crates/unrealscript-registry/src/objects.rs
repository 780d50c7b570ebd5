//! The object graph: structs, properties, enums, consts and literal objects.
//!
//! Classes, states, functions and script structs are all [`StructDef`]s;
//! what distinguishes them is the [`StructData`] payload. Every struct owns
//! an ordered list of child fields, in declaration order (after stable
//! grouping, see [`crate::layout`]).

use std::sync::Arc;

use unrealscript_core::{
    ClassFlags, FieldRef, FunctionFlags, Name, PropertyFlags, PropertyType, StateFlags, StructFlags,
    StructId,
};

/// Which kind of struct a [`StructDef`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Class,
    State,
    Function,
    ScriptStruct,
}

impl StructKind {
    pub fn describe(self) -> &'static str {
        match self {
            StructKind::Class => "class",
            StructKind::State => "state",
            StructKind::Function => "function",
            StructKind::ScriptStruct => "struct",
        }
    }
}

/// A class, state, function or script struct.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: Name,
    /// Owning struct; `None` for classes.
    pub outer: Option<StructId>,
    /// Parent class, parent state, overridden function or base struct.
    pub super_struct: Option<StructId>,
    pub children: Vec<FieldRef>,
    /// Compiled bytecode.
    pub script: Vec<u8>,
    /// Byte size of the linked properties.
    pub properties_size: u32,
    pub min_alignment: u32,
    /// Declaration line.
    pub line: u32,
    pub data: StructData,
}

/// Kind-specific payload of a [`StructDef`].
#[derive(Debug, Clone)]
pub enum StructData {
    Class(ClassData),
    State(StateData),
    Function(FunctionData),
    ScriptStruct(ScriptStructData),
}

impl StructDef {
    pub fn new(name: Name, outer: Option<StructId>, data: StructData) -> Self {
        Self {
            name,
            outer,
            super_struct: None,
            children: Vec::new(),
            script: Vec::new(),
            properties_size: 0,
            min_alignment: 1,
            line: 0,
            data,
        }
    }

    pub fn kind(&self) -> StructKind {
        match self.data {
            StructData::Class(_) => StructKind::Class,
            StructData::State(_) => StructKind::State,
            StructData::Function(_) => StructKind::Function,
            StructData::ScriptStruct(_) => StructKind::ScriptStruct,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.data, StructData::Class(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self.data, StructData::State(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.data, StructData::Function(_))
    }

    pub fn is_script_struct(&self) -> bool {
        matches!(self.data, StructData::ScriptStruct(_))
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.data {
            StructData::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.data {
            StructData::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.data {
            StructData::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.data {
            StructData::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<&StateData> {
        match &self.data {
            StructData::State(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_state_mut(&mut self) -> Option<&mut StateData> {
        match &mut self.data {
            StructData::State(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_script_struct(&self) -> Option<&ScriptStructData> {
        match &self.data {
            StructData::ScriptStruct(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_script_struct_mut(&mut self) -> Option<&mut ScriptStructData> {
        match &mut self.data {
            StructData::ScriptStruct(data) => Some(data),
            _ => None,
        }
    }

    /// Class flags, or empty for non-classes.
    pub fn class_flags(&self) -> ClassFlags {
        self.as_class().map(|c| c.flags).unwrap_or_else(ClassFlags::empty)
    }

    /// Function flags, or empty for non-functions.
    pub fn function_flags(&self) -> FunctionFlags {
        self.as_function().map(|f| f.flags).unwrap_or_else(FunctionFlags::empty)
    }

    /// Properties declared directly in this struct.
    pub fn own_properties(&self) -> impl Iterator<Item = unrealscript_core::PropertyId> + '_ {
        self.children.iter().filter_map(|field| match field {
            FieldRef::Property(id) => Some(*id),
            _ => None,
        })
    }

    /// Child structs (functions, states, script structs) declared directly in this struct.
    pub fn own_structs(&self) -> impl Iterator<Item = StructId> + '_ {
        self.children.iter().filter_map(|field| match field {
            FieldRef::Struct(id) => Some(*id),
            _ => None,
        })
    }
}

/// Class-only data.
#[derive(Debug, Clone, Default)]
pub struct ClassData {
    pub flags: ClassFlags,
    /// Required outer class of instances.
    pub within: Option<StructId>,
    pub config_name: Option<Name>,
    /// `native(Header)` name.
    pub native_header: Option<String>,
    pub interfaces: Vec<StructId>,
    pub depends_on: Vec<Name>,
    pub hide_categories: Vec<Name>,
    pub auto_expand_categories: Vec<Name>,
    pub cpp_text: Option<String>,
    pub default_properties: Option<String>,
    pub guid: [u32; 4],
    /// Class source text; `None` for intrinsic classes.
    pub source: Option<Arc<str>>,
}

/// State-only data.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateData {
    pub flags: StateFlags,
    /// Offset of the first label entry, just past the `LabelTable` opcode.
    pub label_table_offset: Option<u16>,
}

/// Function-only data.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub flags: FunctionFlags,
    /// Operator symbol or plain name; the struct name holds the signature name for operators.
    pub friendly_name: Name,
    /// Native id; 0 for script functions.
    pub native_index: u16,
    pub oper_precedence: u8,
    /// Parameters plus return value.
    pub num_parms: u8,
    pub parms_size: u16,
    pub return_value_offset: Option<u16>,
    /// Offset of the replication condition in the class script.
    pub rep_offset: Option<u16>,
}

impl FunctionData {
    pub fn new(friendly_name: Name) -> Self {
        Self {
            flags: FunctionFlags::empty(),
            friendly_name,
            native_index: 0,
            oper_precedence: 0,
            num_parms: 0,
            parms_size: 0,
            return_value_offset: None,
            rep_offset: None,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.flags.contains(FunctionFlags::OPERATOR)
    }
}

/// Script-struct-only data.
#[derive(Debug, Clone, Default)]
pub struct ScriptStructData {
    pub flags: StructFlags,
    pub defaults_text: Option<String>,
    pub cpp_text: Option<String>,
    /// Struct defaults have gone through the importer.
    pub defaults_imported: bool,
}

/// A member variable, local, parameter or return value.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: Name,
    pub outer: StructId,
    pub ty: PropertyType,
    /// Byte offset within the owner, assigned at link.
    pub offset: u32,
    /// Bit within the shared slot, for bools.
    pub bool_mask: u32,
    /// Editor category.
    pub category: Name,
    /// Offset of the replication condition in the class script.
    pub rep_offset: Option<u16>,
    pub line: u32,
    /// Delegate function name awaiting resolution.
    pub delegate_name: Option<Name>,
}

impl Property {
    pub fn new(name: Name, outer: StructId, ty: PropertyType) -> Self {
        Self {
            name,
            outer,
            ty,
            offset: 0,
            bool_mask: 0,
            category: Name::none(),
            rep_offset: None,
            line: 0,
            delegate_name: None,
        }
    }

    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.ty.flags
    }

    pub fn is_parameter(&self) -> bool {
        self.ty.flags.contains(PropertyFlags::PARM)
    }

    pub fn is_return_value(&self) -> bool {
        self.ty.flags.contains(PropertyFlags::RETURN_PARM)
    }
}

/// An enumeration and its tags, `_MAX` included.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: Name,
    pub outer: StructId,
    pub tags: Vec<Name>,
}

impl EnumDef {
    /// Index of a tag, ignoring case.
    pub fn find_tag(&self, text: &str) -> Option<usize> {
        self.tags.iter().position(|tag| tag.matches(text))
    }

    /// Tags without the synthesized `_MAX`.
    pub fn count(&self) -> usize {
        match self.tags.last() {
            Some(last) if last.as_str().ends_with("_MAX") => self.tags.len() - 1,
            _ => self.tags.len(),
        }
    }

    /// Common tag prefix, cut at its last underscore, or the enum name.
    pub fn generate_prefix(name: &str, tags: &[&str]) -> String {
        let Some(first) = tags.first() else {
            return name.to_string();
        };
        let mut prefix_len = first.len();
        for tag in &tags[1..] {
            let common = first
                .bytes()
                .zip(tag.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            prefix_len = prefix_len.min(common);
        }
        let common = &first[..prefix_len];
        match common.rfind('_') {
            Some(cut) if cut > 0 => common[..cut].to_string(),
            _ => name.to_string(),
        }
    }
}

/// A named constant; the value is raw source text, tokenized where used.
#[derive(Debug, Clone)]
pub struct ConstDef {
    pub name: Name,
    pub outer: StructId,
    pub value: String,
    pub line: u32,
}

/// An object the host made available to `Class'Path'` literals.
#[derive(Debug, Clone)]
pub struct LiteralObject {
    pub class: StructId,
    pub path: String,
}
