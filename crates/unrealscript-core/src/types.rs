//! Property type descriptors.
//!
//! [`PropertyType`] is the compiler's description of a value: the kind, the
//! array dimension, the referenced enum/class/struct/function and the
//! property flags. Tokens, expressions, parameters and declared variables
//! all carry one.
//!
//! ## Array dimension
//!
//! | `array_dim` | Meaning |
//! |---|---|
//! | `1` | scalar |
//! | `0` | dynamic array of the element type |
//! | `-1` | map (key type in `map_key`) |
//! | `>1` | static array of that many elements |

use std::fmt;

use crate::flags::PropertyFlags;
use crate::ids::{EnumId, StructId};

/// The base kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyKind {
    #[default]
    None,
    Byte,
    Int,
    Bool,
    Float,
    Object,
    Name,
    Delegate,
    Interface,
    Struct,
    String,
    Map,
}

impl PropertyKind {
    /// Size in bytes of one element, for kinds whose size doesn't depend on a struct.
    pub fn fixed_size(self) -> Option<u32> {
        match self {
            PropertyKind::None => Some(0),
            PropertyKind::Byte => Some(1),
            PropertyKind::Int | PropertyKind::Bool | PropertyKind::Float | PropertyKind::Object => {
                Some(4)
            }
            PropertyKind::Name | PropertyKind::Interface => Some(8),
            PropertyKind::Delegate | PropertyKind::String => Some(12),
            PropertyKind::Map => Some(20),
            PropertyKind::Struct => None,
        }
    }

    /// Script keyword for the kind.
    pub fn keyword(self) -> &'static str {
        match self {
            PropertyKind::None => "none",
            PropertyKind::Byte => "byte",
            PropertyKind::Int => "int",
            PropertyKind::Bool => "bool",
            PropertyKind::Float => "float",
            PropertyKind::Object => "object",
            PropertyKind::Name => "name",
            PropertyKind::Delegate => "delegate",
            PropertyKind::Interface => "interface",
            PropertyKind::Struct => "struct",
            PropertyKind::String => "string",
            PropertyKind::Map => "map",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How an expression references the property it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefKind {
    /// Not a reference.
    #[default]
    None,
    /// Assigned to.
    AssignValue,
    /// Read in a way that doesn't require initialization (conditions, iterators).
    SimpleReference,
    /// Read in a way that requires initialization (right-hand sides, arguments).
    AssignmentReference,
    /// Both read and written (`++X`, out arguments).
    DualReference,
}

/// A complete type description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyType {
    pub kind: PropertyKind,
    pub array_dim: i32,
    pub flags: PropertyFlags,
    pub ref_kind: RefKind,
    /// Enum bound to a byte.
    pub enum_def: Option<EnumId>,
    /// Target class of an object, class or interface reference.
    pub class: Option<StructId>,
    /// Bound of a `class<Meta>` reference.
    pub meta_class: Option<StructId>,
    /// Struct of a struct property.
    pub struct_def: Option<StructId>,
    /// Signature of a delegate.
    pub function: Option<StructId>,
    /// Key type of a map.
    pub map_key: Option<Box<PropertyType>>,
}

impl Default for PropertyType {
    fn default() -> Self {
        Self::new(PropertyKind::None)
    }
}

impl PropertyType {
    /// A scalar of `kind` with no references.
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            array_dim: 1,
            flags: PropertyFlags::empty(),
            ref_kind: RefKind::None,
            enum_def: None,
            class: None,
            meta_class: None,
            struct_def: None,
            function: None,
            map_key: None,
        }
    }

    /// The "any type" marker used when no particular type is required.
    pub fn none() -> Self {
        Self::new(PropertyKind::None)
    }

    /// A byte, optionally bound to an enum.
    pub fn byte(enum_def: Option<EnumId>) -> Self {
        Self { enum_def, ..Self::new(PropertyKind::Byte) }
    }

    /// An object reference. `None` is the canonical `None` literal type.
    pub fn object(class: Option<StructId>) -> Self {
        Self { class, ..Self::new(PropertyKind::Object) }
    }

    /// A `class<Meta>` reference; `class_class` is the registry's `Class` class.
    pub fn class_ref(class_class: StructId, meta: StructId) -> Self {
        Self {
            class: Some(class_class),
            meta_class: Some(meta),
            ..Self::new(PropertyKind::Object)
        }
    }

    /// An interface reference.
    pub fn interface(class: StructId) -> Self {
        Self { class: Some(class), ..Self::new(PropertyKind::Interface) }
    }

    /// A struct value.
    pub fn structure(struct_def: StructId) -> Self {
        Self { struct_def: Some(struct_def), ..Self::new(PropertyKind::Struct) }
    }

    /// A delegate bound to a signature function (or unbound for `None`).
    pub fn delegate(function: Option<StructId>) -> Self {
        Self { function, ..Self::new(PropertyKind::Delegate) }
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_ref(mut self, ref_kind: RefKind) -> Self {
        self.ref_kind = ref_kind;
        self
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == PropertyKind::None
    }

    #[inline]
    pub fn is_dynamic_array(&self) -> bool {
        self.array_dim == 0
    }

    #[inline]
    pub fn is_static_array(&self) -> bool {
        self.array_dim > 1
    }

    #[inline]
    pub fn is_map(&self) -> bool {
        self.array_dim == -1
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.array_dim == 1
    }

    /// Object or interface reference.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self.kind, PropertyKind::Object | PropertyKind::Interface)
    }

    #[inline]
    pub fn is_enum(&self) -> bool {
        self.kind == PropertyKind::Byte && self.enum_def.is_some()
    }

    #[inline]
    pub fn is_out(&self) -> bool {
        self.flags.contains(PropertyFlags::OUT_PARM)
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.flags.contains(PropertyFlags::CONST)
    }

    /// The type of one element of an array (or the type itself for scalars).
    pub fn element(&self) -> Self {
        let mut element = self.clone();
        element.array_dim = 1;
        element.map_key = None;
        element
    }

    /// Drop flags and reference kind, keeping only the type identity.
    pub fn bare(&self) -> Self {
        let mut bare = self.clone();
        bare.flags = PropertyFlags::empty();
        bare.ref_kind = RefKind::None;
        bare
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_scalar() {
        let ty = PropertyType::new(PropertyKind::Int);
        assert!(ty.is_scalar());
        assert!(!ty.is_dynamic_array());
        assert!(!ty.is_object());
    }

    #[test]
    fn element_of_dynamic_array_is_scalar() {
        let mut ty = PropertyType::new(PropertyKind::Float);
        ty.array_dim = 0;
        assert!(ty.is_dynamic_array());
        assert!(ty.element().is_scalar());
        assert_eq!(ty.element().kind, PropertyKind::Float);
    }

    #[test]
    fn interface_counts_as_object() {
        let ty = PropertyType::interface(StructId(3));
        assert!(ty.is_object());
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(PropertyKind::Byte.fixed_size(), Some(1));
        assert_eq!(PropertyKind::String.fixed_size(), Some(12));
        assert_eq!(PropertyKind::Struct.fixed_size(), None);
    }

    #[test]
    fn bare_strips_flags() {
        let ty = PropertyType::new(PropertyKind::Int)
            .with_flags(PropertyFlags::OUT_PARM)
            .with_ref(RefKind::AssignValue);
        assert!(ty.is_out());
        let bare = ty.bare();
        assert!(!bare.is_out());
        assert_eq!(bare.ref_kind, RefKind::None);
    }
}
