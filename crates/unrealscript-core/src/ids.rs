//! Arena indices for objects in the symbol registry.
//!
//! Classes, states, functions and script structs all live in one struct
//! arena, matching how the object model treats them as kinds of struct.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Arena slot.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// A class, state, function or script struct.
    StructId,
    "struct#"
);
define_id!(
    /// A property: member variable, local, parameter or return value.
    PropertyId,
    "prop#"
);
define_id!(
    /// An enumeration.
    EnumId,
    "enum#"
);
define_id!(
    /// A named constant.
    ConstId,
    "const#"
);
define_id!(
    /// A literal object registered by the host (`Texture'Pkg.Tex'`).
    ObjectId,
    "object#"
);

/// Any child field of a struct, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Struct(StructId),
    Property(PropertyId),
    Enum(EnumId),
    Const(ConstId),
}
