//! The primitive conversion table.
//!
//! Rows are destinations, columns sources. A missing entry means the pair
//! can't be converted at all, not even explicitly.

use unrealscript_core::{PropertyKind, PropertyType};
use unrealscript_registry::SymbolRegistry;

use crate::bytecode::CastToken;

/// A type as the table sees it: structs named `Vector` and `Rotator` get
/// their own rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Row {
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
    Vector,
    Rotator,
    String,
    Map,
}

impl Row {
    pub fn of(registry: &SymbolRegistry, ty: &PropertyType) -> Self {
        match ty.kind {
            PropertyKind::None => Row::None,
            PropertyKind::Byte => Row::Byte,
            PropertyKind::Int => Row::Int,
            PropertyKind::Bool => Row::Bool,
            PropertyKind::Float => Row::Float,
            PropertyKind::Object => Row::Object,
            PropertyKind::Name => Row::Name,
            PropertyKind::Delegate => Row::Delegate,
            PropertyKind::Interface => Row::Interface,
            PropertyKind::String => Row::String,
            PropertyKind::Map => Row::Map,
            PropertyKind::Struct => {
                let name = ty.struct_def.map(|id| &registry.struct_def(id).name);
                match name {
                    Some(name) if name.matches("Vector") => Row::Vector,
                    Some(name) if name.matches("Rotator") => Row::Rotator,
                    _ => Row::Struct,
                }
            }
        }
    }
}

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cast {
    pub token: CastToken,
    /// Applied implicitly where a value of the destination type is required.
    pub auto: bool,
    /// Loses range or precision.
    pub truncates: bool,
}

impl Cast {
    const fn explicit(token: CastToken) -> Self {
        Self {
            token,
            auto: false,
            truncates: false,
        }
    }

    const fn auto(token: CastToken) -> Self {
        Self {
            token,
            auto: true,
            truncates: false,
        }
    }

    const fn truncating(token: CastToken) -> Self {
        Self {
            token,
            auto: true,
            truncates: true,
        }
    }
}

/// Look up the conversion from `src` to `dest`.
pub fn lookup(dest: Row, src: Row) -> Option<Cast> {
    use CastToken as T;
    let cast = match (dest, src) {
        (Row::Byte, Row::Int) => Cast::truncating(T::IntToByte),
        (Row::Byte, Row::Bool) => Cast::explicit(T::BoolToByte),
        (Row::Byte, Row::Float) => Cast::truncating(T::FloatToByte),
        (Row::Byte, Row::String) => Cast::explicit(T::StringToByte),

        (Row::Int, Row::Byte) => Cast::auto(T::ByteToInt),
        (Row::Int, Row::Bool) => Cast::explicit(T::BoolToInt),
        (Row::Int, Row::Float) => Cast::truncating(T::FloatToInt),
        (Row::Int, Row::String) => Cast::explicit(T::StringToInt),

        (Row::Bool, Row::Byte) => Cast::explicit(T::ByteToBool),
        (Row::Bool, Row::Int) => Cast::explicit(T::IntToBool),
        (Row::Bool, Row::Float) => Cast::explicit(T::FloatToBool),
        (Row::Bool, Row::Object) => Cast::explicit(T::ObjectToBool),
        (Row::Bool, Row::Name) => Cast::explicit(T::NameToBool),
        (Row::Bool, Row::Interface) => Cast::explicit(T::InterfaceToBool),
        (Row::Bool, Row::Vector) => Cast::explicit(T::VectorToBool),
        (Row::Bool, Row::Rotator) => Cast::explicit(T::RotatorToBool),
        (Row::Bool, Row::String) => Cast::explicit(T::StringToBool),

        (Row::Float, Row::Byte) => Cast::auto(T::ByteToFloat),
        (Row::Float, Row::Int) => Cast::auto(T::IntToFloat),
        (Row::Float, Row::Bool) => Cast::explicit(T::BoolToFloat),
        (Row::Float, Row::String) => Cast::explicit(T::StringToFloat),

        (Row::Object, Row::Interface) => Cast::explicit(T::InterfaceToObject),
        (Row::Interface, Row::Object) => Cast::explicit(T::ObjectToInterface),

        (Row::Name, Row::String) => Cast::explicit(T::StringToName),

        (Row::Vector, Row::Rotator) => Cast::explicit(T::RotatorToVector),
        (Row::Vector, Row::String) => Cast::explicit(T::StringToVector),
        (Row::Rotator, Row::Vector) => Cast::explicit(T::VectorToRotator),
        (Row::Rotator, Row::String) => Cast::explicit(T::StringToRotator),

        (Row::String, Row::Byte) => Cast::explicit(T::ByteToString),
        (Row::String, Row::Int) => Cast::explicit(T::IntToString),
        (Row::String, Row::Bool) => Cast::explicit(T::BoolToString),
        (Row::String, Row::Float) => Cast::explicit(T::FloatToString),
        (Row::String, Row::Object) => Cast::explicit(T::ObjectToString),
        (Row::String, Row::Name) => Cast::explicit(T::NameToString),
        (Row::String, Row::Delegate) => Cast::explicit(T::DelegateToString),
        (Row::String, Row::Interface) => Cast::explicit(T::InterfaceToString),
        (Row::String, Row::Vector) => Cast::explicit(T::VectorToString),
        (Row::String, Row::Rotator) => Cast::explicit(T::RotatorToString),

        _ => return None,
    };
    Some(cast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_is_automatic() {
        let cast = lookup(Row::Float, Row::Int).unwrap();
        assert!(cast.auto);
        assert!(!cast.truncates);
        assert_eq!(cast.token, CastToken::IntToFloat);
    }

    #[test]
    fn narrowing_truncates() {
        let cast = lookup(Row::Byte, Row::Float).unwrap();
        assert!(cast.auto && cast.truncates);
    }

    #[test]
    fn strings_need_explicit_casts() {
        assert!(!lookup(Row::String, Row::Int).unwrap().auto);
        assert!(!lookup(Row::Int, Row::String).unwrap().auto);
        assert!(lookup(Row::Object, Row::Int).is_none());
        assert!(lookup(Row::Struct, Row::String).is_none());
    }
}
