//! Type matching and conversion costs.
//!
//! Every place a value meets a required type goes through here: operator
//! overload ranking, argument passing, assignment and `return`.
//!
//! ## Costs
//!
//! | Cost | Meaning |
//! |---|---|
//! | 0 | identical |
//! | 1..=100 | generalization, counting inheritance steps |
//! | 101 | other automatic conversion |
//! | 103 | int or byte to float |
//! | 104 | truncation |
//! | [`NO_CONVERSION`] | impossible |

mod table;

pub use table::{Cast, Row, lookup};

use unrealscript_core::{PropertyFlags, PropertyKind, PropertyType, StructId};
use unrealscript_registry::SymbolRegistry;

/// Cost of a conversion that can't happen.
pub const NO_CONVERSION: u32 = u32::MAX;

const EXPANSION_COST: u32 = 101;
const WIDEN_TO_FLOAT_COST: u32 = 103;
const TRUNCATION_COST: u32 = 104;

/// Whether a value of type `src` can be used where `dest` is required.
///
/// With `exact` set only identical types match; otherwise a subclass, an
/// implementing class or the `None` literal also match.
pub fn matches_type(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType, exact: bool) -> bool {
    if dest.is_out() {
        if !src.is_out() {
            return false;
        }
        if src.is_const() && !dest.is_const() {
            return false;
        }
    }

    if dest.is_none() {
        return !exact;
    }

    let object_like = dest.is_object() && src.is_object();
    if dest.kind != src.kind && !object_like {
        return false;
    }
    if dest.array_dim != src.array_dim {
        return false;
    }

    match dest.kind {
        PropertyKind::Byte => dest.enum_def == src.enum_def || (!exact && dest.enum_def.is_none()),
        PropertyKind::Object | PropertyKind::Interface => object_matches(registry, dest, src, exact),
        PropertyKind::Struct => match (dest.struct_def, src.struct_def) {
            (Some(d), Some(s)) if d == s => true,
            (Some(d), Some(s)) => !exact && registry.is_child_of(s, d),
            _ => false,
        },
        PropertyKind::Delegate => match (dest.function, src.function) {
            (Some(d), Some(s)) if d == s => true,
            (Some(d), Some(s)) => !exact && delegate_signatures_match(registry, d, s),
            (_, None) => !exact,
            (None, Some(_)) => !exact,
        },
        PropertyKind::Map => dest.map_key == src.map_key,
        _ => true,
    }
}

fn object_matches(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType, exact: bool) -> bool {
    if exact {
        return dest.kind == src.kind && dest.class == src.class && dest.meta_class == src.meta_class;
    }
    let (Some(dest_class), Some(src_class)) = (dest.class, src.class) else {
        // The `None` literal and unbound references match any object.
        return src.class.is_none() || dest.class.is_none();
    };

    if dest.kind == PropertyKind::Interface {
        return src_class == dest_class
            || registry.is_child_of(src_class, dest_class)
            || registry.implements_interface(src_class, dest_class);
    }
    if src.kind == PropertyKind::Interface {
        return dest_class == registry.object_class();
    }

    if registry.is_child_of(src_class, dest_class) {
        return meta_matches(registry, dest, src);
    }
    false
}

fn meta_matches(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType) -> bool {
    match (dest.meta_class, src.meta_class) {
        (Some(d), Some(s)) => registry.is_child_of(s, d),
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// Whether two delegate signatures take the same parameters and return the same type.
pub fn delegate_signatures_match(registry: &SymbolRegistry, a: StructId, b: StructId) -> bool {
    let params = |function: StructId| {
        let mut types: Vec<PropertyType> = registry
            .parameters(function)
            .into_iter()
            .map(|id| signature_type(&registry.property(id).ty))
            .collect();
        if let Some(ret) = registry.return_property(function) {
            types.push(signature_type(&registry.property(ret).ty));
        }
        types
    };
    params(a) == params(b)
}

fn signature_type(ty: &PropertyType) -> PropertyType {
    let mut bare = ty.bare();
    bare.flags = ty.flags & (PropertyFlags::OUT_PARM | PropertyFlags::OPTIONAL_PARM);
    bare
}

/// Cost of converting `src` to `dest`.
pub fn conversion_cost(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType) -> u32 {
    if matches_type(registry, dest, src, true) {
        return 0;
    }
    if dest.is_out() {
        return NO_CONVERSION;
    }
    if matches_type(registry, dest, src, false) {
        return 1 + generalization_steps(registry, dest, src);
    }
    if !dest.is_scalar() || !src.is_scalar() {
        return NO_CONVERSION;
    }
    if dest.is_enum() {
        return NO_CONVERSION;
    }
    if dest.kind == PropertyKind::Object && dest.class.is_some() && src.kind == PropertyKind::Object {
        return NO_CONVERSION;
    }
    if dest.kind == PropertyKind::Interface && src.is_object() {
        return NO_CONVERSION;
    }

    let Some(cast) = lookup(Row::of(registry, dest), Row::of(registry, src)) else {
        return NO_CONVERSION;
    };
    let coerce = dest.flags.contains(PropertyFlags::COERCE_PARM);
    if !cast.auto && !coerce {
        return NO_CONVERSION;
    }
    if cast.truncates {
        TRUNCATION_COST
    } else if dest.kind == PropertyKind::Float && matches!(src.kind, PropertyKind::Int | PropertyKind::Byte) {
        WIDEN_TO_FLOAT_COST
    } else {
        EXPANSION_COST
    }
}

/// Inheritance steps between two matching types; 0 for non-objects.
fn generalization_steps(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType) -> u32 {
    match dest.kind {
        PropertyKind::Object | PropertyKind::Interface => {
            let (Some(dest_class), Some(src_class)) = (dest.class, src.class) else {
                return 0;
            };
            if dest.kind == PropertyKind::Interface && !registry.is_child_of(src_class, dest_class) {
                return interface_steps(registry, src_class, dest_class).unwrap_or(0);
            }
            let forward = registry.inheritance_distance(src_class, dest_class);
            let reverse = registry.inheritance_distance(dest_class, src_class);
            match (forward, reverse) {
                (Some(f), Some(r)) => f.min(r),
                (Some(f), None) => f,
                (None, Some(r)) => r,
                (None, None) => 0,
            }
        }
        PropertyKind::Struct => match (dest.struct_def, src.struct_def) {
            (Some(d), Some(s)) => registry.inheritance_distance(s, d).unwrap_or(0),
            _ => 0,
        },
        _ => 0,
    }
}

/// Steps up from `class` to the first class declaring `interface`.
fn interface_steps(registry: &SymbolRegistry, class: StructId, interface: StructId) -> Option<u32> {
    let mut current = Some(class);
    let mut steps = 0;
    while let Some(id) = current {
        let declares = registry
            .class_data(id)
            .is_some_and(|data| data.interfaces.iter().any(|&i| registry.is_child_of(i, interface)));
        if declares {
            return Some(steps);
        }
        steps += 1;
        current = registry.super_class(id);
    }
    None
}

/// Whether an object comparison between the two types can ever succeed.
pub fn objects_related(registry: &SymbolRegistry, a: &PropertyType, b: &PropertyType) -> bool {
    let (Some(a_class), Some(b_class)) = (a.class, b.class) else {
        return true;
    };
    if a.kind == PropertyKind::Interface || b.kind == PropertyKind::Interface {
        return true;
    }
    registry.is_child_of(a_class, b_class) || registry.is_child_of(b_class, a_class)
}

/// The implicit conversion to apply when `src` meets a required `dest`.
pub fn implicit_cast(registry: &SymbolRegistry, dest: &PropertyType, src: &PropertyType) -> Option<Cast> {
    if dest.is_enum() || !dest.is_scalar() || !src.is_scalar() {
        return None;
    }
    let cast = lookup(Row::of(registry, dest), Row::of(registry, src))?;
    let coerce = dest.flags.contains(PropertyFlags::COERCE_PARM);
    (cast.auto || coerce).then_some(cast)
}

/// Readable type name for diagnostics.
pub fn describe(registry: &SymbolRegistry, ty: &PropertyType) -> String {
    let element = match ty.kind {
        PropertyKind::Byte => match ty.enum_def {
            Some(id) => registry.enum_def(id).name.to_string(),
            None => "byte".to_string(),
        },
        PropertyKind::Object => match (ty.meta_class, ty.class) {
            (Some(meta), _) => format!("class<{}>", registry.struct_def(meta).name),
            (None, Some(class)) => registry.struct_def(class).name.to_string(),
            (None, None) => "None".to_string(),
        },
        PropertyKind::Interface => match ty.class {
            Some(class) => registry.struct_def(class).name.to_string(),
            None => "interface".to_string(),
        },
        PropertyKind::Struct => match ty.struct_def {
            Some(id) => registry.struct_def(id).name.to_string(),
            None => "struct".to_string(),
        },
        PropertyKind::Delegate => match ty.function {
            Some(id) => format!("delegate<{}>", registry.struct_def(id).name),
            None => "delegate".to_string(),
        },
        kind => kind.keyword().to_string(),
    };
    match ty.array_dim {
        0 => format!("array<{element}>"),
        -1 => match &ty.map_key {
            Some(key) => format!("map<{},{element}>", describe(registry, key)),
            None => format!("map<{element}>"),
        },
        _ => element,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unrealscript_core::PropertyFlags;
    use unrealscript_registry::{ScriptStructData, StructData};

    struct Fixture {
        registry: SymbolRegistry,
        actor: StructId,
        pawn: StructId,
        player: StructId,
        interface: StructId,
    }

    fn fixture() -> Fixture {
        let mut registry = SymbolRegistry::new();
        let object = registry.object_class();
        let actor = registry.register_class("Actor", Some(object), None).unwrap();
        let pawn = registry.register_class("Pawn", Some(actor), None).unwrap();
        let player = registry.register_class("PlayerPawn", Some(pawn), None).unwrap();
        let interface = registry.register_class("Usable", Some(object), None).unwrap();
        registry.class_data_mut(interface).unwrap().flags |= unrealscript_core::ClassFlags::INTERFACE;
        registry.class_data_mut(pawn).unwrap().interfaces.push(interface);
        Fixture {
            registry,
            actor,
            pawn,
            player,
            interface,
        }
    }

    fn int() -> PropertyType {
        PropertyType::new(PropertyKind::Int)
    }

    // ==========================================================================
    // Matching
    // ==========================================================================

    #[test]
    fn identical_types_match_exactly() {
        let f = fixture();
        assert!(matches_type(&f.registry, &int(), &int(), true));
        let pawn = PropertyType::object(Some(f.pawn));
        assert!(matches_type(&f.registry, &pawn, &pawn, true));
    }

    #[test]
    fn subclass_matches_only_when_generalizing() {
        let f = fixture();
        let actor = PropertyType::object(Some(f.actor));
        let pawn = PropertyType::object(Some(f.pawn));
        assert!(!matches_type(&f.registry, &actor, &pawn, true));
        assert!(matches_type(&f.registry, &actor, &pawn, false));
        assert!(!matches_type(&f.registry, &pawn, &actor, false));
    }

    #[test]
    fn out_destination_needs_out_source() {
        let f = fixture();
        let out = int().with_flags(PropertyFlags::OUT_PARM);
        assert!(!matches_type(&f.registry, &out, &int(), false));
        assert!(matches_type(&f.registry, &out, &out, true));
        let const_out = out.clone().with_flags(PropertyFlags::CONST);
        assert!(!matches_type(&f.registry, &out, &const_out, false));
    }

    #[test]
    fn arrays_need_equal_dimensions() {
        let f = fixture();
        let mut array = int();
        array.array_dim = 0;
        assert!(!matches_type(&f.registry, &int(), &array, false));
        assert!(matches_type(&f.registry, &array, &array, true));
    }

    // ==========================================================================
    // Costs
    // ==========================================================================

    #[test]
    fn cost_of_identity_is_zero() {
        let f = fixture();
        for kind in [PropertyKind::Int, PropertyKind::Float, PropertyKind::String, PropertyKind::Name] {
            let ty = PropertyType::new(kind);
            assert_eq!(conversion_cost(&f.registry, &ty, &ty), 0);
        }
    }

    #[test]
    fn generalization_grows_with_distance() {
        let f = fixture();
        let actor = PropertyType::object(Some(f.actor));
        let child = conversion_cost(&f.registry, &actor, &PropertyType::object(Some(f.pawn)));
        let grandchild = conversion_cost(&f.registry, &actor, &PropertyType::object(Some(f.player)));
        assert_eq!(child, 2);
        assert!(child < grandchild);
    }

    #[test]
    fn interface_cost_counts_to_implementer() {
        let f = fixture();
        let usable = PropertyType::interface(f.interface);
        assert_eq!(conversion_cost(&f.registry, &usable, &PropertyType::object(Some(f.pawn))), 1);
        assert_eq!(conversion_cost(&f.registry, &usable, &PropertyType::object(Some(f.player))), 2);
        assert_eq!(
            conversion_cost(&f.registry, &usable, &PropertyType::object(Some(f.actor))),
            NO_CONVERSION
        );
    }

    #[test]
    fn primitive_costs() {
        let f = fixture();
        let float = PropertyType::new(PropertyKind::Float);
        let byte = PropertyType::byte(None);
        assert_eq!(conversion_cost(&f.registry, &float, &int()), 103);
        assert_eq!(conversion_cost(&f.registry, &int(), &float), 104);
        assert_eq!(conversion_cost(&f.registry, &int(), &byte), 101);
        let string = PropertyType::new(PropertyKind::String);
        assert_eq!(conversion_cost(&f.registry, &string, &int()), NO_CONVERSION);
        let coerced = string.clone().with_flags(PropertyFlags::COERCE_PARM);
        assert_eq!(conversion_cost(&f.registry, &coerced, &int()), 101);
    }

    #[test]
    fn out_destination_is_never_converted() {
        let f = fixture();
        let out = PropertyType::new(PropertyKind::Float).with_flags(PropertyFlags::OUT_PARM);
        assert_eq!(conversion_cost(&f.registry, &out, &int()), NO_CONVERSION);
    }

    #[test]
    fn vector_rows() {
        let mut f = fixture();
        let object = f.registry.object_class();
        let name = f.registry.intern("Vector");
        let vector = f
            .registry
            .add_struct(object, name, StructData::ScriptStruct(ScriptStructData::default()), 1);
        let ty = PropertyType::structure(vector);
        assert_eq!(Row::of(&f.registry, &ty), Row::Vector);
        assert_eq!(describe(&f.registry, &ty), "Vector");
    }

    #[test]
    fn describe_arrays_and_classes() {
        let f = fixture();
        let mut array = int();
        array.array_dim = 0;
        assert_eq!(describe(&f.registry, &array), "array<int>");
        let meta = PropertyType::class_ref(f.registry.class_class(), f.actor);
        assert_eq!(describe(&f.registry, &meta), "class<Actor>");
    }
}
