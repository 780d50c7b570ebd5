//! Property layout ("link") and stable grouping.
//!
//! Linking walks a struct's properties in child order and assigns byte
//! offsets. Each property is aligned to `min(size, 4)`, or to its struct's
//! minimum alignment; consecutive bools share one 4-byte slot with
//! successive bit masks. Classes and script structs start where their super
//! struct ends; functions and states start at zero so overriding functions
//! keep their parameters at identical offsets.

use unrealscript_core::{ClassFlags, FieldRef, PropertyFlags, PropertyKind, PropertyType, StructId};

use crate::objects::StructKind;
use crate::registry::SymbolRegistry;

/// Size of one element of a type (or a whole dynamic array / map header).
pub fn element_size(registry: &SymbolRegistry, ty: &PropertyType) -> u32 {
    if ty.is_dynamic_array() {
        return 12;
    }
    if ty.is_map() {
        return 20;
    }
    match ty.kind {
        PropertyKind::Struct => ty
            .struct_def
            .map(|id| struct_size(registry, id))
            .unwrap_or(0),
        kind => kind.fixed_size().unwrap_or(0),
    }
}

/// Total size of a property, static arrays multiplied out.
pub fn property_size(registry: &SymbolRegistry, ty: &PropertyType) -> u32 {
    let element = element_size(registry, ty);
    if ty.is_static_array() {
        element * ty.array_dim as u32
    } else {
        element
    }
}

/// Alignment requirement of a type.
pub fn alignment(registry: &SymbolRegistry, ty: &PropertyType) -> u32 {
    if ty.is_scalar() || ty.is_static_array() {
        if let (PropertyKind::Struct, Some(id)) = (ty.kind, ty.struct_def) {
            return registry.struct_def(id).min_alignment.max(1);
        }
    }
    element_size(registry, ty).clamp(1, 4)
}

/// Linked size of a script struct, rounded up to its alignment.
pub fn struct_size(registry: &SymbolRegistry, id: StructId) -> u32 {
    let def = registry.struct_def(id);
    align(def.properties_size, def.min_alignment.max(1))
}

#[inline]
fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Assign offsets to `id`'s properties and, recursively, its child structs.
///
/// Embedded script structs must already be linked; they are declared (and
/// therefore linked) before the properties that use them.
pub fn link(registry: &mut SymbolRegistry, id: StructId) {
    let child_structs: Vec<StructId> = registry.struct_def(id).own_structs().collect();
    for child in child_structs {
        if registry.struct_def(child).kind() == StructKind::ScriptStruct {
            link(registry, child);
        }
    }

    let def = registry.struct_def(id);
    let kind = def.kind();
    let inherits_layout = matches!(kind, StructKind::Class | StructKind::ScriptStruct);
    let (mut offset, mut min_alignment) = match (inherits_layout, def.super_struct) {
        (true, Some(parent)) => {
            let parent = registry.struct_def(parent);
            (parent.properties_size, parent.min_alignment.max(1))
        }
        _ => (0, if kind == StructKind::ScriptStruct { 1 } else { 4 }),
    };

    let properties: Vec<_> = def.own_properties().collect();
    let mut bool_slot: Option<(u32, u32)> = None;
    for property_id in properties {
        let ty = registry.property(property_id).ty.clone();
        if ty.kind == PropertyKind::Bool && ty.is_scalar() {
            if let Some((slot, mask)) = bool_slot {
                if mask != 0x8000_0000 {
                    let property = registry.property_mut(property_id);
                    property.offset = slot;
                    property.bool_mask = mask << 1;
                    bool_slot = Some((slot, mask << 1));
                    continue;
                }
            }
            offset = align(offset, 4);
            let property = registry.property_mut(property_id);
            property.offset = offset;
            property.bool_mask = 1;
            bool_slot = Some((offset, 1));
            offset += 4;
            min_alignment = min_alignment.max(4);
            continue;
        }

        bool_slot = None;
        let property_alignment = alignment(registry, &ty);
        let size = property_size(registry, &ty);
        offset = align(offset, property_alignment);
        let property = registry.property_mut(property_id);
        property.offset = offset;
        property.bool_mask = 0;
        offset += size;
        min_alignment = min_alignment.max(property_alignment);
    }

    let function_structs: Vec<StructId> = registry
        .struct_def(id)
        .own_structs()
        .filter(|&child| registry.struct_def(child).kind() != StructKind::ScriptStruct)
        .collect();

    let def = registry.struct_mut(id);
    def.properties_size = offset;
    def.min_alignment = min_alignment;

    for child in function_structs {
        link(registry, child);
    }
}

/// Where a new class-scope byte or bool property goes in `scope`'s child list.
///
/// Same-kind properties are clustered to reduce padding: the new property
/// lands right after the last property of its kind (and transient-ness)
/// declared in this class. Scanning stops at the first `noexport`
/// property, and `noexport` classes or properties are never moved. Returns
/// `None` to append.
pub fn group_insert_index(
    registry: &SymbolRegistry,
    scope: StructId,
    ty: &PropertyType,
) -> Option<usize> {
    let def = registry.struct_def(scope);
    if !def.is_class() || def.class_flags().contains(ClassFlags::NO_EXPORT) {
        return None;
    }
    if !matches!(ty.kind, PropertyKind::Byte | PropertyKind::Bool) || !ty.is_scalar() {
        return None;
    }
    if ty.flags.contains(PropertyFlags::NO_EXPORT) {
        return None;
    }
    let transient = ty.flags.contains(PropertyFlags::TRANSIENT);
    let mut after = None;
    for (index, field) in def.children.iter().enumerate() {
        let FieldRef::Property(id) = field else {
            continue;
        };
        let existing = &registry.property(*id).ty;
        if existing.flags.contains(PropertyFlags::NO_EXPORT) {
            break;
        }
        if existing.kind == ty.kind
            && existing.is_scalar()
            && existing.flags.contains(PropertyFlags::TRANSIENT) == transient
        {
            after = Some(index + 1);
        }
    }
    let last_property = def
        .children
        .iter()
        .rposition(|field| matches!(field, FieldRef::Property(_)));
    match (after, last_property) {
        (Some(index), Some(last)) if index <= last => Some(index),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ScriptStructData;
    use crate::objects::StructData;
    use unrealscript_core::Name;

    fn setup() -> (SymbolRegistry, StructId) {
        let mut registry = SymbolRegistry::new();
        let object = registry.object_class();
        let actor = registry.register_class("Actor", Some(object), None).unwrap();
        link(&mut registry, object);
        (registry, actor)
    }

    fn add(registry: &mut SymbolRegistry, scope: StructId, name: &str, ty: PropertyType) -> unrealscript_core::PropertyId {
        let name: Name = registry.intern(name);
        registry.add_property(scope, name, ty, 1)
    }

    #[test]
    fn offsets_respect_alignment() {
        let (mut registry, actor) = setup();
        let b = add(&mut registry, actor, "B", PropertyType::byte(None));
        let i = add(&mut registry, actor, "I", PropertyType::new(PropertyKind::Int));
        let n = add(&mut registry, actor, "N", PropertyType::new(PropertyKind::Name));
        link(&mut registry, actor);
        assert_eq!(registry.property(b).offset, 0);
        assert_eq!(registry.property(i).offset, 4);
        assert_eq!(registry.property(n).offset, 8);
        assert_eq!(registry.struct_def(actor).properties_size, 16);
    }

    #[test]
    fn consecutive_bools_share_slot() {
        let (mut registry, actor) = setup();
        let a = add(&mut registry, actor, "bA", PropertyType::new(PropertyKind::Bool));
        let b = add(&mut registry, actor, "bB", PropertyType::new(PropertyKind::Bool));
        let i = add(&mut registry, actor, "I", PropertyType::new(PropertyKind::Int));
        let c = add(&mut registry, actor, "bC", PropertyType::new(PropertyKind::Bool));
        link(&mut registry, actor);
        assert_eq!((registry.property(a).offset, registry.property(a).bool_mask), (0, 1));
        assert_eq!((registry.property(b).offset, registry.property(b).bool_mask), (0, 2));
        assert_eq!(registry.property(i).offset, 4);
        assert_eq!((registry.property(c).offset, registry.property(c).bool_mask), (8, 1));
    }

    #[test]
    fn subclass_starts_after_parent() {
        let (mut registry, actor) = setup();
        add(&mut registry, actor, "I", PropertyType::new(PropertyKind::Int));
        link(&mut registry, actor);
        let pawn = registry.register_class("Pawn", Some(actor), None).unwrap();
        let f = add(&mut registry, pawn, "F", PropertyType::new(PropertyKind::Float));
        link(&mut registry, pawn);
        assert_eq!(registry.property(f).offset, 4);
        assert_eq!(registry.struct_def(pawn).properties_size, 8);
    }

    #[test]
    fn struct_and_array_sizes() {
        let (mut registry, actor) = setup();
        let name = registry.intern("Vector");
        let vector = registry.add_struct(actor, name, StructData::ScriptStruct(ScriptStructData::default()), 1);
        for axis in ["X", "Y", "Z"] {
            add(&mut registry, vector, axis, PropertyType::new(PropertyKind::Float));
        }
        let fixed = add(&mut registry, actor, "Fixed", PropertyType {
            array_dim: 3,
            ..PropertyType::new(PropertyKind::Int)
        });
        let location = add(&mut registry, actor, "Location", PropertyType::structure(vector));
        let list = add(&mut registry, actor, "List", PropertyType {
            array_dim: 0,
            ..PropertyType::new(PropertyKind::String)
        });
        link(&mut registry, actor);
        assert_eq!(struct_size(&registry, vector), 12);
        assert_eq!(registry.property(fixed).offset, 0);
        assert_eq!(registry.property(location).offset, 12);
        assert_eq!(registry.property(list).offset, 24);
        assert_eq!(registry.struct_def(actor).properties_size, 36);
    }

    #[test]
    fn grouping_inserts_after_same_kind() {
        let (mut registry, actor) = setup();
        add(&mut registry, actor, "B1", PropertyType::byte(None));
        add(&mut registry, actor, "I", PropertyType::new(PropertyKind::Int));
        assert_eq!(group_insert_index(&registry, actor, &PropertyType::byte(None)), Some(1));
        assert_eq!(group_insert_index(&registry, actor, &PropertyType::new(PropertyKind::Int)), None);
        let transient = PropertyType::byte(None).with_flags(PropertyFlags::TRANSIENT);
        assert_eq!(group_insert_index(&registry, actor, &transient), None);
    }

    #[test]
    fn grouping_stops_at_noexport() {
        let (mut registry, actor) = setup();
        add(&mut registry, actor, "Hidden", PropertyType::new(PropertyKind::Int).with_flags(PropertyFlags::NO_EXPORT));
        add(&mut registry, actor, "B1", PropertyType::byte(None));
        add(&mut registry, actor, "I", PropertyType::new(PropertyKind::Int));
        assert_eq!(group_insert_index(&registry, actor, &PropertyType::byte(None)), None);
    }
}
