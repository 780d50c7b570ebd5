//! SymbolRegistry - the live object graph the compiler resolves against.
//!
//! # Storage Model
//!
//! - **Structs**: classes, states, functions and script structs share one
//!   arena indexed by [`StructId`]. Each struct owns its ordered child list.
//! - **Properties, enums, consts**: separate arenas, referenced from the
//!   child lists through [`FieldRef`].
//! - **Classes**: also indexed by name, and mirrored in the [`ClassGraph`]
//!   for subclass enumeration and dependency ordering.
//! - **Native ids**: a global map from id to the function that claimed it.
//!
//! Re-parsing a class frees everything it owns with [`SymbolRegistry::clear_class`].
//! Freed slots are handed out again lowest first, so parsing the same source
//! again reproduces the same ids and therefore the same bytecode.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use unrealscript_core::{
    ClassFlags, ConstId, EnumId, FieldRef, Name, NameTable, ObjectId, PropertyId, PropertyType,
    StructId,
};

use crate::error::RegistryError;
use crate::hierarchy::{ClassEdge, ClassGraph};
use crate::objects::{
    ClassData, ConstDef, EnumDef, LiteralObject, Property, StructData, StructDef, StructKind,
};

/// Arena with lowest-first slot reuse.
#[derive(Debug)]
struct Arena<T> {
    items: Vec<T>,
    free: BTreeSet<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            free: BTreeSet::new(),
        }
    }
}

impl<T> Arena<T> {
    fn alloc(&mut self, item: T) -> u32 {
        match self.free.pop_first() {
            Some(slot) => {
                self.items[slot as usize] = item;
                slot
            }
            None => {
                self.items.push(item);
                (self.items.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, slot: u32) {
        self.free.insert(slot);
    }
}

/// Central object graph.
#[derive(Debug)]
pub struct SymbolRegistry {
    names: NameTable,
    structs: Arena<StructDef>,
    properties: Arena<Property>,
    enums: Arena<EnumDef>,
    consts: Arena<ConstDef>,
    objects: Vec<LiteralObject>,

    /// Classes by name.
    classes: FxHashMap<Name, StructId>,
    /// Script structs and enums by name, for lookups outside the scope chain.
    global_types: FxHashMap<Name, FieldRef>,
    /// Native id -> function that claimed it.
    native_ids: FxHashMap<u16, StructId>,
    graph: ClassGraph,

    object_class: StructId,
    class_class: StructId,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    /// Create a registry holding the intrinsic `Object` and `Class` classes.
    pub fn new() -> Self {
        let mut registry = Self {
            names: NameTable::new(),
            structs: Arena::default(),
            properties: Arena::default(),
            enums: Arena::default(),
            consts: Arena::default(),
            objects: Vec::new(),
            classes: FxHashMap::default(),
            global_types: FxHashMap::default(),
            native_ids: FxHashMap::default(),
            graph: ClassGraph::new(),
            object_class: StructId(0),
            class_class: StructId(0),
        };
        registry.object_class = registry.insert_class("Object", None, None);
        registry.class_class = registry.insert_class("Class", Some(registry.object_class), None);
        for intrinsic in [registry.object_class, registry.class_class] {
            if let Some(data) = registry.class_data_mut(intrinsic) {
                data.flags |= ClassFlags::NATIVE;
            }
        }
        registry
    }

    // ==========================================================================
    // Names
    // ==========================================================================

    pub fn intern(&mut self, text: &str) -> Name {
        self.names.intern(text)
    }

    pub fn find_name(&self, text: &str) -> Option<Name> {
        self.names.find(text)
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    // ==========================================================================
    // Arena access
    // ==========================================================================

    #[inline]
    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs.items[id.index()]
    }

    #[inline]
    pub fn struct_mut(&mut self, id: StructId) -> &mut StructDef {
        &mut self.structs.items[id.index()]
    }

    #[inline]
    pub fn property(&self, id: PropertyId) -> &Property {
        &self.properties.items[id.index()]
    }

    #[inline]
    pub fn property_mut(&mut self, id: PropertyId) -> &mut Property {
        &mut self.properties.items[id.index()]
    }

    #[inline]
    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.enums.items[id.index()]
    }

    #[inline]
    pub fn const_def(&self, id: ConstId) -> &ConstDef {
        &self.consts.items[id.index()]
    }

    pub fn object(&self, id: ObjectId) -> &LiteralObject {
        &self.objects[id.index()]
    }

    /// Class data of a class struct.
    pub fn class_data(&self, class: StructId) -> Option<&ClassData> {
        self.struct_def(class).as_class()
    }

    pub fn class_data_mut(&mut self, class: StructId) -> Option<&mut ClassData> {
        self.struct_mut(class).as_class_mut()
    }

    pub fn object_class(&self) -> StructId {
        self.object_class
    }

    pub fn class_class(&self) -> StructId {
        self.class_class
    }

    pub fn graph(&self) -> &ClassGraph {
        &self.graph
    }

    // ==========================================================================
    // Classes
    // ==========================================================================

    fn insert_class(&mut self, name: &str, parent: Option<StructId>, source: Option<Arc<str>>) -> StructId {
        let name = self.names.intern(name);
        let data = ClassData {
            source,
            ..ClassData::default()
        };
        let mut def = StructDef::new(name.clone(), None, StructData::Class(data));
        def.super_struct = parent;
        def.min_alignment = 4;
        let id = StructId(self.structs.alloc(def));
        self.classes.insert(name, id);
        self.graph.add_class(id);
        if let Some(parent) = parent {
            self.graph.set_parent(id, parent);
        }
        id
    }

    /// Register a class under `parent`.
    pub fn register_class(
        &mut self,
        name: &str,
        parent: Option<StructId>,
        source: Option<Arc<str>>,
    ) -> Result<StructId, RegistryError> {
        if self.find_class(name).is_some() {
            return Err(RegistryError::DuplicateClass { name: name.to_string() });
        }
        Ok(self.insert_class(name, parent, source))
    }

    /// Attach source text to an existing class (used for the intrinsic classes).
    pub fn set_class_source(&mut self, class: StructId, source: Arc<str>) {
        if let Some(data) = self.class_data_mut(class) {
            data.source = Some(source);
        }
    }

    pub fn class_source(&self, class: StructId) -> Option<Arc<str>> {
        self.class_data(class).and_then(|data| data.source.clone())
    }

    pub fn find_class(&self, name: &str) -> Option<StructId> {
        let name = self.names.find(name)?;
        self.classes.get(&name).copied()
    }

    pub fn find_class_by_name(&self, name: &Name) -> Option<StructId> {
        self.classes.get(name).copied()
    }

    /// Every registered class, sorted by name.
    pub fn classes_sorted(&self) -> Vec<StructId> {
        let mut classes: Vec<StructId> = self.classes.values().copied().collect();
        classes.sort_by_key(|&id| self.struct_def(id).name.as_str().to_ascii_lowercase());
        classes
    }

    /// Direct subclasses, sorted by name.
    pub fn subclasses(&self, class: StructId) -> Vec<StructId> {
        let mut subs = self.graph.subclasses(class);
        subs.sort_by_key(|&id| self.struct_def(id).name.as_str().to_ascii_lowercase());
        subs
    }

    pub fn super_class(&self, class: StructId) -> Option<StructId> {
        self.struct_def(class).super_struct
    }

    /// Record a declared `dependson`/`implements` edge.
    pub fn add_class_dependency(&mut self, class: StructId, target: StructId, kind: ClassEdge) {
        self.graph.add_dependency(class, target, kind);
    }

    /// Classes on dependency cycles.
    pub fn dependency_cycles(&self) -> Vec<Vec<StructId>> {
        self.graph.cycles()
    }

    /// Whether `class` is `base` or derives from it. Works for any struct chain.
    pub fn is_child_of(&self, class: StructId, base: StructId) -> bool {
        self.inheritance_distance(class, base).is_some()
    }

    /// Steps from `class` up to `base`, or `None` if unrelated.
    pub fn inheritance_distance(&self, class: StructId, base: StructId) -> Option<u32> {
        let mut current = Some(class);
        let mut distance = 0;
        while let Some(id) = current {
            if id == base {
                return Some(distance);
            }
            distance += 1;
            current = self.struct_def(id).super_struct;
        }
        None
    }

    /// Whether a class (or one of its parents) implements `interface`, directly
    /// or through an interface that extends it.
    pub fn implements_interface(&self, class: StructId, interface: StructId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(data) = self.class_data(id) {
                if data
                    .interfaces
                    .iter()
                    .any(|&declared| self.is_child_of(declared, interface))
                {
                    return true;
                }
            }
            current = self.struct_def(id).super_struct;
        }
        false
    }

    pub fn is_interface(&self, class: StructId) -> bool {
        self.struct_def(class).class_flags().contains(ClassFlags::INTERFACE)
    }

    /// The class that ultimately owns a struct.
    pub fn class_of(&self, id: StructId) -> StructId {
        let mut current = id;
        while let Some(outer) = self.struct_def(current).outer {
            current = outer;
        }
        current
    }

    /// Dotted path from the owning class, e.g. `Pawn.Dying.Tick`.
    pub fn path_name(&self, id: StructId) -> String {
        let def = self.struct_def(id);
        match def.outer {
            Some(outer) => format!("{}.{}", self.path_name(outer), def.name),
            None => def.name.to_string(),
        }
    }

    // ==========================================================================
    // Children
    // ==========================================================================

    /// Add a state, function or script struct to `outer`.
    pub fn add_struct(&mut self, outer: StructId, name: Name, data: StructData, line: u32) -> StructId {
        let is_script_struct = matches!(data, StructData::ScriptStruct(_));
        let mut def = StructDef::new(name.clone(), Some(outer), data);
        def.line = line;
        def.min_alignment = if is_script_struct { 1 } else { 4 };
        let id = StructId(self.structs.alloc(def));
        self.struct_mut(outer).children.push(FieldRef::Struct(id));
        if is_script_struct {
            self.global_types.insert(name, FieldRef::Struct(id));
        }
        id
    }

    /// Append a property to `outer`.
    pub fn add_property(&mut self, outer: StructId, name: Name, ty: PropertyType, line: u32) -> PropertyId {
        let id = self.new_property(outer, name, ty, line);
        self.struct_mut(outer).children.push(FieldRef::Property(id));
        id
    }

    /// Insert a property into `outer`'s child list at `index`.
    pub fn insert_property(
        &mut self,
        outer: StructId,
        index: usize,
        name: Name,
        ty: PropertyType,
        line: u32,
    ) -> PropertyId {
        let id = self.new_property(outer, name, ty, line);
        let children = &mut self.struct_mut(outer).children;
        let index = index.min(children.len());
        children.insert(index, FieldRef::Property(id));
        id
    }

    fn new_property(&mut self, outer: StructId, name: Name, ty: PropertyType, line: u32) -> PropertyId {
        let mut property = Property::new(name, outer, ty);
        property.line = line;
        PropertyId(self.properties.alloc(property))
    }

    pub fn add_enum(&mut self, outer: StructId, name: Name, tags: Vec<Name>) -> EnumId {
        let def = EnumDef {
            name: name.clone(),
            outer,
            tags,
        };
        let id = EnumId(self.enums.alloc(def));
        self.struct_mut(outer).children.push(FieldRef::Enum(id));
        self.global_types.insert(name, FieldRef::Enum(id));
        id
    }

    pub fn add_const(&mut self, outer: StructId, name: Name, value: String, line: u32) -> ConstId {
        let def = ConstDef {
            name,
            outer,
            value,
            line,
        };
        let id = ConstId(self.consts.alloc(def));
        self.struct_mut(outer).children.push(FieldRef::Const(id));
        id
    }

    /// Name of any child field.
    pub fn field_name(&self, field: FieldRef) -> &Name {
        match field {
            FieldRef::Struct(id) => &self.struct_def(id).name,
            FieldRef::Property(id) => &self.property(id).name,
            FieldRef::Enum(id) => &self.enum_def(id).name,
            FieldRef::Const(id) => &self.const_def(id).name,
        }
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// A field declared directly in `scope`.
    pub fn find_own_field(&self, scope: StructId, name: &Name) -> Option<FieldRef> {
        self.struct_def(scope)
            .children
            .iter()
            .copied()
            .find(|&field| self.field_name(field) == name)
    }

    /// A field in `scope` or its super chain.
    pub fn find_field_in(&self, scope: StructId, name: &Name) -> Option<FieldRef> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.find_own_field(id, name) {
                return Some(found);
            }
            current = self.struct_def(id).super_struct;
        }
        None
    }

    /// A field visible from `scope`: its super chain, then each outer's.
    pub fn find_field(&self, scope: StructId, name: &Name) -> Option<FieldRef> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.find_field_in(id, name) {
                return Some(found);
            }
            current = self.struct_def(id).outer;
        }
        None
    }

    /// Every field of `scope` including inherited ones, nearest first.
    pub fn fields(&self, scope: StructId) -> Vec<FieldRef> {
        let mut fields = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            fields.extend(self.struct_def(id).children.iter().copied());
            current = self.struct_def(id).super_struct;
        }
        fields
    }

    /// Functions of `scope` including inherited ones, nearest first.
    pub fn functions(&self, scope: StructId) -> Vec<StructId> {
        self.fields(scope)
            .into_iter()
            .filter_map(|field| match field {
                FieldRef::Struct(id) if self.struct_def(id).is_function() => Some(id),
                _ => None,
            })
            .collect()
    }

    /// A script struct or enum by name, from any class.
    pub fn find_global_type(&self, name: &Name) -> Option<FieldRef> {
        self.global_types.get(name).copied()
    }

    /// The `Vector`/`Rotator`-style core struct of the given name.
    pub fn find_script_struct(&self, name: &str) -> Option<StructId> {
        let name = self.names.find(name)?;
        match self.global_types.get(&name) {
            Some(FieldRef::Struct(id)) => Some(*id),
            _ => None,
        }
    }

    /// Parameters of a function in declaration order, return value excluded.
    pub fn parameters(&self, function: StructId) -> Vec<PropertyId> {
        self.struct_def(function)
            .own_properties()
            .filter(|&id| {
                let property = self.property(id);
                property.is_parameter() && !property.is_return_value()
            })
            .collect()
    }

    pub fn return_property(&self, function: StructId) -> Option<PropertyId> {
        self.struct_def(function)
            .own_properties()
            .find(|&id| self.property(id).is_return_value())
    }

    // ==========================================================================
    // Native ids
    // ==========================================================================

    /// Claim a native function id for `function`.
    pub fn claim_native_id(&mut self, id: u16, function: StructId) -> Result<(), RegistryError> {
        match self.native_ids.get(&id) {
            Some(&existing) if existing != function => Err(RegistryError::NativeIdInUse {
                id,
                existing: self.path_name(existing),
            }),
            _ => {
                self.native_ids.insert(id, function);
                Ok(())
            }
        }
    }

    pub fn native_function(&self, id: u16) -> Option<StructId> {
        self.native_ids.get(&id).copied()
    }

    // ==========================================================================
    // Literal objects
    // ==========================================================================

    /// Make an object available to `Class'Path'` literals.
    pub fn register_object(&mut self, class: StructId, path: &str) -> ObjectId {
        if let Some(existing) = self.find_object(class, path) {
            return existing;
        }
        self.objects.push(LiteralObject {
            class,
            path: path.to_string(),
        });
        ObjectId((self.objects.len() - 1) as u32)
    }

    /// A registered object of `class` (or a subclass) with this path.
    pub fn find_object(&self, class: StructId, path: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .position(|object| object.path.eq_ignore_ascii_case(path) && self.is_child_of(object.class, class))
            .map(|index| ObjectId(index as u32))
    }

    // ==========================================================================
    // Re-parse support
    // ==========================================================================

    /// Free everything a class declared, returning it to the unparsed state.
    ///
    /// The class keeps its name, parent, source and place in the graph.
    pub fn clear_class(&mut self, class: StructId) {
        let children = std::mem::take(&mut self.struct_mut(class).children);
        for field in children {
            self.release_field(field);
        }
        self.graph.clear_declared(class);
        let def = self.struct_mut(class);
        def.script.clear();
        def.properties_size = 0;
        def.min_alignment = 4;
        if let Some(data) = def.as_class_mut() {
            let source = data.source.take();
            let flags = data.flags & ClassFlags::INTERFACE;
            *data = ClassData {
                source,
                flags,
                ..ClassData::default()
            };
        }
    }

    fn release_field(&mut self, field: FieldRef) {
        match field {
            FieldRef::Struct(id) => {
                let children = std::mem::take(&mut self.struct_mut(id).children);
                for child in children {
                    self.release_field(child);
                }
                let def = self.struct_def(id);
                let native = def.as_function().map(|function| function.native_index).unwrap_or(0);
                let kind = def.kind();
                let name = def.name.clone();
                if native != 0 && self.native_ids.get(&native) == Some(&id) {
                    self.native_ids.remove(&native);
                }
                if kind == StructKind::ScriptStruct && self.global_types.get(&name) == Some(&field) {
                    self.global_types.remove(&name);
                }
                self.structs.release(id.0);
            }
            FieldRef::Property(id) => self.properties.release(id.0),
            FieldRef::Enum(id) => {
                let name = self.enum_def(id).name.clone();
                if self.global_types.get(&name) == Some(&field) {
                    self.global_types.remove(&name);
                }
                self.enums.release(id.0);
            }
            FieldRef::Const(id) => self.consts.release(id.0),
        }
    }
}
