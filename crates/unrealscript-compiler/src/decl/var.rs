//! Variable types, names and dimensions.

use unrealscript_core::{
    ClassFlags, FieldRef, Name, PropertyFlags, PropertyId, PropertyKind, PropertyType, StructFlags, StructId,
};
use unrealscript_parser::{Mark, Token, TokenKind};
use unrealscript_registry::layout;

use crate::context::{CompilerContext, Result};
use crate::nest::{Allow, NestKind};

/// Largest static array.
const MAX_ARRAY_SIZE: i32 = 2048;

/// A parsed variable type plus what only a declaration carries.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredType {
    pub ty: PropertyType,
    /// `delegate<Name>` target, resolved later if not declared yet.
    pub delegate_name: Option<Name>,
}

impl DeclaredType {
    fn new(ty: PropertyType) -> Self {
        Self { ty, delegate_name: None }
    }
}

/// Where a variable name is being declared.
#[derive(Debug, Clone)]
pub(crate) struct VarSite<'t> {
    /// What is being declared, for messages.
    pub thing: &'t str,
    /// Name to use instead of reading one.
    pub name: Option<&'t str>,
    pub no_arrays: bool,
    pub category: Option<Name>,
    /// Read the declaration but don't create a property.
    pub skip: bool,
    /// Read `<Tag=Value>` metadata after the name.
    pub metadata: bool,
}

impl<'t> VarSite<'t> {
    pub fn new(thing: &'t str) -> Self {
        Self {
            thing,
            name: None,
            no_arrays: false,
            category: None,
            skip: false,
            metadata: false,
        }
    }

    pub fn named(mut self, name: &'t str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn no_arrays(mut self) -> Self {
        self.no_arrays = true;
        self
    }

    pub fn category(mut self, category: Option<Name>) -> Self {
        self.category = category;
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.metadata = true;
        self
    }
}

impl<'a> CompilerContext<'a> {
    // ==========================================================================
    // Types
    // ==========================================================================

    /// Read specifiers and a type.
    ///
    /// With `thing` a missing type is an error naming it; without, the
    /// lexer is rewound and `None` returned.
    pub(crate) fn get_var_type(
        &mut self,
        scope: StructId,
        disallow: PropertyFlags,
        thing: Option<&str>,
    ) -> Result<Option<DeclaredType>> {
        let start = self.lexer.mark();
        let mut flags = PropertyFlags::empty();
        let token = loop {
            let token = self.lexer.next_token(true)?;
            if token.kind != TokenKind::Identifier {
                break token;
            }
            if token.is_identifier("public") {
                flags.remove(PropertyFlags::PRIVATE | PropertyFlags::PROTECTED);
                continue;
            }
            match Self::property_specifier(token.lexeme) {
                Some(specifier) => flags |= specifier,
                None => break token,
            }
        };

        if flags.contains(PropertyFlags::PRIVATE | PropertyFlags::PROTECTED) {
            return Err(self.decl_error("Variables can't be both 'private' and 'protected'"));
        }
        if flags.intersects(disallow) {
            return Err(self.decl_error("Specified type modifiers not allowed here"));
        }

        if token.kind != TokenKind::Identifier {
            self.lexer.rewind(&token);
            return self.missing_type(thing, start);
        }

        let mut declared = match self.base_type(scope, &token, disallow, thing)? {
            Some(declared) => declared,
            None => return self.missing_type(thing, start),
        };
        declared.ty.flags |= flags;
        Ok(Some(declared))
    }

    fn missing_type(&mut self, thing: Option<&str>, start: Mark) -> Result<Option<DeclaredType>> {
        match thing {
            Some(thing) => Err(self.syntax_error(format!("{thing}: Missing variable type"))),
            None => {
                self.lexer.reset(start);
                Ok(None)
            }
        }
    }

    /// The type named by `token`, without specifiers.
    fn base_type(
        &mut self,
        scope: StructId,
        token: &Token<'a>,
        disallow: PropertyFlags,
        thing: Option<&str>,
    ) -> Result<Option<DeclaredType>> {
        let word = token.lexeme;
        let is = |keyword: &str| word.eq_ignore_ascii_case(keyword);
        let simple = |kind| -> Result<Option<DeclaredType>> { Ok(Some(DeclaredType::new(PropertyType::new(kind)))) };

        if is("enum") {
            let id = self.compile_enum(scope)?;
            return Ok(Some(DeclaredType::new(PropertyType::byte(Some(id)))));
        }
        if is("struct") {
            let id = self.compile_struct(scope)?;
            return Ok(Some(DeclaredType::new(PropertyType::structure(id))));
        }
        if is("byte") {
            return Ok(Some(DeclaredType::new(PropertyType::byte(None))));
        }
        if is("int") {
            return simple(PropertyKind::Int);
        }
        if is("bool") {
            return simple(PropertyKind::Bool);
        }
        if is("float") {
            return simple(PropertyKind::Float);
        }
        if is("name") {
            return simple(PropertyKind::Name);
        }
        if is("string") {
            if self.match_symbol("[")? {
                self.warn(1, "String sizes are now obsolete; all strings are dynamically sized");
                let tag = thing.unwrap_or("Declaration");
                self.get_const_int(&format!("{tag}: Missing string size"))
                    .map_err(|_| self.syntax_error(format!("{tag}: Missing string size")))?;
                if !self.match_symbol("]")? {
                    return Err(self.syntax_error(format!("{tag}: Missing ']'")));
                }
            }
            return simple(PropertyKind::String);
        }
        if is("array") {
            return self.array_type(scope, disallow).map(Some);
        }
        if is("map") {
            return self.map_type(scope, disallow).map(Some);
        }
        if is("delegate") {
            return self.delegate_type(scope, thing).map(Some);
        }

        if let Some(class) = self.registry.find_class(word) {
            return self.class_type(class).map(Some);
        }

        let name = self.registry.find_name(word);
        let global = name.as_ref().and_then(|name| self.registry.find_global_type(name));
        match global {
            Some(FieldRef::Enum(id)) => Ok(Some(DeclaredType::new(PropertyType::byte(Some(id))))),
            Some(FieldRef::Struct(id)) => {
                let mut ty = PropertyType::structure(id);
                let components = self
                    .registry
                    .struct_def(id)
                    .as_script_struct()
                    .is_some_and(|data| data.flags.contains(StructFlags::HAS_COMPONENTS));
                if components && !disallow.contains(PropertyFlags::COMPONENT) {
                    ty.flags |= PropertyFlags::COMPONENT;
                }
                Ok(Some(DeclaredType::new(ty)))
            }
            _ if thing.is_some() => Err(self.syntax_error(format!("Unrecognized type '{word}'"))),
            _ => Ok(None),
        }
    }

    /// `array<T>`.
    fn array_type(&mut self, scope: StructId, disallow: PropertyFlags) -> Result<DeclaredType> {
        self.require_symbol("<", "'array'")?;
        let Some(mut inner) = self.get_var_type(scope, disallow, Some("'array'"))? else {
            return Err(self.syntax_error("'array': Missing variable type"));
        };
        if inner.ty.is_dynamic_array() || inner.ty.is_map() {
            return Err(self.decl_error("Arrays within arrays not supported"));
        }
        self.close_angle("'array'")?;
        inner.ty.array_dim = 0;
        Ok(inner)
    }

    /// `map<K, V>`.
    fn map_type(&mut self, scope: StructId, disallow: PropertyFlags) -> Result<DeclaredType> {
        self.require_symbol("<", "'map'")?;
        let Some(key) = self.get_var_type(scope, disallow, Some("'map'"))? else {
            return Err(self.syntax_error("'map': Missing variable type"));
        };
        self.require_symbol(",", "'map'")?;
        let Some(mut value) = self.get_var_type(scope, disallow, Some("'map'"))? else {
            return Err(self.syntax_error("'map': Missing variable type"));
        };
        if !key.ty.is_scalar() || !value.ty.is_scalar() {
            return Err(self.decl_error("Arrays within maps not supported"));
        }
        self.close_angle("'map'")?;
        value.ty.array_dim = -1;
        value.ty.map_key = Some(Box::new(key.ty));
        Ok(value)
    }

    /// `delegate<Name>`; the function may be declared further down.
    fn delegate_type(&mut self, scope: StructId, thing: Option<&str>) -> Result<DeclaredType> {
        self.require_symbol("<", "'delegate'")?;
        let Some(target) = self.get_identifier()? else {
            let tag = thing.unwrap_or("Declaration");
            return Err(self.syntax_error(format!("{tag}: Failed to read delegate name")));
        };
        self.close_angle("'delegate'")?;
        let name = self.intern(target.lexeme);
        let function = match self.registry.find_field(scope, &name) {
            Some(FieldRef::Struct(id)) if self.registry.struct_def(id).is_function() => Some(id),
            _ => None,
        };
        Ok(DeclaredType {
            ty: PropertyType::delegate(function),
            delegate_name: Some(name),
        })
    }

    /// A class name used as a type: `Actor`, `class<Actor>`, `Actor.EPhysics`.
    fn class_type(&mut self, class: StructId) -> Result<DeclaredType> {
        if self.match_symbol(".")? {
            let Some(member) = self.get_identifier()? else {
                let name = self.registry.struct_def(class).name.to_string();
                return Err(self.syntax_error(format!("'{name}': Missing class member type after '.'")));
            };
            let name = self.registry.find_name(member.lexeme);
            return match name.and_then(|name| self.registry.find_field_in(class, &name)) {
                Some(FieldRef::Enum(id)) => Ok(DeclaredType::new(PropertyType::byte(Some(id)))),
                Some(FieldRef::Struct(id)) if self.registry.struct_def(id).is_script_struct() => {
                    Ok(DeclaredType::new(PropertyType::structure(id)))
                }
                _ => {
                    let owner = self.registry.struct_def(class).name.to_string();
                    Err(self.syntax_error(format!("Unrecognized type '{}' within '{owner}'", member.lexeme)))
                }
            };
        }

        let class_class = self.registry.class_class();
        if class == class_class {
            let mut meta = self.registry.object_class();
            if self.match_symbol("<")? {
                let Some(limitor) = self.get_identifier()? else {
                    return Err(self.syntax_error("'class': Missing class limitor"));
                };
                meta = match self.registry.find_class(limitor.lexeme) {
                    Some(meta) => meta,
                    None => {
                        return Err(self.syntax_error(format!(
                            "'class': Limitor '{}' is not a class name",
                            limitor.lexeme
                        )));
                    }
                };
                self.close_angle("'class limitor'")?;
            }
            return Ok(DeclaredType::new(PropertyType::class_ref(class_class, meta)));
        }

        if self.registry.is_interface(class) {
            return Ok(DeclaredType::new(PropertyType::interface(class)));
        }
        Ok(DeclaredType::new(PropertyType::object(Some(class))))
    }

    /// A closing `>`, splitting `>>` so nested parameter lists close one at a time.
    fn close_angle(&mut self, tag: &str) -> Result<()> {
        let token = self.lexer.next_token(true)?;
        if token.is_symbol(">") {
            return Ok(());
        }
        if token.is_symbol(">>") || token.is_symbol(">>>") {
            self.lexer.split_first_char(&token);
            return Ok(());
        }
        self.lexer.rewind(&token);
        Err(self.syntax_error(format!("Missing '>' in {tag}")))
    }

    // ==========================================================================
    // Names
    // ==========================================================================

    /// Read a variable name and optional `[dim]`, and declare it in `scope`.
    ///
    /// Returns the new property, or `None` when `site.skip` is set.
    pub(crate) fn get_var_name_and_dim(
        &mut self,
        scope: StructId,
        declared: &DeclaredType,
        site: VarSite<'_>,
    ) -> Result<Option<PropertyId>> {
        let line = self.lexer.line();
        let name_text = match site.name {
            Some(name) => name.to_string(),
            None => match self.get_identifier()? {
                Some(token) => token.lexeme.to_string(),
                None => return Err(self.syntax_error("Missing variable name")),
            },
        };
        let name = self.intern(&name_text);

        if !site.skip {
            if self.registry.find_own_field(scope, &name).is_some() {
                return Err(self.decl_error(format!("{}: '{name_text}' already defined", site.thing)));
            }
        }

        let mut ty = declared.ty.clone();
        if self.match_symbol("[")? {
            if site.no_arrays {
                return Err(self.decl_error("Arrays aren't allowed in this context"));
            }
            if ty.kind == PropertyKind::Bool {
                return Err(self.decl_error("Bool arrays are not allowed"));
            }
            if !ty.is_scalar() {
                return Err(self.decl_error("Arrays within arrays not supported"));
            }
            let dim = self
                .get_const_int(&format!("{} {name_text}", site.thing))
                .map_err(|_| self.syntax_error(format!("{} {name_text}: Bad or missing array size", site.thing)))?;
            if dim <= 1 || dim > MAX_ARRAY_SIZE {
                return Err(self.decl_error(format!("{} {name_text}: Illegal array size {dim}", site.thing)));
            }
            ty.array_dim = dim;
            if !self.match_symbol("]")? {
                return Err(self.syntax_error(format!("{} {name_text}: Missing ']'", site.thing)));
            }
        } else if self.peek_symbol("(")? {
            return Err(self.syntax_error("Use [] for arrays, not ()"));
        }

        let tags = if site.metadata { self.parse_metadata_tags()? } else { Vec::new() };
        if site.skip {
            return Ok(None);
        }

        let id = match layout::group_insert_index(self.registry, scope, &ty) {
            Some(index) => self.registry.insert_property(scope, index, name, ty, line),
            None => self.registry.add_property(scope, name, ty, line),
        };
        let property = self.registry.property_mut(id);
        property.delegate_name = declared.delegate_name.clone();
        if let Some(category) = site.category {
            property.category = category;
        }
        if !tags.is_empty() {
            self.metadata.entry(self.class).properties.entry(id).or_default().tags = tags;
        }
        Ok(Some(id))
    }

    // ==========================================================================
    // var and local
    // ==========================================================================

    /// `var[(Category)] Type Name[, Name...]` or `local Type Name[, Name...]`.
    pub(super) fn compile_variables(&mut self, local: bool) -> Result<()> {
        let disallow = if local {
            self.check_allow("'Local'", Allow::VAR_DECL)?;
            if self.nests.top_kind() == NestKind::Class {
                return Err(self.decl_error("Local variables are only allowed in functions"));
            }
            PropertyFlags::all()
        } else {
            self.check_allow("'Var'", Allow::VAR_DECL)?;
            if self.nests.top_kind() != NestKind::Class {
                return Err(self.decl_error("Instance variables are only allowed at class scope (use 'local'?)"));
            }
            PropertyFlags::PARM_FLAGS
        };

        let mut edit_flags = PropertyFlags::empty();
        let mut category = None;
        if !local && self.match_symbol("(")? {
            edit_flags |= PropertyFlags::EDIT;
            category = Some(match self.get_identifier()? {
                Some(name) => self.intern(name.lexeme),
                None => self.intern(&self.class_name.clone()),
            });
            if !self.match_symbol(")")? {
                return Err(self.syntax_error("Missing ')' after editable category"));
            }
        }

        let scope = self.scope();
        let Some(mut declared) = self.get_var_type(scope, disallow, Some("Variable declaration"))? else {
            return Err(self.syntax_error("Variable declaration: Missing variable type"));
        };
        declared.ty.flags |= edit_flags;
        if declared.ty.flags.contains(PropertyFlags::EDIT) && category.is_none() {
            category = Some(self.intern(&self.class_name.clone()));
        }

        if declared.ty.flags.intersects(PropertyFlags::TRANSIENT | PropertyFlags::NATIVE)
            && self.nests.top_kind() != NestKind::Class
        {
            return Err(self.decl_error("Static and local variables may not be transient or native"));
        }
        if declared.ty.flags.intersects(PropertyFlags::PARM_FLAGS) {
            return Err(self.decl_error("Illegal type modifiers in variable"));
        }
        if declared.ty.flags.contains(PropertyFlags::NATIVE)
            && !self.registry.struct_def(self.class).class_flags().contains(ClassFlags::NATIVE)
        {
            return Err(self.decl_error("Native variables are only allowed in native classes"));
        }

        loop {
            let site = VarSite::new("Variable declaration").category(category.clone()).with_metadata();
            self.get_var_name_and_dim(scope, &declared, site)?;
            if !self.match_symbol(",")? {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ParseFixture;
    use super::*;

    fn parse(source: &str) -> (ParseFixture, StructId) {
        let mut fixture = ParseFixture::new();
        let class = fixture.parse_test(source).unwrap();
        (fixture, class)
    }

    fn parse_err(source: &str) -> String {
        let mut fixture = ParseFixture::new();
        fixture.parse_test(source).unwrap_err().message()
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    #[test]
    fn simple_types() {
        let (fixture, class) = parse("class Test; var int I; var float F; var string S; var name N; var byte B;");
        assert_eq!(fixture.property_type(class, "I").kind, PropertyKind::Int);
        assert_eq!(fixture.property_type(class, "F").kind, PropertyKind::Float);
        assert_eq!(fixture.property_type(class, "S").kind, PropertyKind::String);
        assert_eq!(fixture.property_type(class, "N").kind, PropertyKind::Name);
        assert_eq!(fixture.property_type(class, "B").kind, PropertyKind::Byte);
    }

    #[test]
    fn specifiers_become_flags() {
        let (fixture, class) = parse("class Test config(Game); var config transient int I; var localized string S;");
        let flags = fixture.property_type(class, "I").flags;
        assert!(flags.contains(PropertyFlags::CONFIG | PropertyFlags::TRANSIENT));
        let flags = fixture.property_type(class, "S").flags;
        assert!(flags.contains(PropertyFlags::LOCALIZED | PropertyFlags::CONST));
    }

    #[test]
    fn editable_category_defaults_to_class_name() {
        let (fixture, class) = parse("class Test; var() int A; var(Display) int B;");
        let Some(FieldRef::Property(a)) = fixture.field(class, "A") else { panic!() };
        let Some(FieldRef::Property(b)) = fixture.field(class, "B") else { panic!() };
        assert_eq!(fixture.registry.property(a).category.as_str(), "Test");
        assert_eq!(fixture.registry.property(b).category.as_str(), "Display");
        assert!(fixture.registry.property(a).ty.flags.contains(PropertyFlags::EDIT));
    }

    #[test]
    fn dynamic_arrays_and_nested_class_limitors() {
        let (fixture, class) = parse("class Test; var array<int> A; var array<class<Object>> C;");
        assert!(fixture.property_type(class, "A").is_dynamic_array());
        let c = fixture.property_type(class, "C");
        assert!(c.is_dynamic_array());
        assert_eq!(c.class, Some(fixture.registry.class_class()));
        assert_eq!(c.meta_class, Some(fixture.registry.object_class()));
    }

    #[test]
    fn arrays_within_arrays() {
        assert_eq!(parse_err("class Test; var array<array<int> > A;"), "Arrays within arrays not supported");
    }

    #[test]
    fn maps_carry_their_key() {
        let (fixture, class) = parse("class Test; var map<name, int> M;");
        let ty = fixture.property_type(class, "M");
        assert!(ty.is_map());
        assert_eq!(ty.kind, PropertyKind::Int);
        assert_eq!(ty.map_key.as_ref().unwrap().kind, PropertyKind::Name);
    }

    #[test]
    fn static_arrays() {
        let (fixture, class) = parse("class Test; const Size = 4; var int A[Size]; var int B[8];");
        assert_eq!(fixture.property_type(class, "A").array_dim, 4);
        assert_eq!(fixture.property_type(class, "B").array_dim, 8);
    }

    #[test]
    fn illegal_array_sizes() {
        assert_eq!(parse_err("class Test; var int A[1];"), "Variable declaration A: Illegal array size 1");
        assert_eq!(parse_err("class Test; var int A[X];"), "Variable declaration A: Bad or missing array size");
        assert_eq!(parse_err("class Test; var bool A[2];"), "Bool arrays are not allowed");
        assert_eq!(parse_err("class Test; var int A(2);"), "Use [] for arrays, not ()");
    }

    #[test]
    fn obsolete_string_size_warns() {
        let (fixture, class) = parse("class Test; var string[32] S;");
        assert_eq!(fixture.property_type(class, "S").kind, PropertyKind::String);
        assert!(fixture.diagnostics.contains("String sizes are now obsolete"));
    }

    #[test]
    fn unknown_type() {
        assert_eq!(parse_err("class Test; var Widget W;"), "Unrecognized type 'Widget'");
        assert_eq!(parse_err("class Test; var int;"), "Missing variable name");
    }

    #[test]
    fn class_member_types() {
        let mut fixture = ParseFixture::new();
        let base = fixture.class("Base", None);
        fixture.parse(base, "class Base; enum EMode { M_A, M_B };").unwrap();
        let class = fixture.class("Test", Some("Base"));
        fixture.parse(class, "class Test extends Base; var Base.EMode Mode;").unwrap();
        assert!(fixture.property_type(class, "Mode").is_enum());
    }

    #[test]
    fn delegate_waits_for_its_function() {
        let (fixture, class) = parse("class Test; var delegate<OnDone> Handler; delegate OnDone();");
        let ty = fixture.property_type(class, "Handler");
        assert_eq!(ty.kind, PropertyKind::Delegate);
        let on_done = fixture.function(class, "OnDone");
        assert_eq!(ty.function, Some(on_done));
    }

    #[test]
    fn disallowed_modifiers() {
        assert_eq!(parse_err("class Test; var out int X;"), "Specified type modifiers not allowed here");
        assert_eq!(
            parse_err("class Test; var private protected int X;"),
            "Variables can't be both 'private' and 'protected'"
        );
        assert_eq!(
            parse_err("class Test; var native int X;"),
            "Native variables are only allowed in native classes"
        );
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    #[test]
    fn comma_separated_names() {
        let (fixture, class) = parse("class Test; var int A, B, C;");
        for name in ["A", "B", "C"] {
            assert_eq!(fixture.property_type(class, name).kind, PropertyKind::Int);
        }
    }

    #[test]
    fn redeclaration_in_same_scope() {
        assert_eq!(parse_err("class Test; var int A; var float A;"), "Variable declaration: 'A' already defined");
    }

    #[test]
    fn bools_group_together() {
        let (fixture, class) = parse("class Test; var bool A; var int I; var bool B;");
        let names: Vec<_> = fixture
            .registry
            .struct_def(class)
            .own_properties()
            .map(|id| fixture.registry.property(id).name.to_string())
            .collect();
        assert_eq!(names, ["A", "B", "I"]);
    }

    #[test]
    fn var_inside_function() {
        assert_eq!(
            parse_err("class Test; function F() { var int X; }"),
            "Instance variables are only allowed at class scope (use 'local'?)"
        );
    }

    #[test]
    fn local_at_class_scope() {
        assert_eq!(parse_err("class Test; local int X;"), "Local variables are only allowed in functions");
    }

    #[test]
    fn locals_belong_to_the_function() {
        let (fixture, class) = parse("class Test; function F() { local int A, B; local string S; }");
        let function = fixture.function(class, "F");
        assert_eq!(fixture.property_type(function, "A").kind, PropertyKind::Int);
        assert_eq!(fixture.property_type(function, "S").kind, PropertyKind::String);
    }

    #[test]
    fn locals_take_no_modifiers() {
        assert_eq!(
            parse_err("class Test; function F() { local const int A; }"),
            "Specified type modifiers not allowed here"
        );
    }
}
