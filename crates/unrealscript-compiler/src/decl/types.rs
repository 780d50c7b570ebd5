//! Enums, structs and consts.

use unrealscript_core::{EnumId, FieldRef, Name, PropertyFlags, StructFlags, StructId};
use unrealscript_registry::{layout, EnumDef, ScriptStructData, StructData};

use super::VarSite;
use crate::context::{CompilerContext, Pass, Result};
use crate::nest::NestKind;

/// Tags an enum may declare; `_MAX` takes the value after the last one.
const MAX_ENUM_TAGS: usize = 255;

impl<'a> CompilerContext<'a> {
    // ==========================================================================
    // Enums
    // ==========================================================================

    /// `enum Name { Tag, Tag }`, with the trailing `_MAX` tag added.
    pub(crate) fn compile_enum(&mut self, scope: StructId) -> Result<EnumId> {
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("Enums can only be declared in class or struct scope"));
        }
        let name_token = self.require_name("enumeration")?;
        let name_text = name_token.lexeme;
        let name = self.intern(name_text);
        if self.registry.find_own_field(scope, &name).is_some() {
            return Err(self.decl_error(format!("enum: '{name_text}' already defined here")));
        }
        self.check_obscures(scope, name_text);
        self.require_symbol("{", "'Enum'")?;

        let mut texts: Vec<&str> = Vec::new();
        while let Some(tag) = self.get_identifier()? {
            if texts.iter().any(|text| text.eq_ignore_ascii_case(tag.lexeme)) {
                return Err(self.decl_error(format!("Duplicate enumeration tag {}", tag.lexeme)));
            }
            if texts.len() >= MAX_ENUM_TAGS {
                return Err(self.decl_error(format!("Exceeded maximum of {MAX_ENUM_TAGS} enumerators")));
            }
            texts.push(tag.lexeme);
            // Per-tag metadata is for tools only.
            self.parse_metadata_tags()?;
            if !self.match_symbol(",")? {
                break;
            }
        }
        if texts.is_empty() {
            return Err(self.decl_error("Enumeration must contain at least one enumerator"));
        }
        self.require_symbol("}", "'Enum'")?;

        let max = format!("{}_MAX", EnumDef::generate_prefix(name_text, &texts));
        if texts.iter().any(|text| text.eq_ignore_ascii_case(&max)) {
            return Err(self.decl_error(format!("Enumeration tag '{max}' is reserved for the enumeration maximum")));
        }
        let mut tags: Vec<Name> = texts.iter().map(|text| self.registry.intern(text)).collect();
        tags.push(self.registry.intern(&max));
        Ok(self.registry.add_enum(scope, name, tags))
    }

    // ==========================================================================
    // Structs
    // ==========================================================================

    /// `struct [specifiers] Name [extends Base] { members }`.
    pub(crate) fn compile_struct(&mut self, scope: StructId) -> Result<StructId> {
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("Structs can only be declared in class or struct scope"));
        }

        let mut flags = StructFlags::empty();
        let name_token = loop {
            let Some(token) = self.get_identifier()? else {
                return Err(self.syntax_error("Missing struct name"));
            };
            let specifier = match token.lexeme.to_ascii_lowercase().as_str() {
                "native" => StructFlags::NATIVE,
                "export" => StructFlags::EXPORT,
                "transient" => StructFlags::TRANSIENT,
                "atomic" => StructFlags::ATOMIC,
                "immutable" => StructFlags::IMMUTABLE | StructFlags::ATOMIC,
                "atomicwhencooked" => StructFlags::ATOMIC_WHEN_COOKED,
                "immutablewhencooked" => StructFlags::IMMUTABLE_WHEN_COOKED | StructFlags::ATOMIC_WHEN_COOKED,
                "strictconfig" => StructFlags::STRICT_CONFIG,
                _ => break token,
            };
            flags |= specifier;
        };

        let name_text = name_token.lexeme;
        let name = self.intern(name_text);
        if self.registry.find_own_field(scope, &name).is_some() {
            return Err(self.decl_error(format!("struct: '{name_text}' already defined here")));
        }
        self.check_obscures(scope, name_text);

        let base = if self.match_identifier("extends")? {
            Some(self.struct_base(scope)?)
        } else {
            None
        };

        let line = name_token.span.line;
        let data = ScriptStructData {
            flags,
            ..ScriptStructData::default()
        };
        let id = self.registry.add_struct(scope, name.clone(), StructData::ScriptStruct(data), line);
        self.registry.struct_mut(id).super_struct = base;

        self.require_symbol("{", "'struct'")?;
        self.compile_struct_members(id, &name)?;

        if let Some(base) = base {
            let inherited = self
                .registry
                .struct_def(base)
                .as_script_struct()
                .map(|data| data.flags & StructFlags::INHERIT)
                .unwrap_or_default();
            if let Some(data) = self.registry.struct_mut(id).as_script_struct_mut() {
                data.flags |= inherited;
            }
        }
        layout::link(self.registry, id);
        Ok(id)
    }

    /// `Name` or `Class.Name` after `extends`.
    fn struct_base(&mut self, scope: StructId) -> Result<StructId> {
        let Some(first) = self.get_identifier()? else {
            return Err(self.syntax_error("'struct': Missing parent struct after 'Extends'"));
        };
        let (found, shown) = if self.match_symbol(".")? {
            let Some(second) = self.get_identifier()? else {
                return Err(self.syntax_error(format!(
                    "'struct': Missing parent struct type after '{}.'",
                    first.lexeme
                )));
            };
            let found = self.registry.find_class(first.lexeme).and_then(|class| {
                let name = self.registry.find_name(second.lexeme)?;
                self.registry.find_field_in(class, &name)
            });
            (found, format!("{}.{}", first.lexeme, second.lexeme))
        } else {
            let found = self.registry.find_name(first.lexeme).and_then(|name| {
                self.registry
                    .find_field(scope, &name)
                    .or_else(|| self.registry.find_global_type(&name))
            });
            (found, first.lexeme.to_string())
        };
        match found {
            Some(FieldRef::Struct(id)) if self.registry.struct_def(id).is_script_struct() => Ok(id),
            _ => Err(self.decl_error(format!("'struct': Can't find parent struct class '{shown}'"))),
        }
    }

    fn compile_struct_members(&mut self, id: StructId, name: &Name) -> Result<()> {
        loop {
            let Some(token) = self.next_raw(true)? else {
                return Err(self.syntax_error(format!("Missing '}}' at end of struct '{name}'")));
            };
            if token.is_symbol("}") {
                return Ok(());
            }
            if token.is_identifier("struct") {
                self.compile_struct(id)?;
                self.require_symbol(";", "'struct'")?;
            } else if token.is_identifier("const") {
                let class = self.class;
                self.compile_const(class)?;
                self.require_symbol(";", "'const'")?;
            } else if token.is_identifier("var") {
                self.compile_struct_var(id, name)?;
            } else if token.is_identifier("structdefaultproperties") {
                self.require_symbol("{", "'structdefaultproperties'")?;
                let text = self.lexer.capture_braced()?.to_string();
                if let Some(data) = self.registry.struct_mut(id).as_script_struct_mut() {
                    data.defaults_text = Some(text);
                }
            } else if token.is_identifier("structcpptext") {
                let native = self
                    .registry
                    .struct_def(id)
                    .as_script_struct()
                    .is_some_and(|data| data.flags.contains(StructFlags::NATIVE));
                if !native {
                    return Err(self.decl_error("'structcpptext' is only allowed in native structs"));
                }
                self.require_symbol("{", "'structcpptext'")?;
                let text = self.lexer.capture_braced()?.to_string();
                if let Some(data) = self.registry.struct_mut(id).as_script_struct_mut() {
                    data.cpp_text = Some(text);
                }
            } else {
                return Err(self.syntax_error(format!("'struct': Expecting 'Var', got '{}'", token.lexeme)));
            }
        }
    }

    /// `var[(Category)] Type Name[, Name];` inside a struct.
    fn compile_struct_var(&mut self, id: StructId, name: &Name) -> Result<()> {
        let mut edit_flags = PropertyFlags::empty();
        let mut category = None;
        if self.match_symbol("(")? {
            edit_flags |= PropertyFlags::EDIT;
            category = Some(match self.get_identifier()? {
                Some(token) => self.intern(token.lexeme),
                None => name.clone(),
            });
            self.require_symbol(")", "Editable 'struct' member variable")?;
        }

        let Some(mut declared) = self.get_var_type(id, PropertyFlags::PARM_FLAGS, Some("'struct' member variable"))?
        else {
            return Err(self.syntax_error("'struct' member variable: Missing variable type"));
        };
        declared.ty.flags |= edit_flags;
        if declared.ty.flags.contains(PropertyFlags::EDIT) && category.is_none() {
            category = Some(name.clone());
        }
        if declared.ty.flags.intersects(PropertyFlags::PARM_FLAGS) {
            return Err(self.decl_error("Illegal type modifiers in variable"));
        }
        if declared.ty.flags.contains(PropertyFlags::COMPONENT) {
            if let Some(data) = self.registry.struct_mut(id).as_script_struct_mut() {
                data.flags |= StructFlags::HAS_COMPONENTS;
            }
        }

        loop {
            let site = VarSite::new("Variable declaration").category(category.clone()).with_metadata();
            self.get_var_name_and_dim(id, &declared, site)?;
            if !self.match_symbol(",")? {
                break;
            }
        }
        self.require_symbol(";", "'struct'")
    }

    // ==========================================================================
    // Consts
    // ==========================================================================

    /// `const Name = Value`. The value's text is kept and re-read where used.
    pub(crate) fn compile_const(&mut self, scope: StructId) -> Result<()> {
        let Some(name_token) = self.get_identifier()? else {
            return Err(self.syntax_error("Missing constant name"));
        };
        let name_text = name_token.lexeme;
        let name = self.intern(name_text);
        let existing = self.registry.find_own_field(scope, &name);
        let redeclared = self.pass == Pass::Compile && matches!(existing, Some(FieldRef::Const(_)));
        if existing.is_some() && !redeclared {
            return Err(self.decl_error(format!("const: '{name_text}' already defined")));
        }
        if !redeclared {
            self.check_obscures(scope, name_text);
        }
        self.require_symbol("=", "'const'")?;

        let start = self.peek_raw()?.span.offset;
        let Some(value) = self.get_token(None, false)? else {
            return Err(self.syntax_error(format!("const {name_text}: Missing value")));
        };
        let text = if value.is_identifier("sizeof") {
            self.const_size_of()?.to_string()
        } else if value.is_constant() {
            self.lexer.slice(start, self.lexer.offset()).trim().to_string()
        } else {
            return Err(self.syntax_error(format!("const {name_text}: Value is not constant")));
        };

        // A const after the first command is declared the first time the
        // compile pass reaches it.
        if !redeclared {
            self.registry.add_const(scope, name, text, name_token.span.line);
        }
        Ok(())
    }

    /// `sizeof(Class)`: the byte size of the class's properties.
    fn const_size_of(&mut self) -> Result<u32> {
        self.require_symbol("(", "'sizeof'")?;
        let Some(class_name) = self.get_identifier()? else {
            return Err(self.syntax_error("Missing class name"));
        };
        let Some(class) = self.registry.find_class(class_name.lexeme) else {
            return Err(self.syntax_error(format!("Bad class name '{}'", class_name.lexeme)));
        };
        self.require_symbol(")", "'sizeof'")?;
        let size = self.registry.struct_def(class).properties_size;
        log::debug!("sizeof({}) = {size}", class_name.lexeme);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ParseFixture;
    use super::*;
    use unrealscript_core::PropertyKind;

    fn parse(source: &str) -> (ParseFixture, StructId) {
        let mut fixture = ParseFixture::new();
        let class = fixture.parse_test(source).unwrap();
        (fixture, class)
    }

    fn parse_err(source: &str) -> String {
        let mut fixture = ParseFixture::new();
        fixture.parse_test(source).unwrap_err().message()
    }

    fn tag_names(fixture: &ParseFixture, class: StructId, name: &str) -> Vec<String> {
        let Some(FieldRef::Enum(id)) = fixture.field(class, name) else {
            panic!("no enum {name}");
        };
        fixture.registry.enum_def(id).tags.iter().map(|tag| tag.to_string()).collect()
    }

    // ==========================================================================
    // Enums
    // ==========================================================================

    #[test]
    fn enum_gets_a_max_tag() {
        let (fixture, class) = parse("class Test; enum EPhysics { PHYS_None, PHYS_Walking, PHYS_Falling };");
        assert_eq!(tag_names(&fixture, class, "EPhysics"), ["PHYS_None", "PHYS_Walking", "PHYS_Falling", "PHYS_MAX"]);
    }

    #[test]
    fn enum_without_prefix_uses_its_name() {
        let (fixture, class) = parse("class Test; enum EColor { Red, Green };");
        assert_eq!(tag_names(&fixture, class, "EColor").last().unwrap(), "EColor_MAX");
    }

    #[test]
    fn enum_errors() {
        assert_eq!(parse_err("class Test; enum E { A, A };"), "Duplicate enumeration tag A");
        assert_eq!(parse_err("class Test; enum E { };"), "Enumeration must contain at least one enumerator");
        assert_eq!(parse_err("class Test; enum E { A, B }; enum E { C };"), "enum: 'E' already defined here");
        assert_eq!(parse_err("class Test; enum { A };"), "Missing enumeration name");
        assert_eq!(
            parse_err("class Test; enum E { E_A, E_MAX };"),
            "Enumeration tag 'E_MAX' is reserved for the enumeration maximum"
        );
    }

    #[test]
    fn too_many_enumerators() {
        let tags: Vec<String> = (0..256).map(|i| format!("T{i}")).collect();
        let source = format!("class Test; enum E {{ {} }};", tags.join(", "));
        assert_eq!(parse_err(&source), "Exceeded maximum of 255 enumerators");
    }

    #[test]
    fn inline_enum_variable() {
        let (fixture, class) = parse("class Test; var enum EMode { M_On, M_Off } Mode;");
        let ty = fixture.property_type(class, "Mode");
        assert!(ty.is_enum());
        assert!(fixture.field(class, "EMode").is_some());
    }

    #[test]
    fn obscuring_a_base_class_enum_warns() {
        let mut fixture = ParseFixture::new();
        let base = fixture.class("Base", None);
        fixture.parse(base, "class Base; enum EMode { M_A };").unwrap();
        let class = fixture.class("Test", Some("Base"));
        fixture.parse(class, "class Test extends Base; enum EMode { M_B };").unwrap();
        assert!(fixture.diagnostics.contains("'EMode' obscures 'Base.EMode' defined in base class."));
    }

    // ==========================================================================
    // Structs
    // ==========================================================================

    #[test]
    fn struct_members_and_layout() {
        let (fixture, class) = parse("class Test; struct Pair { var int A; var() float B; };");
        let Some(FieldRef::Struct(pair)) = fixture.field(class, "Pair") else {
            panic!("no Pair");
        };
        assert_eq!(fixture.property_type(pair, "A").kind, PropertyKind::Int);
        let Some(FieldRef::Property(b)) = fixture.field(pair, "B") else {
            panic!("no B");
        };
        assert_eq!(fixture.registry.property(b).category.as_str(), "Pair");
        assert_eq!(fixture.registry.struct_def(pair).properties_size, 8);
    }

    #[test]
    fn struct_specifiers_and_blocks() {
        let (fixture, class) = parse(
            "class Test; struct native atomic Pair { var int A; structdefaultproperties { A=1 } structcpptext { int Get(); } };",
        );
        let Some(FieldRef::Struct(pair)) = fixture.field(class, "Pair") else {
            panic!("no Pair");
        };
        let data = fixture.registry.struct_def(pair).as_script_struct().unwrap();
        assert!(data.flags.contains(StructFlags::NATIVE | StructFlags::ATOMIC));
        assert_eq!(data.defaults_text.as_deref().map(str::trim), Some("A=1"));
        assert_eq!(data.cpp_text.as_deref().map(str::trim), Some("int Get();"));
    }

    #[test]
    fn struct_extends_and_inherits_flags() {
        let (fixture, class) = parse(
            "class Test; struct atomic Base { var int A; }; struct Derived extends Base { var int B; };",
        );
        let Some(FieldRef::Struct(derived)) = fixture.field(class, "Derived") else {
            panic!("no Derived");
        };
        let def = fixture.registry.struct_def(derived);
        assert!(def.super_struct.is_some());
        assert!(def.as_script_struct().unwrap().flags.contains(StructFlags::ATOMIC));
        assert_eq!(def.properties_size, 8);
    }

    #[test]
    fn struct_errors() {
        assert_eq!(parse_err("class Test; struct S extends Missing { };"), "'struct': Can't find parent struct class 'Missing'");
        assert_eq!(parse_err("class Test; struct S { function F(); };"), "'struct': Expecting 'Var', got 'function'");
        assert_eq!(parse_err("class Test; struct S { var int A; }; struct S { };"), "struct: 'S' already defined here");
        assert_eq!(
            parse_err("class Test; struct S { structcpptext { } };"),
            "'structcpptext' is only allowed in native structs"
        );
    }

    #[test]
    fn struct_variable_uses_struct_type() {
        let (fixture, class) = parse("class Test; struct Pair { var int A; }; var Pair P;");
        assert_eq!(fixture.property_type(class, "P").kind, PropertyKind::Struct);
    }

    // ==========================================================================
    // Consts
    // ==========================================================================

    fn const_text(fixture: &ParseFixture, class: StructId, name: &str) -> String {
        let Some(FieldRef::Const(id)) = fixture.field(class, name) else {
            panic!("no const {name}");
        };
        fixture.registry.const_def(id).value.clone()
    }

    #[test]
    fn const_keeps_source_text() {
        let (fixture, class) = parse("class Test; const A = 10; const B = \"text\"; const C = -2.5; const D = 'Tag';");
        assert_eq!(const_text(&fixture, class, "A"), "10");
        assert_eq!(const_text(&fixture, class, "B"), "\"text\"");
        assert_eq!(const_text(&fixture, class, "C"), "-2.5");
        assert_eq!(const_text(&fixture, class, "D"), "'Tag'");
    }

    #[test]
    fn const_sizeof_a_class() {
        let mut fixture = ParseFixture::new();
        let base = fixture.class("Base", None);
        fixture.parse(base, "class Base; var int A, B;").unwrap();
        fixture.parse_test("class Test; const Size = sizeof(Base);").unwrap();
        let class = fixture.registry.find_class("Test").unwrap();
        let base_size = fixture.registry.struct_def(base).properties_size;
        assert_eq!(const_text(&fixture, class, "Size"), base_size.to_string());
    }

    #[test]
    fn const_errors() {
        assert_eq!(parse_err("class Test; const A = 1; const A = 2;"), "const: 'A' already defined");
        assert_eq!(parse_err("class Test; const A = Foo;"), "const A: Value is not constant");
        assert_eq!(parse_err("class Test; const A 1;"), "Missing '=' in 'const'");
        assert_eq!(parse_err("class Test; const = 1;"), "Missing constant name");
        assert_eq!(parse_err("class Test; const A = sizeof(Nothing);"), "Bad class name 'Nothing'");
    }
}
