//! Class headers, imports and the raw text blocks at class scope.

use unrealscript_core::{ClassFlags, Name, PropertyFlags, PropertyKind, PropertyType, StructId};
use unrealscript_registry::ClassEdge;

use crate::context::{CompilerContext, Result};
use crate::nest::{Allow, NestKind};

impl<'a> CompilerContext<'a> {
    /// `class Name [extends Parent] [within Outer] specifiers;`
    ///
    /// The driver registered the class under its parent before parsing, so
    /// `extends` only has to agree with it.
    pub(super) fn compile_class_header(&mut self, is_interface: bool) -> Result<()> {
        let Some(name) = self.get_identifier()? else {
            return Err(self.syntax_error("Missing class name"));
        };
        if name.lexeme.ends_with(|c: char| c.is_ascii_digit()) {
            self.warn(1, "Class names shouldn't end in a digit");
        }
        if !name.lexeme.eq_ignore_ascii_case(&self.class_name) {
            return Err(self.decl_error(format!("Class must be named {}, not {}", self.class_name, name.lexeme)));
        }

        let class = self.class;
        let parent = self.registry.super_class(class);
        if self.match_identifier("extends")? {
            let declared = self.get_qualified_class("'extends'")?;
            if parent != Some(declared) {
                let expected = match parent {
                    Some(parent) => self.registry.path_name(parent),
                    None => "None".to_string(),
                };
                return Err(self.class_error(format!(
                    "{}'s superclass must be {expected}, not {}",
                    self.registry.path_name(class),
                    self.registry.path_name(declared)
                )));
            }
        } else if let Some(parent) = parent.filter(|&parent| parent != self.registry.object_class()) {
            let parent = self.registry.struct_def(parent).name.to_string();
            return Err(self.class_error(format!("class: missing 'Extends {parent}'")));
        }

        let mut header = ClassHeader::inherit(self, parent);
        if is_interface {
            header.flags |= ClassFlags::INTERFACE | ClassFlags::ABSTRACT;
        }
        if let Some(parent) = parent {
            let parent_is_interface = self.registry.is_interface(parent);
            if parent_is_interface && !is_interface {
                return Err(self.class_error("Classes cannot extend interfaces"));
            }
            if is_interface && !parent_is_interface && parent != self.registry.object_class() {
                return Err(self.class_error("Interfaces can only extend other interfaces"));
            }
        }

        if self.match_identifier("within")? {
            header.within = Some(self.get_qualified_class("'within'")?);
        }
        self.class_specifiers(&mut header, parent)?;

        if header.flags.contains(ClassFlags::NO_EXPORT) && !header.flags.contains(ClassFlags::NATIVE) {
            return Err(self.class_error("'noexport': Only valid for native classes"));
        }
        let object = self.registry.object_class();
        let within = header.within.unwrap_or(object);
        let expected = parent
            .and_then(|parent| self.registry.class_data(parent))
            .and_then(|data| data.within)
            .unwrap_or(object);
        if !self.registry.is_child_of(within, expected) {
            return Err(self.class_error(format!(
                "'within': within {} is not a generalization of superclass within '{}'",
                self.registry.struct_def(within).name,
                self.registry.struct_def(expected).name
            )));
        }
        self.require_symbol(";", "'Class'")?;

        self.apply_class_header(header)?;
        self.push_nest(NestKind::Class, class, false)
    }

    fn class_specifiers(&mut self, header: &mut ClassHeader, parent: Option<StructId>) -> Result<()> {
        while let Some(token) = self.get_identifier()? {
            let word = token.lexeme.to_ascii_lowercase();
            match word.as_str() {
                "native" | "intrinsic" => {
                    let parent_native = parent
                        .map(|parent| self.registry.struct_def(parent).class_flags().contains(ClassFlags::NATIVE))
                        .unwrap_or(true);
                    if !parent_native {
                        return Err(self.class_error("Native classes cannot expand non-native classes"));
                    }
                    header.flags |= ClassFlags::NATIVE;
                    if self.match_symbol("(")? {
                        let Some(file) = self.get_identifier()? else {
                            return Err(self.syntax_error("native: Missing native header filename"));
                        };
                        header.native_header = Some(file.lexeme.to_string());
                        self.require_symbol(")", "native")?;
                    }
                }
                "noexport" => header.flags |= ClassFlags::NO_EXPORT,
                "nativereplication" => header.flags |= ClassFlags::NATIVE_REPLICATION,
                "editinlinenew" => header.flags |= ClassFlags::EDIT_INLINE_NEW,
                "noteditinlinenew" => header.flags.remove(ClassFlags::EDIT_INLINE_NEW),
                "placeable" => header.flags |= ClassFlags::PLACEABLE,
                "notplaceable" => header.flags.remove(ClassFlags::PLACEABLE),
                "hidedropdown" => header.flags |= ClassFlags::HIDE_DROP_DOWN,
                "perobjectconfig" => header.flags |= ClassFlags::PER_OBJECT_CONFIG,
                "abstract" => header.flags |= ClassFlags::ABSTRACT,
                "deprecated" => header.flags |= ClassFlags::DEPRECATED,
                "transient" => header.flags |= ClassFlags::TRANSIENT,
                "nontransient" => header.flags.remove(ClassFlags::TRANSIENT),
                "safereplace" => header.flags |= ClassFlags::SAFE_REPLACE,
                "collapsecategories" => header.flags |= ClassFlags::COLLAPSE_CATEGORIES,
                "dontcollapsecategories" => header.flags.remove(ClassFlags::COLLAPSE_CATEGORIES),
                "localized" => self.warn(1, "Class 'localized' keyword is no longer required"),
                "within" => header.within = Some(self.get_qualified_class("'within'")?),
                "dependson" => {
                    self.require_symbol("(", "dependsOn")?;
                    loop {
                        let Some(target) = self.get_identifier()? else {
                            return Err(self.syntax_error("dependsOn: Missing dependent name"));
                        };
                        let target_name = self.intern(target.lexeme);
                        header.depends_on.push(target_name);
                        if !self.match_symbol(",")? {
                            break;
                        }
                    }
                    self.require_symbol(")", "dependsOn")?;
                }
                "implements" => {
                    self.require_symbol("(", "'implements'")?;
                    loop {
                        let interface = self.get_qualified_class("implements")?;
                        if !self.registry.is_interface(interface) {
                            let name = self.registry.struct_def(interface).name.to_string();
                            return Err(self.class_error(format!("Class '{name}' is not an interface")));
                        }
                        if !header.interfaces.contains(&interface) {
                            header.interfaces.push(interface);
                        }
                        if !self.match_symbol(",")? {
                            break;
                        }
                    }
                    self.require_symbol(")", "'implements'")?;
                }
                "inherits" => {
                    if !header.flags.contains(ClassFlags::NATIVE) {
                        return Err(self.class_error("'inherits': Only valid for native classes"));
                    }
                    self.require_symbol("(", "'inherits'")?;
                    loop {
                        let Some(base) = self.get_identifier()? else {
                            return Err(self.syntax_error("inherits: Missing base class name"));
                        };
                        header.mi_bases.push((base.lexeme.to_string(), base.span.line));
                        if !self.match_symbol(",")? {
                            break;
                        }
                    }
                    self.require_symbol(")", "'inherits'")?;
                }
                "guid" => {
                    self.require_symbol("(", "'Guid'")?;
                    for (index, part) in header.guid.iter_mut().enumerate() {
                        if index > 0 {
                            self.require_symbol(",", "'Guid'")?;
                        }
                        *part = self.get_const_int("'Guid'")? as u32;
                    }
                    self.require_symbol(")", "'Guid'")?;
                }
                "config" => {
                    if self.match_symbol("(")? {
                        let Some(config) = self.get_identifier()? else {
                            return Err(self.syntax_error("config: Missing configuration name"));
                        };
                        header.config_name = Some(self.intern(config.lexeme));
                        self.require_symbol(")", "config")?;
                    } else if header.config_name.is_none() {
                        return Err(self.syntax_error("config: Missing configuration name"));
                    }
                    header.flags |= ClassFlags::CONFIG;
                }
                "hidecategories" | "showcategories" | "autoexpandcategories" => {
                    let tag = match word.as_str() {
                        "hidecategories" => "HideCategories",
                        "showcategories" => "ShowCategories",
                        _ => "AutoExpandCategories",
                    };
                    self.require_symbol("(", &format!("'{tag}'"))?;
                    loop {
                        let Some(category) = self.get_identifier()? else {
                            return Err(self.syntax_error(format!("{tag}: Expected category name")));
                        };
                        let category = self.intern(category.lexeme);
                        match tag {
                            "HideCategories" => {
                                if !header.hide_categories.contains(&category) {
                                    header.hide_categories.push(category);
                                }
                            }
                            "ShowCategories" => header.hide_categories.retain(|hidden| *hidden != category),
                            _ => header.auto_expand_categories.push(category),
                        }
                        if !self.match_symbol(",")? {
                            break;
                        }
                    }
                    self.require_symbol(")", &format!("'{tag}'"))?;
                }
                _ => {
                    self.lexer.rewind(&token);
                    break;
                }
            }
        }
        Ok(())
    }

    fn apply_class_header(&mut self, header: ClassHeader) -> Result<()> {
        let class = self.class;
        for interface in &header.interfaces {
            self.registry.add_class_dependency(class, *interface, ClassEdge::Implements);
        }
        for target in &header.depends_on {
            if let Some(target) = self.registry.find_class_by_name(target) {
                self.registry.add_class_dependency(class, target, ClassEdge::DependsOn);
            }
        }

        if !header.mi_bases.is_empty() {
            let flags = PropertyFlags::NATIVE | PropertyFlags::CONST | PropertyFlags::NO_EXPORT | PropertyFlags::TRANSIENT;
            for (base, line) in &header.mi_bases {
                let name = self.intern(&format!("VfTable_{base}"));
                let ty = PropertyType::new(PropertyKind::Int).with_flags(flags);
                self.registry.add_property(class, name, ty, *line);
            }
            let bases = header.mi_bases.iter().map(|(base, _)| base.clone());
            self.metadata.entry(class).mi_bases.extend(bases);
        }

        let Some(data) = self.registry.class_data_mut(class) else {
            return Err(self.internal_error("Class header outside a class"));
        };
        data.flags = (data.flags & ClassFlags::BUILD_STATE) | header.flags;
        data.within = header.within;
        data.config_name = header.config_name;
        data.native_header = header.native_header;
        data.interfaces = header.interfaces;
        data.depends_on = header.depends_on;
        data.hide_categories = header.hide_categories;
        data.auto_expand_categories = header.auto_expand_categories;
        data.guid = header.guid;
        Ok(())
    }

    /// A possibly dotted class name, `Engine.Actor` or `Actor`.
    pub(crate) fn get_qualified_class(&mut self, thing: &str) -> Result<StructId> {
        let mut path = String::new();
        let mut last = None;
        while let Some(token) = self.get_identifier()? {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(token.lexeme);
            last = Some(token.lexeme);
            if !self.match_symbol(".")? {
                break;
            }
        }
        let Some(last) = last else {
            return Err(self.syntax_error(format!("{thing}: Missing class name")));
        };
        match self.registry.find_class(last) {
            Some(class) => Ok(class),
            None => Err(self.decl_error(format!("Class '{path}' not found"))),
        }
    }

    // ==========================================================================
    // Imports and blocks
    // ==========================================================================

    /// `import enum Name from Package;` or `import package Name;`.
    pub(super) fn compile_import(&mut self) -> Result<()> {
        self.check_allow("'Uses'", Allow::VAR_DECL)?;
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("'Uses' is are only allowed at class scope"));
        }
        let thing = self.next_raw(true)?;
        let thing = match thing {
            Some(thing) if thing.is_identifier("enum") || thing.is_identifier("package") => thing,
            _ => return Err(self.syntax_error("'import': Missing 'enum', 'struct', or 'package'")),
        };
        let Some(name) = self.get_identifier()? else {
            return Err(self.syntax_error("'import': Missing package, enum, or struct name to import"));
        };

        if thing.is_identifier("package") {
            log::debug!("{} imports package {}", self.class_name, name.lexeme);
            return Ok(());
        }
        if !self.match_identifier("from")? {
            return Err(self.syntax_error(format!("'Uses': Unrecognized '{}'", thing.lexeme)));
        }
        if self.get_identifier()?.is_none() {
            return Err(self.syntax_error("'Uses': Missing package name"));
        }
        let enum_name = self.intern(name.lexeme);
        if self.registry.find_global_type(&enum_name).is_none() {
            // Placeholder until the owning package declares it.
            self.registry.add_enum(self.class, enum_name, Vec::new());
        }
        Ok(())
    }

    /// `cpptext { ... }`, kept verbatim for native classes.
    pub(super) fn compile_cpp_text(&mut self) -> Result<()> {
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("'cpptext' is only allowed at class scope"));
        }
        if !self.registry.struct_def(self.class).class_flags().contains(ClassFlags::NATIVE) {
            return Err(self.decl_error("'cpptext' is only allowed in native classes"));
        }
        self.require_symbol("{", "'cpptext'")?;
        let text = self.lexer.capture_braced()?.to_string();
        if let Some(data) = self.registry.class_data_mut(self.class) {
            data.cpp_text = Some(text);
        }
        Ok(())
    }

    /// `defaultproperties { ... }`, kept for the defaults importer.
    pub(super) fn compile_default_properties(&mut self) -> Result<()> {
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("'defaultproperties' is only allowed at class scope"));
        }
        self.require_symbol("{", "'defaultproperties'")?;
        let text = self.lexer.capture_braced()?.to_string();
        if let Some(data) = self.registry.class_data_mut(self.class) {
            data.flags |= ClassFlags::NEEDS_DEF_PROPS;
            data.default_properties = Some(text);
        }
        Ok(())
    }

    /// `replication { ... }`: remembered here, compiled in pass 2.
    pub(super) fn skip_replication(&mut self) -> Result<()> {
        if self.nests.top_kind() != NestKind::Class {
            return Err(self.decl_error("'Replication' is not allowed here"));
        }
        self.require_symbol("{", "'Replication'")?;
        let here = self.lexer.here();
        self.metadata.entry(self.class).replication = Some(here);
        self.skip_statements(1, "'Replication'")
    }
}

/// Class attributes collected while reading the header.
struct ClassHeader {
    flags: ClassFlags,
    within: Option<StructId>,
    config_name: Option<Name>,
    native_header: Option<String>,
    interfaces: Vec<StructId>,
    depends_on: Vec<Name>,
    hide_categories: Vec<Name>,
    auto_expand_categories: Vec<Name>,
    mi_bases: Vec<(String, u32)>,
    guid: [u32; 4],
}

impl ClassHeader {
    /// Start from what a subclass of `parent` inherits.
    fn inherit(context: &CompilerContext<'_>, parent: Option<StructId>) -> Self {
        let data = parent.and_then(|parent| context.registry.class_data(parent));
        Self {
            flags: data.map(|data| data.flags & ClassFlags::SCRIPT_INHERIT).unwrap_or_default(),
            within: data.and_then(|data| data.within),
            config_name: data.and_then(|data| data.config_name.clone()),
            native_header: None,
            interfaces: Vec::new(),
            depends_on: Vec::new(),
            hide_categories: data.map(|data| data.hide_categories.clone()).unwrap_or_default(),
            auto_expand_categories: Vec::new(),
            mi_bases: Vec::new(),
            guid: [0; 4],
        }
    }
}
