//! A set of classes compiled together.

use std::sync::Arc;

use thiserror::Error;
use unrealscript_compiler::{BuildReport, CompilerOptions, DefaultsImporter, Driver, DriverError, ObjectLoader};
use unrealscript_core::{FieldRef, PropertyId, StructId};
use unrealscript_parser::{Lexer, TokenKind};
use unrealscript_registry::{RegistryError, SymbolRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("Missing 'Class' definition")]
    MissingHeader,

    #[error("{class}: Parent class '{parent}' is not registered")]
    UnknownParent { class: String, parent: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] DriverError),
}

/// Owns a registry and the options its classes are built with.
///
/// Classes are added as source text; the header decides where a class goes
/// in the tree, so a parent must be added before its children.
pub struct ScriptPackage {
    registry: SymbolRegistry,
    options: CompilerOptions,
}

impl Default for ScriptPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptPackage {
    pub fn new() -> Self {
        Self {
            registry: SymbolRegistry::new(),
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CompilerOptions {
        &mut self.options
    }

    /// Add a class, reading its name and parent from the `class` header.
    ///
    /// Source for `Object` replaces the intrinsic class's missing script.
    pub fn add_source(&mut self, source: &str) -> Result<StructId, PackageError> {
        let (name, parent) = class_header(source).ok_or(PackageError::MissingHeader)?;
        if let Some(existing) = self.registry.find_class(&name) {
            if existing == self.registry.object_class() || self.registry.class_source(existing).is_none() {
                self.registry.set_class_source(existing, Arc::from(source));
                return Ok(existing);
            }
        }
        let parent = parent.unwrap_or_else(|| "Object".to_string());
        self.add_class(&name, &parent, source)
    }

    /// Add a class under a named parent.
    pub fn add_class(&mut self, name: &str, parent: &str, source: &str) -> Result<StructId, PackageError> {
        let Some(parent_class) = self.registry.find_class(parent) else {
            return Err(PackageError::UnknownParent {
                class: name.to_string(),
                parent: parent.to_string(),
            });
        };
        let class = self
            .registry
            .register_class(name, Some(parent_class), Some(Arc::from(source)))?;
        log::debug!("Added class {name} under {parent}");
        Ok(class)
    }

    /// Build everything that is out of date, accepting all defaults.
    pub fn build(&mut self) -> Result<BuildReport, PackageError> {
        self.build_with(&mut unrealscript_compiler::AcceptDefaults, None)
    }

    pub fn build_with(
        &mut self,
        importer: &mut dyn DefaultsImporter,
        loader: Option<Box<dyn ObjectLoader>>,
    ) -> Result<BuildReport, PackageError> {
        let mut driver = Driver::new(&mut self.registry, self.options.clone());
        if let Some(loader) = loader {
            driver = driver.with_loader(loader);
        }
        Ok(driver.build(importer)?)
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SymbolRegistry {
        &mut self.registry
    }

    pub fn class(&self, name: &str) -> Option<StructId> {
        self.registry.find_class(name)
    }

    /// A function, state or struct declared directly in `class`.
    pub fn member(&self, class: &str, name: &str) -> Option<StructId> {
        self.own_field(class, name).and_then(|field| match field {
            FieldRef::Struct(id) => Some(id),
            _ => None,
        })
    }

    /// A variable declared directly in `class`.
    pub fn property(&self, class: &str, name: &str) -> Option<PropertyId> {
        self.own_field(class, name).and_then(|field| match field {
            FieldRef::Property(id) => Some(id),
            _ => None,
        })
    }

    /// The bytecode of a function or state in `class`.
    pub fn script(&self, class: &str, name: &str) -> Option<&[u8]> {
        let id = self.member(class, name)?;
        Some(&self.registry.struct_def(id).script)
    }

    fn own_field(&self, class: &str, name: &str) -> Option<FieldRef> {
        let class = self.registry.find_class(class)?;
        let name = self.registry.find_name(name)?;
        self.registry.find_own_field(class, &name)
    }
}

/// Name and optional parent from `class Name [extends Parent]`.
fn class_header(source: &str) -> Option<(String, Option<String>)> {
    let mut lexer = Lexer::new(source);
    loop {
        let token = lexer.next_token(true).ok()?;
        if token.is_eof() {
            return None;
        }
        if token.is_symbol("#") {
            lexer.skip_line();
            continue;
        }
        if token.is_identifier("class") || token.is_identifier("interface") {
            break;
        }
    }

    let name = lexer.next_token(true).ok()?;
    if name.kind != TokenKind::Identifier {
        return None;
    }
    let keyword = lexer.next_token(true).ok()?;
    if !keyword.is_identifier("extends") {
        return Some((name.lexeme.to_string(), None));
    }
    // `Package.Parent` names the same class as `Parent`.
    let mut parent = None;
    while let Ok(token) = lexer.next_token(true) {
        if token.kind != TokenKind::Identifier {
            break;
        }
        parent = Some(token.lexeme.to_string());
        if !lexer.peek_token(true).is_ok_and(|next| next.is_symbol(".")) {
            break;
        }
        lexer.next_token(true).ok()?;
    }
    Some((name.lexeme.to_string(), parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers() {
        assert_eq!(class_header("class Pawn;"), Some(("Pawn".to_string(), None)));
        assert_eq!(
            class_header("// Actor\n#linenumber 3\nclass Pawn extends Engine.Actor native;"),
            Some(("Pawn".to_string(), Some("Actor".to_string())))
        );
        assert_eq!(
            class_header("interface ITouch extends Interface;"),
            Some(("ITouch".to_string(), Some("Interface".to_string())))
        );
        assert_eq!(class_header("var int X;"), None);
    }

    #[test]
    fn qualified_parents_resolve_by_class_name() {
        let mut package = ScriptPackage::new();
        let actor = package.add_source("class Actor;").unwrap();
        let pawn = package.add_source("class Pawn extends Engine.Actor;").unwrap();
        assert_eq!(package.registry().super_class(pawn), Some(actor));
        assert_eq!(
            class_header("class Pawn extends Engine . Actor placeable;"),
            Some(("Pawn".to_string(), Some("Actor".to_string())))
        );
    }

    #[test]
    fn parents_must_come_first() {
        let mut package = ScriptPackage::new();
        let err = package.add_source("class Pawn extends Actor;").unwrap_err();
        assert_eq!(err.to_string(), "Pawn: Parent class 'Actor' is not registered");
    }

    #[test]
    fn object_source_attaches_to_the_intrinsic_class() {
        let mut package = ScriptPackage::new();
        let object = package.add_source("class Object native;").unwrap();
        assert_eq!(object, package.registry().object_class());
        assert!(package.registry().class_source(object).is_some());
    }

    #[test]
    fn duplicate_classes_are_rejected() {
        let mut package = ScriptPackage::new();
        package.add_source("class Pawn;").unwrap();
        let err = package.add_source("class Pawn;").unwrap_err();
        assert!(matches!(err, PackageError::Registry(RegistryError::DuplicateClass { .. })));
    }
}
