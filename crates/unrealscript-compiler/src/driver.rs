//! Multi-pass driver.
//!
//! Takes every class with source from [`Object`](SymbolRegistry::object_class)
//! down through three phases:
//!
//! 1. **Parse**: a class's `dependson` classes first, then its parent, then
//!    the class itself, then its subclasses.
//! 2. **Compile**: parents before children.
//! 3. **Defaults**: struct defaults, then class defaults, retried until
//!    nothing more can be imported.
//!
//! A class that fails is poisoned: it loses its build state and everything
//! that depends on it fails with it, while unrelated classes carry on. In
//! bootstrap mode the first error ends the run.

use rustc_hash::FxHashSet;
use thiserror::Error;

use unrealscript_core::{ClassFlags, CompilationError, Span, StructId};
use unrealscript_parser::{Lexer, TokenKind};
use unrealscript_registry::{MetadataRegistry, SymbolRegistry};

use crate::context::{CompilerContext, ObjectLoader, Pass};
use crate::diagnostics::Diagnostics;
use crate::options::CompilerOptions;
use crate::passes::{CompilePass, ParsePass, PassOutput};

/// Errors that end a driver run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Bootstrap mode stopped at the first error.
    #[error("{class}({line}) : Error, {message}")]
    Bootstrap { class: String, line: u32, message: String },

    #[error("Unknown class {0}")]
    UnknownClass(String),

    #[error("Compiler encountered circular BEGIN OBJECT dependency: {}", classes.join(", "))]
    CircularDefaults { classes: Vec<String> },
}

/// How an import attempt went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsImport {
    Imported,
    /// Needs another class's defaults first; retried next round.
    Deferred,
    Failed(String),
}

/// Host side of the defaults phase.
///
/// The compiler only captures `defaultproperties` and
/// `structdefaultproperties` text; turning it into values is up to the host.
pub trait DefaultsImporter {
    fn import_struct(&mut self, registry: &mut SymbolRegistry, script_struct: StructId, text: &str) -> DefaultsImport;

    /// `text` is `None` for a class without a `defaultproperties` block.
    fn import_class(&mut self, registry: &mut SymbolRegistry, class: StructId, text: Option<&str>) -> DefaultsImport;
}

/// An importer that accepts everything as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptDefaults;

impl DefaultsImporter for AcceptDefaults {
    fn import_struct(&mut self, _: &mut SymbolRegistry, _: StructId, _: &str) -> DefaultsImport {
        DefaultsImport::Imported
    }

    fn import_class(&mut self, _: &mut SymbolRegistry, _: StructId, _: Option<&str>) -> DefaultsImport {
        DefaultsImport::Imported
    }
}

/// What a run did.
#[derive(Debug)]
pub struct BuildReport {
    pub diagnostics: Diagnostics,
    pub lines: usize,
    pub statements: usize,
    /// Classes that went through pass 1 or pass 2 in this run.
    pub built: usize,
    /// Names of the poisoned classes.
    pub failed: Vec<String>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.diagnostics.has_errors()
    }

    pub fn summary(&self) -> String {
        if !self.is_success() {
            format!("Failure - {} error(s)", self.diagnostics.error_count())
        } else if self.built == 0 {
            "Success: Everything is up to date".to_string()
        } else {
            format!(
                "Success: Compiled {} line(s), {} statement(s).",
                self.lines, self.statements
            )
        }
    }
}

/// A deferred defaults block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingDefaults {
    Struct { class: StructId, script_struct: StructId },
    Class(StructId),
}

/// Runs the build phases over a registry.
pub struct Driver<'r> {
    registry: &'r mut SymbolRegistry,
    metadata: MetadataRegistry,
    options: CompilerOptions,
    diagnostics: Diagnostics,
    loader: Option<Box<dyn ObjectLoader>>,
    /// Classes whose pass 1 is under way, innermost last.
    parsing: Vec<StructId>,
    failed: FxHashSet<StructId>,
    /// Classes compiled in this run, parents first.
    compiled: Vec<StructId>,
    built: usize,
    lines: usize,
    statements: usize,
}

impl<'r> Driver<'r> {
    pub fn new(registry: &'r mut SymbolRegistry, options: CompilerOptions) -> Self {
        let diagnostics = Diagnostics::new(options.warning_level);
        Self {
            registry,
            metadata: MetadataRegistry::new(),
            options,
            diagnostics,
            loader: None,
            parsing: Vec::new(),
            failed: FxHashSet::default(),
            compiled: Vec::new(),
            built: 0,
            lines: 0,
            statements: 0,
        }
    }

    /// Resolve unknown `Class'Path'` literals through `loader`.
    pub fn with_loader(mut self, loader: Box<dyn ObjectLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build every class.
    pub fn build(self, importer: &mut dyn DefaultsImporter) -> Result<BuildReport, DriverError> {
        let root = self.registry.object_class();
        self.build_from(root, importer)
    }

    /// Build the subtree under the class named `name`.
    pub fn build_class(self, name: &str, importer: &mut dyn DefaultsImporter) -> Result<BuildReport, DriverError> {
        let root = self
            .registry
            .find_class(name)
            .ok_or_else(|| DriverError::UnknownClass(name.to_string()))?;
        self.build_from(root, importer)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn build_from(mut self, root: StructId, importer: &mut dyn DefaultsImporter) -> Result<BuildReport, DriverError> {
        if self.options.force_rebuild {
            for class in self.tree(root) {
                if let Some(data) = self.registry.class_data_mut(class) {
                    data.flags.remove(ClassFlags::BUILD_STATE);
                }
            }
        }

        log::debug!("Parsing scripts");
        self.parse_tree(root)?;
        log::debug!("Compiling scripts");
        self.compile_tree(root)?;
        log::debug!("Importing defaults");
        self.import_defaults(importer)?;

        let mut failed: Vec<String> = self
            .failed
            .iter()
            .map(|&class| self.registry.struct_def(class).name.to_string())
            .collect();
        failed.sort();
        let report = BuildReport {
            diagnostics: self.diagnostics,
            lines: self.lines,
            statements: self.statements,
            built: self.built,
            failed,
        };
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// `root` and every class below it, parents first.
    fn tree(&self, root: StructId) -> Vec<StructId> {
        let mut classes = vec![root];
        let mut next = 0;
        while next < classes.len() {
            let class = classes[next];
            classes.extend(self.registry.subclasses(class));
            next += 1;
        }
        classes
    }

    fn has_source(&self, class: StructId) -> bool {
        self.registry.class_data(class).is_some_and(|data| data.source.is_some())
    }

    fn flags(&self, class: StructId) -> ClassFlags {
        self.registry.struct_def(class).class_flags()
    }

    // ==========================================================================
    // Parse
    // ==========================================================================

    fn parse_tree(&mut self, class: StructId) -> Result<(), DriverError> {
        self.parse_class(class)?;
        for child in self.registry.subclasses(class) {
            self.parse_tree(child)?;
        }
        Ok(())
    }

    fn parse_class(&mut self, class: StructId) -> Result<(), DriverError> {
        let up_to_date = self.flags(class).contains(ClassFlags::PARSED);
        if !self.has_source(class) || up_to_date || self.failed.contains(&class) || self.parsing.contains(&class) {
            return Ok(());
        }

        self.parsing.push(class);
        let result = self.parse_with_dependencies(class);
        self.parsing.pop();
        result
    }

    fn parse_with_dependencies(&mut self, class: StructId) -> Result<(), DriverError> {
        if let Some(err) = self.parse_dependencies(class)? {
            self.report(class, std::slice::from_ref(&err))?;
            self.poison(class);
            return Ok(());
        }
        if let Some(parent) = self.registry.super_class(class) {
            self.parse_class(parent)?;
        }

        let name = self.registry.struct_def(class).name.to_string();
        log::info!("Parsing {name}");
        self.registry.clear_class(class);
        self.metadata.begin(class);
        let Some(output) = self.run_pass(class, Pass::Parse) else {
            return Ok(());
        };
        self.finish_pass(class, output)
    }

    /// Parse the classes named by `dependson` and `implements`, or the error
    /// that stops `class`.
    fn parse_dependencies(&mut self, class: StructId) -> Result<Option<CompilationError>, DriverError> {
        let Some(source) = self.registry.class_source(class) else {
            return Ok(None);
        };
        let name = self.registry.struct_def(class).name.to_string();
        for dependency in header_dependencies(&source) {
            let HeaderDependency { kind, name: target_name, span } = dependency;
            let Some(target) = self.registry.find_class(&target_name) else {
                // The header reports unknown interfaces itself.
                if kind == DependencyKind::Implements {
                    continue;
                }
                return Ok(Some(CompilationError::class(
                    span,
                    format!("Unknown class {target_name} used in conjunction with dependson"),
                )));
            };
            if kind == DependencyKind::DependsOn && target != class && self.registry.is_child_of(class, target) {
                return Ok(Some(CompilationError::class(
                    span,
                    format!("{name} is derived from {target_name} - please remove the dependson"),
                )));
            }
            if target == class || self.parsing.contains(&target) {
                let message = match kind {
                    DependencyKind::DependsOn => format!(
                        "Class {name} dependson({target_name}) either is a circular dependency or unnecessary usage of dependson."
                    ),
                    DependencyKind::Implements => {
                        format!("Class {name} implements({target_name}) is a circular dependency")
                    }
                };
                return Ok(Some(CompilationError::class(span, message)));
            }
            self.parse_class(target)?;
        }
        Ok(None)
    }

    // ==========================================================================
    // Compile
    // ==========================================================================

    fn compile_tree(&mut self, class: StructId) -> Result<(), DriverError> {
        let flags = self.flags(class);
        let ready = flags.contains(ClassFlags::PARSED) && !flags.contains(ClassFlags::COMPILED);
        if self.has_source(class) && ready && !self.failed.contains(&class) {
            let name = self.registry.struct_def(class).name.to_string();
            log::info!("Compiling {name}");
            if let Some(output) = self.run_pass(class, Pass::Compile) {
                let success = output.is_success();
                self.finish_pass(class, output)?;
                if success {
                    self.compiled.push(class);
                }
            }
        }
        for child in self.registry.subclasses(class) {
            self.compile_tree(child)?;
        }
        Ok(())
    }

    /// Run one pass over `class` with a fresh context.
    fn run_pass(&mut self, class: StructId, pass: Pass) -> Option<PassOutput> {
        let source = self.registry.class_source(class)?;
        let loader = self.loader.as_mut().map(|loader| loader.as_mut() as &mut dyn ObjectLoader);
        let mut context = CompilerContext::new(
            self.registry,
            &mut self.metadata,
            &self.options,
            &mut self.diagnostics,
            class,
            &source,
            pass,
        )
        .with_loader(loader);
        let output = match pass {
            Pass::Parse => ParsePass::new(&mut context).run(),
            Pass::Compile => CompilePass::new(&mut context).run(),
        };
        Some(output)
    }

    fn finish_pass(&mut self, class: StructId, output: PassOutput) -> Result<(), DriverError> {
        self.built += 1;
        self.lines += output.lines;
        self.statements += output.statements;
        if output.is_success() {
            return Ok(());
        }
        self.report(class, &output.errors)?;
        self.poison(class);
        Ok(())
    }

    // ==========================================================================
    // Defaults
    // ==========================================================================

    fn import_defaults(&mut self, importer: &mut dyn DefaultsImporter) -> Result<(), DriverError> {
        let mut pending = Vec::new();
        for &class in &self.compiled {
            self.collect_struct_defaults(class, class, &mut pending);
        }
        for &class in &self.compiled {
            if self.flags(class).contains(ClassFlags::NEEDS_DEF_PROPS) {
                pending.push(PendingDefaults::Class(class));
            }
        }

        let mut round = 0;
        while !pending.is_empty() {
            round += 1;
            log::debug!("Defaults round {round}: {} pending", pending.len());
            let before = pending.len();
            let mut waiting = Vec::new();
            for item in std::mem::take(&mut pending) {
                if self.import_one(item, importer, &waiting)? == DefaultsImport::Deferred {
                    waiting.push(item);
                }
            }
            if waiting.len() == before {
                let classes = waiting.iter().map(|&item| self.pending_name(item)).collect();
                return Err(DriverError::CircularDefaults { classes });
            }
            pending = waiting;
        }

        for class in std::mem::take(&mut self.compiled) {
            self.metadata.remove(class);
        }
        Ok(())
    }

    /// Script structs under `scope` whose defaults are still text.
    fn collect_struct_defaults(&self, class: StructId, scope: StructId, pending: &mut Vec<PendingDefaults>) {
        for child in self.registry.struct_def(scope).own_structs() {
            let Some(data) = self.registry.struct_def(child).as_script_struct() else {
                continue;
            };
            self.collect_struct_defaults(class, child, pending);
            if data.defaults_text.is_some() && !data.defaults_imported {
                pending.push(PendingDefaults::Struct { class, script_struct: child });
            }
        }
    }

    fn import_one(
        &mut self,
        item: PendingDefaults,
        importer: &mut dyn DefaultsImporter,
        waiting: &[PendingDefaults],
    ) -> Result<DefaultsImport, DriverError> {
        let (class, result) = match item {
            PendingDefaults::Struct { class, script_struct } => {
                let text = self
                    .registry
                    .struct_def(script_struct)
                    .as_script_struct()
                    .and_then(|data| data.defaults_text.clone())
                    .unwrap_or_default();
                let result = importer.import_struct(self.registry, script_struct, &text);
                if result == DefaultsImport::Imported {
                    if let Some(data) = self.registry.struct_mut(script_struct).as_script_struct_mut() {
                        data.defaults_imported = true;
                    }
                }
                (class, result)
            }
            PendingDefaults::Class(class) => {
                let parent_waiting = self
                    .registry
                    .super_class(class)
                    .is_some_and(|parent| waiting.contains(&PendingDefaults::Class(parent)));
                if parent_waiting || self.failed.contains(&class) {
                    return Ok(DefaultsImport::Deferred);
                }
                let text = self.registry.class_data(class).and_then(|data| data.default_properties.clone());
                let result = importer.import_class(self.registry, class, text.as_deref());
                if result == DefaultsImport::Imported {
                    if let Some(data) = self.registry.class_data_mut(class) {
                        data.flags.remove(ClassFlags::NEEDS_DEF_PROPS);
                    }
                }
                (class, result)
            }
        };

        if let DefaultsImport::Failed(message) = &result {
            let line = self.registry.struct_def(class).line;
            let err = CompilationError::class(Span::at_line(line), message.clone());
            self.report(class, std::slice::from_ref(&err))?;
            self.poison(class);
        }
        Ok(result)
    }

    fn pending_name(&self, item: PendingDefaults) -> String {
        match item {
            PendingDefaults::Struct { script_struct, .. } => self.registry.path_name(script_struct),
            PendingDefaults::Class(class) => self.registry.struct_def(class).name.to_string(),
        }
    }

    // ==========================================================================
    // Failure
    // ==========================================================================

    /// Record `errors` against `class`; bootstrap mode stops at the first.
    fn report(&mut self, class: StructId, errors: &[CompilationError]) -> Result<(), DriverError> {
        let name = self.registry.struct_def(class).name.to_string();
        for err in errors {
            self.diagnostics.error(&name, err);
        }
        match errors.first() {
            Some(first) if self.options.bootstrap => Err(DriverError::Bootstrap {
                class: name,
                line: first.span().line,
                message: first.message(),
            }),
            _ => Ok(()),
        }
    }

    fn poison(&mut self, class: StructId) {
        log::debug!("Poisoning {}", self.registry.struct_def(class).name);
        if let Some(data) = self.registry.class_data_mut(class) {
            data.flags.remove(ClassFlags::BUILD_STATE);
        }
        self.metadata.remove(class);
        self.compiled.retain(|&compiled| compiled != class);
        self.failed.insert(class);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyKind {
    DependsOn,
    Implements,
}

/// A class named in the header that must be parsed before the class itself.
#[derive(Debug, Clone)]
struct HeaderDependency {
    kind: DependencyKind,
    name: String,
    span: Span,
}

/// The `dependson(...)` and `implements(...)` names of a class header, read
/// ahead of pass 1. `Package.Name` yields `Name`.
fn header_dependencies(source: &str) -> Vec<HeaderDependency> {
    let mut lexer = Lexer::new(source);
    let mut names = Vec::new();
    let mut in_header = false;
    while let Ok(token) = lexer.next_token(true) {
        if token.is_eof() || (in_header && token.is_symbol(";")) {
            break;
        }
        if token.is_symbol("#") {
            lexer.skip_line();
            continue;
        }
        if !in_header {
            in_header = token.is_identifier("class") || token.is_identifier("interface");
            continue;
        }
        let kind = if token.is_identifier("dependson") {
            DependencyKind::DependsOn
        } else if token.is_identifier("implements") {
            DependencyKind::Implements
        } else {
            continue;
        };
        if !lexer.next_token(true).is_ok_and(|open| open.is_symbol("(")) {
            break;
        }
        let mut qualified = false;
        while let Ok(name) = lexer.next_token(true) {
            match name.kind {
                TokenKind::Identifier => {
                    let dependency = HeaderDependency {
                        kind,
                        name: name.lexeme.to_string(),
                        span: name.span,
                    };
                    if qualified {
                        if let Some(last) = names.last_mut() {
                            *last = dependency;
                        }
                    } else {
                        names.push(dependency);
                    }
                    qualified = false;
                }
                _ if name.is_symbol(".") => qualified = true,
                _ if name.is_symbol(",") => qualified = false,
                _ => break,
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn register(registry: &mut SymbolRegistry, name: &str, parent: &str, source: &str) -> StructId {
        let parent = registry.find_class(parent);
        registry.register_class(name, parent, Some(Arc::from(source))).unwrap()
    }

    fn build(registry: &mut SymbolRegistry) -> BuildReport {
        Driver::new(registry, CompilerOptions::default())
            .build(&mut AcceptDefaults)
            .unwrap()
    }

    /// Defers a class a fixed number of times before importing it.
    struct Stubborn {
        class: &'static str,
        deferrals: usize,
        imported: Vec<String>,
    }

    impl DefaultsImporter for Stubborn {
        fn import_struct(&mut self, registry: &mut SymbolRegistry, id: StructId, _: &str) -> DefaultsImport {
            self.imported.push(registry.path_name(id));
            DefaultsImport::Imported
        }

        fn import_class(&mut self, registry: &mut SymbolRegistry, class: StructId, _: Option<&str>) -> DefaultsImport {
            let name = registry.struct_def(class).name.to_string();
            if name == self.class && self.deferrals > 0 {
                self.deferrals -= 1;
                return DefaultsImport::Deferred;
            }
            self.imported.push(name);
            DefaultsImport::Imported
        }
    }

    // ==========================================================================
    // Phases
    // ==========================================================================

    #[test]
    fn builds_a_hierarchy() {
        let mut registry = SymbolRegistry::new();
        let base = register(&mut registry, "Base", "Object", "class Base; var int X; function F() { X = 1; }");
        let derived = register(&mut registry, "Derived", "Base", "class Derived extends Base; function F() { X = 2; }");
        let report = build(&mut registry);

        assert!(report.is_success(), "{:?}", report.diagnostics);
        for class in [base, derived] {
            let flags = registry.struct_def(class).class_flags();
            assert!(flags.contains(ClassFlags::PARSED | ClassFlags::COMPILED));
            assert!(!flags.contains(ClassFlags::NEEDS_DEF_PROPS));
        }
        assert_eq!(report.built, 4);
        assert!(report.summary().starts_with("Success: Compiled"));
    }

    #[test]
    fn second_build_is_up_to_date() {
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Base", "Object", "class Base;");
        build(&mut registry);
        let report = build(&mut registry);
        assert_eq!(report.summary(), "Success: Everything is up to date");
    }

    #[test]
    fn force_rebuild_is_idempotent() {
        let mut registry = SymbolRegistry::new();
        let class = register(&mut registry, "Base", "Object", "class Base; var int X; var byte B; function F() { X = 3; }");
        build(&mut registry);
        let name = registry.find_name("F").unwrap();
        let f = |registry: &SymbolRegistry| match registry.find_own_field(class, &name) {
            Some(unrealscript_core::FieldRef::Struct(id)) => id,
            other => panic!("no F: {other:?}"),
        };
        let first = registry.struct_def(f(&registry)).script.clone();
        let size = registry.struct_def(class).properties_size;

        let report = Driver::new(&mut registry, CompilerOptions::new().with_force_rebuild(true))
            .build(&mut AcceptDefaults)
            .unwrap();
        assert_eq!(report.built, 2);
        assert_eq!(registry.struct_def(f(&registry)).script, first);
        assert_eq!(registry.struct_def(class).properties_size, size);
    }

    // ==========================================================================
    // Failure
    // ==========================================================================

    #[test]
    fn failed_class_poisons_its_subtree_only() {
        let mut registry = SymbolRegistry::new();
        let bad = register(&mut registry, "Bad", "Object", "class Bad; var Missing X;");
        register(&mut registry, "Child", "Bad", "class Child extends Bad;");
        let good = register(&mut registry, "Good", "Object", "class Good;");
        let report = build(&mut registry);

        assert!(!report.is_success());
        assert_eq!(report.failed, vec!["Bad".to_string(), "Child".to_string()]);
        assert!(report.diagnostics.contains("'Child' can't be compiled: Parent class 'Bad' has errors"));
        assert!(!registry.struct_def(bad).class_flags().contains(ClassFlags::PARSED));
        assert!(registry.struct_def(good).class_flags().contains(ClassFlags::COMPILED));
        assert!(report.summary().starts_with("Failure"));
    }

    #[test]
    fn bootstrap_stops_at_the_first_error() {
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Bad", "Object", "class Bad;\nvar Missing X;");
        let err = Driver::new(&mut registry, CompilerOptions::new().with_bootstrap(true))
            .build(&mut AcceptDefaults)
            .unwrap_err();
        let DriverError::Bootstrap { class, line, .. } = err else {
            panic!("expected a bootstrap error");
        };
        assert_eq!(class, "Bad");
        assert_eq!(line, 2);
    }

    #[test]
    fn unknown_root_class() {
        let mut registry = SymbolRegistry::new();
        let err = Driver::new(&mut registry, CompilerOptions::default())
            .build_class("Nowhere", &mut AcceptDefaults)
            .unwrap_err();
        assert_eq!(err, DriverError::UnknownClass("Nowhere".to_string()));
    }

    // ==========================================================================
    // dependson
    // ==========================================================================

    #[test]
    fn dependson_parses_the_target_first() {
        let mut registry = SymbolRegistry::new();
        register(
            &mut registry,
            "Alpha",
            "Object",
            "class Alpha dependson(Zulu); var Zulu.EMode Mode;",
        );
        register(&mut registry, "Zulu", "Object", "class Zulu; enum EMode { MODE_A, MODE_B };");
        let report = build(&mut registry);
        assert!(report.is_success(), "{:?}", report.diagnostics);
    }

    #[test]
    fn dependson_errors() {
        let cases = [
            ("class Test dependson(Nowhere);", "Unknown class Nowhere used in conjunction with dependson"),
            ("class Test dependson(Test);", "Class Test dependson(Test) either is a circular dependency"),
        ];
        for (source, expected) in cases {
            let mut registry = SymbolRegistry::new();
            register(&mut registry, "Test", "Object", source);
            let report = build(&mut registry);
            assert!(report.diagnostics.contains(expected), "{source}");
        }

        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Base", "Object", "class Base;");
        register(&mut registry, "Test", "Base", "class Test extends Base dependson(Base);");
        let report = build(&mut registry);
        assert!(report.diagnostics.contains("Test is derived from Base - please remove the dependson"));
    }

    #[test]
    fn circular_dependson() {
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Alpha", "Object", "class Alpha dependson(Beta);");
        register(&mut registry, "Beta", "Object", "class Beta dependson(Alpha);");
        let report = build(&mut registry);
        assert!(report.diagnostics.contains("Class Beta dependson(Alpha) either is a circular dependency"));
    }

    #[test]
    fn header_dependencies_stop_at_the_header() {
        let deps = header_dependencies("// c\nclass A extends B dependson(C, D) native; var int dependson;");
        let names: Vec<_> = deps.into_iter().map(|dependency| dependency.name).collect();
        assert_eq!(names, vec!["C".to_string(), "D".to_string()]);
    }

    #[test]
    fn header_dependencies_include_interfaces() {
        let deps = header_dependencies("class A implements(Core.ITouch, IUse) dependson(C);");
        let found: Vec<_> = deps
            .iter()
            .map(|dependency| (dependency.kind, dependency.name.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (DependencyKind::Implements, "ITouch"),
                (DependencyKind::Implements, "IUse"),
                (DependencyKind::DependsOn, "C"),
            ]
        );
    }

    #[test]
    fn interfaces_parse_before_their_implementers() {
        // Alpha is walked before IZulu.
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Alpha", "Object", "class Alpha implements(IZulu);");
        register(&mut registry, "IZulu", "Object", "interface IZulu;");
        let report = build(&mut registry);
        assert!(report.is_success(), "{:?}", report.diagnostics);

        let alpha = registry.find_class("Alpha").unwrap();
        let zulu = registry.find_class("IZulu").unwrap();
        assert!(registry.class_data(alpha).unwrap().interfaces.contains(&zulu));
    }

    // ==========================================================================
    // Defaults
    // ==========================================================================

    #[test]
    fn deferred_defaults_are_retried() {
        let mut registry = SymbolRegistry::new();
        register(
            &mut registry,
            "Base",
            "Object",
            "class Base; struct Pair { var int A; structdefaultproperties { A=1 } }; defaultproperties { }",
        );
        register(&mut registry, "Derived", "Base", "class Derived extends Base;");
        let mut importer = Stubborn {
            class: "Base",
            deferrals: 1,
            imported: Vec::new(),
        };
        let report = Driver::new(&mut registry, CompilerOptions::default())
            .build(&mut importer)
            .unwrap();
        assert!(report.is_success());
        assert_eq!(importer.imported, vec!["Base.Pair".to_string(), "Base".to_string(), "Derived".to_string()]);
    }

    #[test]
    fn stuck_defaults_are_circular() {
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Base", "Object", "class Base;");
        let mut importer = Stubborn {
            class: "Base",
            deferrals: usize::MAX,
            imported: Vec::new(),
        };
        let err = Driver::new(&mut registry, CompilerOptions::default())
            .build(&mut importer)
            .unwrap_err();
        assert_eq!(err.to_string(), "Compiler encountered circular BEGIN OBJECT dependency: Base");
    }

    #[test]
    fn failed_defaults_poison_the_class() {
        struct Refuse;
        impl DefaultsImporter for Refuse {
            fn import_struct(&mut self, _: &mut SymbolRegistry, _: StructId, _: &str) -> DefaultsImport {
                DefaultsImport::Imported
            }
            fn import_class(&mut self, _: &mut SymbolRegistry, _: StructId, _: Option<&str>) -> DefaultsImport {
                DefaultsImport::Failed("Bad default".to_string())
            }
        }
        let mut registry = SymbolRegistry::new();
        register(&mut registry, "Base", "Object", "class Base;");
        let report = Driver::new(&mut registry, CompilerOptions::default())
            .build(&mut Refuse)
            .unwrap();
        assert_eq!(report.failed, vec!["Base".to_string()]);
        assert!(report.diagnostics.contains("Bad default"));
    }
}
