//! UnrealScript
//!
//! Compiles UnrealScript class source into bytecode and a linked object
//! graph of classes, states, functions, structs and properties.
//!
//! ```no_run
//! use unrealscript::ScriptPackage;
//!
//! let mut package = ScriptPackage::new();
//! package.add_source("class Pawn; var int Health; function Hurt() { Health = 0; }")?;
//! let report = package.build()?;
//! assert!(report.is_success());
//! # Ok::<(), unrealscript::PackageError>(())
//! ```
//!
//! The member crates are re-exported for callers that drive the passes
//! themselves.

mod package;

pub use package::{PackageError, ScriptPackage};

pub use unrealscript_compiler::{
    AcceptDefaults, BuildReport, CompilationError, CompilePass, CompilerContext, CompilerOptions, DefaultsImport,
    DefaultsImporter, Diagnostics, Driver, DriverError, ObjectLoader, OffsetWidth, OpCode, ParsePass, Pass,
    PassOutput, ScriptBuffer,
};
pub use unrealscript_core::{
    ClassFlags, Diagnostic, DiagnosticKind, FieldRef, FunctionFlags, Name, PropertyFlags, PropertyId, PropertyKind,
    PropertyType, Severity, Span, StateFlags, StructFlags, StructId,
};
pub use unrealscript_registry::{RegistryError, StructDef, SymbolRegistry};

pub mod compiler {
    pub use unrealscript_compiler::*;
}

pub mod parser {
    pub use unrealscript_parser::*;
}

pub mod registry {
    pub use unrealscript_registry::*;
}
