//! UnrealScript Compiler
//!
//! A two-pass, single-token-lookahead compiler from UnrealScript class
//! source to bytecode, driven over a whole class tree.
//!
//! ## Architecture
//!
//! - **Pass 1 (Parse)**: Declare every class member and record where each
//!   function and state body starts
//! - **Pass 2 (Compile)**: Revisit the recorded bodies and emit bytecode
//! - **Defaults**: Hand `defaultproperties` text to the host importer
//!
//! ## Modules
//!
//! - [`bytecode`]: Opcodes and the script buffer
//! - [`context`]: Per-class compiler state shared by both passes
//! - [`conversion`]: Type matching, conversion costs and the cast table
//! - [`decl`]: Class, state, function, struct, enum and variable declarations
//! - [`diagnostics`]: Errors and warnings gathered over a run
//! - [`driver`]: Multi-pass driver with failure isolation
//! - [`emit`]: Bytecode writer for the expression tree
//! - [`expr`]: Expression compiler
//! - [`ir`]: Typed expression tree
//! - [`nest`]: Block nesting, labels and fixups
//! - [`options`]: Compiler options
//! - [`passes`]: The per-class passes
//! - [`stmt`]: Statement compiler
//! - [`tokens`]: Tokens resolved to constants

pub mod bytecode;
pub mod context;
pub mod conversion;
pub mod decl;
pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod expr;
pub mod ir;
pub mod nest;
pub mod options;
pub mod passes;
pub mod stmt;
pub mod tokens;

pub use bytecode::{OpCode, ScriptBuffer};
pub use context::{CompilerContext, ObjectLoader, Pass};
pub use diagnostics::Diagnostics;
pub use driver::{AcceptDefaults, BuildReport, DefaultsImport, DefaultsImporter, Driver, DriverError};
pub use options::{CompilerOptions, OffsetWidth};
pub use passes::{CompilePass, ParsePass, PassOutput};

// Re-export CompilationError from core for convenience
pub use unrealscript_core::CompilationError;
