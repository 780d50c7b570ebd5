//! Core types shared by every UnrealScript compiler crate.
//!
//! ## Modules
//!
//! - [`span`]: source positions
//! - [`name`]: case-insensitive interned names
//! - [`ids`]: arena ids for registry objects
//! - [`flags`]: property, function, class, struct and state flag sets
//! - [`types`]: `PropertyType`, the type descriptor carried by tokens and properties
//! - [`error`]: lexer and compiler errors with severity tiers
//! - [`diagnostic`]: reported errors and warnings

pub mod diagnostic;
pub mod error;
pub mod flags;
pub mod ids;
pub mod name;
pub mod span;
pub mod types;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{CompilationError, LexError, Severity};
pub use flags::{ClassFlags, FunctionFlags, PropertyFlags, StateFlags, StructFlags};
pub use ids::{ConstId, EnumId, FieldRef, ObjectId, PropertyId, StructId};
pub use name::{NAME_SIZE, Name, NameTable};
pub use span::Span;
pub use types::{PropertyKind, PropertyType, RefKind};
