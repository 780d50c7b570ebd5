//! UnrealScript object graph and class registry.
//!
//! Everything the compiler declares lives here: classes, states, functions,
//! script structs, properties, enums and consts, plus the class graph used
//! to order passes.
//!
//! ## Modules
//!
//! - [`objects`]: struct, property, enum and const definitions
//! - [`registry`]: [`SymbolRegistry`], arenas and scope-chain lookups
//! - [`hierarchy`]: [`ClassGraph`] over extends/implements/dependson edges
//! - [`layout`]: property offsets and stable grouping
//! - [`metadata`]: per-class side tables kept between passes
//! - [`error`]: registration errors

pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod metadata;
pub mod objects;
pub mod registry;

pub use error::RegistryError;
pub use hierarchy::{ClassEdge, ClassGraph};
pub use metadata::{ClassMetadata, FunctionMetadata, MetadataRegistry, ParamDefault, PropertyMetadata};
pub use objects::{
    ClassData, ConstDef, EnumDef, FunctionData, LiteralObject, Property, ScriptStructData, StateData,
    StructData, StructDef, StructKind,
};
pub use registry::SymbolRegistry;
