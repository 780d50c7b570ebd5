//! Registration errors.

use thiserror::Error;

/// Errors raised when the object graph rejects a registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("class '{name}' is already registered")]
    DuplicateClass { name: String },

    #[error("unknown class '{name}'")]
    UnknownClass { name: String },

    /// Native function ids are global across every class.
    #[error("Native function id {id} is already in use by '{existing}'")]
    NativeIdInUse { id: u16, existing: String },
}
