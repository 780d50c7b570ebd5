//! Bytecode definitions.
//!
//! - [`OpCode`]: one-byte expression tokens
//! - [`CastToken`]: primitive conversion selectors for `PrimitiveCast`
//! - [`ScriptBuffer`]: a function's growing script

mod opcode;
mod script;

pub use opcode::{CastToken, FIRST_NATIVE, MAX_NATIVE, OpCode};
pub use script::ScriptBuffer;
