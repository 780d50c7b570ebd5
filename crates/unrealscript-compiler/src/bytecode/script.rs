//! A function's script buffer.
//!
//! Operands are little-endian. Code offsets use the configured
//! [`OffsetWidth`]; object references and names are always 32 bits.

use unrealscript_core::Name;

use super::OpCode;
use crate::options::OffsetWidth;

/// The script of one function, state or class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBuffer {
    code: Vec<u8>,
    width: OffsetWidth,
}

impl ScriptBuffer {
    pub fn new(width: OffsetWidth) -> Self {
        Self {
            code: Vec::new(),
            width,
        }
    }

    pub fn width(&self) -> OffsetWidth {
        self.width
    }

    /// Current end of the script; the address the next byte lands at.
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    pub fn clear(&mut self) {
        self.code.clear();
    }

    // ==========================================================================
    // Writing
    // ==========================================================================

    pub fn write_op(&mut self, op: OpCode) {
        self.code.push(op.into());
    }

    pub fn write_byte(&mut self, value: u8) {
        self.code.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// A name as its table index.
    pub fn write_name(&mut self, name: &Name) {
        self.write_u32(name.index());
    }

    /// A code offset in the configured width.
    pub fn write_offset(&mut self, value: u32) {
        match self.width {
            OffsetWidth::U16 => self.write_u16(value as u16),
            OffsetWidth::U32 => self.write_u32(value),
        }
    }

    /// The terminating all-ones offset.
    pub fn write_sentinel(&mut self) {
        self.write_offset(self.width.sentinel());
    }

    /// Write a zero offset to be patched later; returns its position.
    pub fn write_placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.write_offset(0);
        at
    }

    /// Write a zero byte to be patched later; returns its position.
    pub fn write_byte_placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.code.push(0);
        at
    }

    // ==========================================================================
    // Patching
    // ==========================================================================

    /// Overwrite the offset written at `at`.
    pub fn patch_offset(&mut self, at: usize, value: u32) {
        match self.width {
            OffsetWidth::U16 => {
                self.code[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
            OffsetWidth::U32 => {
                self.code[at..at + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    pub fn patch_byte(&mut self, at: usize, value: u8) {
        self.code[at] = value;
    }

    /// Read back an offset, for tests and disassembly.
    pub fn read_offset(&self, at: usize) -> u32 {
        match self.width {
            OffsetWidth::U16 => u16::from_le_bytes([self.code[at], self.code[at + 1]]) as u32,
            OffsetWidth::U32 => u32::from_le_bytes([
                self.code[at],
                self.code[at + 1],
                self.code[at + 2],
                self.code[at + 3],
            ]),
        }
    }
}
