//! Compiler configuration.

use rustc_hash::FxHashMap;

/// Width of skip offsets and code addresses in emitted bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetWidth {
    #[default]
    U16,
    U32,
}

impl OffsetWidth {
    /// Bytes per offset.
    pub fn bytes(self) -> usize {
        match self {
            OffsetWidth::U16 => 2,
            OffsetWidth::U32 => 4,
        }
    }

    /// The all-ones value that terminates case chains and label tables.
    pub fn sentinel(self) -> u32 {
        match self {
            OffsetWidth::U16 => 0xFFFF,
            OffsetWidth::U32 => 0xFFFF_FFFF,
        }
    }
}

/// Options for a compile run.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Warnings above this level are dropped (1-4).
    pub warning_level: u8,
    /// Any error stops the whole run.
    pub bootstrap: bool,
    pub offset_width: OffsetWidth,
    /// Recompile classes that are already compiled.
    pub force_rebuild: bool,
    /// Largest script a single function may produce.
    pub max_code_size: usize,
    /// Emit a nonzero debug byte in `Assert`.
    pub debug_info: bool,
    /// Byte sizes the host's native code expects for native classes, by class name.
    pub native_sizes: FxHashMap<String, u32>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            warning_level: 2,
            bootstrap: false,
            offset_width: OffsetWidth::U16,
            force_rebuild: false,
            max_code_size: 65534,
            debug_info: false,
            native_sizes: FxHashMap::default(),
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warning_level(mut self, level: u8) -> Self {
        self.warning_level = level.clamp(1, 4);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_offset_width(mut self, width: OffsetWidth) -> Self {
        self.offset_width = width;
        self
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    pub fn with_max_code_size(mut self, size: usize) -> Self {
        self.max_code_size = size;
        self
    }

    pub fn with_debug_info(mut self, debug: bool) -> Self {
        self.debug_info = debug;
        self
    }

    pub fn with_native_size(mut self, class: impl Into<String>, size: u32) -> Self {
        self.native_sizes.insert(class.into().to_ascii_lowercase(), size);
        self
    }

    /// The native size registered for `class`, if any.
    pub fn native_size(&self, class: &str) -> Option<u32> {
        self.native_sizes.get(&class.to_ascii_lowercase()).copied()
    }
}
