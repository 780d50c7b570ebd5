//! Flag sets carried by properties, functions, classes, structs and states.
//!
//! Bit values follow the engine's serialized layout so downstream tools
//! (header exporter, default-properties importer) can read them as-is.

use bitflags::bitflags;

bitflags! {
    /// Flags on a property, parameter or return value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u64 {
        /// Editable in the property window.
        const EDIT              = 0x0000_0000_0000_0001;
        /// Read-only from script.
        const CONST             = 0x0000_0000_0000_0002;
        /// Editor exports the referenced object inline.
        const EXPORT_OBJECT     = 0x0000_0000_0000_0008;
        /// Optional function parameter.
        const OPTIONAL_PARM     = 0x0000_0000_0000_0010;
        /// Replicated.
        const NET               = 0x0000_0000_0000_0020;
        /// Fixed-size editable array.
        const EDIT_FIXED_SIZE   = 0x0000_0000_0000_0040;
        /// Function parameter.
        const PARM              = 0x0000_0000_0000_0080;
        /// Out (by reference) parameter.
        const OUT_PARM          = 0x0000_0000_0000_0100;
        /// Parameter may be skipped by a short-circuit operator.
        const SKIP_PARM         = 0x0000_0000_0000_0200;
        /// Function return value.
        const RETURN_PARM       = 0x0000_0000_0000_0400;
        /// Accept any tabled conversion, not only automatic ones.
        const COERCE_PARM       = 0x0000_0000_0000_0800;
        /// Declared by native code.
        const NATIVE            = 0x0000_0000_0000_1000;
        /// Not saved.
        const TRANSIENT         = 0x0000_0000_0000_2000;
        /// Loaded from the ini file.
        const CONFIG            = 0x0000_0000_0000_4000;
        /// Loaded from the localization file.
        const LOCALIZED         = 0x0000_0000_0000_8000;
        /// Visible but not editable in the editor.
        const EDIT_CONST        = 0x0000_0000_0002_0000;
        /// Config shared by every subclass.
        const GLOBAL_CONFIG     = 0x0000_0000_0004_0000;
        /// Property is a component reference.
        const COMPONENT         = 0x0000_0000_0008_0000;
        /// Not exported to the native header.
        const NO_EXPORT         = 0x0000_0000_0040_0000;
        /// Editor may clear the reference.
        const NO_CLEAR          = 0x0000_0000_0200_0000;
        /// Edit the referenced object inline.
        const EDIT_INLINE       = 0x0000_0000_0400_0000;
        /// Deprecated; loaded but never saved.
        const DEPRECATED        = 0x0000_0000_2000_0000;
        /// Calls an event when replicated.
        const REP_NOTIFY        = 0x0000_0001_0000_0000;
        /// Interpolatable by matinee.
        const INTERP            = 0x0000_0002_0000_0000;
        /// Excluded from undo transactions.
        const NON_TRANSACTIONAL = 0x0000_0004_0000_0000;
        /// Only the declaring class may write.
        const PRIVATE_WRITE     = 0x0000_0100_0000_0000;
        /// Only the declaring class and subclasses may write.
        const PROTECTED_WRITE   = 0x0000_0200_0000_0000;
        /// Not visible outside the declaring class.
        const PRIVATE           = 0x0001_0000_0000_0000;
        /// Visible to subclasses only.
        const PROTECTED         = 0x0002_0000_0000_0000;

        /// Flags only legal on parameters.
        const PARM_FLAGS = Self::OPTIONAL_PARM.bits()
            | Self::PARM.bits()
            | Self::OUT_PARM.bits()
            | Self::SKIP_PARM.bits()
            | Self::RETURN_PARM.bits()
            | Self::COERCE_PARM.bits();
        /// Flags that make a declaration visible to the editor.
        const EDITOR_FLAGS = Self::EDIT.bits() | Self::EDIT_CONST.bits() | Self::EDIT_INLINE.bits();
        /// Flags that exclude a local or static variable.
        const NOT_LOCAL = Self::TRANSIENT.bits() | Self::NATIVE.bits() | Self::CONFIG.bits()
            | Self::GLOBAL_CONFIG.bits() | Self::LOCALIZED.bits();
    }
}

bitflags! {
    /// Flags on a function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionFlags: u32 {
        const FINAL              = 0x0000_0001;
        /// Has a script body.
        const DEFINED            = 0x0000_0002;
        const ITERATOR           = 0x0000_0004;
        const LATENT             = 0x0000_0008;
        /// Unary operator before its operand.
        const PRE_OPERATOR       = 0x0000_0010;
        const SINGULAR           = 0x0000_0020;
        /// Replicated.
        const NET                = 0x0000_0040;
        const NET_RELIABLE       = 0x0000_0080;
        const SIMULATED          = 0x0000_0100;
        const EXEC               = 0x0000_0200;
        const NATIVE             = 0x0000_0400;
        const EVENT              = 0x0000_0800;
        const OPERATOR           = 0x0000_1000;
        const STATIC             = 0x0000_2000;
        const HAS_OPTIONAL_PARMS = 0x0000_4000;
        const CONST              = 0x0000_8000;
        const PUBLIC             = 0x0002_0000;
        const PRIVATE            = 0x0004_0000;
        const PROTECTED          = 0x0008_0000;
        const DELEGATE           = 0x0010_0000;
        /// Executed on the server.
        const NET_SERVER         = 0x0020_0000;
        const HAS_OUT_PARMS      = 0x0040_0000;
        const HAS_DEFAULTS       = 0x0080_0000;
        /// Executed on the owning client.
        const NET_CLIENT         = 0x0100_0000;

        /// Inherited from the overridden function.
        const FUNC_INHERIT = Self::EXEC.bits() | Self::EVENT.bits();
        /// Must match the overridden function exactly.
        const OVERRIDE_MATCH = Self::EXEC.bits()
            | Self::FINAL.bits()
            | Self::LATENT.bits()
            | Self::PRE_OPERATOR.bits()
            | Self::ITERATOR.bits()
            | Self::STATIC.bits()
            | Self::PUBLIC.bits()
            | Self::PROTECTED.bits()
            | Self::CONST.bits();
        /// Replication flags propagated from a replicated parent.
        const NET_FUNC_FLAGS = Self::NET.bits()
            | Self::NET_RELIABLE.bits()
            | Self::NET_SERVER.bits()
            | Self::NET_CLIENT.bits();
        /// Access specifiers.
        const ACCESS = Self::PUBLIC.bits() | Self::PRIVATE.bits() | Self::PROTECTED.bits();
    }
}

bitflags! {
    /// Flags on a class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u32 {
        const ABSTRACT             = 0x0000_0001;
        /// Pass 2 completed.
        const COMPILED             = 0x0000_0002;
        const CONFIG               = 0x0000_0004;
        const TRANSIENT            = 0x0000_0008;
        /// Pass 1 completed.
        const PARSED               = 0x0000_0010;
        const LOCALIZED            = 0x0000_0020;
        const SAFE_REPLACE         = 0x0000_0040;
        const NATIVE               = 0x0000_0080;
        const NO_EXPORT            = 0x0000_0100;
        const PLACEABLE            = 0x0000_0200;
        const PER_OBJECT_CONFIG    = 0x0000_0400;
        const NATIVE_REPLICATION   = 0x0000_0800;
        const EDIT_INLINE_NEW      = 0x0000_1000;
        const COLLAPSE_CATEGORIES  = 0x0000_2000;
        const INTERFACE            = 0x0000_4000;
        /// Default properties still need importing.
        const NEEDS_DEF_PROPS      = 0x0040_0000;
        const HAS_COMPONENTS       = 0x0080_0000;
        const HIDDEN               = 0x0100_0000;
        const DEPRECATED           = 0x0200_0000;
        const HIDE_DROP_DOWN       = 0x0400_0000;
        /// Default properties imported.
        const DEFAULTS_IMPORTED    = 0x0800_0000;

        /// Flags a subclass inherits from its parent at the start of pass 1.
        const SCRIPT_INHERIT = Self::TRANSIENT.bits()
            | Self::CONFIG.bits()
            | Self::LOCALIZED.bits()
            | Self::SAFE_REPLACE.bits()
            | Self::PER_OBJECT_CONFIG.bits()
            | Self::PLACEABLE.bits()
            | Self::HAS_COMPONENTS.bits()
            | Self::DEPRECATED.bits()
            | Self::EDIT_INLINE_NEW.bits()
            | Self::COLLAPSE_CATEGORIES.bits();
        /// Compile-state flags cleared when a class is poisoned.
        const BUILD_STATE = Self::PARSED.bits()
            | Self::COMPILED.bits()
            | Self::NEEDS_DEF_PROPS.bits()
            | Self::DEFAULTS_IMPORTED.bits();
    }
}

bitflags! {
    /// Flags on a script struct.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StructFlags: u32 {
        const NATIVE               = 0x0000_0001;
        const EXPORT               = 0x0000_0002;
        const HAS_COMPONENTS       = 0x0000_0004;
        const TRANSIENT            = 0x0000_0008;
        /// Serialized as a single unit.
        const ATOMIC               = 0x0000_0010;
        /// Binary serialization is fixed.
        const IMMUTABLE            = 0x0000_0020;
        const STRICT_CONFIG        = 0x0000_0040;
        const IMMUTABLE_WHEN_COOKED = 0x0000_0080;
        const ATOMIC_WHEN_COOKED   = 0x0000_0100;

        /// Flags a derived struct inherits.
        const INHERIT = Self::HAS_COMPONENTS.bits() | Self::ATOMIC.bits() | Self::STRICT_CONFIG.bits();
    }
}

bitflags! {
    /// Flags on a state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        /// Selectable in the editor (`state()`).
        const EDITABLE  = 0x0000_0001;
        /// Entered automatically.
        const AUTO      = 0x0000_0002;
        const SIMULATED = 0x0000_0004;
    }
}
