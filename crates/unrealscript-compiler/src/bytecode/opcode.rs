//! Expression tokens.
//!
//! Every expression and statement in a script starts with one of these
//! bytes. Values below `0x60` are intrinsic; `0x60..0x70` prefix a native
//! id above 255; anything from [`FIRST_NATIVE`] up is a native function
//! called by its id directly.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// First byte value that is a direct native call.
pub const FIRST_NATIVE: u8 = 0x70;

/// One past the highest native id the extended prefix can address.
pub const MAX_NATIVE: u16 = 0x1000;

/// Intrinsic expression tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Variables
    // =========================================================================
    LocalVariable = 0x00,
    InstanceVariable = 0x01,
    DefaultVariable = 0x02,
    StateVariable = 0x03,
    LocalOutVariable = 0x48,
    BoolVariable = 0x2D,

    // =========================================================================
    // Statements
    // =========================================================================
    Return = 0x04,
    Switch = 0x05,
    Jump = 0x06,
    JumpIfNot = 0x07,
    Stop = 0x08,
    Assert = 0x09,
    Case = 0x0A,
    Nothing = 0x0B,
    LabelTable = 0x0C,
    GotoLabel = 0x0D,
    EatReturnValue = 0x0E,
    Let = 0x0F,
    LetBool = 0x14,
    LetDelegate = 0x44,
    Iterator = 0x2F,
    IteratorPop = 0x30,
    IteratorNext = 0x31,
    DynArrayIterator = 0x58,
    EndOfScript = 0x53,

    // =========================================================================
    // Context and access
    // =========================================================================
    DynArrayElement = 0x10,
    ArrayElement = 0x1A,
    New = 0x11,
    ClassContext = 0x12,
    Context = 0x19,
    InterfaceContext = 0x51,
    StructMember = 0x36,
    SelfObject = 0x17,
    Skip = 0x18,
    Conditional = 0x45,

    // =========================================================================
    // Casts
    // =========================================================================
    MetaCast = 0x13,
    DynamicCast = 0x2E,
    InterfaceCast = 0x52,
    PrimitiveCast = 0x39,

    // =========================================================================
    // Calls
    // =========================================================================
    VirtualFunction = 0x1B,
    FinalFunction = 0x1C,
    GlobalFunction = 0x38,
    DelegateFunction = 0x42,
    DelegateProperty = 0x43,
    InstanceDelegate = 0x4B,
    EmptyDelegate = 0x4F,
    EndFunctionParms = 0x16,
    EndParmValue = 0x15,
    DefaultParmValue = 0x49,
    EmptyParmValue = 0x4A,
    NativeParm = 0x29,
    ExtendedNative = 0x60,

    // =========================================================================
    // Constants
    // =========================================================================
    IntConst = 0x1D,
    FloatConst = 0x1E,
    StringConst = 0x1F,
    ObjectConst = 0x20,
    NameConst = 0x21,
    RotationConst = 0x22,
    VectorConst = 0x23,
    ByteConst = 0x24,
    IntZero = 0x25,
    IntOne = 0x26,
    True = 0x27,
    False = 0x28,
    NoObject = 0x2A,
    IntConstByte = 0x2C,
    UnicodeStringConst = 0x34,

    // =========================================================================
    // Comparisons
    // =========================================================================
    StructCmpEq = 0x32,
    StructCmpNe = 0x33,
    EqualEqualDelDel = 0x3B,
    NotEqualDelDel = 0x3C,

    // =========================================================================
    // Dynamic arrays
    // =========================================================================
    DynArrayLength = 0x37,
    DynArrayInsert = 0x40,
    DynArrayRemove = 0x41,
    DynArrayFind = 0x46,
    DynArrayFindStruct = 0x47,
    DynArrayAdd = 0x54,
    DynArrayAddItem = 0x55,
    DynArrayRemoveItem = 0x56,
    DynArrayInsertItem = 0x57,
    DynArraySort = 0x59,
}

/// Selectors for [`OpCode::PrimitiveCast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CastToken {
    InterfaceToObject = 0x36,
    InterfaceToString = 0x37,
    InterfaceToBool = 0x38,
    RotatorToVector = 0x39,
    ByteToInt = 0x3A,
    ByteToBool = 0x3B,
    ByteToFloat = 0x3C,
    IntToByte = 0x3D,
    IntToBool = 0x3E,
    IntToFloat = 0x3F,
    BoolToByte = 0x40,
    BoolToInt = 0x41,
    BoolToFloat = 0x42,
    FloatToByte = 0x43,
    FloatToInt = 0x44,
    FloatToBool = 0x45,
    ObjectToInterface = 0x46,
    ObjectToBool = 0x47,
    NameToBool = 0x48,
    StringToByte = 0x49,
    StringToInt = 0x4A,
    StringToBool = 0x4B,
    StringToFloat = 0x4C,
    StringToVector = 0x4D,
    StringToRotator = 0x4E,
    VectorToBool = 0x4F,
    VectorToRotator = 0x50,
    RotatorToBool = 0x51,
    ByteToString = 0x52,
    IntToString = 0x53,
    BoolToString = 0x54,
    FloatToString = 0x55,
    ObjectToString = 0x56,
    NameToString = 0x57,
    VectorToString = 0x58,
    RotatorToString = 0x59,
    DelegateToString = 0x5A,
    StringToName = 0x60,
}
