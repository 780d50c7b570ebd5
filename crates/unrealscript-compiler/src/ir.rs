//! Expression IR.
//!
//! Expressions are built as a tree first and written out in one post-order
//! walk by [`ScriptWriter`](crate::emit::ScriptWriter). A conversion or an
//! operator call that must precede operands parsed before it simply wraps
//! them, so nothing already emitted ever has to move.

use unrealscript_core::{Name, ObjectId, PropertyId, StructId};

use crate::bytecode::{CastToken, OpCode};

/// A constant value as it is written to the script.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Byte(u8),
    Bool(bool),
    Float(f32),
    String(String),
    Name(Name),
    /// `None` for the null object.
    Object(Option<ObjectId>),
    Vector([f32; 3]),
    Rotator([i32; 3]),
    /// The unbound delegate.
    EmptyDelegate,
}

/// How a variable is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableAccess {
    Local,
    LocalOut,
    Instance,
    Default,
    State,
}

impl VariableAccess {
    pub fn opcode(self) -> OpCode {
        match self {
            VariableAccess::Local => OpCode::LocalVariable,
            VariableAccess::LocalOut => OpCode::LocalOutVariable,
            VariableAccess::Instance => OpCode::InstanceVariable,
            VariableAccess::Default => OpCode::DefaultVariable,
            VariableAccess::State => OpCode::StateVariable,
        }
    }
}

/// Who a call binds to.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// By native id.
    Native(u16),
    /// A specific script function.
    Final(StructId),
    /// The top-level version of a state-overridden function.
    Global(Name),
    /// Looked up by name on the context object.
    Virtual { super_call: bool, name: Name },
    /// Through a delegate property; `local` when the property is a local or parameter.
    Delegate {
        local: bool,
        property: PropertyId,
        name: Name,
    },
}

/// The object-context flavor of a member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Object,
    /// Static members through a class reference.
    Class,
}

/// Dynamic array operations that carry an item after a skip offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOp {
    AddItem,
    RemoveItem,
    Find,
}

impl ItemOp {
    pub fn opcode(self) -> OpCode {
        match self {
            ItemOp::AddItem => OpCode::DynArrayAddItem,
            ItemOp::RemoveItem => OpCode::DynArrayRemoveItem,
            ItemOp::Find => OpCode::DynArrayFind,
        }
    }
}

/// One expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nothing,
    Constant(Constant),
    SelfObject,
    Variable {
        access: VariableAccess,
        property: PropertyId,
    },
    /// Wraps a bool variable read so the VM can apply its bit mask.
    BoolVariable(Box<Expr>),

    Context {
        kind: ContextKind,
        object: Box<Expr>,
        /// Bytes the VM zeroes when the object is `None`.
        size: u8,
        member: Box<Expr>,
    },
    InterfaceContext(Box<Expr>),
    StructMember {
        member: PropertyId,
        struct_def: StructId,
        /// The member is written through, so the struct must be written back.
        modified: bool,
        base: Box<Expr>,
    },
    ArrayElement {
        index: Box<Expr>,
        array: Box<Expr>,
    },
    DynArrayElement {
        index: Box<Expr>,
        array: Box<Expr>,
    },

    PrimitiveCast {
        cast: CastToken,
        expr: Box<Expr>,
    },
    /// `MetaCast`, `DynamicCast` or `InterfaceCast` to `class`.
    ClassCast {
        op: OpCode,
        class: StructId,
        expr: Box<Expr>,
    },

    Call {
        target: CallTarget,
        args: Vec<Expr>,
    },
    /// A delegate value naming a function of the context or of `self`.
    DelegateProperty(Name),
    InstanceDelegate(Name),
    /// An omitted optional argument.
    EmptyParmValue,
    /// Guards the right operand of a short-circuit operator.
    Skip(Box<Expr>),
    New {
        outer: Box<Expr>,
        name: Box<Expr>,
        flags: Box<Expr>,
        class: Box<Expr>,
        template: Box<Expr>,
    },

    StructCompare {
        equal: bool,
        struct_def: StructId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `==` or `!=` between delegates, terminated like a native call.
    DelegateCompare {
        equal: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },

    DynArrayLength(Box<Expr>),
    DynArrayAdd {
        array: Box<Expr>,
        count: Box<Expr>,
    },
    DynArrayInsert {
        array: Box<Expr>,
        index: Box<Expr>,
        count: Box<Expr>,
    },
    DynArrayRemove {
        array: Box<Expr>,
        index: Box<Expr>,
        count: Box<Expr>,
    },
    DynArrayItem {
        op: ItemOp,
        array: Box<Expr>,
        item: Box<Expr>,
    },
    DynArrayInsertItem {
        array: Box<Expr>,
        index: Box<Expr>,
        item: Box<Expr>,
    },
    DynArrayFindStruct {
        array: Box<Expr>,
        member: Box<Expr>,
        value: Box<Expr>,
    },
    DynArraySort {
        array: Box<Expr>,
        delegate: Box<Expr>,
    },

    /// `Let`, `LetBool` or `LetDelegate`.
    Let {
        op: OpCode,
        lvalue: Box<Expr>,
        rvalue: Box<Expr>,
    },
    /// Discards a returned value that needs destruction.
    EatReturnValue {
        property: PropertyId,
        expr: Box<Expr>,
    },
    /// An optional parameter's default, run when the caller omitted it.
    DefaultParmValue(Box<Expr>),
}

impl Expr {
    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn int(value: i32) -> Self {
        Expr::Constant(Constant::Int(value))
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Expr::Nothing)
    }

    /// Whether the node (or the member it reaches) reads the dynamic array length.
    pub fn is_array_length(&self) -> bool {
        match self {
            Expr::DynArrayLength(_) => true,
            Expr::Context { member, .. } => member.is_array_length(),
            _ => false,
        }
    }

    /// Mark every struct member access along an lvalue chain as written.
    pub fn mark_modified(&mut self) {
        match self {
            Expr::StructMember { modified, base, .. } => {
                *modified = true;
                base.mark_modified();
            }
            Expr::ArrayElement { array, .. } | Expr::DynArrayElement { array, .. } => {
                array.mark_modified();
            }
            Expr::BoolVariable(inner) => inner.mark_modified(),
            Expr::Context { member, .. } => member.mark_modified(),
            _ => {}
        }
    }
}
