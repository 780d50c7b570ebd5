//! Compile-time scope stack.
//!
//! A [`Nest`] is pushed for every class, state, function and control block.
//! It carries the allow mask of what may appear inside it, the jump
//! placeholders waiting for an address, the labels defined in it and
//! the addresses it has already resolved.
//!
//! Popping a nest patches every placeholder it collected. A placeholder
//! whose target was never set is an internal error; a missing label is a
//! user error.

use bitflags::bitflags;
use thiserror::Error;

use unrealscript_core::{Name, PropertyId, PropertyType, StructId};
use crate::bytecode::ScriptBuffer;
use crate::ir::Expr;

/// Deepest nesting a class may reach.
pub const MAX_NEST_LEVELS: usize = 16;

bitflags! {
    /// What may appear in a nest.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Allow: u32 {
        const CLASS     = 1 << 0;
        const VAR_DECL  = 1 << 1;
        const FUNCTION  = 1 << 2;
        const STATE     = 1 << 3;
        const IGNORES   = 1 << 4;
        /// Instance members and `self` are reachable.
        const INSTANCE  = 1 << 5;
        const RETURN    = 1 << 6;
        const CMD       = 1 << 7;
        const LABEL     = 1 << 8;
        /// Latent calls, `goto` by name and `stop`.
        const STATE_CMD = 1 << 9;
        const ELSE_IF   = 1 << 10;
        const BREAK     = 1 << 11;
        const CONTINUE  = 1 << 12;
        const CASE      = 1 << 13;
        const DEFAULT   = 1 << 14;
        /// A `foreach` still waiting for its iterator call.
        const ITERATOR  = 1 << 15;
        /// A `do` loop opened by `while`, which ends without `until`.
        const IN_WHILE  = 1 << 16;
    }
}

/// Kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestKind {
    None,
    Class,
    State,
    Function,
    If,
    Loop,
    Switch,
    For,
    ForEach,
}

impl NestKind {
    pub fn name(self) -> &'static str {
        match self {
            NestKind::None => "Global Scope",
            NestKind::Class => "Class",
            NestKind::State => "State",
            NestKind::Function => "Function",
            NestKind::If => "If",
            NestKind::Loop => "Loop",
            NestKind::Switch => "Switch",
            NestKind::For => "For",
            NestKind::ForEach => "ForEach",
        }
    }

    /// Whether the nest owns a struct (and its script) rather than borrowing its parent's.
    pub fn is_node(self) -> bool {
        matches!(self, NestKind::Class | NestKind::State | NestKind::Function)
    }

    /// Allow mask of a fresh nest of this kind under `parent`.
    fn initial_allow(self, parent: Allow, is_static: bool) -> Allow {
        let inherited = |mask: Allow| parent & mask;
        match self {
            NestKind::None => Allow::CLASS,
            NestKind::Class => {
                Allow::VAR_DECL | Allow::FUNCTION | Allow::STATE | Allow::IGNORES | Allow::INSTANCE
            }
            NestKind::State => {
                Allow::FUNCTION | Allow::LABEL | Allow::STATE_CMD | Allow::IGNORES | Allow::INSTANCE
            }
            NestKind::Function => {
                let mut allow = Allow::VAR_DECL | Allow::RETURN | Allow::CMD | Allow::LABEL;
                if !is_static {
                    allow |= Allow::INSTANCE;
                }
                allow
            }
            NestKind::If => {
                Allow::ELSE_IF
                    | inherited(
                        Allow::CMD
                            | Allow::LABEL
                            | Allow::BREAK
                            | Allow::CONTINUE
                            | Allow::STATE_CMD
                            | Allow::RETURN
                            | Allow::INSTANCE,
                    )
            }
            NestKind::Loop | NestKind::For => {
                Allow::BREAK
                    | Allow::CONTINUE
                    | inherited(
                        Allow::CMD | Allow::LABEL | Allow::STATE_CMD | Allow::RETURN | Allow::INSTANCE,
                    )
            }
            NestKind::Switch => {
                Allow::CASE
                    | Allow::DEFAULT
                    | inherited(Allow::STATE_CMD | Allow::RETURN | Allow::INSTANCE)
            }
            NestKind::ForEach => {
                Allow::ITERATOR
                    | Allow::BREAK
                    | Allow::CONTINUE
                    | inherited(Allow::CMD | Allow::LABEL | Allow::RETURN | Allow::INSTANCE)
            }
        }
    }
}

/// Jump targets a nest can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixupKind {
    IfEnd,
    LoopStart,
    LoopEnd,
    LoopPostCond,
    ForStart,
    ForEnd,
    ForInc,
    SwitchEnd,
    IteratorEnd,
    Label,
}

impl FixupKind {
    const COUNT: usize = 10;

    fn slot(self) -> usize {
        self as usize
    }
}

/// A placeholder in the script waiting for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    pub kind: FixupKind,
    /// Script offset of the placeholder.
    pub at: usize,
    /// Target of a [`FixupKind::Label`] fixup.
    pub label: Option<Name>,
}

/// A label defined in a state, function or `foreach` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: Name,
    pub offset: u32,
}

/// Failure to resolve a nest's placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixupError {
    #[error("Internal fixup error {0:?}")]
    Unresolved(FixupKind),
    #[error("Label '{0}' not found in this block of code")]
    MissingLabel(Name),
}

/// One level of the scope stack.
#[derive(Debug, Clone)]
pub struct Nest {
    pub kind: NestKind,
    /// The class, state or function this nest belongs to.
    pub node: StructId,
    pub allow: Allow,
    fixups: Vec<Fixup>,
    labels: Vec<Label>,
    targets: [Option<u32>; FixupKind::COUNT],
    /// Placeholder of the last `case` or `if` waiting for the next link.
    pub chain: Option<usize>,
    /// Type of the expression a `switch` tests.
    pub switch_type: Option<PropertyType>,
    /// The `for` increment, written when the loop closes.
    pub for_increment: Option<Expr>,
    /// A function body returned a value somewhere.
    pub return_found: bool,
    /// Locals not read or written yet, with their declaration line.
    pub unreferenced: Vec<(PropertyId, u32)>,
    /// Script of a node nest while it compiles.
    pub script: Option<ScriptBuffer>,
}

impl Nest {
    pub fn new(kind: NestKind, node: StructId, allow: Allow) -> Self {
        Self {
            kind,
            node,
            allow,
            fixups: Vec::new(),
            labels: Vec::new(),
            targets: [None; FixupKind::COUNT],
            chain: None,
            switch_type: None,
            for_increment: None,
            return_found: false,
            unreferenced: Vec::new(),
            script: None,
        }
    }

    /// Record where `kind` jumps to.
    pub fn set_target(&mut self, kind: FixupKind, offset: usize) {
        self.targets[kind.slot()] = Some(offset as u32);
    }

    pub fn target(&self, kind: FixupKind) -> Option<u32> {
        self.targets[kind.slot()]
    }

    pub fn add_fixup(&mut self, kind: FixupKind, at: usize) {
        self.fixups.push(Fixup { kind, at, label: None });
    }

    pub fn add_label_fixup(&mut self, label: Name, at: usize) {
        self.fixups.push(Fixup {
            kind: FixupKind::Label,
            at,
            label: Some(label),
        });
    }

    /// Define a label; `false` if the name is taken.
    pub fn add_label(&mut self, name: Name, offset: usize) -> bool {
        if self.labels.iter().any(|label| label.name == name) {
            return false;
        }
        self.labels.push(Label {
            name,
            offset: offset as u32,
        });
        true
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    /// Drop a local from the unreferenced list.
    pub fn mark_referenced(&mut self, property: PropertyId) {
        self.unreferenced.retain(|(local, _)| *local != property);
    }

    /// Patch every placeholder into `script`. The fixup list is empty afterwards.
    pub fn resolve(&mut self, script: &mut ScriptBuffer) -> Result<(), FixupError> {
        for fixup in std::mem::take(&mut self.fixups) {
            let address = match (&fixup.kind, &fixup.label) {
                (FixupKind::Label, Some(name)) => self
                    .labels
                    .iter()
                    .find(|label| &label.name == name)
                    .map(|label| label.offset)
                    .ok_or_else(|| FixupError::MissingLabel(name.clone()))?,
                (kind, _) => self.target(*kind).ok_or(FixupError::Unresolved(*kind))?,
            };
            script.patch_offset(fixup.at, address);
        }
        Ok(())
    }
}

/// The scope stack of one class compile.
#[derive(Debug, Default)]
pub struct NestStack {
    nests: Vec<Nest>,
}

impl NestStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open nests; the global nest counts.
    pub fn level(&self) -> usize {
        self.nests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nests.is_empty()
    }

    /// Open a nest. Returns `false` when the nesting limit is hit.
    pub fn push(&mut self, kind: NestKind, node: StructId, is_static: bool) -> bool {
        if self.nests.len() >= MAX_NEST_LEVELS {
            return false;
        }
        let parent = self.nests.last().map(|nest| nest.allow).unwrap_or(Allow::empty());
        self.nests.push(Nest::new(kind, node, kind.initial_allow(parent, is_static)));
        true
    }

    /// Drop nests above `level` without resolving them.
    pub fn truncate(&mut self, level: usize) {
        self.nests.truncate(level);
    }

    /// Close the innermost nest, patching its placeholders.
    ///
    /// A node nest patches its own script; a block nest patches the script
    /// of the node it belongs to. The popped nest is returned so the caller
    /// can keep the script it produced.
    pub fn pop(&mut self) -> Option<Result<Nest, FixupError>> {
        let mut nest = self.nests.pop()?;
        let result = match nest.script.as_mut() {
            Some(script) => {
                let mut own = std::mem::take(script);
                let result = nest.resolve(&mut own);
                nest.script = Some(own);
                result
            }
            None => match self.script_mut() {
                Some(script) => nest.resolve(script),
                None if nest.fixups.is_empty() => Ok(()),
                None => Err(FixupError::Unresolved(nest.fixups[0].kind)),
            },
        };
        if let Some(parent) = self.nests.last_mut() {
            if matches!(nest.kind, NestKind::Function | NestKind::State) {
                parent.allow.remove(Allow::VAR_DECL);
            }
        }
        Some(result.map(|()| nest))
    }

    pub fn top(&self) -> Option<&Nest> {
        self.nests.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Nest> {
        self.nests.last_mut()
    }

    pub fn top_kind(&self) -> NestKind {
        self.top().map(|nest| nest.kind).unwrap_or(NestKind::None)
    }

    pub fn top_allow(&self) -> Allow {
        self.top().map(|nest| nest.allow).unwrap_or(Allow::empty())
    }

    pub fn get(&self, index: usize) -> Option<&Nest> {
        self.nests.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Nest> {
        self.nests.get_mut(index)
    }

    /// Innermost nest of `kind`, excluding the global nest.
    pub fn find(&self, kind: NestKind) -> Option<usize> {
        (1..self.nests.len()).rev().find(|&i| self.nests[i].kind == kind)
    }

    /// Innermost nest matching any of `kinds`, at or above `min_level`.
    pub fn find_any(&self, kinds: &[NestKind], min_level: usize) -> Option<usize> {
        (min_level..self.nests.len()).rev().find(|&i| kinds.contains(&self.nests[i].kind))
    }

    /// Nests from innermost to outermost.
    pub fn iter_rev(&self) -> impl Iterator<Item = &Nest> {
        self.nests.iter().rev()
    }

    /// Script of the innermost node nest.
    pub fn script_mut(&mut self) -> Option<&mut ScriptBuffer> {
        self.nests.iter_mut().rev().find_map(|nest| nest.script.as_mut())
    }

    pub fn script(&self) -> Option<&ScriptBuffer> {
        self.nests.iter().rev().find_map(|nest| nest.script.as_ref())
    }

    /// Current length of the active script, 0 when none is open.
    pub fn code_len(&self) -> usize {
        self.script().map(ScriptBuffer::len).unwrap_or(0)
    }

    /// Innermost function or state nest.
    pub fn code_node(&self) -> Option<&Nest> {
        self.nests
            .iter()
            .rev()
            .find(|nest| matches!(nest.kind, NestKind::Function | NestKind::State))
    }

    pub fn code_node_mut(&mut self) -> Option<&mut Nest> {
        self.nests
            .iter_mut()
            .rev()
            .find(|nest| matches!(nest.kind, NestKind::Function | NestKind::State))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;
    use crate::options::OffsetWidth;
    use unrealscript_core::NameTable;

    fn function_stack() -> NestStack {
        let mut nests = NestStack::new();
        assert!(nests.push(NestKind::None, StructId(0), false));
        assert!(nests.push(NestKind::Class, StructId(0), false));
        assert!(nests.push(NestKind::Function, StructId(1), false));
        nests.top_mut().unwrap().script = Some(ScriptBuffer::new(OffsetWidth::U16));
        nests
    }

    // ==========================================================================
    // Allow masks
    // ==========================================================================

    #[test]
    fn class_allows_declarations() {
        let mut nests = NestStack::new();
        nests.push(NestKind::None, StructId(0), false);
        assert_eq!(nests.top_allow(), Allow::CLASS);
        nests.push(NestKind::Class, StructId(0), false);
        assert!(nests.top_allow().contains(Allow::VAR_DECL | Allow::STATE));
        assert!(!nests.top_allow().contains(Allow::CMD));
    }

    #[test]
    fn static_functions_have_no_instance() {
        let mut nests = NestStack::new();
        nests.push(NestKind::None, StructId(0), false);
        nests.push(NestKind::Class, StructId(0), false);
        nests.push(NestKind::Function, StructId(1), true);
        assert!(!nests.top_allow().contains(Allow::INSTANCE));
        assert!(nests.top_allow().contains(Allow::CMD | Allow::RETURN));
    }

    #[test]
    fn blocks_inherit_from_parent() {
        let mut nests = function_stack();
        nests.push(NestKind::Loop, StructId(1), false);
        let allow = nests.top_allow();
        assert!(allow.contains(Allow::BREAK | Allow::CONTINUE | Allow::CMD | Allow::RETURN));
        nests.push(NestKind::Switch, StructId(1), false);
        let allow = nests.top_allow();
        assert!(allow.contains(Allow::CASE | Allow::RETURN));
        assert!(!allow.contains(Allow::CMD));
        assert!(!allow.contains(Allow::BREAK));
    }

    #[test]
    fn popping_function_closes_var_decls() {
        let mut nests = function_stack();
        let popped = nests.pop().unwrap().unwrap();
        assert_eq!(popped.kind, NestKind::Function);
        assert!(!nests.top_allow().contains(Allow::VAR_DECL));
    }

    #[test]
    fn nesting_limit() {
        let mut nests = NestStack::new();
        for _ in 0..MAX_NEST_LEVELS {
            assert!(nests.push(NestKind::If, StructId(0), false));
        }
        assert!(!nests.push(NestKind::If, StructId(0), false));
    }

    // ==========================================================================
    // Fixups
    // ==========================================================================

    #[test]
    fn block_fixups_patch_enclosing_script() {
        let mut nests = function_stack();
        nests.push(NestKind::Loop, StructId(1), false);
        let script = nests.script_mut().unwrap();
        script.write_op(OpCode::Jump);
        let at = script.write_placeholder();
        script.write_op(OpCode::Nothing);
        let end = script.len();
        let top = nests.top_mut().unwrap();
        top.add_fixup(FixupKind::LoopEnd, at);
        top.set_target(FixupKind::LoopEnd, end);
        let popped = nests.pop().unwrap().unwrap();
        assert!(popped.fixups().is_empty());
        assert_eq!(nests.script().unwrap().read_offset(at), end as u32);
    }

    #[test]
    fn unresolved_target_is_an_error() {
        let mut nests = function_stack();
        nests.push(NestKind::If, StructId(1), false);
        let at = nests.script_mut().unwrap().write_placeholder();
        nests.top_mut().unwrap().add_fixup(FixupKind::IfEnd, at);
        let err = nests.pop().unwrap().unwrap_err();
        assert_eq!(err, FixupError::Unresolved(FixupKind::IfEnd));
    }

    #[test]
    fn labels_resolve_by_name() {
        let mut names = NameTable::new();
        let begin = names.intern("Begin");
        let missing = names.intern("Nowhere");

        let mut nests = function_stack();
        let top = nests.top_mut().unwrap();
        assert!(top.add_label(begin.clone(), 0));
        assert!(!top.add_label(begin.clone(), 4));
        let at = nests.script_mut().unwrap().write_placeholder();
        nests.top_mut().unwrap().add_label_fixup(begin, at);
        let popped = nests.pop().unwrap().unwrap();
        assert_eq!(popped.script.unwrap().read_offset(at), 0);

        let mut nests = function_stack();
        let at = nests.script_mut().unwrap().write_placeholder();
        nests.top_mut().unwrap().add_label_fixup(missing.clone(), at);
        assert_eq!(nests.pop().unwrap().unwrap_err(), FixupError::MissingLabel(missing));
    }

    #[test]
    fn find_prefers_innermost() {
        let mut nests = function_stack();
        nests.push(NestKind::Loop, StructId(1), false);
        nests.push(NestKind::If, StructId(1), false);
        nests.push(NestKind::Loop, StructId(1), false);
        assert_eq!(nests.find(NestKind::Loop), Some(5));
        assert_eq!(nests.find(NestKind::Switch), None);
        assert_eq!(
            nests.find_any(&[NestKind::Function, NestKind::State, NestKind::ForEach], 2),
            Some(2)
        );
    }
}
