//! Executable program tree.
//!
//! Instructions live in a flat arena addressed by `InstId(u32)`; children
//! are id lists, not boxes. The builder allocates placeholder call nodes
//! in phase 1 and patches their targets in phase 2, which is why the
//! arena exposes `get_mut`.

use smallvec::SmallVec;

use rover_ir::{AssignOp, BinaryOp, Name, PipelineOp, Position, UnaryOp};

/// Index of an instruction within its `ProgramArena`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct InstId(u32);

impl InstId {
    /// Create from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        InstId(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstId({})", self.0)
    }
}

/// Index of a declared function.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Placeholder target for calls awaiting phase-2 resolution.
    pub const UNRESOLVED: FunctionId = FunctionId(u32::MAX);

    /// Create from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        FunctionId(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into the function table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this still points at the placeholder.
    #[inline]
    pub const fn is_unresolved(self) -> bool {
        self.0 == u32::MAX
    }
}

impl std::fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unresolved() {
            write!(f, "FunctionId(?)")
        } else {
            write!(f, "FunctionId({})", self.0)
        }
    }
}

/// Index of a registered construct.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ConstructId(pub(crate) u32);

impl ConstructId {
    /// Index into the registry.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared script function.
#[derive(Debug)]
pub struct Function {
    pub name: Name,
    /// Ordered parameter declarations.
    pub params: Vec<Name>,
    pub body: InstId,
    pub pos: Position,
}

/// One segment of a compiled assignment path.
#[derive(Clone, Debug)]
pub enum PathInst {
    /// Evaluated index expression (LIST position or OBJECT key).
    Index(InstId),
    /// Literal field name.
    Field(Name),
    /// Append sentinel: extend the target LIST by one slot.
    Append,
}

/// Executable instruction kinds.
#[derive(Clone, Debug)]
pub enum InstKind {
    // Literals
    NullLit,
    BoolLit(bool),
    NumberLit(f64),
    TextLit(Name),

    VarRef(Name),

    ListLit(Vec<InstId>),
    ObjectLit(Vec<(Name, InstId)>),

    Index { target: InstId, index: InstId },
    FieldGet { target: InstId, field: Name },

    Unary { op: UnaryOp, operand: InstId },
    /// Lowered increment/decrement: rebinds `var` to `var + delta`.
    IncDec { var: Name, delta: f64 },
    Binary {
        op: BinaryOp,
        left: InstId,
        right: InstId,
    },

    VarDecl { name: Name, init: Option<InstId> },
    Assign {
        target: Name,
        path: Vec<PathInst>,
        op: AssignOp,
        value: InstId,
    },

    Sequence(Vec<InstId>),
    If {
        arms: Vec<(InstId, InstId)>,
        else_body: Option<InstId>,
    },
    While { cond: InstId, body: InstId },
    Foreach {
        source: InstId,
        value_var: Name,
        key_var: Option<Name>,
        body: InstId,
    },
    Try {
        body: InstId,
        error_var: Option<Name>,
        on_error: Option<InstId>,
        on_success: Option<InstId>,
        finally: Option<InstId>,
    },

    /// Script-function call; `func` is `FunctionId::UNRESOLVED` until the
    /// phase-2 fixup patches it.
    Call { func: FunctionId, args: Vec<InstId> },

    ConstructCall {
        construct: ConstructId,
        args: Vec<InstId>,
    },

    /// The author-supplied default of an omitted construct argument,
    /// materialized at call time.
    ConstructDefault {
        construct: ConstructId,
        arg: usize,
    },

    Pipeline {
        op: PipelineOp,
        source: InstId,
        /// Element function; `UNRESOLVED` until phase 2 for ops that take
        /// one, permanently `UNRESOLVED` for consume/collect.
        func: FunctionId,
        /// Accumulator seed, present only for reduce.
        seed: Option<InstId>,
    },

    Return(Option<InstId>),
    Break,
    Continue,
}

/// An executable node: kind plus source position.
#[derive(Clone, Debug)]
pub struct Inst {
    pub kind: InstKind,
    pub pos: Position,
}

/// Flat instruction arena.
#[derive(Default, Debug)]
pub struct ProgramArena {
    insts: Vec<Inst>,
}

impl ProgramArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        ProgramArena { insts: Vec::new() }
    }

    /// Allocate an instruction, returning its id.
    pub fn alloc(&mut self, kind: InstKind, pos: Position) -> InstId {
        let id = u32::try_from(self.insts.len())
            .unwrap_or_else(|_| panic!("program arena exceeded capacity"));
        self.insts.push(Inst { kind, pos });
        InstId::from_raw(id)
    }

    /// Get an instruction.
    ///
    /// Ids are only produced by `alloc` on this arena, so the index is
    /// always in bounds for trees built through the public API.
    pub fn get(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    /// Get an instruction mutably (phase-2 fixups).
    pub fn get_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.index()]
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Whether the arena holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Direct children of an instruction, in evaluation order.
    ///
    /// Used by tooling queries (breakpoint placement walks the tree
    /// breadth-first) and by the robot's child enumeration.
    pub fn children(&self, id: InstId) -> SmallVec<[InstId; 8]> {
        let mut out = SmallVec::new();
        match &self.get(id).kind {
            InstKind::NullLit
            | InstKind::BoolLit(_)
            | InstKind::NumberLit(_)
            | InstKind::TextLit(_)
            | InstKind::VarRef(_)
            | InstKind::IncDec { .. }
            | InstKind::ConstructDefault { .. }
            | InstKind::Break
            | InstKind::Continue => {}
            InstKind::ListLit(items) => out.extend(items.iter().copied()),
            InstKind::ObjectLit(entries) => out.extend(entries.iter().map(|(_, v)| *v)),
            InstKind::Index { target, index } => {
                out.push(*target);
                out.push(*index);
            }
            InstKind::FieldGet { target, .. } => out.push(*target),
            InstKind::Unary { operand, .. } => out.push(*operand),
            InstKind::Binary { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            InstKind::VarDecl { init, .. } => out.extend(init.iter().copied()),
            InstKind::Assign { path, value, .. } => {
                for seg in path {
                    if let PathInst::Index(idx) = seg {
                        out.push(*idx);
                    }
                }
                out.push(*value);
            }
            InstKind::Sequence(items) => out.extend(items.iter().copied()),
            InstKind::If { arms, else_body } => {
                for (cond, body) in arms {
                    out.push(*cond);
                    out.push(*body);
                }
                out.extend(else_body.iter().copied());
            }
            InstKind::While { cond, body } => {
                out.push(*cond);
                out.push(*body);
            }
            InstKind::Foreach { source, body, .. } => {
                out.push(*source);
                out.push(*body);
            }
            InstKind::Try {
                body,
                on_error,
                on_success,
                finally,
                ..
            } => {
                out.push(*body);
                out.extend(on_error.iter().copied());
                out.extend(on_success.iter().copied());
                out.extend(finally.iter().copied());
            }
            InstKind::Call { args, .. } | InstKind::ConstructCall { args, .. } => {
                out.extend(args.iter().copied());
            }
            InstKind::Pipeline { source, seed, .. } => {
                out.push(*source);
                out.extend(seed.iter().copied());
            }
            InstKind::Return(value) => out.extend(value.iter().copied()),
        }
        out
    }
}
