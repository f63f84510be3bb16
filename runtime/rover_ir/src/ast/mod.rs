//! Syntax tree produced by the external parser.
//!
//! One `SourceUnit` per script file: a flat arena of `AstNode`s addressed
//! by `AstId(u32)` indices plus the list of top-level items. Operator
//! precedence is already baked into the tree shape by the parser; the
//! builder consumes kinds, it never re-associates.

mod operators;


pub use operators::{AssignOp, BinaryOp, PipelineOp, UnaryOp};

use crate::Name;

/// Index of a node within its `AstArena`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct AstId(u32);

impl AstId {
    /// Create from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        AstId(raw)
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

impl std::fmt::Debug for AstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AstId({})", self.0)
    }
}

/// Syntax node: kind plus the 1-based source line it starts on.
#[derive(Clone, Debug)]
pub struct AstNode {
    pub kind: AstKind,
    pub line: u32,
}

/// One segment of an assignment path.
///
/// `robot[3].name` assigns through `Index` then `Field`; the `Append`
/// sentinel (written as the size of the list in the surface syntax)
/// extends the target list by one slot.
#[derive(Clone, Debug)]
pub enum PathSegment {
    /// Evaluated index expression into a LIST (or OBJECT by key string).
    Index(AstId),
    /// Literal field name into an OBJECT.
    Field(Name),
    /// Append/extend sentinel for LIST targets.
    Append,
}

/// Syntax node kinds.
///
/// A closed enum: the program-tree builder matches exhaustively, so an
/// unhandled kind is a compile error in the builder, not a runtime fault.
#[derive(Clone, Debug)]
pub enum AstKind {
    // Literals
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Str(Name),
    Null,

    /// Variable reference.
    VarRef(Name),

    /// List literal: `[a, b, c]`.
    ListLit(Vec<AstId>),
    /// Object literal: `{key: value, ...}` (insertion order preserved).
    ObjectLit(Vec<(Name, AstId)>),

    /// Index extraction: `target[index]`.
    Index { target: AstId, index: AstId },
    /// Field extraction: `target.field`.
    Field { target: AstId, field: Name },

    /// Unary prefix/suffix operation.
    Unary { op: UnaryOp, operand: AstId },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: AstId,
        right: AstId,
    },

    /// Variable declaration with optional initializer.
    VarDecl { name: Name, init: Option<AstId> },

    /// Assignment, plain or through a path.
    Assign {
        target: Name,
        path: Vec<PathSegment>,
        op: AssignOp,
        value: AstId,
    },

    /// Function declaration.
    FuncDecl {
        name: Name,
        params: Vec<Name>,
        body: AstId,
    },

    /// Script-function call; may reference a declaration that follows it.
    Call { func: Name, args: Vec<AstId> },

    /// Construct (native capability) call: `plugin.construct(args)`.
    ConstructCall {
        plugin: Name,
        construct: Name,
        args: Vec<AstId>,
    },

    /// Include statement naming another source file.
    Include { file: Name },

    /// Plugin-use statement.
    UsePlugin { plugin: Name },

    /// Instruction sequence.
    Block(Vec<AstId>),

    /// Conditional chain: first true condition wins, optional else.
    If {
        arms: Vec<(AstId, AstId)>,
        else_body: Option<AstId>,
    },

    /// While loop.
    While { cond: AstId, body: AstId },

    /// Foreach over the iterator bridge of `source`.
    Foreach {
        source: AstId,
        value_var: Name,
        key_var: Option<Name>,
        body: AstId,
    },

    /// Error-handling block: do / error / success / finally.
    Try {
        body: AstId,
        error_var: Option<Name>,
        on_error: Option<AstId>,
        on_success: Option<AstId>,
        finally: Option<AstId>,
    },

    /// Pipeline operator over a source expression and an element function.
    Pipeline {
        op: PipelineOp,
        source: AstId,
        func: Name,
        /// Accumulator seed; present only for `PipelineOp::Reduce`.
        seed: Option<AstId>,
    },

    Return(Option<AstId>),
    Break,
    Continue,
}

/// Flat arena of syntax nodes for one source file.
#[derive(Default, Debug)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        AstArena { nodes: Vec::new() }
    }

    /// Allocate a node, returning its id.
    pub fn alloc(&mut self, kind: AstKind, line: u32) -> AstId {
        let id = u32::try_from(self.nodes.len())
            .unwrap_or_else(|_| panic!("syntax arena exceeded capacity"));
        self.nodes.push(AstNode { kind, line });
        AstId::from_raw(id)
    }

    /// Get a node by id.
    ///
    /// Ids are only produced by `alloc` on this arena, so the index is
    /// always in bounds for trees built through the public API.
    pub fn get(&self, id: AstId) -> &AstNode {
        &self.nodes[id.index()]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One parsed source file: file identity, arena, top-level items in order.
#[derive(Debug)]
pub struct SourceUnit {
    /// Interned file identity (matched against include statements).
    pub file: Name,
    /// Node storage.
    pub arena: AstArena,
    /// Top-level items in declaration order.
    pub items: Vec<AstId>,
}

impl SourceUnit {
    /// Create an empty unit for `file`.
    pub fn new(file: Name) -> Self {
        SourceUnit {
            file,
            arena: AstArena::new(),
            items: Vec::new(),
        }
    }
}
