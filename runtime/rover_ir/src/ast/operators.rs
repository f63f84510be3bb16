//! Operator kinds used in expressions.

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // String
    Concat,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical (short-circuit)
    And,
    Or,
}

impl BinaryOp {
    /// Source-level symbol, used in error messages.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Concat => "&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Unary prefix/suffix operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    /// Arithmetic negation (prefix).
    Neg,
    /// Logical not (prefix).
    Not,
    /// String cast (prefix).
    StringCast,
    /// Increment (suffix); operand must be a variable reference.
    Increment,
    /// Decrement (suffix); operand must be a variable reference.
    Decrement,
}

impl UnaryOp {
    /// Source-level symbol, used in error messages.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
            Self::StringCast => "$",
            Self::Increment => "++",
            Self::Decrement => "--",
        }
    }
}

/// Assignment variants: plain set plus read-modify-write forms.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

impl AssignOp {
    /// The binary operator a compound assignment desugars to.
    pub const fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Set => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
            Self::Concat => Some(BinaryOp::Concat),
        }
    }
}

/// Pipeline operators.
///
/// `Map`, `Filter` and `Peek` wrap the source lazily; the rest force full
/// traversal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PipelineOp {
    Map,
    Filter,
    Peek,
    /// Terminal: run the element function for side effects, discard results.
    ForEach,
    /// Terminal: fold with an explicit accumulator seed.
    Reduce,
    /// Terminal: drain the sequence, discarding every element.
    Consume,
    /// Terminal: materialize the sequence into a LIST.
    Collect,
}

impl PipelineOp {
    /// Whether this operator forces full traversal of its source.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ForEach | Self::Reduce | Self::Consume | Self::Collect
        )
    }

    /// Number of parameters the element function must declare.
    ///
    /// `Reduce` folds `(accumulator, element)`; `Consume` and `Collect`
    /// take no element function at all.
    pub const fn function_arity(self) -> Option<usize> {
        match self {
            Self::Map | Self::Filter | Self::Peek | Self::ForEach => Some(1),
            Self::Reduce => Some(2),
            Self::Consume | Self::Collect => None,
        }
    }

    /// Operator name as written in source, used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Filter => "filter",
            Self::Peek => "peek",
            Self::ForEach => "foreach",
            Self::Reduce => "reduce",
            Self::Consume => "consume",
            Self::Collect => "collect",
        }
    }
}
