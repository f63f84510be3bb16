//! Runtime error values and their factory constructors.
//!
//! Runtime errors are raised by constructs and built-in operators, caught
//! only by an enclosing error block, and reported through the debugger
//! sink with the source position of the failing instruction. The factory
//! functions are the public API; they populate the structured kind so
//! callers match on `kind`, not on message strings.

use std::fmt;

use rover_ir::Position;

use crate::{RuntimeValue, Signal};

/// Result of evaluating one executable node.
pub type SignalResult = Result<Signal, RuntimeError>;

/// Result of an operation producing a value.
pub type ValueResult = Result<RuntimeValue, RuntimeError>;

/// Structured runtime error category.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeErrorKind {
    /// Access to a value after it was closed.
    ClosedValue,
    /// `release_reference` on a value whose count is already zero.
    ReferenceUnderflow,
    /// A value with no well-formed numeric representation was used as one.
    NotANumber { repr: String },
    /// Division or modulo by zero.
    DivisionByZero,
    /// LIST index outside `0..len`.
    IndexOutOfRange { index: i64, len: usize },
    /// OBJECT key lookup failed.
    KeyNotFound { key: String },
    /// Operation applied to a value of the wrong shape.
    TypeMismatch {
        expected: &'static str,
        got: String,
    },
    /// LIST/OBJECT structurally mutated while being iterated elsewhere.
    ConcurrentModification,
    /// A custom iterator failed; the cause carries the underlying error.
    IterationFailed,
    /// A construct's native processing function failed.
    ConstructFailed { construct: String },
    /// External stop request; unwinds like an error but cannot be caught.
    Aborted,
    /// Free-form error raised by script-facing constructs.
    Custom { message: String },
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedValue => write!(f, "value has been closed"),
            Self::ReferenceUnderflow => {
                write!(f, "reference released below zero")
            }
            Self::NotANumber { repr } => {
                write!(f, "'{repr}' has no numeric value")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for list of {len}")
            }
            Self::KeyNotFound { key } => write!(f, "key '{key}' not found"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "expected {expected}, got {got}")
            }
            Self::ConcurrentModification => {
                write!(f, "value modified while being iterated")
            }
            Self::IterationFailed => write!(f, "iteration failed"),
            Self::ConstructFailed { construct } => {
                write!(f, "construct '{construct}' failed")
            }
            Self::Aborted => write!(f, "robot stopped"),
            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// Runtime error: structured kind, source position, optional wrapped cause.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub position: Option<Position>,
    pub cause: Option<Box<RuntimeError>>,
}

impl RuntimeError {
    /// Create an error with no position or cause.
    pub const fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind,
            position: None,
            cause: None,
        }
    }

    /// Attach a source position, keeping an already-set one.
    ///
    /// The innermost position wins: errors pick up the position of the
    /// instruction that raised them, not of every frame they unwind past.
    pub fn at(mut self, position: Position) -> Self {
        self.position.get_or_insert(position);
        self
    }

    /// Wrap an underlying error as this error's cause.
    pub fn caused_by(mut self, cause: RuntimeError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Whether this is the uncatchable stop signal.
    pub const fn is_abort(&self) -> bool {
        matches!(self.kind, RuntimeErrorKind::Aborted)
    }

    /// Convert to a script-visible OBJECT (bound to an error variable).
    pub fn to_value(&self) -> RuntimeValue {
        let mut entries = Vec::new();
        entries.push((
            "message".to_string(),
            RuntimeValue::text(self.kind.to_string()),
        ));
        if let Some(pos) = self.position {
            entries.push((
                "line".to_string(),
                RuntimeValue::number(f64::from(pos.line)),
            ));
        }
        if let Some(cause) = &self.cause {
            entries.push(("cause".to_string(), cause.to_value()));
        }
        RuntimeValue::object(entries)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

// Factory constructors

/// Access to a closed value.
pub fn closed_value() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::ClosedValue)
}

/// Reference count released below zero.
pub fn reference_underflow() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::ReferenceUnderflow)
}

/// No well-formed numeric value.
pub fn not_a_number(repr: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::NotANumber { repr: repr.into() })
}

/// Division or modulo by zero.
pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::DivisionByZero)
}

/// LIST index out of range.
pub fn index_out_of_range(index: i64, len: usize) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::IndexOutOfRange { index, len })
}

/// OBJECT key not found.
pub fn key_not_found(key: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::KeyNotFound { key: key.into() })
}

/// Wrong value shape.
pub fn type_mismatch(expected: &'static str, got: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::TypeMismatch {
        expected,
        got: got.into(),
    })
}

/// Structural mutation observed mid-iteration.
pub fn concurrent_modification() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::ConcurrentModification)
}

/// Custom iterator failure wrapping the underlying error.
pub fn iteration_failed(cause: RuntimeError) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::IterationFailed).caused_by(cause)
}

/// Construct failure.
pub fn construct_failed(construct: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::ConstructFailed {
        construct: construct.into(),
    })
}

/// External stop request.
pub fn aborted() -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Aborted)
}

/// Free-form runtime error.
pub fn runtime_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Custom {
        message: message.into(),
    })
}
