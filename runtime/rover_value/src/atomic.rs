//! Atomic payloads and their coercion rules.
//!
//! Each atomic kind defines its own string/number/boolean conversions:
//! a numeric-looking string auto-parses to a number, an empty string is
//! boolean-false, binary values are boolean-true and stringify to a
//! descriptive tag, never to their content.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque handle to a binary stream.
///
/// The stream itself is owned by whichever construct produced it; the
/// value model only keeps it alive and hands it back on request.
#[derive(Clone)]
pub struct BinaryRef {
    stream: Arc<Mutex<Box<dyn Read + Send>>>,
}

impl BinaryRef {
    /// Wrap a reader as a binary stream reference.
    pub fn new(stream: Box<dyn Read + Send>) -> Self {
        BinaryRef {
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Run `f` with exclusive access to the underlying reader.
    pub fn with_stream<R>(&self, f: impl FnOnce(&mut dyn Read) -> R) -> R {
        let mut guard = self.stream.lock();
        f(guard.as_mut())
    }

    /// Identity of the underlying stream, for equality checks.
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.stream) as *const () as usize
    }
}

impl fmt::Debug for BinaryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryRef(0x{:x})", self.ptr_id())
    }
}

/// Atomic value payload.
#[derive(Clone, Debug, Default)]
pub enum AtomicValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Binary(BinaryRef),
}

/// Render a number the way scripts expect: integral values drop the
/// fractional part, everything else uses the shortest float form.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Collapses -0.0
        return "0".to_string();
    }
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl AtomicValue {
    /// Kind name used in error messages.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            AtomicValue::Null => "null",
            AtomicValue::Bool(_) => "boolean",
            AtomicValue::Number(_) => "number",
            AtomicValue::Text(_) => "text",
            AtomicValue::Binary(_) => "binary",
        }
    }

    /// Whether this is the null payload.
    pub const fn is_null(&self) -> bool {
        matches!(self, AtomicValue::Null)
    }

    /// String representation.
    ///
    /// Binary stringifies to a descriptive tag, never to stream content.
    pub fn string_value(&self) -> String {
        match self {
            AtomicValue::Null => String::new(),
            AtomicValue::Bool(b) => b.to_string(),
            AtomicValue::Number(n) => format_number(*n),
            AtomicValue::Text(s) => s.clone(),
            AtomicValue::Binary(_) => "[binary stream]".to_string(),
        }
    }

    /// Well-formed numeric value, if this kind defines one.
    ///
    /// Text parses after trimming; only finite parses count as well-formed.
    /// Null and binary have no numeric value.
    pub fn number_value(&self) -> Option<f64> {
        match self {
            AtomicValue::Null | AtomicValue::Binary(_) => None,
            AtomicValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AtomicValue::Number(n) => Some(*n),
            AtomicValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    /// Boolean coercion.
    ///
    /// Empty string is false; binary is always true.
    pub fn boolean_value(&self) -> bool {
        match self {
            AtomicValue::Null => false,
            AtomicValue::Bool(b) => *b,
            AtomicValue::Number(n) => *n != 0.0,
            AtomicValue::Text(s) => !s.is_empty(),
            AtomicValue::Binary(_) => true,
        }
    }
}
