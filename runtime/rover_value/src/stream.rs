//! The iterator bridge.
//!
//! `ValueStream` adapts any value to one uniform lazy, forward-only,
//! non-restartable sequence:
//!
//! - null source: empty sequence
//! - atomic carrying an `IteratorExtension`: delegates to it
//! - any other atomic: the value itself, once
//! - LIST: its elements in order
//! - OBJECT: one single-key object per entry, in insertion order
//!
//! The stream registers a reference on its source at construction and
//! releases it on close, keeping the source alive while it is consumed
//! elsewhere. List/object cursors snapshot the source's mutation version
//! and re-check it on every step; structural mutation mid-iteration is
//! the dedicated concurrent-modification error.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{self, RuntimeError};
use crate::{RuntimeValue, ValueKind};

/// A native iterator attached to a value through its metadata pool.
///
/// Constructs implement this to make a plain value iterable (a database
/// cursor, a matched-pattern sequence). Errors are wrapped into the
/// runtime `IterationFailed` kind by the bridge, never surfaced raw.
pub trait CustomIterator: Send {
    /// Produce the next value, or `None` when exhausted.
    fn next(&mut self) -> Result<Option<RuntimeValue>, RuntimeError>;
}

/// Metadata extension carrying a custom iterator.
pub struct IteratorExtension {
    iter: Mutex<Box<dyn CustomIterator>>,
}

impl IteratorExtension {
    /// Wrap a custom iterator for attachment to a value.
    pub fn new(iter: Box<dyn CustomIterator>) -> Self {
        IteratorExtension {
            iter: Mutex::new(iter),
        }
    }

    fn next(&self) -> Result<Option<RuntimeValue>, RuntimeError> {
        self.iter.lock().next()
    }
}

enum StreamMode {
    Empty,
    Single { done: bool },
    List { index: usize, version: u64 },
    Object { index: usize, version: u64 },
    Custom(Arc<IteratorExtension>),
}

/// Lazy, forward-only, non-restartable sequence over a source value.
pub struct ValueStream {
    source: RuntimeValue,
    mode: StreamMode,
    closed: bool,
}

impl ValueStream {
    /// Open a stream over `source`, registering a reference on it.
    pub fn over(source: &RuntimeValue) -> Result<ValueStream, RuntimeError> {
        let mode = if source.is_null()? {
            StreamMode::Empty
        } else {
            match source.kind()? {
                ValueKind::Atomic => match source.get_metadata::<IteratorExtension>()? {
                    Some(ext) => StreamMode::Custom(ext),
                    None => StreamMode::Single { done: false },
                },
                ValueKind::List => StreamMode::List {
                    index: 0,
                    version: source.version()?,
                },
                ValueKind::Object => StreamMode::Object {
                    index: 0,
                    version: source.version()?,
                },
            }
        };
        source.register_reference();
        Ok(ValueStream {
            source: source.clone(),
            mode,
            closed: false,
        })
    }

    /// The next element, or `None` when the sequence is exhausted.
    pub fn next(&mut self) -> Result<Option<RuntimeValue>, RuntimeError> {
        if self.closed {
            return Ok(None);
        }
        match &mut self.mode {
            StreamMode::Empty => Ok(None),
            StreamMode::Single { done } => {
                if *done {
                    Ok(None)
                } else {
                    *done = true;
                    Ok(Some(self.source.clone()))
                }
            }
            StreamMode::List { index, version } => {
                if self.source.version()? != *version {
                    return Err(errors::concurrent_modification());
                }
                if *index >= self.source.list_len()? {
                    return Ok(None);
                }
                let item = self.source.list_get(*index)?;
                *index += 1;
                Ok(Some(item))
            }
            StreamMode::Object { index, version } => {
                if self.source.version()? != *version {
                    return Err(errors::concurrent_modification());
                }
                match self.source.object_entry_at(*index)? {
                    Some((key, value)) => {
                        *index += 1;
                        Ok(Some(RuntimeValue::object(vec![(key, value)])))
                    }
                    None => Ok(None),
                }
            }
            StreamMode::Custom(ext) => match ext.next() {
                Ok(item) => Ok(item),
                Err(err) if err.is_abort() => Err(err),
                Err(err) => Err(errors::iteration_failed(err)),
            },
        }
    }

    /// The source value being iterated.
    pub fn source(&self) -> &RuntimeValue {
        &self.source
    }

    /// Release the reference held on the source. Idempotent; also runs
    /// on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.source.release_reference().is_err() {
            tracing::debug!("stream source reference underflow on close");
        }
    }
}

impl Drop for ValueStream {
    fn drop(&mut self) {
        self.close();
    }
}
