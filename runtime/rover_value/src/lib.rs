//! Rover Value - the runtime value model for the Rover execution core.
//!
//! # Architecture
//!
//! - `RuntimeValue`: the tri-shaped (atomic/list/object) reference-counted
//!   value. Shape is fixed at construction; all heap state lives behind a
//!   shared cell so two variables can alias one LIST/OBJECT instance and
//!   observe each other's mutations.
//! - `MetaPool`: per-value bag of typed side-channel extensions, at most
//!   one per concrete type. Constructs use it to attach domain data (a
//!   database handle, a compiled pattern) to an otherwise plain value.
//! - `ValueStream`: the iterator bridge producing one uniform lazy
//!   sequence over any value.
//! - `Signal`: the CONTINUE/BREAK/RETURN/RESUME flow algebra every
//!   executable node evaluates to.
//! - `RuntimeError`: the uniform runtime-error value with optional wrapped
//!   cause and source position.
//!
//! # Reference Counting
//!
//! Ownership of a value is registered on assignment/capture
//! (`register_reference`) and released at scope exit (`release_reference`).
//! Release to zero closes the value unless disposal is prevented; closing a
//! LIST/OBJECT releases exactly one reference on each child. The three
//! literal singletons (true, false, null) are immune: closing them only
//! clears their metadata pool.

mod atomic;
pub mod errors;
mod metadata;
mod native;
mod signal;
mod stream;
mod value;

pub use atomic::{format_number, AtomicValue, BinaryRef};
pub use errors::{RuntimeError, RuntimeErrorKind, SignalResult, ValueResult};
pub use metadata::MetaPool;
pub use native::{NativeList, NativeNode, NativeObject};
pub use signal::Signal;
pub use stream::{CustomIterator, IteratorExtension, ValueStream};
pub use value::{RuntimeValue, ValueKind};
