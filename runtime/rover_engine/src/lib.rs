//! Rover Engine - program-tree builder and execution engine.
//!
//! This crate turns the syntax tree an external parser produces into an
//! executable `Robot` and walks it:
//!
//! - `compile`: two-phase construction with forward-reference fixups and
//!   include wiring, returning issues plus the built robot
//! - `Engine`: the tree-walking executor, evaluating every node to a
//!   flow signal and observing the debugger sink at suspension points
//! - `ConstructRegistry`: the dispatch boundary for native capabilities
//! - `DebugSink`: the consumer of position-tagged execution events and
//!   the source of run/pause/stop state
//!
//! # Architecture
//!
//! Collaborators are threaded explicitly: the builder receives the
//! registry and interner, the engine receives the robot, registry,
//! interner and sink. Nothing in this crate reaches for ambient state,
//! which is what lets independent robots run concurrently against one
//! read-only registry.

mod build;
mod construct;
mod environment;
mod exec;
mod program;
mod robot;
mod sink;

#[cfg(test)]
mod tests;

pub use build::{compile, CompileOutcome};
pub use construct::{
    Construct, ConstructArg, ConstructContext, ConstructFn, ConstructRegistry, ShapeSet,
};
pub use environment::Environment;
pub use exec::Engine;
pub use program::{
    ConstructId, Function, FunctionId, Inst, InstId, InstKind, PathInst, ProgramArena,
};
pub use robot::{Library, Robot};
pub use sink::{BufferSink, DebugSink, NullSink, RunState, SinkEvent};
