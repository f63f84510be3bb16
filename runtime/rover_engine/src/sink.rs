//! Debugger sink: the external consumer of execution events and the
//! source of run/pause/stop state.
//!
//! The engine checks the sink's state only at well-defined suspension
//! points (sequence boundaries, loop-condition checks, call boundaries),
//! never inside a single expression evaluation. A `Stopped` state is
//! delivered to the running robot as an uncatchable abort.

use parking_lot::Mutex;

use rover_ir::Position;
use rover_value::RuntimeError;

/// Requested run state of a robot.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum RunState {
    #[default]
    Running,
    /// Cooperative pause: the robot waits at its next suspension point.
    Paused,
    /// Stop request: unwinds like an uncatchable error; `finally` blocks
    /// on the unwind path still run.
    Stopped,
}

/// Consumer of position-tagged execution events.
pub trait DebugSink: Send + Sync {
    /// A robot began executing.
    fn robot_started(&self, session: u64);

    /// A robot finished (normally or not).
    fn robot_stopped(&self, session: u64);

    /// An uncaught runtime error aborted the robot.
    fn error(&self, position: Position, error: &RuntimeError);

    /// Textual output produced at `position`.
    fn output(&self, position: Position, text: &str);

    /// Current run/pause/stop request.
    fn state(&self) -> RunState {
        RunState::Running
    }
}

/// Sink that discards everything and never pauses.
#[derive(Default)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn robot_started(&self, _session: u64) {}
    fn robot_stopped(&self, _session: u64) {}
    fn error(&self, _position: Position, _error: &RuntimeError) {}
    fn output(&self, _position: Position, _text: &str) {}
}

/// One recorded sink event, for assertions and capture.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    Started(u64),
    Stopped(u64),
    Error { line: u32, message: String },
    Output { line: u32, text: String },
}

/// Sink that buffers events and supports external pause/stop control.
#[derive(Default)]
pub struct BufferSink {
    events: Mutex<Vec<SinkEvent>>,
    state: Mutex<RunState>,
}

impl BufferSink {
    /// Create a running sink with no recorded events.
    pub fn new() -> Self {
        BufferSink::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Concatenated output text.
    pub fn output_text(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Output { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Request a cooperative pause.
    pub fn pause(&self) {
        *self.state.lock() = RunState::Paused;
    }

    /// Resume after a pause.
    pub fn resume(&self) {
        *self.state.lock() = RunState::Running;
    }

    /// Request a stop; the robot aborts at its next suspension point.
    pub fn stop(&self) {
        *self.state.lock() = RunState::Stopped;
    }
}

impl DebugSink for BufferSink {
    fn robot_started(&self, session: u64) {
        self.events.lock().push(SinkEvent::Started(session));
    }

    fn robot_stopped(&self, session: u64) {
        self.events.lock().push(SinkEvent::Stopped(session));
    }

    fn error(&self, position: Position, error: &RuntimeError) {
        self.events.lock().push(SinkEvent::Error {
            line: position.line,
            message: error.to_string(),
        });
    }

    fn output(&self, position: Position, text: &str) {
        self.events.lock().push(SinkEvent::Output {
            line: position.line,
            text: text.to_string(),
        });
    }

    fn state(&self) -> RunState {
        *self.state.lock()
    }
}
