//! The execution engine.
//!
//! `Engine` walks the instruction arena of one robot, evaluating every
//! node to a flow signal. All collaborators (arena, function table,
//! construct registry, interner, debugger sink) are threaded through
//! this one context; there is no ambient global state.
//!
//! # Suspension Points
//!
//! Pause and stop requests from the sink are observed only at sequence
//! boundaries, loop-condition checks and call boundaries, never inside a
//! single expression evaluation. A stop unwinds as an uncatchable abort;
//! `finally` blocks on the unwind path still run.

mod ops;
mod pipeline;

use rover_ir::{AssignOp, BinaryOp, Name, Position, StringInterner};
use rover_value::{
    errors, RuntimeError, RuntimeValue, Signal, SignalResult, ValueKind, ValueStream,
};

use crate::construct::{ConstructContext, ConstructRegistry};
use crate::environment::Environment;
use crate::program::{FunctionId, InstId, InstKind, PathInst};
use crate::robot::Robot;
use crate::sink::{DebugSink, RunState};

/// Tree-walking executor for one robot run.
pub struct Engine<'a> {
    robot: &'a Robot,
    registry: &'a ConstructRegistry,
    interner: &'a StringInterner,
    sink: &'a dyn DebugSink,
    env: Environment,
    libs_initialized: bool,
    /// Set while a `finally` runs on an abort unwind: the stop already in
    /// flight wins, so suspension points stop observing the sink until
    /// the cleanup chain completes.
    suppress_abort: bool,
}

impl<'a> Engine<'a> {
    /// Create an engine for one robot run.
    pub fn new(
        robot: &'a Robot,
        registry: &'a ConstructRegistry,
        interner: &'a StringInterner,
        sink: &'a dyn DebugSink,
    ) -> Self {
        Engine {
            robot,
            registry,
            interner,
            sink,
            env: Environment::new(),
            libs_initialized: false,
            suppress_abort: false,
        }
    }

    /// Run the robot to completion, reporting start/stop and any uncaught
    /// error through the sink.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let session = self.robot.session_id();
        self.sink.robot_started(session);
        tracing::debug!(session, "robot started");
        let result = self.initialize(false);
        if let Err(err) = &result {
            self.sink.error(err.position.unwrap_or(Position::DUMMY), err);
            tracing::debug!(session, error = %err, "robot aborted");
        }
        self.sink.robot_stopped(session);
        result
    }

    /// Execute the library roots in include order and, unless
    /// `skip_self` is set, the robot's own top-level sequence.
    ///
    /// Library initialization runs at most once per engine.
    pub fn initialize(&mut self, skip_self: bool) -> Result<(), RuntimeError> {
        if !self.libs_initialized {
            self.libs_initialized = true;
            for lib in self.robot.libraries() {
                self.exec(lib.root)?;
            }
        }
        if !skip_self {
            self.exec(self.robot.root())?;
        }
        Ok(())
    }

    /// Peek at a global binding (tooling and tests).
    pub fn global_value(&self, name: Name) -> Option<RuntimeValue> {
        self.env.lookup(name)
    }

    // Core dispatch

    fn exec(&mut self, id: InstId) -> SignalResult {
        let robot = self.robot;
        let inst = robot.arena.get(id);
        let pos = inst.pos;
        self.exec_kind(&inst.kind, pos).map_err(|e| e.at(pos))
    }

    /// Evaluate an instruction in expression position.
    ///
    /// Break/continue/return cannot occur inside expressions; a resume
    /// without a value reads as null.
    fn value_of(&mut self, id: InstId) -> Result<RuntimeValue, RuntimeError> {
        match self.exec(id)? {
            Signal::Resume(Some(value)) => Ok(value),
            _ => Ok(RuntimeValue::null()),
        }
    }

    fn exec_kind(&mut self, kind: &InstKind, pos: Position) -> SignalResult {
        match kind {
            InstKind::NullLit => Ok(Signal::resume_with(RuntimeValue::null())),
            InstKind::BoolLit(b) => Ok(Signal::resume_with(RuntimeValue::boolean(*b))),
            InstKind::NumberLit(n) => Ok(Signal::resume_with(RuntimeValue::number(*n))),
            InstKind::TextLit(s) => Ok(Signal::resume_with(RuntimeValue::text(
                self.interner.lookup(*s),
            ))),

            InstKind::VarRef(name) => {
                let value = self.lookup_var(*name)?;
                Ok(Signal::resume_with(value))
            }

            InstKind::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for &item in items {
                    values.push(self.value_of(item)?);
                }
                Ok(Signal::resume_with(RuntimeValue::list(values)))
            }
            InstKind::ObjectLit(entries) => {
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    values.push((self.interner.lookup(*key), self.value_of(*value)?));
                }
                Ok(Signal::resume_with(RuntimeValue::object(values)))
            }

            InstKind::Index { target, index } => {
                let target = self.value_of(*target)?;
                let index = self.value_of(*index)?;
                let value = match target.kind()? {
                    ValueKind::List => {
                        let i = list_index(&index, target.list_len()?)?;
                        target.list_get(i)?
                    }
                    ValueKind::Object => {
                        let key = index.string_value()?;
                        target
                            .object_get(&key)?
                            .ok_or_else(|| errors::key_not_found(key))?
                    }
                    ValueKind::Atomic => {
                        return Err(errors::type_mismatch("list or object", "atomic"));
                    }
                };
                Ok(Signal::resume_with(value))
            }
            InstKind::FieldGet { target, field } => {
                let target = self.value_of(*target)?;
                let key = self.interner.lookup(*field);
                let value = target
                    .object_get(&key)?
                    .ok_or_else(|| errors::key_not_found(key))?;
                Ok(Signal::resume_with(value))
            }

            InstKind::Unary { op, operand } => {
                let operand = self.value_of(*operand)?;
                Ok(Signal::resume_with(ops::evaluate_unary(*op, &operand)?))
            }
            InstKind::IncDec { var, delta } => {
                let current = self.lookup_var(*var)?;
                let updated = RuntimeValue::number(current.as_number()? + delta);
                self.env.assign(*var, updated.clone())?;
                Ok(Signal::resume_with(updated))
            }

            InstKind::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let lhs = self.value_of(*left)?.as_boolean()?;
                    if !lhs {
                        return Ok(Signal::resume_with(RuntimeValue::boolean(false)));
                    }
                    let rhs = self.value_of(*right)?.as_boolean()?;
                    Ok(Signal::resume_with(RuntimeValue::boolean(rhs)))
                }
                BinaryOp::Or => {
                    let lhs = self.value_of(*left)?.as_boolean()?;
                    if lhs {
                        return Ok(Signal::resume_with(RuntimeValue::boolean(true)));
                    }
                    let rhs = self.value_of(*right)?.as_boolean()?;
                    Ok(Signal::resume_with(RuntimeValue::boolean(rhs)))
                }
                _ => {
                    let lhs = self.value_of(*left)?;
                    let rhs = self.value_of(*right)?;
                    Ok(Signal::resume_with(ops::evaluate_binary(*op, &lhs, &rhs)?))
                }
            },

            InstKind::VarDecl { name, init } => {
                let value = match init {
                    Some(init) => self.value_of(*init)?,
                    None => RuntimeValue::null(),
                };
                self.env.define(*name, value);
                Ok(Signal::resume())
            }

            InstKind::Assign {
                target,
                path,
                op,
                value,
            } => self.exec_assign(*target, path, *op, *value),

            InstKind::Sequence(items) => {
                let mut last = Signal::resume();
                for &item in items {
                    self.check_control()?;
                    let signal = self.exec(item)?;
                    if !signal.is_resume() {
                        return Ok(signal);
                    }
                    last = signal;
                }
                Ok(last)
            }

            InstKind::If { arms, else_body } => {
                for (cond, body) in arms {
                    if self.value_of(*cond)?.as_boolean()? {
                        return self.exec(*body);
                    }
                }
                match else_body {
                    Some(body) => self.exec(*body),
                    None => Ok(Signal::resume()),
                }
            }

            InstKind::While { cond, body } => loop {
                self.check_control()?;
                if !self.value_of(*cond)?.as_boolean()? {
                    return Ok(Signal::resume());
                }
                match self.exec(*body)? {
                    Signal::Break => return Ok(Signal::resume()),
                    Signal::Continue | Signal::Resume(_) => {}
                    ret @ Signal::Return(_) => return Ok(ret),
                }
            },

            InstKind::Foreach {
                source,
                value_var,
                key_var,
                body,
            } => self.exec_foreach(*source, *value_var, *key_var, *body),

            InstKind::Try {
                body,
                error_var,
                on_error,
                on_success,
                finally,
            } => self.exec_try(*body, *error_var, *on_error, *on_success, *finally),

            InstKind::Call { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for &arg in args {
                    values.push(self.value_of(arg)?);
                }
                let result = self.call_function(*func, values, pos)?;
                Ok(Signal::resume_with(result))
            }

            InstKind::ConstructCall { construct, args } => {
                let mut values = Vec::with_capacity(args.len());
                for &arg in args {
                    values.push(self.value_of(arg)?);
                }
                let decl = self.registry.get(*construct);
                tracing::trace!(construct = %decl.name, "construct call");
                let mut cx = ConstructContext {
                    sink: self.sink,
                    interner: self.interner,
                    arguments: self.robot.arguments(),
                    position: pos,
                };
                let result = decl.invoke(&mut cx, values)?;
                Ok(Signal::resume_with(result))
            }

            InstKind::ConstructDefault { construct, arg } => {
                let formal = &self.registry.get(*construct).args[*arg];
                let default = formal.default.as_ref().ok_or_else(|| {
                    errors::runtime_error("materialized default has no declared value")
                })?;
                Ok(Signal::resume_with(RuntimeValue::parse_object(default)?))
            }

            InstKind::Pipeline {
                op,
                source,
                func,
                seed,
            } => self.exec_pipeline(*op, *source, *func, *seed, pos),

            InstKind::Return(value) => {
                let value = match value {
                    Some(v) => Some(self.value_of(*v)?),
                    None => None,
                };
                Ok(Signal::Return(value))
            }
            InstKind::Break => Ok(Signal::Break),
            InstKind::Continue => Ok(Signal::Continue),
        }
    }

    // Control-flow helpers

    fn exec_foreach(
        &mut self,
        source: InstId,
        value_var: Name,
        key_var: Option<Name>,
        body: InstId,
    ) -> SignalResult {
        let src = self.value_of(source)?;
        let mut stream = ValueStream::over(&src)?;
        loop {
            self.check_control()?;
            let Some(element) = stream.next()? else { break };
            if let Some(key_var) = key_var {
                let key = match element.kind()? {
                    ValueKind::Object if element.object_len()? == 1 => element
                        .object_entry_at(0)?
                        .map_or_else(RuntimeValue::null, |(k, _)| RuntimeValue::text(k)),
                    _ => RuntimeValue::null(),
                };
                self.env.define(key_var, key);
            }
            self.env.define(value_var, element);
            match self.exec(body)? {
                Signal::Break => break,
                Signal::Continue | Signal::Resume(_) => {}
                ret @ Signal::Return(_) => return Ok(ret),
            }
        }
        Ok(Signal::resume())
    }

    fn exec_try(
        &mut self,
        body: InstId,
        error_var: Option<Name>,
        on_error: Option<InstId>,
        on_success: Option<InstId>,
        finally: Option<InstId>,
    ) -> SignalResult {
        let primary = match self.exec(body) {
            Err(err) if err.is_abort() => Err(err),
            Err(err) => match on_error {
                Some(handler) => {
                    if let Some(var) = error_var {
                        self.env.define(var, err.to_value());
                    }
                    self.exec(handler)
                }
                None => Err(err),
            },
            Ok(signal) => {
                if signal.is_resume() {
                    match on_success {
                        Some(success) => self.exec(success),
                        None => Ok(signal),
                    }
                } else {
                    Ok(signal)
                }
            }
        };

        let cleanup = match finally {
            Some(f) => {
                let unwinding_abort = matches!(&primary, Err(e) if e.is_abort());
                let saved = self.suppress_abort;
                self.suppress_abort = saved || unwinding_abort;
                let cleanup = self.exec(f);
                self.suppress_abort = saved;
                cleanup
            }
            None => Ok(Signal::resume()),
        };

        // An abort already unwinding wins over anything finally produced;
        // otherwise a non-resume signal or error from finally takes
        // precedence over the do/success/error outcome.
        match (primary, cleanup) {
            (Err(abort), _) if abort.is_abort() => Err(abort),
            (primary, Ok(signal)) if signal.is_resume() => primary,
            (_, Ok(signal)) => Ok(signal),
            (_, Err(cleanup_err)) => Err(cleanup_err),
        }
    }

    fn exec_assign(
        &mut self,
        target: Name,
        path: &[PathInst],
        op: AssignOp,
        value: InstId,
    ) -> SignalResult {
        let rhs = self.value_of(value)?;

        if path.is_empty() {
            let bound = match op.binary() {
                None => rhs,
                Some(bop) => {
                    let old = self.lookup_var(target)?;
                    ops::evaluate_binary(bop, &old, &rhs)?
                }
            };
            self.env.assign(target, bound)?;
            return Ok(Signal::resume());
        }

        let mut container = self.lookup_var(target)?;
        for segment in &path[..path.len() - 1] {
            container = self.descend(&container, segment)?;
        }
        self.write_leaf(&container, &path[path.len() - 1], op, rhs)?;
        Ok(Signal::resume())
    }

    /// Follow one intermediate path segment into a container.
    fn descend(
        &mut self,
        container: &RuntimeValue,
        segment: &PathInst,
    ) -> Result<RuntimeValue, RuntimeError> {
        match segment {
            PathInst::Index(index) => {
                let index = self.value_of(*index)?;
                match container.kind()? {
                    ValueKind::List => {
                        let i = list_index(&index, container.list_len()?)?;
                        container.list_get(i)
                    }
                    ValueKind::Object => {
                        let key = index.string_value()?;
                        container
                            .object_get(&key)?
                            .ok_or_else(|| errors::key_not_found(key))
                    }
                    ValueKind::Atomic => Err(errors::type_mismatch("list or object", "atomic")),
                }
            }
            PathInst::Field(field) => {
                let key = self.interner.lookup(*field);
                container
                    .object_get(&key)?
                    .ok_or_else(|| errors::key_not_found(key))
            }
            PathInst::Append => Err(errors::runtime_error(
                "append segment is only valid in final position",
            )),
        }
    }

    /// Replace the leaf a path ends on, swapping references.
    fn write_leaf(
        &mut self,
        container: &RuntimeValue,
        segment: &PathInst,
        op: AssignOp,
        rhs: RuntimeValue,
    ) -> Result<(), RuntimeError> {
        match segment {
            PathInst::Index(index) => {
                let index = self.value_of(*index)?;
                match container.kind()? {
                    ValueKind::List => {
                        let i = list_index(&index, container.list_len()?)?;
                        let bound = match op.binary() {
                            None => rhs,
                            Some(bop) => {
                                let old = container.list_get(i)?;
                                ops::evaluate_binary(bop, &old, &rhs)?
                            }
                        };
                        container.list_set(i, bound)
                    }
                    ValueKind::Object => {
                        let key = index.string_value()?;
                        self.set_object_leaf(container, key, op, rhs)
                    }
                    ValueKind::Atomic => Err(errors::type_mismatch("list or object", "atomic")),
                }
            }
            PathInst::Field(field) => {
                let key = self.interner.lookup(*field);
                self.set_object_leaf(container, key, op, rhs)
            }
            PathInst::Append => {
                if op.binary().is_some() {
                    return Err(errors::runtime_error(
                        "compound assignment cannot append to a list",
                    ));
                }
                container.list_push(rhs)
            }
        }
    }

    fn set_object_leaf(
        &mut self,
        container: &RuntimeValue,
        key: String,
        op: AssignOp,
        rhs: RuntimeValue,
    ) -> Result<(), RuntimeError> {
        let bound = match op.binary() {
            None => rhs,
            Some(bop) => {
                let old = container
                    .object_get(&key)?
                    .ok_or_else(|| errors::key_not_found(key.clone()))?;
                ops::evaluate_binary(bop, &old, &rhs)?
            }
        };
        container.object_set(key, bound)
    }

    // Calls

    /// Invoke a script function: arguments are already evaluated in the
    /// caller's scope, a fresh parameter frame binds them, RETURN becomes
    /// the call's result and falling off the end yields null.
    pub(crate) fn call_function(
        &mut self,
        func: FunctionId,
        args: Vec<RuntimeValue>,
        pos: Position,
    ) -> Result<RuntimeValue, RuntimeError> {
        if func.is_unresolved() {
            return Err(errors::runtime_error("call target never resolved").at(pos));
        }
        self.check_control().map_err(|e| e.at(pos))?;

        let robot = self.robot;
        let decl = &robot.functions[func.index()];
        tracing::trace!(function = ?decl.name, "function call");

        self.env.push_frame();
        for (param, arg) in decl.params.iter().zip(args) {
            self.env.define(*param, arg);
        }
        let outcome = self.exec(decl.body);
        let result = match outcome {
            Ok(Signal::Return(value)) => Ok(value.unwrap_or_else(RuntimeValue::null)),
            Ok(_) => Ok(RuntimeValue::null()),
            Err(err) => Err(err),
        };
        if let Ok(value) = &result {
            // The result escapes the parameter frame about to be popped.
            value.prevent_disposal();
        }
        self.env.pop_frame();
        result
    }

    fn lookup_var(&self, name: Name) -> Result<RuntimeValue, RuntimeError> {
        self.env.lookup(name).ok_or_else(|| {
            errors::runtime_error(format!(
                "variable '{}' is not bound",
                self.interner.lookup(name)
            ))
        })
    }

    /// Observe pause/stop requests; called only at suspension points.
    fn check_control(&self) -> Result<(), RuntimeError> {
        if self.suppress_abort {
            return Ok(());
        }
        loop {
            match self.sink.state() {
                RunState::Running => return Ok(()),
                RunState::Stopped => return Err(errors::aborted()),
                RunState::Paused => std::thread::sleep(std::time::Duration::from_millis(2)),
            }
        }
    }
}

/// Resolve a numeric index into list bounds.
fn list_index(value: &RuntimeValue, len: usize) -> Result<usize, RuntimeError> {
    let n = value.as_number()?;
    let idx = n as i64;
    if idx < 0 || idx.unsigned_abs() as usize >= len {
        return Err(errors::index_out_of_range(idx, len));
    }
    Ok(idx.unsigned_abs() as usize)
}
