//! Program-tree builder: two-phase construction over the syntax tree.
//!
//! Phase 1 dispatches every node kind to a build routine producing the
//! corresponding executable instruction. A call (or pipeline element
//! function reference) whose target is not yet visible produces a
//! placeholder instruction and lands on a pending work list.
//!
//! Phase 2 runs after every source unit (including included library
//! files) has been structurally parsed: the pending lists drain, each
//! placeholder is patched with its now-resolvable target, and include
//! statements are wired to the root of the matching file.
//!
//! The first fatal issue aborts compilation; deprecation warnings are
//! collected alongside and returned either way.


use rustc_hash::{FxHashMap, FxHashSet};

use rover_diagnostic::{
    construct_arity_mismatch, construct_default_shape_mismatch, deprecated_construct,
    function_arity_mismatch, missing_construct, unresolved_function, unresolved_include,
    unresolved_plugin, unresolved_variable, Issue, IssueQueue,
};
use rover_ir::{
    AstId, AstKind, Name, PathSegment, PipelineOp, Position, SourceUnit, StringInterner, UnaryOp,
};

use crate::construct::{native_shape, ConstructRegistry};
use crate::program::{Function, FunctionId, InstId, InstKind, PathInst, ProgramArena};
use crate::robot::{Library, Robot};

/// Result of a compile run: collected issues and, when no fatal error
/// surfaced, the built robot.
#[derive(Debug)]
pub struct CompileOutcome {
    pub issues: Vec<Issue>,
    pub robot: Option<Robot>,
}

/// Marker for the first-fatal-error abort path.
struct Abort;

type BuildResult<T = InstId> = Result<T, Abort>;

struct PendingCall {
    placeholder: InstId,
    func: Name,
    argc: usize,
    pos: Position,
}

struct PendingPipe {
    placeholder: InstId,
    func: Name,
    op: PipelineOp,
    pos: Position,
}

struct Builder<'a> {
    registry: &'a ConstructRegistry,
    interner: &'a StringInterner,
    arena: ProgramArena,
    functions: Vec<Function>,
    func_names: FxHashMap<Name, FunctionId>,
    pending_calls: Vec<PendingCall>,
    pending_pipes: Vec<PendingPipe>,
    includes: Vec<(Name, Position)>,
    issues: IssueQueue,
    globals: FxHashSet<Name>,
    /// Declared names of the function body being built, if any.
    locals: Option<FxHashSet<Name>>,
    used_plugins: FxHashSet<Name>,
    file: Name,
}

impl<'a> Builder<'a> {
    fn new(registry: &'a ConstructRegistry, interner: &'a StringInterner) -> Self {
        Builder {
            registry,
            interner,
            arena: ProgramArena::new(),
            functions: Vec::new(),
            func_names: FxHashMap::default(),
            pending_calls: Vec::new(),
            pending_pipes: Vec::new(),
            includes: Vec::new(),
            issues: IssueQueue::new(),
            globals: FxHashSet::default(),
            locals: None,
            used_plugins: FxHashSet::default(),
            file: Name::EMPTY,
        }
    }

    fn fatal(&mut self, issue: Issue) -> Abort {
        self.issues.push(issue);
        Abort
    }

    fn declare_var(&mut self, name: Name) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name);
            }
            None => {
                self.globals.insert(name);
            }
        }
    }

    fn var_exists(&self, name: Name) -> bool {
        self.locals.as_ref().is_some_and(|l| l.contains(&name)) || self.globals.contains(&name)
    }

    // Phase 1

    fn build_unit(&mut self, unit: &SourceUnit) -> BuildResult {
        self.file = unit.file;
        let mut items = Vec::with_capacity(unit.items.len());
        for &item in &unit.items {
            items.push(self.build_node(unit, item)?);
        }
        Ok(self
            .arena
            .alloc(InstKind::Sequence(items), Position::new(unit.file, 0)))
    }

    fn build_node(&mut self, unit: &SourceUnit, id: AstId) -> BuildResult {
        let node = unit.arena.get(id);
        let pos = Position::new(self.file, node.line);
        let kind = match &node.kind {
            AstKind::Bool(b) => InstKind::BoolLit(*b),
            AstKind::Int(n) => InstKind::NumberLit(*n as f64),
            AstKind::Decimal(n) => InstKind::NumberLit(*n),
            AstKind::Str(s) => InstKind::TextLit(*s),
            AstKind::Null => InstKind::NullLit,

            AstKind::VarRef(name) => {
                if !self.var_exists(*name) {
                    let text = self.interner.lookup(*name);
                    return Err(self.fatal(unresolved_variable(&text, pos)));
                }
                InstKind::VarRef(*name)
            }

            AstKind::ListLit(items) => {
                let mut built = Vec::with_capacity(items.len());
                for &item in items {
                    built.push(self.build_node(unit, item)?);
                }
                InstKind::ListLit(built)
            }
            AstKind::ObjectLit(entries) => {
                let mut built = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    built.push((*key, self.build_node(unit, *value)?));
                }
                InstKind::ObjectLit(built)
            }

            AstKind::Index { target, index } => InstKind::Index {
                target: self.build_node(unit, *target)?,
                index: self.build_node(unit, *index)?,
            },
            AstKind::Field { target, field } => InstKind::FieldGet {
                target: self.build_node(unit, *target)?,
                field: *field,
            },

            AstKind::Unary { op, operand } => match op {
                UnaryOp::Increment | UnaryOp::Decrement => {
                    let delta = if *op == UnaryOp::Increment { 1.0 } else { -1.0 };
                    match &unit.arena.get(*operand).kind {
                        AstKind::VarRef(var) => {
                            if !self.var_exists(*var) {
                                let text = self.interner.lookup(*var);
                                return Err(self.fatal(unresolved_variable(&text, pos)));
                            }
                            InstKind::IncDec { var: *var, delta }
                        }
                        _ => {
                            let msg =
                                format!("operand of '{}' must be a variable", op.as_symbol());
                            return Err(self.fatal(Issue::error(msg, pos)));
                        }
                    }
                }
                _ => InstKind::Unary {
                    op: *op,
                    operand: self.build_node(unit, *operand)?,
                },
            },

            AstKind::Binary { op, left, right } => InstKind::Binary {
                op: *op,
                left: self.build_node(unit, *left)?,
                right: self.build_node(unit, *right)?,
            },

            AstKind::VarDecl { name, init } => {
                let init = match init {
                    Some(init) => Some(self.build_node(unit, *init)?),
                    None => None,
                };
                self.declare_var(*name);
                InstKind::VarDecl { name: *name, init }
            }

            AstKind::Assign {
                target,
                path,
                op,
                value,
            } => {
                if !self.var_exists(*target) {
                    let text = self.interner.lookup(*target);
                    return Err(self.fatal(unresolved_variable(&text, pos)));
                }
                let mut built_path = Vec::with_capacity(path.len());
                for seg in path {
                    built_path.push(match seg {
                        PathSegment::Index(idx) => PathInst::Index(self.build_node(unit, *idx)?),
                        PathSegment::Field(field) => PathInst::Field(*field),
                        PathSegment::Append => PathInst::Append,
                    });
                }
                InstKind::Assign {
                    target: *target,
                    path: built_path,
                    op: *op,
                    value: self.build_node(unit, *value)?,
                }
            }

            AstKind::FuncDecl { name, params, body } => {
                self.build_function(unit, *name, params, *body, pos)?;
                // A declaration executes as a no-op.
                InstKind::Sequence(Vec::new())
            }

            AstKind::Call { func, args } => {
                let mut built = Vec::with_capacity(args.len());
                for &arg in args {
                    built.push(self.build_node(unit, arg)?);
                }
                match self.func_names.get(func).copied() {
                    Some(fid) => {
                        self.check_call_arity(fid, built.len(), pos)?;
                        InstKind::Call { func: fid, args: built }
                    }
                    None => {
                        // Forward reference: placeholder now, fixup later.
                        let placeholder = self.arena.alloc(
                            InstKind::Call {
                                func: FunctionId::UNRESOLVED,
                                args: built,
                            },
                            pos,
                        );
                        self.pending_calls.push(PendingCall {
                            placeholder,
                            func: *func,
                            argc: args.len(),
                            pos,
                        });
                        return Ok(placeholder);
                    }
                }
            }

            AstKind::ConstructCall {
                plugin,
                construct,
                args,
            } => return self.build_construct_call(unit, *plugin, *construct, args, pos),

            AstKind::Include { file } => {
                self.includes.push((*file, pos));
                InstKind::Sequence(Vec::new())
            }

            AstKind::UsePlugin { plugin } => {
                let text = self.interner.lookup(*plugin);
                if !self.registry.has_plugin(&text) {
                    return Err(self.fatal(unresolved_plugin(&text, pos)));
                }
                self.used_plugins.insert(*plugin);
                InstKind::Sequence(Vec::new())
            }

            AstKind::Block(items) => {
                let mut built = Vec::with_capacity(items.len());
                for &item in items {
                    built.push(self.build_node(unit, item)?);
                }
                InstKind::Sequence(built)
            }

            AstKind::If { arms, else_body } => {
                let mut built_arms = Vec::with_capacity(arms.len());
                for (cond, body) in arms {
                    built_arms.push((
                        self.build_node(unit, *cond)?,
                        self.build_node(unit, *body)?,
                    ));
                }
                let else_body = match else_body {
                    Some(body) => Some(self.build_node(unit, *body)?),
                    None => None,
                };
                InstKind::If {
                    arms: built_arms,
                    else_body,
                }
            }

            AstKind::While { cond, body } => InstKind::While {
                cond: self.build_node(unit, *cond)?,
                body: self.build_node(unit, *body)?,
            },

            AstKind::Foreach {
                source,
                value_var,
                key_var,
                body,
            } => {
                let source = self.build_node(unit, *source)?;
                self.declare_var(*value_var);
                if let Some(key) = key_var {
                    self.declare_var(*key);
                }
                InstKind::Foreach {
                    source,
                    value_var: *value_var,
                    key_var: *key_var,
                    body: self.build_node(unit, *body)?,
                }
            }

            AstKind::Try {
                body,
                error_var,
                on_error,
                on_success,
                finally,
            } => {
                let body = self.build_node(unit, *body)?;
                if let Some(var) = error_var {
                    self.declare_var(*var);
                }
                let on_error = match on_error {
                    Some(b) => Some(self.build_node(unit, *b)?),
                    None => None,
                };
                let on_success = match on_success {
                    Some(b) => Some(self.build_node(unit, *b)?),
                    None => None,
                };
                let finally = match finally {
                    Some(b) => Some(self.build_node(unit, *b)?),
                    None => None,
                };
                InstKind::Try {
                    body,
                    error_var: *error_var,
                    on_error,
                    on_success,
                    finally,
                }
            }

            AstKind::Pipeline {
                op,
                source,
                func,
                seed,
            } => return self.build_pipeline(unit, *op, *source, *func, *seed, pos),

            AstKind::Return(value) => {
                let value = match value {
                    Some(v) => Some(self.build_node(unit, *v)?),
                    None => None,
                };
                InstKind::Return(value)
            }
            AstKind::Break => InstKind::Break,
            AstKind::Continue => InstKind::Continue,
        };
        Ok(self.arena.alloc(kind, pos))
    }

    fn build_function(
        &mut self,
        unit: &SourceUnit,
        name: Name,
        params: &[Name],
        body: AstId,
        pos: Position,
    ) -> BuildResult<FunctionId> {
        let fid = FunctionId::from_raw(
            u32::try_from(self.functions.len())
                .unwrap_or_else(|_| panic!("function table exceeded capacity")),
        );
        // Register before building the body so recursion resolves directly.
        self.func_names.insert(name, fid);
        self.functions.push(Function {
            name,
            params: params.to_vec(),
            body: InstId::from_raw(0),
            pos,
        });

        let saved = self.locals.replace(params.iter().copied().collect());
        let body = self.build_node(unit, body);
        self.locals = saved;
        self.functions[fid.index()].body = body?;
        Ok(fid)
    }

    fn check_call_arity(&mut self, fid: FunctionId, argc: usize, pos: Position) -> BuildResult<()> {
        let func = &self.functions[fid.index()];
        if func.params.len() != argc {
            let name = self.interner.lookup(func.name);
            let expected = func.params.len();
            return Err(self.fatal(function_arity_mismatch(&name, expected, argc, pos)));
        }
        Ok(())
    }

    fn build_construct_call(
        &mut self,
        unit: &SourceUnit,
        plugin: Name,
        construct: Name,
        args: &[AstId],
        pos: Position,
    ) -> BuildResult {
        let plugin_text = self.interner.lookup(plugin);
        if !self.used_plugins.contains(&plugin) || !self.registry.has_plugin(&plugin_text) {
            return Err(self.fatal(unresolved_plugin(&plugin_text, pos)));
        }
        let construct_text = self.interner.lookup(construct);
        let Some(cid) = self.registry.lookup(&plugin_text, &construct_text) else {
            return Err(self.fatal(missing_construct(&plugin_text, &construct_text, pos)));
        };

        let decl = self.registry.get(cid);
        let formal_count = decl.args.len();
        let is_deprecated = decl.deprecated;
        if args.len() > formal_count {
            return Err(self.fatal(construct_arity_mismatch(
                &construct_text,
                formal_count,
                args.len(),
                pos,
            )));
        }
        if is_deprecated {
            self.issues
                .push(deprecated_construct(&plugin_text, &construct_text, pos));
        }

        let mut built = Vec::with_capacity(formal_count);
        for &arg in args {
            built.push(self.build_node(unit, arg)?);
        }
        // Fill omitted trailing arguments: the author default when one is
        // declared (its shape must be accepted), otherwise an empty list,
        // otherwise an empty object.
        for i in built.len()..formal_count {
            let formal = &self.registry.get(cid).args[i];
            let filled = match &formal.default {
                Some(default) => {
                    if !formal.shapes.accepts(native_shape(default)) {
                        let arg_name = formal.name.clone();
                        return Err(self.fatal(construct_default_shape_mismatch(
                            &construct_text,
                            &arg_name,
                            pos,
                        )));
                    }
                    InstKind::ConstructDefault { construct: cid, arg: i }
                }
                None if formal.shapes.list => InstKind::ListLit(Vec::new()),
                None if formal.shapes.object => InstKind::ObjectLit(Vec::new()),
                None => {
                    let arg_name = formal.name.clone();
                    return Err(self.fatal(construct_default_shape_mismatch(
                        &construct_text,
                        &arg_name,
                        pos,
                    )));
                }
            };
            built.push(self.arena.alloc(filled, pos));
        }

        Ok(self.arena.alloc(
            InstKind::ConstructCall {
                construct: cid,
                args: built,
            },
            pos,
        ))
    }

    fn build_pipeline(
        &mut self,
        unit: &SourceUnit,
        op: PipelineOp,
        source: AstId,
        func: Name,
        seed: Option<AstId>,
        pos: Position,
    ) -> BuildResult {
        let source = self.build_node(unit, source)?;
        let seed = match (op, seed) {
            (PipelineOp::Reduce, Some(seed)) => Some(self.build_node(unit, seed)?),
            (PipelineOp::Reduce, None) => {
                return Err(self.fatal(Issue::error("reduce requires an accumulator seed", pos)));
            }
            (_, _) => None,
        };

        let func_id = match op.function_arity() {
            None => FunctionId::UNRESOLVED,
            Some(arity) => match self.func_names.get(&func).copied() {
                Some(fid) => {
                    self.check_call_arity(fid, arity, pos)?;
                    fid
                }
                None => {
                    // Forward reference, resolved by the same fixup pass
                    // as calls.
                    let placeholder = self.arena.alloc(
                        InstKind::Pipeline {
                            op,
                            source,
                            func: FunctionId::UNRESOLVED,
                            seed,
                        },
                        pos,
                    );
                    self.pending_pipes.push(PendingPipe {
                        placeholder,
                        func,
                        op,
                        pos,
                    });
                    return Ok(placeholder);
                }
            },
        };

        Ok(self.arena.alloc(
            InstKind::Pipeline {
                op,
                source,
                func: func_id,
                seed,
            },
            pos,
        ))
    }

    // Phase 2

    fn resolve_pending(&mut self) -> BuildResult<()> {
        let calls = std::mem::take(&mut self.pending_calls);
        for pending in calls {
            let Some(fid) = self.func_names.get(&pending.func).copied() else {
                let name = self.interner.lookup(pending.func);
                return Err(self.fatal(unresolved_function(&name, pending.pos)));
            };
            self.check_call_arity(fid, pending.argc, pending.pos)?;
            if let InstKind::Call { func, .. } = &mut self.arena.get_mut(pending.placeholder).kind
            {
                *func = fid;
            }
        }

        let pipes = std::mem::take(&mut self.pending_pipes);
        for pending in pipes {
            let Some(fid) = self.func_names.get(&pending.func).copied() else {
                let name = self.interner.lookup(pending.func);
                return Err(self.fatal(unresolved_function(&name, pending.pos)));
            };
            let arity = pending.op.function_arity().unwrap_or(1);
            self.check_call_arity(fid, arity, pending.pos)?;
            if let InstKind::Pipeline { func, .. } =
                &mut self.arena.get_mut(pending.placeholder).kind
            {
                *func = fid;
            }
        }
        Ok(())
    }

    fn resolve_includes(
        &mut self,
        units: &[SourceUnit],
        roots: &[InstId],
    ) -> BuildResult<Vec<Library>> {
        let includes = std::mem::take(&mut self.includes);
        let mut libraries = Vec::new();
        let mut seen = FxHashSet::default();
        for (file, pos) in includes {
            if !seen.insert(file) {
                continue;
            }
            match units.iter().position(|u| u.file == file) {
                Some(idx) => libraries.push(Library {
                    file,
                    root: roots[idx],
                }),
                None => {
                    let text = self.interner.lookup(file);
                    return Err(self.fatal(unresolved_include(&text, pos)));
                }
            }
        }
        Ok(libraries)
    }
}

/// Compile source units into a robot.
///
/// `units[0]` is the main robot; the rest are candidate libraries matched
/// by file identity against include statements. Returns the collected
/// issues and, when no fatal error surfaced, the built robot.
pub fn compile(
    units: &[SourceUnit],
    registry: &ConstructRegistry,
    interner: &StringInterner,
    session: u64,
) -> CompileOutcome {
    let mut builder = Builder::new(registry, interner);
    if units.is_empty() {
        return CompileOutcome {
            issues: Vec::new(),
            robot: None,
        };
    }

    tracing::debug!(session, units = units.len(), "compiling robot");

    let mut roots = Vec::with_capacity(units.len());
    let result: BuildResult<Vec<Library>> = (|| {
        for unit in units {
            let root = builder.build_unit(unit)?;
            roots.push(root);
        }
        builder.resolve_pending()?;
        builder.resolve_includes(units, &roots)
    })();

    match result {
        Ok(libraries) => {
            let issues = builder.issues.into_issues();
            let robot = Robot::new(
                session,
                builder.arena,
                builder.functions,
                units[0].file,
                roots[0],
                libraries,
            );
            CompileOutcome {
                issues,
                robot: Some(robot),
            }
        }
        Err(Abort) => CompileOutcome {
            issues: builder.issues.into_issues(),
            robot: None,
        },
    }
}
