//! Execution tests.
//!
//! The parser is an external collaborator, so these tests assemble
//! syntax trees directly through the `rover_ir` arena API and drive the
//! compile/run cycle on them.

mod construct_tests;
mod control_tests;

use rover_ir::{AstId, AstKind, SourceUnit, StringInterner};
use rover_value::{NativeNode, RuntimeError, RuntimeValue};

use crate::{
    compile, CompileOutcome, Construct, ConstructArg, ConstructRegistry, Engine, NullSink,
    ShapeSet,
};
use rover_value::ValueKind;

/// Allocate a node on the unit, one line per node.
pub(crate) fn n(unit: &mut SourceUnit, kind: AstKind) -> AstId {
    let line = u32::try_from(unit.arena.len()).unwrap_or(0) + 1;
    unit.arena.alloc(kind, line)
}

/// Allocate a node and append it to the unit's top-level items.
pub(crate) fn item(unit: &mut SourceUnit, kind: AstKind) -> AstId {
    let id = n(unit, kind);
    unit.items.push(id);
    id
}

pub(crate) fn new_unit(interner: &StringInterner, file: &str) -> SourceUnit {
    SourceUnit::new(interner.intern(file))
}

/// Declare `use util;` at the top of a unit.
pub(crate) fn use_util(unit: &mut SourceUnit, interner: &StringInterner) {
    let plugin = interner.intern("util");
    item(unit, AstKind::UsePlugin { plugin });
}

/// The standard test registry: one `util` plugin.
pub(crate) fn test_registry() -> ConstructRegistry {
    let mut registry = ConstructRegistry::new();

    // Pass-through that also emits the value's text through the sink.
    registry.register(
        "util",
        Construct::new(
            "emit",
            vec![ConstructArg::new("value")],
            Box::new(|cx, mut args| {
                let value = args.remove(0);
                cx.emit(&value.string_value()?);
                Ok(value)
            }),
        ),
    );

    // Author default on the trailing argument.
    registry.register(
        "util",
        Construct::new(
            "add",
            vec![
                ConstructArg::new("a"),
                ConstructArg::new("b").with_default(NativeNode::Number(10.0)),
            ],
            Box::new(|_cx, args| {
                Ok(RuntimeValue::number(
                    args[0].as_number()? + args[1].as_number()?,
                ))
            }),
        ),
    );

    // No default, list-only: an omitted argument becomes an empty list.
    registry.register(
        "util",
        Construct::new(
            "tail",
            vec![ConstructArg::new("items")
                .with_shapes(ShapeSet::only(&[ValueKind::List]))],
            Box::new(|_cx, args| {
                let len = args[0].list_len()?;
                Ok(RuntimeValue::number(len as f64))
            }),
        ),
    );

    // Author default whose shape the argument does not accept.
    registry.register(
        "util",
        Construct::new(
            "strict",
            vec![ConstructArg::new("items")
                .with_shapes(ShapeSet::only(&[ValueKind::List]))
                .with_default(NativeNode::Object(rover_value::NativeObject::new()))],
            Box::new(|_cx, _args| Ok(RuntimeValue::null())),
        ),
    );

    // Deprecated construct.
    registry.register(
        "util",
        Construct::new("legacy", vec![], Box::new(|_cx, _args| Ok(RuntimeValue::null())))
            .deprecated(),
    );

    // Reads a robot invocation argument by name.
    registry.register(
        "util",
        Construct::new(
            "arg",
            vec![ConstructArg::new("name")],
            Box::new(|cx, args| {
                let name = args[0].string_value()?;
                Ok(cx
                    .arguments
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(RuntimeValue::null))
            }),
        ),
    );

    // Always fails with a construct error.
    registry.register(
        "util",
        Construct::new(
            "explode",
            vec![],
            Box::new(|_cx, _args| {
                Err(rover_value::errors::construct_failed("util.explode"))
            }),
        ),
    );

    registry
}

pub(crate) fn compile_units(
    units: &[SourceUnit],
    interner: &StringInterner,
    registry: &ConstructRegistry,
) -> CompileOutcome {
    compile(units, registry, interner, 42)
}

/// Compile and run; return the run result and the requested globals.
pub(crate) fn run_result(
    units: &[SourceUnit],
    interner: &StringInterner,
    registry: &ConstructRegistry,
    names: &[&str],
) -> (Result<(), RuntimeError>, Vec<Option<RuntimeValue>>) {
    let outcome = compile_units(units, interner, registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let sink = NullSink;
    let mut engine = Engine::new(&robot, registry, interner, &sink);
    let result = engine.initialize(false);
    let globals = names
        .iter()
        .map(|name| engine.global_value(interner.intern(name)))
        .collect();
    (result, globals)
}

/// Compile and run, panicking on any error; return the requested globals.
pub(crate) fn run_globals(
    units: &[SourceUnit],
    interner: &StringInterner,
    registry: &ConstructRegistry,
    names: &[&str],
) -> Vec<Option<RuntimeValue>> {
    let (result, globals) = run_result(units, interner, registry, names);
    if let Err(err) = result {
        panic!("run failed: {err}");
    }
    globals
}

/// Numeric reading of an optional global.
pub(crate) fn as_num(value: &Option<RuntimeValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.numeric().ok().flatten())
}

/// Text reading of an optional global.
pub(crate) fn as_text(value: &Option<RuntimeValue>) -> Option<String> {
    value.as_ref().and_then(|v| v.string_value().ok())
}
