use std::sync::Arc;

use pretty_assertions::assert_eq;

use rover_ir::{AssignOp, AstKind};
use rover_value::{RuntimeErrorKind, RuntimeValue};

use crate::sink::SinkEvent;
use crate::{BufferSink, Construct, ConstructRegistry, Engine};

use super::*;

fn construct_call(
    unit: &mut SourceUnit,
    interner: &StringInterner,
    name: &str,
    args: Vec<rover_ir::AstId>,
) -> rover_ir::AstId {
    n(
        unit,
        AstKind::ConstructCall {
            plugin: interner.intern("util"),
            construct: interner.intern(name),
            args,
        },
    )
}

#[test]
fn test_construct_emits_through_sink() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    use_util(&mut unit, &interner);

    let hello = n(&mut unit, AstKind::Str(interner.intern("hello")));
    let call = construct_call(&mut unit, &interner, "emit", vec![hello]);
    unit.items.push(call);

    let outcome = compile_units(&[unit], &interner, &registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let sink = BufferSink::new();
    robot
        .run(&registry, &interner, &sink)
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(sink.output_text(), "hello");
    let events = sink.events();
    assert_eq!(events.first(), Some(&SinkEvent::Started(42)));
    assert_eq!(events.last(), Some(&SinkEvent::Stopped(42)));
}

#[test]
fn test_omitted_argument_uses_author_default() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let r = interner.intern("r");
    use_util(&mut unit, &interner);

    // util.add(5) -- the declared default for b is 10.
    let five = n(&mut unit, AstKind::Decimal(5.0));
    let call = construct_call(&mut unit, &interner, "add", vec![five]);
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    assert_eq!(as_num(&globals[0]), Some(15.0));
}

#[test]
fn test_omitted_argument_falls_back_to_empty_list() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let r = interner.intern("r");
    use_util(&mut unit, &interner);

    // util.tail() -- no default declared, the argument accepts LIST, so
    // the engine supplies an empty list.
    let call = construct_call(&mut unit, &interner, "tail", vec![]);
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    assert_eq!(as_num(&globals[0]), Some(0.0));
}

#[test]
fn test_robot_arguments_reach_constructs() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let r = interner.intern("r");
    use_util(&mut unit, &interner);

    let key = n(&mut unit, AstKind::Str(interner.intern("target")));
    let call = construct_call(&mut unit, &interner, "arg", vec![key]);
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    let outcome = compile_units(&[unit], &interner, &registry);
    let mut robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    robot.set_argument("target", RuntimeValue::text("alpha"));
    assert!(robot.has_argument("target"));
    assert!(!robot.has_argument("other"));
    let direct = robot.get_argument("target").and_then(|v| v.string_value().ok());
    assert_eq!(direct.as_deref(), Some("alpha"));

    let sink = NullSink;
    let mut engine = Engine::new(&robot, &registry, &interner, &sink);
    engine
        .initialize(false)
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    let got = engine
        .global_value(r)
        .and_then(|v| v.string_value().ok());
    assert_eq!(got.as_deref(), Some("alpha"));
}

#[test]
fn test_construct_error_is_catchable() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let caught = interner.intern("caught");
    use_util(&mut unit, &interner);

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: caught, init: Some(zero) });

    let call = construct_call(&mut unit, &interner, "explode", vec![]);
    let body = n(&mut unit, AstKind::Block(vec![call]));
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let set = n(
        &mut unit,
        AstKind::Assign {
            target: caught,
            path: vec![],
            op: AssignOp::Set,
            value: one,
        },
    );
    let handler = n(&mut unit, AstKind::Block(vec![set]));
    item(
        &mut unit,
        AstKind::Try {
            body,
            error_var: None,
            on_error: Some(handler),
            on_success: None,
            finally: None,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["caught"]);
    assert_eq!(as_num(&globals[0]), Some(1.0));
}

#[test]
fn test_uncaught_construct_error_reported_with_position() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    use_util(&mut unit, &interner);

    let call = construct_call(&mut unit, &interner, "explode", vec![]);
    unit.items.push(call);
    let call_line = unit.arena.get(call).line;

    let outcome = compile_units(&[unit], &interner, &registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let sink = BufferSink::new();
    let err = robot.run(&registry, &interner, &sink).unwrap_err();
    assert_eq!(
        err.kind,
        RuntimeErrorKind::ConstructFailed {
            construct: "util.explode".to_string()
        }
    );

    let reported = sink.events().iter().any(|e| {
        matches!(e, SinkEvent::Error { line, .. } if *line == call_line)
    });
    assert!(reported, "error event with call position expected");
}

#[test]
fn test_stop_request_aborts_run() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let x = interner.intern("x");
    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(zero) });

    let outcome = compile_units(&[unit], &interner, &registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let sink = BufferSink::new();
    sink.stop();
    let err = robot.run(&registry, &interner, &sink).unwrap_err();
    assert!(err.is_abort());

    // Start/stop notifications fire even on an aborted run.
    let events = sink.events();
    assert_eq!(events.first(), Some(&SinkEvent::Started(42)));
    assert_eq!(events.last(), Some(&SinkEvent::Stopped(42)));
}

#[test]
fn test_stop_mid_run_still_executes_finally() {
    let interner = StringInterner::new();
    let mut registry = ConstructRegistry::new();
    let sink = Arc::new(BufferSink::new());

    // A construct that requests a stop through the shared sink.
    let halt_sink = Arc::clone(&sink);
    registry.register(
        "util",
        Construct::new(
            "halt",
            vec![],
            Box::new(move |_cx, _args| {
                halt_sink.stop();
                Ok(RuntimeValue::null())
            }),
        ),
    );

    let mut unit = new_unit(&interner, "main.rov");
    let flag = interner.intern("flag");
    let after = interner.intern("after");
    use_util(&mut unit, &interner);

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: flag, init: Some(zero) });
    let zero2 = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: after, init: Some(zero2) });

    // try { util.halt(); after = 1 } finally { flag = 1 }
    let halt = construct_call(&mut unit, &interner, "halt", vec![]);
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let set_after = n(
        &mut unit,
        AstKind::Assign {
            target: after,
            path: vec![],
            op: AssignOp::Set,
            value: one,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![halt, set_after]));
    let one2 = n(&mut unit, AstKind::Decimal(1.0));
    let set_flag = n(
        &mut unit,
        AstKind::Assign {
            target: flag,
            path: vec![],
            op: AssignOp::Set,
            value: one2,
        },
    );
    let finally = n(&mut unit, AstKind::Block(vec![set_flag]));
    item(
        &mut unit,
        AstKind::Try {
            body,
            error_var: None,
            on_error: None,
            on_success: None,
            finally: Some(finally),
        },
    );

    let outcome = compile_units(&[unit], &interner, &registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let mut engine = Engine::new(&robot, &registry, &interner, sink.as_ref());
    let err = engine.initialize(false).unwrap_err();
    assert!(err.is_abort());

    // The stop unwound before `after = 1`, but the cleanup block ran.
    let flag_val = engine.global_value(flag).and_then(|v| v.numeric().ok().flatten());
    assert_eq!(flag_val, Some(1.0));
    let after_val = engine.global_value(after).and_then(|v| v.numeric().ok().flatten());
    assert_eq!(after_val, Some(0.0));
}

#[test]
fn test_pause_suspends_until_resume() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let x = interner.intern("x");
    let one = n(&mut unit, AstKind::Decimal(1.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(one) });

    let outcome = compile_units(&[unit], &interner, &registry);
    let robot = outcome
        .robot
        .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.issues));
    let sink = BufferSink::new();
    sink.pause();

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| robot.run(&registry, &interner, &sink));

        // The robot is parked at its first suspension point: started has
        // fired, stopped has not.
        std::thread::sleep(std::time::Duration::from_millis(30));
        let events = sink.events();
        assert_eq!(events.first(), Some(&SinkEvent::Started(42)));
        assert!(!events.contains(&SinkEvent::Stopped(42)));

        sink.resume();
        let result = handle.join().unwrap_or_else(|_| panic!("join failed"));
        assert!(result.is_ok());
    });

    let events = sink.events();
    assert_eq!(events.last(), Some(&SinkEvent::Stopped(42)));
}
