use pretty_assertions::assert_eq;

use rover_ir::{AssignOp, AstKind, BinaryOp, PathSegment, UnaryOp};
use rover_value::RuntimeErrorKind;

use super::*;

#[test]
fn test_declare_assign_arithmetic() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let x = interner.intern("x");

    let init = n(&mut unit, AstKind::Decimal(2.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(init) });

    let lhs = n(&mut unit, AstKind::VarRef(x));
    let rhs = n(&mut unit, AstKind::Decimal(3.0));
    let sum = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::Add,
            left: lhs,
            right: rhs,
        },
    );
    item(
        &mut unit,
        AstKind::Assign {
            target: x,
            path: vec![],
            op: AssignOp::Set,
            value: sum,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["x"]);
    assert_eq!(as_num(&globals[0]), Some(5.0));
}

#[test]
fn test_compound_assignment() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let x = interner.intern("x");

    let init = n(&mut unit, AstKind::Decimal(4.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(init) });
    let three = n(&mut unit, AstKind::Decimal(3.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: x,
            path: vec![],
            op: AssignOp::Mul,
            value: three,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["x"]);
    assert_eq!(as_num(&globals[0]), Some(12.0));
}

#[test]
fn test_conditional_first_true_arm_wins() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let x = interner.intern("x");

    let init = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(init) });

    let cond1 = n(&mut unit, AstKind::Bool(true));
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let set1 = n(
        &mut unit,
        AstKind::Assign {
            target: x,
            path: vec![],
            op: AssignOp::Set,
            value: one,
        },
    );
    let body1 = n(&mut unit, AstKind::Block(vec![set1]));

    let cond2 = n(&mut unit, AstKind::Bool(true));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    let set2 = n(
        &mut unit,
        AstKind::Assign {
            target: x,
            path: vec![],
            op: AssignOp::Set,
            value: two,
        },
    );
    let body2 = n(&mut unit, AstKind::Block(vec![set2]));

    item(
        &mut unit,
        AstKind::If {
            arms: vec![(cond1, body1), (cond2, body2)],
            else_body: None,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["x"]);
    assert_eq!(as_num(&globals[0]), Some(1.0));
}

#[test]
fn test_while_break_on_third_iteration() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let i = interner.intern("i");
    let hits = interner.intern("hits");

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: i, init: Some(zero) });
    let zero2 = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: hits, init: Some(zero2) });

    // while true { i++; if i == 3 { break }; hits += 1 }
    let cond = n(&mut unit, AstKind::Bool(true));
    let i_ref = n(&mut unit, AstKind::VarRef(i));
    let bump = n(
        &mut unit,
        AstKind::Unary {
            op: UnaryOp::Increment,
            operand: i_ref,
        },
    );
    let i_ref2 = n(&mut unit, AstKind::VarRef(i));
    let three = n(&mut unit, AstKind::Decimal(3.0));
    let is_three = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::Eq,
            left: i_ref2,
            right: three,
        },
    );
    let brk = n(&mut unit, AstKind::Break);
    let brk_block = n(&mut unit, AstKind::Block(vec![brk]));
    let check = n(
        &mut unit,
        AstKind::If {
            arms: vec![(is_three, brk_block)],
            else_body: None,
        },
    );
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let count = n(
        &mut unit,
        AstKind::Assign {
            target: hits,
            path: vec![],
            op: AssignOp::Add,
            value: one,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![bump, check, count]));
    item(&mut unit, AstKind::While { cond, body });

    let globals = run_globals(&[unit], &interner, &registry, &["i", "hits"]);
    // Iterations 1-3 ran, iteration 4 did not.
    assert_eq!(as_num(&globals[0]), Some(3.0));
    assert_eq!(as_num(&globals[1]), Some(2.0));
}

#[test]
fn test_foreach_object_order_and_keys() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let acc = interner.intern("acc");
    let total = interner.intern("total");
    let entry = interner.intern("entry");
    let key = interner.intern("k");

    let empty = n(&mut unit, AstKind::Str(interner.intern("")));
    item(&mut unit, AstKind::VarDecl { name: acc, init: Some(empty) });
    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: total, init: Some(zero) });

    // foreach {a: 1, b: 2} as k, entry { acc &= k; total += entry[k] }
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    let source = n(
        &mut unit,
        AstKind::ObjectLit(vec![
            (interner.intern("a"), one),
            (interner.intern("b"), two),
        ]),
    );
    let key_ref = n(&mut unit, AstKind::VarRef(key));
    let concat = n(
        &mut unit,
        AstKind::Assign {
            target: acc,
            path: vec![],
            op: AssignOp::Concat,
            value: key_ref,
        },
    );
    let entry_ref = n(&mut unit, AstKind::VarRef(entry));
    let key_ref2 = n(&mut unit, AstKind::VarRef(key));
    let value = n(
        &mut unit,
        AstKind::Index {
            target: entry_ref,
            index: key_ref2,
        },
    );
    let add = n(
        &mut unit,
        AstKind::Assign {
            target: total,
            path: vec![],
            op: AssignOp::Add,
            value,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![concat, add]));
    item(
        &mut unit,
        AstKind::Foreach {
            source,
            value_var: entry,
            key_var: Some(key),
            body,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["acc", "total"]);
    // Entries come back as single-key objects in insertion order.
    assert_eq!(as_text(&globals[0]), Some("ab".to_string()));
    assert_eq!(as_num(&globals[1]), Some(3.0));
}

#[test]
fn test_try_finally_reraises() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let flag = interner.intern("flag");
    let x = interner.intern("x");

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: flag, init: Some(zero) });
    let zero2 = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: x, init: Some(zero2) });

    // try { x = 1 / 0 } finally { flag = 1 }
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let zero3 = n(&mut unit, AstKind::Decimal(0.0));
    let div = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::Div,
            left: one,
            right: zero3,
        },
    );
    let assign = n(
        &mut unit,
        AstKind::Assign {
            target: x,
            path: vec![],
            op: AssignOp::Set,
            value: div,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![assign]));
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

    let (result, globals) = run_result(&[unit], &interner, &registry, &["flag"]);
    let err = result.unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
    // finally ran before the error re-raised.
    assert_eq!(as_num(&globals[0]), Some(1.0));
}

#[test]
fn test_try_error_handler_binds_cause() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let msg = interner.intern("msg");
    let after = interner.intern("after");
    let e = interner.intern("e");

    let empty = n(&mut unit, AstKind::Str(interner.intern("")));
    item(&mut unit, AstKind::VarDecl { name: msg, init: Some(empty) });
    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: after, init: Some(zero) });

    let one = n(&mut unit, AstKind::Decimal(1.0));
    let zero2 = n(&mut unit, AstKind::Decimal(0.0));
    let div = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::Div,
            left: one,
            right: zero2,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![div]));

    let e_ref = n(&mut unit, AstKind::VarRef(e));
    let message = n(
        &mut unit,
        AstKind::Field {
            target: e_ref,
            field: interner.intern("message"),
        },
    );
    let bind = n(
        &mut unit,
        AstKind::Assign {
            target: msg,
            path: vec![],
            op: AssignOp::Set,
            value: message,
        },
    );
    let handler = n(&mut unit, AstKind::Block(vec![bind]));
    item(
        &mut unit,
        AstKind::Try {
            body,
            error_var: Some(e),
            on_error: Some(handler),
            on_success: None,
            finally: None,
        },
    );

    // Execution continues after a handled error.
    let one2 = n(&mut unit, AstKind::Decimal(1.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: after,
            path: vec![],
            op: AssignOp::Set,
            value: one2,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["msg", "after"]);
    assert_eq!(as_text(&globals[0]), Some("division by zero".to_string()));
    assert_eq!(as_num(&globals[1]), Some(1.0));
}

#[test]
fn test_try_success_block() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let s = interner.intern("s");

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: s, init: Some(zero) });

    let noop = n(&mut unit, AstKind::Block(vec![]));
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let set = n(
        &mut unit,
        AstKind::Assign {
            target: s,
            path: vec![],
            op: AssignOp::Set,
            value: one,
        },
    );
    let success = n(&mut unit, AstKind::Block(vec![set]));
    item(
        &mut unit,
        AstKind::Try {
            body: noop,
            error_var: None,
            on_error: None,
            on_success: Some(success),
            finally: None,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["s"]);
    assert_eq!(as_num(&globals[0]), Some(1.0));
}

#[test]
fn test_finally_signal_takes_precedence() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let f = interner.intern("f");
    let r = interner.intern("r");

    // fn f() { try { return 1 } finally { return 2 } }
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let ret1 = n(&mut unit, AstKind::Return(Some(one)));
    let body = n(&mut unit, AstKind::Block(vec![ret1]));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    let ret2 = n(&mut unit, AstKind::Return(Some(two)));
    let finally = n(&mut unit, AstKind::Block(vec![ret2]));
    let try_block = n(
        &mut unit,
        AstKind::Try {
            body,
            error_var: None,
            on_error: None,
            on_success: None,
            finally: Some(finally),
        },
    );
    let fn_body = n(&mut unit, AstKind::Block(vec![try_block]));
    item(
        &mut unit,
        AstKind::FuncDecl {
            name: f,
            params: vec![],
            body: fn_body,
        },
    );

    let call = n(&mut unit, AstKind::Call { func: f, args: vec![] });
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    assert_eq!(as_num(&globals[0]), Some(2.0));
}

#[test]
fn test_function_forward_reference_and_return() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let double = interner.intern("double");
    let x = interner.intern("x");
    let r = interner.intern("r");

    // Call textually precedes the declaration.
    let four = n(&mut unit, AstKind::Decimal(4.0));
    let call = n(
        &mut unit,
        AstKind::Call {
            func: double,
            args: vec![four],
        },
    );
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    // fn double(x) { return x + x }
    let a = n(&mut unit, AstKind::VarRef(x));
    let b = n(&mut unit, AstKind::VarRef(x));
    let sum = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::Add,
            left: a,
            right: b,
        },
    );
    let ret = n(&mut unit, AstKind::Return(Some(sum)));
    let body = n(&mut unit, AstKind::Block(vec![ret]));
    item(
        &mut unit,
        AstKind::FuncDecl {
            name: double,
            params: vec![x],
            body,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    assert_eq!(as_num(&globals[0]), Some(8.0));
}

#[test]
fn test_function_falloff_yields_null() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let noop = interner.intern("noop");
    let r = interner.intern("r");

    let body = n(&mut unit, AstKind::Block(vec![]));
    item(
        &mut unit,
        AstKind::FuncDecl {
            name: noop,
            params: vec![],
            body,
        },
    );
    let call = n(&mut unit, AstKind::Call { func: noop, args: vec![] });
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(call) });

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    let is_null = globals[0].as_ref().and_then(|v| v.is_null().ok());
    assert_eq!(is_null, Some(true));
}

#[test]
fn test_path_assignment() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let obj = interner.intern("obj");
    let items = interner.intern("items");
    let name = interner.intern("name");

    // let obj = { items: [1, 2], name: "x" }
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    let list = n(&mut unit, AstKind::ListLit(vec![one, two]));
    let x_text = n(&mut unit, AstKind::Str(interner.intern("x")));
    let init = n(
        &mut unit,
        AstKind::ObjectLit(vec![(items, list), (name, x_text)]),
    );
    item(&mut unit, AstKind::VarDecl { name: obj, init: Some(init) });

    // obj.items[1] = 5
    let idx = n(&mut unit, AstKind::Decimal(1.0));
    let five = n(&mut unit, AstKind::Decimal(5.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: obj,
            path: vec![PathSegment::Field(items), PathSegment::Index(idx)],
            op: AssignOp::Set,
            value: five,
        },
    );
    // obj.name = "y"
    let y_text = n(&mut unit, AstKind::Str(interner.intern("y")));
    item(
        &mut unit,
        AstKind::Assign {
            target: obj,
            path: vec![PathSegment::Field(name)],
            op: AssignOp::Set,
            value: y_text,
        },
    );
    // obj.items[<size>] = 9 (append)
    let nine = n(&mut unit, AstKind::Decimal(9.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: obj,
            path: vec![PathSegment::Field(items), PathSegment::Append],
            op: AssignOp::Set,
            value: nine,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["obj"]);
    let obj_val = globals[0].clone().unwrap_or_else(RuntimeValue::null);
    let items_val = obj_val
        .object_get("items")
        .ok()
        .flatten()
        .unwrap_or_else(RuntimeValue::null);
    assert_eq!(items_val.list_len(), Ok(3));
    let second = items_val.list_get(1).and_then(|v| v.as_number());
    assert_eq!(second, Ok(5.0));
    let third = items_val.list_get(2).and_then(|v| v.as_number());
    assert_eq!(third, Ok(9.0));
    let renamed = obj_val
        .object_get("name")
        .ok()
        .flatten()
        .and_then(|v| v.string_value().ok());
    assert_eq!(renamed.as_deref(), Some("y"));
}

#[test]
fn test_path_assignment_past_end_is_error() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let l = interner.intern("l");

    let one = n(&mut unit, AstKind::Decimal(1.0));
    let list = n(&mut unit, AstKind::ListLit(vec![one]));
    item(&mut unit, AstKind::VarDecl { name: l, init: Some(list) });

    let idx = n(&mut unit, AstKind::Decimal(5.0));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: l,
            path: vec![PathSegment::Index(idx)],
            op: AssignOp::Set,
            value: two,
        },
    );

    let (result, _) = run_result(&[unit], &interner, &registry, &[]);
    let err = result.unwrap_err();
    assert_eq!(
        err.kind,
        RuntimeErrorKind::IndexOutOfRange { index: 5, len: 1 }
    );
}

#[test]
fn test_aliased_lists_share_mutation() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let a = interner.intern("a");
    let b = interner.intern("b");
    let r = interner.intern("r");

    let one = n(&mut unit, AstKind::Decimal(1.0));
    let list = n(&mut unit, AstKind::ListLit(vec![one]));
    item(&mut unit, AstKind::VarDecl { name: a, init: Some(list) });
    let a_ref = n(&mut unit, AstKind::VarRef(a));
    item(&mut unit, AstKind::VarDecl { name: b, init: Some(a_ref) });

    let idx = n(&mut unit, AstKind::Decimal(0.0));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    item(
        &mut unit,
        AstKind::Assign {
            target: b,
            path: vec![PathSegment::Index(idx)],
            op: AssignOp::Set,
            value: two,
        },
    );

    let a_ref2 = n(&mut unit, AstKind::VarRef(a));
    let idx2 = n(&mut unit, AstKind::Decimal(0.0));
    let read = n(
        &mut unit,
        AstKind::Index {
            target: a_ref2,
            index: idx2,
        },
    );
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(read) });

    let globals = run_globals(&[unit], &interner, &registry, &["r"]);
    assert_eq!(as_num(&globals[0]), Some(2.0));
}

#[test]
fn test_foreach_mutation_raises_concurrent_modification() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let l = interner.intern("l");
    let v = interner.intern("v");

    let one = n(&mut unit, AstKind::Decimal(1.0));
    let two = n(&mut unit, AstKind::Decimal(2.0));
    let list = n(&mut unit, AstKind::ListLit(vec![one, two]));
    item(&mut unit, AstKind::VarDecl { name: l, init: Some(list) });

    // foreach l as v { l[<size>] = 9 }
    let source = n(&mut unit, AstKind::VarRef(l));
    let nine = n(&mut unit, AstKind::Decimal(9.0));
    let push = n(
        &mut unit,
        AstKind::Assign {
            target: l,
            path: vec![PathSegment::Append],
            op: AssignOp::Set,
            value: nine,
        },
    );
    let body = n(&mut unit, AstKind::Block(vec![push]));
    item(
        &mut unit,
        AstKind::Foreach {
            source,
            value_var: v,
            key_var: None,
            body,
        },
    );

    let (result, _) = run_result(&[unit], &interner, &registry, &[]);
    let err = result.unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::ConcurrentModification);
}

#[test]
fn test_increment_decrement() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let i = interner.intern("i");

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: i, init: Some(zero) });
    for _ in 0..3 {
        let i_ref = n(&mut unit, AstKind::VarRef(i));
        item(
            &mut unit,
            AstKind::Unary {
                op: UnaryOp::Increment,
                operand: i_ref,
            },
        );
    }
    let i_ref = n(&mut unit, AstKind::VarRef(i));
    item(
        &mut unit,
        AstKind::Unary {
            op: UnaryOp::Decrement,
            operand: i_ref,
        },
    );

    let globals = run_globals(&[unit], &interner, &registry, &["i"]);
    assert_eq!(as_num(&globals[0]), Some(2.0));
}

#[test]
fn test_logical_and_short_circuits() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let d = interner.intern("d");
    let side = interner.intern("side");
    let r = interner.intern("r");

    let zero = n(&mut unit, AstKind::Decimal(0.0));
    item(&mut unit, AstKind::VarDecl { name: d, init: Some(zero) });

    // fn side() { d = 1; return true }
    let one = n(&mut unit, AstKind::Decimal(1.0));
    let set = n(
        &mut unit,
        AstKind::Assign {
            target: d,
            path: vec![],
            op: AssignOp::Set,
            value: one,
        },
    );
    let yes = n(&mut unit, AstKind::Bool(true));
    let ret = n(&mut unit, AstKind::Return(Some(yes)));
    let body = n(&mut unit, AstKind::Block(vec![set, ret]));
    item(
        &mut unit,
        AstKind::FuncDecl {
            name: side,
            params: vec![],
            body,
        },
    );

    // let r = false and side()
    let no = n(&mut unit, AstKind::Bool(false));
    let call = n(&mut unit, AstKind::Call { func: side, args: vec![] });
    let and = n(
        &mut unit,
        AstKind::Binary {
            op: BinaryOp::And,
            left: no,
            right: call,
        },
    );
    item(&mut unit, AstKind::VarDecl { name: r, init: Some(and) });

    let globals = run_globals(&[unit], &interner, &registry, &["d", "r"]);
    assert_eq!(as_num(&globals[0]), Some(0.0));
    let r_bool = globals[1].as_ref().and_then(|v| v.as_boolean().ok());
    assert_eq!(r_bool, Some(false));
}

#[test]
fn test_unary_operators() {
    let interner = StringInterner::new();
    let registry = test_registry();
    let mut unit = new_unit(&interner, "main.rov");
    let t = interner.intern("t");
    let s = interner.intern("s");
    let m = interner.intern("m");

    let empty = n(&mut unit, AstKind::Str(interner.intern("")));
    let not = n(
        &mut unit,
        AstKind::Unary {
            op: UnaryOp::Not,
            operand: empty,
        },
    );
    item(&mut unit, AstKind::VarDecl { name: t, init: Some(not) });

    let half = n(&mut unit, AstKind::Decimal(2.5));
    let cast = n(
        &mut unit,
        AstKind::Unary {
            op: UnaryOp::StringCast,
            operand: half,
        },
    );
    item(&mut unit, AstKind::VarDecl { name: s, init: Some(cast) });

    let four = n(&mut unit, AstKind::Str(interner.intern("4")));
    let neg = n(
        &mut unit,
        AstKind::Unary {
            op: UnaryOp::Neg,
            operand: four,
        },
    );
    item(&mut unit, AstKind::VarDecl { name: m, init: Some(neg) });

    let globals = run_globals(&[unit], &interner, &registry, &["t", "s", "m"]);
    let t_bool = globals[0].as_ref().and_then(|v| v.as_boolean().ok());
    assert_eq!(t_bool, Some(true));
    assert_eq!(as_text(&globals[1]), Some("2.5".to_string()));
    assert_eq!(as_num(&globals[2]), Some(-4.0));
}
