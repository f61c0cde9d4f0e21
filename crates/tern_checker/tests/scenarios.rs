//! End-to-end scenarios covering each analysis stage once.

mod support;

use support::{analyze, assert_clean, body_codes, file, nullable, ty};
use tern_ast::{AstBuilder, BinaryOp, TypeAnnotation};
use tern_checker::DiagnosticCode;
use tern_inference::Type;

#[test]
fn boolean_when_needs_both_constants() {
    let build = |with_false: bool| {
        let mut b = AstBuilder::new();
        let subject = b.name("flag");
        let true_value = b.boolean(true);
        let one = b.int(1);
        let mut branches = vec![b.value_branch(vec![true_value], one)];
        if with_false {
            let false_value = b.boolean(false);
            let two = b.int(2);
            branches.push(b.value_branch(vec![false_value], two));
        }
        let when = b.when_subject(subject, branches, None);
        let flag = b.param("flag", ty("Boolean"));
        let test = b
            .function("test")
            .param(flag)
            .returns(ty("Int"))
            .expression_body(when)
            .declaration();
        file(&mut b, vec![test])
    };

    let partial = analyze(vec![build(false)]);
    assert_eq!(body_codes(&partial, "test"), vec![DiagnosticCode::NoElseInWhen]);

    let complete = analyze(vec![build(true)]);
    assert_clean(&complete);
}

#[test]
fn callable_reference_follows_type_parameter_fixed_by_sibling() {
    let mut b = AstBuilder::new();
    let a = b.class("A").declaration();
    let class_b = b.class("B").declaration();

    // fun <T> foo(first: (T) -> Unit, second: (T) -> Unit) {}
    let t = b.type_param("T", Vec::new());
    let first = b.param("first", TypeAnnotation::function(vec![ty("T")], ty("Unit")));
    let second = b.param("second", TypeAnnotation::function(vec![ty("T")], ty("Unit")));
    let empty = b.block(Vec::new());
    let foo = b
        .function("foo")
        .type_parameter(t)
        .param(first)
        .param(second)
        .block_body(empty)
        .declaration();

    let unit_function = |b: &mut AstBuilder, name: &str, parameter: &str| {
        let parameter = b.param("value", ty(parameter));
        let body = b.block(Vec::new());
        b.function(name).param(parameter).block_body(body).declaration()
    };
    let single_a = unit_function(&mut b, "singleA", "A");
    let multiple_a = unit_function(&mut b, "multiple", "A");
    let multiple_b = unit_function(&mut b, "multiple", "B");

    let single_ref = b.reference("singleA");
    let multiple_ref = b.reference("multiple");
    let multiple_ref_id = multiple_ref.id;
    let call = b.call("foo", vec![single_ref, multiple_ref]);
    let call_id = call.id;
    let body = b.block(vec![AstBuilder::stmt(call)]);
    let test = b.function("test").block_body(body).declaration();

    let source = file(&mut b, vec![a, class_b, foo, single_a, multiple_a, multiple_b, test]);
    let result = analyze(vec![source]);
    assert_clean(&result);

    let analysis = result.body("test").expect("test body");
    let resolved = analysis.call(call_id).expect("foo call resolved");
    assert_eq!(resolved.type_arguments.len(), 1);
    assert_eq!(result.registry.render(&resolved.type_arguments[0]), "A");

    let chosen = resolved
        .postponed
        .iter()
        .find(|postponed| postponed.node == multiple_ref_id)
        .and_then(|postponed| postponed.reference.clone())
        .expect("reference to `multiple` resolved");
    assert_eq!(chosen.describe(&result.registry), "multiple(A): Unit");
}

#[test]
fn null_check_narrows_nullable_parameter() {
    let mut b = AstBuilder::new();
    // if (x != null) { return x.length }
    let checked = b.name("x");
    let null = b.null();
    let condition = b.binary(BinaryOp::NotEqual, checked, null);
    let read = b.name("x");
    let read_id = read.id;
    let length = b.member(read, "length");
    let early = b.ret(Some(length));
    let then_branch = b.block_expr(vec![AstBuilder::stmt(early)]);
    let guard = b.if_else(condition, then_branch, None);
    let zero = b.int(0);
    let fallback = b.ret(Some(zero));
    let body = b.block(vec![AstBuilder::stmt(guard), AstBuilder::stmt(fallback)]);

    let x = b.param("x", nullable("String"));
    let test = b
        .function("test")
        .param(x)
        .returns(ty("Int"))
        .block_body(body)
        .declaration();

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    let analysis = result.body("test").expect("test body");
    assert_eq!(analysis.smart_cast(read_id), Some(&Type::string()));
}

#[test]
fn sealed_when_needs_every_subclass() {
    let build = |cover_b: bool| {
        let mut b = AstBuilder::new();
        let base = b.class("Base").sealed().declaration();
        let a = b.class("A").supertype(ty("Base")).declaration();
        let class_b = b.class("B").supertype(ty("Base")).declaration();

        let subject = b.name("value");
        let one = b.int(1);
        let mut branches = vec![b.is_branch(ty("A"), one)];
        if cover_b {
            let two = b.int(2);
            branches.push(b.is_branch(ty("B"), two));
        }
        let when = b.when_subject(subject, branches, None);
        let value = b.param("value", ty("Base"));
        let test = b
            .function("test")
            .param(value)
            .returns(ty("Int"))
            .expression_body(when)
            .declaration();
        file(&mut b, vec![base, a, class_b, test])
    };

    let partial = analyze(vec![build(false)]);
    assert_eq!(body_codes(&partial, "test"), vec![DiagnosticCode::NoElseInWhen]);

    let complete = analyze(vec![build(true)]);
    assert_clean(&complete);
}

#[test]
fn val_assigned_in_try_is_initialized_only_past_finally() {
    let build = |with_catch: bool| {
        let mut b = AstBuilder::new();
        let declare = b.val("x", Some(ty("Int")), None);
        let one = b.int(1);
        let assign = b.assign("x", one);
        let protected = b.block(vec![assign]);
        let (catches, finally) = if with_catch {
            let handler = b.block(Vec::new());
            (vec![b.catch_clause("e", ty("Exception"), handler)], None)
        } else {
            (Vec::new(), Some(b.block(Vec::new())))
        };
        let attempt = b.try_expr(protected, catches, finally);
        let read = b.name("x");
        let result = b.ret(Some(read));
        let body = b.block(vec![declare, AstBuilder::stmt(attempt), AstBuilder::stmt(result)]);
        let test = b.function("test").returns(ty("Int")).block_body(body).declaration();
        file(&mut b, vec![test])
    };

    let with_finally = analyze(vec![build(false)]);
    assert_clean(&with_finally);

    let with_catch = analyze(vec![build(true)]);
    assert_eq!(body_codes(&with_catch, "test"), vec![DiagnosticCode::UninitializedVariable]);
}

/// `fun compute(): Int = 1`
fn compute(b: &mut AstBuilder) -> tern_ast::Declaration {
    let one = b.int(1);
    b.function("compute").returns(ty("Int")).expression_body(one).declaration()
}

/// `val x: Int; try { x = compute() } <catches> <finally>; return x`
fn assign_from_call_in_try(
    b: &mut AstBuilder,
    catches: Vec<tern_ast::CatchClause>,
    finally: Option<tern_ast::Block>,
) -> tern_ast::Declaration {
    let declare = b.val("x", Some(ty("Int")), None);
    let value = b.call("compute", Vec::new());
    let assign = b.assign("x", value);
    let protected = b.block(vec![assign]);
    let attempt = b.try_expr(protected, catches, finally);
    let read = b.name("x");
    let result = b.ret(Some(read));
    let body = b.block(vec![declare, AstBuilder::stmt(attempt), AstBuilder::stmt(result)]);
    b.function("test").returns(ty("Int")).block_body(body).declaration()
}

#[test]
fn catch_that_rethrows_keeps_the_val_initialized() {
    let mut b = AstBuilder::new();
    let compute = compute(&mut b);
    let caught = b.name("e");
    let rethrow = b.throw(caught);
    let handler = b.block(vec![AstBuilder::stmt(rethrow)]);
    let catches = vec![b.catch_clause("e", ty("Exception"), handler)];
    let finally = b.block(Vec::new());
    let test = assign_from_call_in_try(&mut b, catches, Some(finally));

    assert_clean(&analyze(vec![file(&mut b, vec![compute, test])]));
}

#[test]
fn catch_that_completes_leaves_the_val_uninitialized() {
    let mut b = AstBuilder::new();
    let compute = compute(&mut b);
    let handler = b.block(Vec::new());
    let catches = vec![b.catch_clause("e", ty("Exception"), handler)];
    let test = assign_from_call_in_try(&mut b, catches, None);

    let result = analyze(vec![file(&mut b, vec![compute, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UninitializedVariable]);
}

#[test]
fn read_in_finally_sees_the_exceptional_path() {
    let mut b = AstBuilder::new();
    // val x: Int; try { x = compute() } finally { println(x) }; return 0
    let compute = compute(&mut b);
    let declare = b.val("x", Some(ty("Int")), None);
    let value = b.call("compute", Vec::new());
    let assign = b.assign("x", value);
    let protected = b.block(vec![assign]);
    let read = b.name("x");
    let print = b.call("println", vec![read]);
    let finally = b.block(vec![AstBuilder::stmt(print)]);
    let attempt = b.try_expr(protected, Vec::new(), Some(finally));
    let zero = b.int(0);
    let result = b.ret(Some(zero));
    let body = b.block(vec![declare, AstBuilder::stmt(attempt), AstBuilder::stmt(result)]);
    let test = b.function("test").returns(ty("Int")).block_body(body).declaration();

    let result = analyze(vec![file(&mut b, vec![compute, test])]);
    assert!(body_codes(&result, "test").contains(&DiagnosticCode::UninitializedVariable));
}
