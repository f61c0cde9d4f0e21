mod support;

use support::{analyze, assert_clean, body_codes, file, nullable, ty};
use tern_ast::{AstBuilder, BinaryOp, Declaration, Modality, PropertyDeclaration, Statement};
use tern_checker::DiagnosticCode;
use tern_inference::Type;

fn function(b: &mut AstBuilder, parameters: Vec<(&str, tern_ast::TypeAnnotation)>, body: Vec<Statement>) -> tern_ast::Declaration {
    let mut function = b.function("test").returns(ty("Int"));
    for (name, annotation) in parameters {
        let parameter = b.param(name, annotation);
        function = function.param(parameter);
    }
    let body = b.block(body);
    function.block_body(body).declaration()
}

/// `return x.length`
fn return_length(b: &mut AstBuilder) -> (Statement, tern_ast::NodeId) {
    let read = b.name("x");
    let id = read.id;
    let length = b.member(read, "length");
    (AstBuilder::stmt(b.ret(Some(length))), id)
}

fn return_zero(b: &mut AstBuilder) -> Statement {
    let zero = b.int(0);
    AstBuilder::stmt(b.ret(Some(zero)))
}

#[test]
fn is_check_narrows_inside_then_branch() {
    let mut b = AstBuilder::new();
    let x = b.name("x");
    let check = b.is_type(x, ty("String"));
    let (early, read) = return_length(&mut b);
    let then_branch = b.block_expr(vec![early]);
    let guard = b.if_else(check, then_branch, None);
    let fallback = return_zero(&mut b);
    let test = function(&mut b, vec![("x", ty("Any"))], vec![AstBuilder::stmt(guard), fallback]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read)), Some(&Type::string()));
}

#[test]
fn early_return_on_null_narrows_the_rest_of_the_block() {
    let mut b = AstBuilder::new();
    let x = b.name("x");
    let null = b.null();
    let is_null = b.binary(BinaryOp::Equal, x, null);
    let zero = b.int(0);
    let leave = b.ret(Some(zero));
    let guard = b.if_else(is_null, leave, None);
    let (result_statement, read) = return_length(&mut b);
    let test = function(&mut b, vec![("x", nullable("String"))], vec![AstBuilder::stmt(guard), result_statement]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read)), Some(&Type::string()));
}

#[test]
fn narrowing_from_one_branch_does_not_survive_the_merge() {
    let mut b = AstBuilder::new();
    // if (flag) { if (x == null) return 0 }
    let x = b.name("x");
    let null = b.null();
    let is_null = b.binary(BinaryOp::Equal, x, null);
    let zero = b.int(0);
    let leave = b.ret(Some(zero));
    let inner = b.if_else(is_null, leave, None);
    let then_branch = b.block_expr(vec![AstBuilder::stmt(inner)]);
    let flag = b.name("flag");
    let outer = b.if_else(flag, then_branch, None);
    let (result_statement, read) = return_length(&mut b);
    let test = function(
        &mut b,
        vec![("flag", ty("Boolean")), ("x", nullable("String"))],
        vec![AstBuilder::stmt(outer), result_statement],
    );

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UnsafeCall]);
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read)), None);
}

#[test]
fn conjunction_narrows_its_right_operand() {
    let mut b = AstBuilder::new();
    // if (x != null && x.length > 0) return 1
    let x = b.name("x");
    let null = b.null();
    let not_null = b.binary(BinaryOp::NotEqual, x, null);
    let read = b.name("x");
    let read_id = read.id;
    let length = b.member(read, "length");
    let zero = b.int(0);
    let positive = b.binary(BinaryOp::Greater, length, zero);
    let both = b.binary(BinaryOp::And, not_null, positive);
    let one = b.int(1);
    let leave = b.ret(Some(one));
    let guard = b.if_else(both, leave, None);
    let fallback = return_zero(&mut b);
    let test = function(&mut b, vec![("x", nullable("String"))], vec![AstBuilder::stmt(guard), fallback]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read_id)), Some(&Type::string()));
}

#[test]
fn assignment_replaces_earlier_narrowing() {
    let mut b = AstBuilder::new();
    // var y: String? = x; if (y != null) { y = x; return y.length }
    let x = b.name("x");
    let declare = b.var("y", Some(nullable("String")), Some(x));
    let y = b.name("y");
    let null = b.null();
    let not_null = b.binary(BinaryOp::NotEqual, y, null);
    let x_again = b.name("x");
    let reassign = b.assign("y", x_again);
    let read = b.name("y");
    let length = b.member(read, "length");
    let leave = b.ret(Some(length));
    let then_branch = b.block_expr(vec![reassign, AstBuilder::stmt(leave)]);
    let guard = b.if_else(not_null, then_branch, None);
    let fallback = return_zero(&mut b);
    let test = function(
        &mut b,
        vec![("x", nullable("String"))],
        vec![declare, AstBuilder::stmt(guard), fallback],
    );

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UnsafeCall]);
}

#[test]
fn var_written_in_lambda_is_not_narrowed() {
    let mut b = AstBuilder::new();
    // var y: String? = x; run { y = null }; if (y != null) return y.length
    let x = b.name("x");
    let declare = b.var("y", Some(nullable("String")), Some(x));
    let null = b.null();
    let clear = b.assign("y", null);
    let lambda = b.lambda(Vec::new(), vec![clear]);
    let run = b.call("run", vec![lambda]);
    let y = b.name("y");
    let null = b.null();
    let not_null = b.binary(BinaryOp::NotEqual, y, null);
    let read = b.name("y");
    let read_id = read.id;
    let length = b.member(read, "length");
    let leave = b.ret(Some(length));
    let guard = b.if_else(not_null, leave, None);
    let fallback = return_zero(&mut b);
    let test = function(
        &mut b,
        vec![("x", nullable("String"))],
        vec![declare, AstBuilder::stmt(run), AstBuilder::stmt(guard), fallback],
    );

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert!(body_codes(&result, "test").contains(&DiagnosticCode::UnsafeCall));
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read_id)), None);
}

/// `class Holder { val p: String? = null; fun test(): Int { if (p != null) return p.length; return 0 } }`
/// with `p` adjusted by `configure`.
fn property_read(configure: impl FnOnce(&mut PropertyDeclaration)) -> Vec<DiagnosticCode> {
    let mut b = AstBuilder::new();
    let null = b.null();
    let mut property = b.property("p", Some(nullable("String")), Some(null));
    configure(&mut property);

    let p = b.name("p");
    let null = b.null();
    let not_null = b.binary(BinaryOp::NotEqual, p, null);
    let read = b.name("p");
    let length = b.member(read, "length");
    let leave = b.ret(Some(length));
    let guard = b.if_else(not_null, leave, None);
    let fallback = return_zero(&mut b);
    let body = b.block(vec![AstBuilder::stmt(guard), fallback]);
    let test = b.function("test").returns(ty("Int")).block_body(body).declaration();
    let holder = b
        .class("Holder")
        .modality(Modality::Open)
        .member(Declaration::Property(property))
        .member(test)
        .declaration();

    let result = analyze(vec![file(&mut b, vec![holder])]);
    body_codes(&result, "Holder.test")
}

#[test]
fn final_property_is_narrowed() {
    assert!(property_read(|_| {}).is_empty());
}

#[test]
fn open_property_is_not_narrowed() {
    let codes = property_read(|property| property.modality = Modality::Open);
    assert_eq!(codes, vec![DiagnosticCode::UnsafeCall]);
}

#[test]
fn property_with_custom_getter_is_not_narrowed() {
    let codes = property_read(|property| property.has_custom_getter = true);
    assert_eq!(codes, vec![DiagnosticCode::UnsafeCall]);
}

#[test]
fn delegated_property_is_not_narrowed() {
    let codes = property_read(|property| property.is_delegated = true);
    assert_eq!(codes, vec![DiagnosticCode::UnsafeCall]);
}

/// `var y: String? = x; if (y == null) return 0; <loop { println(y.length); y = x }>; return 0`
fn narrowed_then_reassigned_in_loop(do_while: bool) -> (Vec<DiagnosticCode>, Option<Type>) {
    let mut b = AstBuilder::new();
    let x = b.name("x");
    let declare = b.var("y", Some(nullable("String")), Some(x));
    let y = b.name("y");
    let null = b.null();
    let is_null = b.binary(BinaryOp::Equal, y, null);
    let zero = b.int(0);
    let leave = b.ret(Some(zero));
    let guard = b.if_else(is_null, leave, None);

    let read = b.name("y");
    let read_id = read.id;
    let length = b.member(read, "length");
    let print = b.call("println", vec![length]);
    let x_again = b.name("x");
    let reassign = b.assign("y", x_again);
    let body = vec![AstBuilder::stmt(print), reassign];
    let flag = b.name("flag");
    let repeat = if do_while {
        b.do_while(body, flag)
    } else {
        b.while_loop(flag, body)
    };
    let fallback = return_zero(&mut b);
    let test = function(
        &mut b,
        vec![("flag", ty("Boolean")), ("x", nullable("String"))],
        vec![declare, AstBuilder::stmt(guard), repeat, fallback],
    );

    let result = analyze(vec![file(&mut b, vec![test])]);
    let cast = result.body("test").and_then(|body| body.smart_cast(read_id)).cloned();
    (body_codes(&result, "test"), cast)
}

#[test]
fn assignment_in_while_body_invalidates_narrowing_at_the_loop_header() {
    let (codes, cast) = narrowed_then_reassigned_in_loop(false);
    assert_eq!(codes, vec![DiagnosticCode::UnsafeCall]);
    assert_eq!(cast, None);
}

#[test]
fn assignment_in_do_while_body_invalidates_narrowing_at_the_loop_header() {
    let (codes, cast) = narrowed_then_reassigned_in_loop(true);
    assert_eq!(codes, vec![DiagnosticCode::UnsafeCall]);
    assert_eq!(cast, None);
}

#[test]
fn loop_that_leaves_a_variable_alone_keeps_its_narrowing() {
    let mut b = AstBuilder::new();
    // if (x == null) return 0; while (flag) { println(x.length) }; return 0
    let x = b.name("x");
    let null = b.null();
    let is_null = b.binary(BinaryOp::Equal, x, null);
    let zero = b.int(0);
    let leave = b.ret(Some(zero));
    let guard = b.if_else(is_null, leave, None);
    let read = b.name("x");
    let read_id = read.id;
    let length = b.member(read, "length");
    let print = b.call("println", vec![length]);
    let flag = b.name("flag");
    let repeat = b.while_loop(flag, vec![AstBuilder::stmt(print)]);
    let fallback = return_zero(&mut b);
    let test = function(
        &mut b,
        vec![("flag", ty("Boolean")), ("x", nullable("String"))],
        vec![AstBuilder::stmt(guard), repeat, fallback],
    );

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    assert_eq!(result.body("test").and_then(|body| body.smart_cast(read_id)), Some(&Type::string()));
}
