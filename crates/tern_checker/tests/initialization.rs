mod support;

use support::{analyze, assert_clean, body_codes, file, ty};
use tern_ast::{AstBuilder, InvocationKind, PropertyMutability, Statement};
use tern_checker::DiagnosticCode;

fn unit_function(b: &mut AstBuilder, statements: Vec<Statement>) -> tern_ast::Declaration {
    let flag = b.param("flag", ty("Boolean"));
    let body = b.block(statements);
    b.function("test").param(flag).block_body(body).declaration()
}

fn use_x(b: &mut AstBuilder) -> Statement {
    let x = b.name("x");
    AstBuilder::stmt(b.call("println", vec![x]))
}

#[test]
fn val_with_initializer_cannot_be_reassigned() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let declare = b.val("x", None, Some(one));
    let two = b.int(2);
    let reassign = b.assign("x", two);
    let test = unit_function(&mut b, vec![declare, reassign]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::ValReassignment]);
}

#[test]
fn read_before_assignment_is_reported() {
    let mut b = AstBuilder::new();
    let declare = b.val("x", Some(ty("Int")), None);
    let read = use_x(&mut b);
    let test = unit_function(&mut b, vec![declare, read]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UninitializedVariable]);
}

#[test]
fn assignment_on_every_branch_initializes() {
    let mut b = AstBuilder::new();
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let first = b.assign("x", one);
    let then_branch = b.block_expr(vec![first]);
    let two = b.int(2);
    let second = b.assign("x", two);
    let else_branch = b.block_expr(vec![second]);
    let flag = b.name("flag");
    let choice = b.if_else(flag, then_branch, Some(else_branch));
    let read = use_x(&mut b);
    let test = unit_function(&mut b, vec![declare, AstBuilder::stmt(choice), read]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
}

#[test]
fn assignment_on_one_branch_leaves_val_maybe_uninitialized() {
    let mut b = AstBuilder::new();
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let first = b.assign("x", one);
    let then_branch = b.block_expr(vec![first]);
    let flag = b.name("flag");
    let choice = b.if_else(flag, then_branch, None);
    let read = use_x(&mut b);
    let test = unit_function(&mut b, vec![declare, AstBuilder::stmt(choice), read]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UninitializedVariable]);
}

#[test]
fn val_initialized_inside_unknown_lambda_is_rejected() {
    let mut b = AstBuilder::new();
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let assign = b.assign("x", one);
    let lambda = b.lambda(Vec::new(), vec![assign]);
    let run = b.call("run", vec![lambda]);
    let test = unit_function(&mut b, vec![declare, AstBuilder::stmt(run)]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert!(body_codes(&result, "test").contains(&DiagnosticCode::CapturedValInitialization));
}

#[test]
fn val_initialized_inside_exactly_once_lambda_is_accepted() {
    let mut b = AstBuilder::new();
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let assign = b.assign("x", one);
    let lambda = b.lambda_with_contract(Vec::new(), vec![assign], InvocationKind::ExactlyOnce);
    let run = b.call("run", vec![lambda]);
    let read = use_x(&mut b);
    let test = unit_function(&mut b, vec![declare, AstBuilder::stmt(run), read]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
}

#[test]
fn val_property_may_be_assigned_in_init_block() {
    let mut b = AstBuilder::new();
    let property = b.property("size", Some(ty("Int")), None);
    let this = b.this();
    let target = b.member(this, "size");
    let three = b.int(3);
    let assign = b.assign_to(target, three);
    let init = b.block(vec![assign]);
    let holder = b
        .class("Holder")
        .member(tern_ast::Declaration::Property(property))
        .init_block(init)
        .declaration();

    let result = analyze(vec![file(&mut b, vec![holder])]);
    assert_clean(&result);
}

#[test]
fn val_constructor_property_cannot_be_assigned_from_member() {
    let mut b = AstBuilder::new();
    let name = b.property_param("name", ty("String"), PropertyMutability::Val);
    let this = b.this();
    let target = b.member(this, "name");
    let value = b.string("other");
    let assign = b.assign_to(target, value);
    let body = b.block(vec![assign]);
    let rename = b.function("rename").block_body(body).declaration();
    let holder = b.class("Holder").constructor(vec![name]).member(rename).declaration();

    let result = analyze(vec![file(&mut b, vec![holder])]);
    assert_eq!(body_codes(&result, "Holder.rename"), vec![DiagnosticCode::ValReassignment]);
}

#[test]
fn val_assigned_in_while_body_is_reassigned_on_the_next_iteration() {
    let mut b = AstBuilder::new();
    // val x: Int; while (flag) { x = 1 }
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let assign = b.assign("x", one);
    let flag = b.name("flag");
    let repeat = b.while_loop(flag, vec![assign]);
    let test = unit_function(&mut b, vec![declare, repeat]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::ValReassignment]);
}

#[test]
fn val_assigned_in_do_while_body_is_reassigned_on_the_next_iteration() {
    let mut b = AstBuilder::new();
    // val x: Int; do { x = 1 } while (flag)
    let declare = b.val("x", Some(ty("Int")), None);
    let one = b.int(1);
    let assign = b.assign("x", one);
    let flag = b.name("flag");
    let repeat = b.do_while(vec![assign], flag);
    let test = unit_function(&mut b, vec![declare, repeat]);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::ValReassignment]);
}
