mod support;

use support::{analyze, assert_clean, body_codes, file, nullable, ty};
use tern_ast::{AstBuilder, Declaration, Expression, TypeAnnotation, WhenBranch};
use tern_checker::DiagnosticCode;

fn entry(b: &mut AstBuilder, name: &str) -> Expression {
    let class = b.name("Color");
    b.member(class, name)
}

fn entry_branch(b: &mut AstBuilder, name: &str, value: i64) -> WhenBranch {
    let label = entry(b, name);
    let body = b.int(value);
    b.value_branch(vec![label], body)
}

/// `fun test(value: <subject>): Int = when (value) { ... }`
fn when_function(
    b: &mut AstBuilder,
    subject: TypeAnnotation,
    branches: Vec<WhenBranch>,
    else_value: Option<i64>,
) -> Declaration {
    let value = b.name("value");
    let else_branch = else_value.map(|value| b.int(value));
    let when = b.when_subject(value, branches, else_branch);
    let parameter = b.param("value", subject);
    b.function("test")
        .param(parameter)
        .returns(ty("Int"))
        .expression_body(when)
        .declaration()
}

fn color(b: &mut AstBuilder) -> Declaration {
    b.enum_class("Color", &["RED", "GREEN"]).declaration()
}

#[test]
fn enum_when_missing_an_entry_needs_else() {
    let mut b = AstBuilder::new();
    let color = color(&mut b);
    let red = entry_branch(&mut b, "RED", 1);
    let test = when_function(&mut b, ty("Color"), vec![red], None);

    let result = analyze(vec![file(&mut b, vec![color, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::NoElseInWhen]);
    let diagnostic = &result.body("test").map(|body| body.diagnostics.clone()).unwrap_or_default()[0];
    assert!(diagnostic.arguments.iter().any(|argument| argument.contains("GREEN")));
}

#[test]
fn enum_when_covering_every_entry_is_exhaustive() {
    let mut b = AstBuilder::new();
    let color = color(&mut b);
    let red = entry_branch(&mut b, "RED", 1);
    let green = entry_branch(&mut b, "GREEN", 2);
    let test = when_function(&mut b, ty("Color"), vec![red, green], None);

    assert_clean(&analyze(vec![file(&mut b, vec![color, test])]));
}

#[test]
fn else_after_complete_cover_is_redundant() {
    let mut b = AstBuilder::new();
    let color = color(&mut b);
    let red = entry_branch(&mut b, "RED", 1);
    let green = entry_branch(&mut b, "GREEN", 2);
    let test = when_function(&mut b, ty("Color"), vec![red, green], Some(3));

    let result = analyze(vec![file(&mut b, vec![color, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::RedundantElseInWhen]);
    assert!(!result.has_errors());
}

#[test]
fn repeated_entry_is_a_duplicate_label() {
    let mut b = AstBuilder::new();
    let color = color(&mut b);
    let red = entry_branch(&mut b, "RED", 1);
    let again = entry_branch(&mut b, "RED", 2);
    let green = entry_branch(&mut b, "GREEN", 3);
    let test = when_function(&mut b, ty("Color"), vec![red, again, green], None);

    let result = analyze(vec![file(&mut b, vec![color, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::DuplicateLabelInWhen]);
}

#[test]
fn nullable_subject_also_needs_a_null_branch() {
    let build = |with_null: bool| {
        let mut b = AstBuilder::new();
        let color = color(&mut b);
        let red = entry_branch(&mut b, "RED", 1);
        let green = entry_branch(&mut b, "GREEN", 2);
        let mut branches = vec![red, green];
        if with_null {
            let null = b.null();
            let zero = b.int(0);
            branches.push(b.value_branch(vec![null], zero));
        }
        let test = when_function(&mut b, nullable("Color"), branches, None);
        file(&mut b, vec![color, test])
    };

    let partial = analyze(vec![build(false)]);
    assert_eq!(body_codes(&partial, "test"), vec![DiagnosticCode::NoElseInWhen]);
    assert_clean(&analyze(vec![build(true)]));
}

#[test]
fn statement_when_over_open_domain_needs_no_else() {
    let mut b = AstBuilder::new();
    let value = b.name("value");
    let one = b.int(1);
    let message = b.string("one");
    let print = b.call("println", vec![message]);
    let branch = b.value_branch(vec![one], print);
    let when = b.when_subject(value, vec![branch], None);
    let parameter = b.param("value", ty("Int"));
    let body = b.block(vec![AstBuilder::stmt(when)]);
    let test = b.function("test").param(parameter).block_body(body).declaration();

    assert_clean(&analyze(vec![file(&mut b, vec![test])]));
}
