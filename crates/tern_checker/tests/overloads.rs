mod support;

use support::{analyze, assert_clean, body_codes, codes, file, ty};
use tern_ast::{AstBuilder, Argument, Declaration, Expression, TypeAnnotation};
use tern_checker::{AnalysisResult, DiagnosticCode};
use tern_inference::Type;

fn overload(b: &mut AstBuilder, name: &str, parameters: &[(&str, &str)], returns: &str) -> Declaration {
    let mut function = b.function(name).returns(ty(returns));
    for (parameter, annotation) in parameters {
        let parameter = b.param(parameter, ty(annotation));
        function = function.param(parameter);
    }
    let body = b.block(Vec::new());
    let value = match returns {
        "Int" => b.int(0),
        "String" => b.string(""),
        _ => return function.block_body(body).declaration(),
    };
    function.expression_body(value).declaration()
}

/// `fun test() = <call>` with the call node id.
fn caller(b: &mut AstBuilder, call: Expression) -> Declaration {
    b.function("test").expression_body(call).declaration()
}

fn chosen(result: &AnalysisResult, node: tern_ast::NodeId) -> String {
    result
        .body("test")
        .and_then(|body| body.call(node))
        .map(|call| call.signature.describe(&result.registry))
        .unwrap_or_default()
}

#[test]
fn most_specific_overload_wins() {
    let mut b = AstBuilder::new();
    let general = overload(&mut b, "describe", &[("value", "Any")], "String");
    let specific = overload(&mut b, "describe", &[("value", "Int")], "Int");
    let one = b.int(1);
    let call = b.call("describe", vec![one]);
    let node = call.id;
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![general, specific, test])]);
    assert_clean(&result);
    assert_eq!(chosen(&result, node), "describe(Int): Int");
    assert_eq!(result.body("test").and_then(|body| body.type_of(node)), Some(&Type::int()));
}

#[test]
fn crossed_overloads_are_ambiguous() {
    let mut b = AstBuilder::new();
    let first = overload(&mut b, "pick", &[("a", "Int"), ("b", "Any")], "Unit");
    let second = overload(&mut b, "pick", &[("a", "Any"), ("b", "Int")], "Unit");
    let one = b.int(1);
    let two = b.int(2);
    let call = b.call("pick", vec![one, two]);
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![first, second, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::OverloadResolutionAmbiguity]);
}

#[test]
fn named_arguments_map_to_parameters() {
    let mut b = AstBuilder::new();
    let greet = overload(&mut b, "greet", &[("name", "String"), ("times", "Int")], "Unit");
    let three = b.int(3);
    let name = b.string("tern");
    let call = b.call_with(
        "greet",
        Vec::new(),
        vec![Argument::named("times", three), Argument::named("name", name)],
    );
    let node = call.id;
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![greet, test])]);
    assert_clean(&result);
    assert_eq!(chosen(&result, node), "greet(String, Int): Unit");
}

#[test]
fn unknown_named_argument_is_reported() {
    let mut b = AstBuilder::new();
    let greet = overload(&mut b, "greet", &[("name", "String")], "Unit");
    let name = b.string("tern");
    let call = b.call_with("greet", Vec::new(), vec![Argument::named("label", name)]);
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![greet, test])]);
    assert!(codes(&result).contains(&DiagnosticCode::NamedParameterNotFound));
}

#[test]
fn unknown_function_is_unresolved() {
    let mut b = AstBuilder::new();
    let call = b.call("missing", Vec::new());
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::UnresolvedReference]);
}

#[test]
fn lambda_parameter_comes_from_the_receiver_element_type() {
    let mut b = AstBuilder::new();
    // listOf(1, 2).map { it.toString() }
    let one = b.int(1);
    let two = b.int(2);
    let list = b.call("listOf", vec![one, two]);
    let it = b.name("it");
    let text = b.method_call(it, "toString", Vec::new());
    let lambda = b.lambda(Vec::new(), vec![AstBuilder::stmt(text)]);
    let call = b.method_call(list, "map", vec![lambda]);
    let node = call.id;
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    let ty = result.body("test").and_then(|body| body.type_of(node)).cloned().unwrap_or(Type::Error);
    assert_eq!(result.registry.render(&ty), "List<String>");
}

#[test]
fn lambda_without_expected_parameter_types_cannot_infer() {
    let mut b = AstBuilder::new();
    // val f = { x -> x }
    let x = b.lambda_param("x", None);
    let read = b.name("x");
    let lambda = b.lambda(vec![x], vec![AstBuilder::stmt(read)]);
    let declare = b.val("f", None, Some(lambda));
    let body = b.block(vec![declare]);
    let test = b.function("test").block_body(body).declaration();

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert!(body_codes(&result, "test").contains(&DiagnosticCode::CannotInferParameterType));
}

#[test]
fn implicit_return_types_are_inferred_on_demand() {
    let mut b = AstBuilder::new();
    // fun b() = a(); fun a() = 1
    let call = b.call("a", Vec::new());
    let node = call.id;
    let first = b.function("b").expression_body(call).declaration();
    let one = b.int(1);
    let second = b.function("a").expression_body(one).declaration();

    let result = analyze(vec![file(&mut b, vec![first, second])]);
    assert_clean(&result);
    assert_eq!(result.body("b").and_then(|body| body.type_of(node)), Some(&Type::int()));
    assert!(result.cache.inserts >= 1);
}

#[test]
fn mutually_recursive_implicit_types_are_reported() {
    let mut b = AstBuilder::new();
    let call_b = b.call("b", Vec::new());
    let first = b.function("a").expression_body(call_b).declaration();
    let call_a = b.call("a", Vec::new());
    let second = b.function("b").expression_body(call_a).declaration();

    let result = analyze(vec![file(&mut b, vec![first, second])]);
    assert!(codes(&result).contains(&DiagnosticCode::TypecheckerHasRunIntoRecursiveProblem));
}

#[test]
fn explicit_type_argument_count_is_checked() {
    let mut b = AstBuilder::new();
    let call = b.call_with("emptyList", vec![ty("Int"), ty("String")], Vec::new());
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert!(codes(&result).contains(&DiagnosticCode::WrongNumberOfTypeArguments));
}

#[test]
fn function_typed_value_is_invoked() {
    let mut b = AstBuilder::new();
    let parameter = b.param("op", TypeAnnotation::function(vec![ty("Int")], ty("String")));
    let op = b.name("op");
    let one = b.int(1);
    let call = b.invoke(op, vec![one]);
    let node = call.id;
    let test = b.function("test").param(parameter).expression_body(call).declaration();

    let result = analyze(vec![file(&mut b, vec![test])]);
    assert_clean(&result);
    assert_eq!(result.body("test").and_then(|body| body.type_of(node)), Some(&Type::string()));
}

/// `fun accept(f: (<input>) -> Unit) {}`
fn accept(b: &mut AstBuilder, input: &str) -> Declaration {
    let parameter = b.param("f", TypeAnnotation::function(vec![ty(input)], ty("Unit")));
    let body = b.block(Vec::new());
    b.function("accept").param(parameter).returns(ty("Unit")).block_body(body).declaration()
}

#[test]
fn reference_argument_selects_the_overload_it_fits() {
    let mut b = AstBuilder::new();
    // accept(::consume) with consume(x: Int)
    let takes_int = accept(&mut b, "Int");
    let takes_string = accept(&mut b, "String");
    let consume = overload(&mut b, "consume", &[("x", "Int")], "Unit");
    let reference = b.reference("consume");
    let reference_node = reference.id;
    let call = b.call("accept", vec![reference]);
    let node = call.id;
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![takes_int, takes_string, consume, test])]);
    assert_clean(&result);
    assert_eq!(chosen(&result, node), "accept((Int) -> Unit): Unit");
    let reference = result
        .body("test")
        .and_then(|body| body.call(node))
        .and_then(|call| call.postponed.iter().find(|argument| argument.node == reference_node))
        .and_then(|argument| argument.reference.as_ref())
        .map(|signature| signature.name.clone());
    assert_eq!(reference.as_deref(), Some("consume"));
}

#[test]
fn reference_fitting_no_overload_is_a_mismatch() {
    let mut b = AstBuilder::new();
    let takes_string = accept(&mut b, "String");
    let consume = overload(&mut b, "consume", &[("x", "Int")], "Unit");
    let reference = b.reference("consume");
    let call = b.call("accept", vec![reference]);
    let test = caller(&mut b, call);

    let result = analyze(vec![file(&mut b, vec![takes_string, consume, test])]);
    assert_eq!(body_codes(&result, "test"), vec![DiagnosticCode::TypeMismatch]);
}
