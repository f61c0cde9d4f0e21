use super::{group, lambda, resolve, site, span, type_parameter, ScriptedAnalyzer, Signatures};
use crate::config::AnalysisConfig;
use crate::diagnostics::DiagnosticCode;
use crate::error::InferenceError;
use crate::postponed::LambdaResult;
use crate::registry::{builtins, TypeRegistry};
use crate::resolution::{
    ArgumentValue, CallArgument, OverloadResolver, ReferenceReceiver, ReferenceShape, ResolutionMode, ScopeLevel,
};
use crate::types::Type;
use std::sync::Arc;
use tern_ast::NodeId;

fn lambda_argument(node: u32, parameters: Vec<(&str, Option<Type>)>) -> CallArgument<'static> {
    CallArgument {
        name: None,
        spread: false,
        value: ArgumentValue::Lambda(lambda(node, parameters)),
        span: span(node as usize),
    }
}

#[test]
fn implicit_lambda_parameter_comes_from_earlier_argument() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let r = type_parameter(&mut registry, "R", Vec::new());
    let block = registry.function_type(vec![Type::parameter(t)], Type::parameter(r));
    let signature = Signatures::new()
        .function("run", vec![("value", Type::parameter(t)), ("block", block)], Type::parameter(r))
        .with_type_parameters(vec![t, r]);
    let groups = [group(ScopeLevel::Package, vec![signature])];
    let call = site(
        "run",
        vec![CallArgument::typed(Type::string(), span(1)), lambda_argument(50, Vec::new())],
    );
    let mut analyzer = ScriptedAnalyzer::default().echoing(50);

    let outcome = resolve(&registry, call, &groups, &mut analyzer);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    assert_eq!(outcome.ty, Type::string());
    assert_eq!(analyzer.requests, vec![(NodeId::new(50), vec![Type::string()], None)]);
    let resolved = outcome.call.expect("resolved");
    assert_eq!(resolved.type_arguments, vec![Type::string(), Type::string()]);
    assert_eq!(
        resolved.postponed[0].ty,
        registry.function_type(vec![Type::string()], Type::string())
    );
}

#[test]
fn literal_returned_from_lambda_fixes_result_to_int() {
    let mut registry = TypeRegistry::with_builtins();
    let r = type_parameter(&mut registry, "R", Vec::new());
    let block = registry.function_type(Vec::new(), Type::parameter(r));
    let signature = Signatures::new()
        .function("compute", vec![("block", block)], Type::parameter(r))
        .with_type_parameters(vec![r]);
    let groups = [group(ScopeLevel::Package, vec![signature])];
    let call = site("compute", vec![lambda_argument(51, Vec::new())]);
    let mut analyzer = ScriptedAnalyzer::default().returning(
        51,
        LambdaResult {
            return_type: Type::int(),
            return_literal: Some(3),
        },
    );

    let outcome = resolve(&registry, call, &groups, &mut analyzer);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(outcome.ty, Type::int());
}

#[test]
fn declared_lambda_parameter_type_flows_into_type_variable() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let block = registry.function_type(vec![Type::parameter(t)], Type::unit());
    let signature = Signatures::new()
        .function("consume", vec![("block", block)], Type::unit())
        .with_type_parameters(vec![t]);
    let groups = [group(ScopeLevel::Package, vec![signature])];
    let call = site("consume", vec![lambda_argument(52, vec![("x", Some(Type::string()))])]);
    let mut analyzer = ScriptedAnalyzer::default();

    let outcome = resolve(&registry, call, &groups, &mut analyzer);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(outcome.call.expect("resolved").type_arguments, vec![Type::string()]);
    assert_eq!(analyzer.requests[0].1, vec![Type::string()]);
    assert_eq!(analyzer.requests[0].2, Some(Type::unit()));
}

#[test]
fn uninferable_lambda_parameter_is_reported_once() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let block = registry.function_type(vec![Type::parameter(t)], Type::unit());
    let signature = Signatures::new()
        .function("consume", vec![("block", block)], Type::unit())
        .with_type_parameters(vec![t]);
    let groups = [group(ScopeLevel::Package, vec![signature])];
    let call = site("consume", vec![lambda_argument(53, Vec::new())]);
    let mut analyzer = ScriptedAnalyzer::default();

    let outcome = resolve(&registry, call, &groups, &mut analyzer);
    let codes: Vec<_> = outcome.diagnostics.iter().map(|diagnostic| diagnostic.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::CannotInferParameterType]);
    assert_eq!(outcome.diagnostics[0].arguments, vec!["it".to_string()]);
    assert_eq!(analyzer.requests[0].1, vec![Type::Error]);
}

fn reference_argument(node: u32, name: &str, candidates: Vec<crate::signature::CallableSignature>) -> CallArgument<'static> {
    CallArgument {
        name: None,
        spread: false,
        value: ArgumentValue::CallableReference(ReferenceShape {
            node: NodeId::new(node),
            span: span(node as usize),
            name: name.to_string(),
            receiver: ReferenceReceiver::None,
            candidates: candidates.into_iter().map(Arc::new).collect(),
        }),
        span: span(node as usize),
    }
}

#[test]
fn callable_reference_is_chosen_by_expected_parameter_type() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let r = type_parameter(&mut registry, "R", Vec::new());
    let transform = registry.function_type(vec![Type::parameter(t)], Type::parameter(r));
    let mut signatures = Signatures::new();
    let map = signatures
        .function("map", vec![("value", Type::parameter(t)), ("transform", transform)], Type::parameter(r))
        .with_type_parameters(vec![t, r]);
    let show_int = signatures.function("show", vec![("x", Type::int())], Type::string());
    let show_string = signatures.function("show", vec![("x", Type::string())], Type::int());
    let groups = [group(ScopeLevel::Package, vec![map])];
    let call = site(
        "map",
        vec![
            CallArgument::typed(Type::int(), span(1)),
            reference_argument(60, "show", vec![show_int.clone(), show_string]),
        ],
    );

    let outcome = resolve(&registry, call, &groups, &mut ScriptedAnalyzer::default());
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    assert_eq!(outcome.ty, Type::string());
    let resolved = outcome.call.expect("resolved");
    let chosen = resolved.postponed[0].reference.as_ref().expect("reference");
    assert_eq!(chosen.id, show_int.id);
}

#[test]
fn callable_reference_ambiguity_is_reported_not_guessed() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let transform = registry.function_type(vec![Type::parameter(t)], Type::string());
    let mut signatures = Signatures::new();
    let apply = signatures
        .function("apply", vec![("value", Type::parameter(t)), ("transform", transform)], Type::string())
        .with_type_parameters(vec![t]);
    let show_int = signatures.function("show", vec![("x", Type::int())], Type::string());
    let show_any = signatures.function("show", vec![("x", Type::any())], Type::string());
    let groups = [group(ScopeLevel::Package, vec![apply])];
    let call = site(
        "apply",
        vec![
            CallArgument::typed(Type::int(), span(1)),
            reference_argument(61, "show", vec![show_int, show_any]),
        ],
    );

    let outcome = resolve(&registry, call, &groups, &mut ScriptedAnalyzer::default());
    let codes: Vec<_> = outcome.diagnostics.iter().map(|diagnostic| diagnostic.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::CallableReferenceResolutionAmbiguity]);
    assert_eq!(outcome.diagnostics[0].span, span(61));
    assert!(outcome.call.expect("resolved").postponed[0].ty.is_error());
}

#[test]
fn outer_overload_no_reference_fits_is_not_applicable() {
    let mut registry = TypeRegistry::with_builtins();
    let takes_int = registry.function_type(vec![Type::int()], Type::unit());
    let takes_string = registry.function_type(vec![Type::string()], Type::unit());
    let mut signatures = Signatures::new();
    let with_int = signatures.function("accept", vec![("f", takes_int)], Type::unit());
    let with_string = signatures.function("accept", vec![("f", takes_string)], Type::unit());
    let consume = signatures.function("consume", vec![("x", Type::int())], Type::unit());
    let groups = [group(ScopeLevel::Package, vec![with_int.clone(), with_string])];
    let call = site("accept", vec![reference_argument(62, "consume", vec![consume.clone()])]);

    let outcome = resolve(&registry, call, &groups, &mut ScriptedAnalyzer::default());
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    let resolved = outcome.call.expect("resolved");
    assert_eq!(resolved.signature.id, with_int.id);
    assert_eq!(resolved.postponed[0].reference.as_ref().map(|reference| reference.id), Some(consume.id));
}

#[test]
fn reference_fitting_no_overload_is_a_mismatch() {
    let mut registry = TypeRegistry::with_builtins();
    let takes_string = registry.function_type(vec![Type::string()], Type::unit());
    let mut signatures = Signatures::new();
    let accept = signatures.function("accept", vec![("f", takes_string)], Type::unit());
    let consume = signatures.function("consume", vec![("x", Type::int())], Type::unit());
    let groups = [group(ScopeLevel::Package, vec![accept])];
    let call = site("accept", vec![reference_argument(63, "consume", vec![consume])]);

    let outcome = resolve(&registry, call, &groups, &mut ScriptedAnalyzer::default());
    let codes: Vec<_> = outcome.diagnostics.iter().map(|diagnostic| diagnostic.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::TypeMismatch]);
    assert_eq!(outcome.diagnostics[0].span, span(63));
}

#[test]
fn cancellation_stops_completion() {
    let mut registry = TypeRegistry::with_builtins();
    let r = type_parameter(&mut registry, "R", Vec::new());
    let block = registry.function_type(Vec::new(), Type::parameter(r));
    let signature = Signatures::new()
        .function("compute", vec![("block", block)], Type::parameter(r))
        .with_type_parameters(vec![r]);
    let groups = [group(ScopeLevel::Package, vec![signature])];
    let call = site("compute", vec![lambda_argument(54, Vec::new())]);
    let mut analyzer = ScriptedAnalyzer {
        cancelled: true,
        ..ScriptedAnalyzer::default()
    };

    let config = AnalysisConfig::default();
    let result = OverloadResolver::new(&registry, &config).resolve(call, &groups, &mut analyzer);
    assert!(matches!(result, Err(InferenceError::Cancelled)));
    assert!(analyzer.requests.is_empty());
}

#[test]
fn dependent_call_is_finished_by_the_enclosing_call() {
    let mut registry = TypeRegistry::with_builtins();
    let t = type_parameter(&mut registry, "T", Vec::new());
    let list_of = |ty: Type| Type::generic(builtins::LIST, vec![ty]);
    let mut signatures = Signatures::new();
    let empty = signatures
        .function("emptyList", Vec::new(), list_of(Type::parameter(t)))
        .with_type_parameters(vec![t]);
    let take = signatures.function("take", vec![("items", list_of(Type::string()))], Type::unit());
    let config = AnalysisConfig::default();
    let resolver = OverloadResolver::new(&registry, &config);
    let mut analyzer = ScriptedAnalyzer::default();

    let mut inner_site = site("emptyList", Vec::new());
    inner_site.mode = ResolutionMode::Dependent;
    let inner = resolver
        .resolve(inner_site, &[group(ScopeLevel::Default, vec![empty])], &mut analyzer)
        .expect("not cancelled");
    assert!(inner.diagnostics.is_empty());
    assert!(inner.ty.has_variables());
    let nested = inner.system.expect("unfinished system");

    let argument = CallArgument {
        name: None,
        spread: false,
        value: ArgumentValue::Typed {
            ty: inner.ty.clone(),
            nested: Some(Box::new(nested)),
        },
        span: span(1),
    };
    let outer = resolver
        .resolve(site("take", vec![argument]), &[group(ScopeLevel::Package, vec![take])], &mut analyzer)
        .expect("not cancelled");
    assert!(outer.diagnostics.is_empty(), "{:?}", outer.diagnostics);

    let mut inner_call = inner.call.expect("resolved");
    inner_call.substitute(&outer.solution);
    assert_eq!(inner_call.return_type, list_of(Type::string()));
    assert_eq!(inner_call.type_arguments, vec![Type::string()]);
}
