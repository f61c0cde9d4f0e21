mod support;

use support::{analyze_with, file, ty};
use tern_ast::{AstBuilder, SourceFile};
use tern_checker::{AnalysisConfig, AnalysisSession};
use tern_inference::ParallelInferenceConfig;

/// Twenty small functions, every fourth one calling a missing function.
fn program() -> SourceFile {
    let mut b = AstBuilder::new();
    let mut declarations = Vec::new();
    for index in 0..20 {
        let value = if index % 4 == 0 {
            b.call("missing", Vec::new())
        } else {
            let left = b.int(index);
            let right = b.int(1);
            b.binary(tern_ast::BinaryOp::Add, left, right)
        };
        let declaration = b
            .function(&format!("f{index}"))
            .returns(ty("Int"))
            .expression_body(value)
            .declaration();
        declarations.push(declaration);
    }
    file(&mut b, declarations)
}

#[test]
fn parallel_run_matches_sequential_run() {
    let sequential = analyze_with(vec![program()], AnalysisConfig::default());

    let mut config = AnalysisConfig::default();
    config.parallel = ParallelInferenceConfig::new(true, 3, 4);
    let parallel = analyze_with(vec![program()], config);

    let names = |result: &tern_checker::AnalysisResult| {
        result.bodies.iter().map(|body| body.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&sequential), names(&parallel));
    assert_eq!(sequential.diagnostics, parallel.diagnostics);
    assert_eq!(sequential.diagnostics.len(), 5);
    assert!(!parallel.cancelled);
}

#[test]
fn diagnostics_are_sorted_by_position() {
    let result = analyze_with(vec![program()], AnalysisConfig::default());
    let lines: Vec<usize> = result.diagnostics.iter().map(|diagnostic| diagnostic.span.start_line).collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
    assert!(result.has_errors());
    assert_eq!(result.error_count(), 5);
}

#[test]
fn cancelled_session_returns_no_bodies() {
    let session = AnalysisSession::new(AnalysisConfig::default()).expect("valid configuration");
    session.cancellation_token().cancel();
    let result = session.analyze(&[program()]).expect("cancellation is not an error");
    assert!(result.cancelled);
    assert!(result.bodies.is_empty());
}

#[test]
fn result_serializes_to_json() {
    let result = analyze_with(vec![program()], AnalysisConfig::default());
    let json = serde_json::to_value(&result).expect("serializable result");
    assert_eq!(json["bodies"].as_array().map(Vec::len), Some(20));
    assert_eq!(json["diagnostics"][0]["code"], "UNRESOLVED_REFERENCE");
    assert_eq!(json["cancelled"], false);
}
