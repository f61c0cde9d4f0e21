//! Shared helpers for checker integration tests.
#![allow(dead_code)]

use tern_ast::{AstBuilder, Declaration, SourceFile, TypeAnnotation};
use tern_checker::{AnalysisConfig, AnalysisResult, AnalysisSession, DiagnosticCode};

pub fn ty(name: &str) -> TypeAnnotation {
    TypeAnnotation::simple(name)
}

pub fn nullable(name: &str) -> TypeAnnotation {
    TypeAnnotation::simple(name).nullable()
}

pub fn file(builder: &mut AstBuilder, declarations: Vec<Declaration>) -> SourceFile {
    builder.file("test.tn", Some("demo"), Vec::new(), declarations)
}

pub fn analyze(files: Vec<SourceFile>) -> AnalysisResult {
    analyze_with(files, AnalysisConfig::default())
}

pub fn analyze_with(files: Vec<SourceFile>, config: AnalysisConfig) -> AnalysisResult {
    let session = AnalysisSession::new(config).expect("valid configuration");
    session.analyze(&files).expect("analysis should complete")
}

pub fn codes(result: &AnalysisResult) -> Vec<DiagnosticCode> {
    result.diagnostics.iter().map(|diagnostic| diagnostic.code).collect()
}

pub fn body_codes(result: &AnalysisResult, body: &str) -> Vec<DiagnosticCode> {
    result
        .body(body)
        .unwrap_or_else(|| panic!("body `{body}` was not analyzed"))
        .diagnostics
        .iter()
        .map(|diagnostic| diagnostic.code)
        .collect()
}

pub fn assert_clean(result: &AnalysisResult) {
    assert!(
        result.diagnostics.is_empty(),
        "expected no diagnostics, got: {:#?}",
        result.diagnostics
    );
}
