use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use tern_ast::{AstBuilder, SourceFile, TypeAnnotation};
use tern_cli::{check, load_config, render_codes, OutputFormat};

/// `fun ok(): Int = 1` and, when `broken`, `fun bad(): Int = missing()`.
fn source(broken: bool) -> SourceFile {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let mut declarations = vec![b
        .function("ok")
        .returns(TypeAnnotation::simple("Int"))
        .expression_body(one)
        .declaration()];
    if broken {
        let call = b.call("missing", Vec::new());
        declarations.push(
            b.function("bad")
                .returns(TypeAnnotation::simple("Int"))
                .expression_body(call)
                .declaration(),
        );
    }
    b.file("main.tn", Some("demo"), Vec::new(), declarations)
}

fn write_source(dir: &Path, broken: bool) -> PathBuf {
    let path = dir.join("main.json");
    let json = serde_json::to_string(&source(broken)).expect("serializable tree");
    fs::write(&path, json).expect("source file should be writable");
    path
}

#[test]
fn clean_input_passes() {
    let dir = tempdir().expect("temporary directory");
    let path = write_source(dir.path(), false);

    let output = check(&[path], None, OutputFormat::Text).expect("check runs");
    assert!(!output.failed);
    assert!(output.rendered.contains("1 bodies analyzed, 0 errors"));
}

#[test]
fn errors_are_reported_with_file_and_code() {
    let dir = tempdir().expect("temporary directory");
    let path = write_source(dir.path(), true);

    let output = check(&[path], None, OutputFormat::Text).expect("check runs");
    assert!(output.failed);
    assert!(output.rendered.contains("main.tn:"), "{}", output.rendered);
    assert!(output.rendered.contains("UNRESOLVED_REFERENCE"), "{}", output.rendered);
}

#[test]
fn json_report_lists_diagnostics() {
    let dir = tempdir().expect("temporary directory");
    let path = write_source(dir.path(), true);

    let output = check(&[path], None, OutputFormat::Json).expect("check runs");
    let report: serde_json::Value = serde_json::from_str(&output.rendered).expect("valid json");
    assert_eq!(report["errors"], 1);
    assert_eq!(report["diagnostics"][0]["code"], "UNRESOLVED_REFERENCE");
    assert_eq!(report["diagnostics"][0]["file"], "main.tn");
}

#[test]
fn configuration_is_read_from_toml() {
    let dir = tempdir().expect("temporary directory");
    let config = dir.path().join("tern.toml");
    fs::write(
        &config,
        "[parallel]\nmodule_parallelism = true\nworker_threads = 2\nconstraint_batching = 1\n\n[limits]\nmax_lambda_depth = 4\n",
    )
    .expect("config should be writable");

    let loaded = load_config(&config).expect("valid config");
    assert!(loaded.parallel.module_parallelism);
    assert_eq!(loaded.limits.max_lambda_depth, 4);
    assert_eq!(loaded.limits.max_candidates, 256);

    let path = write_source(dir.path(), false);
    let output = check(&[path], Some(&config), OutputFormat::Text).expect("check runs");
    assert!(!output.failed);
}

#[test]
fn zero_limit_is_rejected() {
    let dir = tempdir().expect("temporary directory");
    let config = dir.path().join("tern.toml");
    fs::write(&config, "[limits]\nmax_candidates = 0\n").expect("config should be writable");
    let path = write_source(dir.path(), false);

    let error = check(&[path], Some(&config), OutputFormat::Text).unwrap_err();
    assert!(format!("{error:#}").contains("max_candidates"));
}

#[test]
fn unreadable_source_names_the_path() {
    let dir = tempdir().expect("temporary directory");
    let path = dir.path().join("absent.json");

    let error = check(&[path], None, OutputFormat::Text).unwrap_err();
    assert!(error.to_string().contains("absent.json"));
}

#[test]
fn code_listing_covers_the_vocabulary() {
    let listing = render_codes();
    assert!(listing.contains("NO_ELSE_IN_WHEN"));
    assert!(listing.contains("TYPECHECKER_HAS_RUN_INTO_RECURSIVE_PROBLEM"));
    assert_eq!(listing.lines().count(), 30);
}
