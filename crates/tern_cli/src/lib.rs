// tern CLI - reads serialized trees, runs the analysis, prints diagnostics
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tern_ast::SourceFile;
use tern_checker::{AnalysisConfig, AnalysisResult, AnalysisSession, Diagnostic, Severity};
use tern_inference::diagnostics;
use tern_inference::CacheMetrics;
use tracing::{debug, info};

pub mod logging;

#[derive(Parser, Debug)]
#[command(name = "tern")]
#[command(about = "Semantic analysis for Kotlin-style declaration trees")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze JSON-serialized source files
    Check {
        /// Files holding one serialized `SourceFile` each
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// TOML analysis configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output format for diagnostics
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Log analysis progress to stderr
        #[arg(short, long)]
        verbose: bool,
    },
    /// List every diagnostic code with its description
    Codes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// What `check` produced; `failed` decides the exit status.
#[derive(Debug)]
pub struct CheckOutput {
    pub rendered: String,
    pub failed: bool,
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid configuration {}", path.display()))
}

pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: SourceFile = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a serialized source file", path.display()))?;
            debug!(path = %path.display(), declarations = file.declarations.len(), "loaded source");
            Ok(file)
        })
        .collect()
}

pub fn check(files: &[PathBuf], config: Option<&Path>, format: OutputFormat) -> Result<CheckOutput> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };
    let sources = load_sources(files)?;
    let session = AnalysisSession::new(config).context("analysis configuration rejected")?;
    let result = session.analyze(&sources).context("analysis failed")?;
    info!(
        files = sources.len(),
        diagnostics = result.diagnostics.len(),
        errors = result.error_count(),
        "check finished"
    );

    let rendered = match format {
        OutputFormat::Text => render_text(&result, &sources),
        OutputFormat::Json => render_json(&result, &sources)?,
    };
    Ok(CheckOutput {
        rendered,
        failed: result.has_errors(),
    })
}

/// File of the body that reported `diagnostic`; declaration-level findings
/// have none.
fn origin<'r>(result: &AnalysisResult, sources: &'r [SourceFile], diagnostic: &Diagnostic) -> Option<&'r str> {
    result
        .bodies
        .iter()
        .find(|body| body.diagnostics.contains(diagnostic))
        .and_then(|body| sources.get(body.file))
        .map(|file| file.path.as_str())
}

pub fn render_text(result: &AnalysisResult, sources: &[SourceFile]) -> String {
    let mut out = String::new();
    for diagnostic in &result.diagnostics {
        match origin(result, sources, diagnostic) {
            Some(path) => {
                let _ = writeln!(out, "{path}:{diagnostic}");
            }
            None => {
                let _ = writeln!(out, "{diagnostic}");
            }
        }
    }
    let errors = result.error_count();
    let warnings = result
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Warning)
        .count();
    let _ = writeln!(
        out,
        "{} bodies analyzed, {} errors, {} warnings{}",
        result.bodies.len(),
        errors,
        warnings,
        if result.cancelled { " (cancelled)" } else { "" }
    );
    out
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    file: Option<&'a str>,
    message: String,
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
    bodies: usize,
    errors: usize,
    cancelled: bool,
    cache: CacheMetrics,
}

pub fn render_json(result: &AnalysisResult, sources: &[SourceFile]) -> Result<String> {
    let report = JsonReport {
        diagnostics: result
            .diagnostics
            .iter()
            .map(|diagnostic| JsonDiagnostic {
                file: origin(result, sources, diagnostic),
                message: diagnostic.message(),
                diagnostic,
            })
            .collect(),
        bodies: result.bodies.len(),
        errors: result.error_count(),
        cancelled: result.cancelled,
        cache: result.cache,
    };
    serde_json::to_string_pretty(&report).context("failed to serialize report")
}

pub fn render_codes() -> String {
    let mut out = String::new();
    for descriptor in diagnostics::descriptors() {
        let _ = writeln!(
            out,
            "{:<40} {:<8} {}",
            descriptor.name,
            descriptor.severity.to_string(),
            descriptor.help
        );
    }
    out
}
