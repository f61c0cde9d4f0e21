//! tern_checker - declarations, scopes, body typing and flow analysis.
//!
//! [`SymbolTable::collect`] turns a set of [`tern_ast::SourceFile`]s into
//! declarations and signatures. Every function body, property initializer
//! and init block is then typed on its own: names are looked up through the
//! [`scope::ScopeTower`], calls go to the overload engine in
//! `tern_inference`, and a flow graph built alongside the typing pass drives
//! smart casts, definite initialization and `when` exhaustiveness.
//!
//! [`AnalysisSession`] runs the whole pipeline.

pub mod binding;
pub mod error;
pub mod flow;
pub mod pattern;
pub mod scope;
pub mod session;
pub mod symbols;
pub mod typing;
pub mod walk;

pub use error::AnalysisError;
pub use pattern::{ClosedDomain, ExhaustivenessChecker, ExhaustivenessReport};
pub use session::{AnalysisResult, AnalysisSession};
pub use symbols::SymbolTable;
pub use typing::BodyAnalysis;

pub use tern_inference::{AnalysisConfig, CancellationToken, Diagnostic, DiagnosticCode, Severity};
