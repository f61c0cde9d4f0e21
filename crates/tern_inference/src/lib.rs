//! tern_inference - type model, constraint solving and overload resolution.
//!
//! This crate holds everything about types that does not need the declaration
//! tree: the class and type-parameter arena, subtyping, the per-call
//! constraint system, candidate selection and completion of lambdas and
//! callable references. Name lookup, flow analysis and body typing live in
//! `tern_checker`, which feeds call sites into [`OverloadResolver`].

pub mod cache;
pub mod cancel;
pub mod config;
pub mod constraint;
pub mod diagnostics;
pub mod error;
pub mod postponed;
pub mod registry;
pub mod relations;
pub mod resolution;
pub mod signature;
pub mod substitution;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::{CacheMetrics, SignatureCache};
pub use cancel::CancellationToken;
pub use config::{
    AnalysisConfig, ConfigError, InferenceLimits, ParallelInferenceConfig, SpecificityPolicy, SpecificityRule,
};
pub use constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem, TypeVariable, TypeVariableAllocator};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticDescriptor, Severity};
pub use error::InferenceError;
pub use postponed::{LambdaResult, PostponedArgumentAnalyzer};
pub use registry::{builtins, ClassInfo, TypeParameterInfo, TypeParameterOwner, TypeRegistry};
pub use relations::TypeRelations;
pub use resolution::{
    ArgumentValue, CallArgument, CallSite, CandidateEntry, CandidateGroup, LambdaParameter, LambdaShape,
    OverloadResolver, PostponedResult, ReceiverArgument, ReferenceReceiver, ReferenceShape, ResolutionMode,
    ResolutionOutcome, ResolvedCall, ScopeLevel,
};
pub use signature::{CallableKind, CallableSignature, ValueParameter};
pub use substitution::Substitutor;
pub use types::{ClassId, DeclId, Type, TypeParamId, TypeVarId};
