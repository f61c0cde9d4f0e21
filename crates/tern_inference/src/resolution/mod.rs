//! Overload resolution: candidate checking, specificity ranking and
//! completion of the winning candidate's constraint system.

mod candidate;
mod engine;
mod mapping;
mod specificity;

pub use candidate::{Applicability, CandidateCheck, InapplicabilityReason};
pub use engine::{OverloadResolver, ResolutionOutcome};
pub use mapping::{map_arguments, ArgumentMapping, MappingError, ParameterSlot};
pub use specificity::SpecificityComparator;

use crate::constraint::ConstraintSystem;
use crate::signature::CallableSignature;
use crate::substitution::Substitutor;
use crate::types::Type;
use serde::Serialize;
use std::sync::Arc;
use tern_ast::{InvocationKind, NodeId, Span};

/// Scope level a candidate group was found at, closest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScopeLevel {
    Local,
    Member,
    Extension,
    Package,
    ExplicitImport,
    StarImport,
    Default,
}

/// Full resolution fixes every variable; dependent resolution leaves the
/// variables of the return type to the enclosing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    #[default]
    Full,
    Dependent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverArgument {
    pub ty: Type,
    /// `?.` access: a nullable receiver is allowed and the result is nullable.
    pub safe: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaParameter {
    pub name: String,
    pub ty: Option<Type>,
}

/// What resolution needs to know about a lambda argument.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaShape {
    pub node: NodeId,
    pub span: Span,
    pub parameters: Vec<LambdaParameter>,
    /// No parameter list was written; a single expected input becomes `it`.
    pub implicit_parameters: bool,
    pub invocation: InvocationKind,
}

impl LambdaShape {
    pub fn has_declared_types(&self) -> bool {
        !self.implicit_parameters && self.parameters.iter().all(|parameter| parameter.ty.is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceReceiver {
    None,
    /// `Type::member`: the receiver becomes the first parameter.
    Unbound(Type),
    /// `value::member`.
    Bound(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceShape {
    pub node: NodeId,
    pub span: Span,
    pub name: String,
    pub receiver: ReferenceReceiver,
    pub candidates: Vec<Arc<CallableSignature>>,
}

#[derive(Debug, Clone)]
pub enum ArgumentValue<'r> {
    /// Already typed expression; `nested` holds the unfinished system of a
    /// generic call resolved in dependent mode.
    Typed {
        ty: Type,
        nested: Option<Box<ConstraintSystem<'r>>>,
    },
    IntegerLiteral(i64),
    Lambda(LambdaShape),
    CallableReference(ReferenceShape),
}

#[derive(Debug, Clone)]
pub struct CallArgument<'r> {
    pub name: Option<String>,
    pub spread: bool,
    pub value: ArgumentValue<'r>,
    pub span: Span,
}

impl<'r> CallArgument<'r> {
    pub fn typed(ty: Type, span: Span) -> Self {
        Self {
            name: None,
            spread: false,
            value: ArgumentValue::Typed { ty, nested: None },
            span,
        }
    }

    pub fn literal(value: i64, span: Span) -> Self {
        Self {
            name: None,
            spread: false,
            value: ArgumentValue::IntegerLiteral(value),
            span,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CallSite<'r> {
    pub node: NodeId,
    pub span: Span,
    pub name: String,
    pub explicit_receiver: Option<ReceiverArgument>,
    pub type_arguments: Vec<Type>,
    pub arguments: Vec<CallArgument<'r>>,
    pub expected_type: Option<Type>,
    pub mode: ResolutionMode,
}

impl<'r> CallSite<'r> {
    pub fn new(node: NodeId, span: Span, name: impl Into<String>) -> Self {
        Self {
            node,
            span,
            name: name.into(),
            explicit_receiver: None,
            type_arguments: Vec::new(),
            arguments: Vec::new(),
            expected_type: None,
            mode: ResolutionMode::Full,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateEntry {
    pub signature: Arc<CallableSignature>,
    /// Implicit `this` used when the call has no explicit receiver.
    pub implicit_receiver: Option<Type>,
}

impl CandidateEntry {
    pub fn new(signature: Arc<CallableSignature>) -> Self {
        Self {
            signature,
            implicit_receiver: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateGroup {
    pub level: ScopeLevel,
    pub entries: Vec<CandidateEntry>,
}

/// Final type of a lambda or callable reference argument.
#[derive(Debug, Clone, PartialEq)]
pub struct PostponedResult {
    pub node: NodeId,
    pub ty: Type,
    pub reference: Option<Arc<CallableSignature>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub node: NodeId,
    pub signature: Arc<CallableSignature>,
    pub level: ScopeLevel,
    pub type_arguments: Vec<Type>,
    /// Substituted parameter types; vararg slots hold the element type.
    pub parameter_types: Vec<Type>,
    pub return_type: Type,
    /// Parameter index per argument.
    pub argument_mapping: Vec<Option<usize>>,
    pub receiver: Option<Type>,
    pub postponed: Vec<PostponedResult>,
}

impl ResolvedCall {
    /// Applies the outer call's solution to a call resolved in dependent mode.
    pub fn substitute(&mut self, substitutor: &Substitutor) {
        for ty in self
            .type_arguments
            .iter_mut()
            .chain(self.parameter_types.iter_mut())
            .chain(std::iter::once(&mut self.return_type))
            .chain(self.receiver.iter_mut())
        {
            *ty = substitutor.apply(ty);
        }
        for postponed in &mut self.postponed {
            postponed.ty = substitutor.apply(&postponed.ty);
        }
    }

    pub fn parameter_type_of(&self, argument: usize) -> Option<&Type> {
        self.argument_mapping
            .get(argument)
            .copied()
            .flatten()
            .and_then(|parameter| self.parameter_types.get(parameter))
    }
}
