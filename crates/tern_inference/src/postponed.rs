//! Lambdas and callable references whose types depend on unfixed variables.
//!
//! Completion is a fixed-point loop over one constraint system:
//!
//! 1. analyze every ready postponed argument, in declaration order;
//! 2. otherwise fix the next variable that has a proper bound and is not an
//!    output of a pending argument;
//! 3. otherwise force the oldest pending argument;
//! 4. otherwise (full mode only) fix whatever is left.
//!
//! Lambda bodies re-enter the expression typer through
//! [`PostponedArgumentAnalyzer`].

use crate::config::InferenceLimits;
use crate::constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem, TypeVariableAllocator};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::InferenceError;
use crate::resolution::{LambdaShape, PostponedResult, ReferenceReceiver, ReferenceShape, ResolutionMode};
use crate::signature::CallableSignature;
use crate::substitution::Substitutor;
use crate::types::{Type, TypeVarId};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of analyzing a lambda body.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaResult {
    /// Common supertype of the values the body returns.
    pub return_type: Type,
    /// Set when the body's result is a bare integer literal.
    pub return_literal: Option<i64>,
}

impl LambdaResult {
    pub fn new(return_type: Type) -> Self {
        Self {
            return_type,
            return_literal: None,
        }
    }
}

/// Re-entry point into the expression typer.
pub trait PostponedArgumentAnalyzer {
    /// Types the lambda body with the given parameter types. `expected_return`
    /// is set once the lambda's return type is known.
    fn analyze_lambda(
        &mut self,
        lambda: &LambdaShape,
        parameter_types: &[Type],
        expected_return: Option<&Type>,
    ) -> LambdaResult;

    /// Allocator for variables created while resolving.
    fn variables(&mut self) -> &mut TypeVariableAllocator;

    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostponedKind {
    Lambda(LambdaShape),
    Reference(ReferenceShape),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostponedArgument {
    /// Index of the argument in the call.
    pub index: usize,
    pub kind: PostponedKind,
    /// Expected function type, in terms of the system's variables.
    pub expected: Type,
    pub result: Option<PostponedResult>,
}

impl PostponedArgument {
    /// Queues a lambda. A non-function expected type is replaced by a
    /// function type over fresh variables constrained to it.
    pub fn lambda(
        index: usize,
        shape: LambdaShape,
        expected: Type,
        system: &mut ConstraintSystem<'_>,
        variables: &mut TypeVariableAllocator,
    ) -> Self {
        let origin = ConstraintOrigin::PostponedArgument(index);
        let registry = system.registry();
        let expected = match registry.function_parts(&system.substitute(&expected)) {
            Some((inputs, output)) => {
                if !shape.implicit_parameters && shape.parameters.len() != inputs.len() {
                    let declared = shape
                        .parameters
                        .iter()
                        .map(|parameter| parameter.ty.clone().unwrap_or(Type::Error))
                        .collect();
                    let actual = registry.function_type(declared, output);
                    system.add_subtype_constraint(&actual, &expected, origin);
                } else if !shape.implicit_parameters {
                    for (input, parameter) in inputs.iter().zip(&shape.parameters) {
                        if let Some(declared) = &parameter.ty {
                            system.add_subtype_constraint(input, declared, origin);
                        }
                    }
                }
                expected
            }
            None => {
                let mut inputs = Vec::new();
                if !shape.implicit_parameters {
                    for parameter in &shape.parameters {
                        let ty = match &parameter.ty {
                            Some(ty) => ty.clone(),
                            None => {
                                let variable = variables.fresh(format!("_{}", parameter.name), shape.node, shape.span);
                                Type::variable(system.register(variable))
                            }
                        };
                        inputs.push(ty);
                    }
                }
                let output = variables.fresh("_R", shape.node, shape.span);
                let output = Type::variable(system.register(output));
                let synthesized = registry.function_type(inputs, output);
                system.add_subtype_constraint(&synthesized, &expected, origin);
                synthesized
            }
        };
        Self {
            index,
            kind: PostponedKind::Lambda(shape),
            expected,
            result: None,
        }
    }

    pub fn reference(index: usize, shape: ReferenceShape, expected: Type) -> Self {
        Self {
            index,
            kind: PostponedKind::Reference(shape),
            expected,
            result: None,
        }
    }

    /// Mismatch of a callable reference none of whose candidates fits an
    /// expected type that is already proper. Pending references and
    /// lambdas give `None`.
    pub(crate) fn reference_mismatch(
        &self,
        system: &ConstraintSystem<'_>,
        variables: &mut TypeVariableAllocator,
    ) -> Option<ConstraintError> {
        let PostponedKind::Reference(shape) = &self.kind else {
            return None;
        };
        let first = shape.candidates.first()?;
        if !system.is_proper(&self.expected) {
            return None;
        }
        let origin = ConstraintOrigin::PostponedArgument(self.index);
        let expected = system.substitute(&self.expected);
        if !compatible_references(shape, &expected, system, variables, origin).is_empty() {
            return None;
        }
        let mut trial = system.clone();
        let actual = instantiate_reference(first, shape, &mut trial, variables);
        let before = trial.errors().len();
        trial.add_subtype_constraint(&actual, &expected, origin);
        let error = trial.errors().get(before).cloned();
        Some(error.unwrap_or(ConstraintError::TypeMismatch {
            expected,
            actual,
            origin,
            variable: None,
        }))
    }

    pub fn node(&self) -> tern_ast::NodeId {
        match &self.kind {
            PostponedKind::Lambda(shape) => shape.node,
            PostponedKind::Reference(shape) => shape.node,
        }
    }

    pub fn span(&self) -> tern_ast::Span {
        match &self.kind {
            PostponedKind::Lambda(shape) => shape.span,
            PostponedKind::Reference(shape) => shape.span,
        }
    }

    fn is_done(&self) -> bool {
        self.result.is_some()
    }

    fn parts(&self, system: &ConstraintSystem<'_>) -> (Vec<Type>, Option<Type>) {
        let expected = system.substitute(&self.expected);
        match system.registry().function_parts(&expected) {
            Some((inputs, output)) => (inputs, Some(output)),
            None => (Vec::new(), None),
        }
    }

    /// Variables the argument consumes.
    fn input_variables(&self, system: &ConstraintSystem<'_>) -> Vec<TypeVarId> {
        if let PostponedKind::Lambda(shape) = &self.kind {
            if shape.has_declared_types() {
                return Vec::new();
            }
        }
        let mut out = Vec::new();
        for input in self.parts(system).0 {
            input.collect_variables(&mut out);
        }
        out.retain(|var| !system.is_fixed(*var));
        out
    }

    /// Variables the argument produces bounds for.
    fn output_variables(&self, system: &ConstraintSystem<'_>) -> Vec<TypeVarId> {
        let mut out = Vec::new();
        match self.parts(system).1 {
            Some(output) => output.collect_variables(&mut out),
            None => system.substitute(&self.expected).collect_variables(&mut out),
        }
        out.retain(|var| !system.is_fixed(*var));
        out
    }

    fn is_ready(&self, system: &ConstraintSystem<'_>) -> bool {
        match &self.kind {
            PostponedKind::Lambda(_) => self.input_variables(system).is_empty(),
            PostponedKind::Reference(shape) => {
                shape.candidates.len() == 1 || self.input_variables(system).is_empty()
            }
        }
    }
}

/// Drives one system to completion. Diagnostics about postponed arguments
/// are returned; constraint errors stay in the system.
pub struct Completion<'a, 'r> {
    pub system: &'a mut ConstraintSystem<'r>,
    pub postponed: &'a mut [PostponedArgument],
    pub mode: ResolutionMode,
    pub limits: InferenceLimits,
}

impl<'a, 'r> Completion<'a, 'r> {
    pub fn run(self, host: &mut dyn PostponedArgumentAnalyzer) -> Result<Vec<Diagnostic>, InferenceError> {
        let Completion {
            system,
            postponed,
            mode,
            limits,
        } = self;
        let mut diagnostics = Vec::new();
        let mut iterations = 0usize;

        loop {
            if host.is_cancelled() {
                debug!("completion cancelled");
                return Err(InferenceError::Cancelled);
            }
            iterations += 1;
            if iterations > limits.max_completion_iterations {
                system.record_limit("max_completion_iterations");
                break;
            }

            if let Some(position) = postponed
                .iter()
                .position(|argument| !argument.is_done() && argument.is_ready(system))
            {
                let argument = &mut postponed[position];
                process(argument, system, host, &mut diagnostics, false);
                continue;
            }

            let mut blocked: Vec<TypeVarId> = postponed
                .iter()
                .filter(|argument| !argument.is_done())
                .flat_map(|argument| argument.output_variables(system))
                .collect();
            if mode == ResolutionMode::Dependent {
                blocked.extend(system.unfixed_variables().into_iter().filter(|var| system.is_return_variable(*var)));
            }
            let preferred: Vec<TypeVarId> = postponed
                .iter()
                .filter(|argument| !argument.is_done())
                .flat_map(|argument| argument.input_variables(system))
                .collect();
            if let Some(var) = system.next_ready_variable(&blocked, &preferred) {
                if system.has_proper_bound(var) {
                    system.fix(var);
                    continue;
                }
            }

            if let Some(argument) = postponed.iter_mut().find(|argument| !argument.is_done()) {
                trace!(argument = argument.index, "forcing postponed argument");
                process(argument, system, host, &mut diagnostics, true);
                continue;
            }

            if mode == ResolutionMode::Full {
                if let Some(var) = system.next_ready_variable(&[], &[]) {
                    system.fix(var);
                    continue;
                }
            } else if let Some(var) = system.next_ready_variable(&blocked, &[]) {
                if !system.depends_on_unfixed(var) {
                    system.fix(var);
                    continue;
                }
            }
            break;
        }
        Ok(diagnostics)
    }
}

fn process(
    argument: &mut PostponedArgument,
    system: &mut ConstraintSystem<'_>,
    host: &mut dyn PostponedArgumentAnalyzer,
    diagnostics: &mut Vec<Diagnostic>,
    forced: bool,
) {
    if forced {
        // Inputs with usable bounds are fixed even when another argument
        // would still add to them.
        for var in argument.input_variables(system) {
            if system.has_proper_bound(var) {
                system.fix(var);
            }
        }
    }
    match argument.kind.clone() {
        PostponedKind::Lambda(shape) => analyze_lambda(argument, &shape, system, host, diagnostics),
        PostponedKind::Reference(shape) => {
            resolve_reference(argument, &shape, system, host.variables(), diagnostics)
        }
    }
}

fn analyze_lambda(
    argument: &mut PostponedArgument,
    shape: &LambdaShape,
    system: &mut ConstraintSystem<'_>,
    host: &mut dyn PostponedArgumentAnalyzer,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let origin = ConstraintOrigin::PostponedArgument(argument.index);
    let (inputs, output) = argument.parts(system);
    let mut unknown = Vec::new();
    let parameter_types: Vec<Type> = if shape.implicit_parameters {
        inputs.iter().take(1).cloned().collect()
    } else {
        shape
            .parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                parameter
                    .ty
                    .clone()
                    .or_else(|| inputs.get(index).cloned())
                    .unwrap_or(Type::Error)
            })
            .collect()
    };
    let parameter_types: Vec<Type> = parameter_types
        .into_iter()
        .enumerate()
        .map(|(index, ty)| {
            if system.is_proper(&ty) {
                system.substitute(&ty)
            } else {
                for var in ty.variables() {
                    system.mark_unresolvable(var);
                }
                let name = shape
                    .parameters
                    .get(index)
                    .map(|parameter| parameter.name.clone())
                    .unwrap_or_else(|| "it".to_string());
                unknown.push(name);
                Type::Error
            }
        })
        .collect();
    for name in unknown {
        diagnostics.push(
            Diagnostic::new(DiagnosticCode::CannotInferParameterType, shape.span)
                .at_node(shape.node)
                .with_argument(name),
        );
    }

    let expected_return = output
        .as_ref()
        .filter(|output| system.is_proper(output))
        .cloned();
    trace!(lambda = %shape.node, "analyzing lambda");
    let result = host.analyze_lambda(shape, &parameter_types, expected_return.as_ref());

    let return_type = match &output {
        Some(output) if output.is_unit() => Type::unit(),
        Some(output) => {
            match result.return_literal {
                Some(value) => {
                    system.add_integer_literal(value, output, origin);
                }
                None => system.add_subtype_constraint(&result.return_type, output, origin),
            }
            output.clone()
        }
        None => result.return_type.clone(),
    };
    let ty = system.registry().function_type(parameter_types, return_type);
    argument.result = Some(PostponedResult {
        node: shape.node,
        ty,
        reference: None,
    });
}

fn resolve_reference(
    argument: &mut PostponedArgument,
    shape: &ReferenceShape,
    system: &mut ConstraintSystem<'_>,
    variables: &mut TypeVariableAllocator,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let origin = ConstraintOrigin::PostponedArgument(argument.index);
    let expected = system.substitute(&argument.expected);

    let mut compatible = compatible_references(shape, &expected, system, variables, origin);
    match compatible.len() {
        1 => {
            if let Some((candidate, trial, ty)) = compatible.pop() {
                debug!(reference = %shape.name, "resolved callable reference");
                *system = trial;
                argument.result = Some(PostponedResult {
                    node: shape.node,
                    ty,
                    reference: Some(candidate),
                });
            }
        }
        0 => {
            let first = shape.candidates.first();
            let ty = match first {
                Some(candidate) => instantiate_reference(candidate, shape, system, variables),
                None => Type::Error,
            };
            system.add_subtype_constraint(&ty, &expected, origin);
            if first.is_none() {
                diagnostics.push(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, shape.span)
                        .at_node(shape.node)
                        .with_argument(shape.name.clone()),
                );
            }
            argument.result = Some(PostponedResult {
                node: shape.node,
                ty: Type::Error,
                reference: None,
            });
        }
        _ => {
            let registry = system.registry();
            let names: Vec<String> = compatible
                .iter()
                .map(|(candidate, _, _)| candidate.describe(registry))
                .collect();
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::CallableReferenceResolutionAmbiguity, shape.span)
                    .at_node(shape.node)
                    .with_argument(names.join(", ")),
            );
            argument.result = Some(PostponedResult {
                node: shape.node,
                ty: Type::Error,
                reference: None,
            });
        }
    }
}

/// Reference candidates whose type fits `expected`, each with the trial
/// system it was checked in.
fn compatible_references<'r>(
    shape: &ReferenceShape,
    expected: &Type,
    system: &ConstraintSystem<'r>,
    variables: &mut TypeVariableAllocator,
    origin: ConstraintOrigin,
) -> Vec<(Arc<CallableSignature>, ConstraintSystem<'r>, Type)> {
    let mut compatible = Vec::new();
    for candidate in &shape.candidates {
        let mut trial = system.clone();
        let ty = instantiate_reference(candidate, shape, &mut trial, variables);
        let before = trial.errors().len();
        trial.add_subtype_constraint(&ty, expected, origin);
        if trial.errors().len() == before {
            compatible.push((candidate.clone(), trial, ty));
        }
    }
    compatible
}

/// Function type of a reference to `candidate`, with its type parameters
/// replaced by fresh variables registered in `system`.
fn instantiate_reference(
    candidate: &Arc<CallableSignature>,
    shape: &ReferenceShape,
    system: &mut ConstraintSystem<'_>,
    variables: &mut TypeVariableAllocator,
) -> Type {
    let receiver = &shape.receiver;
    let registry = system.registry();
    let mut substitutor = Substitutor::new();
    if let (Some(owner), ReferenceReceiver::Bound(ty) | ReferenceReceiver::Unbound(ty)) = (candidate.owner, receiver) {
        if let Some(view) = system.relations().supertype_view(&ty.make_non_null(), owner) {
            substitutor = Substitutor::for_class(registry.class(owner), view.arguments());
        }
    }
    let mut fresh = Vec::new();
    for param in &candidate.type_parameters {
        let info = registry.type_parameter(*param);
        let mut variable = variables.fresh(info.name.clone(), shape.node, shape.span);
        variable.type_parameter = Some(*param);
        substitutor.insert_parameter(*param, variable.ty());
        fresh.push(variable);
    }
    for mut variable in fresh {
        if let Some(param) = variable.type_parameter {
            variable.declared_upper_bounds = registry
                .type_parameter(param)
                .upper_bounds
                .iter()
                .map(|bound| substitutor.apply(bound))
                .collect();
        }
        system.register(variable);
    }

    let unbound = match receiver {
        ReferenceReceiver::Unbound(ty) => Some(ty.clone()),
        _ if candidate.is_extension() && matches!(receiver, ReferenceReceiver::None) => {
            candidate.extension_receiver.clone()
        }
        _ => None,
    };
    let ty = candidate.reference_type(registry, unbound.as_ref());
    if let (ReferenceReceiver::Bound(bound), Some(extension)) = (receiver, &candidate.extension_receiver) {
        let declared = substitutor.apply(extension);
        system.add_subtype_constraint(bound, &declared, ConstraintOrigin::Receiver);
    }
    substitutor.apply(&ty)
}
