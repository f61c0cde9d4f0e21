use super::candidate::{check_candidate, Applicability, CandidateCheck, InapplicabilityReason};
use super::mapping::MappingError;
use super::specificity::SpecificityComparator;
use super::{ArgumentValue, CallSite, CandidateGroup, ResolutionMode, ResolvedCall};
use crate::config::{AnalysisConfig, InferenceLimits, SpecificityPolicy};
use crate::constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::InferenceError;
use crate::postponed::{Completion, PostponedArgumentAnalyzer};
use crate::registry::TypeRegistry;
use crate::substitution::Substitutor;
use crate::types::Type;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Outcome of resolving one call site. Resolution problems are reported as
/// diagnostics; only cancellation is an `Err`.
#[derive(Debug)]
pub struct ResolutionOutcome<'r> {
    pub call: Option<ResolvedCall>,
    /// Result type of the call; `Error` when it did not resolve.
    pub ty: Type,
    /// Dependent mode: the unfinished system the enclosing call absorbs.
    pub system: Option<ConstraintSystem<'r>>,
    /// Values of every variable fixed while completing this call, including
    /// those absorbed from nested dependent calls.
    pub solution: Substitutor,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'r> ResolutionOutcome<'r> {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            call: None,
            ty: Type::Error,
            system: None,
            solution: Substitutor::new(),
            diagnostics,
        }
    }
}

pub struct OverloadResolver<'r> {
    registry: &'r TypeRegistry,
    limits: InferenceLimits,
    policy: SpecificityPolicy,
}

impl<'r> OverloadResolver<'r> {
    pub fn new(registry: &'r TypeRegistry, config: &AnalysisConfig) -> Self {
        Self {
            registry,
            limits: config.limits,
            policy: config.specificity.clone(),
        }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    pub fn limits(&self) -> InferenceLimits {
        self.limits
    }

    /// Resolves `site` against candidate groups ordered from the closest
    /// scope level outwards. The first group with an applicable candidate
    /// decides.
    pub fn resolve(
        &self,
        site: CallSite<'r>,
        groups: &[CandidateGroup],
        host: &mut dyn PostponedArgumentAnalyzer,
    ) -> Result<ResolutionOutcome<'r>, InferenceError> {
        let mut budget = self.limits.max_candidates;
        let mut failures: Vec<(usize, CandidateCheck<'r>)> = Vec::new();
        let mut diagnostics = Vec::new();

        for (group_index, group) in groups.iter().enumerate() {
            let mut checks = Vec::with_capacity(group.entries.len());
            for entry in &group.entries {
                if budget == 0 {
                    break;
                }
                budget -= 1;
                checks.push(check_candidate(
                    self.registry,
                    self.limits,
                    &site,
                    entry,
                    group.level,
                    host.variables(),
                ));
            }

            let (applicable, inapplicable): (Vec<_>, Vec<_>) =
                checks.into_iter().partition(CandidateCheck::is_applicable);
            if !applicable.is_empty() {
                return match self.select(applicable, &site) {
                    Ok(winner) => {
                        debug!(call = %site.name, level = ?winner.level, "resolved call");
                        self.complete(site, winner, diagnostics, host)
                    }
                    Err(tied) => {
                        let names: Vec<String> = tied
                            .iter()
                            .map(|check| check.signature.describe(self.registry))
                            .collect();
                        debug!(call = %site.name, candidates = tied.len(), "ambiguous call");
                        diagnostics.push(
                            Diagnostic::new(DiagnosticCode::OverloadResolutionAmbiguity, site.span)
                                .at_node(site.node)
                                .with_argument(names.join(", ")),
                        );
                        self.analyze_lambdas_in_error_mode(&site, host);
                        Ok(ResolutionOutcome::failed(diagnostics))
                    }
                };
            }
            failures.extend(inapplicable.into_iter().map(|check| (group_index, check)));
            if budget == 0 {
                break;
            }
        }

        let total: usize = groups.iter().map(|group| group.entries.len()).sum();
        if total > self.limits.max_candidates {
            warn!(call = %site.name, total, "candidate limit exceeded");
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::InferenceLimitExceeded, site.span)
                    .at_node(site.node)
                    .with_argument("max_candidates"),
            );
        }
        self.report_failure(site, failures, diagnostics, host)
    }

    /// Narrows applicable candidates to the single most specific one, or
    /// returns the maximal tied set.
    fn select(
        &self,
        mut applicable: Vec<CandidateCheck<'r>>,
        site: &CallSite<'r>,
    ) -> Result<CandidateCheck<'r>, Vec<CandidateCheck<'r>>> {
        if applicable
            .iter()
            .any(|check| check.applicability == Applicability::Applicable)
        {
            applicable.retain(|check| check.applicability == Applicability::Applicable);
        }
        if applicable.len() == 1 {
            return Ok(applicable.remove(0));
        }

        let comparator = SpecificityComparator::new(self.registry, &self.policy, self.limits);
        let count = applicable.len();
        let mut beats = vec![vec![false; count]; count];
        for i in 0..count {
            for j in 0..count {
                if i != j {
                    beats[i][j] = comparator.compare(&applicable[i], &applicable[j], site) == Ordering::Greater;
                }
            }
        }
        if let Some(winner) = (0..count).find(|i| (0..count).all(|j| j == *i || beats[*i][j])) {
            return Ok(applicable.swap_remove(winner));
        }
        let maximal: Vec<usize> = (0..count)
            .filter(|i| !(0..count).any(|j| beats[j][*i]))
            .collect();
        Err(applicable
            .into_iter()
            .enumerate()
            .filter(|(index, _)| maximal.contains(index))
            .map(|(_, check)| check)
            .collect())
    }

    fn complete(
        &self,
        site: CallSite<'r>,
        mut winner: CandidateCheck<'r>,
        mut diagnostics: Vec<Diagnostic>,
        host: &mut dyn PostponedArgumentAnalyzer,
    ) -> Result<ResolutionOutcome<'r>, InferenceError> {
        if let (ResolutionMode::Full, Some(expected)) = (site.mode, &site.expected_type) {
            if !winner.system.is_proper(&winner.return_type) {
                let mut trial = winner.system.clone();
                let before = trial.errors().len();
                trial.add_subtype_constraint(&winner.return_type, expected, ConstraintOrigin::ExpectedType);
                if trial.errors().len() == before {
                    winner.system = trial;
                }
            }
        }

        let completion = Completion {
            system: &mut winner.system,
            postponed: &mut winner.postponed,
            mode: site.mode,
            limits: self.limits,
        };
        diagnostics.extend(completion.run(host)?);

        for error in winner.system.take_errors() {
            diagnostics.push(self.constraint_diagnostic(&error, &site, &winner.system));
        }

        let system = &winner.system;
        let mut return_type = system.substitute(&winner.return_type);
        if let Some(receiver) = &winner.receiver {
            if receiver.safe && receiver.ty.is_nullable() {
                return_type = return_type.make_nullable();
            }
        }
        let call = ResolvedCall {
            node: site.node,
            signature: winner.signature.clone(),
            level: winner.level,
            type_arguments: winner
                .type_variables
                .iter()
                .map(|var| system.substitute(&Type::variable(*var)))
                .collect(),
            parameter_types: winner
                .parameter_types
                .iter()
                .map(|ty| system.substitute(ty))
                .collect(),
            return_type: return_type.clone(),
            argument_mapping: winner.mapping.parameter_of_argument.clone(),
            receiver: winner.receiver.as_ref().map(|receiver| receiver.ty.clone()),
            postponed: winner
                .postponed
                .iter()
                .filter_map(|argument| argument.result.clone())
                .map(|mut result| {
                    result.ty = system.substitute(&result.ty);
                    result
                })
                .collect(),
        };
        let solution = system.result_substitutor();
        let leftover = (site.mode == ResolutionMode::Dependent && !system.unfixed_variables().is_empty())
            .then(|| winner.system);
        Ok(ResolutionOutcome {
            call: Some(call),
            ty: return_type,
            system: leftover,
            solution,
            diagnostics,
        })
    }

    fn report_failure(
        &self,
        site: CallSite<'r>,
        failures: Vec<(usize, CandidateCheck<'r>)>,
        mut diagnostics: Vec<Diagnostic>,
        host: &mut dyn PostponedArgumentAnalyzer,
    ) -> Result<ResolutionOutcome<'r>, InferenceError> {
        if failures.is_empty() {
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::UnresolvedReference, site.span)
                    .at_node(site.node)
                    .with_argument(site.name.clone()),
            );
            self.analyze_lambdas_in_error_mode(&site, host);
            return Ok(ResolutionOutcome::failed(diagnostics));
        }

        let key = |(group, check): &(usize, CandidateCheck<'r>)| match &check.applicability {
            Applicability::Inapplicable(reason) => (reason.closeness(), *group),
            _ => (0, *group),
        };
        let best = failures.iter().map(key).min().unwrap_or((0, 0));
        let mut closest: Vec<CandidateCheck<'r>> = failures
            .into_iter()
            .filter(|failure| key(failure) == best)
            .map(|(_, check)| check)
            .collect();

        if closest.len() > 1 {
            let names: Vec<String> = closest
                .iter()
                .map(|check| check.signature.describe(self.registry))
                .collect();
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::NoneApplicable, site.span)
                    .at_node(site.node)
                    .with_argument(names.join(", ")),
            );
            self.analyze_lambdas_in_error_mode(&site, host);
            return Ok(ResolutionOutcome::failed(diagnostics));
        }

        let check = closest.remove(0);
        let Applicability::Inapplicable(reason) = check.applicability.clone() else {
            return self.complete(site, check, diagnostics, host);
        };
        match reason {
            InapplicabilityReason::UnsafeCall { receiver } => {
                let span = check.receiver.as_ref().map(|r| r.span).unwrap_or(site.span);
                diagnostics.push(
                    Diagnostic::new(DiagnosticCode::UnsafeCall, span)
                        .at_node(site.node)
                        .with_argument(self.registry.render(&receiver)),
                );
                self.complete(site, check, diagnostics, host)
            }
            InapplicabilityReason::Constraint(_) => self.complete(site, check, diagnostics, host),
            InapplicabilityReason::ReceiverMismatch => {
                diagnostics.push(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, site.span)
                        .at_node(site.node)
                        .with_argument(site.name.clone()),
                );
                self.analyze_lambdas_in_error_mode(&site, host);
                Ok(ResolutionOutcome::failed(diagnostics))
            }
            InapplicabilityReason::WrongNumberOfTypeArguments { expected } => {
                diagnostics.push(
                    Diagnostic::new(DiagnosticCode::WrongNumberOfTypeArguments, site.span)
                        .at_node(site.node)
                        .with_arguments([expected.to_string(), check.signature.describe(self.registry)]),
                );
                self.analyze_lambdas_in_error_mode(&site, host);
                Ok(ResolutionOutcome::failed(diagnostics))
            }
            InapplicabilityReason::Mapping(error) => {
                let (code, argument) = match error {
                    MappingError::TooManyArguments => (
                        DiagnosticCode::TooManyArguments,
                        check.signature.describe(self.registry),
                    ),
                    MappingError::NamedParameterNotFound(name) => (DiagnosticCode::NamedParameterNotFound, name),
                    MappingError::ArgumentPassedTwice(name) => (DiagnosticCode::ArgumentPassedTwice, name),
                    MappingError::MixingNamedAndPositioned => {
                        (DiagnosticCode::MixingNamedAndPositionedArguments, String::new())
                    }
                    MappingError::NoValueForParameter(name) => (DiagnosticCode::NoValueForParameter, name),
                };
                let mut diagnostic = Diagnostic::new(code, site.span).at_node(site.node);
                if !argument.is_empty() {
                    diagnostic = diagnostic.with_argument(argument);
                }
                diagnostics.push(diagnostic);
                self.analyze_lambdas_in_error_mode(&site, host);
                Ok(ResolutionOutcome::failed(diagnostics))
            }
        }
    }

    /// Lambda bodies of unresolved calls are still typed, with unknown
    /// parameter types and no expected return type.
    fn analyze_lambdas_in_error_mode(&self, site: &CallSite<'r>, host: &mut dyn PostponedArgumentAnalyzer) {
        for argument in &site.arguments {
            if let ArgumentValue::Lambda(shape) = &argument.value {
                let parameter_types: Vec<Type> = if shape.implicit_parameters {
                    vec![Type::Error]
                } else {
                    shape
                        .parameters
                        .iter()
                        .map(|parameter| parameter.ty.clone().unwrap_or(Type::Error))
                        .collect()
                };
                host.analyze_lambda(shape, &parameter_types, None);
            }
        }
    }

    fn constraint_diagnostic(
        &self,
        error: &ConstraintError,
        site: &CallSite<'r>,
        system: &ConstraintSystem<'r>,
    ) -> Diagnostic {
        let render = |ty: &Type| self.registry.render(&system.substitute(ty));
        let diagnostic = match error {
            ConstraintError::TypeMismatch {
                expected,
                actual,
                origin,
                ..
            } => {
                let span = match origin {
                    ConstraintOrigin::Argument(index) | ConstraintOrigin::PostponedArgument(index) => site
                        .arguments
                        .get(*index)
                        .map(|argument| argument.span)
                        .unwrap_or(site.span),
                    ConstraintOrigin::Receiver => site
                        .explicit_receiver
                        .as_ref()
                        .map(|receiver| receiver.span)
                        .unwrap_or(site.span),
                    _ => site.span,
                };
                Diagnostic::new(DiagnosticCode::TypeMismatch, span).with_arguments([render(expected), render(actual)])
            }
            ConstraintError::UpperBoundViolated { bound, actual, .. } => {
                Diagnostic::new(DiagnosticCode::UpperBoundViolated, site.span)
                    .with_arguments([render(bound), render(actual)])
            }
            ConstraintError::CannotInferType { variable } => {
                let name = system
                    .variable(*variable)
                    .map(|state| state.variable.name.clone())
                    .unwrap_or_else(|| format!("TypeVariable({})", variable.to_raw()));
                Diagnostic::new(DiagnosticCode::CannotInferType, site.span).with_argument(name)
            }
            ConstraintError::LimitExceeded { limit } => {
                Diagnostic::new(DiagnosticCode::InferenceLimitExceeded, site.span).with_argument(*limit)
            }
        };
        diagnostic.at_node(site.node)
    }
}
