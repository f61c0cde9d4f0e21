//! Checking one candidate against a call site in its own constraint system.

use super::mapping::{map_arguments, ArgumentMapping, MappingError};
use super::{ArgumentValue, CallSite, CandidateEntry, ReceiverArgument, ScopeLevel};
use crate::config::InferenceLimits;
use crate::constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem, LiteralFit, TypeVariableAllocator};
use crate::postponed::PostponedArgument;
use crate::registry::{builtins, TypeRegistry};
use crate::signature::CallableSignature;
use crate::substitution::Substitutor;
use crate::types::{Type, TypeVarId};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum InapplicabilityReason {
    /// Nullable receiver without `?.`; the call still resolves.
    UnsafeCall { receiver: Type },
    Constraint(ConstraintError),
    ReceiverMismatch,
    WrongNumberOfTypeArguments { expected: usize },
    Mapping(MappingError),
}

impl InapplicabilityReason {
    /// How close the candidate came to being applicable; lower is closer.
    pub fn closeness(&self) -> u8 {
        match self {
            InapplicabilityReason::UnsafeCall { .. } => 0,
            InapplicabilityReason::Constraint(_) => 1,
            InapplicabilityReason::ReceiverMismatch => 2,
            InapplicabilityReason::WrongNumberOfTypeArguments { .. } => 3,
            InapplicabilityReason::Mapping(_) => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applicability {
    Applicable,
    ApplicableWithCoercion,
    Inapplicable(InapplicabilityReason),
}

impl Applicability {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Applicability::Inapplicable(_))
    }
}

#[derive(Debug, Clone)]
pub struct CandidateCheck<'r> {
    pub signature: Arc<CallableSignature>,
    pub level: ScopeLevel,
    pub system: ConstraintSystem<'r>,
    /// Class parameters of the dispatch receiver mapped to its arguments.
    pub class_substitutor: Substitutor,
    /// `class_substitutor` plus the candidate's own parameters mapped to
    /// fresh variables.
    pub substitutor: Substitutor,
    pub type_variables: Vec<TypeVarId>,
    pub receiver: Option<ReceiverArgument>,
    pub mapping: ArgumentMapping,
    pub parameter_types: Vec<Type>,
    pub return_type: Type,
    pub postponed: Vec<PostponedArgument>,
    pub coercions: usize,
    pub applicability: Applicability,
}

impl<'r> CandidateCheck<'r> {
    pub fn is_applicable(&self) -> bool {
        self.applicability.is_applicable()
    }

    pub fn defaults_and_varargs(&self) -> usize {
        self.mapping.defaults_used() + self.mapping.varargs_used(&self.signature.parameters)
    }

    fn fail(mut self, reason: InapplicabilityReason) -> Self {
        self.applicability = Applicability::Inapplicable(reason);
        self
    }
}

pub(super) fn check_candidate<'r>(
    registry: &'r TypeRegistry,
    limits: InferenceLimits,
    site: &CallSite<'r>,
    entry: &CandidateEntry,
    level: ScopeLevel,
    variables: &mut TypeVariableAllocator,
) -> CandidateCheck<'r> {
    let signature = entry.signature.clone();
    let mut check = CandidateCheck {
        signature: signature.clone(),
        level,
        system: ConstraintSystem::new(registry, limits),
        class_substitutor: Substitutor::new(),
        substitutor: Substitutor::new(),
        type_variables: Vec::new(),
        receiver: None,
        mapping: ArgumentMapping::default(),
        parameter_types: Vec::new(),
        return_type: Type::Error,
        postponed: Vec::new(),
        coercions: 0,
        applicability: Applicability::Applicable,
    };

    if !site.type_arguments.is_empty() && site.type_arguments.len() != signature.type_parameters.len() {
        let expected = signature.type_parameters.len();
        return check.fail(InapplicabilityReason::WrongNumberOfTypeArguments { expected });
    }

    let mapping = match map_arguments(&signature.parameters, &site.arguments) {
        Ok(mapping) => mapping,
        Err(error) => return check.fail(InapplicabilityReason::Mapping(error)),
    };
    check.mapping = mapping;

    // Receiver and class-level substitution.
    let needs_receiver = signature.dispatch_receiver.is_some() || signature.extension_receiver.is_some();
    let receiver = site.explicit_receiver.clone().or_else(|| {
        entry.implicit_receiver.clone().map(|ty| ReceiverArgument {
            ty,
            safe: false,
            span: site.span,
        })
    });
    let mut unsafe_receiver = None;
    let mut receiver_value = None;
    match (&receiver, needs_receiver) {
        (None, false) => {}
        (Some(_), false) | (None, true) => return check.fail(InapplicabilityReason::ReceiverMismatch),
        (Some(argument), true) => {
            let mut value = if argument.safe {
                argument.ty.make_non_null()
            } else {
                argument.ty.clone()
            };
            let accepts_null = signature
                .extension_receiver
                .as_ref()
                .is_some_and(|receiver| receiver.is_nullable());
            if value.is_nullable() && !accepts_null {
                unsafe_receiver = Some(argument.ty.clone());
                value = value.make_non_null();
            }
            if let (Some(owner), Some(_)) = (signature.owner, &signature.dispatch_receiver) {
                let relations = check.system.relations();
                let Some(view) = relations.supertype_view(&value.make_non_null(), owner) else {
                    return check.fail(InapplicabilityReason::ReceiverMismatch);
                };
                check.class_substitutor = Substitutor::for_class(registry.class(owner), view.arguments());
            }
            receiver_value = Some(value);
        }
    }
    check.receiver = receiver;

    // One fresh variable per type parameter, then their declared bounds.
    let mut substitutor = check.class_substitutor.clone();
    let mut fresh = Vec::with_capacity(signature.type_parameters.len());
    for param in &signature.type_parameters {
        let info = registry.type_parameter(*param);
        let mut variable = variables.fresh(info.name.clone(), site.node, site.span);
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
        check.type_variables.push(check.system.register(variable));
    }
    check.substitutor = substitutor;

    for (variable, argument) in check.type_variables.iter().zip(&site.type_arguments) {
        check
            .system
            .add_equality_constraint(&Type::variable(*variable), argument, ConstraintOrigin::ExplicitTypeArgument);
    }

    if let (Some(value), Some(extension)) = (&receiver_value, &signature.extension_receiver) {
        let declared = check.substitutor.apply(extension);
        let before = check.system.errors().len();
        check
            .system
            .add_subtype_constraint(value, &declared, ConstraintOrigin::Receiver);
        if check.system.errors().len() > before {
            return check.fail(InapplicabilityReason::ReceiverMismatch);
        }
    }

    check.parameter_types = signature
        .parameters
        .iter()
        .map(|parameter| check.substitutor.apply(&parameter.ty))
        .collect();

    for (index, argument) in site.arguments.iter().enumerate() {
        let Some(parameter_index) = check.mapping.parameter_of_argument[index] else {
            continue;
        };
        let parameter = &signature.parameters[parameter_index];
        let mut expected = check.parameter_types[parameter_index].clone();
        if parameter.is_vararg && argument.spread {
            expected = Type::generic(builtins::ARRAY, vec![expected]);
        }
        let origin = ConstraintOrigin::Argument(index);
        match &argument.value {
            ArgumentValue::Typed { ty, nested } => {
                if let Some(nested) = nested {
                    check.system.absorb((**nested).clone());
                }
                check.system.add_subtype_constraint(ty, &expected, origin);
            }
            ArgumentValue::IntegerLiteral(value) => {
                if check.system.add_integer_literal(*value, &expected, origin) == LiteralFit::Coerced {
                    check.coercions += 1;
                }
            }
            ArgumentValue::Lambda(shape) => {
                let postponed = PostponedArgument::lambda(index, shape.clone(), expected, &mut check.system, variables);
                check.postponed.push(postponed);
            }
            ArgumentValue::CallableReference(shape) => {
                let postponed = PostponedArgument::reference(index, shape.clone(), expected);
                if let Some(error) = postponed.reference_mismatch(&check.system, variables) {
                    return check.fail(InapplicabilityReason::Constraint(error));
                }
                check.postponed.push(postponed);
            }
        }
    }

    check.return_type = check.substitutor.apply(&signature.return_type);
    check.system.mark_return_type(&check.return_type);

    if let Some(error) = check
        .system
        .errors()
        .iter()
        .min_by_key(|error| error.rank())
        .cloned()
    {
        return check.fail(InapplicabilityReason::Constraint(error));
    }
    if let Some(receiver) = unsafe_receiver {
        return check.fail(InapplicabilityReason::UnsafeCall { receiver });
    }
    if check.coercions > 0 {
        check.applicability = Applicability::ApplicableWithCoercion;
    }
    check
}
