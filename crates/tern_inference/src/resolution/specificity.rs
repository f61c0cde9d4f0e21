//! Ranking of applicable candidates by the configured specificity policy.

use super::candidate::CandidateCheck;
use super::{ArgumentValue, CallSite};
use crate::config::{InferenceLimits, SpecificityPolicy, SpecificityRule};
use crate::constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem, TypeVariableAllocator};
use crate::registry::{builtins, TypeRegistry};
use crate::types::{ClassId, Type};
use std::cmp::Ordering;
use tern_ast::NodeId;

pub struct SpecificityComparator<'a, 'r> {
    registry: &'r TypeRegistry,
    policy: &'a SpecificityPolicy,
    limits: InferenceLimits,
}

impl<'a, 'r> SpecificityComparator<'a, 'r> {
    pub fn new(registry: &'r TypeRegistry, policy: &'a SpecificityPolicy, limits: InferenceLimits) -> Self {
        Self {
            registry,
            policy,
            limits,
        }
    }

    /// `Greater` when `a` is strictly more specific than `b`. The first rule
    /// that separates the two decides.
    pub fn compare(&self, a: &CandidateCheck<'r>, b: &CandidateCheck<'r>, site: &CallSite<'r>) -> Ordering {
        for rule in &self.policy.rules {
            let ordering = match rule {
                SpecificityRule::NonExtensionOverExtension => {
                    b.signature.is_extension().cmp(&a.signature.is_extension())
                }
                SpecificityRule::FewerCoercions => b.coercions.cmp(&a.coercions),
                SpecificityRule::FewerDefaultsAndVarargs => {
                    b.defaults_and_varargs().cmp(&a.defaults_and_varargs())
                }
                SpecificityRule::ParameterSubtyping => {
                    let a_over_b = self.at_least_as_specific(a, b, site);
                    let b_over_a = self.at_least_as_specific(b, a, site);
                    match (a_over_b, b_over_a) {
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        _ => Ordering::Equal,
                    }
                }
                SpecificityRule::NonGenericOverGeneric => {
                    b.signature.is_generic().cmp(&a.signature.is_generic())
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Whether `b` accepts everything `a` accepts: `b` called with `a`'s
    /// parameter types, `a`'s type parameters kept rigid.
    fn at_least_as_specific(&self, a: &CandidateCheck<'r>, b: &CandidateCheck<'r>, site: &CallSite<'r>) -> bool {
        let mut system = ConstraintSystem::new(self.registry, self.limits);
        let mut variables = TypeVariableAllocator::new();
        let mut b_substitutor = b.class_substitutor.clone();
        for param in &b.signature.type_parameters {
            let info = self.registry.type_parameter(*param);
            let variable = variables.fresh(info.name.clone(), NodeId::new(0), site.span);
            b_substitutor.insert_parameter(*param, variable.ty());
            system.register(variable);
        }

        let mut pairs = Vec::new();
        if let (Some(a_receiver), Some(b_receiver)) = (&a.signature.extension_receiver, &b.signature.extension_receiver) {
            pairs.push((a.class_substitutor.apply(a_receiver), b_substitutor.apply(b_receiver), false));
        }
        for (index, argument) in site.arguments.iter().enumerate() {
            let (Some(a_index), Some(b_index)) = (
                a.mapping.parameter_of_argument.get(index).copied().flatten(),
                b.mapping.parameter_of_argument.get(index).copied().flatten(),
            ) else {
                continue;
            };
            if matches!(argument.value, ArgumentValue::Lambda(_)) {
                continue;
            }
            let a_type = a.class_substitutor.apply(&a.signature.parameters[a_index].ty);
            let b_type = b_substitutor.apply(&b.signature.parameters[b_index].ty);
            let literal = matches!(argument.value, ArgumentValue::IntegerLiteral(_));
            pairs.push((a_type, b_type, literal));
        }

        for (a_type, b_type, literal) in &pairs {
            let ranks = if *literal {
                (numeric_rank(a_type), numeric_rank(b_type))
            } else {
                (None, None)
            };
            match ranks {
                (Some(a_rank), Some(b_rank)) if a_type.class_id() != b_type.class_id() => {
                    if a_rank > b_rank {
                        return false;
                    }
                }
                _ => system.add_subtype_constraint(a_type, b_type, ConstraintOrigin::Argument(0)),
            }
        }
        system.fix_all();
        system
            .errors()
            .iter()
            .all(|error| matches!(error, ConstraintError::CannotInferType { .. }))
    }
}

/// Preference among the integral types an integer literal could become.
/// Only consulted for literal arguments; typed arguments go through
/// subtyping.
fn numeric_rank(ty: &Type) -> Option<u8> {
    if ty.is_nullable() {
        return None;
    }
    const ORDER: [(ClassId, u8); 4] = [
        (builtins::INT, 0),
        (builtins::LONG, 1),
        (builtins::SHORT, 2),
        (builtins::BYTE, 3),
    ];
    let class = ty.class_id()?;
    ORDER
        .iter()
        .find(|(candidate, _)| *candidate == class)
        .map(|(_, rank)| *rank)
}
