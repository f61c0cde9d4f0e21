use super::{Constraint, ConstraintError, ConstraintKind, ConstraintOrigin, TypeVariable};
use crate::config::InferenceLimits;
use crate::registry::{builtins, TypeRegistry};
use crate::relations::TypeRelations;
use crate::substitution::Substitutor;
use crate::types::{Type, TypeVarId};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tern_ast::Variance;
use tracing::trace;

/// Incorporation recursion guard; deeper chains only arise from recursive
/// generic bounds and are cut off silently.
const MAX_INCORPORATION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    pub variable: TypeVariable,
    pub constraints: Vec<Constraint>,
    pub fixed: Option<Type>,
}

/// How an integer literal related to the type it was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralFit {
    /// The literal keeps its default type or flows into a variable.
    Exact,
    /// The literal becomes a narrower or wider integral type.
    Coerced,
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct ConstraintSystem<'r> {
    pub(super) relations: TypeRelations<'r>,
    pub(super) variables: BTreeMap<TypeVarId, VariableState>,
    pub(super) errors: Vec<ConstraintError>,
    pub(super) return_variables: FxHashSet<TypeVarId>,
    pub(super) limits: InferenceLimits,
    pub(super) constraint_count: usize,
    depth: usize,
}

impl<'r> ConstraintSystem<'r> {
    pub fn new(registry: &'r TypeRegistry, limits: InferenceLimits) -> Self {
        Self {
            relations: TypeRelations::new(registry),
            variables: BTreeMap::new(),
            errors: Vec::new(),
            return_variables: FxHashSet::default(),
            limits,
            constraint_count: 0,
            depth: 0,
        }
    }

    pub fn relations(&self) -> TypeRelations<'r> {
        self.relations
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.relations.registry()
    }

    /// Adds a variable and its declared upper bounds.
    pub fn register(&mut self, variable: TypeVariable) -> TypeVarId {
        let id = variable.id;
        if self.variables.len() >= self.limits.max_type_variables {
            self.record(ConstraintError::LimitExceeded {
                limit: "max_type_variables",
            });
        }
        let bounds = variable.declared_upper_bounds.clone();
        self.variables.insert(
            id,
            VariableState {
                variable,
                constraints: Vec::new(),
                fixed: None,
            },
        );
        for bound in bounds {
            if bound != Type::nullable_any() {
                self.add_bound(id, ConstraintKind::Upper, bound, ConstraintOrigin::DeclaredUpperBound, None);
            }
        }
        id
    }

    pub fn variable(&self, id: TypeVarId) -> Option<&VariableState> {
        self.variables.get(&id)
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = TypeVarId> + '_ {
        self.variables.keys().copied()
    }

    pub fn contains(&self, id: TypeVarId) -> bool {
        self.variables.contains_key(&id)
    }

    pub fn is_fixed(&self, id: TypeVarId) -> bool {
        self.variables
            .get(&id)
            .map(|state| state.fixed.is_some())
            .unwrap_or(true)
    }

    pub fn unfixed_variables(&self) -> Vec<TypeVarId> {
        self.variables
            .iter()
            .filter(|(_, state)| state.fixed.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_count
    }

    pub fn errors(&self) -> &[ConstraintError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<ConstraintError> {
        std::mem::take(&mut self.errors)
    }

    pub fn limit_exceeded(&self) -> bool {
        self.errors
            .iter()
            .any(|error| matches!(error, ConstraintError::LimitExceeded { .. }))
    }

    pub(super) fn record(&mut self, error: ConstraintError) {
        if !self.errors.contains(&error) {
            trace!(?error, "constraint error");
            self.errors.push(error);
        }
    }

    pub(crate) fn record_limit(&mut self, limit: &'static str) {
        self.record(ConstraintError::LimitExceeded { limit });
    }

    /// Fixes `var` to `Error` without reporting; used once a dependent
    /// diagnostic was already emitted.
    pub fn mark_unresolvable(&mut self, var: TypeVarId) {
        if let Some(state) = self.variables.get_mut(&var) {
            state.fixed.get_or_insert(Type::Error);
        }
    }

    /// Records the variables of the outer call's return type.
    pub fn mark_return_type(&mut self, ty: &Type) {
        for var in ty.variables() {
            if self.variables.contains_key(&var) {
                self.return_variables.insert(var);
            }
        }
    }

    pub fn is_return_variable(&self, id: TypeVarId) -> bool {
        self.return_variables.contains(&id)
    }

    /// Replaces fixed variables by their values.
    pub fn substitute(&self, ty: &Type) -> Type {
        if !ty.has_variables() {
            return ty.clone();
        }
        self.result_substitutor().apply(ty)
    }

    /// A type is proper once it mentions no unfixed variable.
    pub fn is_proper(&self, ty: &Type) -> bool {
        ty.variables().iter().all(|var| self.is_fixed(*var))
    }

    pub fn result_substitutor(&self) -> Substitutor {
        let mut substitutor = Substitutor::new();
        for (id, state) in &self.variables {
            if let Some(fixed) = &state.fixed {
                substitutor.insert_variable(*id, fixed.clone());
            }
        }
        substitutor
    }

    /// Moves the variables, bounds and errors of a nested call's system into
    /// this one.
    pub fn absorb(&mut self, other: ConstraintSystem<'r>) {
        self.constraint_count += other.constraint_count;
        for (id, state) in other.variables {
            self.variables.entry(id).or_insert(state);
        }
        for error in other.errors {
            self.record(error);
        }
        if self.variables.len() > self.limits.max_type_variables {
            self.record(ConstraintError::LimitExceeded {
                limit: "max_type_variables",
            });
        }
    }

    pub fn add_subtype_constraint(&mut self, sub: &Type, sup: &Type, origin: ConstraintOrigin) {
        let sub = self.substitute(sub);
        let sup = self.substitute(sup);
        self.subtype(&sub, &sup, origin);
    }

    pub fn add_equality_constraint(&mut self, left: &Type, right: &Type, origin: ConstraintOrigin) {
        let left = self.substitute(left);
        let right = self.substitute(right);
        self.equality(&left, &right, origin);
    }

    /// Checks an integer literal against `expected`, adding a literal lower
    /// bound when `expected` is an unfixed variable.
    pub fn add_integer_literal(&mut self, value: i64, expected: &Type, origin: ConstraintOrigin) -> LiteralFit {
        let expected = self.substitute(expected);
        let default = Type::nominal(builtins::default_literal_class(value));
        match &expected {
            Type::Error => LiteralFit::Exact,
            Type::Variable { var, .. } if !self.is_fixed(*var) => {
                self.add_bound(*var, ConstraintKind::Lower, default, origin, Some(value));
                LiteralFit::Exact
            }
            _ if self.is_proper(&expected) => match self.literal_fit(value, &expected) {
                LiteralFit::Mismatch => {
                    self.record(ConstraintError::TypeMismatch {
                        expected: expected.clone(),
                        actual: default,
                        origin,
                        variable: None,
                    });
                    LiteralFit::Mismatch
                }
                fit => fit,
            },
            _ => {
                let before = self.errors.len();
                self.subtype(&default, &expected, origin);
                if self.errors.len() > before {
                    LiteralFit::Mismatch
                } else {
                    LiteralFit::Exact
                }
            }
        }
    }

    pub(super) fn literal_fit(&self, value: i64, expected: &Type) -> LiteralFit {
        if expected.is_error() {
            return LiteralFit::Exact;
        }
        let default_class = builtins::default_literal_class(value);
        if let Some(class) = expected.class_id() {
            if builtins::is_integral(class) {
                return if !builtins::literal_fits(value, class) {
                    LiteralFit::Mismatch
                } else if class == default_class {
                    LiteralFit::Exact
                } else {
                    LiteralFit::Coerced
                };
            }
        }
        if self.relations.is_subtype(&Type::nominal(default_class), expected) {
            LiteralFit::Exact
        } else {
            LiteralFit::Mismatch
        }
    }

    fn mismatch(&mut self, sub: &Type, sup: &Type, origin: ConstraintOrigin, variable: Option<TypeVarId>) {
        let error = match (origin, variable) {
            (ConstraintOrigin::DeclaredUpperBound, Some(variable)) => ConstraintError::UpperBoundViolated {
                variable,
                bound: sup.clone(),
                actual: sub.clone(),
            },
            _ => ConstraintError::TypeMismatch {
                expected: sup.clone(),
                actual: sub.clone(),
                origin,
                variable,
            },
        };
        self.record(error);
    }

    /// Decomposes `sub <: sup` into bounds on variables or checks it directly
    /// when both sides are proper. Arguments must already be substituted.
    pub(super) fn subtype(&mut self, sub: &Type, sup: &Type, origin: ConstraintOrigin) {
        if sub == sup || sub.is_error() || sup.is_error() || matches!(sup, Type::Star) {
            return;
        }
        if !sub.has_variables() && !sup.has_variables() {
            if !self.relations.is_subtype(sub, sup) {
                self.mismatch(sub, sup, origin, None);
            }
            return;
        }

        if let Type::Variable { var, nullable } = sub {
            if *nullable && !sup.has_variables() && !self.relations.accepts_null(sup) {
                self.mismatch(sub, sup, origin, Some(*var));
                return;
            }
            self.add_bound(*var, ConstraintKind::Upper, sup.clone(), origin, None);
            if let Type::Variable { var: other, .. } = sup {
                let lower = sub.with_nullability(sub.is_nullable() && !sup.is_nullable());
                self.add_bound(*other, ConstraintKind::Lower, lower, origin, None);
            }
            return;
        }
        if let Type::Variable { var, nullable } = sup {
            let lower = if *nullable { sub.make_non_null() } else { sub.clone() };
            self.add_bound(*var, ConstraintKind::Lower, lower, origin, None);
            return;
        }

        if let Type::Intersection(members) = sup {
            for member in members {
                self.subtype(sub, &member.with_nullability(sup.is_nullable() || member.is_nullable()), origin);
            }
            return;
        }
        if sub.is_nullable() && !self.relations.accepts_null(sup) {
            self.mismatch(sub, sup, origin, None);
            return;
        }
        if sub.is_class(builtins::NOTHING) || sup.is_class(builtins::ANY) {
            return;
        }

        let Type::Nominal {
            class: sup_class,
            arguments: sup_arguments,
            ..
        } = sup
        else {
            self.mismatch(sub, sup, origin, None);
            return;
        };
        let Some(view) = self.relations.supertype_view(&sub.make_non_null(), *sup_class) else {
            self.mismatch(sub, sup, origin, None);
            return;
        };
        let view_arguments = view.arguments().to_vec();
        if view_arguments.len() != sup_arguments.len() {
            if !view_arguments.is_empty() && !sup_arguments.is_empty() {
                self.mismatch(sub, sup, origin, None);
            }
            return;
        }
        let registry = self.relations.registry();
        let parameters = registry.class(*sup_class).type_parameters.clone();
        for (index, (sub_argument, sup_argument)) in view_arguments.iter().zip(sup_arguments).enumerate() {
            if matches!(sup_argument, Type::Star) {
                continue;
            }
            let variance = parameters
                .get(index)
                .map(|param| registry.type_parameter(*param).variance)
                .unwrap_or(Variance::Invariant);
            let sub_argument = match sub_argument {
                Type::Star => Type::nullable_any(),
                other => other.clone(),
            };
            match variance {
                Variance::Out => self.subtype(&sub_argument, sup_argument, origin),
                Variance::In => self.subtype(sup_argument, &sub_argument, origin),
                Variance::Invariant => self.equality(&sub_argument, sup_argument, origin),
            }
        }
    }

    pub(super) fn equality(&mut self, left: &Type, right: &Type, origin: ConstraintOrigin) {
        if left == right || left.is_error() || right.is_error() {
            return;
        }
        match (left, right) {
            (Type::Variable { var, nullable }, other) | (other, Type::Variable { var, nullable }) => {
                let value = if *nullable {
                    if !other.is_nullable() && !other.has_variables() {
                        self.mismatch(other, &Type::variable(*var).make_nullable(), origin, Some(*var));
                        return;
                    }
                    other.make_non_null()
                } else {
                    other.clone()
                };
                self.add_bound(*var, ConstraintKind::Equality, value, origin, None);
            }
            (
                Type::Nominal {
                    class: left_class,
                    arguments: left_arguments,
                    nullable: left_nullable,
                },
                Type::Nominal {
                    class: right_class,
                    arguments: right_arguments,
                    nullable: right_nullable,
                },
            ) if left_class == right_class
                && left_nullable == right_nullable
                && left_arguments.len() == right_arguments.len() =>
            {
                for (left_argument, right_argument) in left_arguments.iter().zip(right_arguments) {
                    if matches!(left_argument, Type::Star) || matches!(right_argument, Type::Star) {
                        if left_argument != right_argument {
                            self.mismatch(left, right, origin, None);
                        }
                        continue;
                    }
                    self.equality(left_argument, right_argument, origin);
                }
            }
            _ => {
                self.subtype(left, right, origin);
                self.subtype(right, left, origin);
            }
        }
    }

    /// Records a bound on `var` and incorporates it against the existing
    /// bounds of the same variable.
    pub(super) fn add_bound(
        &mut self,
        var: TypeVarId,
        kind: ConstraintKind,
        ty: Type,
        origin: ConstraintOrigin,
        literal: Option<i64>,
    ) {
        let Some(state) = self.variables.get(&var) else {
            return;
        };
        if let Some(fixed) = state.fixed.clone() {
            match (kind, literal) {
                (ConstraintKind::Lower, Some(value)) => {
                    if self.literal_fit(value, &fixed) == LiteralFit::Mismatch {
                        self.mismatch(&ty, &fixed, origin, Some(var));
                    }
                }
                (ConstraintKind::Lower, None) => {
                    let ty = self.substitute(&ty);
                    self.subtype(&ty, &fixed, origin);
                }
                (ConstraintKind::Upper, _) => {
                    let ty = self.substitute(&ty);
                    self.subtype(&fixed, &ty, origin);
                }
                (ConstraintKind::Equality, _) => {
                    let ty = self.substitute(&ty);
                    self.equality(&fixed, &ty, origin);
                }
            }
            return;
        }
        if ty == Type::variable(var) {
            return;
        }
        if state
            .constraints
            .iter()
            .any(|existing| existing.kind == kind && existing.ty == ty && existing.literal == literal)
        {
            return;
        }
        if self.constraint_count >= self.limits.max_constraints {
            self.record(ConstraintError::LimitExceeded {
                limit: "max_constraints",
            });
            return;
        }
        if self.depth >= MAX_INCORPORATION_DEPTH {
            return;
        }

        let existing = state.constraints.clone();
        let constraint = Constraint {
            kind,
            ty: ty.clone(),
            origin,
            literal,
        };
        trace!(var = var.to_raw(), ?kind, ?origin, "add bound");
        if let Some(state) = self.variables.get_mut(&var) {
            state.constraints.push(constraint.clone());
        }
        self.constraint_count += 1;

        self.depth += 1;
        for other in &existing {
            self.incorporate(var, &constraint, other);
        }
        self.depth -= 1;
    }

    fn incorporate(&mut self, var: TypeVarId, new: &Constraint, other: &Constraint) {
        let origin = new.origin.most_specific(other.origin);
        let (lower, upper) = match (new.kind, other.kind) {
            (ConstraintKind::Lower, ConstraintKind::Upper | ConstraintKind::Equality) => (new, other),
            (ConstraintKind::Upper | ConstraintKind::Equality, ConstraintKind::Lower) => (other, new),
            (ConstraintKind::Equality, ConstraintKind::Upper) => (new, other),
            (ConstraintKind::Upper, ConstraintKind::Equality) => (other, new),
            (ConstraintKind::Equality, ConstraintKind::Equality) => {
                let left = self.substitute(&new.ty);
                let right = self.substitute(&other.ty);
                self.equality(&left, &right, origin);
                return;
            }
            (ConstraintKind::Lower, ConstraintKind::Lower) | (ConstraintKind::Upper, ConstraintKind::Upper) => {
                return;
            }
        };
        let upper_ty = self.substitute(&upper.ty);
        match lower.literal {
            Some(value) => match &upper_ty {
                Type::Variable { var: other_var, .. } if !self.is_fixed(*other_var) => {
                    self.add_bound(*other_var, ConstraintKind::Lower, lower.ty.clone(), origin, Some(value));
                }
                _ if self.is_proper(&upper_ty) => {
                    if self.literal_fit(value, &upper_ty) == LiteralFit::Mismatch {
                        self.mismatch(&lower.ty, &upper_ty, origin, Some(var));
                    }
                }
                _ => self.subtype(&lower.ty, &upper_ty, origin),
            },
            None => {
                let lower_ty = self.substitute(&lower.ty);
                let before = self.errors.len();
                self.subtype(&lower_ty, &upper_ty, origin);
                if self.errors.len() > before {
                    let explicit_against_declared = upper.origin == ConstraintOrigin::DeclaredUpperBound
                        && lower.origin == ConstraintOrigin::ExplicitTypeArgument;
                    if explicit_against_declared {
                        self.errors.truncate(before);
                        self.record(ConstraintError::UpperBoundViolated {
                            variable: var,
                            bound: upper_ty,
                            actual: lower_ty,
                        });
                    } else if let Some(ConstraintError::TypeMismatch { variable, .. }) = self.errors.last_mut() {
                        variable.get_or_insert(var);
                    }
                }
            }
        }
    }
}
