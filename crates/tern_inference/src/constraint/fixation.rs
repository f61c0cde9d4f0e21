use super::system::LiteralFit;
use super::{ConstraintError, ConstraintKind, ConstraintSystem};
use crate::registry::builtins;
use crate::types::{Type, TypeVarId};
use tracing::debug;

impl<'r> ConstraintSystem<'r> {
    /// Chooses a type for `var` from its proper bounds and re-validates every
    /// bound against it. Fixing twice returns the first result.
    pub fn fix(&mut self, var: TypeVarId) -> Type {
        let Some(state) = self.variables.get(&var) else {
            return Type::Error;
        };
        if let Some(fixed) = &state.fixed {
            return fixed.clone();
        }
        let constraints = state.constraints.clone();
        let name = state.variable.name.clone();
        let result = self.choose(var, &constraints);
        debug!(
            var = var.to_raw(),
            name = %name,
            result = %self.registry().display(&result),
            "fixed type variable"
        );
        if let Some(state) = self.variables.get_mut(&var) {
            state.fixed = Some(result.clone());
        }

        for constraint in &constraints {
            let bound = self.substitute(&constraint.ty);
            match (constraint.kind, constraint.literal) {
                (ConstraintKind::Lower, Some(value)) => {
                    if self.literal_fit(value, &result) == LiteralFit::Mismatch {
                        self.record(ConstraintError::TypeMismatch {
                            expected: result.clone(),
                            actual: bound,
                            origin: constraint.origin,
                            variable: Some(var),
                        });
                    }
                }
                (ConstraintKind::Lower, None) => self.subtype(&bound, &result, constraint.origin),
                (ConstraintKind::Upper, _) => {
                    let before = self.errors.len();
                    self.subtype(&result, &bound, constraint.origin);
                    if self.errors.len() > before && constraint.is_declared() {
                        self.errors.truncate(before);
                        self.record(ConstraintError::UpperBoundViolated {
                            variable: var,
                            bound,
                            actual: result.clone(),
                        });
                    }
                }
                (ConstraintKind::Equality, _) => self.equality(&result, &bound, constraint.origin),
            }
        }
        result
    }

    fn choose(&mut self, var: TypeVarId, constraints: &[super::Constraint]) -> Type {
        let proper = |system: &Self, ty: &Type| {
            let ty = system.substitute(ty);
            system.is_proper(&ty).then_some(ty)
        };

        if let Some(equal) = constraints
            .iter()
            .filter(|constraint| constraint.kind == ConstraintKind::Equality)
            .find_map(|constraint| proper(self, &constraint.ty))
        {
            return equal;
        }

        let uppers: Vec<(Type, bool)> = constraints
            .iter()
            .filter(|constraint| constraint.kind == ConstraintKind::Upper)
            .filter_map(|constraint| proper(self, &constraint.ty).map(|ty| (ty, constraint.is_declared())))
            .collect();

        let literals: Vec<i64> = constraints
            .iter()
            .filter(|constraint| constraint.kind == ConstraintKind::Lower)
            .filter_map(|constraint| constraint.literal)
            .collect();
        let mut lowers: Vec<Type> = constraints
            .iter()
            .filter(|constraint| constraint.kind == ConstraintKind::Lower && constraint.literal.is_none())
            .filter_map(|constraint| proper(self, &constraint.ty))
            .collect();

        if !literals.is_empty() {
            if lowers.is_empty() {
                return self.literal_type(&literals, &uppers);
            }
            for value in &literals {
                lowers.push(Type::nominal(builtins::default_literal_class(*value)));
            }
        }
        if !lowers.is_empty() {
            return self.relations.common_supertype(&lowers);
        }

        if uppers.iter().any(|(_, declared)| !declared) {
            let mut result: Option<Type> = None;
            for (upper, _) in &uppers {
                result = Some(match result {
                    Some(current) => self.relations.intersect(&current, upper),
                    None => upper.clone(),
                });
            }
            if let Some(result) = result {
                return result;
            }
        }

        self.record(ConstraintError::CannotInferType { variable: var });
        Type::Error
    }

    /// Integer literals take the integral type of a proper upper bound when
    /// every value fits it, otherwise `Int` or `Long` by magnitude.
    fn literal_type(&self, literals: &[i64], uppers: &[(Type, bool)]) -> Type {
        for (upper, _) in uppers {
            if let Some(class) = upper.class_id() {
                if builtins::is_integral(class)
                    && literals.iter().all(|value| builtins::literal_fits(*value, class))
                {
                    return Type::nominal(class);
                }
            }
        }
        let needs_long = literals
            .iter()
            .any(|value| builtins::default_literal_class(*value) == builtins::LONG);
        if needs_long {
            Type::long()
        } else {
            Type::int()
        }
    }

    /// Whether some bound of `var` is usable for fixation right now.
    pub fn has_proper_bound(&self, var: TypeVarId) -> bool {
        self.variables.get(&var).is_some_and(|state| {
            state.constraints.iter().any(|constraint| {
                constraint.literal.is_some()
                    || (!constraint.is_declared() && self.is_proper(&constraint.ty))
            })
        })
    }

    /// Whether a bound of `var` still mentions another unfixed variable.
    pub fn depends_on_unfixed(&self, var: TypeVarId) -> bool {
        self.variables.get(&var).is_some_and(|state| {
            state.constraints.iter().any(|constraint| {
                constraint
                    .ty
                    .variables()
                    .iter()
                    .any(|other| *other != var && !self.is_fixed(*other))
            })
        })
    }

    /// Variables constrained only through the call's return type.
    pub fn is_return_only(&self, var: TypeVarId) -> bool {
        self.return_variables.contains(&var)
            && self.variables.get(&var).is_some_and(|state| {
                state.constraints.iter().all(|constraint| {
                    matches!(
                        constraint.origin,
                        super::ConstraintOrigin::ExpectedType | super::ConstraintOrigin::DeclaredUpperBound
                    )
                })
            })
    }

    /// Picks the next variable to fix. Variables in `blocked` are skipped.
    /// Order: has a proper bound, is in `preferred` (inputs of pending
    /// lambdas), is independent of other unfixed variables, is not
    /// return-only, then lowest id.
    pub fn next_ready_variable(&self, blocked: &[TypeVarId], preferred: &[TypeVarId]) -> Option<TypeVarId> {
        self.variables
            .iter()
            .filter(|(id, state)| state.fixed.is_none() && !blocked.contains(id))
            .map(|(id, _)| *id)
            .min_by_key(|id| {
                (
                    !self.has_proper_bound(*id),
                    !preferred.contains(id),
                    self.depends_on_unfixed(*id),
                    self.is_return_only(*id),
                    *id,
                )
            })
    }

    /// Fixes every remaining variable in readiness order.
    pub fn fix_all(&mut self) {
        while let Some(var) = self.next_ready_variable(&[], &[]) {
            self.fix(var);
        }
    }
}
