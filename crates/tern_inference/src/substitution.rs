//! Substitution of type parameters and type variables.

use crate::registry::ClassInfo;
use crate::types::{Type, TypeParamId, TypeVarId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutor {
    parameters: FxHashMap<TypeParamId, Type>,
    variables: FxHashMap<TypeVarId, Type>,
}

impl Substitutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the class's own type parameters to `arguments`. Star arguments
    /// map to the nullable top type.
    pub fn for_class(info: &ClassInfo, arguments: &[Type]) -> Self {
        let mut substitutor = Substitutor::new();
        for (param, argument) in info.type_parameters.iter().zip(arguments) {
            let value = match argument {
                Type::Star => Type::nullable_any(),
                other => other.clone(),
            };
            substitutor.insert_parameter(*param, value);
        }
        substitutor
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.variables.is_empty()
    }

    pub fn insert_parameter(&mut self, param: TypeParamId, ty: Type) {
        self.parameters.insert(param, ty);
    }

    pub fn insert_variable(&mut self, var: TypeVarId, ty: Type) {
        self.variables.insert(var, ty);
    }

    pub fn parameter(&self, param: TypeParamId) -> Option<&Type> {
        self.parameters.get(&param)
    }

    pub fn variable(&self, var: TypeVarId) -> Option<&Type> {
        self.variables.get(&var)
    }

    /// Extends `self` with every mapping of `other`; existing entries win.
    pub fn merge(&mut self, other: &Substitutor) {
        for (param, ty) in &other.parameters {
            self.parameters.entry(*param).or_insert_with(|| ty.clone());
        }
        for (var, ty) in &other.variables {
            self.variables.entry(*var).or_insert_with(|| ty.clone());
        }
    }

    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }
        match ty {
            Type::Parameter { param, nullable } => match self.parameters.get(param) {
                Some(value) => nullable_union(value, *nullable),
                None => ty.clone(),
            },
            Type::Variable { var, nullable } => match self.variables.get(var) {
                Some(value) => nullable_union(value, *nullable),
                None => ty.clone(),
            },
            Type::Nominal {
                class,
                arguments,
                nullable,
            } => Type::Nominal {
                class: *class,
                arguments: arguments.iter().map(|argument| self.apply(argument)).collect(),
                nullable: *nullable,
            },
            Type::Intersection(members) => {
                let nullable = ty.is_nullable();
                Type::intersection(members.iter().map(|member| self.apply(member)))
                    .with_nullability(nullable)
            }
            Type::Error | Type::Star => ty.clone(),
        }
    }
}

/// `T?` with `T := String` is `String?`; `T` with `T := String?` stays
/// `String?`.
fn nullable_union(value: &Type, nullable: bool) -> Type {
    if nullable {
        value.make_nullable()
    } else {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtins;

    #[test]
    fn substitution_preserves_nullability_marks() {
        let t = TypeParamId::new(0);
        let mut substitutor = Substitutor::new();
        substitutor.insert_parameter(t, Type::string());
        let nullable_t = Type::parameter(t).make_nullable();
        assert_eq!(substitutor.apply(&nullable_t), Type::string().make_nullable());

        substitutor.insert_parameter(t, Type::string().make_nullable());
        assert_eq!(substitutor.apply(&Type::parameter(t)), Type::string().make_nullable());
    }

    #[test]
    fn substitution_descends_into_arguments() {
        let v = TypeVarId::new(7);
        let mut substitutor = Substitutor::new();
        substitutor.insert_variable(v, Type::int());
        let list = Type::generic(builtins::LIST, vec![Type::variable(v)]);
        assert_eq!(
            substitutor.apply(&list),
            Type::generic(builtins::LIST, vec![Type::int()])
        );
    }
}
