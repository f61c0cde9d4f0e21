//! Subtyping, equivalence, common supertype and intersection queries.
//!
//! Relations are computed on demand from the registry; nothing is cached.
//! Type variables are only equal to themselves here, the constraint system
//! decomposes anything containing them before asking.

use crate::registry::{builtins, TypeRegistry};
use crate::substitution::Substitutor;
use crate::types::{ClassId, Type};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tern_ast::Variance;

const MAX_DEPTH: usize = 48;

#[derive(Debug, Clone, Copy)]
pub struct TypeRelations<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> TypeRelations<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    pub fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        self.subtype_at(sub, sup, 0)
    }

    pub fn is_equivalent(&self, left: &Type, right: &Type) -> bool {
        left == right || (self.is_subtype(left, right) && self.is_subtype(right, left))
    }

    /// Whether `null` is a value of `ty`.
    pub fn accepts_null(&self, ty: &Type) -> bool {
        match ty {
            Type::Error | Type::Star => true,
            other => other.is_nullable(),
        }
    }

    fn subtype_at(&self, sub: &Type, sup: &Type, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (Type::Error, _) | (_, Type::Error) | (_, Type::Star) => return true,
            (Type::Star, _) => return self.accepts_null(sup) && sup.is_class(builtins::ANY),
            _ => {}
        }
        if sub.is_nullable() && !self.accepts_null(sup) {
            return false;
        }
        if sub.is_class(builtins::NOTHING) {
            return true;
        }

        match (sub, sup) {
            (Type::Intersection(members), _) => members
                .iter()
                .any(|member| self.subtype_at(&member.with_nullability(sub.is_nullable()), sup, depth + 1)),
            (_, Type::Intersection(members)) => {
                members.iter().all(|member| self.subtype_at(sub, member, depth + 1))
            }
            (Type::Variable { var: left, .. }, Type::Variable { var: right, .. }) => left == right,
            (Type::Variable { .. }, _) | (_, Type::Variable { .. }) => false,
            (Type::Parameter { param: left, .. }, Type::Parameter { param: right, .. })
                if left == right =>
            {
                true
            }
            (Type::Parameter { param, .. }, _) => {
                let info = self.registry.type_parameter(*param);
                info.effective_bounds().iter().any(|bound| {
                    let bound = if sub.is_nullable() {
                        bound.clone()
                    } else {
                        bound.make_non_null()
                    };
                    self.subtype_at(&bound, sup, depth + 1)
                })
            }
            (_, Type::Parameter { .. }) => false,
            (
                Type::Nominal {
                    class: sub_class,
                    arguments: sub_arguments,
                    ..
                },
                Type::Nominal {
                    class: sup_class,
                    arguments: sup_arguments,
                    ..
                },
            ) => {
                if *sup_class == builtins::ANY {
                    return true;
                }
                match self.supertype_arguments(*sub_class, sub_arguments, *sup_class) {
                    Some(view) => self.arguments_match(*sup_class, &view, sup_arguments, depth),
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn arguments_match(&self, class: ClassId, sub: &[Type], sup: &[Type], depth: usize) -> bool {
        if sub.is_empty() || sup.is_empty() {
            return true;
        }
        if sub.len() != sup.len() {
            return false;
        }
        let parameters = &self.registry.class(class).type_parameters;
        sub.iter().zip(sup).enumerate().all(|(index, (sub_arg, sup_arg))| {
            if matches!(sup_arg, Type::Star) {
                return true;
            }
            if matches!(sub_arg, Type::Star) {
                return false;
            }
            let variance = parameters
                .get(index)
                .map(|param| self.registry.type_parameter(*param).variance)
                .unwrap_or(Variance::Invariant);
            match variance {
                Variance::Out => self.subtype_at(sub_arg, sup_arg, depth + 1),
                Variance::In => self.subtype_at(sup_arg, sub_arg, depth + 1),
                Variance::Invariant => {
                    self.subtype_at(sub_arg, sup_arg, depth + 1)
                        && self.subtype_at(sup_arg, sub_arg, depth + 1)
                }
            }
        })
    }

    /// Arguments of `target` as seen from `class<arguments>`, found by a
    /// breadth-first walk over the declared supertypes.
    pub fn supertype_arguments(
        &self,
        class: ClassId,
        arguments: &[Type],
        target: ClassId,
    ) -> Option<Vec<Type>> {
        if class == target {
            return Some(arguments.to_vec());
        }
        let mut queue = VecDeque::new();
        let mut visited = FxHashSet::default();
        queue.push_back((class, arguments.to_vec()));
        visited.insert(class);
        while let Some((current, current_arguments)) = queue.pop_front() {
            let info = self.registry.class(current);
            let substitutor = Substitutor::for_class(info, &current_arguments);
            for supertype in &info.supertypes {
                let Type::Nominal {
                    class: super_class,
                    arguments: super_arguments,
                    ..
                } = supertype
                else {
                    continue;
                };
                let substituted: Vec<Type> = super_arguments
                    .iter()
                    .map(|argument| substitutor.apply(argument))
                    .collect();
                if *super_class == target {
                    return Some(substituted);
                }
                if visited.insert(*super_class) {
                    queue.push_back((*super_class, substituted));
                }
            }
        }
        None
    }

    /// Supertype view of a nominal type: `List<String>` as `Iterable` is
    /// `Iterable<String>`.
    pub fn supertype_view(&self, ty: &Type, target: ClassId) -> Option<Type> {
        match ty {
            Type::Nominal {
                class,
                arguments,
                nullable,
            } => {
                let view = self.supertype_arguments(*class, arguments, target)?;
                Some(Type::Nominal {
                    class: target,
                    arguments: view,
                    nullable: *nullable,
                })
            }
            Type::Parameter { param, nullable } => {
                let info = self.registry.type_parameter(*param);
                info.upper_bounds.iter().find_map(|bound| {
                    self.supertype_view(&bound.with_nullability(*nullable || bound.is_nullable()), target)
                })
            }
            Type::Intersection(members) => members
                .iter()
                .find_map(|member| self.supertype_view(member, target)),
            _ => None,
        }
    }

    /// Least upper bound used for fixation and branch merging.
    pub fn common_supertype(&self, types: &[Type]) -> Type {
        self.common_supertype_at(types, 0)
    }

    fn common_supertype_at(&self, types: &[Type], depth: usize) -> Type {
        if types.iter().any(Type::is_error) {
            return Type::Error;
        }
        let nullable = types.iter().any(Type::is_nullable);
        let mut candidates: Vec<Type> = Vec::new();
        for ty in types {
            if ty.is_class(builtins::NOTHING) {
                continue;
            }
            let non_null = ty.make_non_null();
            if !candidates.contains(&non_null) {
                candidates.push(non_null);
            }
        }
        let result = match candidates.len() {
            0 => Type::nothing(),
            1 => candidates[0].clone(),
            _ => self.join(&candidates, depth),
        };
        result.with_nullability(nullable)
    }

    fn join(&self, candidates: &[Type], depth: usize) -> Type {
        if let Some(top) = candidates
            .iter()
            .find(|candidate| candidates.iter().all(|other| self.is_subtype(other, candidate)))
        {
            return top.clone();
        }
        if depth > 4 {
            return Type::any();
        }
        let representatives: Vec<Type> = candidates
            .iter()
            .map(|candidate| self.nominal_representative(candidate))
            .collect();
        let Some(Type::Nominal {
            class: first_class,
            arguments: first_arguments,
            ..
        }) = representatives.first()
        else {
            return Type::any();
        };

        for (class, _) in self.supertype_closure(*first_class, first_arguments) {
            if class == builtins::ANY {
                continue;
            }
            let views: Option<Vec<Vec<Type>>> = representatives
                .iter()
                .map(|representative| match representative {
                    Type::Nominal {
                        class: own, arguments, ..
                    } => self.supertype_arguments(*own, arguments, class),
                    _ => None,
                })
                .collect();
            let Some(views) = views else {
                continue;
            };
            let parameters = self.registry.class(class).type_parameters.clone();
            let arguments = parameters
                .iter()
                .enumerate()
                .map(|(index, param)| {
                    let column: Vec<Type> = views
                        .iter()
                        .map(|view| view.get(index).cloned().unwrap_or(Type::Star))
                        .collect();
                    if column.iter().all(|arg| self.is_equivalent(arg, &column[0])) {
                        column[0].clone()
                    } else if self.registry.type_parameter(*param).variance == Variance::Out
                        && !column.iter().any(|arg| matches!(arg, Type::Star))
                    {
                        self.common_supertype_at(&column, depth + 1)
                    } else {
                        Type::Star
                    }
                })
                .collect();
            return Type::generic(class, arguments);
        }
        Type::any()
    }

    fn nominal_representative(&self, ty: &Type) -> Type {
        match ty {
            Type::Nominal { .. } => ty.clone(),
            Type::Parameter { param, .. } => self
                .registry
                .type_parameter(*param)
                .upper_bounds
                .first()
                .map(|bound| self.nominal_representative(&bound.make_non_null()))
                .unwrap_or_else(Type::any),
            Type::Intersection(members) => members
                .first()
                .map(|member| self.nominal_representative(member))
                .unwrap_or_else(Type::any),
            _ => Type::any(),
        }
    }

    /// All supertypes of `class<arguments>` in breadth-first order, the class
    /// itself first.
    pub fn supertype_closure(&self, class: ClassId, arguments: &[Type]) -> Vec<(ClassId, Vec<Type>)> {
        let mut order = vec![(class, arguments.to_vec())];
        let mut visited = FxHashSet::default();
        visited.insert(class);
        let mut cursor = 0;
        while cursor < order.len() {
            let (current, current_arguments) = order[cursor].clone();
            cursor += 1;
            let info = self.registry.class(current);
            let substitutor = Substitutor::for_class(info, &current_arguments);
            for supertype in &info.supertypes {
                if let Type::Nominal {
                    class: super_class,
                    arguments: super_arguments,
                    ..
                } = supertype
                {
                    if visited.insert(*super_class) {
                        let substituted = super_arguments
                            .iter()
                            .map(|argument| substitutor.apply(argument))
                            .collect();
                        order.push((*super_class, substituted));
                    }
                }
            }
        }
        order
    }

    /// Greatest lower bound used by narrowing: the result is always a
    /// subtype of both inputs.
    pub fn intersect(&self, left: &Type, right: &Type) -> Type {
        if left.is_error() || right.is_error() {
            return Type::Error;
        }
        let nullable = left.is_nullable() && right.is_nullable();
        let left = left.with_nullability(nullable);
        let right = right.with_nullability(nullable);
        if self.is_subtype(&left, &right) {
            return left;
        }
        if self.is_subtype(&right, &left) {
            return right;
        }
        Type::intersection(vec![left, right]).with_nullability(nullable)
    }

    /// Whether the classes of two types can share a value. Used to reject
    /// casts and checks that can never succeed.
    pub fn may_overlap(&self, left: &Type, right: &Type) -> bool {
        let (Some(left_class), Some(right_class)) = (left.class_id(), right.class_id()) else {
            return true;
        };
        if self.is_subtype(&left.make_non_null(), &right.make_non_null())
            || self.is_subtype(&right.make_non_null(), &left.make_non_null())
        {
            return true;
        }
        let left_info = self.registry.class(left_class);
        let right_info = self.registry.class(right_class);
        (left_info.is_interface() && left_info.modality != tern_ast::Modality::Final)
            || (right_info.is_interface() && right_info.modality != tern_ast::Modality::Final)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeParameterOwner;
    use tern_ast::{ClassKind, Modality};

    fn registry_with_shapes() -> (TypeRegistry, ClassId, ClassId, ClassId) {
        let mut registry = TypeRegistry::with_builtins();
        let shape = registry.add_class("Shape", "demo.Shape", ClassKind::Interface, Modality::Sealed);
        let circle = registry.add_class("Circle", "demo.Circle", ClassKind::Class, Modality::Final);
        let square = registry.add_class("Square", "demo.Square", ClassKind::Class, Modality::Final);
        registry.set_supertypes(shape, vec![Type::any()]);
        registry.set_supertypes(circle, vec![Type::nominal(shape)]);
        registry.set_supertypes(square, vec![Type::nominal(shape)]);
        (registry, shape, circle, square)
    }

    #[test]
    fn nullability_and_nothing() {
        let registry = TypeRegistry::with_builtins();
        let relations = TypeRelations::new(&registry);
        assert!(relations.is_subtype(&Type::string(), &Type::string().make_nullable()));
        assert!(!relations.is_subtype(&Type::string().make_nullable(), &Type::string()));
        assert!(relations.is_subtype(&Type::null(), &Type::string().make_nullable()));
        assert!(!relations.is_subtype(&Type::null(), &Type::string()));
        assert!(relations.is_subtype(&Type::nothing(), &Type::int()));
        assert!(relations.is_subtype(&Type::int(), &Type::nullable_any()));
    }

    #[test]
    fn declaration_site_variance() {
        let registry = TypeRegistry::with_builtins();
        let relations = TypeRelations::new(&registry);
        let list_of = |ty: Type| Type::generic(builtins::LIST, vec![ty]);
        let array_of = |ty: Type| Type::generic(builtins::ARRAY, vec![ty]);
        assert!(relations.is_subtype(&list_of(Type::int()), &list_of(Type::any())));
        assert!(!relations.is_subtype(&array_of(Type::int()), &array_of(Type::any())));
        assert!(relations.is_subtype(
            &list_of(Type::string()),
            &Type::generic(builtins::ITERABLE, vec![Type::string()])
        ));
        let to_int = registry.function_type(vec![Type::any()], Type::int());
        let from_string = registry.function_type(vec![Type::string()], Type::any());
        assert!(relations.is_subtype(&to_int, &from_string));
        assert!(!relations.is_subtype(&from_string, &to_int));
    }

    #[test]
    fn common_supertype_walks_hierarchy() {
        let (registry, shape, circle, square) = registry_with_shapes();
        let relations = TypeRelations::new(&registry);
        let joined = relations.common_supertype(&[Type::nominal(circle), Type::nominal(square)]);
        assert_eq!(joined, Type::nominal(shape));
        let with_null = relations.common_supertype(&[Type::nominal(circle), Type::null()]);
        assert_eq!(with_null, Type::nominal(circle).make_nullable());
        let numbers = relations.common_supertype(&[Type::int(), Type::long()]);
        assert_eq!(numbers, Type::nominal(builtins::NUMBER));
    }

    #[test]
    fn intersect_is_subtype_of_both_sides() {
        let (registry, shape, circle, _) = registry_with_shapes();
        let relations = TypeRelations::new(&registry);
        let declared = Type::nominal(shape).make_nullable();
        let narrowed = relations.intersect(&declared, &Type::nominal(circle));
        assert_eq!(narrowed, Type::nominal(circle));
        let non_null = relations.intersect(&Type::string().make_nullable(), &Type::any());
        assert_eq!(non_null, Type::string());
        let comparable = Type::generic(builtins::COMPARABLE, vec![Type::string()]);
        let both = relations.intersect(&Type::nominal(shape), &comparable);
        assert!(relations.is_subtype(&both, &Type::nominal(shape)));
        assert!(relations.is_subtype(&both, &comparable));
    }

    #[test]
    fn type_parameters_use_their_bounds() {
        let mut registry = TypeRegistry::with_builtins();
        let t = registry.add_type_parameter("T", Variance::Invariant, TypeParameterOwner::Synthetic);
        registry.set_upper_bounds(t, vec![Type::nominal(builtins::NUMBER)]);
        let relations = TypeRelations::new(&registry);
        assert!(relations.is_subtype(&Type::parameter(t), &Type::nominal(builtins::NUMBER)));
        assert!(!relations.is_subtype(&Type::int(), &Type::parameter(t)));
        assert!(!relations.is_subtype(&Type::parameter(t).make_nullable(), &Type::any()));
    }
}
