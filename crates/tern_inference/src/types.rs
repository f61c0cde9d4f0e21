//! Immutable type representation shared by inference, resolution and flow
//! analysis.
//!
//! Classes and type parameters are referenced by arena indices into the
//! [`TypeRegistry`](crate::registry::TypeRegistry), which lets hierarchies and
//! bounds refer to each other cyclically (`T : Comparable<T>`). Type variables
//! only exist inside a constraint system and disappear once fixed.

use crate::registry::builtins;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Creates an identifier from its raw numeric representation.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the raw numeric identifier.
            pub const fn to_raw(self) -> u32 {
                self.0
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of a class, interface, object or enum in the registry.
    ClassId
);
arena_id!(
    /// Index of a declared type parameter (class or callable level).
    TypeParamId
);
arena_id!(
    /// Type variable allocated for one call's constraint system.
    TypeVarId
);
arena_id!(
    /// Callable declaration: function, constructor, property or local value.
    DeclId
);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Nominal {
        class: ClassId,
        arguments: Vec<Type>,
        nullable: bool,
    },
    Parameter {
        param: TypeParamId,
        nullable: bool,
    },
    Variable {
        var: TypeVarId,
        nullable: bool,
    },
    /// Sorted, deduplicated members; never nested and never of length one.
    Intersection(Vec<Type>),
    /// Placeholder after a reported error; compatible with everything.
    Error,
    /// Star projection, only meaningful as a type argument.
    Star,
}

impl Type {
    pub fn nominal(class: ClassId) -> Self {
        Type::Nominal {
            class,
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn generic(class: ClassId, arguments: Vec<Type>) -> Self {
        Type::Nominal {
            class,
            arguments,
            nullable: false,
        }
    }

    pub fn parameter(param: TypeParamId) -> Self {
        Type::Parameter {
            param,
            nullable: false,
        }
    }

    pub fn variable(var: TypeVarId) -> Self {
        Type::Variable {
            var,
            nullable: false,
        }
    }

    pub fn any() -> Self {
        Type::nominal(builtins::ANY)
    }

    pub fn nullable_any() -> Self {
        Type::any().make_nullable()
    }

    pub fn nothing() -> Self {
        Type::nominal(builtins::NOTHING)
    }

    /// Type of the `null` literal.
    pub fn null() -> Self {
        Type::nothing().make_nullable()
    }

    pub fn unit() -> Self {
        Type::nominal(builtins::UNIT)
    }

    pub fn boolean() -> Self {
        Type::nominal(builtins::BOOLEAN)
    }

    pub fn int() -> Self {
        Type::nominal(builtins::INT)
    }

    pub fn long() -> Self {
        Type::nominal(builtins::LONG)
    }

    pub fn string() -> Self {
        Type::nominal(builtins::STRING)
    }

    /// Builds a normalized intersection: flattened, sorted, deduplicated.
    pub fn intersection(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat = Vec::new();
        for member in members {
            match member {
                Type::Intersection(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => Type::any(),
            1 => flat.pop().unwrap_or(Type::Error),
            _ => Type::Intersection(flat),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Nominal { nullable, .. }
            | Type::Parameter { nullable, .. }
            | Type::Variable { nullable, .. } => *nullable,
            Type::Intersection(members) => members.iter().all(Type::is_nullable),
            Type::Error | Type::Star => false,
        }
    }

    pub fn with_nullability(&self, nullable: bool) -> Self {
        match self {
            Type::Nominal {
                class, arguments, ..
            } => Type::Nominal {
                class: *class,
                arguments: arguments.clone(),
                nullable,
            },
            Type::Parameter { param, .. } => Type::Parameter {
                param: *param,
                nullable,
            },
            Type::Variable { var, .. } => Type::Variable {
                var: *var,
                nullable,
            },
            Type::Intersection(members) => {
                Type::intersection(members.iter().map(|member| member.with_nullability(nullable)))
            }
            Type::Error | Type::Star => self.clone(),
        }
    }

    pub fn make_nullable(&self) -> Self {
        self.with_nullability(true)
    }

    pub fn make_non_null(&self) -> Self {
        self.with_nullability(false)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn contains_error(&self) -> bool {
        match self {
            Type::Error => true,
            Type::Nominal { arguments, .. } => arguments.iter().any(Type::contains_error),
            Type::Intersection(members) => members.iter().any(Type::contains_error),
            _ => false,
        }
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Type::Nominal { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn arguments(&self) -> &[Type] {
        match self {
            Type::Nominal { arguments, .. } => arguments,
            _ => &[],
        }
    }

    pub fn is_class(&self, class: ClassId) -> bool {
        self.class_id() == Some(class)
    }

    /// Non-null `Nothing`, the type of expressions that never complete.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Type::Nominal { class, nullable: false, .. } if *class == builtins::NOTHING)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Nominal { class, nullable: false, .. } if *class == builtins::UNIT)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Nominal { class, nullable: false, .. } if *class == builtins::BOOLEAN)
    }

    pub fn as_variable(&self) -> Option<TypeVarId> {
        match self {
            Type::Variable { var, .. } => Some(*var),
            _ => None,
        }
    }

    /// Collects type variables in order of first occurrence.
    pub fn collect_variables(&self, out: &mut Vec<TypeVarId>) {
        match self {
            Type::Variable { var, .. } => {
                if !out.contains(var) {
                    out.push(*var);
                }
            }
            Type::Nominal { arguments, .. } => {
                for argument in arguments {
                    argument.collect_variables(out);
                }
            }
            Type::Intersection(members) => {
                for member in members {
                    member.collect_variables(out);
                }
            }
            Type::Parameter { .. } | Type::Error | Type::Star => {}
        }
    }

    pub fn variables(&self) -> Vec<TypeVarId> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    pub fn contains_variable(&self, target: TypeVarId) -> bool {
        match self {
            Type::Variable { var, .. } => *var == target,
            Type::Nominal { arguments, .. } => {
                arguments.iter().any(|argument| argument.contains_variable(target))
            }
            Type::Intersection(members) => {
                members.iter().any(|member| member.contains_variable(target))
            }
            _ => false,
        }
    }

    pub fn has_variables(&self) -> bool {
        match self {
            Type::Variable { .. } => true,
            Type::Nominal { arguments, .. } => arguments.iter().any(Type::has_variables),
            Type::Intersection(members) => members.iter().any(Type::has_variables),
            _ => false,
        }
    }

    pub fn contains_parameter(&self, target: TypeParamId) -> bool {
        match self {
            Type::Parameter { param, .. } => *param == target,
            Type::Nominal { arguments, .. } => {
                arguments.iter().any(|argument| argument.contains_parameter(target))
            }
            Type::Intersection(members) => {
                members.iter().any(|member| member.contains_parameter(target))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_is_normalized() {
        let a = Type::nominal(ClassId::new(40));
        let b = Type::nominal(ClassId::new(41));
        let nested = Type::intersection(vec![b.clone(), Type::intersection(vec![a.clone(), b.clone()])]);
        assert_eq!(nested, Type::Intersection(vec![a.clone(), b]));
        assert_eq!(Type::intersection(vec![a.clone(), a.clone()]), a);
    }

    #[test]
    fn nullability_round_trips() {
        let string = Type::string();
        assert!(!string.is_nullable());
        assert!(string.make_nullable().is_nullable());
        assert_eq!(string.make_nullable().make_non_null(), string);
        assert!(Type::null().is_nullable());
        assert!(!Type::null().is_nothing());
        assert!(Type::nothing().is_nothing());
    }

    #[test]
    fn variables_are_collected_in_order() {
        let t = TypeVarId::new(3);
        let u = TypeVarId::new(1);
        let ty = Type::generic(
            ClassId::new(40),
            vec![Type::variable(t), Type::variable(u), Type::variable(t)],
        );
        assert_eq!(ty.variables(), vec![t, u]);
        assert!(ty.contains_variable(u));
        assert!(!Type::string().has_variables());
    }
}
