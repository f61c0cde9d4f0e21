use super::span;
use crate::config::InferenceLimits;
use crate::constraint::{ConstraintError, ConstraintOrigin, ConstraintSystem, LiteralFit, TypeVariableAllocator};
use crate::registry::{builtins, TypeRegistry};
use crate::types::{Type, TypeVarId};
use tern_ast::NodeId;

fn fresh(system: &mut ConstraintSystem<'_>, allocator: &mut TypeVariableAllocator, name: &str) -> TypeVarId {
    let variable = allocator.fresh(name, NodeId::new(1), span(1));
    system.register(variable)
}

#[test]
fn literal_lower_bound_fixes_to_int_and_fixing_is_idempotent() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");

    let fit = system.add_integer_literal(1, &Type::variable(t), ConstraintOrigin::Argument(0));
    assert_eq!(fit, LiteralFit::Exact);
    assert!(system.has_proper_bound(t));
    assert_eq!(system.fix(t), Type::int());
    assert_eq!(system.fix(t), Type::int());
    assert!(!system.has_errors());
    assert!(system.is_fixed(t));
}

#[test]
fn literal_takes_integral_upper_bound() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");

    system.add_subtype_constraint(&Type::variable(t), &Type::long(), ConstraintOrigin::ExpectedType);
    system.add_integer_literal(7, &Type::variable(t), ConstraintOrigin::Argument(0));
    assert_eq!(system.fix(t), Type::long());
    assert!(!system.has_errors());
}

#[test]
fn literal_out_of_range_is_a_mismatch() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let byte = Type::nominal(builtins::BYTE);

    assert_eq!(
        system.add_integer_literal(100, &byte, ConstraintOrigin::Argument(0)),
        LiteralFit::Coerced
    );
    assert_eq!(
        system.add_integer_literal(300, &byte, ConstraintOrigin::Argument(1)),
        LiteralFit::Mismatch
    );
    assert!(matches!(
        system.errors(),
        [ConstraintError::TypeMismatch {
            origin: ConstraintOrigin::Argument(1),
            ..
        }]
    ));
}

#[test]
fn unconstrained_variable_cannot_be_inferred() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");

    assert!(!system.has_proper_bound(t));
    assert_eq!(system.fix(t), Type::Error);
    assert_eq!(system.errors(), &[ConstraintError::CannotInferType { variable: t }]);
}

#[test]
fn explicit_argument_against_declared_bound_is_a_bound_violation() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let mut variable = allocator.fresh("T", NodeId::new(1), span(1));
    variable.declared_upper_bounds = vec![Type::nominal(builtins::NUMBER)];
    let t = system.register(variable);

    system.add_equality_constraint(&Type::variable(t), &Type::string(), ConstraintOrigin::ExplicitTypeArgument);
    assert!(matches!(
        system.errors(),
        [ConstraintError::UpperBoundViolated { variable, .. }] if *variable == t
    ));
}

#[test]
fn argument_against_declared_bound_is_a_mismatch_on_the_argument() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let mut variable = allocator.fresh("T", NodeId::new(1), span(1));
    variable.declared_upper_bounds = vec![Type::nominal(builtins::NUMBER)];
    let t = system.register(variable);

    system.add_subtype_constraint(&Type::string(), &Type::variable(t), ConstraintOrigin::Argument(0));
    assert!(matches!(
        system.errors(),
        [ConstraintError::TypeMismatch {
            origin: ConstraintOrigin::Argument(0),
            variable: Some(variable),
            ..
        }] if *variable == t
    ));
}

#[test]
fn lower_bounds_are_joined() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");

    system.add_subtype_constraint(&Type::int(), &Type::variable(t), ConstraintOrigin::Argument(0));
    system.add_subtype_constraint(&Type::long(), &Type::variable(t), ConstraintOrigin::Argument(1));
    assert_eq!(system.fix(t), Type::nominal(builtins::NUMBER));
}

#[test]
fn covariant_arguments_decompose_into_lower_bounds() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");
    let list_of = |ty: Type| Type::generic(builtins::LIST, vec![ty]);

    system.add_subtype_constraint(
        &list_of(Type::string()),
        &list_of(Type::variable(t)),
        ConstraintOrigin::Argument(0),
    );
    system.fix_all();
    assert_eq!(system.substitute(&list_of(Type::variable(t))), list_of(Type::string()));
}

#[test]
fn nullable_lower_bound_conflicts_with_non_null_upper_bound() {
    let registry = TypeRegistry::with_builtins();
    let mut system = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut allocator = TypeVariableAllocator::new();
    let t = fresh(&mut system, &mut allocator, "T");

    system.add_subtype_constraint(&Type::variable(t), &Type::any(), ConstraintOrigin::ExpectedType);
    system.add_subtype_constraint(&Type::string().make_nullable(), &Type::variable(t), ConstraintOrigin::Argument(0));
    assert!(system.has_errors());
}

#[test]
fn absorbed_system_keeps_its_variables() {
    let registry = TypeRegistry::with_builtins();
    let mut allocator = TypeVariableAllocator::new();
    let mut outer = ConstraintSystem::new(&registry, InferenceLimits::default());
    let mut nested = ConstraintSystem::new(&registry, InferenceLimits::default());
    let t = fresh(&mut nested, &mut allocator, "T");
    nested.add_subtype_constraint(&Type::string(), &Type::variable(t), ConstraintOrigin::Argument(0));

    outer.absorb(nested);
    assert!(outer.contains(t));
    assert_eq!(outer.fix(t), Type::string());
}

#[test]
fn type_variable_limit_is_recorded() {
    let registry = TypeRegistry::with_builtins();
    let limits = InferenceLimits {
        max_type_variables: 1,
        ..InferenceLimits::default()
    };
    let mut system = ConstraintSystem::new(&registry, limits);
    let mut allocator = TypeVariableAllocator::new();
    fresh(&mut system, &mut allocator, "T");
    assert!(!system.limit_exceeded());
    fresh(&mut system, &mut allocator, "U");
    assert!(system.limit_exceeded());
}
