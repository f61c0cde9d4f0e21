//! Declarations of the default `tern` package: operator members of the
//! primitive classes, collection helpers and exception constructors.

use super::{DeclInfo, DeclSource, PropertyFacts, SymbolTable};
use std::sync::Arc;
use tern_ast::Variance;
use tern_inference::{
    builtins, CallableKind, CallableSignature, ClassId, DeclId, Type, TypeParamId, TypeParameterOwner, ValueParameter,
};

const ARITHMETIC: [&str; 5] = ["plus", "minus", "times", "div", "rem"];

struct BuiltinScope<'t, 'a> {
    table: &'t mut SymbolTable<'a>,
}

impl<'t, 'a> BuiltinScope<'t, 'a> {
    fn type_parameter(&mut self, owner: DeclId, name: &str) -> TypeParamId {
        self.table
            .registry
            .add_type_parameter(name, Variance::Invariant, TypeParameterOwner::Callable(owner))
    }

    fn push(&mut self, signature: CallableSignature, property: Option<PropertyFacts>) -> DeclId {
        let id = signature.id;
        self.table.push_declaration(DeclInfo {
            id,
            signature: Arc::new(signature),
            implicit: false,
            package: builtins::PACKAGE.to_string(),
            file: None,
            is_local: false,
            source: DeclSource::Builtin,
            property,
        })
    }

    fn member(&mut self, class: ClassId, name: &str, parameters: Vec<ValueParameter>, return_type: Type) -> DeclId {
        let id = self.table.next_decl_id();
        let receiver = self.table.registry.declared_type(class);
        let signature =
            CallableSignature::function(id, name, parameters, return_type).with_dispatch_receiver(class, receiver);
        let id = self.push(signature, None);
        self.table.register_member(class, name, id);
        id
    }

    fn member_property(&mut self, class: ClassId, name: &str, ty: Type) {
        let id = self.table.next_decl_id();
        let receiver = self.table.registry.declared_type(class);
        let mut signature = CallableSignature::function(id, name, Vec::new(), ty).with_dispatch_receiver(class, receiver);
        signature.kind = CallableKind::Property;
        let facts = PropertyFacts {
            mutable: false,
            stable: true,
        };
        let id = self.push(signature, Some(facts));
        self.table.register_member(class, name, id);
    }

    fn function(&mut self, signature: CallableSignature) {
        let name = signature.name.clone();
        let id = self.push(signature, None);
        self.table.register_package_callable(builtins::PACKAGE, &name, id);
    }

    fn constructor(&mut self, class: ClassId, parameters: Vec<ValueParameter>) {
        let id = self.table.next_decl_id();
        let name = self.table.registry.class(class).name.clone();
        let mut signature = CallableSignature::function(id, name.as_str(), parameters, Type::nominal(class));
        signature.kind = CallableKind::Constructor;
        let id = self.push(signature, None);
        self.table.constructors.entry(class).or_default().push(id);
        self.table.register_package_callable(builtins::PACKAGE, &name, id);
    }
}

fn parameter(name: &str, ty: Type) -> ValueParameter {
    ValueParameter::new(name, ty)
}

/// Registers the builtin classes under the `tern` package and declares their
/// members and the default-imported functions.
pub(crate) fn declare(table: &mut SymbolTable<'_>) {
    let builtin_classes: Vec<(String, ClassId)> = table
        .registry
        .classes()
        .map(|class| (class.name.clone(), class.id))
        .collect();
    for (name, class) in builtin_classes {
        table.register_package_class(builtins::PACKAGE, &name, class);
    }

    let mut scope = BuiltinScope { table };
    declare_any(&mut scope);
    declare_numbers(&mut scope);
    declare_text(&mut scope);
    declare_collections(&mut scope);
    declare_functions(&mut scope);
    for class in [
        builtins::THROWABLE,
        builtins::EXCEPTION,
        builtins::RUNTIME_EXCEPTION,
        builtins::ILLEGAL_STATE_EXCEPTION,
    ] {
        scope.constructor(class, vec![parameter("message", Type::string().make_nullable()).with_default()]);
    }
}

fn declare_any(scope: &mut BuiltinScope<'_, '_>) {
    scope.member(builtins::ANY, "toString", Vec::new(), Type::string());
    scope.member(builtins::ANY, "hashCode", Vec::new(), Type::int());
    scope.member(
        builtins::ANY,
        "equals",
        vec![parameter("other", Type::nullable_any())],
        Type::boolean(),
    );
    scope.member(builtins::BOOLEAN, "not", Vec::new(), Type::boolean());
}

fn declare_numbers(scope: &mut BuiltinScope<'_, '_>) {
    let widest = |left: ClassId, right: ClassId| {
        if left == builtins::DOUBLE || right == builtins::DOUBLE {
            builtins::DOUBLE
        } else if left == builtins::LONG || right == builtins::LONG {
            builtins::LONG
        } else {
            builtins::INT
        }
    };
    let operands = [builtins::INT, builtins::LONG, builtins::DOUBLE];
    for receiver in operands {
        for name in ARITHMETIC {
            for operand in operands {
                scope.member(
                    receiver,
                    name,
                    vec![parameter("other", Type::nominal(operand))],
                    Type::nominal(widest(receiver, operand)),
                );
            }
        }
        for operand in operands {
            scope.member(
                receiver,
                "compareTo",
                vec![parameter("other", Type::nominal(operand))],
                Type::int(),
            );
        }
        scope.member(receiver, "unaryMinus", Vec::new(), Type::nominal(receiver));
        scope.member(receiver, "unaryPlus", Vec::new(), Type::nominal(receiver));
    }
    scope.member(
        builtins::INT,
        "rangeTo",
        vec![parameter("other", Type::int())],
        Type::nominal(builtins::INT_RANGE),
    );
}

fn declare_text(scope: &mut BuiltinScope<'_, '_>) {
    scope.member(
        builtins::STRING,
        "plus",
        vec![parameter("other", Type::nullable_any())],
        Type::string(),
    );
    scope.member(
        builtins::STRING,
        "compareTo",
        vec![parameter("other", Type::string())],
        Type::int(),
    );
    scope.member(
        builtins::STRING,
        "get",
        vec![parameter("index", Type::int())],
        Type::nominal(builtins::CHAR),
    );
    scope.member_property(builtins::STRING, "length", Type::int());
    scope.member(
        builtins::CHAR,
        "compareTo",
        vec![parameter("other", Type::nominal(builtins::CHAR))],
        Type::int(),
    );
}

fn declare_collections(scope: &mut BuiltinScope<'_, '_>) {
    let element = scope.table.registry.class(builtins::LIST).type_parameters[0];
    let element = Type::parameter(element);
    scope.member_property(builtins::LIST, "size", Type::int());
    scope.member(builtins::LIST, "get", vec![parameter("index", Type::int())], element.clone());
    scope.member(builtins::LIST, "first", Vec::new(), element);
    scope.member(builtins::LIST, "isEmpty", Vec::new(), Type::boolean());

    let array_element = scope.table.registry.class(builtins::ARRAY).type_parameters[0];
    scope.member_property(builtins::ARRAY, "size", Type::int());
    scope.member(
        builtins::ARRAY,
        "get",
        vec![parameter("index", Type::int())],
        Type::parameter(array_element),
    );

    // Iterable<T>.map / filter / forEach
    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    let r = scope.type_parameter(id, "R");
    let transform = scope
        .table
        .registry
        .function_type(vec![Type::parameter(t)], Type::parameter(r));
    scope.function(
        CallableSignature::function(
            id,
            "map",
            vec![parameter("transform", transform)],
            Type::generic(builtins::LIST, vec![Type::parameter(r)]),
        )
        .with_type_parameters(vec![t, r])
        .with_extension_receiver(Type::generic(builtins::ITERABLE, vec![Type::parameter(t)])),
    );

    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    let predicate = scope
        .table
        .registry
        .function_type(vec![Type::parameter(t)], Type::boolean());
    scope.function(
        CallableSignature::function(
            id,
            "filter",
            vec![parameter("predicate", predicate)],
            Type::generic(builtins::LIST, vec![Type::parameter(t)]),
        )
        .with_type_parameters(vec![t])
        .with_extension_receiver(Type::generic(builtins::ITERABLE, vec![Type::parameter(t)])),
    );

    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    let action = scope
        .table
        .registry
        .function_type(vec![Type::parameter(t)], Type::unit());
    scope.function(
        CallableSignature::function(id, "forEach", vec![parameter("action", action)], Type::unit())
            .with_type_parameters(vec![t])
            .with_extension_receiver(Type::generic(builtins::ITERABLE, vec![Type::parameter(t)])),
    );

    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    scope.function(
        CallableSignature::function(
            id,
            "listOf",
            vec![parameter("elements", Type::parameter(t)).vararg()],
            Type::generic(builtins::LIST, vec![Type::parameter(t)]),
        )
        .with_type_parameters(vec![t]),
    );

    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    scope.function(
        CallableSignature::function(
            id,
            "emptyList",
            Vec::new(),
            Type::generic(builtins::LIST, vec![Type::parameter(t)]),
        )
        .with_type_parameters(vec![t]),
    );

    let id = scope.table.next_decl_id();
    let t = scope.type_parameter(id, "T");
    scope.function(
        CallableSignature::function(
            id,
            "arrayOf",
            vec![parameter("elements", Type::parameter(t)).vararg()],
            Type::generic(builtins::ARRAY, vec![Type::parameter(t)]),
        )
        .with_type_parameters(vec![t]),
    );
}

fn declare_functions(scope: &mut BuiltinScope<'_, '_>) {
    let id = scope.table.next_decl_id();
    scope.function(CallableSignature::function(
        id,
        "println",
        vec![parameter("message", Type::nullable_any()).with_default()],
        Type::unit(),
    ));

    let id = scope.table.next_decl_id();
    scope.function(CallableSignature::function(
        id,
        "error",
        vec![parameter("message", Type::any())],
        Type::nothing(),
    ));

    let id = scope.table.next_decl_id();
    scope.function(CallableSignature::function(id, "TODO", Vec::new(), Type::nothing()));

    let id = scope.table.next_decl_id();
    scope.function(CallableSignature::function(
        id,
        "require",
        vec![parameter("value", Type::boolean())],
        Type::unit(),
    ));

    let id = scope.table.next_decl_id();
    let r = scope.type_parameter(id, "R");
    let block = scope.table.registry.function_type(Vec::new(), Type::parameter(r));
    scope.function(
        CallableSignature::function(id, "run", vec![parameter("block", block)], Type::parameter(r))
            .with_type_parameters(vec![r]),
    );

    let id = scope.table.next_decl_id();
    let action = scope.table.registry.function_type(vec![Type::int()], Type::unit());
    scope.function(CallableSignature::function(
        id,
        "repeat",
        vec![parameter("times", Type::int()), parameter("action", action)],
        Type::unit(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_plus_has_one_overload_per_operand() {
        let mut table = SymbolTable::empty();
        declare(&mut table);
        assert_eq!(table.members_named(builtins::INT, "plus").len(), 3);
        assert_eq!(table.package_callables(builtins::PACKAGE, "listOf").len(), 1);
        assert_eq!(table.package_class(builtins::PACKAGE, "String"), Some(builtins::STRING));
    }

    #[test]
    fn builtin_type_parameters_are_owned_by_their_function() {
        let mut table = SymbolTable::empty();
        declare(&mut table);
        let map = table.package_callables(builtins::PACKAGE, "map")[0];
        let signature = &table.decl(map).signature;
        assert!(signature.is_extension());
        for param in &signature.type_parameters {
            assert_eq!(
                table.registry().type_parameter(*param).owner,
                TypeParameterOwner::Callable(map)
            );
        }
    }
}
