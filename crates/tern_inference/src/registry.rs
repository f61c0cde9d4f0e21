//! Arena of classes and type parameters.
//!
//! The registry is populated while declarations are collected and is
//! read-only once body analysis starts, so it can be shared across worker
//! threads behind an `Arc`.

use crate::types::{ClassId, DeclId, Type, TypeParamId};
use rustc_hash::FxHashMap;
use std::fmt;
use tern_ast::{ClassKind, Modality, NodeId, Variance};

/// Well-known class identifiers. Registration order in
/// [`TypeRegistry::with_builtins`] must match these values.
pub mod builtins {
    use crate::types::ClassId;

    pub const ANY: ClassId = ClassId::new(0);
    pub const NOTHING: ClassId = ClassId::new(1);
    pub const UNIT: ClassId = ClassId::new(2);
    pub const BOOLEAN: ClassId = ClassId::new(3);
    pub const CHAR: ClassId = ClassId::new(4);
    pub const BYTE: ClassId = ClassId::new(5);
    pub const SHORT: ClassId = ClassId::new(6);
    pub const INT: ClassId = ClassId::new(7);
    pub const LONG: ClassId = ClassId::new(8);
    pub const FLOAT: ClassId = ClassId::new(9);
    pub const DOUBLE: ClassId = ClassId::new(10);
    pub const NUMBER: ClassId = ClassId::new(11);
    pub const STRING: ClassId = ClassId::new(12);
    pub const COMPARABLE: ClassId = ClassId::new(13);
    pub const THROWABLE: ClassId = ClassId::new(14);
    pub const EXCEPTION: ClassId = ClassId::new(15);
    pub const RUNTIME_EXCEPTION: ClassId = ClassId::new(16);
    pub const ILLEGAL_STATE_EXCEPTION: ClassId = ClassId::new(17);
    pub const ITERABLE: ClassId = ClassId::new(18);
    pub const LIST: ClassId = ClassId::new(19);
    pub const ARRAY: ClassId = ClassId::new(20);
    pub const INT_RANGE: ClassId = ClassId::new(21);
    /// `Function0`; `FunctionN` is `FUNCTION_BASE + N`.
    pub const FUNCTION_BASE: ClassId = ClassId::new(22);
    pub const MAX_FUNCTION_ARITY: usize = 8;

    pub const PACKAGE: &str = "tern";

    /// Integral classes an integer literal may be coerced to, narrowest first.
    pub const INTEGRAL: [ClassId; 4] = [BYTE, SHORT, INT, LONG];

    pub fn is_integral(class: ClassId) -> bool {
        INTEGRAL.contains(&class)
    }

    pub fn is_numeric(class: ClassId) -> bool {
        is_integral(class) || class == FLOAT || class == DOUBLE
    }

    /// Whether `value` is representable in the integral class.
    pub fn literal_fits(value: i64, class: ClassId) -> bool {
        if class == BYTE {
            i8::try_from(value).is_ok()
        } else if class == SHORT {
            i16::try_from(value).is_ok()
        } else if class == INT {
            i32::try_from(value).is_ok()
        } else {
            class == LONG
        }
    }

    /// Default type of an unsuffixed integer literal without context.
    pub fn default_literal_class(value: i64) -> ClassId {
        if literal_fits(value, INT) {
            INT
        } else {
            LONG
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeParameterOwner {
    Class(ClassId),
    Callable(DeclId),
    /// Builtin function types and other synthetic owners.
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct TypeParameterInfo {
    pub id: TypeParamId,
    pub name: String,
    pub variance: Variance,
    /// Empty means the implicit `Any?` bound.
    pub upper_bounds: Vec<Type>,
    pub owner: TypeParameterOwner,
}

impl TypeParameterInfo {
    pub fn effective_bounds(&self) -> Vec<Type> {
        if self.upper_bounds.is_empty() {
            vec![Type::nullable_any()]
        } else {
            self.upper_bounds.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub id: ClassId,
    pub name: String,
    pub fq_name: String,
    pub kind: ClassKind,
    pub modality: Modality,
    pub type_parameters: Vec<TypeParamId>,
    pub supertypes: Vec<Type>,
    pub enum_entries: Vec<String>,
    /// Direct inheritors of a sealed class or interface, in registration order.
    pub sealed_inheritors: Vec<ClassId>,
    pub is_local: bool,
    pub declaration: Option<NodeId>,
}

impl ClassInfo {
    pub fn is_sealed(&self) -> bool {
        self.modality == Modality::Sealed
    }

    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::EnumClass
    }

    pub fn is_object(&self) -> bool {
        self.kind == ClassKind::Object
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: Vec<ClassInfo>,
    type_parameters: Vec<TypeParameterInfo>,
    by_fq_name: FxHashMap<String, ClassId>,
}

impl TypeRegistry {
    /// Creates a registry holding only the builtin classes.
    pub fn with_builtins() -> Self {
        let mut registry = TypeRegistry::default();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        use builtins::*;

        let open = Modality::Open;
        let abstract_ = Modality::Abstract;
        let final_ = Modality::Final;
        let class = ClassKind::Class;
        let interface = ClassKind::Interface;

        let any = self.builtin("Any", class, open);
        let nothing = self.builtin("Nothing", class, final_);
        let unit = self.builtin("Unit", ClassKind::Object, final_);
        let boolean = self.builtin("Boolean", class, final_);
        let char_ = self.builtin("Char", class, final_);
        let byte = self.builtin("Byte", class, final_);
        let short = self.builtin("Short", class, final_);
        let int = self.builtin("Int", class, final_);
        let long = self.builtin("Long", class, final_);
        let float = self.builtin("Float", class, final_);
        let double = self.builtin("Double", class, final_);
        let number = self.builtin("Number", class, abstract_);
        let string = self.builtin("String", class, final_);
        let comparable = self.builtin("Comparable", interface, abstract_);
        let throwable = self.builtin("Throwable", class, open);
        let exception = self.builtin("Exception", class, open);
        let runtime = self.builtin("RuntimeException", class, open);
        let illegal_state = self.builtin("IllegalStateException", class, open);
        let iterable = self.builtin("Iterable", interface, abstract_);
        let list = self.builtin("List", interface, abstract_);
        let array = self.builtin("Array", class, final_);
        let int_range = self.builtin("IntRange", class, final_);
        debug_assert_eq!(
            [any, nothing, unit, boolean, char_, byte, short, int, long, float, double],
            [ANY, NOTHING, UNIT, BOOLEAN, CHAR, BYTE, SHORT, INT, LONG, FLOAT, DOUBLE]
        );
        debug_assert_eq!(
            [number, string, comparable, throwable, exception, runtime, illegal_state],
            [NUMBER, STRING, COMPARABLE, THROWABLE, EXCEPTION, RUNTIME_EXCEPTION, ILLEGAL_STATE_EXCEPTION]
        );
        debug_assert_eq!([iterable, list, array, int_range], [ITERABLE, LIST, ARRAY, INT_RANGE]);

        let comparable_t = self.add_type_parameter("T", Variance::In, TypeParameterOwner::Class(comparable));
        self.set_class_type_parameters(comparable, vec![comparable_t]);
        let iterable_t = self.add_type_parameter("T", Variance::Out, TypeParameterOwner::Class(iterable));
        self.set_class_type_parameters(iterable, vec![iterable_t]);
        let list_e = self.add_type_parameter("E", Variance::Out, TypeParameterOwner::Class(list));
        self.set_class_type_parameters(list, vec![list_e]);
        let array_t = self.add_type_parameter("T", Variance::Invariant, TypeParameterOwner::Class(array));
        self.set_class_type_parameters(array, vec![array_t]);

        let comparable_of = |class: ClassId| Type::generic(COMPARABLE, vec![Type::nominal(class)]);
        self.set_supertypes(unit, vec![Type::any()]);
        for class in [boolean, char_, string] {
            self.set_supertypes(class, vec![Type::any(), comparable_of(class)]);
        }
        for class in [byte, short, int, long, float, double] {
            self.set_supertypes(class, vec![Type::nominal(number), comparable_of(class)]);
        }
        for class in [number, comparable, throwable, iterable, array] {
            self.set_supertypes(class, vec![Type::any()]);
        }
        self.set_supertypes(exception, vec![Type::nominal(throwable)]);
        self.set_supertypes(runtime, vec![Type::nominal(exception)]);
        self.set_supertypes(illegal_state, vec![Type::nominal(runtime)]);
        self.set_supertypes(list, vec![Type::generic(iterable, vec![Type::parameter(list_e)])]);
        self.set_supertypes(int_range, vec![Type::generic(iterable, vec![Type::int()])]);

        for arity in 0..=MAX_FUNCTION_ARITY {
            let class = self.builtin(&format!("Function{arity}"), interface, abstract_);
            debug_assert_eq!(class.index(), FUNCTION_BASE.index() + arity);
            let mut parameters = Vec::with_capacity(arity + 1);
            for index in 1..=arity {
                parameters.push(self.add_type_parameter(
                    &format!("P{index}"),
                    Variance::In,
                    TypeParameterOwner::Class(class),
                ));
            }
            parameters.push(self.add_type_parameter("R", Variance::Out, TypeParameterOwner::Class(class)));
            self.set_class_type_parameters(class, parameters);
            self.set_supertypes(class, vec![Type::any()]);
        }
    }

    fn builtin(&mut self, name: &str, kind: ClassKind, modality: Modality) -> ClassId {
        let fq_name = format!("{}.{name}", builtins::PACKAGE);
        self.add_class(name, &fq_name, kind, modality)
    }

    pub fn add_class(&mut self, name: &str, fq_name: &str, kind: ClassKind, modality: Modality) -> ClassId {
        let id = ClassId::new(self.classes.len() as u32);
        self.classes.push(ClassInfo {
            id,
            name: name.to_string(),
            fq_name: fq_name.to_string(),
            kind,
            modality,
            type_parameters: Vec::new(),
            supertypes: Vec::new(),
            enum_entries: Vec::new(),
            sealed_inheritors: Vec::new(),
            is_local: false,
            declaration: None,
        });
        self.by_fq_name.insert(fq_name.to_string(), id);
        id
    }

    pub fn add_type_parameter(
        &mut self,
        name: &str,
        variance: Variance,
        owner: TypeParameterOwner,
    ) -> TypeParamId {
        let id = TypeParamId::new(self.type_parameters.len() as u32);
        self.type_parameters.push(TypeParameterInfo {
            id,
            name: name.to_string(),
            variance,
            upper_bounds: Vec::new(),
            owner,
        });
        id
    }

    pub fn set_upper_bounds(&mut self, param: TypeParamId, bounds: Vec<Type>) {
        self.type_parameters[param.index()].upper_bounds = bounds;
    }

    pub fn set_type_parameter_owner(&mut self, param: TypeParamId, owner: TypeParameterOwner) {
        self.type_parameters[param.index()].owner = owner;
    }

    pub fn set_class_type_parameters(&mut self, class: ClassId, parameters: Vec<TypeParamId>) {
        self.classes[class.index()].type_parameters = parameters;
    }

    pub fn set_supertypes(&mut self, class: ClassId, supertypes: Vec<Type>) {
        self.classes[class.index()].supertypes = supertypes;
    }

    pub fn set_enum_entries(&mut self, class: ClassId, entries: Vec<String>) {
        self.classes[class.index()].enum_entries = entries;
    }

    pub fn mark_local(&mut self, class: ClassId, declaration: NodeId) {
        let info = &mut self.classes[class.index()];
        info.is_local = true;
        info.declaration = Some(declaration);
    }

    pub fn set_declaration(&mut self, class: ClassId, declaration: NodeId) {
        self.classes[class.index()].declaration = Some(declaration);
    }

    /// Records `child` as a direct inheritor of the sealed `parent`.
    pub fn register_sealed_inheritor(&mut self, parent: ClassId, child: ClassId) {
        let inheritors = &mut self.classes[parent.index()].sealed_inheritors;
        if !inheritors.contains(&child) {
            inheritors.push(child);
        }
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.index()]
    }

    pub fn type_parameter(&self, id: TypeParamId) -> &TypeParameterInfo {
        &self.type_parameters[id.index()]
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.iter()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn find(&self, fq_name: &str) -> Option<ClassId> {
        self.by_fq_name.get(fq_name).copied()
    }

    /// The class viewed from inside: arguments are its own type parameters.
    pub fn declared_type(&self, class: ClassId) -> Type {
        let arguments = self
            .class(class)
            .type_parameters
            .iter()
            .map(|param| Type::parameter(*param))
            .collect();
        Type::generic(class, arguments)
    }

    pub fn function_class(&self, arity: usize) -> Option<ClassId> {
        (arity <= builtins::MAX_FUNCTION_ARITY)
            .then(|| ClassId::new(builtins::FUNCTION_BASE.to_raw() + arity as u32))
    }

    pub fn function_arity(&self, class: ClassId) -> Option<usize> {
        let base = builtins::FUNCTION_BASE.index();
        let index = class.index();
        (index >= base && index <= base + builtins::MAX_FUNCTION_ARITY).then(|| index - base)
    }

    /// `(P1, ..., Pn) -> R`; arities above the builtin maximum yield `Error`.
    pub fn function_type(&self, parameters: Vec<Type>, return_type: Type) -> Type {
        match self.function_class(parameters.len()) {
            Some(class) => {
                let mut arguments = parameters;
                arguments.push(return_type);
                Type::generic(class, arguments)
            }
            None => Type::Error,
        }
    }

    /// Splits a function type into parameter types and return type.
    pub fn function_parts(&self, ty: &Type) -> Option<(Vec<Type>, Type)> {
        match ty {
            Type::Nominal {
                class, arguments, ..
            } => {
                let arity = self.function_arity(*class)?;
                if arguments.len() != arity + 1 {
                    return None;
                }
                let mut parameters = arguments.clone();
                let return_type = parameters.pop()?;
                Some((parameters, return_type))
            }
            _ => None,
        }
    }

    pub fn is_function_type(&self, ty: &Type) -> bool {
        ty.class_id()
            .and_then(|class| self.function_arity(class))
            .is_some()
    }

    pub fn display<'a>(&'a self, ty: &'a Type) -> TypeDisplay<'a> {
        TypeDisplay { registry: self, ty }
    }

    pub fn render(&self, ty: &Type) -> String {
        self.display(ty).to_string()
    }
}

/// Renders a type with class and parameter names, e.g. `List<String?>`.
pub struct TypeDisplay<'a> {
    registry: &'a TypeRegistry,
    ty: &'a Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry;
        match self.ty {
            Type::Nominal {
                class,
                arguments,
                nullable,
            } => {
                if let Some((parameters, return_type)) = registry.function_parts(self.ty) {
                    if *nullable {
                        write!(f, "(")?;
                    }
                    write!(f, "(")?;
                    for (index, parameter) in parameters.iter().enumerate() {
                        if index > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", registry.display(parameter))?;
                    }
                    write!(f, ") -> {}", registry.display(&return_type))?;
                    if *nullable {
                        write!(f, ")?")?;
                    }
                    return Ok(());
                }
                write!(f, "{}", registry.class(*class).name)?;
                if !arguments.is_empty() {
                    write!(f, "<")?;
                    for (index, argument) in arguments.iter().enumerate() {
                        if index > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", registry.display(argument))?;
                    }
                    write!(f, ">")?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Type::Parameter { param, nullable } => {
                write!(f, "{}", registry.type_parameter(*param).name)?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Type::Variable { var, nullable } => {
                write!(f, "TypeVariable({})", var.to_raw())?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Type::Intersection(members) => {
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", registry.display(member))?;
                }
                Ok(())
            }
            Type::Error => write!(f, "<error>"),
            Type::Star => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_stable() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(registry.find("tern.Int"), Some(builtins::INT));
        assert_eq!(registry.find("tern.IntRange"), Some(builtins::INT_RANGE));
        assert_eq!(registry.function_class(2).map(|c| registry.class(c).name.clone()), Some("Function2".into()));
        assert_eq!(registry.function_arity(builtins::FUNCTION_BASE), Some(0));
        assert_eq!(registry.function_class(builtins::MAX_FUNCTION_ARITY + 1), None);
    }

    #[test]
    fn function_types_render_with_arrows() {
        let registry = TypeRegistry::with_builtins();
        let ty = registry.function_type(vec![Type::int(), Type::string().make_nullable()], Type::unit());
        assert_eq!(registry.render(&ty), "(Int, String?) -> Unit");
        let (parameters, return_type) = registry.function_parts(&ty).expect("function type");
        assert_eq!(parameters.len(), 2);
        assert!(return_type.is_unit());
    }

    #[test]
    fn literal_fitting_follows_ranges() {
        assert!(builtins::literal_fits(127, builtins::BYTE));
        assert!(!builtins::literal_fits(128, builtins::BYTE));
        assert!(builtins::literal_fits(i64::from(i32::MAX), builtins::INT));
        assert_eq!(builtins::default_literal_class(i64::from(i32::MAX) + 1), builtins::LONG);
    }
}
