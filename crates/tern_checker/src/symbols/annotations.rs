//! Written type annotations to `Type`.

use super::{FileContext, PackageScope};
use rustc_hash::FxHashMap;
use tern_ast::TypeAnnotation;
use tern_inference::{builtins, ClassId, Diagnostic, DiagnosticCode, Type, TypeParamId, TypeRegistry};

/// What a simple name denotes in type position inside a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopedType {
    Parameter(TypeParamId),
    Class(ClassId),
}

/// Type names introduced by enclosing declarations: type parameters and
/// local classes.
pub trait TypeNames {
    fn lookup_type(&self, name: &str) -> Option<ScopedType>;
}

/// A flat list of scoped type names searched innermost first.
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    names: Vec<(String, ScopedType)>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, ty: ScopedType) {
        self.names.push((name.into(), ty));
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.names.truncate(len);
    }
}

impl TypeNames for TypeScope {
    fn lookup_type(&self, name: &str) -> Option<ScopedType> {
        self.names
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, ty)| *ty)
    }
}

pub struct TypeResolver<'s> {
    registry: &'s TypeRegistry,
    packages: &'s FxHashMap<String, PackageScope>,
    file: &'s FileContext,
}

impl<'s> TypeResolver<'s> {
    pub fn new(registry: &'s TypeRegistry, packages: &'s FxHashMap<String, PackageScope>, file: &'s FileContext) -> Self {
        Self {
            registry,
            packages,
            file,
        }
    }

    pub fn resolve(&self, annotation: &TypeAnnotation, scope: &dyn TypeNames, diagnostics: &mut Vec<Diagnostic>) -> Type {
        match annotation {
            TypeAnnotation::Star(_) => Type::Star,
            TypeAnnotation::Function {
                receiver,
                parameters,
                return_type,
                nullable,
                ..
            } => {
                let mut inputs = Vec::with_capacity(parameters.len() + 1);
                if let Some(receiver) = receiver {
                    inputs.push(self.resolve(receiver, scope, diagnostics));
                }
                for parameter in parameters {
                    inputs.push(self.resolve(parameter, scope, diagnostics));
                }
                let output = self.resolve(return_type, scope, diagnostics);
                self.registry
                    .function_type(inputs, output)
                    .with_nullability(*nullable)
            }
            TypeAnnotation::Named {
                name,
                arguments,
                nullable,
                span,
            } => {
                let resolved = match self.lookup(name, scope) {
                    Some(resolved) => resolved,
                    None => {
                        diagnostics.push(Diagnostic::new(DiagnosticCode::UnresolvedReference, *span).with_argument(name.clone()));
                        return Type::Error;
                    }
                };
                match resolved {
                    ScopedType::Parameter(param) => {
                        if !arguments.is_empty() {
                            diagnostics.push(
                                Diagnostic::new(DiagnosticCode::WrongNumberOfTypeArguments, *span)
                                    .with_arguments(["0".to_string(), name.clone()]),
                            );
                        }
                        Type::parameter(param).with_nullability(*nullable)
                    }
                    ScopedType::Class(class) => {
                        let expected = self.registry.class(class).type_parameters.len();
                        if arguments.len() != expected {
                            diagnostics.push(
                                Diagnostic::new(DiagnosticCode::WrongNumberOfTypeArguments, *span)
                                    .with_arguments([expected.to_string(), name.clone()]),
                            );
                            return Type::Error;
                        }
                        let arguments = arguments
                            .iter()
                            .map(|argument| self.resolve(argument, scope, diagnostics))
                            .collect();
                        Type::generic(class, arguments).with_nullability(*nullable)
                    }
                }
            }
        }
    }

    /// Type parameters and local classes, then the file's package, explicit
    /// imports, star imports and the default package.
    pub fn lookup(&self, name: &str, scope: &dyn TypeNames) -> Option<ScopedType> {
        if let Some(found) = scope.lookup_type(name) {
            return Some(found);
        }
        self.lookup_class(name).map(ScopedType::Class)
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        let in_package = |package: &str, name: &str| {
            self.packages
                .get(package)
                .and_then(|scope| scope.classes.get(name))
                .copied()
        };
        if let Some(class) = in_package(&self.file.package, name) {
            return Some(class);
        }
        for import in self.file.explicit_imports() {
            if import.visible == name {
                if let Some(class) = in_package(&import.package, &import.name) {
                    return Some(class);
                }
            }
        }
        for import in self.file.star_imports() {
            if let Some(class) = in_package(&import.package, name) {
                return Some(class);
            }
        }
        if let Some(class) = self.registry.find(&format!("{}.{name}", builtins::PACKAGE)) {
            return Some(class);
        }
        if name.contains('.') {
            return self.registry.find(name);
        }
        None
    }
}
