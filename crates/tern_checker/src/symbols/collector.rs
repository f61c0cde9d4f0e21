//! Builds the [`SymbolTable`] in two passes.
//!
//! The first pass registers every class and type parameter, top-level,
//! nested and local, so that the second pass can resolve bounds, supertypes
//! and signatures in any declaration order.

use super::annotations::{ScopedType, TypeResolver, TypeScope};
use super::{builtins, BodyKind, BodyRef, ClassSource, DeclInfo, DeclSource, FileContext, PropertyFacts, SymbolTable};
use crate::walk::{self, Visitor};
use std::sync::Arc;
use tern_ast::{
    Block, ClassDeclaration, ClassKind, Declaration, FunctionBody, FunctionDeclaration, Modality, NodeId, Parameter,
    PropertyDeclaration, PropertyMutability, SourceFile, Statement, TypeAnnotation, TypeParameterDeclaration,
};
use tern_inference::{
    CallableKind, CallableSignature, ClassId, DeclId, Diagnostic, DiagnosticCode, Type, TypeParamId,
    TypeParameterOwner, ValueParameter,
};
use tracing::debug;

#[derive(Clone)]
struct DeclContext<'a> {
    file: usize,
    scope: TypeScope,
    owner: Option<ClassId>,
    class: Option<&'a ClassDeclaration>,
    local: bool,
    /// Enclosing class key for nested classes, e.g. `Outer`.
    prefix: Option<String>,
}

impl<'a> DeclContext<'a> {
    fn top_level(file: usize) -> Self {
        Self {
            file,
            scope: TypeScope::new(),
            owner: None,
            class: None,
            local: false,
            prefix: None,
        }
    }

    fn local(file: usize, scope: TypeScope) -> Self {
        Self {
            file,
            scope,
            owner: None,
            class: None,
            local: true,
            prefix: None,
        }
    }
}

struct PendingClass<'a> {
    id: ClassId,
    declaration: &'a ClassDeclaration,
    context: DeclContext<'a>,
    /// Scope inside the class body, with its own type parameters.
    scope: TypeScope,
}

#[derive(Clone, Copy)]
enum CallableSite<'a> {
    Function(&'a FunctionDeclaration),
    Property(&'a PropertyDeclaration),
}

struct PendingCallable<'a> {
    site: CallableSite<'a>,
    context: DeclContext<'a>,
    scope: TypeScope,
}

struct PendingTypeParameter<'a> {
    id: TypeParamId,
    declaration: &'a TypeParameterDeclaration,
    file: usize,
    scope: TypeScope,
}

pub struct DeclarationCollector<'a> {
    files: &'a [SourceFile],
    table: SymbolTable<'a>,
    classes: Vec<PendingClass<'a>>,
    callables: Vec<PendingCallable<'a>>,
    type_parameters: Vec<PendingTypeParameter<'a>>,
}

impl<'a> DeclarationCollector<'a> {
    pub fn new(files: &'a [SourceFile]) -> Self {
        let mut table = SymbolTable::empty();
        builtins::declare(&mut table);
        table.files = files
            .iter()
            .enumerate()
            .map(|(index, file)| FileContext::new(index, file))
            .collect();
        Self {
            files,
            table,
            classes: Vec::new(),
            callables: Vec::new(),
            type_parameters: Vec::new(),
        }
    }

    pub fn collect(mut self) -> SymbolTable<'a> {
        for (index, file) in self.files.iter().enumerate() {
            for declaration in &file.declarations {
                self.register_declaration(declaration, DeclContext::top_level(index));
            }
        }
        self.resolve_type_parameter_bounds();
        self.resolve_class_headers();
        self.declare_constructors();
        self.declare_callables();
        debug!(
            classes = self.classes.len(),
            declarations = self.table.declarations.len(),
            bodies = self.table.bodies.len(),
            "collected declarations"
        );
        self.table
    }

    fn package_of(&self, file: usize) -> String {
        self.table.files[file].package.clone()
    }

    fn register_declaration(&mut self, declaration: &'a Declaration, context: DeclContext<'a>) {
        match declaration {
            Declaration::Function(function) => self.register_function(function, context),
            Declaration::Property(property) => self.register_property(property, context),
            Declaration::Class(class) => {
                self.register_class(class, context);
            }
        }
    }

    fn allocate_type_parameters(
        &mut self,
        declarations: &'a [TypeParameterDeclaration],
        owner: TypeParameterOwner,
        file: usize,
        scope: &mut TypeScope,
    ) -> Vec<TypeParamId> {
        let ids: Vec<TypeParamId> = declarations
            .iter()
            .map(|declaration| {
                let id = self
                    .table
                    .registry
                    .add_type_parameter(&declaration.name, declaration.variance, owner);
                scope.push(declaration.name.clone(), ScopedType::Parameter(id));
                id
            })
            .collect();
        // Bounds see every parameter of the same list, e.g. `<T : Comparable<T>>`.
        for (declaration, id) in declarations.iter().zip(&ids) {
            self.type_parameters.push(PendingTypeParameter {
                id: *id,
                declaration,
                file,
                scope: scope.clone(),
            });
        }
        ids
    }

    fn register_class(&mut self, class: &'a ClassDeclaration, context: DeclContext<'a>) -> ClassId {
        let package = self.package_of(context.file);
        let key = match &context.prefix {
            Some(prefix) => format!("{prefix}.{}", class.name),
            None => class.name.clone(),
        };
        let qualified = if package.is_empty() {
            key.clone()
        } else {
            format!("{package}.{key}")
        };
        let modality = match (class.kind, class.modality) {
            (ClassKind::Interface, Modality::Final) => Modality::Abstract,
            (_, modality) => modality,
        };
        let id = if context.local {
            let fq_name = format!("{qualified}#{}", class.id.to_raw());
            let id = self.table.registry.add_class(&class.name, &fq_name, class.kind, modality);
            self.table.registry.mark_local(id, class.id);
            self.table.local_classes.insert(class.id, id);
            id
        } else {
            let id = self.table.registry.add_class(&class.name, &qualified, class.kind, modality);
            self.table.registry.set_declaration(id, class.id);
            self.table.register_package_class(&package, &key, id);
            id
        };
        self.table.classes.insert(
            id,
            ClassSource {
                declaration: class,
                file: context.file,
            },
        );

        let mut scope = context.scope.clone();
        if context.local {
            scope.push(class.name.clone(), ScopedType::Class(id));
        }
        let parameters =
            self.allocate_type_parameters(&class.type_parameters, TypeParameterOwner::Class(id), context.file, &mut scope);
        self.table.registry.set_class_type_parameters(id, parameters.clone());
        self.table.type_parameters.insert(class.id, parameters);

        let member_context = DeclContext {
            file: context.file,
            scope: scope.clone(),
            owner: Some(id),
            class: Some(class),
            local: context.local,
            prefix: Some(key),
        };
        for member in &class.members {
            self.register_declaration(member, member_context.clone());
        }
        let mut scanner = LocalScanner {
            collector: self,
            file: context.file,
            scope: scope.clone(),
        };
        for parameter in class.primary_constructor.iter().flatten() {
            if let Some(default) = &parameter.default_value {
                scanner.visit_expression(default);
            }
        }
        for block in &class.init_blocks {
            scanner.visit_block(block);
        }

        self.classes.push(PendingClass {
            id,
            declaration: class,
            context,
            scope,
        });
        id
    }

    fn register_function(&mut self, function: &'a FunctionDeclaration, context: DeclContext<'a>) {
        let mut scope = context.scope.clone();
        let parameters = self.allocate_type_parameters(
            &function.type_parameters,
            TypeParameterOwner::Synthetic,
            context.file,
            &mut scope,
        );
        self.table.type_parameters.insert(function.id, parameters);

        let mut scanner = LocalScanner {
            collector: self,
            file: context.file,
            scope: scope.clone(),
        };
        walk::walk_function(&mut scanner, function);

        self.callables.push(PendingCallable {
            site: CallableSite::Function(function),
            context,
            scope,
        });
    }

    fn register_property(&mut self, property: &'a PropertyDeclaration, context: DeclContext<'a>) {
        if let Some(initializer) = &property.initializer {
            let mut scanner = LocalScanner {
                collector: self,
                file: context.file,
                scope: context.scope.clone(),
            };
            scanner.visit_expression(initializer);
        }
        let scope = context.scope.clone();
        self.callables.push(PendingCallable {
            site: CallableSite::Property(property),
            context,
            scope,
        });
    }

    fn resolve_type_parameter_bounds(&mut self) {
        let mut resolved = Vec::with_capacity(self.type_parameters.len());
        for pending in &self.type_parameters {
            let (resolver, diagnostics) = split(&mut self.table, pending.file);
            let bounds: Vec<Type> = pending
                .declaration
                .upper_bounds
                .iter()
                .map(|bound| resolver.resolve(bound, &pending.scope, diagnostics))
                .collect();
            resolved.push((pending.id, bounds));
        }
        for (id, bounds) in resolved {
            self.table.registry.set_upper_bounds(id, bounds);
        }
    }

    fn resolve_class_headers(&mut self) {
        let mut headers = Vec::with_capacity(self.classes.len());
        for pending in &self.classes {
            let (resolver, diagnostics) = split(&mut self.table, pending.context.file);
            let mut supertypes: Vec<Type> = pending
                .declaration
                .supertypes
                .iter()
                .map(|supertype| resolver.resolve(supertype, &pending.scope, diagnostics))
                .filter(|supertype| !supertype.is_error())
                .collect();
            if supertypes.is_empty() {
                supertypes.push(Type::any());
            }
            let entries: Vec<String> = pending
                .declaration
                .enum_entries
                .iter()
                .map(|entry| entry.name.clone())
                .collect();
            headers.push((pending.id, supertypes, entries));
        }
        for (id, supertypes, entries) in headers {
            for supertype in &supertypes {
                if let Some(parent) = supertype.class_id() {
                    if self.table.registry.class(parent).is_sealed() {
                        self.table.registry.register_sealed_inheritor(parent, id);
                    }
                }
            }
            self.table.registry.set_supertypes(id, supertypes);
            if !entries.is_empty() {
                self.table.registry.set_enum_entries(id, entries);
            }
        }
    }

    fn value_parameters(&mut self, parameters: &'a [Parameter], file: usize, scope: &TypeScope) -> Vec<ValueParameter> {
        let resolver = self.table.type_resolver(file);
        let mut diagnostics = Vec::new();
        let parameters = parameters
            .iter()
            .map(|parameter| {
                let ty = match &parameter.type_annotation {
                    Some(annotation) => resolver.resolve(annotation, scope, &mut diagnostics),
                    None => {
                        diagnostics.push(
                            Diagnostic::new(DiagnosticCode::CannotInferParameterType, parameter.span)
                                .at_node(parameter.id)
                                .with_argument(parameter.name.clone()),
                        );
                        Type::Error
                    }
                };
                let mut value = ValueParameter::new(parameter.name.clone(), ty);
                if parameter.default_value.is_some() {
                    value = value.with_default();
                }
                if parameter.is_vararg {
                    value = value.vararg();
                }
                value
            })
            .collect();
        self.table.diagnostics.extend(diagnostics);
        parameters
    }

    fn declare_constructors(&mut self) {
        let classes = std::mem::take(&mut self.classes);
        for pending in &classes {
            let class = pending.declaration;
            let constructible = class.kind == ClassKind::Class
                && !matches!(class.modality, Modality::Abstract | Modality::Sealed);
            let declared = self.table.registry.declared_type(pending.id);
            let package = self.package_of(pending.context.file);
            let parameters = class.primary_constructor.as_deref().unwrap_or(&[]);

            if constructible {
                let value_parameters = self.value_parameters(parameters, pending.context.file, &pending.scope);
                let id = self.table.next_decl_id();
                let mut signature = CallableSignature::function(id, class.name.as_str(), value_parameters, declared.clone())
                    .with_type_parameters(self.table.registry.class(pending.id).type_parameters.clone());
                signature.kind = CallableKind::Constructor;
                signature.declaration = Some(class.id);
                signature.span = class.span;
                self.table.push_declaration(DeclInfo {
                    id,
                    signature: Arc::new(signature),
                    implicit: false,
                    package: package.clone(),
                    file: Some(pending.context.file),
                    is_local: pending.context.local,
                    source: DeclSource::Constructor(pending.id),
                    property: None,
                });
                self.table.constructors.entry(pending.id).or_default().push(id);
                if !pending.context.local {
                    let key = match &pending.context.prefix {
                        Some(prefix) => format!("{prefix}.{}", class.name),
                        None => class.name.clone(),
                    };
                    self.table.register_package_callable(&package, &key, id);
                }
            }

            for parameter in parameters {
                let Some(mutability) = parameter.property else {
                    continue;
                };
                let ty = match &parameter.type_annotation {
                    Some(annotation) => {
                        let resolver = self.table.type_resolver(pending.context.file);
                        let mut scratch = Vec::new();
                        resolver.resolve(annotation, &pending.scope, &mut scratch)
                    }
                    None => Type::Error,
                };
                let id = self.table.next_decl_id();
                let mut signature = CallableSignature::function(id, parameter.name.as_str(), Vec::new(), ty)
                    .with_dispatch_receiver(pending.id, declared.clone());
                signature.kind = CallableKind::Property;
                signature.declaration = Some(parameter.id);
                signature.span = parameter.span;
                let mutable = mutability == PropertyMutability::Var;
                self.table.push_declaration(DeclInfo {
                    id,
                    signature: Arc::new(signature),
                    implicit: false,
                    package: package.clone(),
                    file: Some(pending.context.file),
                    is_local: pending.context.local,
                    source: DeclSource::ConstructorProperty(parameter),
                    property: Some(PropertyFacts {
                        mutable,
                        stable: !mutable,
                    }),
                });
                self.table.register_member(pending.id, &parameter.name, id);
            }

            if !pending.context.local {
                for (index, block) in class.init_blocks.iter().enumerate() {
                    self.table.bodies.push(BodyRef {
                        kind: BodyKind::InitBlock(block),
                        file: pending.context.file,
                        owner: Some(pending.id),
                        class: Some(class),
                        decl: None,
                        name: format!("{}.init#{index}", class.name),
                        node: block.id,
                        span: block.span,
                    });
                }
            }
        }
        self.classes = classes;
    }

    fn declare_callables(&mut self) {
        let callables = std::mem::take(&mut self.callables);
        for pending in &callables {
            match pending.site {
                CallableSite::Function(function) => self.declare_function(function, pending),
                CallableSite::Property(property) => self.declare_property(property, pending),
            }
        }
        self.callables = callables;
    }

    fn receivers(
        &mut self,
        receiver: Option<&TypeAnnotation>,
        pending: &PendingCallable<'a>,
    ) -> (Option<Type>, Option<Type>) {
        let extension = receiver.map(|annotation| {
            let (resolver, diagnostics) = split(&mut self.table, pending.context.file);
            resolver.resolve(annotation, &pending.scope, diagnostics)
        });
        let dispatch = pending
            .context
            .owner
            .map(|owner| self.table.registry.declared_type(owner));
        (extension, dispatch)
    }

    fn register_callable(&mut self, info: DeclInfo<'a>, pending: &PendingCallable<'a>, node: NodeId) {
        let name = info.signature.name.clone();
        let package = info.package.clone();
        let id = self.table.push_declaration(info);
        match (pending.context.owner, pending.context.local) {
            (Some(owner), _) => self.table.register_member(owner, &name, id),
            (None, true) => {
                self.table.local_functions.insert(node, id);
            }
            (None, false) => self.table.register_package_callable(&package, &name, id),
        }
    }

    fn declare_function(&mut self, function: &'a FunctionDeclaration, pending: &PendingCallable<'a>) {
        let id: DeclId = self.table.next_decl_id();
        let type_parameters = self.table.type_parameters_of(function.id).to_vec();
        for param in &type_parameters {
            self.table
                .registry
                .set_type_parameter_owner(*param, TypeParameterOwner::Callable(id));
        }
        let parameters = self.value_parameters(&function.parameters, pending.context.file, &pending.scope);
        let (extension, dispatch) = self.receivers(function.receiver.as_ref(), pending);
        let implicit = function.return_type.is_none() && matches!(function.body, Some(FunctionBody::Expression(_)));
        let return_type = match &function.return_type {
            Some(annotation) => {
                let (resolver, diagnostics) = split(&mut self.table, pending.context.file);
                resolver.resolve(annotation, &pending.scope, diagnostics)
            }
            None if implicit => Type::Error,
            None => Type::unit(),
        };

        let mut signature = CallableSignature::function(id, function.name.as_str(), parameters, return_type)
            .with_type_parameters(type_parameters);
        if let Some(extension) = extension {
            signature = signature.with_extension_receiver(extension);
        }
        if let (Some(owner), Some(dispatch)) = (pending.context.owner, dispatch) {
            signature = signature.with_dispatch_receiver(owner, dispatch);
        }
        signature.declaration = Some(function.id);
        signature.span = function.span;

        let package = self.package_of(pending.context.file);
        self.register_callable(
            DeclInfo {
                id,
                signature: Arc::new(signature),
                implicit,
                package,
                file: Some(pending.context.file),
                is_local: pending.context.local,
                source: DeclSource::Function(function),
                property: None,
            },
            pending,
            function.id,
        );

        if !pending.context.local && function.body.is_some() {
            let name = match pending.context.class {
                Some(class) => format!("{}.{}", class.name, function.name),
                None => function.name.clone(),
            };
            self.table.bodies.push(BodyRef {
                kind: BodyKind::Function(function),
                file: pending.context.file,
                owner: pending.context.owner,
                class: pending.context.class,
                decl: Some(id),
                name,
                node: function.id,
                span: function.span,
            });
        }
    }

    fn declare_property(&mut self, property: &'a PropertyDeclaration, pending: &PendingCallable<'a>) {
        let id = self.table.next_decl_id();
        let (extension, dispatch) = self.receivers(property.receiver.as_ref(), pending);
        let implicit = property.type_annotation.is_none() && property.initializer.is_some();
        let ty = match &property.type_annotation {
            Some(annotation) => {
                let (resolver, diagnostics) = split(&mut self.table, pending.context.file);
                resolver.resolve(annotation, &pending.scope, diagnostics)
            }
            None if implicit => Type::Error,
            None => {
                self.table.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::CannotInferType, property.span)
                        .at_node(property.id)
                        .with_argument(property.name.clone()),
                );
                Type::Error
            }
        };

        let mut signature = CallableSignature::function(id, property.name.as_str(), Vec::new(), ty);
        signature.kind = CallableKind::Property;
        if let Some(extension) = extension {
            signature = signature.with_extension_receiver(extension);
        }
        if let (Some(owner), Some(dispatch)) = (pending.context.owner, dispatch) {
            signature = signature.with_dispatch_receiver(owner, dispatch);
        }
        signature.declaration = Some(property.id);
        signature.span = property.span;

        let stable = !property.is_mutable
            && !property.is_delegated
            && !property.has_custom_getter
            && !matches!(property.modality, Modality::Open | Modality::Abstract);
        let package = self.package_of(pending.context.file);
        self.register_callable(
            DeclInfo {
                id,
                signature: Arc::new(signature),
                implicit,
                package,
                file: Some(pending.context.file),
                is_local: pending.context.local,
                source: DeclSource::Property(property),
                property: Some(PropertyFacts {
                    mutable: property.is_mutable,
                    stable,
                }),
            },
            pending,
            property.id,
        );

        if !pending.context.local && property.initializer.is_some() {
            let name = match pending.context.class {
                Some(class) => format!("{}.{}", class.name, property.name),
                None => property.name.clone(),
            };
            self.table.bodies.push(BodyRef {
                kind: BodyKind::PropertyInitializer(property),
                file: pending.context.file,
                owner: pending.context.owner,
                class: pending.context.class,
                decl: Some(id),
                name,
                node: property.id,
                span: property.span,
            });
        }
    }
}

/// Resolver over the table's scopes plus its diagnostic sink.
fn split<'t, 'a>(table: &'t mut SymbolTable<'a>, file: usize) -> (TypeResolver<'t>, &'t mut Vec<Diagnostic>) {
    let resolver = TypeResolver::new(&table.registry, &table.packages, &table.files[file]);
    (resolver, &mut table.diagnostics)
}

/// Finds local functions and classes inside a body.
struct LocalScanner<'c, 'a> {
    collector: &'c mut DeclarationCollector<'a>,
    file: usize,
    scope: TypeScope,
}

impl<'c, 'a> Visitor<'a> for LocalScanner<'c, 'a> {
    fn visit_block(&mut self, block: &'a Block) {
        let mark = self.scope.len();
        for statement in &block.statements {
            if let Statement::LocalClass(class) = statement {
                let context = DeclContext::local(self.file, self.scope.clone());
                let id = self.collector.register_class(class, context);
                self.scope.push(class.name.clone(), ScopedType::Class(id));
            }
        }
        walk::walk_block(self, block);
        self.scope.truncate(mark);
    }

    fn visit_statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::LocalClass(_) => {}
            Statement::LocalFunction(function) => {
                let context = DeclContext::local(self.file, self.scope.clone());
                self.collector.register_function(function, context);
            }
            _ => walk::walk_statement(self, statement),
        }
    }
}
