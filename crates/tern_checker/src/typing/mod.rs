//! Body typing.
//!
//! One [`BodyTyper`] walks one body in evaluation order. It types every
//! expression, resolves calls through [`OverloadResolver`], builds the flow
//! graph as it goes and reads smart casts off the graph's current point.
//! Lambda bodies are typed when resolution asks for them, through
//! [`PostponedArgumentAnalyzer`].
//!
//! [`OverloadResolver`]: tern_inference::OverloadResolver
//! [`PostponedArgumentAnalyzer`]: tern_inference::PostponedArgumentAnalyzer

mod calls;
mod control;
mod expressions;
mod signatures;
mod statements;

pub use signatures::{SignatureLookup, TypingContext};

use crate::binding::{BindingId, BindingResolver, BindingTable};
use crate::flow::{DataFlowInfo, FlowBuilder, FlowVariable, InitializationAnalysis};
use crate::scope::ScopeTower;
use crate::symbols::{BodyKind, BodyRef, SymbolTable};
use crate::walk::{self, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use tern_ast::{
    Expression, ExpressionKind, FunctionBody, FunctionDeclaration, LambdaExpression, NodeId, PropertyDeclaration,
    Span, TypeAnnotation,
};
use tern_inference::{
    builtins, CallableSignature, DeclId, Diagnostic, DiagnosticCode, InferenceError, ResolvedCall, Type,
    TypeRegistry, TypeRelations, TypeVariableAllocator,
};
use tracing::{debug, trace};

/// Everything typing learned about one body.
#[derive(Debug, Clone, Serialize)]
pub struct BodyAnalysis {
    pub name: String,
    pub file: usize,
    pub node: NodeId,
    #[serde(skip)]
    pub expression_types: BTreeMap<NodeId, Type>,
    #[serde(skip)]
    pub calls: BTreeMap<NodeId, ResolvedCall>,
    /// Declarations selected for callable references and property reads.
    #[serde(skip)]
    pub references: BTreeMap<NodeId, DeclId>,
    /// Reads whose type was narrowed by flow information.
    #[serde(skip)]
    pub smart_casts: BTreeMap<NodeId, Type>,
    pub diagnostics: Vec<Diagnostic>,
    pub flow_nodes: usize,
}

impl BodyAnalysis {
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.expression_types.get(&node)
    }

    pub fn call(&self, node: NodeId) -> Option<&ResolvedCall> {
        self.calls.get(&node)
    }

    pub fn smart_cast(&self, node: NodeId) -> Option<&Type> {
        self.smart_casts.get(&node)
    }
}

/// Result of typing a body, including the type its value has.
pub(crate) struct TypedBody {
    pub analysis: BodyAnalysis,
    pub result: Type,
    /// A declaration needed its own return type while computing it.
    pub recursive: bool,
}

/// Whether the value of an expression is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Usage {
    Expression,
    Statement,
}

struct ReturnFrame {
    /// `None` while the return type is being inferred.
    declared: Option<Type>,
}

/// Lambdas are looked up by node when resolution asks for their bodies.
struct LambdaIndex<'a> {
    lambdas: FxHashMap<NodeId, &'a LambdaExpression>,
}

impl<'a> Visitor<'a> for LambdaIndex<'a> {
    fn visit_expression(&mut self, expression: &'a Expression) {
        if let ExpressionKind::Lambda(lambda) = &expression.kind {
            self.lambdas.insert(expression.id, lambda);
        }
        walk::walk_expression(self, expression);
    }
}

pub(crate) struct BodyTyper<'c, 'a> {
    ctx: &'c TypingContext<'c, 'a>,
    body: &'c BodyRef<'a>,
    registry: &'c TypeRegistry,
    scope: ScopeTower<'c, 'a>,
    bindings: BindingTable,
    binding_types: FxHashMap<BindingId, Type>,
    flow: FlowBuilder,
    variables: TypeVariableAllocator,
    lambdas: FxHashMap<NodeId, &'a LambdaExpression>,
    returns: Vec<ReturnFrame>,
    /// Return types computed for local functions and local class members.
    local_signatures: FxHashMap<DeclId, std::sync::Arc<CallableSignature>>,
    local_in_progress: FxHashSet<DeclId>,
    lambda_depth: usize,
    /// Property declaration read at a name or `this.name` node.
    property_reads: FxHashMap<NodeId, DeclId>,
    /// `Enum.ENTRY` and bare entry names inside the enum.
    enum_entries: FxHashMap<NodeId, String>,
    /// Names that denote an `object`.
    object_references: FxHashMap<NodeId, tern_inference::ClassId>,
    /// Calls resolved in dependent mode, waiting for the outer solution.
    dependent_stack: Vec<Vec<NodeId>>,
    /// Classes whose init code is being typed; their `val`s may be assigned.
    initializing: Vec<tern_inference::ClassId>,
    interrupted: Option<InferenceError>,
    recursive: bool,
    expression_types: BTreeMap<NodeId, Type>,
    calls: BTreeMap<NodeId, ResolvedCall>,
    references: BTreeMap<NodeId, DeclId>,
    smart_casts: BTreeMap<NodeId, Type>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'a> BodyTyper<'c, 'a> {
    pub(crate) fn new(ctx: &'c TypingContext<'c, 'a>, body: &'c BodyRef<'a>) -> Self {
        let table: &'c SymbolTable<'a> = ctx.table;
        Self {
            ctx,
            body,
            registry: table.registry(),
            scope: ScopeTower::new(table, body.file),
            bindings: BindingResolver::resolve(body),
            binding_types: FxHashMap::default(),
            flow: FlowBuilder::new(body.span, DataFlowInfo::empty()),
            variables: TypeVariableAllocator::new(),
            lambdas: FxHashMap::default(),
            returns: Vec::new(),
            local_signatures: FxHashMap::default(),
            local_in_progress: FxHashSet::default(),
            lambda_depth: 0,
            property_reads: FxHashMap::default(),
            enum_entries: FxHashMap::default(),
            object_references: FxHashMap::default(),
            dependent_stack: Vec::new(),
            initializing: Vec::new(),
            interrupted: None,
            recursive: false,
            expression_types: BTreeMap::new(),
            calls: BTreeMap::new(),
            references: BTreeMap::new(),
            smart_casts: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<TypedBody, InferenceError> {
        let body = self.body;
        trace!(body = %body.name, "typing body");
        self.index_lambdas();
        if let Some(owner) = body.owner {
            self.scope.push_receiver(owner);
        }
        if let Some(class) = body.class {
            self.scope.declare_type_parameters(class.id);
        }

        let result = match body.kind {
            BodyKind::Function(function) => match body.decl {
                Some(decl) => {
                    let info = self.ctx.table.decl(decl);
                    let signature = info.signature.clone();
                    self.function_contents(function, &signature, info.implicit)
                }
                None => Type::Error,
            },
            BodyKind::PropertyInitializer(property) => {
                self.declare_constructor_parameters();
                self.property_initializer(property)
            }
            BodyKind::InitBlock(block) => {
                self.declare_constructor_parameters();
                self.initializing.extend(body.owner);
                self.block(block, Usage::Statement, None);
                Type::unit()
            }
        };

        if let Some(error) = self.interrupted.take() {
            debug!(body = %body.name, %error, "body typing interrupted");
            return Err(error);
        }

        let graph = self.flow.finish();
        let initialization = InitializationAnalysis::new(&graph, &self.bindings).run();
        let mut diagnostics = self.diagnostics;
        diagnostics.extend(initialization);
        tern_inference::diagnostics::normalize(&mut diagnostics);
        debug!(
            body = %body.name,
            expressions = self.expression_types.len(),
            calls = self.calls.len(),
            flow_nodes = graph.node_count(),
            diagnostics = diagnostics.len(),
            "typed body"
        );

        Ok(TypedBody {
            analysis: BodyAnalysis {
                name: body.name.clone(),
                file: body.file,
                node: body.node,
                expression_types: self.expression_types,
                calls: self.calls,
                references: self.references,
                smart_casts: self.smart_casts,
                diagnostics,
                flow_nodes: graph.node_count(),
            },
            result,
            recursive: self.recursive,
        })
    }

    fn index_lambdas(&mut self) {
        let mut index = LambdaIndex {
            lambdas: FxHashMap::default(),
        };
        match self.body.kind {
            BodyKind::Function(function) => {
                for parameter in &function.parameters {
                    if let Some(default) = &parameter.default_value {
                        index.visit_expression(default);
                    }
                }
                walk::walk_function(&mut index, function);
            }
            BodyKind::PropertyInitializer(property) => {
                if let Some(initializer) = &property.initializer {
                    index.visit_expression(initializer);
                }
            }
            BodyKind::InitBlock(block) => index.visit_block(block),
        }
        self.lambdas = index.lambdas;
    }

    // ---- bodies -----------------------------------------------------------

    /// Types parameters, defaults and the body of a function; returns the
    /// return type, inferred when `implicit`.
    fn function_contents(&mut self, function: &'a FunctionDeclaration, signature: &CallableSignature, implicit: bool) -> Type {
        self.scope.push_level();
        self.scope.declare_type_parameters(function.id);
        let extension_receiver = signature
            .extension_receiver
            .as_ref()
            .and_then(|receiver| receiver.class_id());
        if let Some(class) = extension_receiver {
            self.scope.push_receiver(class);
        }

        for (parameter, declared) in function.parameters.iter().zip(&signature.parameters) {
            if let Some(default) = &parameter.default_value {
                let actual = self.infer(default, Some(&declared.ty));
                self.check_assignable(&actual, &declared.ty, default.span, default.id);
            }
            let ty = if declared.is_vararg {
                Type::generic(builtins::ARRAY, vec![declared.ty.clone()])
            } else {
                declared.ty.clone()
            };
            if let Some(binding) = self.bindings.declared_at(parameter.id) {
                self.binding_types.insert(binding, ty);
            }
        }

        let declared = (!implicit).then(|| signature.return_type.clone());
        self.returns.push(ReturnFrame {
            declared: declared.clone(),
        });
        let result = match &function.body {
            None => signature.return_type.clone(),
            Some(FunctionBody::Block(block)) => {
                self.block(block, Usage::Statement, None);
                match declared {
                    Some(declared) => {
                        let needs_value = !declared.is_unit() && !declared.is_error();
                        if needs_value && !self.flow.is_dead() {
                            self.diagnostics.push(
                                Diagnostic::new(DiagnosticCode::NoReturnInFunctionWithBlockBody, function.span)
                                    .at_node(function.id)
                                    .with_argument(function.name.clone()),
                            );
                        }
                        declared
                    }
                    None => Type::unit(),
                }
            }
            Some(FunctionBody::Expression(expression)) => {
                let actual = self.infer(expression, declared.as_ref());
                match declared {
                    Some(declared) => {
                        self.check_assignable(&actual, &declared, expression.span, expression.id);
                        declared
                    }
                    None => actual,
                }
            }
        };
        self.returns.pop();

        if extension_receiver.is_some() {
            self.scope.pop_receiver();
        }
        self.scope.pop_level();
        result
    }

    fn property_initializer(&mut self, property: &'a PropertyDeclaration) -> Type {
        let Some(decl) = self.body.decl else {
            return Type::Error;
        };
        let info = self.ctx.table.decl(decl);
        let declared = (!info.implicit).then(|| info.signature.return_type.clone());
        match &property.initializer {
            Some(initializer) => {
                let actual = self.infer(initializer, declared.as_ref());
                match declared {
                    Some(declared) => {
                        self.check_assignable(&actual, &declared, initializer.span, initializer.id);
                        declared
                    }
                    None => actual,
                }
            }
            None => declared.unwrap_or(Type::Error),
        }
    }

    fn declare_constructor_parameters(&mut self) {
        let Some(parameters) = self.body.class.and_then(|class| class.primary_constructor.as_ref()) else {
            return;
        };
        for parameter in parameters {
            let mut ty = match &parameter.type_annotation {
                Some(annotation) => self.resolve_quietly(annotation),
                None => Type::Error,
            };
            if parameter.is_vararg {
                ty = Type::generic(builtins::ARRAY, vec![ty]);
            }
            if let Some(binding) = self.bindings.declared_at(parameter.id) {
                self.binding_types.insert(binding, ty);
            }
        }
    }

    // ---- shared helpers -----------------------------------------------------

    fn relations(&self) -> TypeRelations<'c> {
        TypeRelations::new(self.registry)
    }

    fn render(&self, ty: &Type) -> String {
        self.registry.render(ty)
    }

    fn record_type(&mut self, node: NodeId, ty: &Type) {
        self.expression_types.insert(node, ty.clone());
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn resolve_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        let resolver = self.ctx.table.type_resolver(self.body.file);
        resolver.resolve(annotation, &self.scope, &mut self.diagnostics)
    }

    /// Resolves an annotation the collector already reported problems for.
    fn resolve_quietly(&self, annotation: &TypeAnnotation) -> Type {
        let resolver = self.ctx.table.type_resolver(self.body.file);
        let mut scratch = Vec::new();
        resolver.resolve(annotation, &self.scope, &mut scratch)
    }

    /// Reports `TYPE_MISMATCH` unless `actual` fits `expected`. Error types
    /// were reported where they came from.
    fn check_assignable(&mut self, actual: &Type, expected: &Type, span: Span, node: NodeId) {
        if actual.contains_error() || expected.contains_error() || actual.has_variables() || expected.has_variables() {
            return;
        }
        if self.relations().is_subtype(actual, expected) {
            return;
        }
        let diagnostic = Diagnostic::new(DiagnosticCode::TypeMismatch, span)
            .at_node(node)
            .with_arguments([self.render(expected), self.render(actual)]);
        self.report(diagnostic);
    }

    /// Integer literal typed against the expected type: the expected
    /// integral class when the value fits, otherwise `Int` or `Long`.
    fn literal_type(&self, value: i64, expected: Option<&Type>) -> Type {
        let class = expected
            .and_then(Type::class_id)
            .filter(|class| builtins::is_integral(*class) && builtins::literal_fits(value, *class))
            .unwrap_or_else(|| builtins::default_literal_class(value));
        Type::nominal(class)
    }

    fn declared_binding_type(&self, binding: BindingId) -> Type {
        self.binding_types.get(&binding).cloned().unwrap_or(Type::Error)
    }

    /// Flow variable an expression reads, with its stability.
    fn flow_variable(&self, expression: &Expression) -> Option<(FlowVariable, bool)> {
        match &expression.kind {
            ExpressionKind::Name(_) => {
                if let Some(binding) = self.bindings.reference(expression.id) {
                    return Some((FlowVariable::Local(binding), self.bindings.is_stable(binding)));
                }
                self.property_variable(expression.id)
            }
            ExpressionKind::MemberAccess { receiver, .. } if matches!(receiver.kind, ExpressionKind::This) => {
                self.property_variable(expression.id)
            }
            _ => None,
        }
    }

    fn property_variable(&self, node: NodeId) -> Option<(FlowVariable, bool)> {
        let decl = *self.property_reads.get(&node)?;
        let facts = self.ctx.table.decl(decl).property?;
        Some((FlowVariable::Property(decl), facts.stable))
    }

    /// Stops typing once the session was cancelled.
    fn check_cancelled(&mut self) -> bool {
        if self.interrupted.is_some() {
            return true;
        }
        match self.ctx.cancel.check() {
            Ok(()) => false,
            Err(error) => {
                self.interrupted = Some(error);
                true
            }
        }
    }

    /// Limits become diagnostics; cancellation stops the body.
    fn absorb(&mut self, error: InferenceError, span: Span, node: NodeId) {
        match error {
            InferenceError::Cancelled => self.interrupted = Some(error),
            InferenceError::LimitExceeded { limit, .. } => self.report(
                Diagnostic::new(DiagnosticCode::InferenceLimitExceeded, span)
                    .at_node(node)
                    .with_argument(limit),
            ),
        }
    }
}
