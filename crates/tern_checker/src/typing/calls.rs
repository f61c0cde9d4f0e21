//! Calls, property reads, operators, lambdas and callable references.
//!
//! Every call goes through [`OverloadResolver`]. Arguments are typed first,
//! in source order; nested generic calls are resolved in dependent mode and
//! hand their unfinished constraint system to the enclosing call, whose
//! solution is written back into the nested calls once it completes.

use super::{BodyTyper, SignatureLookup, Usage};
use crate::flow::{FlowEvent, FlowNodeKind};
use crate::scope::LookupGroup;
use std::sync::Arc;
use tern_ast::{
    CallExpression, CallableReferenceReceiver, Callee, Expression, ExpressionKind, LambdaExpression, Literal, NodeId,
    Span, Statement, UnaryOp,
};
use tern_inference::{
    ArgumentValue, CallArgument, CallSite, CallableKind, CallableSignature, CandidateEntry, CandidateGroup,
    ConstraintSystem, DeclId, Diagnostic, DiagnosticCode, LambdaParameter, LambdaResult, LambdaShape,
    OverloadResolver, PostponedArgumentAnalyzer, ReceiverArgument, ReferenceReceiver, ReferenceShape,
    ResolutionMode, ResolutionOutcome, ScopeLevel, Substitutor, Type, TypeVariableAllocator, ValueParameter,
};
use tracing::trace;

/// Result of typing a call; dependent calls may leave a system behind.
pub(super) struct CallTyping<'c> {
    pub ty: Type,
    pub system: Option<ConstraintSystem<'c>>,
}

impl CallTyping<'_> {
    fn error() -> Self {
        Self {
            ty: Type::Error,
            system: None,
        }
    }
}

/// What a call expression is resolved against.
enum CallTarget {
    Groups {
        groups: Vec<CandidateGroup>,
        receiver: Option<ReceiverArgument>,
    },
    /// A value of function type called through `invoke`.
    Invoke(Type),
    /// The callee already failed; only the arguments are typed.
    Failed,
}

/// Integer literal argument whose type depends on the chosen parameter.
struct LiteralArgument {
    index: usize,
    nodes: Vec<NodeId>,
    value: i64,
}

const INVOKE: &str = "invoke";

impl<'c, 'a> BodyTyper<'c, 'a> {
    pub(super) fn infer_call(
        &mut self,
        expression: &'a Expression,
        call: &'a CallExpression,
        expected: Option<&Type>,
        mode: ResolutionMode,
    ) -> CallTyping<'c> {
        let (name, target) = self.call_target(expression, &call.callee);
        let target = match target {
            CallTarget::Invoke(ty) => self.invoke_target(expression, ty),
            other => other,
        };

        let type_arguments: Vec<Type> = call
            .type_arguments
            .iter()
            .map(|annotation| self.resolve_annotation(annotation))
            .collect();

        self.dependent_stack.push(Vec::new());
        let mut literals = Vec::new();
        let mut postponed_nodes = Vec::new();
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for (index, argument) in call.arguments.iter().enumerate() {
            let value = self.argument_value(&argument.value, index, &mut literals, &mut postponed_nodes);
            arguments.push(CallArgument {
                name: argument.name.clone(),
                spread: argument.spread,
                value,
                span: argument.value.span,
            });
        }

        let (groups, receiver) = match target {
            CallTarget::Groups { groups, receiver } => (groups, receiver),
            CallTarget::Invoke(_) => (Vec::new(), None),
            CallTarget::Failed => {
                self.dependent_stack.pop();
                self.arguments_in_error_mode(&arguments);
                self.record_literals(&literals, None);
                self.finish_call(expression, &Type::Error);
                return CallTyping::error();
            }
        };

        let mut site = CallSite::new(expression.id, expression.span, name);
        site.explicit_receiver = receiver;
        site.type_arguments = type_arguments;
        site.arguments = arguments;
        site.mode = mode;
        if mode == ResolutionMode::Full {
            site.expected_type = expected.cloned();
        }

        let resolver = OverloadResolver::new(self.registry, self.ctx.config);
        let resolved = resolver.resolve(site, &groups, self);
        let mut frame = self.dependent_stack.pop().unwrap_or_default();
        let outcome = match resolved {
            Ok(outcome) => outcome,
            Err(error) => {
                self.absorb(error, expression.span, expression.id);
                self.record_literals(&literals, None);
                self.finish_call(expression, &Type::Error);
                return CallTyping::error();
            }
        };

        let ResolutionOutcome {
            call: resolved_call,
            ty,
            system,
            solution,
            diagnostics,
        } = outcome;
        self.diagnostics.extend(diagnostics);
        match resolved_call {
            Some(resolved_call) => {
                for result in &resolved_call.postponed {
                    self.record_type(result.node, &result.ty);
                    if let Some(reference) = &result.reference {
                        self.references.insert(result.node, reference.id);
                    }
                }
                self.record_literals(&literals, Some(&resolved_call));
                trace!(call = %resolved_call.signature.name, level = ?resolved_call.level, "call typed");
                self.calls.insert(expression.id, resolved_call);
            }
            None => self.record_literals(&literals, None),
        }

        match mode {
            ResolutionMode::Full => self.apply_solution(&frame, &solution),
            ResolutionMode::Dependent => {
                frame.push(expression.id);
                frame.extend(literals.iter().flat_map(|literal| literal.nodes.iter().copied()));
                frame.extend(postponed_nodes);
                if let Some(parent) = self.dependent_stack.last_mut() {
                    parent.extend(frame);
                }
            }
        }

        self.finish_call(expression, &ty);
        CallTyping { ty, system }
    }

    /// Name used for resolution and the target of the callee.
    fn call_target(&mut self, expression: &'a Expression, callee: &'a Callee) -> (String, CallTarget) {
        match callee {
            Callee::Name { name, span } => {
                if let Some(binding) = self.bindings.callee(expression.id) {
                    let ty = self.read_binding(binding, expression.id, *span);
                    return (INVOKE.to_string(), CallTarget::Invoke(ty));
                }
                let lookup = self.scope.lookup(name);
                let groups = self.candidate_groups(lookup, false, expression.span, expression.id);
                if groups.is_empty() {
                    if let Some((ty, _)) = self.resolve_property(expression.id, *span, name, None) {
                        return (INVOKE.to_string(), CallTarget::Invoke(ty));
                    }
                }
                (
                    name.clone(),
                    CallTarget::Groups {
                        groups,
                        receiver: None,
                    },
                )
            }
            Callee::Member {
                receiver,
                name,
                safe,
                span,
            } => {
                let receiver_ty = match self.infer_receiver(receiver) {
                    super::expressions::Receiver::Value(ty) => ty,
                    // Members of a class name are enum entries and those
                    // are not callable.
                    super::expressions::Receiver::Class(_) => {
                        return (
                            name.clone(),
                            CallTarget::Groups {
                                groups: Vec::new(),
                                receiver: None,
                            },
                        )
                    }
                };
                if receiver_ty.is_error() {
                    return (name.clone(), CallTarget::Failed);
                }
                let argument = ReceiverArgument {
                    ty: receiver_ty,
                    safe: *safe,
                    span: receiver.span,
                };
                let lookup = self.scope.lookup_with_receiver(&argument.ty, name);
                let groups = self.candidate_groups(lookup, false, expression.span, expression.id);
                if groups.is_empty() {
                    if let Some((ty, _)) = self.resolve_property(expression.id, *span, name, Some(argument.clone())) {
                        return (INVOKE.to_string(), CallTarget::Invoke(ty));
                    }
                }
                (
                    name.clone(),
                    CallTarget::Groups {
                        groups,
                        receiver: Some(argument),
                    },
                )
            }
            Callee::Expression(inner) => {
                let ty = self.infer(inner, None);
                (INVOKE.to_string(), CallTarget::Invoke(ty))
            }
        }
    }

    /// Candidate for calling a value of function type.
    fn invoke_target(&mut self, expression: &Expression, callee: Type) -> CallTarget {
        if callee.contains_error() {
            return CallTarget::Failed;
        }
        let Some((inputs, output)) = self.registry.function_parts(&callee.make_non_null()) else {
            return CallTarget::Groups {
                groups: Vec::new(),
                receiver: None,
            };
        };
        if callee.is_nullable() {
            let rendered = self.render(&callee);
            self.report(
                Diagnostic::new(DiagnosticCode::UnsafeCall, expression.span)
                    .at_node(expression.id)
                    .with_argument(rendered),
            );
        }
        let parameters = inputs
            .into_iter()
            .enumerate()
            .map(|(index, ty)| ValueParameter::new(format!("p{}", index + 1), ty))
            .collect();
        let mut signature = CallableSignature::function(DeclId::new(u32::MAX), INVOKE, parameters, output);
        signature.kind = CallableKind::LocalValue;
        signature.span = expression.span;
        CallTarget::Groups {
            groups: vec![CandidateGroup {
                level: ScopeLevel::Local,
                entries: vec![CandidateEntry::new(Arc::new(signature))],
            }],
            receiver: None,
        }
    }

    fn argument_value(
        &mut self,
        value: &'a Expression,
        index: usize,
        literals: &mut Vec<LiteralArgument>,
        postponed: &mut Vec<NodeId>,
    ) -> ArgumentValue<'c> {
        if let Some((literal, nodes)) = self.integer_argument(value) {
            literals.push(LiteralArgument {
                index,
                nodes,
                value: literal,
            });
            return ArgumentValue::IntegerLiteral(literal);
        }
        match &value.kind {
            ExpressionKind::Lambda(lambda) => {
                postponed.push(value.id);
                ArgumentValue::Lambda(self.lambda_shape(value, lambda))
            }
            ExpressionKind::CallableReference { receiver, name } => {
                postponed.push(value.id);
                let shape = self.reference_shape(value, receiver.as_ref(), name);
                self.flow.emit(FlowNodeKind::Expression, Some(value.id), value.span);
                ArgumentValue::CallableReference(shape)
            }
            ExpressionKind::Call(call) => {
                let typed = self.infer_call(value, call, None, ResolutionMode::Dependent);
                self.record_type(value.id, &typed.ty);
                ArgumentValue::Typed {
                    ty: typed.ty,
                    nested: typed.system.map(Box::new),
                }
            }
            _ => ArgumentValue::Typed {
                ty: self.infer(value, None),
                nested: None,
            },
        }
    }

    /// `42` and `-42` as arguments; the literal's type is decided by the
    /// parameter it lands on.
    fn integer_argument(&mut self, value: &Expression) -> Option<(i64, Vec<NodeId>)> {
        let (literal, nodes) = match &value.kind {
            ExpressionKind::Literal(Literal::Integer(literal)) => (*literal, vec![value.id]),
            ExpressionKind::Unary {
                op: UnaryOp::Minus,
                operand,
            } => match operand.kind {
                ExpressionKind::Literal(Literal::Integer(literal)) => (literal.wrapping_neg(), vec![value.id, operand.id]),
                _ => return None,
            },
            _ => return None,
        };
        self.flow.emit(FlowNodeKind::Expression, Some(value.id), value.span);
        Some((literal, nodes))
    }

    fn record_literals(&mut self, literals: &[LiteralArgument], call: Option<&tern_inference::ResolvedCall>) {
        for literal in literals {
            let parameter = call.and_then(|call| call.parameter_type_of(literal.index));
            let ty = self.literal_type(literal.value, parameter);
            for node in &literal.nodes {
                self.record_type(*node, &ty);
            }
        }
    }

    /// Writes the outer solution into calls resolved in dependent mode.
    fn apply_solution(&mut self, nodes: &[NodeId], solution: &Substitutor) {
        if solution.is_empty() {
            return;
        }
        for node in nodes {
            if let Some(call) = self.calls.get_mut(node) {
                call.substitute(solution);
            }
            if let Some(ty) = self.expression_types.get_mut(node) {
                *ty = solution.apply(ty);
            }
        }
    }

    /// Flow node of a finished call. Calls may run arbitrary code, so only
    /// stable facts survive them; calls returning `Nothing` never complete.
    fn finish_call(&mut self, expression: &Expression, ty: &Type) {
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        if ty.is_nothing() {
            self.flow.throw(expression.span);
            return;
        }
        let info = self.flow.info().retain_stable();
        self.flow.set_info(info);
    }

    /// Lambdas of a call that could not be resolved are still typed, with
    /// unknown parameter types.
    fn arguments_in_error_mode(&mut self, arguments: &[CallArgument<'c>]) {
        for argument in arguments {
            if let ArgumentValue::Lambda(shape) = &argument.value {
                let parameters = vec![Type::Error; shape.parameters.len().max(1)];
                let result = self.analyze_lambda(shape, &parameters, None);
                self.record_type(shape.node, &Type::Error);
                trace!(node = shape.node.to_raw(), result = ?result.return_type, "lambda typed in error mode");
            }
        }
    }

    // ---- candidates -----------------------------------------------------------

    /// Turns lookup groups into resolution groups, keeping either properties
    /// or everything callable.
    fn candidate_groups(&mut self, lookup: Vec<LookupGroup>, properties: bool, span: Span, node: NodeId) -> Vec<CandidateGroup> {
        let mut groups = Vec::new();
        for group in lookup {
            let mut entries = Vec::new();
            for entry in group.entries {
                let is_property = self.ctx.table.decl(entry.decl).signature.kind == CallableKind::Property;
                if is_property != properties {
                    continue;
                }
                if let Some(signature) = self.signature_of(entry.decl, span, node) {
                    entries.push(CandidateEntry {
                        signature,
                        implicit_receiver: entry.implicit_receiver,
                    });
                }
            }
            if !entries.is_empty() {
                groups.push(CandidateGroup {
                    level: group.level,
                    entries,
                });
            }
        }
        groups
    }

    /// Signature with its return type inferred where none was written.
    pub(super) fn signature_of(&mut self, decl: DeclId, span: Span, node: NodeId) -> Option<Arc<CallableSignature>> {
        if let Some(signature) = self.local_signatures.get(&decl) {
            return Some(signature.clone());
        }
        let info = self.ctx.table.decl(decl);
        if info.is_local {
            if info.implicit && self.local_in_progress.contains(&decl) {
                let name = info.signature.name.clone();
                self.report(
                    Diagnostic::new(DiagnosticCode::TypecheckerHasRunIntoRecursiveProblem, span)
                        .at_node(node)
                        .with_argument(name),
                );
            }
            return Some(info.signature.clone());
        }
        match self.ctx.signature(decl) {
            Ok(SignatureLookup::Ready(signature)) => Some(signature),
            Ok(SignatureLookup::Recursive(signature)) => {
                self.recursive = true;
                self.report(
                    Diagnostic::new(DiagnosticCode::TypecheckerHasRunIntoRecursiveProblem, span)
                        .at_node(node)
                        .with_argument(signature.name.clone()),
                );
                Some(signature)
            }
            Err(error) => {
                self.absorb(error, span, node);
                None
            }
        }
    }

    /// Resolves a property read; `None` when no property of that name is
    /// visible at all.
    pub(super) fn resolve_property(
        &mut self,
        node: NodeId,
        span: Span,
        name: &str,
        receiver: Option<ReceiverArgument>,
    ) -> Option<(Type, Option<DeclId>)> {
        let lookup = match &receiver {
            Some(receiver) => self.scope.lookup_with_receiver(&receiver.ty, name),
            None => self.scope.lookup(name),
        };
        let groups = self.candidate_groups(lookup, true, span, node);
        if groups.is_empty() {
            return None;
        }

        let mut site = CallSite::new(node, span, name);
        site.explicit_receiver = receiver;
        let resolver = OverloadResolver::new(self.registry, self.ctx.config);
        match resolver.resolve(site, &groups, self) {
            Ok(outcome) => {
                self.diagnostics.extend(outcome.diagnostics);
                let decl = outcome.call.as_ref().map(|call| call.signature.id);
                if let Some(decl) = decl {
                    self.references.insert(node, decl);
                    self.property_reads.insert(node, decl);
                }
                Some((outcome.ty, decl))
            }
            Err(error) => {
                self.absorb(error, span, node);
                Some((Type::Error, None))
            }
        }
    }

    // ---- operators ------------------------------------------------------------

    /// `a + b`, `a < b`, `-a` and friends as calls of their operator
    /// functions on the left operand.
    pub(super) fn infer_operator(
        &mut self,
        expression: &'a Expression,
        function: &str,
        left: &'a Expression,
        right: Option<&'a Expression>,
    ) -> Type {
        let left_ty = self.infer(left, None);
        let mut literal = None;
        let argument = right.map(|right| match self.integer_argument(right) {
            Some((value, nodes)) => {
                literal = Some(LiteralArgument { index: 0, nodes, value });
                CallArgument::literal(value, right.span)
            }
            None => CallArgument::typed(self.infer(right, None), right.span),
        });
        let right_failed = matches!(
            &argument,
            Some(CallArgument {
                value: ArgumentValue::Typed { ty, .. },
                ..
            }) if ty.contains_error()
        );
        if left_ty.contains_error() || right_failed {
            self.record_literals(literal.as_slice(), None);
            self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
            return Type::Error;
        }

        let lookup = self.scope.lookup_with_receiver(&left_ty, function);
        let groups = self.candidate_groups(lookup, false, expression.span, expression.id);
        let mut site = CallSite::new(expression.id, expression.span, function);
        site.explicit_receiver = Some(ReceiverArgument {
            ty: left_ty,
            safe: false,
            span: left.span,
        });
        site.arguments = argument.into_iter().collect();

        let resolver = OverloadResolver::new(self.registry, self.ctx.config);
        let ty = match resolver.resolve(site, &groups, self) {
            Ok(outcome) => {
                self.diagnostics.extend(outcome.diagnostics);
                self.record_literals(literal.as_slice(), outcome.call.as_ref());
                if let Some(call) = outcome.call {
                    self.calls.insert(expression.id, call);
                }
                outcome.ty
            }
            Err(error) => {
                self.absorb(error, expression.span, expression.id);
                Type::Error
            }
        };
        self.finish_call(expression, &ty);
        ty
    }

    // ---- callable references ----------------------------------------------------

    fn reference_shape(
        &mut self,
        expression: &'a Expression,
        receiver: Option<&'a CallableReferenceReceiver>,
        name: &str,
    ) -> ReferenceShape {
        let (receiver, lookup) = match receiver {
            None => (ReferenceReceiver::None, self.scope.lookup(name)),
            Some(CallableReferenceReceiver::Type(annotation)) => {
                let ty = self.resolve_annotation(annotation);
                let lookup = self.scope.lookup_with_receiver(&ty, name);
                (ReferenceReceiver::Unbound(ty), lookup)
            }
            Some(CallableReferenceReceiver::Expression(inner)) => {
                let ty = self.infer(inner, None);
                let lookup = self.scope.lookup_with_receiver(&ty, name);
                (ReferenceReceiver::Bound(ty), lookup)
            }
        };

        // The closest level that has the name decides, like for calls.
        let mut candidates = Vec::new();
        for group in lookup {
            for entry in group.entries {
                if let Some(signature) = self.signature_of(entry.decl, expression.span, expression.id) {
                    candidates.push(signature);
                }
            }
            if !candidates.is_empty() {
                break;
            }
        }
        ReferenceShape {
            node: expression.id,
            span: expression.span,
            name: name.to_string(),
            receiver,
            candidates,
        }
    }

    /// A reference outside of a call argument: its candidates are filtered by
    /// the expected function type, if any.
    pub(super) fn infer_reference(
        &mut self,
        expression: &'a Expression,
        receiver: Option<&'a CallableReferenceReceiver>,
        name: &str,
        expected: Option<&Type>,
    ) -> Type {
        let shape = self.reference_shape(expression, receiver, name);
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        let unbound = match &shape.receiver {
            ReferenceReceiver::Unbound(ty) => Some(ty.clone()),
            _ => None,
        };
        if unbound.as_ref().map_or(false, Type::contains_error)
            || matches!(&shape.receiver, ReferenceReceiver::Bound(ty) if ty.contains_error())
        {
            return Type::Error;
        }

        let typed: Vec<(Arc<CallableSignature>, Type)> = shape
            .candidates
            .iter()
            .map(|signature| {
                let ty = signature.reference_type(self.registry, unbound.as_ref());
                (signature.clone(), ty)
            })
            .collect();
        let mut chosen: Vec<&(Arc<CallableSignature>, Type)> = typed.iter().collect();
        if chosen.len() > 1 {
            if let Some(expected) = expected.filter(|expected| self.registry.is_function_type(expected)) {
                let relations = self.relations();
                chosen.retain(|(_, ty)| relations.is_subtype(ty, expected));
            }
        }

        if let [(signature, ty)] = chosen.as_slice() {
            self.references.insert(expression.id, signature.id);
            return ty.clone();
        }
        if typed.is_empty() {
            self.report(
                Diagnostic::new(DiagnosticCode::UnresolvedReference, expression.span)
                    .at_node(expression.id)
                    .with_argument(name),
            );
            return Type::Error;
        }
        let pool = if chosen.is_empty() { typed.iter().collect() } else { chosen };
        let names: Vec<String> = pool
            .iter()
            .map(|(signature, _)| signature.describe(self.registry))
            .collect();
        self.report(
            Diagnostic::new(DiagnosticCode::CallableReferenceResolutionAmbiguity, expression.span)
                .at_node(expression.id)
                .with_argument(names.join(", ")),
        );
        Type::Error
    }

    // ---- lambdas ------------------------------------------------------------------

    fn lambda_shape(&mut self, expression: &Expression, lambda: &'a LambdaExpression) -> LambdaShape {
        let parameters = lambda
            .parameters
            .iter()
            .map(|parameter| LambdaParameter {
                name: parameter.name.clone(),
                ty: parameter
                    .type_annotation
                    .as_ref()
                    .map(|annotation| self.resolve_annotation(annotation)),
            })
            .collect();
        LambdaShape {
            node: expression.id,
            span: expression.span,
            parameters,
            implicit_parameters: lambda.parameters.is_empty(),
            invocation: lambda.invocation,
        }
    }

    /// A lambda that is not a call argument; its parameter types come from
    /// annotations or the expected function type.
    pub(super) fn infer_lambda(&mut self, expression: &'a Expression, lambda: &'a LambdaExpression, expected: Option<&Type>) -> Type {
        let expected_parts = expected.and_then(|expected| self.registry.function_parts(&expected.make_non_null()));
        let shape = self.lambda_shape(expression, lambda);

        let mut parameter_types = Vec::new();
        if shape.implicit_parameters {
            if let Some((inputs, _)) = &expected_parts {
                parameter_types.extend(inputs.iter().take(1).cloned());
            }
        } else {
            for (index, (parameter, declared)) in lambda.parameters.iter().zip(&shape.parameters).enumerate() {
                let from_expected = expected_parts
                    .as_ref()
                    .and_then(|(inputs, _)| inputs.get(index).cloned());
                match declared.ty.clone().or(from_expected) {
                    Some(ty) => parameter_types.push(ty),
                    None => {
                        self.report(
                            Diagnostic::new(DiagnosticCode::CannotInferParameterType, parameter.span)
                                .at_node(parameter.id)
                                .with_argument(parameter.name.clone()),
                        );
                        parameter_types.push(Type::Error);
                    }
                }
            }
        }

        let expected_return = expected_parts.map(|(_, output)| output);
        let result = self.lambda_body(expression.id, expression.span, lambda, &parameter_types, expected_return.as_ref());
        self.registry.function_type(parameter_types, result.return_type)
    }

    /// Types a lambda body as a closure of the current flow point.
    fn lambda_body(
        &mut self,
        node: NodeId,
        span: Span,
        lambda: &'a LambdaExpression,
        parameter_types: &[Type],
        expected_return: Option<&Type>,
    ) -> LambdaResult {
        if self.lambda_depth >= self.ctx.config.limits.max_lambda_depth {
            self.report(
                Diagnostic::new(DiagnosticCode::InferenceLimitExceeded, span)
                    .at_node(node)
                    .with_argument("max_lambda_depth"),
            );
            return LambdaResult::new(Type::Error);
        }
        self.lambda_depth += 1;

        let info = if lambda.invocation.is_in_place() {
            self.flow.info()
        } else {
            self.flow.info().retain_stable()
        };
        let handle = self.flow.enter_closure(node, span, lambda.invocation, info);
        self.scope.push_level();

        let declared: Vec<(NodeId, Type)> = if lambda.parameters.is_empty() {
            vec![(node, parameter_types.first().cloned().unwrap_or(Type::Error))]
        } else {
            lambda
                .parameters
                .iter()
                .enumerate()
                .map(|(index, parameter)| (parameter.id, parameter_types.get(index).cloned().unwrap_or(Type::Error)))
                .collect()
        };
        for (site, ty) in declared {
            if let Some(binding) = self.bindings.declared_at(site) {
                self.binding_types.insert(binding, ty);
                self.flow.record(FlowEvent::Declare {
                    binding,
                    initialized: true,
                });
            }
        }

        let returns_unit = expected_return.map_or(false, Type::is_unit);
        let usage = if returns_unit { Usage::Statement } else { Usage::Expression };
        let value = self.block(&lambda.body, usage, expected_return);
        let return_type = if returns_unit { Type::unit() } else { value };
        let return_literal = match lambda.body.statements.last() {
            Some(Statement::Expression(last)) if !returns_unit => match &last.kind {
                ExpressionKind::Literal(Literal::Integer(value)) => Some(*value),
                ExpressionKind::Unary {
                    op: UnaryOp::Minus,
                    operand,
                } => match operand.kind {
                    ExpressionKind::Literal(Literal::Integer(value)) => Some(value.wrapping_neg()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };

        self.scope.pop_level();
        self.flow.leave_closure(handle);
        self.lambda_depth -= 1;
        LambdaResult {
            return_type,
            return_literal,
        }
    }
}

impl<'c, 'a> PostponedArgumentAnalyzer for BodyTyper<'c, 'a> {
    fn analyze_lambda(&mut self, lambda: &LambdaShape, parameter_types: &[Type], expected_return: Option<&Type>) -> LambdaResult {
        match self.lambdas.get(&lambda.node).copied() {
            Some(expression) => self.lambda_body(lambda.node, lambda.span, expression, parameter_types, expected_return),
            None => LambdaResult::new(Type::Error),
        }
    }

    fn variables(&mut self) -> &mut TypeVariableAllocator {
        &mut self.variables
    }

    fn is_cancelled(&self) -> bool {
        self.ctx.cancel.is_cancelled()
    }
}
