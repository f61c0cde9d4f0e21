use super::{BodyTyper, Usage};
use crate::flow::{FlowEvent, FlowNodeKind, FlowVariable, JumpTarget};
use crate::binding::BindingId;
use tern_ast::{BinaryOp, Expression, ExpressionKind, Literal, NodeId, Span, TypeAnnotation, UnaryOp};
use tern_inference::{builtins, ClassId, Diagnostic, DiagnosticCode, ReceiverArgument, ResolutionMode, Type};

/// What the left side of `a.b` denotes.
pub(super) enum Receiver {
    Value(Type),
    /// A class name used as a qualifier.
    Class(ClassId),
}

impl<'c, 'a> BodyTyper<'c, 'a> {
    pub(super) fn infer(&mut self, expression: &'a Expression, expected: Option<&Type>) -> Type {
        self.infer_with(expression, expected, Usage::Expression)
    }

    pub(super) fn infer_with(&mut self, expression: &'a Expression, expected: Option<&Type>, usage: Usage) -> Type {
        let ty = match &expression.kind {
            ExpressionKind::Literal(literal) => self.infer_literal(expression, literal, expected),
            ExpressionKind::Name(name) => self.infer_name(expression, name),
            ExpressionKind::This => self.infer_this(expression),
            ExpressionKind::MemberAccess { receiver, name, safe } => {
                self.infer_member_access(expression, receiver, name, *safe)
            }
            ExpressionKind::Call(call) => self.infer_call(expression, call, expected, ResolutionMode::Full).ty,
            ExpressionKind::Binary { op, left, right } => self.infer_binary(expression, *op, left, right, expected),
            ExpressionKind::Unary { op, operand } => self.infer_unary(expression, *op, operand, expected),
            ExpressionKind::Is { .. } => {
                self.condition(expression);
                Type::boolean()
            }
            ExpressionKind::As {
                expr,
                type_annotation,
                safe,
            } => self.infer_cast(expression, expr, type_annotation, *safe),
            ExpressionKind::NotNullAssertion(inner) => self.infer_not_null(expression, inner),
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.infer_if(expression, condition, then_branch, else_branch.as_deref(), expected, usage),
            ExpressionKind::When(when) => self.infer_when(expression, when, expected, usage),
            ExpressionKind::Block(block) => self.block(block, usage, expected),
            ExpressionKind::Lambda(lambda) => self.infer_lambda(expression, lambda, expected),
            ExpressionKind::CallableReference { receiver, name } => {
                self.infer_reference(expression, receiver.as_ref(), name, expected)
            }
            ExpressionKind::Try(try_expression) => self.infer_try(expression, try_expression, expected, usage),
            ExpressionKind::Throw(value) => self.infer_throw(expression, value),
            ExpressionKind::Return(value) => self.infer_return(expression, value.as_deref()),
            ExpressionKind::Break | ExpressionKind::Continue => {
                self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
                let target = match (&expression.kind, self.flow.innermost_loop()) {
                    (ExpressionKind::Break, Some(id)) => JumpTarget::Break(id),
                    (ExpressionKind::Continue, Some(id)) => JumpTarget::Continue(id),
                    _ => JumpTarget::Return,
                };
                self.flow.jump(target, expression.span);
                Type::nothing()
            }
        };
        self.record_type(expression.id, &ty);
        ty
    }

    fn infer_literal(&mut self, expression: &Expression, literal: &Literal, expected: Option<&Type>) -> Type {
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        match literal {
            Literal::Boolean(_) => Type::boolean(),
            Literal::Integer(value) => self.literal_type(*value, expected),
            Literal::Long(_) => Type::long(),
            Literal::Double(_) => Type::nominal(builtins::DOUBLE),
            Literal::Float(_) => Type::nominal(builtins::FLOAT),
            Literal::Character(_) => Type::nominal(builtins::CHAR),
            Literal::String(_) => Type::string(),
            Literal::Null => Type::null(),
        }
    }

    // ---- names --------------------------------------------------------------

    fn infer_name(&mut self, expression: &'a Expression, name: &str) -> Type {
        if let Some(binding) = self.bindings.reference(expression.id) {
            return self.read_binding(binding, expression.id, expression.span);
        }

        if let Some((ty, decl)) = self.resolve_property(expression.id, expression.span, name, None) {
            self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
            return match decl {
                Some(decl) => self.read_property(decl, ty, expression.id),
                None => ty,
            };
        }

        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        match self.scope.lookup_class(name) {
            Some(class) if self.registry.class(class).is_object() => {
                self.object_references.insert(expression.id, class);
                self.registry.declared_type(class)
            }
            Some(_) => {
                self.report(
                    Diagnostic::new(DiagnosticCode::NoCompanionObject, expression.span)
                        .at_node(expression.id)
                        .with_argument(name),
                );
                Type::Error
            }
            None => {
                self.report(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, expression.span)
                        .at_node(expression.id)
                        .with_argument(name),
                );
                Type::Error
            }
        }
    }

    pub(super) fn read_binding(&mut self, binding: BindingId, node: NodeId, span: Span) -> Type {
        let declared = self.declared_binding_type(binding);
        self.flow.emit(FlowNodeKind::Expression, Some(node), span);
        self.flow.record(FlowEvent::Read { binding, node, span });
        let stable = self.bindings.is_stable(binding);
        self.narrow_read(FlowVariable::Local(binding), declared, stable, node)
    }

    fn read_property(&mut self, decl: tern_inference::DeclId, ty: Type, node: NodeId) -> Type {
        match self.ctx.table.decl(decl).property {
            Some(facts) => self.narrow_read(FlowVariable::Property(decl), ty, facts.stable, node),
            None => ty,
        }
    }

    /// Declared type of a read intersected with what the flow knows.
    /// Unstable reads are never narrowed.
    fn narrow_read(&mut self, variable: FlowVariable, declared: Type, stable: bool, node: NodeId) -> Type {
        if !stable {
            return declared;
        }
        let relations = self.relations();
        match self.flow.info().narrowed_type(variable, &declared, &relations) {
            Some(narrowed) => {
                self.smart_casts.insert(node, narrowed.clone());
                narrowed
            }
            None => declared,
        }
    }

    fn infer_this(&mut self, expression: &Expression) -> Type {
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        match self.scope.this_receiver() {
            Some(receiver) => receiver.ty.clone(),
            None => {
                self.report(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, expression.span)
                        .at_node(expression.id)
                        .with_argument("this"),
                );
                Type::Error
            }
        }
    }

    /// Types the left side of `a.b`. A simple name that is neither a local
    /// nor a property but a class is a qualifier.
    pub(super) fn infer_receiver(&mut self, receiver: &'a Expression) -> Receiver {
        if let ExpressionKind::Name(name) = &receiver.kind {
            let qualifier = self.bindings.reference(receiver.id).is_none() && !self.has_property(name);
            if let Some(class) = qualifier.then(|| self.scope.lookup_class(name)).flatten() {
                if !self.registry.class(class).is_object() {
                    self.flow.emit(FlowNodeKind::Expression, Some(receiver.id), receiver.span);
                    return Receiver::Class(class);
                }
            }
        }
        Receiver::Value(self.infer(receiver, None))
    }

    fn infer_member_access(&mut self, expression: &'a Expression, receiver: &'a Expression, name: &str, safe: bool) -> Type {
        let receiver_ty = match self.infer_receiver(receiver) {
            Receiver::Value(ty) => ty,
            Receiver::Class(class) => {
                self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
                let info = self.registry.class(class);
                if info.is_enum() && info.enum_entries.iter().any(|entry| entry == name) {
                    self.enum_entries.insert(expression.id, name.to_string());
                    return Type::nominal(class);
                }
                self.report(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, expression.span)
                        .at_node(expression.id)
                        .with_argument(name),
                );
                return Type::Error;
            }
        };
        if receiver_ty.is_error() {
            self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
            return Type::Error;
        }

        let argument = ReceiverArgument {
            ty: receiver_ty,
            safe,
            span: receiver.span,
        };
        let resolved = self.resolve_property(expression.id, expression.span, name, Some(argument));
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        match resolved {
            Some((ty, Some(decl))) if matches!(receiver.kind, ExpressionKind::This) => {
                self.read_property(decl, ty, expression.id)
            }
            Some((ty, _)) => ty,
            None => {
                self.report(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, expression.span)
                        .at_node(expression.id)
                        .with_argument(name),
                );
                Type::Error
            }
        }
    }

    // ---- operators ----------------------------------------------------------

    fn infer_binary(
        &mut self,
        expression: &'a Expression,
        op: BinaryOp,
        left: &'a Expression,
        right: &'a Expression,
        expected: Option<&Type>,
    ) -> Type {
        match op {
            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Identical
            | BinaryOp::NotIdentical => {
                self.condition(expression);
                Type::boolean()
            }
            BinaryOp::Elvis => self.infer_elvis(expression, left, right, expected),
            _ => {
                let Some(function) = op.operator_function() else {
                    return Type::Error;
                };
                let ty = self.infer_operator(expression, function, left, Some(right));
                let comparison = matches!(
                    op,
                    BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
                );
                if comparison && !ty.is_error() {
                    Type::boolean()
                } else {
                    ty
                }
            }
        }
    }

    fn infer_unary(&mut self, expression: &'a Expression, op: UnaryOp, operand: &'a Expression, expected: Option<&Type>) -> Type {
        match (op, &operand.kind) {
            (UnaryOp::Not, _) => {
                self.condition(expression);
                Type::boolean()
            }
            (UnaryOp::Minus, ExpressionKind::Literal(Literal::Integer(value))) => {
                self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
                let ty = self.literal_type(value.wrapping_neg(), expected);
                self.record_type(operand.id, &ty);
                ty
            }
            _ => self.infer_operator(expression, op.operator_function(), operand, None),
        }
    }

    /// `left ?: right`: the right side runs when the left is `null`.
    fn infer_elvis(&mut self, expression: &'a Expression, left: &'a Expression, right: &'a Expression, expected: Option<&Type>) -> Type {
        let expected_left = expected.map(Type::make_nullable);
        let left_ty = self.infer(left, expected_left.as_ref());
        let variable = self.flow_variable(left);
        let decision = self.flow.current();

        let on_null = self.flow.branch(decision, false, Default::default());
        self.flow.join(vec![on_null], FlowNodeKind::Merge, None, right.span);
        let right_ty = self.infer(right, expected);
        let right_end = self.flow.current();

        let non_null = match variable {
            Some((variable, stable)) => crate::flow::FlowDelta::fact(variable, Type::any(), stable),
            None => Default::default(),
        };
        let on_value = self.flow.branch(decision, true, non_null);
        self.flow.join(
            vec![on_value, (right_end, crate::flow::FlowEdgeKind::Normal)],
            FlowNodeKind::Merge,
            Some(expression.id),
            expression.span,
        );

        if left_ty.is_error() || right_ty.is_error() {
            return Type::Error;
        }
        let value = left_ty.make_non_null();
        if right_ty.is_nothing() {
            return value;
        }
        self.relations().common_supertype(&[value, right_ty])
    }

    fn infer_cast(&mut self, expression: &'a Expression, inner: &'a Expression, annotation: &TypeAnnotation, safe: bool) -> Type {
        let actual = self.infer(inner, None);
        let target = self.resolve_annotation(annotation);
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        if safe {
            return target.make_nullable();
        }
        if !actual.is_error() {
            if let Some((variable, stable)) = self.flow_variable(inner) {
                let info = self.flow.info().narrow(variable, target.clone(), stable);
                self.flow.set_info(info);
            }
        }
        target
    }

    fn infer_not_null(&mut self, expression: &'a Expression, inner: &'a Expression) -> Type {
        let actual = self.infer(inner, None);
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        if actual.contains_error() || actual.has_variables() {
            return actual.make_non_null();
        }
        if !actual.is_nullable() {
            let rendered = self.render(&actual);
            self.report(
                Diagnostic::new(DiagnosticCode::UnnecessaryNotNullAssertion, expression.span)
                    .at_node(expression.id)
                    .with_argument(rendered),
            );
        } else if let Some((variable, stable)) = self.flow_variable(inner) {
            let info = self.flow.info().narrow(variable, Type::any(), stable);
            self.flow.set_info(info);
        }
        actual.make_non_null()
    }

    // ---- jumps --------------------------------------------------------------

    fn infer_throw(&mut self, expression: &'a Expression, value: &'a Expression) -> Type {
        let throwable = Type::nominal(builtins::THROWABLE);
        let actual = self.infer(value, Some(&throwable));
        self.check_assignable(&actual, &throwable, value.span, value.id);
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        self.flow.throw(expression.span);
        Type::nothing()
    }

    fn infer_return(&mut self, expression: &'a Expression, value: Option<&'a Expression>) -> Type {
        let declared = self.returns.last().and_then(|frame| frame.declared.clone());
        match (value, &declared) {
            (Some(value), declared) => {
                let actual = self.infer(value, declared.as_ref());
                if let Some(declared) = declared {
                    self.check_assignable(&actual, declared, value.span, value.id);
                }
            }
            (None, Some(declared)) if !declared.is_unit() && !declared.is_error() => {
                let rendered = self.render(declared);
                self.report(
                    Diagnostic::new(DiagnosticCode::TypeMismatch, expression.span)
                        .at_node(expression.id)
                        .with_arguments([rendered, "Unit".to_string()]),
                );
            }
            (None, _) => {}
        }
        self.flow.emit(FlowNodeKind::Expression, Some(expression.id), expression.span);
        self.flow.jump(JumpTarget::Return, expression.span);
        Type::nothing()
    }

    /// Common supertype of the branches of an `if`, `when` or `try`.
    pub(super) fn branch_type(&self, types: &[Type]) -> Type {
        if types.is_empty() {
            return Type::nothing();
        }
        self.relations().common_supertype(types)
    }

    fn has_property(&self, name: &str) -> bool {
        self.scope.lookup(name).iter().any(|group| {
            group
                .entries
                .iter()
                .any(|entry| self.ctx.table.decl(entry.decl).signature.kind == tern_inference::CallableKind::Property)
        })
    }
}
