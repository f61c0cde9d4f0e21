use super::{BodyTyper, Usage};
use crate::flow::{FlowEdgeKind, FlowEvent, FlowNodeKind, FlowVariable};
use crate::symbols::DeclSource;
use std::sync::Arc;
use tern_ast::{
    Block, ClassDeclaration, Declaration, Expression, ExpressionKind, FunctionDeclaration, InvocationKind,
    LocalVariable, NodeId, Parameter, Span, Statement,
};
use tern_inference::{builtins, ClassId, DeclId, Diagnostic, DiagnosticCode, ReceiverArgument, Type};

impl<'c, 'a> BodyTyper<'c, 'a> {
    /// Types the statements of a block. With [`Usage::Expression`] the last
    /// expression statement is the value of the block.
    pub(super) fn block(&mut self, block: &'a Block, usage: Usage, expected: Option<&Type>) -> Type {
        self.scope.push_level();
        let live_at_start = !self.flow.is_dead();
        let mut reported_unreachable = false;
        let mut value = Type::unit();

        for (index, statement) in block.statements.iter().enumerate() {
            if self.check_cancelled() {
                break;
            }
            if live_at_start && !reported_unreachable && self.flow.is_dead() {
                self.report(Diagnostic::new(DiagnosticCode::UnreachableCode, *statement.span()).at_node(statement.id()));
                reported_unreachable = true;
            }
            let last = index + 1 == block.statements.len();
            value = match statement {
                Statement::Expression(expression) if last && usage == Usage::Expression && !is_if_without_else(expression) => {
                    self.infer_with(expression, expected, Usage::Expression)
                }
                _ => {
                    self.statement(statement);
                    Type::unit()
                }
            };
        }

        self.scope.pop_level();
        value
    }

    fn statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::Expression(expression) => {
                self.infer_with(expression, None, Usage::Statement);
            }
            Statement::Local(local) => self.local(local),
            Statement::LocalFunction(function) => self.local_function(function),
            Statement::LocalClass(class) => self.local_class(class),
            Statement::Assignment {
                id,
                target,
                value,
                span,
            } => self.assignment(*id, target, value, *span),
            Statement::While {
                id,
                condition,
                body,
                span,
            } => self.while_loop(*id, condition, body, *span),
            Statement::DoWhile {
                id,
                body,
                condition,
                span,
            } => self.do_while_loop(*id, body, condition, *span),
            Statement::For {
                id,
                variable,
                iterable,
                body,
                span,
            } => self.for_loop(*id, variable, iterable, body, *span),
        }
    }

    // ---- locals -------------------------------------------------------------

    fn local(&mut self, local: &'a LocalVariable) {
        let declared = local
            .type_annotation
            .as_ref()
            .map(|annotation| self.resolve_annotation(annotation));
        let actual = local.initializer.as_ref().map(|initializer| {
            let actual = self.infer(initializer, declared.as_ref());
            if let Some(declared) = &declared {
                self.check_assignable(&actual, declared, initializer.span, initializer.id);
            }
            actual
        });
        let ty = match (&declared, &actual) {
            (Some(declared), _) => declared.clone(),
            (None, Some(actual)) => actual.clone(),
            (None, None) => {
                self.report(
                    Diagnostic::new(DiagnosticCode::CannotInferType, local.span)
                        .at_node(local.id)
                        .with_argument(local.name.clone()),
                );
                Type::Error
            }
        };

        self.flow.emit(FlowNodeKind::Statement, Some(local.id), local.span);
        let Some(binding) = self.bindings.declared_at(local.id) else {
            return;
        };
        self.binding_types.insert(binding, ty);
        self.flow.record(FlowEvent::Declare {
            binding,
            initialized: local.initializer.is_some(),
        });
        // `val x: Any = ""` knows more than its declared type.
        if let (Some(_), Some(actual)) = (&declared, &actual) {
            let stable = self.bindings.is_stable(binding);
            let info = self.flow.info().assign(FlowVariable::Local(binding), actual, stable);
            self.flow.set_info(info);
        }
    }

    fn assignment(&mut self, id: NodeId, target: &'a Expression, value: &'a Expression, span: Span) {
        match &target.kind {
            ExpressionKind::Name(name) => match self.bindings.reference(target.id) {
                Some(binding) => {
                    let declared = self.declared_binding_type(binding);
                    let actual = self.infer(value, Some(&declared));
                    self.check_assignable(&actual, &declared, value.span, value.id);
                    self.record_type(target.id, &declared);
                    self.flow.emit(FlowNodeKind::Statement, Some(id), span);
                    self.flow.record(FlowEvent::Assign { binding, node: id, span });
                    let stable = self.bindings.is_stable(binding);
                    let info = self.flow.info().assign(FlowVariable::Local(binding), &actual, stable);
                    self.flow.set_info(info);
                }
                None => self.assign_property(id, target, None, true, name, value, span),
            },
            ExpressionKind::MemberAccess { receiver, name, safe } => {
                let receiver_ty = self.infer(receiver, None);
                if receiver_ty.is_error() {
                    self.infer(value, None);
                    self.flow.emit(FlowNodeKind::Statement, Some(id), span);
                    return;
                }
                let argument = ReceiverArgument {
                    ty: receiver_ty,
                    safe: *safe,
                    span: receiver.span,
                };
                let through_this = matches!(receiver.kind, ExpressionKind::This);
                self.assign_property(id, target, Some(argument), through_this, name, value, span);
            }
            _ => {
                self.infer(target, None);
                self.infer(value, None);
                self.flow.emit(FlowNodeKind::Statement, Some(id), span);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assign_property(
        &mut self,
        id: NodeId,
        target: &'a Expression,
        receiver: Option<ReceiverArgument>,
        through_this: bool,
        name: &str,
        value: &'a Expression,
        span: Span,
    ) {
        let safe = receiver.as_ref().map_or(false, |receiver| receiver.safe);
        let Some((ty, decl)) = self.resolve_property(target.id, target.span, name, receiver) else {
            self.infer(value, None);
            self.report(
                Diagnostic::new(DiagnosticCode::UnresolvedReference, target.span)
                    .at_node(target.id)
                    .with_argument(name),
            );
            self.flow.emit(FlowNodeKind::Statement, Some(id), span);
            return;
        };

        let expected = match decl {
            Some(decl) if safe => self.ctx.table.decl(decl).signature.return_type.clone(),
            _ => ty,
        };
        let actual = self.infer(value, Some(&expected));
        self.check_assignable(&actual, &expected, value.span, value.id);
        self.record_type(target.id, &expected);
        self.flow.emit(FlowNodeKind::Statement, Some(id), span);

        let Some(decl) = decl else {
            return;
        };
        let Some(facts) = self.ctx.table.decl(decl).property else {
            return;
        };
        if !facts.mutable && !self.may_initialize(decl, through_this) {
            self.report(
                Diagnostic::new(DiagnosticCode::ValReassignment, span)
                    .at_node(id)
                    .with_argument(name),
            );
        }
        if through_this {
            let info = self.flow.info().assign(FlowVariable::Property(decl), &actual, facts.stable);
            self.flow.set_info(info);
        }
    }

    /// A `val` without initializer may be assigned by the init code of its
    /// own class.
    fn may_initialize(&self, decl: DeclId, through_this: bool) -> bool {
        let info = self.ctx.table.decl(decl);
        let own_class = info
            .signature
            .owner
            .map_or(false, |owner| self.initializing.last() == Some(&owner));
        through_this
            && own_class
            && matches!(info.source, DeclSource::Property(property) if property.initializer.is_none())
    }

    // ---- loops ----------------------------------------------------------------

    fn loop_variables(&self, id: NodeId) -> Vec<FlowVariable> {
        self.bindings
            .assigned_in_loop(id)
            .iter()
            .map(|binding| FlowVariable::Local(*binding))
            .collect()
    }

    fn while_loop(&mut self, id: NodeId, condition: &'a Expression, body: &'a Block, span: Span) {
        let assigned = self.loop_variables(id);
        let handle = self.flow.enter_loop(id, span, &assigned);
        let facts = self.check_condition(condition);
        let decision = self.flow.current();

        let (from, kind) = self.flow.branch(decision, false, facts.when_false);
        self.flow.exit_edge(handle, from, kind);
        let entry = self.flow.branch(decision, true, facts.when_true);
        self.flow.join(vec![entry], FlowNodeKind::Merge, None, body.span);
        self.block(body, Usage::Statement, None);
        self.flow.loop_back(handle);
        self.flow.leave_loop(handle);
    }

    fn do_while_loop(&mut self, id: NodeId, body: &'a Block, condition: &'a Expression, span: Span) {
        let assigned = self.loop_variables(id);
        let handle = self.flow.enter_loop(id, span, &assigned);
        self.block(body, Usage::Statement, None);
        let facts = self.check_condition(condition);
        let decision = self.flow.current();

        let (from, kind) = self.flow.branch(decision, false, facts.when_false);
        self.flow.exit_edge(handle, from, kind);
        let again = self.flow.branch(decision, true, facts.when_true);
        self.flow.join(vec![again], FlowNodeKind::Merge, None, condition.span);
        self.flow.loop_back(handle);
        self.flow.leave_loop(handle);
    }

    fn for_loop(&mut self, id: NodeId, variable: &'a Parameter, iterable: &'a Expression, body: &'a Block, span: Span) {
        let iterable_ty = self.infer(iterable, None);
        let element = self.element_type(&iterable_ty, iterable);
        let assigned = self.loop_variables(id);
        let handle = self.flow.enter_loop(id, span, &assigned);
        // Zero iterations.
        let header = self.flow.current();
        self.flow.exit_edge(handle, header, FlowEdgeKind::Normal);

        let ty = match &variable.type_annotation {
            Some(annotation) => {
                let declared = self.resolve_annotation(annotation);
                self.check_assignable(&element, &declared, variable.span, variable.id);
                declared
            }
            None => element,
        };
        self.flow.emit(FlowNodeKind::Statement, Some(variable.id), variable.span);
        if let Some(binding) = self.bindings.declared_at(variable.id) {
            self.binding_types.insert(binding, ty);
            self.flow.record(FlowEvent::Declare {
                binding,
                initialized: true,
            });
        }
        self.block(body, Usage::Statement, None);
        self.flow.loop_back(handle);
        self.flow.leave_loop(handle);
    }

    /// Element type of what a `for` loop iterates.
    fn element_type(&mut self, ty: &Type, iterable: &Expression) -> Type {
        if ty.contains_error() {
            return Type::Error;
        }
        if ty.is_class(builtins::INT_RANGE) {
            return Type::int();
        }
        let relations = self.relations();
        let view = relations
            .supertype_view(ty, builtins::ITERABLE)
            .or_else(|| relations.supertype_view(ty, builtins::ARRAY));
        match view.as_ref().and_then(|view| view.arguments().first()) {
            Some(Type::Star) => Type::nullable_any(),
            Some(element) => element.clone(),
            None => {
                let rendered = self.render(ty);
                self.report(
                    Diagnostic::new(DiagnosticCode::TypeMismatch, iterable.span)
                        .at_node(iterable.id)
                        .with_arguments(["Iterable<*>".to_string(), rendered]),
                );
                Type::Error
            }
        }
    }

    // ---- local declarations -------------------------------------------------------

    fn local_function(&mut self, function: &'a FunctionDeclaration) {
        self.flow.emit(FlowNodeKind::Statement, Some(function.id), function.span);
        let Some(decl) = self.ctx.table.local_function(function.id) else {
            return;
        };
        self.scope.declare_local_function(&function.name, decl);
        self.closure_function(function, decl);
    }

    /// Types a local function or local class member as a closure of the
    /// current flow point. Implicit return types are remembered for later
    /// calls in the same body.
    fn closure_function(&mut self, function: &'a FunctionDeclaration, decl: DeclId) {
        let info = self.ctx.table.decl(decl);
        let signature = info.signature.clone();
        let implicit = info.implicit;
        if implicit {
            self.local_in_progress.insert(decl);
        }

        let flow_info = self.flow.info().retain_stable();
        let handle = self
            .flow
            .enter_closure(function.id, function.span, InvocationKind::Unknown, flow_info);
        let result = self.function_contents(function, &signature, implicit);
        self.flow.leave_closure(handle);

        if implicit {
            self.local_in_progress.remove(&decl);
            let mut inferred = (*signature).clone();
            inferred.return_type = result;
            self.local_signatures.insert(decl, Arc::new(inferred));
        }
    }

    fn local_class(&mut self, class: &'a ClassDeclaration) {
        self.flow.emit(FlowNodeKind::Statement, Some(class.id), class.span);
        let table = self.ctx.table;
        let Some(id) = table.local_class(class.id) else {
            return;
        };
        self.scope.declare_local_class(&class.name, id);
        for constructor in table.constructors(id) {
            self.scope.declare_local_function(&class.name, *constructor);
        }

        let flow_info = self.flow.info().retain_stable();
        let handle = self
            .flow
            .enter_closure(class.id, class.span, InvocationKind::Unknown, flow_info);
        self.class_contents(class, id);
        self.flow.leave_closure(handle);
    }

    fn class_contents(&mut self, class: &'a ClassDeclaration, id: ClassId) {
        let table = self.ctx.table;
        self.scope.push_level();
        self.scope.declare_type_parameters(class.id);
        self.scope.push_receiver(id);

        for parameter in class.primary_constructor.iter().flatten() {
            let mut ty = match &parameter.type_annotation {
                Some(annotation) => self.resolve_quietly(annotation),
                None => Type::Error,
            };
            if let Some(default) = &parameter.default_value {
                let actual = self.infer(default, Some(&ty));
                self.check_assignable(&actual, &ty, default.span, default.id);
            }
            if parameter.is_vararg {
                ty = Type::generic(builtins::ARRAY, vec![ty]);
            }
            if let Some(binding) = self.bindings.declared_at(parameter.id) {
                self.binding_types.insert(binding, ty);
            }
        }

        let member_decl = |name: &str, node: NodeId| {
            table
                .members_named(id, name)
                .iter()
                .copied()
                .find(|decl| table.decl(*decl).signature.declaration == Some(node))
        };

        // Initializers and expression bodies first so that the other members
        // see their inferred types.
        self.initializing.push(id);
        for member in &class.members {
            match member {
                Declaration::Property(property) => {
                    let Some(decl) = member_decl(&property.name, property.id) else {
                        continue;
                    };
                    let info = table.decl(decl);
                    let declared = (!info.implicit).then(|| info.signature.return_type.clone());
                    let Some(initializer) = &property.initializer else {
                        continue;
                    };
                    let actual = self.infer(initializer, declared.as_ref());
                    match declared {
                        Some(declared) => self.check_assignable(&actual, &declared, initializer.span, initializer.id),
                        None => {
                            let mut inferred = (*info.signature).clone();
                            inferred.return_type = actual;
                            self.local_signatures.insert(decl, Arc::new(inferred));
                        }
                    }
                }
                Declaration::Function(function) => {
                    let implicit = member_decl(&function.name, function.id).filter(|decl| table.decl(*decl).implicit);
                    if let Some(decl) = implicit {
                        self.closure_function(function, decl);
                    }
                }
                _ => {}
            }
        }
        for block in &class.init_blocks {
            self.block(block, Usage::Statement, None);
        }
        self.initializing.pop();

        for member in &class.members {
            match member {
                Declaration::Function(function) => {
                    let Some(decl) = member_decl(&function.name, function.id) else {
                        continue;
                    };
                    if !table.decl(decl).implicit {
                        self.closure_function(function, decl);
                    }
                }
                Declaration::Class(nested) => {
                    if let Some(nested_id) = table.local_class(nested.id) {
                        let flow_info = self.flow.info().retain_stable();
                        let handle = self
                            .flow
                            .enter_closure(nested.id, nested.span, InvocationKind::Unknown, flow_info);
                        self.class_contents(nested, nested_id);
                        self.flow.leave_closure(handle);
                    }
                }
                Declaration::Property(_) => {}
            }
        }

        self.scope.pop_receiver();
        self.scope.pop_level();
    }
}

/// An `if` without `else` never provides a value, even as the last
/// statement of a block.
fn is_if_without_else(expression: &Expression) -> bool {
    matches!(
        &expression.kind,
        ExpressionKind::If {
            else_branch: None,
            ..
        }
    )
}
