use super::{BindingId, BindingInfo, BindingKind, BindingTable};
use crate::symbols::{BodyKind, BodyRef};
use crate::walk::{self, Visitor};
use tern_ast::{
    Block, Callee, ClassDeclaration, Declaration, Expression, ExpressionKind, FunctionDeclaration, NodeId, Parameter,
    Span, Statement, WhenCondition,
};

/// Resolves simple names to local bindings before a body is typed.
///
/// Local functions and local class members are closures: bindings they
/// write are unstable for the rest of the body. Lambdas with an invocation
/// contract run in place and are not closures.
pub struct BindingResolver {
    table: BindingTable,
    scopes: Vec<Vec<(String, BindingId)>>,
    closures: Vec<Option<NodeId>>,
    loops: Vec<NodeId>,
}

impl BindingResolver {
    fn new() -> Self {
        Self {
            table: BindingTable::default(),
            scopes: Vec::new(),
            closures: vec![None],
            loops: Vec::new(),
        }
    }

    pub fn resolve(body: &BodyRef<'_>) -> BindingTable {
        let mut resolver = Self::new();
        resolver.scopes.push(Vec::new());
        match body.kind {
            BodyKind::Function(function) => {
                resolver.declare_parameters(&function.parameters, BindingKind::Parameter);
                walk::walk_function(&mut resolver, function);
            }
            BodyKind::PropertyInitializer(property) => {
                if let Some(parameters) = body.class.and_then(|class| class.primary_constructor.as_ref()) {
                    resolver.declare_parameters(parameters, BindingKind::Parameter);
                }
                if let Some(initializer) = &property.initializer {
                    resolver.visit_expression(initializer);
                }
            }
            BodyKind::InitBlock(block) => {
                if let Some(parameters) = body.class.and_then(|class| class.primary_constructor.as_ref()) {
                    resolver.declare_parameters(parameters, BindingKind::Parameter);
                }
                resolver.visit_block(block);
            }
        }
        resolver.table
    }

    fn current_closure(&self) -> Option<NodeId> {
        self.closures.last().copied().flatten()
    }

    fn declare(
        &mut self,
        name: &str,
        kind: BindingKind,
        declaration: NodeId,
        span: Span,
        mutable: bool,
        has_initializer: bool,
    ) -> BindingId {
        let id = BindingId::new(self.table.bindings.len() as u32);
        self.table.bindings.push(BindingInfo {
            id,
            name: name.to_string(),
            kind,
            declaration,
            span,
            mutable,
            has_initializer,
            closure: self.current_closure(),
            written_in_closure: false,
        });
        self.table.declarations.insert(declaration, id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), id));
        }
        id
    }

    fn declare_parameters(&mut self, parameters: &[Parameter], kind: BindingKind) {
        for parameter in parameters {
            self.declare(&parameter.name, kind, parameter.id, parameter.span, false, true);
        }
    }

    fn lookup(&self, name: &str) -> Option<BindingId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(candidate, _)| candidate == name)
            .map(|(_, id)| *id)
    }

    fn record_write(&mut self, binding: BindingId, assignment: NodeId) {
        for loop_node in &self.loops {
            let assigned = self.table.loop_assignments.entry(*loop_node).or_default();
            if !assigned.contains(&binding) {
                assigned.push(binding);
            }
        }
        let closure = self.current_closure();
        let info = &mut self.table.bindings[binding.index()];
        if info.closure != closure {
            info.written_in_closure = true;
            self.table.captured_assignments.insert(assignment);
        }
    }

    fn in_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(Vec::new());
        f(self);
        self.scopes.pop();
    }

    fn in_closure(&mut self, node: NodeId, f: impl FnOnce(&mut Self)) {
        self.closures.push(Some(node));
        self.in_scope(f);
        self.closures.pop();
    }
}

impl<'a> Visitor<'a> for BindingResolver {
    fn visit_block(&mut self, block: &'a Block) {
        self.in_scope(|resolver| walk::walk_block(resolver, block));
    }

    fn visit_statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::Local(local) => {
                if let Some(initializer) = &local.initializer {
                    self.visit_expression(initializer);
                }
                let kind = if local.is_mutable {
                    BindingKind::LocalVar
                } else {
                    BindingKind::LocalVal
                };
                self.declare(
                    &local.name,
                    kind,
                    local.id,
                    local.span,
                    local.is_mutable,
                    local.initializer.is_some(),
                );
            }
            Statement::Assignment { id, target, value, .. } => {
                self.visit_expression(target);
                self.visit_expression(value);
                if let ExpressionKind::Name(_) = target.kind {
                    if let Some(binding) = self.table.reference(target.id) {
                        self.record_write(binding, *id);
                    }
                }
            }
            Statement::While { id, condition, body, .. } => {
                self.loops.push(*id);
                self.visit_expression(condition);
                self.visit_block(body);
                self.loops.pop();
            }
            Statement::DoWhile { id, body, condition, .. } => {
                self.loops.push(*id);
                // The condition sees declarations of the body.
                self.in_scope(|resolver| {
                    for statement in &body.statements {
                        resolver.visit_statement(statement);
                    }
                    resolver.visit_expression(condition);
                });
                self.loops.pop();
            }
            Statement::For {
                id,
                variable,
                iterable,
                body,
                ..
            } => {
                self.visit_expression(iterable);
                self.loops.push(*id);
                let loop_node = *id;
                self.in_scope(|resolver| {
                    let binding = resolver.declare(
                        &variable.name,
                        BindingKind::LoopVariable,
                        variable.id,
                        variable.span,
                        false,
                        true,
                    );
                    resolver.table.loop_assignments.entry(loop_node).or_default().push(binding);
                    resolver.visit_block(body);
                });
                self.loops.pop();
            }
            _ => walk::walk_statement(self, statement),
        }
    }

    fn visit_expression(&mut self, expression: &'a Expression) {
        match &expression.kind {
            ExpressionKind::Name(name) => {
                if let Some(binding) = self.lookup(name) {
                    self.table.references.insert(expression.id, binding);
                }
            }
            ExpressionKind::Call(call) => {
                if let Callee::Name { name, .. } = &call.callee {
                    if let Some(binding) = self.lookup(name) {
                        self.table.callee_references.insert(expression.id, binding);
                    }
                }
                walk::walk_expression(self, expression);
            }
            ExpressionKind::Lambda(lambda) => {
                let declare = |resolver: &mut Self| {
                    if lambda.parameters.is_empty() {
                        resolver.declare("it", BindingKind::ImplicitIt, expression.id, expression.span, false, true);
                    } else {
                        resolver.declare_parameters(&lambda.parameters, BindingKind::LambdaParameter);
                    }
                    resolver.visit_block(&lambda.body);
                };
                if lambda.invocation.is_in_place() {
                    self.in_scope(declare);
                } else {
                    self.in_closure(expression.id, declare);
                }
            }
            ExpressionKind::When(when) => match &when.subject {
                Some(subject) => {
                    self.visit_expression(&subject.expression);
                    self.in_scope(|resolver| {
                        if let Some(name) = &subject.binding {
                            resolver.declare(name, BindingKind::WhenSubject, subject.id, subject.span, false, true);
                        }
                        for branch in &when.branches {
                            for condition in &branch.conditions {
                                if let WhenCondition::Expression(condition) = condition {
                                    resolver.visit_expression(condition);
                                }
                            }
                            resolver.visit_expression(&branch.body);
                        }
                        if let Some(else_branch) = &when.else_branch {
                            resolver.visit_expression(else_branch);
                        }
                    });
                }
                None => walk::walk_expression(self, expression),
            },
            ExpressionKind::Try(try_expression) => {
                self.visit_block(&try_expression.body);
                for catch in &try_expression.catches {
                    self.in_scope(|resolver| {
                        resolver.declare(
                            &catch.parameter.name,
                            BindingKind::CatchParameter,
                            catch.parameter.id,
                            catch.parameter.span,
                            false,
                            true,
                        );
                        resolver.visit_block(&catch.body);
                    });
                }
                if let Some(finally) = &try_expression.finally {
                    self.visit_block(finally);
                }
            }
            _ => walk::walk_expression(self, expression),
        }
    }

    fn visit_function(&mut self, function: &'a FunctionDeclaration) {
        self.in_closure(function.id, |resolver| {
            resolver.declare_parameters(&function.parameters, BindingKind::Parameter);
            walk::walk_function(resolver, function);
        });
    }

    fn visit_class(&mut self, class: &'a ClassDeclaration) {
        self.in_closure(class.id, |resolver| {
            resolver.in_scope(|resolver| {
                if let Some(parameters) = &class.primary_constructor {
                    resolver.declare_parameters(parameters, BindingKind::Parameter);
                    for parameter in parameters {
                        if let Some(default) = &parameter.default_value {
                            resolver.visit_expression(default);
                        }
                    }
                }
                for member in &class.members {
                    if let Declaration::Property(property) = member {
                        if let Some(initializer) = &property.initializer {
                            resolver.visit_expression(initializer);
                        }
                    }
                }
                for block in &class.init_blocks {
                    resolver.visit_block(block);
                }
            });
            for member in &class.members {
                match member {
                    Declaration::Function(function) => resolver.visit_function(function),
                    Declaration::Class(nested) => resolver.visit_class(nested),
                    Declaration::Property(_) => {}
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use tern_ast::{AstBuilder, TypeAnnotation};

    #[test]
    fn var_written_in_lambda_is_unstable() {
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let count = b.var("count", None, Some(zero));
        let one = b.int(1);
        let increment = b.assign("count", one);
        let lambda = b.lambda(Vec::new(), vec![increment]);
        let call = b.call("run", vec![lambda]);
        let read = b.name("count");
        let body = b.block(vec![count, AstBuilder::stmt(call), AstBuilder::stmt(read)]);
        let function = b.function("main").block_body(body).declaration();
        let files = vec![b.file("main.tn", None, Vec::new(), vec![function])];
        let table = SymbolTable::collect(&files);
        let bindings = BindingResolver::resolve(&table.bodies()[0]);

        let count = bindings
            .bindings()
            .iter()
            .find(|binding| binding.name == "count")
            .expect("binding");
        assert!(count.written_in_closure);
        assert!(!bindings.is_stable(count.id));
        let reads = bindings.references.values().filter(|binding| **binding == count.id).count();
        assert_eq!(reads, 2);
    }

    #[test]
    fn inner_declaration_shadows_parameter() {
        let mut b = AstBuilder::new();
        let text = b.string("inner");
        let inner = b.val("x", None, Some(text));
        let read = b.name("x");
        let read_id = read.id;
        let block = b.block_expr(vec![inner, AstBuilder::stmt(read)]);
        let x = b.param("x", TypeAnnotation::simple("Int"));
        let body = b.block(vec![AstBuilder::stmt(block)]);
        let function = b.function("f").param(x).block_body(body).declaration();
        let files = vec![b.file("main.tn", None, Vec::new(), vec![function])];
        let table = SymbolTable::collect(&files);
        let bindings = BindingResolver::resolve(&table.bodies()[0]);

        let binding = bindings.binding(bindings.reference(read_id).expect("resolved"));
        assert_eq!(binding.kind, BindingKind::LocalVal);
    }

    #[test]
    fn loop_records_assigned_variables() {
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let total = b.var("total", None, Some(zero));
        let one = b.int(1);
        let bump = b.assign("total", one);
        let condition = b.boolean(true);
        let loop_statement = b.while_loop(condition, vec![bump]);
        let loop_id = loop_statement.id();
        let body = b.block(vec![total, loop_statement]);
        let function = b.function("spin").block_body(body).declaration();
        let files = vec![b.file("main.tn", None, Vec::new(), vec![function])];
        let table = SymbolTable::collect(&files);
        let bindings = BindingResolver::resolve(&table.bodies()[0]);

        let assigned = bindings.assigned_in_loop(loop_id);
        assert_eq!(assigned.len(), 1);
        assert_eq!(bindings.binding(assigned[0]).name, "total");
        assert!(bindings.is_stable(assigned[0]));
    }
}
