//! Pre-order traversal over statements and expressions.
//!
//! Passes that only care about a few node kinds override the matching
//! `visit_*` method and call the `walk_*` function to keep descending.

use tern_ast::{
    Block, Callee, CallableReferenceReceiver, ClassDeclaration, Declaration, Expression, ExpressionKind,
    FunctionBody, FunctionDeclaration, Statement, WhenCondition,
};

pub(crate) trait Visitor<'a> {
    fn visit_block(&mut self, block: &'a Block) {
        walk_block(self, block);
    }

    fn visit_statement(&mut self, statement: &'a Statement) {
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &'a Expression) {
        walk_expression(self, expression);
    }

    fn visit_function(&mut self, function: &'a FunctionDeclaration) {
        walk_function(self, function);
    }

    fn visit_class(&mut self, class: &'a ClassDeclaration) {
        walk_class(self, class);
    }
}

pub(crate) fn walk_block<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, block: &'a Block) {
    for statement in &block.statements {
        visitor.visit_statement(statement);
    }
}

pub(crate) fn walk_function<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, function: &'a FunctionDeclaration) {
    for parameter in &function.parameters {
        if let Some(default) = &parameter.default_value {
            visitor.visit_expression(default);
        }
    }
    match &function.body {
        Some(FunctionBody::Block(block)) => visitor.visit_block(block),
        Some(FunctionBody::Expression(expression)) => visitor.visit_expression(expression),
        None => {}
    }
}

pub(crate) fn walk_class<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, class: &'a ClassDeclaration) {
    for member in &class.members {
        walk_declaration(visitor, member);
    }
    for block in &class.init_blocks {
        visitor.visit_block(block);
    }
}

pub(crate) fn walk_declaration<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, declaration: &'a Declaration) {
    match declaration {
        Declaration::Function(function) => visitor.visit_function(function),
        Declaration::Property(property) => {
            if let Some(initializer) = &property.initializer {
                visitor.visit_expression(initializer);
            }
        }
        Declaration::Class(class) => visitor.visit_class(class),
    }
}

pub(crate) fn walk_statement<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, statement: &'a Statement) {
    match statement {
        Statement::Expression(expression) => visitor.visit_expression(expression),
        Statement::Local(local) => {
            if let Some(initializer) = &local.initializer {
                visitor.visit_expression(initializer);
            }
        }
        Statement::LocalFunction(function) => visitor.visit_function(function),
        Statement::LocalClass(class) => visitor.visit_class(class),
        Statement::Assignment { target, value, .. } => {
            visitor.visit_expression(target);
            visitor.visit_expression(value);
        }
        Statement::While { condition, body, .. } => {
            visitor.visit_expression(condition);
            visitor.visit_block(body);
        }
        Statement::DoWhile { body, condition, .. } => {
            visitor.visit_block(body);
            visitor.visit_expression(condition);
        }
        Statement::For { iterable, body, .. } => {
            visitor.visit_expression(iterable);
            visitor.visit_block(body);
        }
    }
}

pub(crate) fn walk_expression<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, expression: &'a Expression) {
    match &expression.kind {
        ExpressionKind::Literal(_)
        | ExpressionKind::Name(_)
        | ExpressionKind::This
        | ExpressionKind::Break
        | ExpressionKind::Continue => {}
        ExpressionKind::MemberAccess { receiver, .. } => visitor.visit_expression(receiver),
        ExpressionKind::Call(call) => {
            match &call.callee {
                Callee::Name { .. } => {}
                Callee::Member { receiver, .. } => visitor.visit_expression(receiver),
                Callee::Expression(callee) => visitor.visit_expression(callee),
            }
            for argument in &call.arguments {
                visitor.visit_expression(&argument.value);
            }
        }
        ExpressionKind::Binary { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        ExpressionKind::Unary { operand, .. } => visitor.visit_expression(operand),
        ExpressionKind::Is { expr, .. } | ExpressionKind::As { expr, .. } => visitor.visit_expression(expr),
        ExpressionKind::NotNullAssertion(inner) | ExpressionKind::Throw(inner) => visitor.visit_expression(inner),
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_expression(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_expression(else_branch);
            }
        }
        ExpressionKind::When(when) => {
            if let Some(subject) = &when.subject {
                visitor.visit_expression(&subject.expression);
            }
            for branch in &when.branches {
                for condition in &branch.conditions {
                    if let WhenCondition::Expression(condition) = condition {
                        visitor.visit_expression(condition);
                    }
                }
                visitor.visit_expression(&branch.body);
            }
            if let Some(else_branch) = &when.else_branch {
                visitor.visit_expression(else_branch);
            }
        }
        ExpressionKind::Block(block) => visitor.visit_block(block),
        ExpressionKind::Lambda(lambda) => visitor.visit_block(&lambda.body),
        ExpressionKind::CallableReference { receiver, .. } => {
            if let Some(CallableReferenceReceiver::Expression(receiver)) = receiver {
                visitor.visit_expression(receiver);
            }
        }
        ExpressionKind::Try(try_expression) => {
            visitor.visit_block(&try_expression.body);
            for catch in &try_expression.catches {
                visitor.visit_block(&catch.body);
            }
            if let Some(finally) = &try_expression.finally {
                visitor.visit_block(finally);
            }
        }
        ExpressionKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expression(value);
            }
        }
    }
}
