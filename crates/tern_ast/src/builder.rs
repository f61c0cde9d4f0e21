// tern_ast/builder - programmatic construction of trees with unique node ids
//
// Front ends that do not come with their own parser (tests, tools generating
// code) build trees through `AstBuilder`. Every node receives a fresh `NodeId`
// and a synthetic span whose line equals the id, which keeps diagnostics
// attributable without source text.

use crate::expression::{
    Argument, CallExpression, Callee, CallableReferenceReceiver, CatchClause, Expression,
    ExpressionKind, LambdaExpression, TryExpression, WhenBranch, WhenCondition, WhenExpression,
    WhenSubject,
};
use crate::statement::{
    Block, ClassDeclaration, ClassKind, Declaration, EnumEntry, FunctionBody,
    FunctionDeclaration, Import, LocalVariable, Parameter, PropertyDeclaration,
    PropertyMutability, SourceFile, Statement, TypeParameterDeclaration,
};
use crate::types::{
    BinaryOp, InvocationKind, Literal, Modality, NodeId, Span, TypeAnnotation, UnaryOp, Variance,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Starts numbering at `first` so several builders can feed one session.
    pub fn starting_at(first: u32) -> Self {
        Self { next_id: first }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn span_of(id: NodeId) -> Span {
        let line = id.0 as usize;
        Span::new(line, 1, line, 1)
    }

    fn fresh(&mut self) -> (NodeId, Span) {
        let id = self.next_id();
        (id, Self::span_of(id))
    }

    pub fn expr(&mut self, kind: ExpressionKind) -> Expression {
        let (id, span) = self.fresh();
        Expression::new(id, kind, span)
    }

    // ---- literals and names -------------------------------------------------

    pub fn int(&mut self, value: i64) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Integer(value)))
    }

    pub fn long(&mut self, value: i64) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Long(value)))
    }

    pub fn double(&mut self, value: f64) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Double(value)))
    }

    pub fn string(&mut self, value: &str) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::String(value.to_string())))
    }

    pub fn boolean(&mut self, value: bool) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Boolean(value)))
    }

    pub fn null(&mut self) -> Expression {
        self.expr(ExpressionKind::Literal(Literal::Null))
    }

    pub fn name(&mut self, name: &str) -> Expression {
        self.expr(ExpressionKind::Name(name.to_string()))
    }

    pub fn this(&mut self) -> Expression {
        self.expr(ExpressionKind::This)
    }

    pub fn member(&mut self, receiver: Expression, name: &str) -> Expression {
        self.expr(ExpressionKind::MemberAccess {
            receiver: Box::new(receiver),
            name: name.to_string(),
            safe: false,
        })
    }

    pub fn safe_member(&mut self, receiver: Expression, name: &str) -> Expression {
        self.expr(ExpressionKind::MemberAccess {
            receiver: Box::new(receiver),
            name: name.to_string(),
            safe: true,
        })
    }

    // ---- calls ------------------------------------------------------------------

    pub fn call(&mut self, name: &str, arguments: Vec<Expression>) -> Expression {
        let arguments = arguments.into_iter().map(Argument::positional).collect();
        self.call_with(name, Vec::new(), arguments)
    }

    pub fn call_with(
        &mut self,
        name: &str,
        type_arguments: Vec<TypeAnnotation>,
        arguments: Vec<Argument>,
    ) -> Expression {
        let (id, span) = self.fresh();
        Expression::new(
            id,
            ExpressionKind::Call(CallExpression {
                callee: Callee::Name {
                    name: name.to_string(),
                    span,
                },
                type_arguments,
                arguments,
            }),
            span,
        )
    }

    pub fn method_call(
        &mut self,
        receiver: Expression,
        name: &str,
        arguments: Vec<Expression>,
    ) -> Expression {
        self.member_call(receiver, name, arguments, false)
    }

    pub fn safe_call(
        &mut self,
        receiver: Expression,
        name: &str,
        arguments: Vec<Expression>,
    ) -> Expression {
        self.member_call(receiver, name, arguments, true)
    }

    fn member_call(
        &mut self,
        receiver: Expression,
        name: &str,
        arguments: Vec<Expression>,
        safe: bool,
    ) -> Expression {
        let (id, span) = self.fresh();
        Expression::new(
            id,
            ExpressionKind::Call(CallExpression {
                callee: Callee::Member {
                    receiver: Box::new(receiver),
                    name: name.to_string(),
                    safe,
                    span,
                },
                type_arguments: Vec::new(),
                arguments: arguments.into_iter().map(Argument::positional).collect(),
            }),
            span,
        )
    }

    pub fn invoke(&mut self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        self.expr(ExpressionKind::Call(CallExpression {
            callee: Callee::Expression(Box::new(callee)),
            type_arguments: Vec::new(),
            arguments: arguments.into_iter().map(Argument::positional).collect(),
        }))
    }

    // ---- operators ----------------------------------------------------------------

    pub fn binary(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
        self.expr(ExpressionKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn not(&mut self, operand: Expression) -> Expression {
        self.unary(UnaryOp::Not, operand)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expression) -> Expression {
        self.expr(ExpressionKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn is_type(&mut self, expr: Expression, type_annotation: TypeAnnotation) -> Expression {
        self.expr(ExpressionKind::Is {
            expr: Box::new(expr),
            type_annotation,
            negated: false,
        })
    }

    pub fn not_is_type(&mut self, expr: Expression, type_annotation: TypeAnnotation) -> Expression {
        self.expr(ExpressionKind::Is {
            expr: Box::new(expr),
            type_annotation,
            negated: true,
        })
    }

    pub fn cast(&mut self, expr: Expression, type_annotation: TypeAnnotation) -> Expression {
        self.expr(ExpressionKind::As {
            expr: Box::new(expr),
            type_annotation,
            safe: false,
        })
    }

    pub fn not_null(&mut self, expr: Expression) -> Expression {
        self.expr(ExpressionKind::NotNullAssertion(Box::new(expr)))
    }

    // ---- control flow -----------------------------------------------------------

    pub fn if_else(
        &mut self,
        condition: Expression,
        then_branch: Expression,
        else_branch: Option<Expression>,
    ) -> Expression {
        self.expr(ExpressionKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn when_subject(
        &mut self,
        subject: Expression,
        branches: Vec<WhenBranch>,
        else_branch: Option<Expression>,
    ) -> Expression {
        let (id, span) = self.fresh();
        let subject = WhenSubject {
            id,
            binding: None,
            expression: Box::new(subject),
            span,
        };
        self.expr(ExpressionKind::When(WhenExpression {
            subject: Some(subject),
            branches,
            else_branch: else_branch.map(Box::new),
        }))
    }

    /// `when (val binding = subject) { ... }`
    pub fn when_binding(
        &mut self,
        binding: &str,
        subject: Expression,
        branches: Vec<WhenBranch>,
        else_branch: Option<Expression>,
    ) -> Expression {
        let (id, span) = self.fresh();
        let subject = WhenSubject {
            id,
            binding: Some(binding.to_string()),
            expression: Box::new(subject),
            span,
        };
        self.expr(ExpressionKind::When(WhenExpression {
            subject: Some(subject),
            branches,
            else_branch: else_branch.map(Box::new),
        }))
    }

    pub fn when_conditions(
        &mut self,
        branches: Vec<WhenBranch>,
        else_branch: Option<Expression>,
    ) -> Expression {
        self.expr(ExpressionKind::When(WhenExpression {
            subject: None,
            branches,
            else_branch: else_branch.map(Box::new),
        }))
    }

    pub fn value_branch(&mut self, values: Vec<Expression>, body: Expression) -> WhenBranch {
        let (id, span) = self.fresh();
        WhenBranch {
            id,
            conditions: values.into_iter().map(WhenCondition::Expression).collect(),
            body,
            span,
        }
    }

    pub fn is_branch(&mut self, type_annotation: TypeAnnotation, body: Expression) -> WhenBranch {
        self.type_branch(type_annotation, false, body)
    }

    pub fn not_is_branch(
        &mut self,
        type_annotation: TypeAnnotation,
        body: Expression,
    ) -> WhenBranch {
        self.type_branch(type_annotation, true, body)
    }

    fn type_branch(
        &mut self,
        type_annotation: TypeAnnotation,
        negated: bool,
        body: Expression,
    ) -> WhenBranch {
        let (condition_id, condition_span) = self.fresh();
        let (id, span) = self.fresh();
        WhenBranch {
            id,
            conditions: vec![WhenCondition::IsType {
                id: condition_id,
                type_annotation,
                negated,
                span: condition_span,
            }],
            body,
            span,
        }
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> Block {
        let (id, span) = self.fresh();
        Block {
            id,
            statements,
            span,
        }
    }

    pub fn block_expr(&mut self, statements: Vec<Statement>) -> Expression {
        let block = self.block(statements);
        self.expr(ExpressionKind::Block(block))
    }

    pub fn lambda(&mut self, parameters: Vec<Parameter>, statements: Vec<Statement>) -> Expression {
        self.lambda_with_contract(parameters, statements, InvocationKind::Unknown)
    }

    pub fn lambda_with_contract(
        &mut self,
        parameters: Vec<Parameter>,
        statements: Vec<Statement>,
        invocation: InvocationKind,
    ) -> Expression {
        let body = self.block(statements);
        self.expr(ExpressionKind::Lambda(LambdaExpression {
            parameters,
            body,
            invocation,
        }))
    }

    /// `::name`
    pub fn reference(&mut self, name: &str) -> Expression {
        self.expr(ExpressionKind::CallableReference {
            receiver: None,
            name: name.to_string(),
        })
    }

    /// `Type::name`
    pub fn type_reference(&mut self, receiver: TypeAnnotation, name: &str) -> Expression {
        self.expr(ExpressionKind::CallableReference {
            receiver: Some(CallableReferenceReceiver::Type(receiver)),
            name: name.to_string(),
        })
    }

    /// `expr::name`
    pub fn bound_reference(&mut self, receiver: Expression, name: &str) -> Expression {
        self.expr(ExpressionKind::CallableReference {
            receiver: Some(CallableReferenceReceiver::Expression(Box::new(receiver))),
            name: name.to_string(),
        })
    }

    pub fn try_expr(
        &mut self,
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    ) -> Expression {
        self.expr(ExpressionKind::Try(TryExpression {
            body,
            catches,
            finally,
        }))
    }

    pub fn catch_clause(&mut self, name: &str, type_annotation: TypeAnnotation, body: Block) -> CatchClause {
        let parameter = self.param(name, type_annotation);
        let (id, span) = self.fresh();
        CatchClause {
            id,
            parameter,
            body,
            span,
        }
    }

    pub fn throw(&mut self, value: Expression) -> Expression {
        self.expr(ExpressionKind::Throw(Box::new(value)))
    }

    pub fn ret(&mut self, value: Option<Expression>) -> Expression {
        self.expr(ExpressionKind::Return(value.map(Box::new)))
    }

    pub fn brk(&mut self) -> Expression {
        self.expr(ExpressionKind::Break)
    }

    pub fn cont(&mut self) -> Expression {
        self.expr(ExpressionKind::Continue)
    }

    // ---- statements -------------------------------------------------------------

    pub fn val(
        &mut self,
        name: &str,
        type_annotation: Option<TypeAnnotation>,
        initializer: Option<Expression>,
    ) -> Statement {
        self.local(name, false, type_annotation, initializer)
    }

    pub fn var(
        &mut self,
        name: &str,
        type_annotation: Option<TypeAnnotation>,
        initializer: Option<Expression>,
    ) -> Statement {
        self.local(name, true, type_annotation, initializer)
    }

    fn local(
        &mut self,
        name: &str,
        is_mutable: bool,
        type_annotation: Option<TypeAnnotation>,
        initializer: Option<Expression>,
    ) -> Statement {
        let (id, span) = self.fresh();
        Statement::Local(LocalVariable {
            id,
            name: name.to_string(),
            is_mutable,
            type_annotation,
            initializer,
            span,
        })
    }

    pub fn assign(&mut self, name: &str, value: Expression) -> Statement {
        let target = self.name(name);
        self.assign_to(target, value)
    }

    pub fn assign_to(&mut self, target: Expression, value: Expression) -> Statement {
        let (id, span) = self.fresh();
        Statement::Assignment {
            id,
            target,
            value,
            span,
        }
    }

    pub fn stmt(expr: Expression) -> Statement {
        Statement::Expression(expr)
    }

    pub fn while_loop(&mut self, condition: Expression, body: Vec<Statement>) -> Statement {
        let body = self.block(body);
        let (id, span) = self.fresh();
        Statement::While {
            id,
            condition,
            body,
            span,
        }
    }

    pub fn do_while(&mut self, body: Vec<Statement>, condition: Expression) -> Statement {
        let body = self.block(body);
        let (id, span) = self.fresh();
        Statement::DoWhile {
            id,
            body,
            condition,
            span,
        }
    }

    pub fn for_loop(
        &mut self,
        variable: &str,
        iterable: Expression,
        body: Vec<Statement>,
    ) -> Statement {
        let variable = self.lambda_param(variable, None);
        let body = self.block(body);
        let (id, span) = self.fresh();
        Statement::For {
            id,
            variable,
            iterable,
            body,
            span,
        }
    }

    // ---- declarations -------------------------------------------------------------

    pub fn param(&mut self, name: &str, type_annotation: TypeAnnotation) -> Parameter {
        self.lambda_param(name, Some(type_annotation))
    }

    pub fn lambda_param(&mut self, name: &str, type_annotation: Option<TypeAnnotation>) -> Parameter {
        let (id, span) = self.fresh();
        Parameter {
            id,
            name: name.to_string(),
            type_annotation,
            default_value: None,
            is_vararg: false,
            property: None,
            span,
        }
    }

    pub fn param_with_default(
        &mut self,
        name: &str,
        type_annotation: TypeAnnotation,
        default_value: Expression,
    ) -> Parameter {
        let mut parameter = self.param(name, type_annotation);
        parameter.default_value = Some(default_value);
        parameter
    }

    pub fn vararg_param(&mut self, name: &str, element: TypeAnnotation) -> Parameter {
        let mut parameter = self.param(name, element);
        parameter.is_vararg = true;
        parameter
    }

    pub fn property_param(
        &mut self,
        name: &str,
        type_annotation: TypeAnnotation,
        mutability: PropertyMutability,
    ) -> Parameter {
        let mut parameter = self.param(name, type_annotation);
        parameter.property = Some(mutability);
        parameter
    }

    pub fn type_param(&mut self, name: &str, upper_bounds: Vec<TypeAnnotation>) -> TypeParameterDeclaration {
        self.type_param_with_variance(name, Variance::Invariant, upper_bounds)
    }

    pub fn type_param_with_variance(
        &mut self,
        name: &str,
        variance: Variance,
        upper_bounds: Vec<TypeAnnotation>,
    ) -> TypeParameterDeclaration {
        let (id, span) = self.fresh();
        TypeParameterDeclaration {
            id,
            name: name.to_string(),
            variance,
            upper_bounds,
            span,
        }
    }

    pub fn function(&mut self, name: &str) -> FunctionBuilder {
        let (id, span) = self.fresh();
        FunctionBuilder {
            declaration: FunctionDeclaration {
                id,
                name: name.to_string(),
                type_parameters: Vec::new(),
                receiver: None,
                parameters: Vec::new(),
                return_type: None,
                body: None,
                modality: Modality::Final,
                is_override: false,
                span,
            },
        }
    }

    pub fn property(
        &mut self,
        name: &str,
        type_annotation: Option<TypeAnnotation>,
        initializer: Option<Expression>,
    ) -> PropertyDeclaration {
        let (id, span) = self.fresh();
        PropertyDeclaration {
            id,
            name: name.to_string(),
            is_mutable: false,
            receiver: None,
            type_annotation,
            initializer,
            has_custom_getter: false,
            is_delegated: false,
            modality: Modality::Final,
            span,
        }
    }

    pub fn class(&mut self, name: &str) -> ClassBuilder {
        let (id, span) = self.fresh();
        ClassBuilder {
            declaration: ClassDeclaration {
                id,
                name: name.to_string(),
                kind: ClassKind::Class,
                modality: Modality::Final,
                type_parameters: Vec::new(),
                primary_constructor: Some(Vec::new()),
                supertypes: Vec::new(),
                enum_entries: Vec::new(),
                members: Vec::new(),
                init_blocks: Vec::new(),
                span,
            },
        }
    }

    pub fn interface(&mut self, name: &str) -> ClassBuilder {
        let mut builder = self.class(name);
        builder.declaration.kind = ClassKind::Interface;
        builder.declaration.modality = Modality::Abstract;
        builder.declaration.primary_constructor = None;
        builder
    }

    pub fn object(&mut self, name: &str) -> ClassBuilder {
        let mut builder = self.class(name);
        builder.declaration.kind = ClassKind::Object;
        builder.declaration.primary_constructor = None;
        builder
    }

    pub fn enum_class(&mut self, name: &str, entries: &[&str]) -> ClassBuilder {
        let mut builder = self.class(name);
        builder.declaration.kind = ClassKind::EnumClass;
        builder.declaration.enum_entries = entries
            .iter()
            .map(|entry| {
                let (id, span) = self.fresh();
                EnumEntry {
                    id,
                    name: entry.to_string(),
                    span,
                }
            })
            .collect();
        builder
    }

    pub fn import(&mut self, path: &str) -> Import {
        let (_, span) = self.fresh();
        Import {
            path: path.to_string(),
            alias: None,
            is_star: false,
            span,
        }
    }

    pub fn star_import(&mut self, package: &str) -> Import {
        let mut import = self.import(package);
        import.is_star = true;
        import
    }

    pub fn file(
        &mut self,
        path: &str,
        package: Option<&str>,
        imports: Vec<Import>,
        declarations: Vec<Declaration>,
    ) -> SourceFile {
        let (_, span) = self.fresh();
        SourceFile {
            path: path.to_string(),
            package: package.map(str::to_string),
            imports,
            declarations,
            span,
        }
    }
}

/// Accumulates a function declaration; the id is assigned up front.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    declaration: FunctionDeclaration,
}

impl FunctionBuilder {
    pub fn type_parameter(mut self, parameter: TypeParameterDeclaration) -> Self {
        self.declaration.type_parameters.push(parameter);
        self
    }

    pub fn receiver(mut self, receiver: TypeAnnotation) -> Self {
        self.declaration.receiver = Some(receiver);
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.declaration.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, return_type: TypeAnnotation) -> Self {
        self.declaration.return_type = Some(return_type);
        self
    }

    pub fn block_body(mut self, block: Block) -> Self {
        self.declaration.body = Some(FunctionBody::Block(block));
        self
    }

    pub fn expression_body(mut self, expression: Expression) -> Self {
        self.declaration.body = Some(FunctionBody::Expression(expression));
        self
    }

    pub fn modality(mut self, modality: Modality) -> Self {
        self.declaration.modality = modality;
        self
    }

    pub fn overriding(mut self) -> Self {
        self.declaration.is_override = true;
        self
    }

    pub fn build(self) -> FunctionDeclaration {
        self.declaration
    }

    pub fn declaration(self) -> Declaration {
        Declaration::Function(self.declaration)
    }
}

#[derive(Debug, Clone)]
pub struct ClassBuilder {
    declaration: ClassDeclaration,
}

impl ClassBuilder {
    pub fn modality(mut self, modality: Modality) -> Self {
        self.declaration.modality = modality;
        self
    }

    pub fn sealed(self) -> Self {
        self.modality(Modality::Sealed)
    }

    pub fn type_parameter(mut self, parameter: TypeParameterDeclaration) -> Self {
        self.declaration.type_parameters.push(parameter);
        self
    }

    pub fn constructor(mut self, parameters: Vec<Parameter>) -> Self {
        self.declaration.primary_constructor = Some(parameters);
        self
    }

    pub fn supertype(mut self, supertype: TypeAnnotation) -> Self {
        self.declaration.supertypes.push(supertype);
        self
    }

    pub fn member(mut self, member: Declaration) -> Self {
        self.declaration.members.push(member);
        self
    }

    pub fn init_block(mut self, block: Block) -> Self {
        self.declaration.init_blocks.push(block);
        self
    }

    pub fn build(self) -> ClassDeclaration {
        self.declaration
    }

    pub fn declaration(self) -> Declaration {
        Declaration::Class(self.declaration)
    }
}
