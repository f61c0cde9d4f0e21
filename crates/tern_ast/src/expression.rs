// tern_ast/expression - Expression nodes
use crate::statement::{Block, Parameter};
use crate::types::{BinaryOp, InvocationKind, Literal, NodeId, Span, TypeAnnotation, UnaryOp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: NodeId,
    pub kind: ExpressionKind,
    pub span: Span,
}

impl Expression {
    pub fn new(id: NodeId, kind: ExpressionKind, span: Span) -> Self {
        Self { id, kind, span }
    }

    /// Jumps and throws never complete normally.
    pub fn is_jump(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Return(_)
                | ExpressionKind::Break
                | ExpressionKind::Continue
                | ExpressionKind::Throw(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),
    /// Simple name: local, parameter, property, object or class qualifier.
    Name(String),
    This,
    MemberAccess {
        receiver: Box<Expression>,
        name: String,
        safe: bool,
    },
    Call(CallExpression),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Is {
        expr: Box<Expression>,
        type_annotation: TypeAnnotation,
        negated: bool,
    },
    As {
        expr: Box<Expression>,
        type_annotation: TypeAnnotation,
        safe: bool,
    },
    NotNullAssertion(Box<Expression>),
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },
    When(WhenExpression),
    Block(Block),
    Lambda(LambdaExpression),
    CallableReference {
        receiver: Option<CallableReferenceReceiver>,
        name: String,
    },
    Try(TryExpression),
    Throw(Box<Expression>),
    Return(Option<Box<Expression>>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Callee,
    pub type_arguments: Vec<TypeAnnotation>,
    pub arguments: Vec<Argument>,
}

/// What is being called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// `foo(...)`: functions, constructors, or values with `invoke`.
    Name { name: String, span: Span },
    /// `receiver.foo(...)` or `receiver?.foo(...)`.
    Member {
        receiver: Box<Expression>,
        name: String,
        safe: bool,
        span: Span,
    },
    /// `(expr)(...)`: invocation of a function-typed value.
    Expression(Box<Expression>),
}

impl Callee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Callee::Name { name, .. } | Callee::Member { name, .. } => Some(name),
            Callee::Expression(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expression,
    pub spread: bool,
}

impl Argument {
    pub fn positional(value: Expression) -> Self {
        Self {
            name: None,
            value,
            spread: false,
        }
    }

    pub fn named(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: Some(name.into()),
            value,
            spread: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenExpression {
    pub subject: Option<WhenSubject>,
    pub branches: Vec<WhenBranch>,
    pub else_branch: Option<Box<Expression>>,
}

/// `when (x)` or `when (val y = expr)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenSubject {
    pub id: NodeId,
    pub binding: Option<String>,
    pub expression: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenBranch {
    pub id: NodeId,
    pub conditions: Vec<WhenCondition>,
    pub body: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhenCondition {
    /// Compared for equality with the subject, or a boolean condition when the
    /// `when` has no subject.
    Expression(Expression),
    IsType {
        id: NodeId,
        type_annotation: TypeAnnotation,
        negated: bool,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpression {
    /// Empty when the lambda relies on the implicit `it` parameter.
    pub parameters: Vec<Parameter>,
    pub body: Block,
    pub invocation: InvocationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallableReferenceReceiver {
    /// `Type::member`, the receiver becomes the first parameter.
    Type(TypeAnnotation),
    /// `expr::member`, bound to the evaluated receiver.
    Expression(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryExpression {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub id: NodeId,
    pub parameter: Parameter,
    pub body: Block,
    pub span: Span,
}
