// tern_ast/types - node identity, positions, literals, operators and type annotations
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a tree node. Every analysis result is keyed by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position information for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn dummy() -> Self {
        Self::default()
    }

    /// Smallest span covering both inputs.
    pub fn merge(&self, other: &Span) -> Span {
        let (start_line, start_column) = (self.start_line, self.start_column)
            .min((other.start_line, other.start_column));
        let (end_line, end_column) =
            (self.end_line, self.end_column).max((other.end_line, other.end_column));
        Span::new(start_line, start_column, end_line, end_column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Boolean(bool),
    /// Integer literal without suffix; its type is decided by the context.
    Integer(i64),
    /// Integer literal with an `L` suffix.
    Long(i64),
    Double(f64),
    Float(f32),
    Character(char),
    String(String),
    Null,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Logical
    And,
    Or,
    // Null safety
    Elvis,
    // Range
    RangeTo,
}

impl BinaryOp {
    /// Name of the operator member function the operation desugars to, if any.
    pub fn operator_function(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("plus"),
            BinaryOp::Subtract => Some("minus"),
            BinaryOp::Multiply => Some("times"),
            BinaryOp::Divide => Some("div"),
            BinaryOp::Modulo => Some("rem"),
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                Some("compareTo")
            }
            BinaryOp::RangeTo => Some("rangeTo"),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Elvis => "?:",
            BinaryOp::RangeTo => "..",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

impl UnaryOp {
    pub fn operator_function(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Minus => "unaryMinus",
            UnaryOp::Plus => "unaryPlus",
        }
    }
}

/// Declaration-site variance of a type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Variance {
    #[default]
    Invariant,
    In,
    Out,
}

/// Inheritance modality of classes and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Modality {
    #[default]
    Final,
    Open,
    Abstract,
    Sealed,
}

/// How often a lambda argument is invoked by the callee, as declared by its
/// contract. Anything but `Unknown` lets flow analysis treat the body in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InvocationKind {
    #[default]
    Unknown,
    AtMostOnce,
    ExactlyOnce,
    AtLeastOnce,
}

impl InvocationKind {
    pub fn is_in_place(self) -> bool {
        !matches!(self, InvocationKind::Unknown)
    }
}

/// Type annotations written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeAnnotation {
    Named {
        name: String,
        arguments: Vec<TypeAnnotation>,
        nullable: bool,
        span: Span,
    },
    Function {
        receiver: Option<Box<TypeAnnotation>>,
        parameters: Vec<TypeAnnotation>,
        return_type: Box<TypeAnnotation>,
        nullable: bool,
        span: Span,
    },
    Star(Span),
}

impl TypeAnnotation {
    pub fn simple(name: impl Into<String>) -> Self {
        TypeAnnotation::Named {
            name: name.into(),
            arguments: Vec::new(),
            nullable: false,
            span: Span::dummy(),
        }
    }

    pub fn generic(name: impl Into<String>, arguments: Vec<TypeAnnotation>) -> Self {
        TypeAnnotation::Named {
            name: name.into(),
            arguments,
            nullable: false,
            span: Span::dummy(),
        }
    }

    pub fn function(parameters: Vec<TypeAnnotation>, return_type: TypeAnnotation) -> Self {
        TypeAnnotation::Function {
            receiver: None,
            parameters,
            return_type: Box::new(return_type),
            nullable: false,
            span: Span::dummy(),
        }
    }

    /// Returns the same annotation with `?` applied.
    pub fn nullable(mut self) -> Self {
        match &mut self {
            TypeAnnotation::Named { nullable, .. } | TypeAnnotation::Function { nullable, .. } => {
                *nullable = true;
            }
            TypeAnnotation::Star(_) => {}
        }
        self
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            TypeAnnotation::Named { nullable, .. } | TypeAnnotation::Function { nullable, .. } => {
                *nullable
            }
            TypeAnnotation::Star(_) => true,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            TypeAnnotation::Named { span, .. }
            | TypeAnnotation::Function { span, .. }
            | TypeAnnotation::Star(span) => span,
        }
    }
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeAnnotation::Named {
                name,
                arguments,
                nullable,
                ..
            } => {
                write!(f, "{name}")?;
                if !arguments.is_empty() {
                    write!(f, "<")?;
                    for (index, argument) in arguments.iter().enumerate() {
                        if index > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{argument}")?;
                    }
                    write!(f, ">")?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            TypeAnnotation::Function {
                receiver,
                parameters,
                return_type,
                nullable,
                ..
            } => {
                if *nullable {
                    write!(f, "(")?;
                }
                if let Some(receiver) = receiver {
                    write!(f, "{receiver}.")?;
                }
                write!(f, "(")?;
                for (index, parameter) in parameters.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{parameter}")?;
                }
                write!(f, ") -> {return_type}")?;
                if *nullable {
                    write!(f, ")?")?;
                }
                Ok(())
            }
            TypeAnnotation::Star(_) => write!(f, "*"),
        }
    }
}
