// tern_ast/statement - Statements, declarations and source files
use crate::expression::Expression;
use crate::types::{Modality, NodeId, Span, TypeAnnotation, Variance};
use serde::{Deserialize, Serialize};

/// One input file: package header, imports and top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub declarations: Vec<Declaration>,
    pub span: Span,
}

impl SourceFile {
    pub fn package_name(&self) -> &str {
        self.package.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Dotted path, e.g. `lib.util.format`. Star imports name the package.
    pub path: String,
    pub alias: Option<String>,
    pub is_star: bool,
    pub span: Span,
}

impl Import {
    /// Name the import introduces into file scope.
    pub fn visible_name(&self) -> Option<&str> {
        if self.is_star {
            return None;
        }
        self.alias
            .as_deref()
            .or_else(|| self.path.rsplit('.').next())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Function(FunctionDeclaration),
    Property(PropertyDeclaration),
    Class(ClassDeclaration),
}

impl Declaration {
    pub fn id(&self) -> NodeId {
        match self {
            Declaration::Function(function) => function.id,
            Declaration::Property(property) => property.id,
            Declaration::Class(class) => class.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Declaration::Function(function) => &function.name,
            Declaration::Property(property) => &property.name,
            Declaration::Class(class) => &class.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParameterDeclaration {
    pub id: NodeId,
    pub name: String,
    pub variance: Variance,
    pub upper_bounds: Vec<TypeAnnotation>,
    pub span: Span,
}

/// Value parameter of a function, constructor, lambda, catch clause or loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: NodeId,
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
    pub default_value: Option<Expression>,
    pub is_vararg: bool,
    /// `val`/`var` on a primary-constructor parameter declares a property.
    pub property: Option<PropertyMutability>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyMutability {
    Val,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub id: NodeId,
    pub name: String,
    pub type_parameters: Vec<TypeParameterDeclaration>,
    pub receiver: Option<TypeAnnotation>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Option<FunctionBody>,
    pub modality: Modality,
    pub is_override: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(Block),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub id: NodeId,
    pub name: String,
    pub is_mutable: bool,
    pub receiver: Option<TypeAnnotation>,
    pub type_annotation: Option<TypeAnnotation>,
    pub initializer: Option<Expression>,
    pub has_custom_getter: bool,
    pub is_delegated: bool,
    pub modality: Modality,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
    EnumClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub id: NodeId,
    pub name: String,
    pub kind: ClassKind,
    pub modality: Modality,
    pub type_parameters: Vec<TypeParameterDeclaration>,
    /// `None` for interfaces and objects; classes without an explicit
    /// constructor get an empty list.
    pub primary_constructor: Option<Vec<Parameter>>,
    pub supertypes: Vec<TypeAnnotation>,
    pub enum_entries: Vec<EnumEntry>,
    pub members: Vec<Declaration>,
    pub init_blocks: Vec<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    Local(LocalVariable),
    LocalFunction(FunctionDeclaration),
    LocalClass(ClassDeclaration),
    Assignment {
        id: NodeId,
        target: Expression,
        value: Expression,
        span: Span,
    },
    While {
        id: NodeId,
        condition: Expression,
        body: Block,
        span: Span,
    },
    DoWhile {
        id: NodeId,
        body: Block,
        condition: Expression,
        span: Span,
    },
    For {
        id: NodeId,
        variable: Parameter,
        iterable: Expression,
        body: Block,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Expression(expr) => &expr.span,
            Statement::Local(local) => &local.span,
            Statement::LocalFunction(function) => &function.span,
            Statement::LocalClass(class) => &class.span,
            Statement::Assignment { span, .. }
            | Statement::While { span, .. }
            | Statement::DoWhile { span, .. }
            | Statement::For { span, .. } => span,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            Statement::Expression(expr) => expr.id,
            Statement::Local(local) => local.id,
            Statement::LocalFunction(function) => function.id,
            Statement::LocalClass(class) => class.id,
            Statement::Assignment { id, .. }
            | Statement::While { id, .. }
            | Statement::DoWhile { id, .. }
            | Statement::For { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub id: NodeId,
    pub name: String,
    pub is_mutable: bool,
    pub type_annotation: Option<TypeAnnotation>,
    pub initializer: Option<Expression>,
    pub span: Span,
}
