use crate::types::{Type, TypeParamId, TypeVarId};
use tern_ast::{NodeId, Span};

/// A type variable created for one type parameter of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeVariable {
    pub id: TypeVarId,
    pub name: String,
    pub call: NodeId,
    pub span: Span,
    pub type_parameter: Option<TypeParamId>,
    /// Declared bounds, already rewritten in terms of sibling variables.
    pub declared_upper_bounds: Vec<Type>,
}

impl TypeVariable {
    pub fn ty(&self) -> Type {
        Type::variable(self.id)
    }
}

/// Hands out body-unique variable ids so that nested systems can be absorbed
/// without renaming.
#[derive(Debug, Default)]
pub struct TypeVariableAllocator {
    next: u32,
}

impl TypeVariableAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, name: impl Into<String>, call: NodeId, span: Span) -> TypeVariable {
        let id = TypeVarId::new(self.next);
        self.next += 1;
        TypeVariable {
            id,
            name: name.into(),
            call,
            span,
            type_parameter: None,
            declared_upper_bounds: Vec::new(),
        }
    }

    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}
