//! Callable signatures as seen by overload resolution.

use crate::registry::TypeRegistry;
use crate::types::{ClassId, DeclId, Type, TypeParamId};
use std::fmt::Write as _;
use tern_ast::{NodeId, Span};

/// Closed set of callable declaration kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Function,
    Constructor,
    /// Property whose value of function type is invoked.
    Property,
    /// Local variable or parameter of function type, called through `invoke`.
    LocalValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueParameter {
    pub name: String,
    /// For varargs this is the element type.
    pub ty: Type,
    pub has_default: bool,
    pub is_vararg: bool,
}

impl ValueParameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
            is_vararg: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn vararg(mut self) -> Self {
        self.is_vararg = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallableSignature {
    pub id: DeclId,
    pub name: String,
    pub kind: CallableKind,
    pub type_parameters: Vec<TypeParamId>,
    /// Declared type of the owning class for members.
    pub dispatch_receiver: Option<Type>,
    pub extension_receiver: Option<Type>,
    pub parameters: Vec<ValueParameter>,
    pub return_type: Type,
    pub owner: Option<ClassId>,
    pub declaration: Option<NodeId>,
    pub span: Span,
}

impl CallableSignature {
    pub fn function(id: DeclId, name: impl Into<String>, parameters: Vec<ValueParameter>, return_type: Type) -> Self {
        Self {
            id,
            name: name.into(),
            kind: CallableKind::Function,
            type_parameters: Vec::new(),
            dispatch_receiver: None,
            extension_receiver: None,
            parameters,
            return_type,
            owner: None,
            declaration: None,
            span: Span::dummy(),
        }
    }

    pub fn with_type_parameters(mut self, type_parameters: Vec<TypeParamId>) -> Self {
        self.type_parameters = type_parameters;
        self
    }

    pub fn with_extension_receiver(mut self, receiver: Type) -> Self {
        self.extension_receiver = Some(receiver);
        self
    }

    pub fn with_dispatch_receiver(mut self, owner: ClassId, receiver: Type) -> Self {
        self.owner = Some(owner);
        self.dispatch_receiver = Some(receiver);
        self
    }

    pub fn is_extension(&self) -> bool {
        self.extension_receiver.is_some()
    }

    pub fn is_member(&self) -> bool {
        self.dispatch_receiver.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_parameters.is_empty()
    }

    pub fn has_vararg(&self) -> bool {
        self.parameters.iter().any(|parameter| parameter.is_vararg)
    }

    /// Function type of a reference to this callable. Unbound references to
    /// members take the receiver as their first parameter.
    pub fn reference_type(&self, registry: &TypeRegistry, unbound_receiver: Option<&Type>) -> Type {
        let mut parameters = Vec::with_capacity(self.parameters.len() + 1);
        if let Some(receiver) = unbound_receiver {
            parameters.push(receiver.clone());
        }
        for parameter in &self.parameters {
            if parameter.is_vararg {
                parameters.push(Type::generic(crate::registry::builtins::ARRAY, vec![parameter.ty.clone()]));
            } else {
                parameters.push(parameter.ty.clone());
            }
        }
        registry.function_type(parameters, self.return_type.clone())
    }

    /// Human readable form used in diagnostics: `foo(Int, String): Unit`.
    pub fn describe(&self, registry: &TypeRegistry) -> String {
        let mut out = String::new();
        if let Some(receiver) = self.extension_receiver.as_ref().or(self.dispatch_receiver.as_ref()) {
            let _ = write!(out, "{}.", registry.display(receiver));
        }
        if !self.type_parameters.is_empty() {
            out.push('<');
            for (index, param) in self.type_parameters.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(&registry.type_parameter(*param).name);
            }
            out.push_str("> ");
        }
        out.push_str(&self.name);
        out.push('(');
        for (index, parameter) in self.parameters.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            if parameter.is_vararg {
                out.push_str("vararg ");
            }
            let _ = write!(out, "{}", registry.display(&parameter.ty));
        }
        let _ = write!(out, "): {}", registry.display(&self.return_type));
        out
    }
}
