use super::ConstraintOrigin;
use crate::types::{Type, TypeVarId};

/// Contradictions and failures found while solving one system.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintError {
    TypeMismatch {
        expected: Type,
        actual: Type,
        origin: ConstraintOrigin,
        variable: Option<TypeVarId>,
    },
    UpperBoundViolated {
        variable: TypeVarId,
        bound: Type,
        actual: Type,
    },
    CannotInferType {
        variable: TypeVarId,
    },
    LimitExceeded {
        limit: &'static str,
    },
}

impl ConstraintError {
    pub fn origin(&self) -> Option<ConstraintOrigin> {
        match self {
            ConstraintError::TypeMismatch { origin, .. } => Some(*origin),
            ConstraintError::UpperBoundViolated { .. } => Some(ConstraintOrigin::DeclaredUpperBound),
            _ => None,
        }
    }

    /// Errors attributed to arguments sort before anything else.
    pub fn rank(&self) -> u8 {
        match self {
            ConstraintError::LimitExceeded { .. } => 0,
            ConstraintError::TypeMismatch { origin, .. } => 1 + origin.rank(),
            ConstraintError::UpperBoundViolated { .. } => 1 + ConstraintOrigin::DeclaredUpperBound.rank(),
            ConstraintError::CannotInferType { .. } => 16,
        }
    }
}
