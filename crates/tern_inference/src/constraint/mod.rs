//! Constraint system over the type variables of one outer call.
//!
//! Bounds are incorporated eagerly: every new bound is checked against the
//! existing bounds of its variable, which may add bounds on other variables.
//! Fixation picks a concrete type per variable and re-validates its bounds.

mod error;
mod fixation;
mod system;
mod variable;

pub use error::ConstraintError;
pub use system::{ConstraintSystem, LiteralFit, VariableState};
pub use variable::{TypeVariable, TypeVariableAllocator};

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Upper,
    Lower,
    Equality,
}

/// Where a bound came from. Contradictions are reported against the most
/// specific origin involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintOrigin {
    Argument(usize),
    Receiver,
    PostponedArgument(usize),
    ExplicitTypeArgument,
    ExpectedType,
    DeclaredUpperBound,
}

impl ConstraintOrigin {
    pub fn rank(self) -> u8 {
        match self {
            ConstraintOrigin::Argument(_) => 0,
            ConstraintOrigin::Receiver => 1,
            ConstraintOrigin::PostponedArgument(_) => 2,
            ConstraintOrigin::ExplicitTypeArgument => 3,
            ConstraintOrigin::ExpectedType => 4,
            ConstraintOrigin::DeclaredUpperBound => 5,
        }
    }

    pub fn most_specific(self, other: ConstraintOrigin) -> ConstraintOrigin {
        if other.rank() < self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub ty: Type,
    pub origin: ConstraintOrigin,
    /// Value of an integer literal when this lower bound stands for one.
    pub literal: Option<i64>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, ty: Type, origin: ConstraintOrigin) -> Self {
        Self {
            kind,
            ty,
            origin,
            literal: None,
        }
    }

    pub fn is_declared(&self) -> bool {
        self.origin == ConstraintOrigin::DeclaredUpperBound
    }
}
