// tern_ast - declaration and expression trees consumed by the semantic core
pub mod builder;
pub mod expression;
pub mod statement;
pub mod types;

pub use builder::{AstBuilder, ClassBuilder, FunctionBuilder};
pub use expression::*;
pub use statement::*;
pub use types::*;

#[cfg(test)]
mod tests;
