//! Compilers: typed conditions → SQL filter text, and modification
//! expressions → evaluable ASTs bound to the per-row `current` variable.

pub mod expression;
mod parser;
pub mod predicate;

pub use expression::{CompiledExpression, ExpressionCompiler};
pub use predicate::SqlFilter;
