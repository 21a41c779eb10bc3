//! Data model for the design-rule engine: conditions, modifications, the
//! rule aggregate, and the preview/execution result types.

mod condition;
mod execution;
mod modification;
mod preview;
mod rule;

pub use condition::{Condition, ConditionOperator, LogicOperator};
pub use execution::ExecutionResult;
pub use modification::FieldModification;
pub use preview::{FieldChangeStats, PreviewResult, RecordChange};
pub use rule::{Rule, RuleStatus};
