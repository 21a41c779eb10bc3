//! Error taxonomy for the design-rule engine.
//!
//! Validation and expression-compile failures are returned inside result
//! objects (`PreviewResult`, `ExecutionResult`) so authoring surfaces can
//! render them directly; only rollback preconditions and internal plumbing
//! surface as `Err` values.

use thiserror::Error;

/// A single rule-shape violation found during validation.
///
/// Violations are accumulated, not fail-fast, so the author sees every
/// problem in one pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule target mechanism must not be empty")]
    EmptyMechanism,

    #[error("rule must declare at least one field modification")]
    NoModifications,

    #[error("modification #{index} has an empty field name")]
    ModificationFieldEmpty { index: usize },

    #[error("expression for field '{field}' does not compile: {message}")]
    ExpressionInvalid { field: String, message: String },

    #[error("condition #{index} has an empty field name")]
    ConditionFieldEmpty { index: usize },

    #[error("condition on '{field}' requires a value for operator {operator}")]
    ConditionValueMissing { field: String, operator: String },
}

/// Failures while turning a condition list into a SQL filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("condition on '{field}' requires a value for operator {operator}")]
    MissingValue { field: String, operator: String },

    #[error("'{field}' is not a valid field identifier")]
    InvalidIdentifier { field: String },

    #[error("BETWEEN on '{field}' requires a two-element bound")]
    InvalidBetweenBound { field: String },

    #[error("IN list on '{field}' must not be empty")]
    EmptyInList { field: String },

    #[error("unsupported literal value for '{field}'")]
    UnsupportedLiteral { field: String },
}

/// Failures while compiling or evaluating a modification expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("cannot compile expression '{expression}': {message}")]
    Compile { expression: String, message: String },

    #[error("division by zero while evaluating '{expression}'")]
    DivisionByZero { expression: String },

    #[error("expression '{expression}' produced a non-finite result")]
    NonFinite { expression: String },
}

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("rule validation failed: {}", join_violations(.0))]
    Validation(Vec<RuleViolation>),

    #[error("unknown mechanism '{mechanism}' and no explicit target table")]
    UnknownMechanism { mechanism: String },

    #[error("'{table}' is not a valid table name")]
    InvalidTableName { table: String },

    #[error("row in '{table}' is missing primary key column '{column}'")]
    MissingPrimaryKey { table: String, column: String },

    #[error("record '{record}' field '{field}' failed to evaluate: {message}")]
    RowEvaluation {
        record: String,
        field: String,
        message: String,
    },

    #[error("illegal rule status transition {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("execution '{execution_id}' not found in ledger")]
    ExecutionNotFound { execution_id: String },

    #[error("execution '{execution_id}' cannot be rolled back: {reason}")]
    NotRollbackable {
        execution_id: String,
        reason: String,
    },

    #[error("statement timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("predicate error: {0}")]
    Predicate(#[from] PredicateError),

    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn join_violations(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration load failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_violations() {
        let err = EngineError::Validation(vec![
            RuleViolation::EmptyName,
            RuleViolation::NoModifications,
        ]);
        let text = err.to_string();
        assert!(text.contains("rule name must not be empty"));
        assert!(text.contains("at least one field modification"));
    }

    #[test]
    fn expression_error_names_raw_expression() {
        let err = ExpressionError::Compile {
            expression: "current **".to_string(),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("current **"));
    }
}
