//! Design-rule engine for batch tuning of game data tables.
//!
//! A designer's intent ("raise mage weapon damage by 20% for level ≥ 50
//! items") is expressed as a declarative [`Rule`]: a predicate over one
//! mechanism's table plus a set of per-field modification expressions. The
//! engine compiles the predicate to SQL, dry-runs the rule for review
//! ([`RuleEngine::preview`]), applies it inside a single transaction
//! ([`RuleEngine::execute`]), and can later restore the affected rows from
//! the compensating statements recorded in the execution ledger
//! ([`RuleEngine::rollback`]).

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;

pub use compiler::{CompiledExpression, ExpressionCompiler, SqlFilter};
pub use config::EngineConfig;
pub use engine::{
    AuditAction, AuditRecord, AuditSink, ExecutionLedger, MechanismRegistry, RuleEngine,
    TracingAuditSink,
};
pub use error::{
    ConfigError, EngineError, EngineResult, ExpressionError, PredicateError, RuleViolation,
};
pub use model::{
    Condition, ConditionOperator, ExecutionResult, FieldChangeStats, FieldModification,
    LogicOperator, PreviewResult, RecordChange, Rule, RuleStatus,
};
