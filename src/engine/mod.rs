//! The rule engine: preview, execute, rollback, and the supporting
//! ledger/registry/audit plumbing.

mod audit;
mod execute;
mod ledger;
mod preview;
mod registry;
mod row;
mod validate;

pub use audit::{AuditAction, AuditRecord, AuditSink, TracingAuditSink};
pub use ledger::ExecutionLedger;
pub use registry::MechanismRegistry;
pub use validate::validate_rule;

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::compiler::{predicate, ExpressionCompiler, SqlFilter};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, RuleViolation};
use crate::model::{ExecutionResult, Rule};
use row::Record;

/// The design-rule engine. Owns the connection pool, the mechanism
/// registry, the expression compiler (and its cache), the execution ledger,
/// and the audit sink.
///
/// Preview and execute may run concurrently from independent tasks; the
/// engine adds no locking of its own beyond the per-execution database
/// transaction, and two executions targeting overlapping rows interleave at
/// whatever isolation the store provides.
pub struct RuleEngine {
    pool: SqlitePool,
    config: EngineConfig,
    registry: MechanismRegistry,
    compiler: ExpressionCompiler,
    ledger: ExecutionLedger,
    audit: Arc<dyn AuditSink>,
}

impl RuleEngine {
    pub fn new(pool: SqlitePool, config: EngineConfig) -> Self {
        let registry = MechanismRegistry::new(&config.mechanisms);
        let compiler = ExpressionCompiler::new(config.expression_cache_capacity);
        Self {
            pool,
            registry,
            compiler,
            ledger: ExecutionLedger::new(),
            audit: Arc::new(TracingAuditSink),
            config,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    /// All recorded executions, oldest first.
    pub fn execution_history(&self) -> Vec<ExecutionResult> {
        self.ledger.history()
    }

    /// Executions still eligible for rollback.
    pub fn rollbackable_executions(&self) -> Vec<ExecutionResult> {
        self.ledger.rollbackable()
    }

    /// Validate a rule's shape without touching the database.
    pub fn validate(&self, rule: &Rule) -> Vec<RuleViolation> {
        validate::validate_rule(rule, &self.compiler)
    }

    /// Validate, resolve the target table, and compile the predicate.
    pub(crate) fn resolve_and_compile(&self, rule: &Rule) -> EngineResult<(String, SqlFilter)> {
        let violations = self.validate(rule);
        if !violations.is_empty() {
            return Err(EngineError::Validation(violations));
        }
        let table = self.registry.resolve_table(rule)?;
        let filter = predicate::compile(&rule.conditions)?;
        Ok((table, filter))
    }

    pub(crate) async fn fetch_matching_rows(
        &self,
        table: &str,
        filter: &SqlFilter,
    ) -> EngineResult<Vec<Record>> {
        let sql = format!("SELECT * FROM {table} WHERE {}", filter.clause);
        debug!(sql = sql.as_str(), "resolving target rows");
        let mut query = sqlx::query(&sql);
        for bind in &filter.binds {
            query = row::bind_value(query, bind);
        }
        let rows = self.with_timeout(query.fetch_all(&self.pool)).await?;
        rows.iter()
            .map(row::record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::from)
    }

    /// Bound a database call by the configured statement timeout.
    pub(crate) async fn with_timeout<T, F>(&self, fut: F) -> EngineResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.config.statement_timeout(), fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Timeout {
                timeout_ms: self.config.statement_timeout_ms,
            }),
        }
    }

    /// Apply statements inside one transaction, all-or-nothing. Any
    /// statement failure rolls the whole batch back.
    pub(crate) async fn apply_statements(&self, statements: &[String]) -> EngineResult<u64> {
        let mut tx = self.with_timeout(self.pool.begin()).await?;
        let mut affected = 0u64;
        for sql in statements {
            match self.with_timeout(sqlx::query(sql).execute(&mut *tx)).await {
                Ok(done) => affected += done.rows_affected(),
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(err);
                }
            }
        }
        self.with_timeout(tx.commit()).await?;
        Ok(affected)
    }

    pub(crate) async fn emit_audit(&self, record: AuditRecord) {
        if let Err(err) = self.audit.record(&record).await {
            warn!(error = %err, "audit sink failed; continuing");
        }
    }
}
