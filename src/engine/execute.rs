//! Transactional execute and rollback.
//!
//! Execute is two-phase: every new value is computed and every statement
//! (forward and compensating) is assembled before the first write, so a
//! computation failure can never leave partial changes behind.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::compiler::predicate::{is_identifier, sql_literal};
use crate::engine::audit::{AuditAction, AuditRecord};
use crate::engine::{row, RuleEngine};
use crate::error::{EngineError, EngineResult};
use crate::model::{ExecutionResult, Rule};

struct PlannedUpdate {
    forward: String,
    compensating: String,
}

impl RuleEngine {
    /// Apply a rule to its matching rows inside one transaction.
    ///
    /// Matching rows are re-resolved at execution time; a preview taken
    /// earlier may have seen a different set. Not idempotent: executing the
    /// same rule twice compounds its modifications.
    pub async fn execute(&self, rule: &Rule) -> ExecutionResult {
        let mut result = ExecutionResult::started(&rule.id, &rule.name, &self.config.actor);
        match self.run_execute(rule, &mut result).await {
            Ok(affected) => {
                result.mark_complete(affected);
                info!(
                    rule = rule.name.as_str(),
                    execution_id = result.execution_id.as_str(),
                    affected,
                    "execution committed"
                );
            }
            Err(err) => {
                warn!(rule = rule.name.as_str(), error = %err, "execution failed");
                result.mark_failed(err.to_string());
            }
        }
        self.ledger.append(result.clone());
        self.emit_audit(AuditRecord {
            action: AuditAction::Execute,
            rule_id: rule.id.clone(),
            table: result.target_table.clone(),
            affected_count: result.affected_count,
            success: result.success,
            actor: result.executed_by.clone(),
            timestamp: Utc::now(),
        })
        .await;
        result
    }

    async fn run_execute(&self, rule: &Rule, result: &mut ExecutionResult) -> EngineResult<u64> {
        let (table, filter) = self.resolve_and_compile(rule)?;
        result.target_table = table.clone();

        // Phase 1: resolve rows and compute everything up front.
        let rows = self.fetch_matching_rows(&table, &filter).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut compiled = Vec::with_capacity(rule.modifications.len());
        for modification in &rule.modifications {
            let expr = self.compiler.compile(&modification.expression)?;
            compiled.push((modification.field_name.clone(), expr));
        }

        let pk_column = self.config.primary_key_column.as_str();
        let mut planned: Vec<PlannedUpdate> = Vec::with_capacity(rows.len());
        let mut snapshots: Vec<JsonValue> = Vec::with_capacity(rows.len());

        for record in &rows {
            let pk = record
                .get(pk_column)
                .filter(|v| !v.is_null())
                .ok_or_else(|| EngineError::MissingPrimaryKey {
                    table: table.clone(),
                    column: pk_column.to_string(),
                })?;
            let record_id = row::value_display(pk);

            let mut forward_sets = Vec::with_capacity(compiled.len());
            let mut compensating_sets = Vec::with_capacity(compiled.len());
            for (field, expr) in &compiled {
                // Fail-closed: unlike preview, any row's failure aborts the
                // whole execution before a single write.
                let original =
                    record
                        .get(field)
                        .ok_or_else(|| EngineError::RowEvaluation {
                            record: record_id.clone(),
                            field: field.clone(),
                            message: "field not present".to_string(),
                        })?;
                let current =
                    row::numeric_value(original).ok_or_else(|| EngineError::RowEvaluation {
                        record: record_id.clone(),
                        field: field.clone(),
                        message: "current value is not numeric".to_string(),
                    })?;
                let new_value = expr.eval(current).map_err(|err| EngineError::RowEvaluation {
                    record: record_id.clone(),
                    field: field.clone(),
                    message: err.to_string(),
                })?;
                forward_sets.push((field.clone(), row::json_number(new_value)));
                compensating_sets.push((field.clone(), original.clone()));
            }

            planned.push(PlannedUpdate {
                forward: build_update(&table, pk_column, pk, &forward_sets)?,
                compensating: build_update(&table, pk_column, pk, &compensating_sets)?,
            });
            snapshots.push(JsonValue::Object(record.clone()));
        }

        // Phase 2: apply inside one transaction.
        let forward: Vec<String> = planned.iter().map(|p| p.forward.clone()).collect();
        self.apply_statements(&forward).await?;

        result.executed_sqls = forward;
        result.rollback_sqls = planned.into_iter().map(|p| p.compensating).collect();
        result.rollback_data = snapshots;
        Ok(rows.len() as u64)
    }

    /// Restore the rows touched by a prior execution from its compensating
    /// statements. All-or-nothing: a failed rollback leaves the table in
    /// its post-execution state, never half-restored. One-shot: once rolled
    /// back, the execution is permanently ineligible.
    pub async fn rollback(&self, execution_id: &str) -> EngineResult<ExecutionResult> {
        let original =
            self.ledger
                .get(execution_id)
                .ok_or_else(|| EngineError::ExecutionNotFound {
                    execution_id: execution_id.to_string(),
                })?;
        if !original.can_rollback() {
            let reason = if original.rolled_back {
                "already rolled back"
            } else if !original.success {
                "original execution failed"
            } else {
                "no rollback statements recorded"
            };
            return Err(EngineError::NotRollbackable {
                execution_id: execution_id.to_string(),
                reason: reason.to_string(),
            });
        }

        let mut restore = ExecutionResult::started(
            &original.rule_id,
            &format!("rollback of '{}'", original.rule_name),
            &self.config.actor,
        );
        restore.target_table = original.target_table.clone();

        let outcome = self.apply_statements(&original.rollback_sqls).await;
        match outcome {
            // The restore reports how many rows it actually touched, which
            // can be fewer than the original count if rows were deleted in
            // the meantime.
            Ok(restored) => {
                self.ledger.mark_rolled_back(execution_id);
                restore.executed_sqls = original.rollback_sqls.clone();
                restore.mark_complete(restored);
                info!(execution_id, restored, "rollback committed");
            }
            Err(ref err) => {
                warn!(execution_id, error = %err, "rollback failed");
                restore.mark_failed(err.to_string());
            }
        }

        self.ledger.append(restore.clone());
        self.emit_audit(AuditRecord {
            action: AuditAction::Rollback,
            rule_id: original.rule_id.clone(),
            table: original.target_table.clone(),
            affected_count: restore.affected_count,
            success: restore.success,
            actor: restore.executed_by.clone(),
            timestamp: Utc::now(),
        })
        .await;

        outcome.map(|_| restore)
    }
}

/// Build a single-row UPDATE with inline literals, so the statement is
/// self-contained when replayed from the ledger.
fn build_update(
    table: &str,
    pk_column: &str,
    pk: &JsonValue,
    sets: &[(String, JsonValue)],
) -> EngineResult<String> {
    let mut assignments = Vec::with_capacity(sets.len());
    for (field, value) in sets {
        if !is_identifier(field) {
            return Err(EngineError::Predicate(
                crate::error::PredicateError::InvalidIdentifier {
                    field: field.clone(),
                },
            ));
        }
        assignments.push(format!("{field} = {}", sql_literal(value, field)?));
    }
    Ok(format!(
        "UPDATE {table} SET {} WHERE {pk_column} = {}",
        assignments.join(", "),
        sql_literal(pk, pk_column)?
    ))
}
