//! Read-only dry run: matched rows, per-row diffs, aggregate statistics.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::{row, RuleEngine};
use crate::error::EngineResult;
use crate::model::{FieldChangeStats, PreviewResult, RecordChange, Rule};

impl RuleEngine {
    /// Dry-run a rule. Never mutates the store, takes no locks, and is safe
    /// to call repeatedly and concurrently. Validation, resolution, and
    /// database failures come back as `success = false` with an error
    /// message rather than an `Err`.
    pub async fn preview(&self, rule: &Rule) -> PreviewResult {
        match self.run_preview(rule).await {
            Ok(result) => result,
            Err(err) => PreviewResult::failed(&rule.id, err.to_string()),
        }
    }

    async fn run_preview(&self, rule: &Rule) -> EngineResult<PreviewResult> {
        let (table, filter) = self.resolve_and_compile(rule)?;
        let rows = self.fetch_matching_rows(&table, &filter).await?;

        let mut result = PreviewResult::matched(&rule.id, rows.len());
        if rows.is_empty() {
            result.warnings.push("no matching records".to_string());
            return Ok(result);
        }

        // Validation already proved these compile; the cache makes the
        // recompile cheap.
        let mut compiled = Vec::with_capacity(rule.modifications.len());
        for modification in &rule.modifications {
            let expr = self.compiler.compile(&modification.expression)?;
            compiled.push((modification.field_name.clone(), expr));
        }

        let pk_column = self.config.primary_key_column.as_str();
        let mut pairs_by_field: HashMap<String, Vec<(f64, f64)>> = HashMap::new();

        for record in &rows {
            let record_id = record
                .get(pk_column)
                .map(row::value_display)
                .unwrap_or_else(|| "?".to_string());
            let record_name = record
                .get("name")
                .filter(|v| !v.is_null())
                .map(row::value_display)
                .unwrap_or_else(|| record_id.clone());

            let mut original_values = HashMap::new();
            let mut new_values = HashMap::new();

            for (field, expr) in &compiled {
                let Some(original) = record.get(field) else {
                    result.warnings.push(format!(
                        "record {record_id}: field '{field}' not present; skipped"
                    ));
                    continue;
                };
                let Some(current) = row::numeric_value(original) else {
                    result.warnings.push(format!(
                        "record {record_id}: field '{field}' is not numeric; skipped"
                    ));
                    continue;
                };
                match expr.eval(current) {
                    Ok(new_value) => {
                        pairs_by_field
                            .entry(field.clone())
                            .or_default()
                            .push((current, new_value));
                        original_values.insert(field.clone(), original.clone());
                        new_values.insert(field.clone(), row::json_number(new_value));
                    }
                    // Partial-result policy: one bad row never aborts the
                    // whole preview.
                    Err(err) => {
                        result
                            .warnings
                            .push(format!("record {record_id}: field '{field}': {err}"));
                    }
                }
            }

            if !new_values.is_empty() {
                result.record_changes.push(RecordChange {
                    record_id,
                    record_name,
                    original_values,
                    new_values,
                    original_record: record.clone(),
                });
            }
        }

        for (field, _) in &compiled {
            let pairs = pairs_by_field.get(field).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(stats) = FieldChangeStats::from_pairs(field, pairs) {
                if stats.change_percent.is_none() {
                    result.warnings.push(format!(
                        "field '{field}': baseline average is zero; percent change not computed"
                    ));
                }
                result.field_stats.insert(field.clone(), stats);
            }
        }

        debug!(
            rule = rule.name.as_str(),
            matched = result.matched_count,
            changes = result.record_changes.len(),
            "preview complete"
        );
        Ok(result)
    }
}
