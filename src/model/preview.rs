//! Preview (dry-run) result types: per-row diffs and aggregate statistics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One matched row's would-be changes, with a full snapshot of the original
/// record so rollback-by-restore stays possible even when only a subset of
/// fields changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordChange {
    pub record_id: String,
    pub record_name: String,
    pub original_values: HashMap<String, JsonValue>,
    pub new_values: HashMap<String, JsonValue>,
    pub original_record: Map<String, JsonValue>,
}

/// Aggregate before/after statistics for one numeric field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChangeStats {
    pub field_name: String,
    pub before_min: f64,
    pub before_max: f64,
    pub before_avg: f64,
    pub after_min: f64,
    pub after_max: f64,
    pub after_avg: f64,
    /// Mean of (after - before), in field units.
    pub avg_change: f64,
    /// (after_avg - before_avg) / before_avg * 100; `None` when the
    /// baseline average is zero.
    pub change_percent: Option<f64>,
}

impl FieldChangeStats {
    /// Aggregate (before, after) pairs for one field. `None` when empty.
    pub fn from_pairs(field_name: &str, pairs: &[(f64, f64)]) -> Option<Self> {
        if pairs.is_empty() {
            return None;
        }
        let n = pairs.len() as f64;
        let befores = pairs.iter().map(|(b, _)| *b);
        let afters = pairs.iter().map(|(_, a)| *a);

        let before_min = befores.clone().fold(f64::INFINITY, f64::min);
        let before_max = befores.clone().fold(f64::NEG_INFINITY, f64::max);
        let before_avg = befores.sum::<f64>() / n;
        let after_min = afters.clone().fold(f64::INFINITY, f64::min);
        let after_max = afters.clone().fold(f64::NEG_INFINITY, f64::max);
        let after_avg = afters.sum::<f64>() / n;
        let avg_change = pairs.iter().map(|(b, a)| a - b).sum::<f64>() / n;
        let change_percent = if before_avg == 0.0 {
            None
        } else {
            Some((after_avg - before_avg) / before_avg * 100.0)
        };

        Some(Self {
            field_name: field_name.to_string(),
            before_min,
            before_max,
            before_avg,
            after_min,
            after_max,
            after_avg,
            avg_change,
            change_percent,
        })
    }
}

/// Result of a read-only dry run. Produced fresh on each call, never
/// persisted, purely advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub rule_id: String,
    pub matched_count: usize,
    pub record_changes: Vec<RecordChange>,
    pub field_stats: HashMap<String, FieldChangeStats>,
    pub warnings: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PreviewResult {
    pub(crate) fn matched(rule_id: &str, matched_count: usize) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            matched_count,
            record_changes: Vec::new(),
            field_stats: HashMap::new(),
            warnings: Vec::new(),
            success: true,
            error_message: None,
        }
    }

    pub(crate) fn failed(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            matched_count: 0,
            record_changes: Vec::new(),
            field_stats: HashMap::new(),
            warnings: Vec::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}
