//! Execution results: the ledger entry that makes rollback possible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Outcome of one committed (or attempted) rule execution.
///
/// Lifecycle: created at execution start, then exactly one of
/// [`mark_complete`](Self::mark_complete) / [`mark_failed`](Self::mark_failed),
/// and optionally [`mark_rolled_back`](Self::mark_rolled_back) later. Once
/// rolled back the execution is permanently ineligible for another rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub success: bool,
    pub affected_count: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The UPDATE statements that were committed.
    pub executed_sqls: Vec<String>,
    /// Compensating statements restoring pre-execution values.
    pub rollback_sqls: Vec<String>,
    /// Full pre-execution snapshot of every affected row.
    pub rollback_data: Vec<JsonValue>,
    pub rolled_back: bool,
    pub rollback_time: Option<DateTime<Utc>>,
    pub executed_by: String,
    pub target_table: String,
}

impl ExecutionResult {
    pub fn started(rule_id: &str, rule_name: &str, executed_by: &str) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            success: false,
            affected_count: 0,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            error_message: None,
            executed_sqls: Vec::new(),
            rollback_sqls: Vec::new(),
            rollback_data: Vec::new(),
            rolled_back: false,
            rollback_time: None,
            executed_by: executed_by.to_string(),
            target_table: String::new(),
        }
    }

    pub fn mark_complete(&mut self, affected_count: u64) {
        let now = Utc::now();
        self.success = true;
        self.affected_count = affected_count;
        self.duration_ms = Some((now - self.start_time).num_milliseconds());
        self.end_time = Some(now);
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.success = false;
        self.affected_count = 0;
        self.error_message = Some(message.into());
        self.duration_ms = Some((now - self.start_time).num_milliseconds());
        self.end_time = Some(now);
    }

    pub fn mark_rolled_back(&mut self) {
        self.rolled_back = true;
        self.rollback_time = Some(Utc::now());
    }

    /// Rollback eligibility: committed, not yet rolled back, and with
    /// compensating statements recorded.
    pub fn can_rollback(&self) -> bool {
        self.success && !self.rolled_back && !self.rollback_sqls.is_empty()
    }
}
